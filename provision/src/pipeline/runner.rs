//! Pipeline construction and execution.

use super::{CheckpointStatus, PipelineReport, StageReport};
use crate::checkpoint::CheckpointStore;
use crate::context::StageContext;
use crate::errors::{ProvisionError, Result};
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_STARTED,
    STAGE_COMPLETED, STAGE_FAILED, STAGE_SKIPPED, STAGE_STARTED,
};
use crate::stages::Stage;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How stages with an existing checkpoint are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RerunPolicy {
    /// Ask the operator for each completed stage.
    #[default]
    Ask,
    /// Skip every completed stage without asking.
    SkipCompleted,
    /// Run every completed stage again without asking.
    RerunCompleted,
}

/// An ordered, validated list of stages with their checkpoint store.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    checkpoints: Arc<dyn CheckpointStore>,
    event_sink: Arc<dyn EventSink>,
    policy: RerunPolicy,
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidPipeline`] if the list is empty, a
    /// name repeats, or a stage requires itself, an unknown stage or a stage
    /// declared after it.
    pub fn new(stages: Vec<Arc<dyn Stage>>, checkpoints: Arc<dyn CheckpointStore>) -> Result<Self> {
        if stages.is_empty() {
            return Err(ProvisionError::InvalidPipeline("pipeline has no stages".to_string()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for stage in &stages {
            let name = stage.name();
            for required in stage.requires() {
                if *required == name {
                    return Err(ProvisionError::InvalidPipeline(format!(
                        "stage '{name}' requires itself"
                    )));
                }
                if !seen.contains(required) {
                    let reason = if stages.iter().any(|s| s.name() == *required) {
                        "is declared after it"
                    } else {
                        "does not exist"
                    };
                    return Err(ProvisionError::InvalidPipeline(format!(
                        "stage '{name}' requires '{required}', which {reason}"
                    )));
                }
            }
            if !seen.insert(name) {
                return Err(ProvisionError::InvalidPipeline(format!(
                    "duplicate stage name '{name}'"
                )));
            }
        }

        Ok(Self {
            stages,
            checkpoints,
            event_sink: Arc::new(NoOpEventSink),
            policy: RerunPolicy::default(),
        })
    }

    /// Sets the sink receiving progress events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets how completed stages are handled.
    #[must_use]
    pub fn with_rerun_policy(mut self, policy: RerunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the checkpoint store.
    #[must_use]
    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| ProvisionError::UnknownStage(name.to_string()))
    }

    /// Runs every stage in order.
    pub async fn run(&self, ctx: &mut StageContext) -> Result<PipelineReport> {
        self.run_range(0, ctx, self.policy).await
    }

    /// Runs the stages from `name` to the end.
    pub async fn run_from(&self, name: &str, ctx: &mut StageContext) -> Result<PipelineReport> {
        let start = self.position(name)?;
        self.run_range(start, ctx, self.policy).await
    }

    /// Runs exactly one stage.
    ///
    /// With `force` the stage runs even if its checkpoint exists; otherwise
    /// the rerun policy applies. Required checkpoints are enforced either way.
    pub async fn run_stage(&self, name: &str, force: bool, ctx: &mut StageContext) -> Result<PipelineReport> {
        let index = self.position(name)?;
        let policy = if force { RerunPolicy::RerunCompleted } else { self.policy };
        let report = self
            .step(index, ctx, policy)
            .await
            .map_err(|e| e.in_stage(name))?;
        Ok(PipelineReport {
            run_id: ctx.run_id(),
            stages: vec![report],
        })
    }

    async fn run_range(&self, start: usize, ctx: &mut StageContext, policy: RerunPolicy) -> Result<PipelineReport> {
        let run_id = ctx.run_id();
        let total = self.stages.len();
        info!(%run_id, start = start + 1, total, "Pipeline started");
        self.event_sink
            .emit(
                PIPELINE_STARTED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "total": total,
                    "first_stage": self.stages[start].name(),
                })),
            )
            .await;

        let mut reports = Vec::with_capacity(total - start);
        for index in start..total {
            let name = self.stages[index].name();
            match self.step(index, ctx, policy).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    let err = e.in_stage(name);
                    warn!(%run_id, stage = name, error = %err, "Pipeline failed");
                    self.event_sink
                        .emit(
                            PIPELINE_FAILED,
                            Some(json!({
                                "run_id": run_id.to_string(),
                                "stage": name,
                                "error": err.root().to_string(),
                            })),
                        )
                        .await;
                    return Err(err);
                }
            }
        }

        let report = PipelineReport {
            run_id,
            stages: reports,
        };
        info!(%run_id, executed = report.executed(), skipped = report.skipped(), "Pipeline completed");
        self.event_sink
            .emit(
                PIPELINE_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "total": total,
                    "executed": report.executed(),
                    "skipped": report.skipped(),
                })),
            )
            .await;
        Ok(report)
    }

    /// Runs one stage and reports a failure as a `stage.failed` event.
    async fn step(&self, index: usize, ctx: &mut StageContext, policy: RerunPolicy) -> Result<StageReport> {
        let run_id = ctx.run_id();
        let name = self.stages[index].name();
        let result = self.attempt(index, ctx, policy).await;
        if let Err(e) = &result {
            self.event_sink
                .emit(
                    STAGE_FAILED,
                    Some(self.event_data(run_id, index, json!({ "error": e.to_string() }))),
                )
                .await;
            debug!(stage = name, error = %e, "Stage failed");
        }
        result
    }

    async fn attempt(&self, index: usize, ctx: &mut StageContext, policy: RerunPolicy) -> Result<StageReport> {
        let stage = &self.stages[index];
        let name = stage.name();
        let ordinal = index + 1;
        let run_id = ctx.run_id();

        if let Some(at) = self.checkpoints.completed_at(name).map_err(checkpoint_error(name))? {
            let rerun = match policy {
                RerunPolicy::Ask => ctx.prompter.confirm(&format!(
                    "Stage {ordinal} '{name}' already completed at {}. Run it again?",
                    at.format("%Y-%m-%d %H:%M:%S UTC")
                ))?,
                RerunPolicy::SkipCompleted => false,
                RerunPolicy::RerunCompleted => true,
            };
            if !rerun {
                const REASON: &str = "already completed";
                info!(%run_id, stage = name, "Skipping completed stage");
                self.event_sink
                    .emit(STAGE_SKIPPED, Some(self.event_data(run_id, index, json!({ "reason": REASON }))))
                    .await;
                return Ok(StageReport::skipped(ordinal, name, REASON));
            }
            debug!(stage = name, "Re-running completed stage");
        }

        for required in stage.requires() {
            if !self.checkpoints.exists(required).map_err(checkpoint_error(required))? {
                return Err(ProvisionError::precondition(
                    name,
                    format!("required stage '{required}' has not completed"),
                ));
            }
        }

        self.event_sink
            .emit(STAGE_STARTED, Some(self.event_data(run_id, index, json!({}))))
            .await;
        ctx.enter_stage(name);
        let output = stage.execute(ctx).await?;

        self.checkpoints.record(name).map_err(checkpoint_error(name))?;
        if let Some(location) = self.checkpoints.location(name) {
            debug!(stage = name, checkpoint = %location.display(), "Checkpoint recorded");
        }

        let artifacts = serde_json::to_value(&output.artifacts).unwrap_or(Value::Null);
        let (event_type, extra) = match &output.skip_reason {
            Some(reason) => (STAGE_SKIPPED, json!({ "reason": reason, "artifacts": artifacts })),
            None => (STAGE_COMPLETED, json!({ "artifacts": artifacts, "data": output.data })),
        };
        self.event_sink
            .emit(event_type, Some(self.event_data(run_id, index, extra)))
            .await;

        let report = StageReport {
            ordinal,
            name: name.to_string(),
            status: output.status,
            skip_reason: output.skip_reason.clone(),
            artifacts: output.artifacts.clone(),
        };
        ctx.record_output(name, output);
        Ok(report)
    }

    fn event_data(&self, run_id: Uuid, index: usize, extra: Value) -> Value {
        let mut data = json!({
            "run_id": run_id.to_string(),
            "stage": self.stages[index].name(),
            "ordinal": index + 1,
            "total": self.stages.len(),
        });
        if let (Some(map), Value::Object(extra)) = (data.as_object_mut(), extra) {
            map.extend(extra);
        }
        data
    }

    /// Returns every stage with its checkpoint time.
    pub fn status(&self) -> Result<Vec<CheckpointStatus>> {
        self.stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                let completed_at = self
                    .checkpoints
                    .completed_at(stage.name())
                    .map_err(checkpoint_error(stage.name()))?;
                Ok(CheckpointStatus {
                    ordinal: index + 1,
                    name: stage.name().to_string(),
                    description: stage.description().to_string(),
                    completed_at,
                })
            })
            .collect()
    }

    /// Removes the checkpoint of one stage. Returns true if it existed.
    pub fn reset(&self, name: &str) -> Result<bool> {
        self.position(name)?;
        let removed = self.checkpoints.reset(name).map_err(checkpoint_error(name))?;
        info!(stage = name, removed, "Checkpoint reset");
        Ok(removed)
    }

    /// Removes every checkpoint. Returns how many existed.
    pub fn reset_all(&self) -> Result<usize> {
        let mut removed = 0;
        for stage in &self.stages {
            if self.reset(stage.name())? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn checkpoint_error(stage: &str) -> impl FnOnce(std::io::Error) -> ProvisionError + '_ {
    move |source| ProvisionError::Checkpoint {
        stage: stage.to_string(),
        source,
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

//! A configurable stage that records its executions.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::Result;
use crate::gateway::ServiceError;
use crate::stages::Stage;

/// One recorded call of [`RecordingStage::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExecution {
    /// The stage name the context carried.
    pub stage_name: String,
    /// The run the call belonged to.
    pub run_id: Uuid,
}

/// A stage that records each call and returns a configurable result.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    requires: Vec<&'static str>,
    failure: Option<String>,
    skip_reason: Option<String>,
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingStage {
    /// Creates a stage that succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            failure: None,
            skip_reason: None,
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Declares stages that must have completed first.
    #[must_use]
    pub fn requiring(mut self, stages: &[&'static str]) -> Self {
        self.requires = stages.to_vec();
        self
    }

    /// Makes every execution fail with a service error carrying `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Makes every execution report that it had nothing to do.
    #[must_use]
    pub fn skipping(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Returns every recorded execution.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Recording stage"
    }

    fn requires(&self) -> &[&str] {
        &self.requires
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        self.executions.lock().push(RecordedExecution {
            stage_name: ctx.stage_name().to_string(),
            run_id: ctx.run_id(),
        });

        if let Some(message) = &self.failure {
            return Err(ServiceError::NonZeroExit {
                command: self.name.clone(),
                code: Some(1),
                stderr: message.clone(),
            }
            .into());
        }
        Ok(match &self.skip_reason {
            Some(reason) => StageOutput::skip(reason.clone()),
            None => StageOutput::ok_empty(),
        })
    }
}

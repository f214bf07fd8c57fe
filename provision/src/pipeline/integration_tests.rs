//! Integration tests for checkpointed pipeline execution.

#[cfg(test)]
mod tests {
    use crate::checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
    use crate::config::ProvisionConfig;
    use crate::context::{Gateways, StageContext};
    use crate::core::StageStatus;
    use crate::errors::ProvisionError;
    use crate::events::{CollectingEventSink, RunLog};
    use crate::pipeline::{Pipeline, RerunPolicy};
    use crate::stages::Stage;
    use crate::testing::{RecordingRunner, RecordingStage, ScriptedPrompter};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;

    struct Fixture {
        stages: Vec<Arc<RecordingStage>>,
        store: Arc<InMemoryCheckpointStore>,
    }

    impl Fixture {
        /// Three stages where each requires the one before it.
        fn chain() -> Self {
            Self::with(vec![
                RecordingStage::new("one"),
                RecordingStage::new("two").requiring(&["one"]),
                RecordingStage::new("three").requiring(&["two"]),
            ])
        }

        fn with(stages: Vec<RecordingStage>) -> Self {
            Self {
                stages: stages.into_iter().map(Arc::new).collect(),
                store: Arc::new(InMemoryCheckpointStore::new()),
            }
        }

        fn pipeline(&self) -> Pipeline {
            let stages = self
                .stages
                .iter()
                .map(|s| s.clone() as Arc<dyn Stage>)
                .collect();
            Pipeline::new(stages, self.store.clone()).unwrap()
        }

        fn counts(&self) -> Vec<usize> {
            self.stages.iter().map(|s| s.execution_count()).collect()
        }
    }

    fn context(prompter: &ScriptedPrompter) -> StageContext {
        StageContext::new(
            Arc::new(ProvisionConfig::default()),
            Gateways::new(Arc::new(RecordingRunner::new())),
            Box::new(prompter.clone()),
        )
    }

    fn invalid(stages: Vec<RecordingStage>) -> String {
        let stages = stages
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn Stage>)
            .collect();
        match Pipeline::new(stages, Arc::new(InMemoryCheckpointStore::new())) {
            Err(ProvisionError::InvalidPipeline(reason)) => reason,
            other => panic!("expected an invalid pipeline, got {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_validation() {
        assert_eq!(invalid(vec![]), "pipeline has no stages");
        assert_eq!(
            invalid(vec![RecordingStage::new("a"), RecordingStage::new("a")]),
            "duplicate stage name 'a'"
        );
        assert_eq!(
            invalid(vec![RecordingStage::new("a").requiring(&["a"])]),
            "stage 'a' requires itself"
        );
        assert_eq!(
            invalid(vec![RecordingStage::new("a").requiring(&["ghost"])]),
            "stage 'a' requires 'ghost', which does not exist"
        );
        assert_eq!(
            invalid(vec![RecordingStage::new("a").requiring(&["b"]), RecordingStage::new("b")]),
            "stage 'a' requires 'b', which is declared after it"
        );
    }

    #[tokio::test]
    async fn test_full_run_records_every_checkpoint() {
        let fixture = Fixture::chain();
        let mut ctx = context(&ScriptedPrompter::default());

        let report = fixture.pipeline().run(&mut ctx).await.unwrap();

        assert_eq!(report.executed(), 3);
        assert_eq!(report.skipped(), 0);
        assert_eq!(report.run_id, ctx.run_id());
        assert_eq!(fixture.store.completed(), vec!["one", "three", "two"]);
        assert_eq!(fixture.stages[1].executions()[0].stage_name, "two");
        assert!(ctx.output("three").is_some());
    }

    #[tokio::test]
    async fn test_failure_stops_the_run() {
        let fixture = Fixture::with(vec![
            RecordingStage::new("one"),
            RecordingStage::new("two").failing("exploded"),
            RecordingStage::new("three"),
        ]);
        let mut ctx = context(&ScriptedPrompter::default());

        let err = fixture.pipeline().run(&mut ctx).await.unwrap_err();

        assert_eq!(err.stage(), Some("two"));
        assert!(matches!(err.root(), ProvisionError::Service(_)));
        assert!(err.to_string().contains("exploded"));
        assert_eq!(fixture.counts(), vec![1, 1, 0]);
        assert_eq!(fixture.store.completed(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_declined_rerun_skips_without_executing() {
        let fixture = Fixture::chain();
        fixture.store.record("one").unwrap();
        let prompter = ScriptedPrompter::new(["n"]);
        let mut ctx = context(&prompter);

        let report = fixture.pipeline().run(&mut ctx).await.unwrap();

        assert_eq!(fixture.counts(), vec![0, 1, 1]);
        let first = report.stage("one").unwrap();
        assert_eq!(first.status, StageStatus::Skip);
        assert_eq!(first.skip_reason.as_deref(), Some("already completed"));
        assert!(prompter.prompts()[0].starts_with("Stage 1 'one' already completed at "));
        assert!(prompter.prompts()[0].ends_with("Run it again? [y/N]: "));
    }

    #[tokio::test]
    async fn test_accepted_rerun_executes_again() {
        let fixture = Fixture::chain();
        for name in ["one", "two", "three"] {
            fixture.store.record(name).unwrap();
        }
        let prompter = ScriptedPrompter::new(["y", "no", "yes"]);
        let mut ctx = context(&prompter);

        let report = fixture.pipeline().run(&mut ctx).await.unwrap();

        assert_eq!(fixture.counts(), vec![1, 0, 1]);
        assert_eq!(report.executed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_rerun_policies_never_prompt() {
        let fixture = Fixture::chain();
        fixture.store.record("one").unwrap();

        let mut ctx = context(&ScriptedPrompter::default());
        fixture
            .pipeline()
            .with_rerun_policy(RerunPolicy::SkipCompleted)
            .run(&mut ctx)
            .await
            .unwrap();
        assert_eq!(fixture.counts(), vec![0, 1, 1]);

        fixture
            .pipeline()
            .with_rerun_policy(RerunPolicy::RerunCompleted)
            .run(&mut ctx)
            .await
            .unwrap();
        assert_eq!(fixture.counts(), vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_missing_requirement_is_a_precondition_failure() {
        let fixture = Fixture::chain();
        let mut ctx = context(&ScriptedPrompter::default());

        let err = fixture.pipeline().run_from("two", &mut ctx).await.unwrap_err();

        match &err {
            ProvisionError::Precondition { stage, detail } => {
                assert_eq!(stage, "two");
                assert_eq!(detail, "required stage 'one' has not completed");
            }
            other => panic!("expected a precondition failure, got {other:?}"),
        }
        assert_eq!(fixture.counts(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn test_run_from_resumes_after_completed_stages() {
        let fixture = Fixture::chain();
        fixture.store.record("one").unwrap();
        let mut ctx = context(&ScriptedPrompter::default());

        let report = fixture.pipeline().run_from("two", &mut ctx).await.unwrap();

        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.stages[0].ordinal, 2);
        assert_eq!(fixture.counts(), vec![0, 1, 1]);
    }

    #[tokio::test]
    async fn test_run_stage_force_and_unknown() {
        let fixture = Fixture::chain();
        fixture.store.record("one").unwrap();
        let pipeline = fixture.pipeline().with_rerun_policy(RerunPolicy::SkipCompleted);
        let mut ctx = context(&ScriptedPrompter::default());

        let skipped = pipeline.run_stage("one", false, &mut ctx).await.unwrap();
        let forced = pipeline.run_stage("one", true, &mut ctx).await.unwrap();
        let unknown = pipeline.run_stage("four", true, &mut ctx).await.unwrap_err();

        assert_eq!(skipped.skipped(), 1);
        assert_eq!(forced.executed(), 1);
        assert_eq!(fixture.counts(), vec![1, 0, 0]);
        assert!(matches!(unknown, ProvisionError::UnknownStage(name) if name == "four"));
    }

    #[tokio::test]
    async fn test_skip_output_still_records_checkpoint() {
        let fixture = Fixture::with(vec![RecordingStage::new("only").skipping("nothing to install")]);
        let sink = Arc::new(CollectingEventSink::new());
        let mut ctx = context(&ScriptedPrompter::default());

        let report = fixture
            .pipeline()
            .with_event_sink(sink.clone())
            .run(&mut ctx)
            .await
            .unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(fixture.store.completed(), vec!["only"]);
        assert_eq!(
            sink.event_types(),
            vec!["pipeline.started", "stage.started", "stage.skipped", "pipeline.completed"]
        );
    }

    #[tokio::test]
    async fn test_status_and_reset() {
        let fixture = Fixture::chain();
        let pipeline = fixture.pipeline();
        fixture.store.record("one").unwrap();
        fixture.store.record("three").unwrap();

        let status = pipeline.status().unwrap();
        assert_eq!(status.len(), 3);
        assert!(status[0].is_completed());
        assert!(!status[1].is_completed());
        assert_eq!(status[2].ordinal, 3);
        assert_eq!(status[2].description, "Recording stage");

        assert!(pipeline.reset("one").unwrap());
        assert!(!pipeline.reset("one").unwrap());
        assert!(matches!(pipeline.reset("nope"), Err(ProvisionError::UnknownStage(_))));
        assert_eq!(pipeline.reset_all().unwrap(), 1);
        assert!(fixture.store.completed().is_empty());
    }

    #[tokio::test]
    async fn test_event_order_on_failure() {
        let fixture = Fixture::with(vec![
            RecordingStage::new("one"),
            RecordingStage::new("two").failing("exploded"),
        ]);
        let sink = Arc::new(CollectingEventSink::new());
        let mut ctx = context(&ScriptedPrompter::default());

        fixture
            .pipeline()
            .with_event_sink(sink.clone())
            .run(&mut ctx)
            .await
            .unwrap_err();

        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.failed",
                "pipeline.failed",
            ]
        );
        let (_, data) = sink.events_of_type("pipeline.failed").remove(0);
        let data = data.unwrap();
        assert_eq!(data["stage"], "two");
        assert!(data["error"].as_str().unwrap().contains("exploded"));
    }

    #[tokio::test]
    async fn test_file_checkpoints_and_run_log_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::new(dir.path().join("checkpoints")));
        let log_path = dir.path().join("provision.log");
        let stages = || -> Vec<Arc<dyn Stage>> {
            vec![
                Arc::new(RecordingStage::new("one")),
                Arc::new(RecordingStage::new("two").requiring(&["one"])),
            ]
        };

        let log = Arc::new(RunLog::quiet(&log_path).unwrap());
        let first = Pipeline::new(stages(), store.clone()).unwrap().with_event_sink(log);
        first.run(&mut context(&ScriptedPrompter::default())).await.unwrap();

        let log = Arc::new(RunLog::quiet(&log_path).unwrap());
        let second = Pipeline::new(stages(), store.clone())
            .unwrap()
            .with_event_sink(log)
            .with_rerun_policy(RerunPolicy::SkipCompleted);
        let report = second.run(&mut context(&ScriptedPrompter::default())).await.unwrap();

        assert_eq!(report.skipped(), 2);
        let content = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines[0].ends_with("Provisioning started (2 stages)"));
        assert!(lines[2].ends_with("[1/2] one: completed (0 artifacts changed)"));
        assert!(lines[5].ends_with("Provisioning completed: 2 run, 0 skipped"));
        assert!(lines[7].ends_with("[1/2] one: skipped (already completed)"));
        assert!(lines[9].ends_with("Provisioning completed: 0 run, 2 skipped"));
    }
}

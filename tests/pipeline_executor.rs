//! Pipeline executor behaviour: validation, fail-fast, skipping, ordering, timeouts

mod helpers;

use helpers::*;
use repo_health::core::{
    ExecutionStatus, HealthStatus, Pipeline, PipelineError, PipelineStep, Repository, StepStatus,
    StepType,
};
use repo_health::execution::PipelineExecutor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn executor_with(step: RecordingStep) -> PipelineExecutor {
    let mut executor = PipelineExecutor::with_defaults(engine_with(vec![]));
    executor.register_step_executor(custom(), Arc::new(step));
    executor
}

fn abc() -> Pipeline {
    Pipeline::new("abc")
        .with_step(PipelineStep::new("A", custom()))
        .with_step(PipelineStep::new("B", custom()))
        .with_step(PipelineStep::new("C", custom()))
}

#[tokio::test]
async fn test_validation_failures_run_nothing() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()));
    let cancel = CancellationToken::new();

    let unnamed = Pipeline::new("").with_step(PipelineStep::new("A", custom()));
    assert_eq!(
        executor.execute_pipeline(&cancel, &unnamed, &[]).await.err(),
        Some(PipelineError::EmptyName)
    );

    let dangling = Pipeline::new("p").with_step(PipelineStep::new("A", custom()).depends_on("Z"));
    assert!(matches!(
        executor.execute_pipeline(&cancel, &dangling, &[]).await,
        Err(PipelineError::UnknownDependency { .. })
    ));

    let unsupported = Pipeline::new("p")
        .with_step(PipelineStep::new("A", custom()))
        .with_step(PipelineStep::new("deploy", StepType::Custom("deploy".to_string())));
    // The recording step claims every custom type, but is only registered for one
    assert!(executor.validate_pipeline(&unsupported).is_err());

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).failing_on("B"));

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &abc().with_fail_fast(true), &[])
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(*calls.lock().unwrap(), vec!["A", "B"]);
    assert_eq!(step_names(&result), vec!["A", "B"]);
    assert_step_status(&result, "A", StepStatus::Completed);
    assert_step_status(&result, "B", StepStatus::Failed);
    assert_eq!(result.step("B").unwrap().error.as_deref(), Some("B failed"));
}

#[tokio::test]
async fn test_without_fail_fast_all_steps_run() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).failing_on("B"));

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &abc().with_fail_fast(false), &[])
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(*calls.lock().unwrap(), vec!["A", "B", "C"]);
    assert_step_status(&result, "B", StepStatus::Failed);
    assert_step_status(&result, "C", StepStatus::Completed);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_disabled_step_is_never_invoked() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()));

    let pipeline = Pipeline::new("p")
        .with_step(PipelineStep::new("A", custom()))
        .with_step(PipelineStep::new("B", custom()).disabled())
        .with_step(PipelineStep::new("C", custom()));

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &[])
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(*calls.lock().unwrap(), vec!["A", "C"]);
    assert_step_status(&result, "B", StepStatus::Skipped);
    assert!(result.step("B").unwrap().blocked_by.is_none());
    assert!(result.is_success());
}

#[tokio::test]
async fn test_dependencies_run_first() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()));

    let pipeline = Pipeline::new("p")
        .with_step(PipelineStep::new("report", custom()).depends_on("check"))
        .with_step(PipelineStep::new("check", custom()).depends_on("prepare"))
        .with_step(PipelineStep::new("prepare", custom()));

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &[])
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["prepare", "check", "report"]);
    assert_eq!(step_names(&result), vec!["prepare", "check", "report"]);
}

#[tokio::test]
async fn test_dependents_of_failed_step_are_skipped() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).failing_on("A"));

    let pipeline = Pipeline::new("p")
        .with_step(PipelineStep::new("A", custom()))
        .with_step(PipelineStep::new("B", custom()).depends_on("A"))
        .with_step(PipelineStep::new("C", custom()).depends_on("B"))
        .with_step(PipelineStep::new("D", custom()))
        .with_fail_fast(false);

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &[])
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["A", "D"]);
    assert_step_status(&result, "B", StepStatus::Skipped);
    assert_step_status(&result, "C", StepStatus::Skipped);
    assert_step_status(&result, "D", StepStatus::Completed);
    assert!(result.step("C").unwrap().error.as_deref().unwrap().contains("B"));
    assert_eq!(result.step("B").unwrap().blocked_by.as_deref(), Some("A"));
    assert_eq!(result.step("C").unwrap().blocked_by.as_deref(), Some("B"));
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_step_timeout_fails_the_step() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).with_delay(Duration::from_secs(10)));

    let pipeline = Pipeline::new("p")
        .with_step(PipelineStep::new("slow", custom()).with_timeout(Duration::from_millis(100)));

    let started = std::time::Instant::now();
    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &[])
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_step_status(&result, "slow", StepStatus::Failed);
    assert!(result.step("slow").unwrap().error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_pipeline_deadline_fails_the_run() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).with_delay(Duration::from_secs(10)));

    let pipeline = abc()
        .with_fail_fast(false)
        .with_timeout(Duration::from_millis(150));

    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &[])
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(*calls.lock().unwrap(), vec!["A"]);
    assert_step_status(&result, "A", StepStatus::Failed);
}

#[tokio::test]
async fn test_external_cancellation() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let executor = executor_with(RecordingStep::new(calls.clone()).with_delay(Duration::from_secs(10)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = executor
        .execute_pipeline(&cancel, &abc().with_fail_fast(false), &[])
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(*calls.lock().unwrap(), vec!["A"]);
}

#[tokio::test]
async fn test_standard_pipeline_end_to_end() {
    let healthy = tempfile::tempdir().unwrap();
    let body = format!("# Service\n\n{}\n", "Documentation that says something. ".repeat(10));
    std::fs::write(healthy.path().join("README.md"), body).unwrap();
    std::fs::write(healthy.path().join("LICENSE"), "MIT License\n\nCopyright (c) 2024").unwrap();
    let bare = tempfile::tempdir().unwrap();

    let engine = engine_with(vec![]);
    for checker in repo_health::checkers::builtin() {
        engine.registry().checkers.register(checker);
    }
    let executor = PipelineExecutor::with_defaults(engine);

    let repositories = vec![
        repo_health::Repository::new("healthy", healthy.path()),
        repo_health::Repository::new("bare", bare.path()),
    ];
    let result = executor
        .execute_pipeline(&CancellationToken::new(), &Pipeline::standard("standard"), &repositories)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(step_names(&result), vec!["validate", "analyze", "check", "report"]);
    for step in &result.steps {
        assert_eq!(step.status, StepStatus::Completed, "step {} did not complete", step.name);
    }

    let workflow = result.workflow_result.as_ref().unwrap();
    assert_eq!(workflow.repositories[0].status, HealthStatus::Healthy);
    assert_eq!(workflow.repositories[1].status, HealthStatus::Critical);
    assert_eq!(workflow.summary.failed_repos, 1);

    let report = result.step("report").unwrap().output["report"].as_str().unwrap();
    assert!(report.contains("healthy"));
    assert!(report.contains("Repository has no README"));
}

#[tokio::test]
async fn test_validation_excludes_missing_repositories() {
    let present = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::with_defaults(engine_with(vec![]));

    let pipeline = Pipeline::new("lenient")
        .with_step(PipelineStep::new("validate", StepType::Validation).with_config("allow_invalid", true))
        .with_step(PipelineStep::new("check", StepType::Checkers).depends_on("validate"));

    let repositories = vec![
        repo_health::Repository::new("missing", "/definitely/not/a/repo"),
        repo_health::Repository::new("present", present.path()),
    ];
    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &repositories)
        .await
        .unwrap();

    let workflow = result.workflow_result.unwrap();
    assert_eq!(workflow.repositories[0].repository.name, "missing");
    assert_eq!(
        workflow.repositories[0].error.as_deref(),
        Some("Repository failed validation")
    );
    assert_eq!(workflow.repositories[1].repository.name, "present");
    assert!(workflow.repositories[1].error.is_none());
}

#[tokio::test]
async fn test_validation_tracks_repositories_by_position() {
    let present = tempfile::tempdir().unwrap();
    let executor = PipelineExecutor::with_defaults(engine_with(vec![Arc::new(StubChecker::new(
        "ok",
        HealthStatus::Healthy,
        100,
    ))]));

    let pipeline = Pipeline::new("same-names")
        .with_step(PipelineStep::new("validate", StepType::Validation).with_config("allow_invalid", true))
        .with_step(PipelineStep::new("check", StepType::Checkers).depends_on("validate"));

    let repositories = vec![
        Repository::new("service", "/definitely/not/here"),
        Repository::new("service", present.path()),
    ];
    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &repositories)
        .await
        .unwrap();

    let workflow = result.workflow_result.unwrap();
    assert_eq!(workflow.repositories.len(), 2);
    assert_eq!(workflow.repositories[0].status, HealthStatus::Unknown);
    assert_eq!(
        workflow.repositories[0].error.as_deref(),
        Some("Repository failed validation")
    );
    assert_eq!(workflow.repositories[1].repository.path, present.path());
    assert_eq!(workflow.repositories[1].status, HealthStatus::Healthy);
    assert_eq!(workflow.repositories[1].checks.len(), 1);
}

#[tokio::test]
async fn test_checkers_step_timeout_keeps_partial_workflow() {
    let executor = PipelineExecutor::with_defaults(engine_with(vec![Arc::new(StallingChecker {
        stall_for: vec!["stuck".to_string()],
    })]));

    let pipeline = Pipeline::new("bounded")
        .with_step(PipelineStep::new("check", StepType::Checkers).with_timeout(Duration::from_millis(300)))
        .with_step(PipelineStep::new("report", StepType::Reporting).depends_on("check"))
        .with_fail_fast(false);

    let started = std::time::Instant::now();
    let result = executor
        .execute_pipeline(&CancellationToken::new(), &pipeline, &repos(&["quick", "stuck"]))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_step_status(&result, "check", StepStatus::Failed);
    assert!(result.step("check").unwrap().error.as_deref().unwrap().contains("timed out"));
    assert_eq!(result.step("report").unwrap().blocked_by.as_deref(), Some("check"));

    let workflow = result.workflow_result.as_ref().unwrap();
    assert_eq!(workflow.repositories[0].status, HealthStatus::Healthy);
    assert_eq!(workflow.repositories[1].repository.name, "stuck");
    assert_eq!(workflow.repositories[1].status, HealthStatus::Unknown);
    assert!(workflow.repositories[1].error.is_some());
    assert!(!result.is_success());
}

mod pmc_support;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pmc_core::execute::{ActionExecutor, FailureKind, ProjectResult, SkipReason};
use pmc_core::report::{self, Message, MessageLevel};

use pmc_support::{FakeModel, completion_count, install_plan, log_texts, target};

#[tokio::test]
async fn what_if_never_saves_or_applies() {
    let model = Arc::new(FakeModel::new(&[("A", true), ("B", true)]));
    let executor = ActionExecutor::new(model.clone());
    let (reporter, receiver) = report::channel();

    let plan = install_plan(&["A", "B"], "Foo");
    let outcome = executor
        .execute(
            &plan,
            &[target("A", true), target("B", true)],
            true,
            &reporter,
            &CancellationToken::new(),
        )
        .await;
    reporter.complete(Some(outcome.clone()));

    assert!(model.saved().is_empty());
    assert!(model.applied().is_empty());
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.preview.len(), 2);
    assert!(outcome.preview[0].contains("Foo 1.0.0"));

    let messages = receiver.collect().await;
    assert_eq!(log_texts(&messages, MessageLevel::Info), outcome.preview);
}

#[tokio::test]
async fn failing_project_does_not_stop_the_batch() {
    let model = Arc::new(FakeModel::new(&[("A", true), ("B", true), ("C", true)]).failing_apply("B"));
    let executor = ActionExecutor::new(model.clone());
    let (reporter, receiver) = report::channel();
    let targets = [target("A", true), target("B", true), target("C", true)];

    let outcome = executor
        .execute(
            &install_plan(&["A", "B", "C"], "Foo"),
            &targets,
            false,
            &reporter,
            &CancellationToken::new(),
        )
        .await;
    reporter.complete(Some(outcome.clone()));

    assert_eq!(outcome.applied(), 2);
    assert_eq!(outcome.failed(), 1);
    assert!(matches!(
        outcome.result_for("B"),
        Some(ProjectResult::Failed {
            kind: FailureKind::Apply,
            ..
        })
    ));
    // No rollback: A stays applied and saved.
    assert_eq!(model.saved(), vec!["A", "C"]);

    let messages = receiver.collect().await;
    assert_eq!(completion_count(&messages), 1);
    let errors = log_texts(&messages, MessageLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("disk full"));
}

#[tokio::test]
async fn save_failure_is_reported_and_batch_continues() {
    let model = Arc::new(FakeModel::new(&[("A", true), ("B", true)]).failing_save("A"));
    let executor = ActionExecutor::new(model.clone());
    let (reporter, _receiver) = report::channel();

    let outcome = executor
        .execute(
            &install_plan(&["A", "B"], "Foo"),
            &[target("A", true), target("B", true)],
            false,
            &reporter,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        outcome.result_for("A"),
        Some(ProjectResult::Failed {
            kind: FailureKind::Save,
            ..
        })
    ));
    assert_eq!(outcome.result_for("B"), Some(&ProjectResult::Applied));
    assert_eq!(model.applied(), vec!["A", "B"]);
}

#[tokio::test]
async fn cancellation_skips_projects_not_yet_started() {
    let token = CancellationToken::new();
    let model = Arc::new(
        FakeModel::new(&[("A", true), ("B", true), ("C", true), ("D", true)])
            .cancel_after("B", token.clone()),
    );
    let executor = ActionExecutor::new(model.clone());
    let (reporter, receiver) = report::channel();
    let targets = [
        target("A", true),
        target("B", true),
        target("C", true),
        target("D", true),
    ];

    let outcome = executor
        .execute(
            &install_plan(&["A", "B", "C", "D"], "Foo"),
            &targets,
            false,
            &reporter,
            &token,
        )
        .await;
    reporter.complete(Some(outcome.clone()));

    // B was in flight when the token fired and is allowed to finish.
    assert_eq!(outcome.result_for("B"), Some(&ProjectResult::Applied));
    for project in ["C", "D"] {
        assert_eq!(
            outcome.result_for(project),
            Some(&ProjectResult::Skipped(SkipReason::Cancelled))
        );
    }
    assert_eq!(model.applied(), vec!["A", "B"]);

    let messages = receiver.collect().await;
    assert_eq!(completion_count(&messages), 1);
    assert!(messages.last().is_some_and(Message::is_completion));
}

#[tokio::test]
async fn signature_failure_is_one_aggregated_entry() {
    let model = Arc::new(FakeModel::new(&[("A", true), ("B", true)]).failing_signature("A"));
    let executor = ActionExecutor::new(model.clone());
    let (reporter, receiver) = report::channel();

    let outcome = executor
        .execute(
            &install_plan(&["A", "B"], "Foo"),
            &[target("A", true), target("B", true)],
            false,
            &reporter,
            &CancellationToken::new(),
        )
        .await;
    reporter.complete(None);

    assert!(matches!(
        outcome.result_for("A"),
        Some(ProjectResult::Failed {
            kind: FailureKind::SignatureVerification,
            ..
        })
    ));
    assert_eq!(outcome.result_for("B"), Some(&ProjectResult::Applied));

    let errors = log_texts(&receiver.collect().await, MessageLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("NU3008"));
    assert!(errors[0].contains("NU3018"));
}

#[tokio::test]
async fn targets_without_actions_are_nothing_to_do() {
    let model = Arc::new(FakeModel::new(&[("A", true), ("B", true)]));
    let executor = ActionExecutor::new(model.clone());
    let (reporter, _receiver) = report::channel();

    let outcome = executor
        .execute(
            &install_plan(&["B"], "Foo"),
            &[target("A", true), target("B", true)],
            false,
            &reporter,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.results[0].project, "B");
    assert_eq!(
        outcome.result_for("A"),
        Some(&ProjectResult::Skipped(SkipReason::NothingToDo))
    );
    assert_eq!(model.saved(), vec!["B"]);
}

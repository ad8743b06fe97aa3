use std::time::Duration;

use interleave_event_server::{CoordinatorError, Runner};
use interleave_tests::{
    common::{coordinator_config, deployment, init_tracing},
    nodes::{SimulatedNode, Trace},
};
use tokio::time::sleep;

#[tokio::test]
async fn idle_run_is_reported_as_stalled() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let mut config = coordinator_config(plans.path());
    config.stall_timeout = Some(Duration::from_millis(300));
    let runner = Runner::start(deployment("gated.yaml"), config).await.unwrap();

    let err = runner.wait_for_completion().await.unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Stalled(timeout) if timeout == Duration::from_millis(300)
    ));
    assert!(!runner.coordinator().ledger().is_sequence_complete());
    runner.stop().await;
}

#[tokio::test]
async fn steady_progress_does_not_stall() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let mut config = coordinator_config(plans.path());
    config.stall_timeout = Some(Duration::from_secs(2));
    let runner = Runner::start(deployment("gated.yaml"), config).await.unwrap();
    let trace = Trace::default();
    let node = SimulatedNode::attach(&runner, "n1", &trace);

    let run = async {
        let world = node.spawn_call("app::world", &[]);
        sleep(Duration::from_millis(200)).await;
        node.call("app::hello", &[]).await.unwrap();
        sleep(Duration::from_millis(200)).await;
        runner
            .coordinator()
            .enforce_order("x1", None, || async {})
            .await
            .unwrap();
        world.await.unwrap().unwrap();
    };
    let (completion, ()) = tokio::join!(runner.wait_for_completion(), run);

    completion.unwrap();
    assert_eq!(trace.entries(), ["n1:app::hello", "n1:app::world"]);
    runner.stop().await;
}

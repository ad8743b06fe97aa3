use interleave_event_server::Runner;
use interleave_tests::{
    common::{SETTLE, coordinator_config, deployment, init_tracing},
    nodes::{SimulatedNode, Trace},
};
use tokio::time::sleep;

#[tokio::test]
async fn block_holds_until_unblock_and_driver_event() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(deployment("gated.yaml"), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let node = SimulatedNode::attach(&runner, "n1", &trace);
    let ledger = runner.coordinator().ledger();

    assert!(ledger.has_received("bbe2"));

    let world = node.spawn_call("app::world", &[]);
    sleep(SETTLE).await;
    assert!(!world.is_finished());

    node.call("app::hello", &[]).await.unwrap();
    assert!(ledger.has_received("ubbe2"));

    // Released from the block, now waiting on the driver.
    sleep(SETTLE).await;
    assert!(!world.is_finished());

    runner
        .coordinator()
        .enforce_order("x1", None, || async { trace.record("driver:x1") })
        .await
        .unwrap();
    world.await.unwrap().unwrap();

    assert_eq!(trace.entries(), ["n1:app::hello", "driver:x1", "n1:app::world"]);
    runner.wait_for_completion().await.unwrap();
    runner.stop().await;
}

#[tokio::test]
async fn driver_event_waits_for_the_node() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(deployment("gated.yaml"), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let node = SimulatedNode::attach(&runner, "n1", &trace);
    let ledger = runner.coordinator().ledger();

    let driver = runner.coordinator().enforce_order("x1", None, || async {
        assert!(ledger.has_received("e1"));
        trace.record("driver:x1");
    });
    let node_side = async {
        sleep(SETTLE).await;
        assert!(trace.entries().is_empty());
        node.call("app::hello", &[]).await
    };
    let (driver, node_side) = tokio::join!(driver, node_side);
    driver.unwrap();
    node_side.unwrap();

    assert!(ledger.has_received("x1"));
    assert!(trace.entries().contains(&"driver:x1".to_owned()));
    runner.stop().await;
}

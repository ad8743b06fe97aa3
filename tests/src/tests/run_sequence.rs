use std::time::Duration;

use interleave_core::{Deployment, NodeDefinition, Service, ServiceKind};
use interleave_event_server::Runner;
use interleave_tests::{
    common::{SETTLE, coordinator_config, init_tracing},
    nodes::{SimulatedNode, Trace},
};
use tokio::time::{sleep, timeout};

fn chained() -> Deployment {
    Deployment::builder("chained")
        .service(Service::new("svc", ServiceKind::Java))
        .node(NodeDefinition::new("n1", "svc").stack_trace("e1", "app::hello"))
        .node(
            NodeDefinition::new("n2", "svc")
                .stack_trace("e0", "main")
                .stack_trace("e2", "app::world,app::serve"),
        )
        .run_sequence("e0 * e1 * e2")
        .build()
        .unwrap()
}

fn fan_in() -> Deployment {
    Deployment::builder("fan-in")
        .service(Service::new("svc", ServiceKind::Native))
        .node(NodeDefinition::new("n1", "svc").stack_trace("e1", "app::a"))
        .node(NodeDefinition::new("n2", "svc").stack_trace("e2", "app::b"))
        .node(NodeDefinition::new("n3", "svc").stack_trace("e3", "app::c"))
        .run_sequence("e1 | e2 * e3")
        .build()
        .unwrap()
}

fn collected() -> Deployment {
    Deployment::builder("collected")
        .service(Service::new("svc", ServiceKind::Java))
        .node(
            NodeDefinition::new("n1", "svc")
                .stack_trace("e1", "app::hello")
                .garbage_collection("g1"),
        )
        .run_sequence("e1 * g1")
        .build()
        .unwrap()
}

#[tokio::test]
async fn nodes_follow_the_run_sequence() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(chained(), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let n1 = SimulatedNode::attach(&runner, "n1", &trace);
    let n2 = SimulatedNode::attach(&runner, "n2", &trace);

    let world = n2.spawn_call("app::world", &["app::serve", "main"]);
    let hello = n1.spawn_call("app::hello", &["main"]);
    sleep(SETTLE).await;
    assert!(!world.is_finished());
    assert!(!hello.is_finished());
    assert!(trace.entries().is_empty());

    n2.start().await.unwrap();
    hello.await.unwrap().unwrap();
    world.await.unwrap().unwrap();

    let entries = trace.entries();
    assert_eq!(entries[0], "n2:main");
    assert_eq!(entries.len(), 3);
    runner.wait_for_completion().await.unwrap();
    runner.stop().await;
}

#[tokio::test]
async fn later_group_waits_for_the_previous_one() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(chained(), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let n1 = SimulatedNode::attach(&runner, "n1", &trace);
    let n2 = SimulatedNode::attach(&runner, "n2", &trace);

    let world = n2.spawn_call("app::world", &["app::serve", "main"]);
    n2.start().await.unwrap();
    sleep(SETTLE).await;
    assert!(!world.is_finished());

    n1.call("app::hello", &["main"]).await.unwrap();
    world.await.unwrap().unwrap();

    assert!(runner.coordinator().ledger().is_sequence_complete());
    runner.stop().await;
}

#[tokio::test]
async fn unmatched_stacks_are_not_ordered() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(chained(), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let n2 = SimulatedNode::attach(&runner, "n2", &trace);

    timeout(SETTLE, n2.call("app::world", &["app::other", "main"]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(trace.entries(), ["n2:app::world"]);
    assert!(!runner.coordinator().ledger().has_received("e2"));
    runner.stop().await;
}

#[tokio::test]
async fn parallel_group_members_do_not_wait_for_each_other() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(fan_in(), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let n1 = SimulatedNode::attach(&runner, "n1", &trace);
    let n2 = SimulatedNode::attach(&runner, "n2", &trace);
    let n3 = SimulatedNode::attach(&runner, "n3", &trace);

    let c = n3.spawn_call("app::c", &[]);
    timeout(SETTLE, n2.call("app::b", &[]))
        .await
        .unwrap()
        .unwrap();
    sleep(SETTLE).await;
    assert!(!c.is_finished());

    n1.call("app::a", &[]).await.unwrap();
    timeout(Duration::from_secs(5), c)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let entries = trace.entries();
    assert_eq!(entries[0], "n2:app::b");
    assert!(entries.contains(&"n3:app::c".to_owned()));
    runner.wait_for_completion().await.unwrap();
    runner.stop().await;
}

#[tokio::test]
async fn collection_waits_for_its_turn_off_the_main_path() {
    init_tracing();
    let plans = tempfile::tempdir().unwrap();
    let runner = Runner::start(collected(), coordinator_config(plans.path()))
        .await
        .unwrap();
    let trace = Trace::default();
    let n1 = SimulatedNode::attach(&runner, "n1", &trace);

    timeout(SETTLE, n1.start()).await.unwrap().unwrap();
    sleep(SETTLE).await;
    assert_eq!(trace.entries(), ["n1:main"]);

    n1.call("app::hello", &["main"]).await.unwrap();
    runner.wait_for_completion().await.unwrap();

    assert_eq!(trace.entries(), ["n1:main", "n1:app::hello", "n1:gc"]);
    assert!(runner.coordinator().ledger().has_received("g1"));
    runner.stop().await;
}

//! Static checks over a deployment, run once before anything is instrumented
//! or started. The first failing pass aborts with its [`ConfigurationError`].

use petgraph::{algo::toposort, graphmap::DiGraphMap};

use crate::{
    deployment::Deployment,
    error::ConfigurationError,
    event::{EventKind, EventName},
};

pub fn verify(deployment: &Deployment) -> Result<(), ConfigurationError> {
    verify_service_references(deployment)?;
    verify_scheduling_targets(deployment)?;
    verify_run_sequence_references(deployment)?;
    verify_acyclic(deployment)
}

fn verify_service_references(deployment: &Deployment) -> Result<(), ConfigurationError> {
    for node in deployment.nodes() {
        if deployment.service(&node.service).is_none() {
            return Err(ConfigurationError::bad_reference(
                "service",
                &node.service,
                "node",
                &node.name,
            ));
        }
    }
    Ok(())
}

/// A scheduling event has to target a stack-trace event of its own node.
fn verify_scheduling_targets(deployment: &Deployment) -> Result<(), ConfigurationError> {
    for node in deployment.nodes() {
        for event in deployment.node_events(node) {
            let Some(scheduling) = event.scheduling() else {
                continue;
            };
            let target_is_valid = deployment
                .event(scheduling.target.as_str())
                .is_some_and(|target| {
                    target.node.as_deref() == Some(node.name.as_str())
                        && matches!(target.kind, EventKind::StackTrace { .. })
                });
            if !target_is_valid {
                return Err(ConfigurationError::bad_reference(
                    "stack trace event",
                    scheduling.target.as_str(),
                    "scheduling event",
                    event.name.as_str(),
                ));
            }
        }
    }
    Ok(())
}

fn verify_run_sequence_references(deployment: &Deployment) -> Result<(), ConfigurationError> {
    for token in deployment.run_sequence().tokens() {
        if deployment.event(token.as_str()).is_none() {
            return Err(ConfigurationError::bad_reference(
                "event",
                token.as_str(),
                "run sequence",
                deployment.run_sequence().as_str(),
            ));
        }
    }

    for event in deployment.events() {
        for dependency in &event.depends_on {
            if deployment.event(dependency.as_str()).is_none() {
                return Err(ConfigurationError::bad_reference(
                    "event",
                    dependency.as_str(),
                    "dependencies of event",
                    event.name.as_str(),
                ));
            }
        }
    }
    Ok(())
}

fn verify_acyclic(deployment: &Deployment) -> Result<(), ConfigurationError> {
    check_acyclic(deployment.events().map(|event| {
        (
            event.name.as_str(),
            event.depends_on.iter().map(EventName::as_str),
        )
    }))
}

/// Rejects dependency sets that loop back on themselves. Sets derived from a
/// parsed run sequence never do, since tokens are unique and only point
/// backwards.
fn check_acyclic<'a, D>(
    dependencies: impl IntoIterator<Item = (&'a str, D)>,
) -> Result<(), ConfigurationError>
where
    D: IntoIterator<Item = &'a str>,
{
    let mut graph = DiGraphMap::<&str, ()>::new();
    for (name, depends_on) in dependencies {
        graph.add_node(name);
        for dependency in depends_on {
            graph.add_edge(dependency, name, ());
        }
    }

    toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| ConfigurationError::DependencyCycle(cycle.node_id().to_owned()))
}

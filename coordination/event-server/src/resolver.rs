//! Pure dependency checks over a set of received events.
//!
//! "Not yet satisfied" is a plain `false`, never an error.

use std::collections::HashSet;

use interleave_core::Deployment;

/// Read access to the receipt markers of a ledger.
pub trait Received {
    fn has_received(&self, name: &str) -> bool;
}

impl Received for HashSet<String> {
    fn has_received(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// True once every prerequisite of `name` has been received, and with
/// `include_self` also `name` itself. Unknown events are never met.
pub fn dependencies_met(
    deployment: &Deployment,
    received: &impl Received,
    name: &str,
    include_self: bool,
) -> bool {
    let Some(dependencies) = deployment.dependencies_of(name) else {
        return false;
    };
    dependencies
        .iter()
        .all(|dependency| received.has_received(dependency.as_str()))
        && (!include_self || received.has_received(name))
}

/// True unless `name` is an active block whose blocking condition still has
/// missing members. Unknown and non-blocking events are always met.
pub fn blocking_dependencies_met(
    deployment: &Deployment,
    received: &impl Received,
    name: &str,
) -> bool {
    let Some(scheduling) = deployment.event(name).and_then(|event| event.scheduling()) else {
        return true;
    };
    if !scheduling.is_blocking() {
        return true;
    }
    scheduling.condition.as_ref().map_or(true, |condition| {
        condition
            .iter()
            .all(|member| received.has_received(member.as_str()))
    })
}

pub fn is_sequence_complete(deployment: &Deployment, received: &impl Received) -> bool {
    deployment
        .run_sequence()
        .tokens()
        .all(|token| received.has_received(token.as_str()))
}

#[cfg(test)]
mod tests {
    use interleave_core::{NodeDefinition, Service, ServiceKind};

    use super::*;

    fn deployment() -> Deployment {
        Deployment::builder("d")
            .service(Service::new("s1", ServiceKind::Native))
            .node(
                NodeDefinition::new("n1", "s1")
                    .stack_trace("a", "app::a")
                    .stack_trace("b", "app::b")
                    .stack_trace("c", "app::c")
                    .block_before("gate", "c")
                    .unblock_before("release", "c")
                    .block_after("idle_gate", "a"),
            )
            .run_sequence("a | b * gate * release * c")
            .build()
            .unwrap()
    }

    fn received(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn prerequisites_are_commutative() {
        let deployment = deployment();

        assert!(!dependencies_met(&deployment, &received(&[]), "gate", false));
        assert!(!dependencies_met(&deployment, &received(&["b"]), "gate", false));
        assert!(!dependencies_met(&deployment, &received(&["a"]), "gate", false));
        assert!(dependencies_met(&deployment, &received(&["b", "a"]), "gate", false));
        assert!(dependencies_met(&deployment, &received(&["a", "b"]), "gate", false));
    }

    #[test]
    fn include_self_requires_the_event_too() {
        let deployment = deployment();

        assert!(dependencies_met(&deployment, &received(&[]), "a", false));
        assert!(!dependencies_met(&deployment, &received(&[]), "a", true));
        assert!(dependencies_met(&deployment, &received(&["a"]), "a", true));
    }

    #[test]
    fn unknown_event_fails_closed() {
        assert!(!dependencies_met(&deployment(), &received(&["a", "b"]), "ghost", false));
    }

    #[test]
    fn blocking_condition_gates_only_active_blocks() {
        let deployment = deployment();

        assert!(!blocking_dependencies_met(&deployment, &received(&[]), "gate"));
        assert!(blocking_dependencies_met(&deployment, &received(&["release"]), "gate"));
        // Not in the run sequence, so never blocking.
        assert!(blocking_dependencies_met(&deployment, &received(&[]), "idle_gate"));
        assert!(blocking_dependencies_met(&deployment, &received(&[]), "release"));
        assert!(blocking_dependencies_met(&deployment, &received(&[]), "a"));
        assert!(blocking_dependencies_met(&deployment, &received(&[]), "ghost"));
    }

    #[test]
    fn sequence_completes_with_its_last_token() {
        let deployment = Deployment::builder("d")
            .test_case_events(["e1", "e2", "e3"])
            .run_sequence("e1 * e2 * e3")
            .build()
            .unwrap();

        assert!(!is_sequence_complete(&deployment, &received(&["e1", "e2"])));
        assert!(is_sequence_complete(&deployment, &received(&["e1", "e2", "e3"])));
    }
}

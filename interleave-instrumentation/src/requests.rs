use std::collections::BTreeMap;

use interleave_core::{
    ConfigurationError, Deployment, Event, EventKind, Position, SchedulingOperation,
};

use crate::operation::{InstrumentationPoint, InstrumentationRequest, Operation};

/// Requests a single event contributes to its node's instrumentation.
///
/// Block events are placed at the location of their target stack-trace
/// event and collection events at the program entry. Unblock events only
/// gate blocks and never produce requests.
pub fn event_requests(
    deployment: &Deployment,
    event: &Event,
) -> Result<Vec<InstrumentationRequest>, ConfigurationError> {
    match &event.kind {
        EventKind::StackTrace { location } => Ok(vec![InstrumentationRequest::new(
            InstrumentationPoint::new(location.method(), Position::Before),
            Operation::EnforceOrder {
                event: event.name.clone(),
                location: location.clone(),
            },
        )]),
        EventKind::Scheduling(scheduling) if scheduling.operation == SchedulingOperation::Block => {
            let location = deployment
                .event(scheduling.target.as_str())
                .and_then(Event::location)
                .ok_or_else(|| {
                    ConfigurationError::bad_reference(
                        "stack trace event",
                        scheduling.target.as_str(),
                        "scheduling event",
                        event.name.as_str(),
                    )
                })?;
            Ok(vec![InstrumentationRequest::new(
                InstrumentationPoint::new(location.method(), scheduling.position),
                Operation::BlockUntilReleased {
                    event: event.name.clone(),
                    location: location.clone(),
                },
            )])
        }
        EventKind::GarbageCollection => Ok(vec![InstrumentationRequest::new(
            InstrumentationPoint::entry(),
            Operation::GarbageCollection {
                event: event.name.clone(),
            },
        )]),
        EventKind::Scheduling(_) | EventKind::TestCase => Ok(Vec::new()),
    }
}

/// Instrumentation requests of every node, keyed by node name.
///
/// Only events named in the run sequence are instrumented; requests follow
/// run-sequence order. Nodes without requests are left out.
pub fn node_requests(
    deployment: &Deployment,
) -> Result<BTreeMap<String, Vec<InstrumentationRequest>>, ConfigurationError> {
    let mut requests: BTreeMap<String, Vec<InstrumentationRequest>> = BTreeMap::new();
    for token in deployment.run_sequence().tokens() {
        let Some(event) = deployment.event(token.as_str()) else {
            continue;
        };
        let Some(node) = &event.node else {
            continue;
        };
        let event_requests = event_requests(deployment, event)?;
        if !event_requests.is_empty() {
            requests
                .entry(node.clone())
                .or_default()
                .extend(event_requests);
        }
    }
    Ok(requests)
}

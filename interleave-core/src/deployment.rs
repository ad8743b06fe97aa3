use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    event::{
        Event, EventKind, EventName, Position, SchedulingEvent, SchedulingOperation,
        StackLocation,
    },
    run_sequence::RunSequence,
};

/// Technology a service is written in. Selects the instrumentor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Native,
    Java,
    Scala,
    #[default]
    Other,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Native => "native",
            Self::Java => "java",
            Self::Scala => "scala",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub kind: ServiceKind,
}

impl Service {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDefinition {
    StackTrace {
        name: String,
        location: String,
    },
    Block {
        name: String,
        target: String,
        #[serde(default)]
        position: Position,
    },
    Unblock {
        name: String,
        target: String,
        #[serde(default)]
        position: Position,
    },
    GarbageCollection {
        name: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    pub service: String,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

impl NodeDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn stack_trace(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.events.push(EventDefinition::StackTrace {
            name: name.into(),
            location: location.into(),
        });
        self
    }

    /// Memory reclamation requested by the node once `name`'s turn comes.
    #[must_use]
    pub fn garbage_collection(mut self, name: impl Into<String>) -> Self {
        self.events.push(EventDefinition::GarbageCollection { name: name.into() });
        self
    }

    #[must_use]
    pub fn block_before(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.scheduling(SchedulingOperation::Block, name, target, Position::Before)
    }

    #[must_use]
    pub fn block_after(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.scheduling(SchedulingOperation::Block, name, target, Position::After)
    }

    #[must_use]
    pub fn unblock_before(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.scheduling(SchedulingOperation::Unblock, name, target, Position::Before)
    }

    #[must_use]
    pub fn unblock_after(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.scheduling(SchedulingOperation::Unblock, name, target, Position::After)
    }

    fn scheduling(
        mut self,
        operation: SchedulingOperation,
        name: impl Into<String>,
        target: impl Into<String>,
        position: Position,
    ) -> Self {
        let (name, target) = (name.into(), target.into());
        self.events.push(match operation {
            SchedulingOperation::Block => EventDefinition::Block {
                name,
                target,
                position,
            },
            SchedulingOperation::Unblock => EventDefinition::Unblock {
                name,
                target,
                position,
            },
        });
        self
    }
}

/// Declarative form of a deployment, as written by hand or loaded from YAML.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub test_case_events: Vec<String>,
    #[serde(default)]
    pub run_sequence: String,
}

impl DeploymentDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn test_case_events<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_case_events
            .extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn run_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.run_sequence = sequence.into();
        self
    }

    /// Resolves names, parses the run sequence and derives dependency sets.
    ///
    /// Cross references are not checked here; that is the job of
    /// [`crate::verification::verify`].
    pub fn build(self) -> Result<Deployment, ConfigurationError> {
        Deployment::try_from(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub service: String,
    /// Events owned by this node, in declaration order.
    pub events: Vec<EventName>,
}

/// Immutable, resolved deployment definition.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "DeploymentDefinition")]
pub struct Deployment {
    name: String,
    services: BTreeMap<String, Service>,
    nodes: BTreeMap<String, Node>,
    events: BTreeMap<EventName, Event>,
    test_case_events: BTreeSet<EventName>,
    run_sequence: RunSequence,
}

impl Deployment {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> DeploymentDefinition {
        DeploymentDefinition::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// Events owned by `node`, in declaration order.
    pub fn node_events<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Event> + 'a {
        node.events.iter().filter_map(|name| self.events.get(name))
    }

    /// Block and unblock events, i.e. the events that can complete without
    /// any code reporting them.
    pub fn scheduling_events(&self) -> impl Iterator<Item = (&EventName, &SchedulingEvent)> {
        self.events
            .values()
            .filter_map(|event| event.scheduling().map(|scheduling| (&event.name, scheduling)))
    }

    /// Dependency set of `name`, or `None` when the event is not declared.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<EventName>> {
        self.events.get(name).map(|event| &event.depends_on)
    }

    #[must_use]
    pub const fn run_sequence(&self) -> &RunSequence {
        &self.run_sequence
    }

    #[must_use]
    pub fn is_in_run_sequence(&self, name: &str) -> bool {
        self.run_sequence.contains(name)
    }

    #[must_use]
    pub fn test_case_event_exists(&self, name: &str) -> bool {
        self.test_case_events.contains(name)
    }
}

fn insert_event(
    events: &mut BTreeMap<EventName, Event>,
    event: Event,
) -> Result<(), ConfigurationError> {
    if events.contains_key(&event.name) {
        return Err(ConfigurationError::Duplicate {
            kind: "event",
            name: event.name.to_string(),
        });
    }
    events.insert(event.name.clone(), event);
    Ok(())
}

fn resolve_event(node: &str, definition: EventDefinition) -> Result<Event, ConfigurationError> {
    let scheduling = |operation, target: String, position| -> Result<_, ConfigurationError> {
        Ok(EventKind::Scheduling(SchedulingEvent {
            operation,
            target: EventName::new(target)?,
            position,
            condition: None,
            active: false,
        }))
    };

    let (name, kind) = match definition {
        EventDefinition::StackTrace { name, location } => (
            name,
            EventKind::StackTrace {
                location: StackLocation::parse(&location)?,
            },
        ),
        EventDefinition::Block {
            name,
            target,
            position,
        } => (name, scheduling(SchedulingOperation::Block, target, position)?),
        EventDefinition::Unblock {
            name,
            target,
            position,
        } => (
            name,
            scheduling(SchedulingOperation::Unblock, target, position)?,
        ),
        EventDefinition::GarbageCollection { name } => (name, EventKind::GarbageCollection),
    };

    Ok(Event {
        name: EventName::new(name)?,
        node: Some(node.to_owned()),
        kind,
        depends_on: BTreeSet::new(),
    })
}

/// Pairs each block event with the unblock events of the same node aimed at
/// the same target and position, and marks run-sequence members active.
fn resolve_scheduling(events: &mut BTreeMap<EventName, Event>, run_sequence: &RunSequence) {
    let unblocks = events
        .values()
        .filter_map(|event| {
            let scheduling = event.scheduling()?;
            (scheduling.operation == SchedulingOperation::Unblock).then(|| {
                (
                    (
                        event.node.clone(),
                        scheduling.target.clone(),
                        scheduling.position,
                    ),
                    event.name.clone(),
                )
            })
        })
        .collect::<Vec<_>>();

    for event in events.values_mut() {
        let active = run_sequence.contains(event.name.as_str());
        let node = event.node.clone();
        if let EventKind::Scheduling(scheduling) = &mut event.kind {
            scheduling.active = active;
            if scheduling.operation == SchedulingOperation::Block {
                let condition = unblocks
                    .iter()
                    .filter(|((unblock_node, target, position), _)| {
                        *unblock_node == node
                            && *target == scheduling.target
                            && *position == scheduling.position
                    })
                    .map(|(_, name)| name.clone())
                    .collect::<BTreeSet<_>>();
                scheduling.condition = (!condition.is_empty()).then_some(condition);
            }
        }
    }
}

impl TryFrom<DeploymentDefinition> for Deployment {
    type Error = ConfigurationError;

    fn try_from(definition: DeploymentDefinition) -> Result<Self, Self::Error> {
        let DeploymentDefinition {
            name,
            services: service_definitions,
            nodes: node_definitions,
            test_case_events: test_case_definitions,
            run_sequence,
        } = definition;

        let mut services = BTreeMap::new();
        for service in service_definitions {
            if services.contains_key(&service.name) {
                return Err(ConfigurationError::Duplicate {
                    kind: "service",
                    name: service.name,
                });
            }
            services.insert(service.name.clone(), service);
        }

        let mut events = BTreeMap::new();
        let mut nodes = BTreeMap::new();
        for node in node_definitions {
            if nodes.contains_key(&node.name) {
                return Err(ConfigurationError::Duplicate {
                    kind: "node",
                    name: node.name,
                });
            }
            let mut names = Vec::with_capacity(node.events.len());
            for definition in node.events {
                let event = resolve_event(&node.name, definition)?;
                names.push(event.name.clone());
                insert_event(&mut events, event)?;
            }
            nodes.insert(
                node.name.clone(),
                Node {
                    name: node.name,
                    service: node.service,
                    events: names,
                },
            );
        }

        let mut test_case_events = BTreeSet::new();
        for name in test_case_definitions {
            let name = EventName::new(name)?;
            insert_event(
                &mut events,
                Event {
                    name: name.clone(),
                    node: None,
                    kind: EventKind::TestCase,
                    depends_on: BTreeSet::new(),
                },
            )?;
            test_case_events.insert(name);
        }

        let run_sequence = RunSequence::parse(&run_sequence)?;
        for (name, dependencies) in run_sequence.dependencies() {
            if let Some(event) = events.get_mut(&name) {
                event.depends_on = dependencies;
            }
        }
        resolve_scheduling(&mut events, &run_sequence);

        Ok(Self {
            name,
            services,
            nodes,
            events,
            test_case_events,
            run_sequence,
        })
    }
}

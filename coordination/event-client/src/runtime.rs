use std::{fmt, sync::Arc, time::Duration};

use interleave_core::{EventName, Position};
use interleave_instrumentation::{InstrumentationPlan, Operation, PlanFile};
use tracing::{debug, info, warn};

use crate::{client::CoordinationClient, error::ClientError};

/// State of one invocation of an instrumented method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    stack: Vec<String>,
    allow_blocking: bool,
}

impl Frame {
    /// `stack` is the observed call stack, innermost frame first.
    #[must_use]
    pub fn new<I, S>(stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stack: stack.into_iter().map(Into::into).collect(),
            allow_blocking: false,
        }
    }

    #[must_use]
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    #[must_use]
    pub const fn allows_blocking(&self) -> bool {
        self.allow_blocking
    }

    pub fn allow_blocking(&mut self) {
        self.allow_blocking = true;
    }
}

/// Reclaims memory when a collection event comes up.
pub trait Collector: Send + Sync {
    fn collect(&self);
}

impl<F> Collector for F
where
    F: Fn() + Send + Sync,
{
    fn collect(&self) {
        self();
    }
}

/// Collector that only records the request.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingCollector;

impl Collector for LoggingCollector {
    fn collect(&self) {
        info!("garbage collection requested");
    }
}

/// Executes compiled operations on behalf of instrumented code.
#[derive(Clone)]
pub struct InstrumentedRuntime {
    client: CoordinationClient,
    timeout: Option<Duration>,
    collector: Arc<dyn Collector>,
}

impl fmt::Debug for InstrumentedRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedRuntime")
            .field("client", &self.client)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl InstrumentedRuntime {
    #[must_use]
    pub fn new(client: CoordinationClient, timeout: Option<Duration>) -> Self {
        Self {
            client,
            timeout,
            collector: Arc::new(LoggingCollector),
        }
    }

    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector = collector;
        self
    }

    #[must_use]
    pub const fn client(&self) -> &CoordinationClient {
        &self.client
    }

    pub async fn execute(
        &self,
        frame: &mut Frame,
        operation: &Operation,
    ) -> Result<(), ClientError> {
        match operation {
            Operation::AllowBlocking => {
                frame.allow_blocking();
                Ok(())
            }
            Operation::EnforceOrder { event, location } => {
                if !location.matches(frame.stack()) {
                    debug!(event = %event, "stack does not match, not enforcing");
                    return Ok(());
                }
                self.client.enforce_order(event.as_str(), self.timeout).await
            }
            Operation::BlockUntilReleased { event, location } => {
                if !location.matches(frame.stack()) {
                    debug!(event = %event, "stack does not match, not blocking");
                    return Ok(());
                }
                if !frame.allows_blocking() {
                    warn!(event = %event, "blocking is not allowed in this frame, skipping");
                    return Ok(());
                }
                self.client
                    .block_on_condition(event.as_str(), self.timeout)
                    .await
            }
            Operation::GarbageCollection { event } => {
                self.spawn_collection(event.clone());
                Ok(())
            }
        }
    }

    /// Waits for the turn of `event` off the calling task, collects, then
    /// reports `event`.
    fn spawn_collection(&self, event: EventName) {
        let client = self.client.clone();
        let collector = Arc::clone(&self.collector);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let collected = client
                .enforce_order_with(event.as_str(), timeout, || async move {
                    collector.collect();
                })
                .await;
            if let Err(err) = collected {
                warn!(event = %event, error = %err, "garbage collection event failed");
            }
        });
    }

    /// Runs every operation of `plan` in order.
    pub async fn run_plan(
        &self,
        frame: &mut Frame,
        plan: &InstrumentationPlan,
    ) -> Result<(), ClientError> {
        for operation in &plan.operations {
            self.execute(frame, operation).await?;
        }
        Ok(())
    }

    /// Runs the plan hooked at `position` of the innermost method, if any.
    pub async fn hook(
        &self,
        plans: &PlanFile,
        frame: &mut Frame,
        position: Position,
    ) -> Result<(), ClientError> {
        let Some(method) = frame.stack().first().cloned() else {
            return Ok(());
        };
        let hooked = plans
            .plans
            .iter()
            .find(|plan| plan.point.method == method && plan.point.position == position);
        match hooked {
            Some(plan) => self.run_plan(frame, plan).await,
            None => Ok(()),
        }
    }
}

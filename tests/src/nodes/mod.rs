use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use interleave_core::Position;
use interleave_event_client::{ClientError, CoordinationClient, Frame, InstrumentedRuntime};
use interleave_event_server::Runner;
use interleave_instrumentation::PlanFile;

use crate::common::POLL_INTERVAL;

const NODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Method bodies executed by simulated nodes, in execution order.
#[derive(Clone, Debug, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Stand-in for an instrumented process: it reads the plan file written
/// for its node and runs the hooks around every simulated method call,
/// reaching the coordinator through the published environment.
#[derive(Clone)]
pub struct SimulatedNode {
    name: String,
    plans: Arc<PlanFile>,
    runtime: InstrumentedRuntime,
    trace: Trace,
}

impl SimulatedNode {
    #[must_use]
    pub fn attach(runner: &Runner, name: &str, trace: &Trace) -> Self {
        let plans = PlanFile::load(&runner.plan_files()[name]).unwrap();
        assert_eq!(plans.node, name);

        let environment = runner.node_environment();
        let client = CoordinationClient::from_environment(|key| {
            environment
                .iter()
                .find(|(var, _)| *var == key)
                .map(|(_, value)| value.clone())
        })
        .unwrap()
        .with_poll_interval(POLL_INTERVAL);

        let collector = {
            let (trace, entry) = (trace.clone(), format!("{name}:gc"));
            move || trace.record(entry.clone())
        };
        let runtime = InstrumentedRuntime::new(client, Some(NODE_TIMEOUT))
            .with_collector(Arc::new(collector));

        Self {
            name: name.to_owned(),
            plans: Arc::new(plans),
            runtime,
            trace: trace.clone(),
        }
    }

    /// Runs the process entry point.
    pub async fn start(&self) -> Result<(), ClientError> {
        self.call("main", &[]).await
    }

    /// Calls `method` from `callers`, innermost caller first.
    pub async fn call(&self, method: &str, callers: &[&str]) -> Result<(), ClientError> {
        let mut frame = Frame::new(std::iter::once(method).chain(callers.iter().copied()));
        self.runtime
            .hook(&self.plans, &mut frame, Position::Before)
            .await?;
        self.trace.record(format!("{}:{method}", self.name));
        self.runtime
            .hook(&self.plans, &mut frame, Position::After)
            .await
    }

    /// Same as [`Self::call`] on a separate task.
    #[must_use]
    pub fn spawn_call(
        &self,
        method: &'static str,
        callers: &'static [&'static str],
    ) -> tokio::task::JoinHandle<Result<(), ClientError>> {
        let node = self.clone();
        tokio::spawn(async move { node.call(method, callers).await })
    }
}

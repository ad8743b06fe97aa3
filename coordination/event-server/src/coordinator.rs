use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use interleave_api_common::env::{COORDINATOR_HOST, COORDINATOR_PORT};
use interleave_core::{ConfigurationError, Deployment};
use interleave_instrumentation::InstrumentationError;
use tokio::{
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{error, info};

use crate::{ledger::EventLedger, server::coordination_app};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Instrumentation(#[from] InstrumentationError),
    #[error("event `{0}` is not part of the run sequence")]
    NotInRunSequence(String),
    #[error("event `{0}` is not a test case event")]
    NotTestCaseEvent(String),
    #[error("timed out after {timeout:?} waiting on event `{name}`")]
    Timeout { name: String, timeout: Duration },
    #[error("run sequence did not complete within {0:?}")]
    CompletionTimeout(Duration),
    #[error("no event received for {0:?} while the run sequence is incomplete")]
    Stalled(Duration),
    #[error("failed to bind coordination endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to read the coordination endpoint address: {0}")]
    LocalAddr(#[source] io::Error),
    #[error("coordination endpoint did not start")]
    NotStarted,
}

/// Running coordination endpoint plus the test-driver API over its ledger.
///
/// Dropping the coordinator stops the endpoint.
pub struct Coordinator {
    ledger: Arc<EventLedger>,
    local_addr: SocketAddr,
    poll_interval: Duration,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub async fn start(
        deployment: Arc<Deployment>,
        bind: SocketAddr,
        poll_interval: Duration,
    ) -> Result<Self, CoordinatorError> {
        let listener = Self::bind(bind).await?;
        Self::serve(listener, deployment, poll_interval).await
    }

    /// Reserves the endpoint address without serving yet.
    pub async fn bind(bind: SocketAddr) -> Result<TcpListener, CoordinatorError> {
        TcpListener::bind(bind)
            .await
            .map_err(|source| CoordinatorError::Bind { addr: bind, source })
    }

    /// Serves the coordination endpoint for `deployment` on `listener`.
    pub async fn serve(
        listener: TcpListener,
        deployment: Arc<Deployment>,
        poll_interval: Duration,
    ) -> Result<Self, CoordinatorError> {
        let local_addr = listener.local_addr().map_err(CoordinatorError::LocalAddr)?;
        let ledger = Arc::new(EventLedger::new(deployment));

        let router = coordination_app(Arc::clone(&ledger));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            let server = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
            let _ = ready_tx.send(());
            if let Err(err) = server.await {
                error!(error = %err, "coordination endpoint failed");
            }
        });

        ready_rx.await.map_err(|_| CoordinatorError::NotStarted)?;
        info!(%local_addr, "coordination endpoint listening");

        Ok(Self {
            ledger,
            local_addr,
            poll_interval,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }

    #[must_use]
    pub const fn ledger(&self) -> &Arc<EventLedger> {
        &self.ledger
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Environment that lets an instrumented process reach this endpoint.
    #[must_use]
    pub fn node_environment(&self, advertised_host: &str) -> Vec<(&'static str, String)> {
        vec![
            (COORDINATOR_HOST, advertised_host.to_owned()),
            (COORDINATOR_PORT, self.local_addr.port().to_string()),
        ]
    }

    /// Waits until the prerequisites of `name` have been received.
    pub async fn wait_for(
        &self,
        name: &str,
        include_self: bool,
        timeout: Option<Duration>,
    ) -> Result<(), CoordinatorError> {
        if !self.ledger.deployment().is_in_run_sequence(name) {
            return Err(CoordinatorError::NotInRunSequence(name.to_owned()));
        }
        self.poll_until(name, timeout, || {
            self.ledger.dependencies_met(name, include_self)
        })
        .await
    }

    /// Waits for the prerequisites of the test-case event `name`, runs
    /// `action`, then records `name`. The event has to be part of the run
    /// sequence.
    pub async fn enforce_order<F, Fut, T>(
        &self,
        name: &str,
        timeout: Option<Duration>,
        action: F,
    ) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let deployment = self.ledger.deployment();
        if !deployment.test_case_event_exists(name) {
            return Err(CoordinatorError::NotTestCaseEvent(name.to_owned()));
        }
        if !deployment.is_in_run_sequence(name) {
            return Err(CoordinatorError::NotInRunSequence(name.to_owned()));
        }
        self.poll_until(name, timeout, || self.ledger.dependencies_met(name, false))
            .await?;
        let output = action().await;
        self.ledger.receive(name);
        Ok(output)
    }

    /// Waits until every run-sequence token has been received.
    pub async fn wait_for_run_sequence_completion(
        &self,
        timeout: Option<Duration>,
        stall_timeout: Option<Duration>,
    ) -> Result<(), CoordinatorError> {
        let started = Instant::now();
        loop {
            if self.ledger.is_sequence_complete() {
                info!("run sequence completed");
                return Ok(());
            }
            if let Some(stall_timeout) = stall_timeout {
                if self.ledger.is_stalled(Some(stall_timeout)) {
                    return Err(CoordinatorError::Stalled(stall_timeout));
                }
            }
            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    return Err(CoordinatorError::CompletionTimeout(timeout));
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Stops the endpoint and waits for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        info!("coordination endpoint stopped");
    }

    async fn poll_until(
        &self,
        name: &str,
        deadline: Option<Duration>,
        mut satisfied: impl FnMut() -> bool,
    ) -> Result<(), CoordinatorError> {
        let poll = async {
            while !satisfied() {
                sleep(self.poll_interval).await;
            }
        };
        match deadline {
            None => {
                poll.await;
                Ok(())
            }
            Some(deadline) => timeout(deadline, poll)
                .await
                .map_err(|_| CoordinatorError::Timeout {
                    name: name.to_owned(),
                    timeout: deadline,
                }),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

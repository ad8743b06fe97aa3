use std::{env, future::Future, time::Duration};

use interleave_api_common::{
    bodies::{DependencyQuery, EventReceipt},
    env::{COORDINATOR_HOST, COORDINATOR_PORT},
    paths::segments,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::ClientError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// HTTP client of the coordination endpoint.
///
/// Checks never block on the server; every wait is a sleep-then-retry loop
/// on this side.
#[derive(Clone, Debug)]
pub struct CoordinationClient {
    base_url: Url,
    client: Client,
    poll_interval: Duration,
}

impl CoordinationClient {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_host(host: &str, port: u16) -> Result<Self, ClientError> {
        Ok(Self::new(Url::parse(&format!("http://{host}:{port}"))?))
    }

    /// Builds a client from the environment published by the coordinator.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_environment(|name| env::var(name).ok())
    }

    /// Builds a client from the coordinator's environment as seen through
    /// `lookup`.
    pub fn from_environment(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let host =
            lookup(COORDINATOR_HOST).ok_or(ClientError::MissingEnvironment(COORDINATOR_HOST))?;
        let port =
            lookup(COORDINATOR_PORT).ok_or(ClientError::MissingEnvironment(COORDINATOR_PORT))?;
        let port = port.parse().map_err(|_| ClientError::InvalidEnvironment {
            name: COORDINATOR_PORT,
            value: port.clone(),
        })?;
        Self::from_host(&host, port)
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn dependencies_met(
        &self,
        name: &str,
        include_self: bool,
    ) -> Result<bool, ClientError> {
        let url = self.endpoint(&[segments::DEPENDENCIES, name])?;
        Self::check(self.client.get(url).query(&DependencyQuery::new(include_self)))
            .await
    }

    pub async fn blocking_dependencies_met(&self, name: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&[segments::BLOCK_DEPENDENCIES, name])?;
        Self::check(self.client.get(url)).await
    }

    pub async fn has_received(&self, name: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&[segments::EVENTS, name])?;
        Self::check(self.client.get(url)).await
    }

    /// Submits `name` as received. Resubmission is a no-op on the server.
    pub async fn report(&self, name: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&[segments::EVENTS])?;
        self.client
            .post(url)
            .json(&EventReceipt::new(name))
            .send()
            .await?
            .error_for_status()?;
        info!(event = name, "event reported");
        Ok(())
    }

    /// Waits until the prerequisites of `name` (and `name` itself with
    /// `include_self`) have been received.
    pub async fn block_and_poll(
        &self,
        name: &str,
        include_self: bool,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        self.poll_until(name, timeout, || self.dependencies_met(name, include_self))
            .await
    }

    /// Waits until the blocking condition of the block event `name` holds.
    pub async fn block_on_condition(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        self.poll_until(name, timeout, || self.blocking_dependencies_met(name))
            .await
    }

    pub async fn enforce_order(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        self.enforce_order_with(name, timeout, || async {}).await
    }

    /// Waits for the prerequisites of `name`, runs `action`, then reports
    /// `name`. The action's output is handed back to the caller.
    pub async fn enforce_order_with<F, Fut, T>(
        &self,
        name: &str,
        timeout: Option<Duration>,
        action: F,
    ) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
    {
        self.block_and_poll(name, false, timeout).await?;
        let output = action().await;
        self.report(name).await?;
        Ok(output)
    }

    /// `base_url` extended by `segments`, each percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::CannotBeABase(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(request: RequestBuilder) -> Result<bool, ClientError> {
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    async fn poll_until<F, Fut>(
        &self,
        name: &str,
        deadline: Option<Duration>,
        mut check: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ClientError>>,
    {
        let mut last_transport_error = None;
        let poll = async {
            loop {
                match check().await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {
                        last_transport_error = None;
                        debug!(event = name, "waiting on coordinator");
                    }
                    Err(ClientError::Transport(err)) => {
                        warn!(event = name, error = %err, "coordinator request failed, retrying");
                        last_transport_error = Some(err);
                    }
                    Err(err) => return Err(err),
                }
                sleep(self.poll_interval).await;
            }
        };

        let Some(deadline) = deadline else {
            return poll.await;
        };
        let outcome = timeout(deadline, poll).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(last_transport_error.map_or_else(
                || ClientError::Timeout {
                    name: name.to_owned(),
                    timeout: deadline,
                },
                |source| ClientError::Unreachable {
                    name: name.to_owned(),
                    source,
                },
            )),
        }
    }
}

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use interleave_core::{Deployment, verify};
use interleave_instrumentation::{InstrumentationEngine, NodeWorkspace};
use tracing::info;

use crate::{
    config::CoordinatorConfig,
    coordinator::{Coordinator, CoordinatorError},
};

/// One deployment run: verified, instrumented and coordinated.
pub struct Runner {
    deployment: Arc<Deployment>,
    coordinator: Coordinator,
    plan_files: BTreeMap<String, PathBuf>,
    config: CoordinatorConfig,
}

impl Runner {
    pub async fn start(
        deployment: Deployment,
        config: CoordinatorConfig,
    ) -> Result<Self, CoordinatorError> {
        Self::start_with(deployment, config, &InstrumentationEngine::default()).await
    }

    /// Verifies the deployment, reserves the endpoint address, writes every
    /// node's instrumentation plan and starts the coordinator. Nothing is
    /// written or started when an earlier step fails.
    pub async fn start_with(
        deployment: Deployment,
        config: CoordinatorConfig,
        engine: &InstrumentationEngine,
    ) -> Result<Self, CoordinatorError> {
        verify(&deployment)?;
        let listener = Coordinator::bind(config.bind).await?;

        let workspaces = deployment
            .nodes()
            .map(|node| {
                (
                    node.name.clone(),
                    NodeWorkspace::new(&node.name, config.plan_directory.join(&node.name)),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let plan_files = engine.instrument(&deployment, &workspaces)?;

        let deployment = Arc::new(deployment);
        let coordinator =
            Coordinator::serve(listener, Arc::clone(&deployment), config.poll_interval).await?;
        info!(
            deployment = deployment.name(),
            nodes = workspaces.len(),
            instrumented = plan_files.len(),
            "deployment run started"
        );

        Ok(Self {
            deployment,
            coordinator,
            plan_files,
            config,
        })
    }

    #[must_use]
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    #[must_use]
    pub const fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Plan file written for each instrumented node.
    #[must_use]
    pub const fn plan_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.plan_files
    }

    #[must_use]
    pub fn node_environment(&self) -> Vec<(&'static str, String)> {
        self.coordinator.node_environment(&self.config.advertised_host)
    }

    /// Waits for the run sequence with the configured completion and stall
    /// timeouts.
    pub async fn wait_for_completion(&self) -> Result<(), CoordinatorError> {
        self.coordinator
            .wait_for_run_sequence_completion(
                self.config.completion_timeout,
                self.config.stall_timeout,
            )
            .await
    }

    pub async fn stop(self) {
        self.coordinator.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, TcpListener};

    use interleave_core::{ConfigurationError, NodeDefinition, Service, ServiceKind};
    use interleave_instrumentation::{InstrumentationError, PlanFile};

    use super::*;

    fn config(plan_directory: PathBuf) -> CoordinatorConfig {
        CoordinatorConfig {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            plan_directory,
            ..CoordinatorConfig::default()
        }
    }

    #[tokio::test]
    async fn writes_plans_then_serves() {
        let dir = tempfile::tempdir().unwrap();
        let deployment = Deployment::builder("d")
            .service(Service::new("s1", ServiceKind::Java))
            .node(NodeDefinition::new("n1", "s1").stack_trace("e1", "app::run"))
            .node(NodeDefinition::new("n2", "s1").stack_trace("e2", "main"))
            .run_sequence("e2 * e1")
            .build()
            .unwrap();

        let runner = Runner::start(deployment, config(dir.path().to_owned()))
            .await
            .unwrap();

        let plan = PlanFile::load(&runner.plan_files()["n2"]).unwrap();
        assert!(plan.plans[0].point.is_entry());
        assert_eq!(runner.plan_files().len(), 2);
        assert_eq!(
            runner.node_environment()[1].1,
            runner.coordinator().local_addr().port().to_string()
        );
        runner.stop().await;
    }

    #[tokio::test]
    async fn verification_failure_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let deployment = Deployment::builder("d")
            .node(NodeDefinition::new("n1", "missing").stack_trace("e1", "app::run"))
            .run_sequence("e1")
            .build()
            .unwrap();

        let result = Runner::start(deployment, config(dir.path().join("plans"))).await;

        assert!(matches!(
            result,
            Err(CoordinatorError::Configuration(ConfigurationError::BadReference { .. }))
        ));
        assert!(!dir.path().join("plans").exists());
    }

    #[tokio::test]
    async fn unsupported_service_kind_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let deployment = Deployment::builder("d")
            .service(Service::new("s1", ServiceKind::Other))
            .node(NodeDefinition::new("n1", "s1").stack_trace("e1", "app::run"))
            .run_sequence("e1")
            .build()
            .unwrap();

        let result = Runner::start(deployment, config(dir.path().join("plans"))).await;

        assert!(matches!(
            result,
            Err(CoordinatorError::Instrumentation(InstrumentationError::NoInstrumentor { .. }))
        ));
        assert!(!dir.path().join("plans").exists());
    }

    #[tokio::test]
    async fn busy_address_writes_no_plans() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let deployment = Deployment::builder("d")
            .service(Service::new("s1", ServiceKind::Native))
            .node(NodeDefinition::new("n1", "s1").stack_trace("e1", "app::run"))
            .run_sequence("e1")
            .build()
            .unwrap();
        let config = CoordinatorConfig {
            bind: occupied.local_addr().unwrap(),
            ..config(dir.path().join("plans"))
        };

        let result = Runner::start(deployment, config).await;

        assert!(matches!(result, Err(CoordinatorError::Bind { .. })));
        assert!(!dir.path().join("plans").exists());
    }
}

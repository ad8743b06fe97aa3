use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use interleave_core::{ConfigurationError, Deployment, ServiceKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    compiler::compile, error::InstrumentationError, operation::InstrumentationPlan,
    requests::node_requests,
};

pub const PLAN_FILE_NAME: &str = "instrumentation-plan.json";

/// Directory holding the artefacts of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeWorkspace {
    pub node: String,
    pub root: PathBuf,
}

impl NodeWorkspace {
    #[must_use]
    pub fn new(node: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            node: node.into(),
            root: root.into(),
        }
    }

    #[must_use]
    pub fn plan_file(&self) -> PathBuf {
        self.root.join(PLAN_FILE_NAME)
    }
}

/// Applies compiled plans to a node's artefacts.
pub trait Instrumentor: Send + Sync {
    /// Returns the path of the instrumented artefact.
    fn instrument(
        &self,
        workspace: &NodeWorkspace,
        plans: &[InstrumentationPlan],
    ) -> Result<PathBuf, InstrumentationError>;
}

/// On-disk format consumed by the binary patchers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFile {
    pub node: String,
    pub plans: Vec<InstrumentationPlan>,
}

impl PlanFile {
    pub fn load(path: &Path) -> Result<Self, InstrumentationError> {
        let bytes = fs::read(path).map_err(|source| InstrumentationError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Writes the plans next to the node's artefacts as [`PLAN_FILE_NAME`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanFileInstrumentor;

impl Instrumentor for PlanFileInstrumentor {
    fn instrument(
        &self,
        workspace: &NodeWorkspace,
        plans: &[InstrumentationPlan],
    ) -> Result<PathBuf, InstrumentationError> {
        let io_error = |path: &Path| {
            let path = path.to_owned();
            move |source: io::Error| InstrumentationError::Io { path, source }
        };

        fs::create_dir_all(&workspace.root).map_err(io_error(&workspace.root))?;
        let path = workspace.plan_file();
        let encoded = serde_json::to_vec_pretty(&PlanFile {
            node: workspace.node.clone(),
            plans: plans.to_vec(),
        })?;
        fs::write(&path, encoded).map_err(io_error(&path))?;

        debug!(node = %workspace.node, path = %path.display(), "wrote instrumentation plan");
        Ok(path)
    }
}

/// Instrumentors keyed by service kind.
#[derive(Clone)]
pub struct InstrumentationEngine {
    instrumentors: HashMap<ServiceKind, Arc<dyn Instrumentor>>,
}

impl Default for InstrumentationEngine {
    fn default() -> Self {
        let plan_file: Arc<dyn Instrumentor> = Arc::new(PlanFileInstrumentor);
        Self::empty()
            .with_instrumentor(ServiceKind::Native, Arc::clone(&plan_file))
            .with_instrumentor(ServiceKind::Java, Arc::clone(&plan_file))
            .with_instrumentor(ServiceKind::Scala, plan_file)
    }
}

impl InstrumentationEngine {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            instrumentors: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_instrumentor(
        mut self,
        kind: ServiceKind,
        instrumentor: Arc<dyn Instrumentor>,
    ) -> Self {
        self.instrumentors.insert(kind, instrumentor);
        self
    }

    #[must_use]
    pub fn instrumentor(&self, kind: ServiceKind) -> Option<&Arc<dyn Instrumentor>> {
        self.instrumentors.get(&kind)
    }

    /// Compiles the plans of every node that owns instrumented events.
    ///
    /// Fails before anything is written when a node's service is unknown or
    /// its service kind has no instrumentor.
    pub fn compile_nodes(
        &self,
        deployment: &Deployment,
    ) -> Result<BTreeMap<String, Vec<InstrumentationPlan>>, InstrumentationError> {
        let mut compiled = BTreeMap::new();
        for (node_name, requests) in node_requests(deployment)? {
            let kind = service_kind(deployment, &node_name)?;
            if self.instrumentor(kind).is_none() {
                return Err(InstrumentationError::NoInstrumentor {
                    node: node_name,
                    kind,
                });
            }
            compiled.insert(node_name, compile(requests));
        }
        Ok(compiled)
    }

    /// Compiles and applies the plans of every instrumented node. Returns
    /// the instrumented artefact of each node.
    pub fn instrument(
        &self,
        deployment: &Deployment,
        workspaces: &BTreeMap<String, NodeWorkspace>,
    ) -> Result<BTreeMap<String, PathBuf>, InstrumentationError> {
        let compiled = self.compile_nodes(deployment)?;
        if let Some(node) = compiled.keys().find(|node| !workspaces.contains_key(*node)) {
            return Err(InstrumentationError::MissingWorkspace(node.clone()));
        }

        let mut artefacts = BTreeMap::new();
        for (node_name, plans) in compiled {
            let kind = service_kind(deployment, &node_name)?;
            let instrumentor = self
                .instrumentor(kind)
                .ok_or_else(|| InstrumentationError::NoInstrumentor {
                    node: node_name.clone(),
                    kind,
                })?;
            let workspace = &workspaces[&node_name];
            let artefact = instrumentor.instrument(workspace, &plans)?;
            info!(node = %node_name, plans = plans.len(), "node instrumented");
            artefacts.insert(node_name, artefact);
        }
        Ok(artefacts)
    }
}

fn service_kind(
    deployment: &Deployment,
    node_name: &str,
) -> Result<ServiceKind, InstrumentationError> {
    let node = deployment.node(node_name).ok_or_else(|| {
        ConfigurationError::bad_reference("node", node_name, "deployment", deployment.name())
    })?;
    let service = deployment.service(&node.service).ok_or_else(|| {
        ConfigurationError::bad_reference("service", &node.service, "node", &node.name)
    })?;
    Ok(service.kind)
}

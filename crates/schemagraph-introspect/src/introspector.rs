//! Driver registry and the introspection entry point.

use std::collections::HashMap;
use std::sync::Arc;

use schemagraph_core::{DiagramGraph, EngineKind};

use crate::descriptor::ConnectionDescriptor;
use crate::document::introspect_documents;
use crate::drivers::{MongodbDriver, MysqlDriver, PostgresDriver, SqliteDriver};
use crate::error::IntrospectError;
use crate::layout::GridLayout;
use crate::relational::introspect_catalog;
use crate::scoped::{CancelToken, Scoped};
use crate::source::{Driver, Session, TunnelOpener};
use crate::tunnel::SshTunnelOpener;

/// Knobs shared by both introspection variants.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectOptions {
    pub layout: GridLayout,
    /// Run naming-convention relationship inference.
    pub infer_relationships: bool,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        IntrospectOptions {
            layout: GridLayout::default(),
            infer_relationships: true,
        }
    }
}

/// Connects to external engines and turns their structure into diagrams.
///
/// Each call is an independent session: nothing is shared between
/// concurrent runs except the (stateless) drivers.
#[derive(Clone, Default)]
pub struct Introspector {
    drivers: HashMap<EngineKind, Arc<dyn Driver>>,
    tunnels: Option<Arc<dyn TunnelOpener>>,
    options: IntrospectOptions,
}

impl Introspector {
    /// An introspector with no drivers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// An introspector with a driver for every engine kind and SSH tunnels.
    pub fn with_builtin_drivers() -> Self {
        Self::new()
            .with_driver(EngineKind::Sqlite, SqliteDriver)
            .with_driver(EngineKind::Postgresql, PostgresDriver::default())
            .with_driver(EngineKind::Mysql, MysqlDriver::default())
            .with_driver(EngineKind::Mongodb, MongodbDriver::default())
            .with_tunnel_opener(SshTunnelOpener::default())
    }

    pub fn with_driver(mut self, kind: EngineKind, driver: impl Driver + 'static) -> Self {
        self.drivers.insert(kind, Arc::new(driver));
        self
    }

    pub fn with_tunnel_opener(mut self, opener: impl TunnelOpener + 'static) -> Self {
        self.tunnels = Some(Arc::new(opener));
        self
    }

    pub fn with_options(mut self, options: IntrospectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn supports(&self, kind: EngineKind) -> bool {
        self.drivers.contains_key(&kind)
    }

    /// Introspects without a way to cancel.
    pub fn introspect(&self, descriptor: &ConnectionDescriptor) -> Result<DiagramGraph, IntrospectError> {
        self.introspect_with_cancel(descriptor, &CancelToken::new())
    }

    /// Introspects the engine `descriptor` points at.
    ///
    /// The tunnel (if any) and the session are released on every path,
    /// session first. Release failures are logged and never replace the
    /// result of the run.
    pub fn introspect_with_cancel(
        &self,
        descriptor: &ConnectionDescriptor,
        cancel: &CancelToken,
    ) -> Result<DiagramGraph, IntrospectError> {
        let kind = descriptor.engine_kind;
        let driver = self
            .drivers
            .get(&kind)
            .ok_or(IntrospectError::UnsupportedEngine(kind))?;
        cancel.check()?;

        tracing::info!(target_db = %descriptor.redacted(), "introspection started");

        let target = descriptor.endpoint();
        let tunnel = match &descriptor.tunnel {
            None => None,
            Some(hop) => {
                let opener = self.tunnels.as_ref().ok_or_else(|| {
                    IntrospectError::Connection(format!(
                        "tunnel via {} requested but no tunnel opener is configured",
                        hop.host
                    ))
                })?;
                Some(Scoped::new(opener.open(hop, &target)?))
            }
        };
        let endpoint = match &tunnel {
            Some(tunnel) => tunnel.get().local_endpoint(),
            None => target,
        };

        let result = self.run_session(driver.as_ref(), descriptor, &endpoint, cancel);

        if let Some(tunnel) = tunnel {
            tunnel.release();
        }

        match &result {
            Ok(graph) => tracing::info!(
                target_db = %descriptor.redacted(),
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "introspection finished"
            ),
            Err(err) => tracing::warn!(target_db = %descriptor.redacted(), error = %err, "introspection failed"),
        }
        result
    }

    fn run_session(
        &self,
        driver: &dyn Driver,
        descriptor: &ConnectionDescriptor,
        endpoint: &crate::descriptor::Endpoint,
        cancel: &CancelToken,
    ) -> Result<DiagramGraph, IntrospectError> {
        cancel.check()?;
        let kind = descriptor.engine_kind;

        match driver.connect(descriptor, endpoint)? {
            Session::Document(source) => {
                let mut session = Scoped::new(source);
                let graph = introspect_documents(session.get_mut(), kind, &self.options, cancel);
                session.release();
                graph
            }
            Session::Relational(source) => {
                let mut session = Scoped::new(source);
                let graph = introspect_catalog(session.get_mut(), kind, &self.options, cancel);
                session.release();
                graph
            }
        }
    }
}

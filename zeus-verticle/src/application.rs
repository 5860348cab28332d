//! Application bootstrap
//!
//! Wires configuration, metrics, the verticle runtime, discovery and the
//! deployer into one container, then deploys everything when the container
//! is refreshed.
//!
//! ```no_run
//! use zeus_verticle::{Application, ScanDeclaration};
//!
//! # async fn example() -> Result<(), zeus_verticle::VerticleError> {
//! let app = Application::builder()
//!     .scan(ScanDeclaration::new(module_path!()).base_package("my_app::api"))
//!     .event_loops(4)
//!     .build()?;
//!
//! // Deploys, then waits for ctrl-c or the first fatal deployment failure
//! app.run().await
//! # }
//! ```

use crate::deployer::{FatalErrors, VerticleDeployer};
use crate::descriptor::VerticleController;
use crate::discovery::{Discovery, ScanDeclaration, VerticleType};
use crate::error::VerticleError;
use crate::http_verticle::{HttpVerticle, ServerRegistry};
use crate::registry::CandidateRegistry;
use crate::runtime::{Runtime, RuntimeOptions};
use std::sync::Arc;
use tracing::{debug, error, info};
use zeus_config::ConfigManager;
use zeus_core::{Container, ContainerRefreshed, EventMulticaster, Injectable};
use zeus_metrics::MeterRegistry;

/// Builder for [`Application`]
#[derive(Default)]
pub struct ApplicationBuilder {
    container: Option<Container>,
    config: Option<ConfigManager>,
    runtime_options: RuntimeOptions,
    metrics: Option<MeterRegistry>,
    scans: Vec<ScanDeclaration>,
    verticles: Vec<VerticleType>,
}

impl ApplicationBuilder {
    /// Use an existing container instead of a fresh one
    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn config(mut self, config: ConfigManager) -> Self {
        self.config = Some(config);
        self
    }

    pub fn runtime_options(mut self, options: RuntimeOptions) -> Self {
        self.runtime_options = options;
        self
    }

    pub fn event_loops(mut self, size: usize) -> Self {
        self.runtime_options = self.runtime_options.with_event_loops(size);
        self
    }

    /// Register a meter registry; HTTP verticles record into it
    pub fn metrics(mut self, metrics: MeterRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scan(mut self, declaration: ScanDeclaration) -> Self {
        self.scans.push(declaration);
        self
    }

    /// Deploy `T` without going through discovery
    pub fn verticle<T>(mut self) -> Self
    where
        T: HttpVerticle + VerticleController + Injectable,
    {
        self.verticles.push(VerticleType::of::<T>());
        self
    }

    pub fn build(self) -> Result<Application, VerticleError> {
        let container = self.container.unwrap_or_default();

        match self.config {
            Some(config) => container.register(config),
            None if !container.has::<ConfigManager>() => container.register(ConfigManager::new()),
            None => {}
        }
        if let Some(metrics) = self.metrics {
            container.register(metrics);
        }

        let runtime = Runtime::new(self.runtime_options)?;
        container.register(runtime.clone());
        container.resolve_or_register(ServerRegistry::new)?;

        let registry = container.resolve_or_register(CandidateRegistry::new)?;
        let discovery = Discovery::new(registry.clone());
        for declaration in &self.scans {
            discovery.scan(declaration)?;
        }
        for verticle in self.verticles {
            discovery.register_type(verticle);
        }
        debug!(candidates = registry.len(), "Verticle discovery complete");

        let (deployer, fatal) = VerticleDeployer::new(registry, runtime.clone());
        let deployer = Arc::new(deployer);
        container.register_arc(deployer.clone());

        let events = container.resolve_or_register(EventMulticaster::new)?;
        events.add_listener::<ContainerRefreshed, _>(deployer.clone());

        Ok(Application {
            container,
            runtime,
            events,
            deployer,
            fatal,
        })
    }
}

/// A wired application ready to deploy its verticles
pub struct Application {
    container: Container,
    runtime: Runtime,
    events: Arc<EventMulticaster>,
    deployer: Arc<VerticleDeployer>,
    fatal: FatalErrors,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn deployer(&self) -> &Arc<VerticleDeployer> {
        &self.deployer
    }

    /// Fatal deployment failures reported so far
    pub fn fatal_errors(&mut self) -> &mut FatalErrors {
        &mut self.fatal
    }

    /// Publish [`ContainerRefreshed`], deploying every pending verticle
    pub fn refresh(&self) -> Result<(), VerticleError> {
        self.events
            .publish(&ContainerRefreshed::new(self.container.clone()))?;
        Ok(())
    }

    /// Deploy, then run until ctrl-c or the first fatal deployment failure
    pub async fn run(mut self) -> Result<(), VerticleError> {
        self.refresh()?;
        info!(
            event_loops = self.runtime.event_loop_count(),
            "Application started"
        );

        let failure = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                None
            }
            Some(err) = self.fatal.next() => Some(err),
        };

        let stopped = self.shutdown().await;
        match failure {
            Some(err) => {
                error!(error = %err, "Application stopped after a fatal deployment failure");
                Err(err)
            }
            None => stopped,
        }
    }

    /// Undeploy everything and stop the runtime
    pub async fn shutdown(&self) -> Result<(), VerticleError> {
        self.runtime.close().await?;
        info!("Application stopped");
        Ok(())
    }
}

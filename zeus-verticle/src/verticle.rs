// Verticle trait and per-instance context

use crate::runtime::DeploymentId;
use async_trait::async_trait;
use tokio::sync::watch;
use zeus_core::Error;

/// A deployable unit bound to one event loop.
///
/// `start` runs on the event loop the instance was assigned to; anything it
/// spawns with `tokio::spawn` stays on that loop.
#[async_trait]
pub trait Verticle: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn start(&mut self, ctx: &VerticleContext) -> Result<(), Error>;

    async fn stop(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// What an instance knows about its own deployment
#[derive(Debug, Clone)]
pub struct VerticleContext {
    deployment_id: DeploymentId,
    instance: usize,
    instances: usize,
    event_loop: usize,
    shutdown: watch::Receiver<bool>,
}

impl VerticleContext {
    pub(crate) fn new(
        deployment_id: DeploymentId,
        instance: usize,
        instances: usize,
        event_loop: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            deployment_id,
            instance,
            instances,
            event_loop,
            shutdown,
        }
    }

    pub fn deployment_id(&self) -> DeploymentId {
        self.deployment_id
    }

    /// Index of this instance within its deployment
    pub fn instance(&self) -> usize {
        self.instance
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    /// Index of the event loop running this instance
    pub fn event_loop(&self) -> usize {
        self.event_loop
    }

    /// A signal that fires when the deployment is undeployed
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait until shutdown is requested (or the runtime went away)
    pub async fn wait(&mut self) {
        // A closed channel means the deployment is gone.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }
}

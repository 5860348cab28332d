//! Verticle runtime
//!
//! A fixed pool of event loops, each a single-threaded tokio runtime on its
//! own OS thread. Deploying a verticle starts the requested number of
//! instances, assigned round-robin across the pool, and resolves a
//! [`DeploymentHandle`] once every instance started (or one failed).
//!
//! ```no_run
//! use std::sync::Arc;
//! use zeus_verticle::{DeploymentOptions, Runtime, RuntimeOptions, Verticle, VerticleContext};
//!
//! struct Ticker;
//!
//! #[async_trait::async_trait]
//! impl Verticle for Ticker {
//!     async fn start(&mut self, _ctx: &VerticleContext) -> Result<(), zeus_core::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Runtime::new(RuntimeOptions::default().with_event_loops(2))?;
//! let id = runtime
//!     .deploy(Arc::new(|| Ok(Box::new(Ticker) as Box<dyn Verticle>)), DeploymentOptions::new().with_instances(4))
//!     .await?;
//! runtime.undeploy(id).await?;
//! runtime.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::RuntimeError;
use crate::verticle::{Verticle, VerticleContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeus_core::Provider;

/// Builds one verticle instance; called once per instance
pub type VerticleFactory =
    Arc<dyn Fn() -> Result<Box<dyn Verticle>, zeus_core::Error> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentOptions {
    pub instances: usize,
}

impl DeploymentOptions {
    pub fn new() -> Self {
        Self { instances: 1 }
    }

    pub fn with_instances(mut self, instances: usize) -> Self {
        self.instances = instances;
        self
    }
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub event_loop_pool_size: usize,
    pub thread_name_prefix: String,
}

impl RuntimeOptions {
    pub fn with_event_loops(mut self, size: usize) -> Self {
        self.event_loop_pool_size = size;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

impl Default for RuntimeOptions {
    /// Two event loops per available core
    fn default() -> Self {
        Self {
            event_loop_pool_size: std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(2),
            thread_name_prefix: "zeus-event-loop".to_string(),
        }
    }
}

/// Outcome of a deployment, available once all instances started
pub struct DeploymentHandle {
    rx: oneshot::Receiver<Result<DeploymentId, RuntimeError>>,
}

impl DeploymentHandle {
    fn resolved(result: Result<DeploymentId, RuntimeError>) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is held right here.
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for DeploymentHandle {
    type Output = Result<DeploymentId, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(RuntimeError::Closed)))
    }
}

struct EventLoop {
    handle: Handle,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl EventLoop {
    fn spawn(name: String) -> Result<Self, RuntimeError> {
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new().name(name).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = handle_tx.send(Err(e));
                    return;
                }
            };
            if handle_tx.send(Ok(runtime.handle().clone())).is_err() {
                return;
            }
            runtime.block_on(async {
                let _ = stop_rx.await;
            });
        })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| std::io::Error::other("event loop thread exited during startup"))??;

        Ok(Self {
            handle,
            stop: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    fn shutdown(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.get_mut().take()
            && thread.thread().id() != std::thread::current().id()
            && thread.join().is_err()
        {
            warn!("Event loop thread panicked");
        }
    }
}

struct Instance {
    event_loop: usize,
    verticle: Box<dyn Verticle>,
}

struct Deployment {
    shutdown: watch::Sender<bool>,
    instances: Vec<Instance>,
}

struct RuntimeInner {
    event_loops: Vec<EventLoop>,
    next_loop: AtomicUsize,
    deployments: Mutex<HashMap<DeploymentId, Deployment>>,
    closed: AtomicBool,
}

impl RuntimeInner {
    /// Record a started deployment, handing it back if the runtime closed.
    ///
    /// `closed` is read under the deployments lock, which `close` also holds
    /// while flipping it, so a deployment is either swept by `close` or
    /// refused here.
    fn register(&self, id: DeploymentId, deployment: Deployment) -> Result<(), Deployment> {
        let mut deployments = self.deployments.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(deployment);
        }
        deployments.insert(id, deployment);
        Ok(())
    }
}

/// Event-loop pool that deploys verticles
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Result<Self, RuntimeError> {
        let size = options.event_loop_pool_size.max(1);
        let event_loops = (0..size)
            .map(|i| EventLoop::spawn(format!("{}-{}", options.thread_name_prefix, i)))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(event_loops = size, "Verticle runtime started");
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                event_loops,
                next_loop: AtomicUsize::new(0),
                deployments: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn event_loop_count(&self) -> usize {
        self.inner.event_loops.len()
    }

    fn next_event_loop(&self) -> usize {
        self.inner.next_loop.fetch_add(1, Ordering::Relaxed) % self.inner.event_loops.len()
    }

    /// Run a future on the next event loop
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let index = self.next_event_loop();
        self.inner.event_loops[index].handle.spawn(future)
    }

    /// Start `options.instances` instances built by `factory`.
    ///
    /// Returns immediately; the handle resolves once the deployment settled.
    /// If any instance fails to start, those already started are stopped and
    /// the first failure is reported.
    pub fn deploy(&self, factory: VerticleFactory, options: DeploymentOptions) -> DeploymentHandle {
        if self.inner.closed.load(Ordering::Acquire) {
            return DeploymentHandle::resolved(Err(RuntimeError::Closed));
        }
        if options.instances == 0 {
            return DeploymentHandle::resolved(Err(RuntimeError::InvalidInstances(0)));
        }

        let id = DeploymentId::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let placements: Vec<usize> = (0..options.instances)
            .map(|_| self.next_event_loop())
            .collect();

        let starts: Vec<(usize, JoinHandle<Result<Box<dyn Verticle>, RuntimeError>>)> = placements
            .iter()
            .enumerate()
            .map(|(instance, &event_loop)| {
                let factory = factory.clone();
                let ctx = VerticleContext::new(
                    id,
                    instance,
                    options.instances,
                    event_loop,
                    shutdown_rx.clone(),
                );
                let start = self.inner.event_loops[event_loop].handle.spawn(async move {
                    let mut verticle =
                        factory().map_err(|source| RuntimeError::Start { instance, source })?;
                    verticle
                        .start(&ctx)
                        .await
                        .map_err(|source| RuntimeError::Start { instance, source })?;
                    Ok(verticle)
                });
                (event_loop, start)
            })
            .collect();

        let (tx, rx) = oneshot::channel();
        let runtime = Arc::downgrade(&self.inner);
        self.inner.event_loops[placements[0]].handle.spawn(async move {
            let result = settle_deployment(runtime, id, shutdown_tx, starts).await;
            let _ = tx.send(result);
        });

        debug!(deployment = %id, instances = options.instances, "Deployment submitted");
        DeploymentHandle { rx }
    }

    /// Stop every instance of a deployment
    pub async fn undeploy(&self, id: DeploymentId) -> Result<(), RuntimeError> {
        let deployment = self
            .inner
            .deployments
            .lock()
            .remove(&id)
            .ok_or(RuntimeError::UnknownDeployment(id))?;

        let _ = deployment.shutdown.send(true);
        let result = stop_instances(&self.inner, deployment.instances).await;
        info!(deployment = %id, "Deployment undeployed");
        result
    }

    /// Undeploy everything, reporting the first failure
    pub async fn undeploy_all(&self) -> Result<(), RuntimeError> {
        let mut result = Ok(());
        for id in self.deployment_ids() {
            let outcome = self.undeploy(id).await;
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }

    pub fn deployment_ids(&self) -> Vec<DeploymentId> {
        self.inner.deployments.lock().keys().copied().collect()
    }

    pub fn deployment_count(&self) -> usize {
        self.inner.deployments.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Undeploy everything and stop the event loops
    pub async fn close(&self) -> Result<(), RuntimeError> {
        {
            let _deployments = self.inner.deployments.lock();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }

        let result = self.undeploy_all().await;
        for event_loop in &self.inner.event_loops {
            event_loop.shutdown();
        }
        info!("Verticle runtime closed");
        result
    }
}

impl Provider for Runtime {}

async fn settle_deployment(
    runtime: Weak<RuntimeInner>,
    id: DeploymentId,
    shutdown: watch::Sender<bool>,
    starts: Vec<(usize, JoinHandle<Result<Box<dyn Verticle>, RuntimeError>>)>,
) -> Result<DeploymentId, RuntimeError> {
    let (event_loops, joins): (Vec<usize>, Vec<_>) = starts.into_iter().unzip();
    let outcomes = futures::future::join_all(joins).await;

    let mut started = Vec::with_capacity(outcomes.len());
    let mut failure = None;
    for (instance, (event_loop, outcome)) in event_loops.into_iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(Ok(verticle)) => started.push(Instance {
                event_loop,
                verticle,
            }),
            Ok(Err(err)) => {
                failure.get_or_insert(err);
            }
            Err(join) if join.is_cancelled() => {
                failure.get_or_insert(RuntimeError::Closed);
            }
            Err(_) => {
                failure.get_or_insert(RuntimeError::Panicked { instance });
            }
        }
    }

    let Some(runtime) = runtime.upgrade() else {
        return Err(RuntimeError::Closed);
    };

    let (err, deployment) = match failure {
        Some(err) => (
            err,
            Deployment {
                shutdown,
                instances: started,
            },
        ),
        None => match runtime.register(
            id,
            Deployment {
                shutdown,
                instances: started,
            },
        ) {
            Ok(()) => return Ok(id),
            Err(refused) => (RuntimeError::Closed, refused),
        },
    };

    let _ = deployment.shutdown.send(true);
    if let Err(stop_err) = stop_instances(&runtime, deployment.instances).await {
        warn!(deployment = %id, error = %stop_err, "Failed to stop instances of a failed deployment");
    }
    Err(err)
}

async fn stop_instances(runtime: &RuntimeInner, instances: Vec<Instance>) -> Result<(), RuntimeError> {
    let stops: Vec<_> = instances
        .into_iter()
        .map(|Instance { event_loop, mut verticle }| {
            runtime.event_loops[event_loop]
                .handle
                .spawn(async move { verticle.stop().await })
        })
        .collect();

    let mut result = Ok(());
    for outcome in futures::future::join_all(stops).await {
        let err = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => RuntimeError::Stop { source },
            Err(_) => RuntimeError::Stop {
                source: zeus_core::Error::Internal("verticle stop task did not complete".to_string()),
            },
        };
        warn!(error = %err, "Verticle instance failed to stop");
        if result.is_ok() {
            result = Err(err);
        }
    }
    result
}

//! Deploys discovered verticles once the container is ready
//!
//! [`VerticleDeployer`] listens for [`ContainerRefreshed`]. Each delivery
//! drains the [`CandidateRegistry`] and submits one deployment per candidate,
//! so a verticle type is deployed at most once no matter how often (or from
//! how many threads) the event arrives. Deployment results arrive
//! asynchronously: successes are logged, failures are fatal and published on
//! the [`FatalErrors`] channel.

use crate::descriptor::ResolvedDescriptor;
use crate::discovery::VerticleType;
use crate::error::VerticleError;
use crate::registry::CandidateRegistry;
use crate::runtime::{DeploymentOptions, Runtime, VerticleFactory};
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zeus_config::ConfigManager;
use zeus_core::{ApplicationListener, Container, ContainerRefreshed, Error, Provider};
use zeus_metrics::{HttpServerPercentilesFilter, MeterRegistry};

/// Deploys every pending verticle candidate
pub struct VerticleDeployer {
    registry: Arc<CandidateRegistry>,
    runtime: Runtime,
    drain: ReentrantMutex<()>,
    fatal_tx: mpsc::UnboundedSender<VerticleError>,
    submitted: AtomicUsize,
}

impl VerticleDeployer {
    pub fn new(registry: Arc<CandidateRegistry>, runtime: Runtime) -> (Self, FatalErrors) {
        let (fatal_tx, rx) = mpsc::unbounded_channel();
        let deployer = Self {
            registry,
            runtime,
            drain: ReentrantMutex::new(()),
            fatal_tx,
            submitted: AtomicUsize::new(0),
        };
        (deployer, FatalErrors { rx })
    }

    /// Number of deployments submitted so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Acquire)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Drain the candidate registry, submitting one deployment per candidate.
    ///
    /// Returns how many deployments were submitted. A descriptor that fails to
    /// resolve aborts the drain; that candidate is not retried.
    pub fn deploy_pending(&self, container: &Container) -> Result<usize, VerticleError> {
        install_percentile_filter(container);

        let config = container
            .try_resolve::<ConfigManager>()
            .unwrap_or_else(|| Arc::new(ConfigManager::new()));

        let _drain = self.drain.lock();
        let mut submitted = 0;
        while let Some(verticle) = self.registry.take_one() {
            self.deploy(container, config.as_ref(), verticle)?;
            submitted += 1;
        }

        if submitted > 0 {
            debug!(submitted, "Verticle candidates submitted for deployment");
        }
        Ok(submitted)
    }

    fn deploy(
        &self,
        container: &Container,
        config: &ConfigManager,
        verticle: VerticleType,
    ) -> Result<(), VerticleError> {
        let type_name = verticle.type_name();
        let descriptor = verticle
            .descriptor()
            .resolve(config)
            .map_err(|source| VerticleError::Descriptor {
                verticle: type_name.to_string(),
                source,
            })?;
        descriptor
            .rate_limit()
            .and_then(|rate_limit| rate_limit.validate())
            .map_err(|source| VerticleError::RateLimit {
                verticle: type_name.to_string(),
                source,
            })?;

        let factory: VerticleFactory = {
            let container = container.clone();
            let descriptor = descriptor.clone();
            Arc::new(move || verticle.construct(&container, &descriptor))
        };

        let handle = self.runtime.deploy(
            factory,
            DeploymentOptions::new().with_instances(descriptor.instances),
        );
        self.submitted.fetch_add(1, Ordering::AcqRel);

        let fatal_tx = self.fatal_tx.clone();
        self.runtime.spawn(async move {
            match handle.await {
                Ok(id) => {
                    info!(deployment = %id, "{}", deployment_log_line(type_name, &descriptor));
                }
                Err(source) => {
                    let err = VerticleError::DeploymentFailed {
                        verticle: type_name.to_string(),
                        source,
                    };
                    report_fatal(&fatal_tx, err);
                }
            }
        });

        Ok(())
    }
}

impl Provider for VerticleDeployer {}

impl ApplicationListener<ContainerRefreshed> for VerticleDeployer {
    fn on_application_event(&self, event: &ContainerRefreshed) -> Result<(), Error> {
        self.deploy_pending(event.container())?;
        Ok(())
    }
}

/// Log a deployment failure and hand it to whoever holds [`FatalErrors`].
///
/// Returns whether the failure was delivered.
fn report_fatal(fatal_tx: &mpsc::UnboundedSender<VerticleError>, err: VerticleError) -> bool {
    error!(error = %err, "Verticle deployment failed");
    match fatal_tx.send(err) {
        Ok(()) => true,
        Err(mpsc::error::SendError(err)) => {
            warn!(error = %err, "Fatal deployment error dropped: nobody is listening for fatal errors");
            false
        }
    }
}

fn install_percentile_filter(container: &Container) {
    if let Some(metrics) = container.try_resolve::<MeterRegistry>() {
        metrics.add_filter(HttpServerPercentilesFilter);
    }
}

/// The line logged when a deployment succeeded
pub fn deployment_log_line(type_name: &str, descriptor: &ResolvedDescriptor) -> String {
    let rate_limit = match (
        descriptor.permits_per_second,
        descriptor.acquire_permits_timeout_nanos,
    ) {
        (None, _) => "未开启".to_string(),
        (Some(rate), None) => format!("{rate:?}"),
        (Some(rate), Some(timeout)) => format!("{rate:?}{timeout}"),
    };

    format!(
        "{} 发布成功. 端口：{},Path：{},实例数量：{},限流：{}",
        descriptor.display_name(type_name),
        descriptor.port,
        descriptor.path,
        descriptor.instances,
        rate_limit
    )
}

/// Fatal deployment failures, in the order they happened
pub struct FatalErrors {
    rx: mpsc::UnboundedReceiver<VerticleError>,
}

impl FatalErrors {
    /// Wait for the next failure; `None` once the deployer is gone
    pub async fn next(&mut self) -> Option<VerticleError> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<VerticleError> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::VerticleDescriptor;
    use crate::runtime::RuntimeOptions;
    use crate::test_support::{Alpha, Beta, free_port, nested::Gamma};
    use std::time::Duration;

    fn resolved(descriptor: VerticleDescriptor) -> ResolvedDescriptor {
        descriptor.resolve(&ConfigManager::new()).unwrap()
    }

    fn setup(candidates: &[VerticleType]) -> (Container, VerticleDeployer, FatalErrors) {
        let config = ConfigManager::new();
        config.set("alpha.port", free_port()).unwrap();
        config.set("beta.port", free_port()).unwrap();
        config.set("gamma.port", free_port()).unwrap();

        let container = Container::new();
        container.register(config);

        let registry = Arc::new(CandidateRegistry::new());
        registry.extend(candidates.iter().copied());
        let runtime = Runtime::new(RuntimeOptions::default().with_event_loops(2)).unwrap();
        let (deployer, fatal) = VerticleDeployer::new(registry, runtime);
        (container, deployer, fatal)
    }

    async fn wait_for_deployments(runtime: &Runtime, expected: usize) {
        for _ in 0..200 {
            if runtime.deployment_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} deployments, found {}", runtime.deployment_count());
    }

    #[test]
    fn test_log_line_without_rate_limit() {
        let line = deployment_log_line("app::Hello", &resolved(VerticleDescriptor::new("8080", "/hello")));
        assert_eq!(
            line,
            "app::Hello 发布成功. 端口：8080,Path：/hello,实例数量：1,限流：未开启"
        );
    }

    #[test]
    fn test_log_line_with_rate_and_timeout() {
        let descriptor = VerticleDescriptor::new("8080", "/hello")
            .with_instance_num("4")
            .with_description("Hello")
            .with_permits_per_second("100")
            .with_acquire_permits_timeout_nanos("500");

        let line = deployment_log_line("app::Hello", &resolved(descriptor));
        assert!(line.starts_with("Hello 发布成功."));
        assert!(line.contains("实例数量：4"));
        assert!(line.ends_with("限流：100.0500"));
    }

    #[test]
    fn test_log_line_timeout_needs_rate() {
        let descriptor = VerticleDescriptor::new("8080", "/hello")
            .with_acquire_permits_timeout_nanos("500");
        let line = deployment_log_line("com::example::FooHandler", &resolved(descriptor));
        assert!(line.starts_with("com::example::FooHandler 发布成功."));
        assert!(line.ends_with("限流：未开启"));
    }

    #[tokio::test]
    async fn test_deploys_each_candidate_once() {
        let (container, deployer, mut fatal) =
            setup(&[VerticleType::of::<Alpha>(), VerticleType::of::<Beta>()]);

        assert_eq!(deployer.deploy_pending(&container).unwrap(), 2);
        assert_eq!(deployer.deploy_pending(&container).unwrap(), 0);
        assert_eq!(deployer.submitted(), 2);

        wait_for_deployments(deployer.runtime(), 2).await;
        assert!(fatal.try_next().is_none());
        deployer.runtime().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_deploys_on_refresh() {
        let (container, deployer, _fatal) = setup(&[VerticleType::of::<Alpha>()]);
        let event = ContainerRefreshed::new(container.clone());

        deployer.on_application_event(&event).unwrap();
        deployer.on_application_event(&event).unwrap();

        assert_eq!(deployer.submitted(), 1);
        wait_for_deployments(deployer.runtime(), 1).await;
        deployer.runtime().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_is_fatal() {
        let (container, deployer, mut fatal) = setup(&[VerticleType::of::<Gamma>()]);
        deployer.deploy_pending(&container).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), fatal.next())
            .await
            .unwrap()
            .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Gamma"));
        assert!(matches!(
            &err,
            VerticleError::DeploymentFailed { source: crate::error::RuntimeError::Start { source, .. }, .. }
                if source.to_string().contains("boom")
        ));
        assert_eq!(deployer.runtime().deployment_count(), 0);
    }

    #[test]
    fn test_fatal_error_without_receiver_is_not_delivered() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut fatal = FatalErrors { rx };
        let failure = || VerticleError::DeploymentFailed {
            verticle: "app::Hello".to_string(),
            source: crate::error::RuntimeError::Closed,
        };

        assert!(report_fatal(&tx, failure()));
        assert!(fatal.try_next().is_some_and(|err| err.is_fatal()));

        drop(fatal);
        assert!(!report_fatal(&tx, failure()));
    }

    #[tokio::test]
    async fn test_unresolvable_descriptor_is_returned() {
        let (_, deployer, _fatal) = setup(&[VerticleType::of::<Alpha>()]);
        // No configuration registered: the port defaults to 0, which is invalid
        let container = Container::new();

        let err = deployer.deploy_pending(&container).unwrap_err();
        assert!(matches!(err, VerticleError::Descriptor { ref verticle, .. } if verticle.ends_with("Alpha")));
        assert_eq!(deployer.submitted(), 0);

        // The candidate was drained all the same
        assert_eq!(deployer.deploy_pending(&container).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_timeout_is_a_rate_limit_error() {
        let (container, deployer, _fatal) = setup(&[VerticleType::of::<Beta>()]);
        let config = container.resolve::<ConfigManager>().unwrap();
        config.set("beta.rate", 10).unwrap();
        config.set("beta.timeout", -1).unwrap();

        let err = deployer.deploy_pending(&container).unwrap_err();
        assert!(matches!(err, VerticleError::RateLimit { .. }));
    }

    #[tokio::test]
    async fn test_installs_percentile_filter() {
        let (container, deployer, _fatal) = setup(&[]);
        let metrics = MeterRegistry::new();
        container.register(metrics.clone());

        deployer.deploy_pending(&container).unwrap();
        deployer.deploy_pending(&container).unwrap();

        assert!(metrics.has_filter(HttpServerPercentilesFilter::NAME));
        assert_eq!(metrics.filter_count(), 1);
    }

    #[test]
    fn test_concurrent_triggers_submit_each_candidate_once() {
        let (container, deployer, _fatal) =
            setup(&[VerticleType::of::<Alpha>(), VerticleType::of::<Beta>()]);
        let deployer = Arc::new(deployer);

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let deployer = deployer.clone();
                let container = container.clone();
                std::thread::spawn(move || deployer.deploy_pending(&container).unwrap())
            })
            .collect();

        let total: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(total, 2);
        assert_eq!(deployer.submitted(), 2);

        let runtime = deployer.runtime().clone();
        tokio_test::block_on(async {
            for _ in 0..200 {
                if runtime.deployment_count() == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert_eq!(runtime.deployment_count(), 2);
            runtime.close().await.unwrap();
        });
    }
}

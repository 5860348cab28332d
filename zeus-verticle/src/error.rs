// Error types for discovery, deployment and the verticle runtime

use crate::runtime::DeploymentId;
use thiserror::Error;
use zeus_config::ConfigError;
use zeus_metrics::MetricsError;
use zeus_ratelimit::RateLimitError;

pub type Result<T> = std::result::Result<T, VerticleError>;

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid base package {0:?}")]
    InvalidBasePackage(String),
}

/// Errors reported by the deployment runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Verticle instance {instance} failed to start: {source}")]
    Start {
        instance: usize,
        #[source]
        source: zeus_core::Error,
    },

    #[error("Verticle instance {instance} panicked while starting")]
    Panicked { instance: usize },

    #[error("Verticle failed to stop: {source}")]
    Stop {
        #[source]
        source: zeus_core::Error,
    },

    #[error("Invalid instance count {0}; at least one instance is required")]
    InvalidInstances(usize),

    #[error("Unknown deployment {0}")]
    UnknownDeployment(DeploymentId),

    #[error("Runtime is closed")]
    Closed,

    #[error("Event loop error: {0}")]
    Io(#[from] std::io::Error),
}

/// Verticle lifecycle errors
#[derive(Debug, Error)]
pub enum VerticleError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Invalid descriptor on {verticle}: {source}")]
    Descriptor {
        verticle: String,
        #[source]
        source: ConfigError,
    },

    #[error("Invalid rate limit on {verticle}: {source}")]
    RateLimit {
        verticle: String,
        #[source]
        source: RateLimitError,
    },

    #[error("Deployment of {verticle} failed: {source}")]
    DeploymentFailed {
        verticle: String,
        #[source]
        source: RuntimeError,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Core(zeus_core::Error),
}

impl VerticleError {
    /// Whether this error must bring the application down
    pub fn is_fatal(&self) -> bool {
        matches!(self, VerticleError::DeploymentFailed { .. })
    }
}

impl From<VerticleError> for zeus_core::Error {
    fn from(err: VerticleError) -> Self {
        match err {
            VerticleError::Core(core) => core,
            other => zeus_core::Error::listener(other),
        }
    }
}

/// Unwraps a `VerticleError` that travelled through an event listener
impl From<zeus_core::Error> for VerticleError {
    fn from(err: zeus_core::Error) -> Self {
        match err {
            zeus_core::Error::Listener(source) => match source.downcast::<VerticleError>() {
                Ok(err) => *err,
                Err(source) => VerticleError::Core(zeus_core::Error::Listener(source)),
            },
            other => VerticleError::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_deployment_failed_keeps_cause() {
        let err = VerticleError::DeploymentFailed {
            verticle: "app::Hello".to_string(),
            source: RuntimeError::Start {
                instance: 0,
                source: zeus_core::Error::Internal("boom".to_string()),
            },
        };

        assert!(err.is_fatal());
        assert!(err.to_string().contains("app::Hello"));
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("boom"));
    }

    #[test]
    fn test_into_core_error() {
        let core: zeus_core::Error =
            VerticleError::Discovery(DiscoveryError::InvalidBasePackage("a::".into())).into();
        assert!(matches!(core, zeus_core::Error::Listener(_)));
        assert!(core.to_string().contains("a::"));

        let core: zeus_core::Error =
            VerticleError::Core(zeus_core::Error::NotFound("x".into())).into();
        assert!(matches!(core, zeus_core::Error::NotFound(_)));
    }

    #[test]
    fn test_typed_error_survives_core_conversion() {
        let core: zeus_core::Error = VerticleError::Descriptor {
            verticle: "app::Hello".to_string(),
            source: ConfigError::KeyNotFound("hello.port".to_string()),
        }
        .into();

        let back = VerticleError::from(core);
        match back {
            VerticleError::Descriptor { verticle, source } => {
                assert_eq!(verticle, "app::Hello");
                assert!(matches!(source, ConfigError::KeyNotFound(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let foreign = VerticleError::from(zeus_core::Error::listener(std::io::Error::other("x")));
        assert!(matches!(foreign, VerticleError::Core(zeus_core::Error::Listener(_))));

        let plain = VerticleError::from(zeus_core::Error::NotFound("x".into()));
        assert!(matches!(plain, VerticleError::Core(zeus_core::Error::NotFound(_))));
    }
}

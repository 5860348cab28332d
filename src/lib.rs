// Zeus - an event-loop verticle framework for Rust
//
// Verticle types are discovered at startup and deployed once the container is
// ready, each with its configured instance count and rate limit.

// Re-export core functionality
pub use zeus_core::*;

pub use zeus_verticle::{
    Application, ApplicationBuilder, CandidateRegistry, DeploymentId, DeploymentOptions,
    Discovery, HttpServerVerticle, HttpVerticle, ResolvedDescriptor, Runtime, RuntimeOptions,
    ScanDeclaration, ServerRegistry, Verticle, VerticleContext, VerticleController,
    VerticleDeployer, VerticleDescriptor, VerticleError, VerticleType, register_verticle,
};

// Re-export member crates
pub use zeus_config;
pub use zeus_metrics;
pub use zeus_ratelimit;
pub use zeus_verticle;

pub use async_trait::async_trait;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Application, Container, Error, HttpRequest, HttpResponse, HttpVerticle, Injectable,
        Provider, ScanDeclaration, Verticle, VerticleContext, VerticleController,
        VerticleDescriptor, async_trait, register_verticle,
    };
    pub use zeus_config::{ConfigManager, ConfigService, PlaceholderResolver};
    pub use zeus_core::logging::{LogConfig, LogFormat, LogLevel};
    pub use zeus_metrics::MeterRegistry;
}

//! # Zeus Verticle
//!
//! Discovers verticle types, deploys them on an event-loop runtime once the
//! container is ready, and serves HTTP verticles with per-verticle instance
//! counts and rate limits.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use zeus_core::{Container, Error, HttpRequest, HttpResponse, Injectable};
//! use zeus_verticle::{Application, HttpVerticle, VerticleController, VerticleDescriptor};
//!
//! pub struct Hello;
//!
//! #[async_trait]
//! impl HttpVerticle for Hello {
//!     async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
//!         Ok(HttpResponse::text("hello"))
//!     }
//! }
//!
//! impl VerticleController for Hello {
//!     const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${hello.port:8080}", "/hello")
//!         .with_instance_num("${hello.instances:2}")
//!         .with_permits_per_second("100");
//! }
//!
//! impl Injectable for Hello {
//!     fn inject(_container: &Container) -> Result<Self, Error> {
//!         Ok(Hello)
//!     }
//! }
//!
//! zeus_verticle::register_verticle!(Hello);
//!
//! # async fn example() -> Result<(), zeus_verticle::VerticleError> {
//! Application::builder()
//!     .scan(zeus_verticle::ScanDeclaration::new(module_path!()))
//!     .build()?
//!     .run()
//!     .await
//! # }
//! ```

pub mod application;
pub mod deployer;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod http_verticle;
pub mod registry;
pub mod runtime;
pub mod verticle;

#[cfg(test)]
mod test_support;

pub use application::{Application, ApplicationBuilder};
pub use deployer::{FatalErrors, VerticleDeployer, deployment_log_line};
pub use descriptor::{ResolvedDescriptor, VerticleController, VerticleDescriptor};
pub use discovery::{Discovery, ScanDeclaration, VerticleRegistration, VerticleType};
pub use error::{DiscoveryError, Result, RuntimeError, VerticleError};
pub use http_verticle::{HttpServerVerticle, HttpVerticle, ServerRegistry};
pub use registry::CandidateRegistry;
pub use runtime::{
    DeploymentHandle, DeploymentId, DeploymentOptions, Runtime, RuntimeOptions, VerticleFactory,
};
pub use verticle::{ShutdownSignal, Verticle, VerticleContext};

#[doc(hidden)]
pub use inventory;

/// Prelude for common imports
pub mod prelude {
    pub use crate::application::{Application, ApplicationBuilder};
    pub use crate::descriptor::{VerticleController, VerticleDescriptor};
    pub use crate::discovery::ScanDeclaration;
    pub use crate::error::VerticleError;
    pub use crate::http_verticle::HttpVerticle;
    pub use crate::register_verticle;
    pub use crate::verticle::{Verticle, VerticleContext};
}

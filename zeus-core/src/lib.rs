// Core library for the Zeus verticle framework
// This module contains the container, lifecycle events and shared value types

pub mod container;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod traits;

// Re-export commonly used types
pub use container::*;
pub use error::*;
pub use http::*;
pub use lifecycle::{ApplicationEvent, ApplicationListener, ContainerRefreshed, EventMulticaster};
pub use traits::*;

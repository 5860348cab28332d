// Core traits for the Zeus framework

use crate::{Container, Error};
use std::any::TypeId;

/// Trait for types that can be provided by the DI container
pub trait Provider: Send + Sync + 'static {
    /// Returns the TypeId of the provider
    fn type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

/// Trait for types the container knows how to build on demand.
///
/// Every call to [`Container::construct`] produces a fresh value, so an
/// `Injectable` behaves like a prototype-scoped component: dependencies are
/// pulled out of the container, the instance itself is never stored.
///
/// ```
/// use zeus_core::{Container, Error, Injectable, Provider};
/// use std::sync::Arc;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Provider for Greeter {}
///
/// struct GreetingHandler {
///     greeter: Arc<Greeter>,
/// }
///
/// impl Injectable for GreetingHandler {
///     fn inject(container: &Container) -> Result<Self, Error> {
///         Ok(Self { greeter: container.resolve::<Greeter>()? })
///     }
/// }
///
/// let container = Container::new();
/// container.register(Greeter { greeting: "hello".into() });
/// let handler = container.construct::<GreetingHandler>().unwrap();
/// assert_eq!(handler.greeter.greeting, "hello");
/// ```
pub trait Injectable: Sized + Send + 'static {
    /// Build a new instance, resolving dependencies from the container
    fn inject(container: &Container) -> Result<Self, Error>;
}

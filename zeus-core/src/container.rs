// Dependency injection container

use crate::{Error, Injectable, Provider};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type PrototypeFactory =
    Arc<dyn Fn(&Container) -> Result<Box<dyn Any + Send>, Error> + Send + Sync>;

/// The dependency injection container
///
/// Holds two kinds of registrations: singleton providers (shared through
/// `Arc`) and prototype factories that build a new value on every
/// [`construct`](Container::construct) call.
#[derive(Clone)]
pub struct Container {
    providers: Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
    prototypes: Arc<RwLock<HashMap<TypeId, PrototypeFactory>>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            prototypes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a provider instance
    pub fn register<T: Provider>(&self, instance: T) {
        self.register_arc(Arc::new(instance));
    }

    /// Register an already shared provider instance
    pub fn register_arc<T: Provider>(&self, instance: Arc<T>) {
        let type_name = std::any::type_name::<T>();

        trace!(provider = type_name, "Acquiring write lock for registration");
        self.providers.write().insert(TypeId::of::<T>(), instance);

        debug!(provider = type_name, "Provider registered in DI container");
    }

    /// Register a provider using a factory function
    pub fn register_factory<T: Provider, F>(&self, factory: F)
    where
        F: FnOnce() -> T,
    {
        let type_name = std::any::type_name::<T>();
        debug!(provider = type_name, "Creating provider from factory");

        let instance = factory();
        self.register(instance);
    }

    /// Register a prototype factory for `T`.
    ///
    /// Overrides `T`'s [`Injectable`] implementation when constructing.
    pub fn register_prototype<T, F>(&self, factory: F)
    where
        T: Send + 'static,
        F: Fn(&Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let factory: PrototypeFactory =
            Arc::new(move |container| factory(container).map(|v| Box::new(v) as Box<dyn Any + Send>));

        self.prototypes.write().insert(TypeId::of::<T>(), factory);
        debug!(component = type_name, "Prototype factory registered");
    }

    /// Resolve a provider by type
    pub fn resolve<T: Provider>(&self) -> Result<Arc<T>, Error> {
        let type_name = std::any::type_name::<T>();

        trace!(provider = type_name, "Attempting to resolve provider");
        let found = self.providers.read().get(&TypeId::of::<T>()).cloned();

        let result = found
            .and_then(|any| any.downcast::<T>().ok())
            .ok_or_else(|| Error::ProviderNotFound(type_name.to_string()));

        match &result {
            Ok(_) => trace!(provider = type_name, "Provider resolved successfully"),
            Err(_) => debug!(provider = type_name, "Provider not found in container"),
        }

        result
    }

    /// Resolve a provider if one is registered
    pub fn try_resolve<T: Provider>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    /// Resolve `T`, registering the value built by `init` when absent.
    ///
    /// Concurrent callers observe the same instance.
    pub fn resolve_or_register<T: Provider, F>(&self, init: F) -> Result<Arc<T>, Error>
    where
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.try_resolve::<T>() {
            return Ok(existing);
        }

        let type_name = std::any::type_name::<T>();
        let entry = self
            .providers
            .write()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                debug!(provider = type_name, "Provider registered on first use");
                Arc::new(init())
            })
            .clone();

        entry
            .downcast::<T>()
            .map_err(|_| Error::DependencyInjection(format!("provider {} has a different type", type_name)))
    }

    /// Build a fresh instance of `T`.
    ///
    /// A registered prototype factory wins; otherwise `T::inject` is used.
    pub fn construct<T: Injectable>(&self) -> Result<T, Error> {
        let type_name = std::any::type_name::<T>();
        // Clone the factory out so it may itself use the container.
        let factory = self.prototypes.read().get(&TypeId::of::<T>()).cloned();

        let instance = match factory {
            Some(factory) => {
                trace!(component = type_name, "Constructing from prototype factory");
                let boxed = factory(self)?;
                *boxed.downcast::<T>().map_err(|_| {
                    Error::DependencyInjection(format!(
                        "prototype factory for {} produced a different type",
                        type_name
                    ))
                })?
            }
            None => {
                trace!(component = type_name, "Constructing through Injectable");
                T::inject(self)?
            }
        };

        debug!(component = type_name, "Component constructed");
        Ok(instance)
    }

    /// Check if a provider is registered
    pub fn has<T: Provider>(&self) -> bool {
        let exists = self.providers.read().contains_key(&TypeId::of::<T>());

        trace!(
            provider = std::any::type_name::<T>(),
            exists = exists,
            "Checked provider existence"
        );
        exists
    }

    /// Clear all providers and prototype factories
    pub fn clear(&self) {
        let mut providers = self.providers.write();
        let count = providers.len();
        providers.clear();
        self.prototypes.write().clear();

        debug!(provider_count = count, "Cleared all providers from container");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

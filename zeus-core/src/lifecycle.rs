//! Application lifecycle events.
//!
//! Listeners subscribe to one event type and are invoked synchronously, in
//! registration order, when an event of that type is published. The first
//! listener error stops delivery and is returned to the publisher, so a
//! failing listener surfaces as a startup failure.
//!
//! ```
//! use zeus_core::{ApplicationListener, Container, ContainerRefreshed, Error, EventMulticaster};
//! use std::sync::Arc;
//!
//! struct Announce;
//!
//! impl ApplicationListener<ContainerRefreshed> for Announce {
//!     fn on_application_event(&self, event: &ContainerRefreshed) -> Result<(), Error> {
//!         let _container = event.container();
//!         Ok(())
//!     }
//! }
//!
//! let multicaster = EventMulticaster::new();
//! multicaster.add_listener::<ContainerRefreshed, _>(Arc::new(Announce));
//! multicaster.publish(&ContainerRefreshed::new(Container::new())).unwrap();
//! ```

use crate::{Container, Error, Provider};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Marker for events that can be published through an [`EventMulticaster`]
pub trait ApplicationEvent: Send + Sync + 'static {
    /// Human readable event name, used in logs
    fn event_name(&self) -> &'static str;
}

/// Listener for a single event type
pub trait ApplicationListener<E: ApplicationEvent>: Send + Sync {
    /// Handle an event
    fn on_application_event(&self, event: &E) -> Result<(), Error>;
}

/// Published once the container has been populated and all providers are
/// available. Carries a handle to the container.
#[derive(Clone)]
pub struct ContainerRefreshed {
    container: Container,
}

impl ContainerRefreshed {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    /// The container that finished initializing
    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl ApplicationEvent for ContainerRefreshed {
    fn event_name(&self) -> &'static str {
        "ContainerRefreshed"
    }
}

type ErasedListener = Arc<dyn Fn(&dyn Any) -> Result<(), Error> + Send + Sync>;

/// Broadcasts application events to the listeners registered for them
#[derive(Clone, Default)]
pub struct EventMulticaster {
    listeners: Arc<RwLock<HashMap<TypeId, Vec<(String, ErasedListener)>>>>,
}

impl EventMulticaster {
    /// Create a multicaster with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to events of type `E`
    pub fn add_listener<E, L>(&self, listener: Arc<L>)
    where
        E: ApplicationEvent,
        L: ApplicationListener<E> + 'static,
    {
        let name = std::any::type_name::<L>().to_string();
        let erased: ErasedListener = Arc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
            Some(event) => listener.on_application_event(event),
            None => Ok(()),
        });

        self.listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((name.clone(), erased));

        debug!(
            listener = %name,
            event = std::any::type_name::<E>(),
            "Application listener registered"
        );
    }

    /// Deliver an event to every listener registered for its type
    pub fn publish<E: ApplicationEvent>(&self, event: &E) -> Result<(), Error> {
        // Snapshot so listeners may register further listeners.
        let listeners = self
            .listeners
            .read()
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();

        debug!(
            event = event.event_name(),
            listener_count = listeners.len(),
            "Publishing application event"
        );

        for (name, listener) in listeners.iter() {
            trace!(listener = %name, event = event.event_name(), "Invoking listener");
            if let Err(e) = listener(event as &dyn Any) {
                error!(listener = %name, event = event.event_name(), error = %e, "Listener failed");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Number of listeners registered for `E`
    pub fn listener_count<E: ApplicationEvent>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

impl Provider for EventMulticaster {}

//! Meter registry
//!
//! Owns a Prometheus [`Registry`] and the meters created through it. Meter
//! filters installed on the registry shape the distribution statistics of
//! every meter created afterwards.

use crate::distribution::DistributionStatisticConfig;
use crate::error::{MetricsError, Result};
use crate::filter::MeterFilter;
use crate::meter::{MeterId, MeterType};
use crate::timer::Timer;
use parking_lot::RwLock;
use prometheus::{Counter, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use zeus_core::Provider;

#[derive(Clone)]
pub struct MeterRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    registry: Registry,
    filters: RwLock<Vec<Arc<dyn MeterFilter>>>,
    timers: RwLock<HashMap<String, Arc<Timer>>>,
    counters: RwLock<HashMap<String, Counter>>,
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Wrap an existing Prometheus registry
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                registry,
                filters: RwLock::new(Vec::new()),
                timers: RwLock::new(HashMap::new()),
                counters: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn prometheus_registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Install a filter; returns `false` when one with the same name exists
    pub fn add_filter<F: MeterFilter + 'static>(&self, filter: F) -> bool {
        let mut filters = self.inner.filters.write();
        if filters.iter().any(|f| f.name() == filter.name()) {
            debug!(filter = filter.name(), "Meter filter already installed");
            return false;
        }

        debug!(filter = filter.name(), "Installed meter filter");
        filters.push(Arc::new(filter));
        true
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.inner.filters.read().iter().any(|f| f.name() == name)
    }

    pub fn filter_count(&self) -> usize {
        self.inner.filters.read().len()
    }

    /// Distribution statistics a meter with this id would be created with
    pub fn configure(&self, id: &MeterId) -> DistributionStatisticConfig {
        self.inner
            .filters
            .read()
            .iter()
            .fold(DistributionStatisticConfig::none(), |config, filter| {
                filter.configure(id, config)
            })
    }

    /// Get or create the timer named `name`
    pub fn timer(&self, name: &str, help: &str) -> Result<Arc<Timer>> {
        validate_name(name)?;
        if let Some(timer) = self.inner.timers.read().get(name) {
            return Ok(timer.clone());
        }
        if self.inner.counters.read().contains_key(name) {
            return Err(MetricsError::TypeMismatch {
                name: name.to_string(),
                existing: MeterType::Counter.as_str(),
            });
        }

        let mut timers = self.inner.timers.write();
        if let Some(timer) = timers.get(name) {
            return Ok(timer.clone());
        }

        let id = MeterId::new(name, MeterType::Timer).with_description(help);
        let config = self.configure(&id);
        let timer = Arc::new(Timer::new(id, help, config)?);
        for collector in timer.collectors() {
            self.inner.registry.register(collector)?;
        }

        debug!(
            meter = name,
            percentiles = ?timer.config().percentiles(),
            "Registered timer"
        );
        timers.insert(name.to_string(), timer.clone());
        Ok(timer)
    }

    /// Get or create the counter named `name`
    pub fn counter(&self, name: &str, help: &str) -> Result<Counter> {
        validate_name(name)?;
        if let Some(counter) = self.inner.counters.read().get(name) {
            return Ok(counter.clone());
        }
        if self.inner.timers.read().contains_key(name) {
            return Err(MetricsError::TypeMismatch {
                name: name.to_string(),
                existing: MeterType::Timer.as_str(),
            });
        }

        let mut counters = self.inner.counters.write();
        if let Some(counter) = counters.get(name) {
            return Ok(counter.clone());
        }

        let counter = Counter::new(name, help)?;
        self.inner.registry.register(Box::new(counter.clone()))?;
        debug!(meter = name, "Registered counter");
        counters.insert(name.to_string(), counter.clone());
        Ok(counter)
    }

    /// Every timer created so far
    pub fn timers(&self) -> Vec<Arc<Timer>> {
        self.inner.timers.read().values().cloned().collect()
    }

    /// Export all meters in Prometheus text format
    pub fn export(&self) -> String {
        for timer in self.inner.timers.read().values() {
            timer.publish_percentiles();
        }
        crate::export_metrics_from_registry(&self.inner.registry)
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MeterRegistry {}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return Err(MetricsError::InvalidName(name.to_string()));
    }
    Ok(())
}

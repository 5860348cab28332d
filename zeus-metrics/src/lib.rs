//! Meters and Prometheus export for Zeus
//!
//! A [`MeterRegistry`] creates timers and counters on top of a Prometheus
//! registry. [`MeterFilter`]s installed on the registry decide which
//! distribution statistics each new meter publishes.
//!
//! # Quick Start
//!
//! ```
//! use zeus_metrics::*;
//! use std::time::Duration;
//!
//! let registry = MeterRegistry::new();
//! registry.add_filter(HttpServerPercentilesFilter);
//!
//! let timer = registry
//!     .timer(&MetricsDomain::HttpServer.meter_name("requests_seconds"), "Request latency")
//!     .unwrap();
//! timer.record(Duration::from_millis(12));
//!
//! assert!(registry.export().contains("zeus_http_server_requests_seconds"));
//! ```

pub mod distribution;
pub mod domain;
pub mod error;
pub mod filter;
pub mod meter;
pub mod registry;
pub mod timer;

pub use distribution::{DistributionStatisticConfig, DistributionStatisticConfigBuilder};
pub use domain::MetricsDomain;
pub use error::{MetricsError, Result};
pub use filter::{HTTP_SERVER_PERCENTILES, HttpServerPercentilesFilter, MeterFilter};
pub use meter::{MeterId, MeterType};
pub use prometheus;
pub use registry::MeterRegistry;
pub use timer::{DEFAULT_LATENCY_BUCKETS, Timer, TimerSample};

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

static GLOBAL_REGISTRY: Lazy<MeterRegistry> = Lazy::new(MeterRegistry::new);

/// Process-wide meter registry
///
/// ```
/// use zeus_metrics::*;
///
/// let registry = global_registry();
/// let _ = registry.export();
/// ```
pub fn global_registry() -> &'static MeterRegistry {
    &GLOBAL_REGISTRY
}

/// Export metrics from a specific registry
///
/// ```
/// use zeus_metrics::*;
/// use prometheus::Registry;
///
/// let registry = Registry::new();
/// let metrics = export_metrics_from_registry(&registry);
/// ```
pub fn export_metrics_from_registry(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|_| String::from("# Error converting metrics to UTF-8\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_registry_is_shared() {
        let a = global_registry();
        let b = global_registry();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_export_empty_registry() {
        let metrics = export_metrics_from_registry(&Registry::new());
        assert!(metrics.is_empty());
    }
}

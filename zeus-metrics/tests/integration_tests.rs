//! Integration tests for zeus-metrics

use std::sync::Arc;
use std::time::Duration;
use zeus_metrics::*;

#[test]
fn test_percentiles_exported_for_http_server_timers() {
    let registry = MeterRegistry::new();
    registry.add_filter(HttpServerPercentilesFilter);

    let timer = registry
        .timer(
            &MetricsDomain::HttpServer.meter_name("requests_seconds"),
            "HTTP server request latency",
        )
        .unwrap();
    for ms in 1..=200 {
        timer.record(Duration::from_millis(ms));
    }

    let text = registry.export();
    assert!(text.contains("zeus_http_server_requests_seconds_bucket"));
    assert!(text.contains("zeus_http_server_requests_seconds_percentile{quantile=\"0.95\"}"));
    assert!(text.contains("quantile=\"0.995\""));
}

#[test]
fn test_filter_installed_after_meter_does_not_change_it() {
    let registry = MeterRegistry::new();
    let early = registry
        .timer(&MetricsDomain::HttpServer.meter_name("early_seconds"), "Early")
        .unwrap();

    registry.add_filter(HttpServerPercentilesFilter);
    assert!(early.config().percentiles().is_empty());
}

struct FixedExpiry;

impl MeterFilter for FixedExpiry {
    fn name(&self) -> &str {
        "fixed-expiry"
    }

    fn configure(&self, _id: &MeterId, config: DistributionStatisticConfig) -> DistributionStatisticConfig {
        DistributionStatisticConfig::builder()
            .expiry(Duration::from_secs(5))
            .build()
            .merge(&config)
    }
}

#[test]
fn test_filters_chain_in_installation_order() {
    let registry = MeterRegistry::new();
    registry.add_filter(HttpServerPercentilesFilter);
    registry.add_filter(FixedExpiry);

    let id = MeterId::new(
        MetricsDomain::HttpServer.meter_name("chained_seconds"),
        MeterType::Timer,
    );
    let config = registry.configure(&id);
    assert_eq!(config.percentiles(), &HTTP_SERVER_PERCENTILES);
    assert_eq!(config.expiry, Some(Duration::from_secs(5)));
}

#[test]
fn test_concurrent_timer_creation_yields_one_meter() {
    let registry = MeterRegistry::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.timer("zeus_runtime_tick_seconds", "Tick").unwrap())
        })
        .collect();

    let timers: Vec<Arc<Timer>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(timers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_counter() {
    let registry = MeterRegistry::new();
    let counter = registry.counter("zeus_http_server_rejected_total", "Rejected").unwrap();
    counter.inc();
    counter.inc_by(2.0);
    assert_eq!(registry.counter("zeus_http_server_rejected_total", "Rejected").unwrap().get(), 3.0);
}

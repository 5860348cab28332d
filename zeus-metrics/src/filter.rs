//! Meter filters
//!
//! Filters are consulted when a meter is first created and may adjust the
//! distribution statistics it publishes. They run in installation order, each
//! receiving the configuration produced by the previous one.

use crate::distribution::DistributionStatisticConfig;
use crate::domain::MetricsDomain;
use crate::meter::{MeterId, MeterType};

/// Percentiles published by HTTP server timers
pub const HTTP_SERVER_PERCENTILES: [f64; 3] = [0.95, 0.99, 0.995];

pub trait MeterFilter: Send + Sync {
    /// Unique name; a registry holds at most one filter per name
    fn name(&self) -> &str;

    fn configure(
        &self,
        id: &MeterId,
        config: DistributionStatisticConfig,
    ) -> DistributionStatisticConfig {
        let _ = id;
        config
    }
}

/// Adds [`HTTP_SERVER_PERCENTILES`] to timers in the HTTP server domain
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpServerPercentilesFilter;

impl HttpServerPercentilesFilter {
    pub const NAME: &'static str = "http-server-percentiles";
}

impl MeterFilter for HttpServerPercentilesFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(
        &self,
        id: &MeterId,
        config: DistributionStatisticConfig,
    ) -> DistributionStatisticConfig {
        if id.meter_type != MeterType::Timer || !MetricsDomain::HttpServer.contains(&id.name) {
            return config;
        }

        DistributionStatisticConfig::builder()
            .percentiles(&HTTP_SERVER_PERCENTILES)
            .build()
            .merge(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn http_timer() -> MeterId {
        MeterId::new(
            MetricsDomain::HttpServer.meter_name("requests_seconds"),
            MeterType::Timer,
        )
    }

    #[test]
    fn test_adds_percentiles_to_http_server_timers() {
        let existing = DistributionStatisticConfig::builder()
            .percentiles(&[0.5])
            .expiry(Duration::from_secs(10))
            .build();

        let configured = HttpServerPercentilesFilter.configure(&http_timer(), existing);
        assert_eq!(configured.percentiles(), &HTTP_SERVER_PERCENTILES);
        assert_eq!(configured.expiry, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_ignores_other_meters() {
        let existing = DistributionStatisticConfig::builder().percentiles(&[0.5]).build();

        let counter = MeterId::new(
            MetricsDomain::HttpServer.meter_name("requests_total"),
            MeterType::Counter,
        );
        assert_eq!(
            HttpServerPercentilesFilter.configure(&counter, existing.clone()),
            existing
        );

        let client = MeterId::new(
            MetricsDomain::HttpClient.meter_name("requests_seconds"),
            MeterType::Timer,
        );
        assert_eq!(
            HttpServerPercentilesFilter.configure(&client, existing.clone()),
            existing
        );
    }
}

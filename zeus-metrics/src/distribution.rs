//! Distribution statistic configuration
//!
//! Describes which statistics a timer publishes beyond count and sum. Every
//! field is optional so that filters can contribute part of a configuration
//! and [`merge`](DistributionStatisticConfig::merge) it over another.

use std::time::Duration;

/// Sample window kept for percentile estimation when nothing else is set
pub const DEFAULT_BUFFER_LENGTH: usize = 1024;

/// Age after which samples stop contributing to percentiles
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionStatisticConfig {
    /// Percentiles to publish, each in `0.0..=1.0`
    pub percentiles: Option<Vec<f64>>,
    /// Histogram bucket upper bounds, in seconds
    pub buckets: Option<Vec<f64>>,
    pub expiry: Option<Duration>,
    /// Maximum samples retained for percentiles
    pub buffer_length: Option<usize>,
}

impl DistributionStatisticConfig {
    /// A configuration that sets nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn builder() -> DistributionStatisticConfigBuilder {
        DistributionStatisticConfigBuilder::default()
    }

    /// Fill every unset field of `self` from `parent`
    pub fn merge(&self, parent: &DistributionStatisticConfig) -> DistributionStatisticConfig {
        DistributionStatisticConfig {
            percentiles: self.percentiles.clone().or_else(|| parent.percentiles.clone()),
            buckets: self.buckets.clone().or_else(|| parent.buckets.clone()),
            expiry: self.expiry.or(parent.expiry),
            buffer_length: self.buffer_length.or(parent.buffer_length),
        }
    }

    pub fn percentiles(&self) -> &[f64] {
        self.percentiles.as_deref().unwrap_or(&[])
    }

    pub fn is_publishing_percentiles(&self) -> bool {
        !self.percentiles().is_empty()
    }

    pub fn expiry_or_default(&self) -> Duration {
        self.expiry.unwrap_or(DEFAULT_EXPIRY)
    }

    pub fn buffer_length_or_default(&self) -> usize {
        self.buffer_length.unwrap_or(DEFAULT_BUFFER_LENGTH).max(1)
    }
}

#[derive(Debug, Default)]
pub struct DistributionStatisticConfigBuilder {
    config: DistributionStatisticConfig,
}

impl DistributionStatisticConfigBuilder {
    pub fn percentiles(mut self, percentiles: &[f64]) -> Self {
        self.config.percentiles = Some(percentiles.to_vec());
        self
    }

    pub fn buckets(mut self, buckets: &[f64]) -> Self {
        self.config.buckets = Some(buckets.to_vec());
        self
    }

    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.config.expiry = Some(expiry);
        self
    }

    pub fn buffer_length(mut self, length: usize) -> Self {
        self.config.buffer_length = Some(length);
        self
    }

    pub fn build(self) -> DistributionStatisticConfig {
        self.config
    }
}

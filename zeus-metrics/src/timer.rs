//! Timers
//!
//! A timer records durations into a Prometheus histogram and keeps a bounded
//! window of recent samples from which the configured percentiles are
//! estimated.

use crate::distribution::DistributionStatisticConfig;
use crate::error::Result;
use crate::meter::MeterId;
use parking_lot::Mutex;
use prometheus::core::Collector;
use prometheus::{GaugeVec, Histogram, HistogramOpts, Opts};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default histogram buckets for request latency (in seconds)
pub const DEFAULT_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

pub struct Timer {
    id: MeterId,
    config: DistributionStatisticConfig,
    histogram: Histogram,
    quantiles: Option<GaugeVec>,
    samples: Mutex<VecDeque<(Instant, Duration)>>,
}

impl Timer {
    pub(crate) fn new(id: MeterId, help: &str, config: DistributionStatisticConfig) -> Result<Self> {
        let buckets = config
            .buckets
            .clone()
            .unwrap_or_else(|| DEFAULT_LATENCY_BUCKETS.to_vec());
        let histogram = Histogram::with_opts(HistogramOpts::new(id.name.as_str(), help).buckets(buckets))?;

        let quantiles = if config.is_publishing_percentiles() {
            let opts = Opts::new(format!("{}_percentile", id.name), format!("{} (percentiles)", help));
            Some(GaugeVec::new(opts, &["quantile"])?)
        } else {
            None
        };

        Ok(Self {
            id,
            config,
            histogram,
            quantiles,
            samples: Mutex::new(VecDeque::new()),
        })
    }

    pub(crate) fn collectors(&self) -> Vec<Box<dyn Collector>> {
        let mut collectors: Vec<Box<dyn Collector>> = vec![Box::new(self.histogram.clone())];
        if let Some(quantiles) = &self.quantiles {
            collectors.push(Box::new(quantiles.clone()));
        }
        collectors
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Distribution statistics in effect, after filters were applied
    pub fn config(&self) -> &DistributionStatisticConfig {
        &self.config
    }

    pub fn record(&self, duration: Duration) {
        self.histogram.observe(duration.as_secs_f64());

        if self.config.is_publishing_percentiles() {
            let mut samples = self.samples.lock();
            if samples.len() >= self.config.buffer_length_or_default() {
                samples.pop_front();
            }
            samples.push_back((Instant::now(), duration));
        }
    }

    /// Start timing; the sample is recorded when stopped
    pub fn start(&self) -> TimerSample<'_> {
        TimerSample {
            timer: self,
            started: Instant::now(),
        }
    }

    pub fn count(&self) -> u64 {
        self.histogram.get_sample_count()
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_secs_f64(self.histogram.get_sample_sum())
    }

    /// Estimate of percentile `p` over unexpired samples (nearest rank)
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        nearest_rank(&self.live_samples(), p)
    }

    /// Every configured percentile with its current estimate
    pub fn percentile_snapshot(&self) -> Vec<(f64, Duration)> {
        let sorted = self.live_samples();
        self.config
            .percentiles()
            .iter()
            .filter_map(|&p| nearest_rank(&sorted, p).map(|value| (p, value)))
            .collect()
    }

    /// Copy the current percentile estimates into the exported gauges
    pub fn publish_percentiles(&self) {
        let Some(quantiles) = &self.quantiles else {
            return;
        };
        for (p, value) in self.percentile_snapshot() {
            quantiles
                .with_label_values(&[p.to_string().as_str()])
                .set(value.as_secs_f64());
        }
    }

    fn live_samples(&self) -> Vec<Duration> {
        let expiry = self.config.expiry_or_default();
        let mut samples = self.samples.lock();
        while samples
            .front()
            .is_some_and(|(recorded, _)| recorded.elapsed() > expiry)
        {
            samples.pop_front();
        }

        let mut values: Vec<Duration> = samples.iter().map(|(_, v)| *v).collect();
        values.sort_unstable();
        values
    }
}

fn nearest_rank(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted.get(rank.saturating_sub(1)).copied()
}

/// An in-flight timing started with [`Timer::start`]
pub struct TimerSample<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl TimerSample<'_> {
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.timer.record(elapsed);
        elapsed
    }
}

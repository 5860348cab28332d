//! Meter identity

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterType {
    Counter,
    Gauge,
    Timer,
    DistributionSummary,
    Other,
}

impl MeterType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MeterType::Counter => "counter",
            MeterType::Gauge => "gauge",
            MeterType::Timer => "timer",
            MeterType::DistributionSummary => "distribution summary",
            MeterType::Other => "meter",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and type of a meter, as seen by filters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterId {
    pub name: String,
    pub meter_type: MeterType,
    pub description: Option<String>,
}

impl MeterId {
    pub fn new(name: impl Into<String>, meter_type: MeterType) -> Self {
        Self {
            name: name.into(),
            meter_type,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

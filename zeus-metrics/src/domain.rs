//! Metrics domains
//!
//! Every meter name starts with the prefix of the domain it belongs to, so
//! filters can select a whole family of meters by name.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricsDomain {
    /// Requests served by HTTP verticles
    HttpServer,
    /// Outgoing HTTP calls
    HttpClient,
    /// Verticle runtime and event loops
    Runtime,
}

impl MetricsDomain {
    pub const fn prefix(&self) -> &'static str {
        match self {
            MetricsDomain::HttpServer => "zeus_http_server_",
            MetricsDomain::HttpClient => "zeus_http_client_",
            MetricsDomain::Runtime => "zeus_runtime_",
        }
    }

    /// Full meter name for `name` within this domain
    pub fn meter_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Whether a meter name belongs to this domain
    pub fn contains(&self, meter_name: &str) -> bool {
        meter_name.starts_with(self.prefix())
    }
}

impl fmt::Display for MetricsDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('_'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_name_round_trip() {
        let name = MetricsDomain::HttpServer.meter_name("requests_seconds");
        assert_eq!(name, "zeus_http_server_requests_seconds");
        assert!(MetricsDomain::HttpServer.contains(&name));
        assert!(!MetricsDomain::HttpClient.contains(&name));
    }

    #[test]
    fn test_display() {
        assert_eq!(MetricsDomain::Runtime.to_string(), "zeus_runtime");
    }
}

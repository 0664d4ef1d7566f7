use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the resolver, the upstream client and the aggregator.
///
/// Variants only carry strings so a settled failure can be handed to every
/// caller that waited on the same fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    /// Request failed to complete or the upstream answered with a non-OK status.
    #[error("{endpoint} request failed: {message}")]
    Network { endpoint: &'static str, message: String },

    /// A successful response did not carry the expected fields.
    #[error("{endpoint} response is missing expected data: {message}")]
    DataShape { endpoint: &'static str, message: String },

    #[error("Unknown location '{0}'")]
    UnknownLocation(String),

    #[error("Weather fetch timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("Weather fetch was cancelled before it settled")]
    Cancelled,
}

impl WeatherError {
    pub fn network(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Network { endpoint, message: message.into() }
    }

    pub fn data_shape(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::DataShape { endpoint, message: message.into() }
    }
}

pub type Result<T, E = WeatherError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_endpoint() {
        let err = WeatherError::network("observation", "status 503");
        assert_eq!(err.to_string(), "observation request failed: status 503");

        let err = WeatherError::data_shape("forecast", "element 'Wx' not found");
        assert!(err.to_string().starts_with("forecast response is missing expected data"));
    }

    #[test]
    fn timeout_reports_seconds() {
        let err = WeatherError::Timeout { after: Duration::from_secs(10) };
        assert_eq!(err.to_string(), "Weather fetch timed out after 10s");
    }
}

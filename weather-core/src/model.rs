use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::moment::taiwan_offset;

/// Fields taken from the observation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentObservation {
    pub observation_time: DateTime<FixedOffset>,
    pub location_name: String,
    pub temperature: f64,
    pub wind_speed: f64,
}

/// Fields taken from the nearest bucket of the forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub description: String,
    pub weather_code: i32,
    pub rain_possibility: u8,
    pub comfortability: String,
}

/// Merged view model rendered by the weather card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub observation_time: DateTime<FixedOffset>,
    pub location_name: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub description: String,
    pub weather_code: i32,
    pub rain_possibility: u8,
    pub comfortability: String,
    pub is_loading: bool,
}

impl WeatherRecord {
    /// Placeholder shown before the first fetch cycle settles.
    pub fn placeholder(now: DateTime<FixedOffset>) -> Self {
        Self {
            observation_time: now,
            location_name: String::new(),
            temperature: 0.0,
            wind_speed: 0.0,
            description: String::new(),
            weather_code: 0,
            rain_possibility: 0,
            comfortability: String::new(),
            is_loading: true,
        }
    }

    pub fn merge(current: CurrentObservation, forecast: ForecastSummary) -> Self {
        Self {
            observation_time: current.observation_time,
            location_name: current.location_name,
            temperature: current.temperature,
            wind_speed: current.wind_speed,
            description: forecast.description,
            weather_code: forecast.weather_code,
            rain_possibility: forecast.rain_possibility,
            comfortability: forecast.comfortability,
            is_loading: false,
        }
    }
}

impl Default for WeatherRecord {
    fn default() -> Self {
        Self::placeholder(Utc::now().with_timezone(&taiwan_offset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_loading() {
        let record = WeatherRecord::default();
        assert!(record.is_loading);
        assert!(record.location_name.is_empty());
    }

    #[test]
    fn merge_takes_both_halves() {
        let observed = DateTime::parse_from_rfc3339("2024-06-21T14:00:00+08:00").unwrap();
        let record = WeatherRecord::merge(
            CurrentObservation {
                observation_time: observed,
                location_name: "臺北".into(),
                temperature: 31.2,
                wind_speed: 2.4,
            },
            ForecastSummary {
                description: "多雲午後短暫雷陣雨".into(),
                weather_code: 22,
                rain_possibility: 30,
                comfortability: "悶熱".into(),
            },
        );

        assert!(!record.is_loading);
        assert_eq!(record.observation_time, observed);
        assert_eq!(record.location_name, "臺北");
        assert_eq!(record.weather_code, 22);
        assert_eq!(record.comfortability, "悶熱");
    }
}

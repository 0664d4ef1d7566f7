//! Core library for the `weather` dashboard CLI.
//!
//! This crate defines:
//! - The static city table and its resolver
//! - Weather-code and day/night classification
//! - The Central Weather Administration open-data client
//! - The aggregator that merges observation and forecast into one record
//! - Application state and persisted settings
//!
//! It is used by `weather-cli`, but can also back other front ends.

pub mod aggregator;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod location;
pub mod model;
pub mod moment;
pub mod provider;
pub mod weather_code;

pub use aggregator::{FetchStatus, WeatherAggregator, WeatherState, fetch_weather};
pub use config::Config;
pub use dashboard::{Dashboard, Page};
pub use error::WeatherError;
pub use location::{Location, LocationKeys, available_locations, find_location, resolve};
pub use model::{CurrentObservation, ForecastSummary, WeatherRecord};
pub use moment::{Moment, SunTimesSource, SunWindow, SunriseSunsetTable, Theme};
pub use provider::{WeatherSource, cwb::CwbClient};
pub use weather_code::WeatherCodeClass;

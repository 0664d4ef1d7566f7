//! Static lookup from a selectable city to the keys each upstream endpoint expects.

use serde::Serialize;
use tracing::warn;

use crate::error::{Result, WeatherError};

/// City selected when nothing is stored or the stored name is unknown.
pub const DEFAULT_CITY_NAME: &str = "臺北市";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// County/city name used by the forecast endpoint and shown to the user.
    pub city_name: &'static str,
    /// Observation station name used by the observation endpoint.
    pub location_name: &'static str,
    /// County whose sunrise/sunset window decides day or night.
    pub sunrise_city_name: &'static str,
}

/// The pair of keys needed for one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKeys {
    pub observation_key: String,
    pub forecast_key: String,
}

impl Location {
    const fn new(
        city_name: &'static str,
        location_name: &'static str,
        sunrise_city_name: &'static str,
    ) -> Self {
        Self { city_name, location_name, sunrise_city_name }
    }

    pub fn keys(&self) -> LocationKeys {
        LocationKeys {
            observation_key: self.location_name.to_string(),
            forecast_key: self.city_name.to_string(),
        }
    }
}

static AVAILABLE_LOCATIONS: [Location; 21] = [
    Location::new("臺北市", "臺北", "臺北市"),
    Location::new("新北市", "板橋", "新北市"),
    Location::new("基隆市", "基隆", "基隆市"),
    Location::new("桃園市", "新屋", "桃園市"),
    Location::new("新竹縣", "新竹", "新竹縣"),
    Location::new("苗栗縣", "後龍", "苗栗縣"),
    Location::new("臺中市", "臺中", "臺中市"),
    Location::new("彰化縣", "彰師大", "彰化縣"),
    Location::new("南投縣", "日月潭", "南投縣"),
    Location::new("雲林縣", "古坑", "雲林縣"),
    Location::new("嘉義市", "嘉義", "嘉義市"),
    Location::new("嘉義縣", "阿里山", "嘉義縣"),
    Location::new("臺南市", "臺南", "臺南市"),
    Location::new("高雄市", "高雄", "高雄市"),
    Location::new("屏東縣", "恆春", "屏東縣"),
    Location::new("宜蘭縣", "宜蘭", "宜蘭縣"),
    Location::new("花蓮縣", "花蓮", "花蓮縣"),
    Location::new("臺東縣", "臺東", "臺東縣"),
    Location::new("澎湖縣", "澎湖", "澎湖縣"),
    Location::new("金門縣", "金門", "金門縣"),
    Location::new("連江縣", "馬祖", "連江縣"),
];

/// All selectable locations, in the order the settings form lists them.
pub fn available_locations() -> &'static [Location] {
    &AVAILABLE_LOCATIONS
}

pub fn default_location() -> &'static Location {
    &AVAILABLE_LOCATIONS[0]
}

/// Exact-match lookup. Unknown names are an error.
pub fn find_location(city_name: &str) -> Result<&'static Location> {
    AVAILABLE_LOCATIONS
        .iter()
        .find(|location| location.city_name == city_name)
        .ok_or_else(|| WeatherError::UnknownLocation(city_name.to_string()))
}

/// Lookup that never fails: a miss logs and yields [`default_location`].
pub fn resolve(city_name: &str) -> &'static Location {
    match find_location(city_name) {
        Ok(location) => location,
        Err(_) => {
            let fallback = default_location();
            warn!(
                requested = city_name,
                fallback = fallback.city_name,
                "unknown city, falling back to default location"
            );
            fallback
        }
    }
}

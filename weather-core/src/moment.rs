//! Day/night classification and the color theme derived from it.

use std::{collections::HashMap, fmt::Debug, fs, path::Path};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Offset of Taiwan local time; sun tables and observation times are expressed in it.
pub const TAIWAN_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub fn taiwan_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIWAN_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moment {
    Day,
    Night,
}

impl Moment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Moment::Day => "day",
            Moment::Night => "night",
        }
    }

    pub fn theme(&self) -> Theme {
        match self {
            Moment::Day => Theme::LIGHT,
            Moment::Night => Theme::DARK,
        }
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sunrise and sunset of one city on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunWindow {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}

impl SunWindow {
    /// Builds a window from local `HH:MM` clock times on `date` in Taiwan time.
    pub fn from_local_times(
        date: NaiveDate,
        sunrise: NaiveTime,
        sunset: NaiveTime,
    ) -> Option<Self> {
        let offset = taiwan_offset();
        Some(Self {
            sunrise: offset.from_local_datetime(&date.and_time(sunrise)).single()?,
            sunset: offset.from_local_datetime(&date.and_time(sunset)).single()?,
        })
    }

    /// Both boundaries count as day.
    pub fn moment_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Moment {
        if self.sunrise <= *now && *now <= self.sunset { Moment::Day } else { Moment::Night }
    }
}

/// Provider of sunrise/sunset data for a reference city.
#[async_trait]
pub trait SunTimesSource: Send + Sync + Debug {
    /// `Ok(None)` when the source has no entry for that city and date.
    async fn sun_window(&self, city_name: &str, date: NaiveDate) -> Result<Option<SunWindow>>;
}

/// Day or night in `reference_city_name` at `now`.
///
/// The date is taken in Taiwan local time. `Ok(None)` when the source knows
/// nothing about the city on that date.
pub async fn classify<Tz: TimeZone>(
    source: &dyn SunTimesSource,
    reference_city_name: &str,
    now: &DateTime<Tz>,
) -> Result<Option<Moment>> {
    let date = now.with_timezone(&taiwan_offset()).date_naive();
    let window = source.sun_window(reference_city_name, date).await?;
    Ok(window.map(|window| window.moment_at(now)))
}

/// Offline sunrise/sunset dataset.
///
/// ```json
/// [{ "locationName": "臺北市",
///    "time": [{ "dataTime": "2024-06-21", "sunrise": "05:04", "sunset": "18:47" }] }]
/// ```
#[derive(Debug, Clone, Default)]
pub struct SunriseSunsetTable {
    windows: HashMap<(String, NaiveDate), SunWindow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableLocation {
    location_name: String,
    time: Vec<TableDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDay {
    data_time: String,
    sunrise: String,
    sunset: String,
}

impl SunriseSunsetTable {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sunrise/sunset table: {}", path.display()))?;

        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse sunrise/sunset table: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let locations: Vec<TableLocation> = serde_json::from_str(json)?;
        let mut windows = HashMap::new();

        for location in locations {
            for day in location.time {
                let date = NaiveDate::parse_from_str(&day.data_time, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date '{}'", day.data_time))?;
                let sunrise = parse_clock(&day.sunrise)?;
                let sunset = parse_clock(&day.sunset)?;
                let window = SunWindow::from_local_times(date, sunrise, sunset)
                    .ok_or_else(|| anyhow!("Ambiguous local time on {date}"))?;

                windows.insert((location.location_name.clone(), date), window);
            }
        }

        Ok(Self { windows })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl SunTimesSource for SunriseSunsetTable {
    async fn sun_window(&self, city_name: &str, date: NaiveDate) -> Result<Option<SunWindow>> {
        Ok(self.windows.get(&(city_name.to_string(), date)).copied())
    }
}

pub(crate) fn parse_clock(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("Invalid clock time '{raw}'"))
}

/// Palette used to render the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: &'static str,
    pub background_color: &'static str,
    pub foreground_color: &'static str,
    pub box_shadow: &'static str,
    pub title_color: &'static str,
    pub temperature_color: &'static str,
    pub text_color: &'static str,
}

impl Theme {
    pub const LIGHT: Theme = Theme {
        name: "light",
        background_color: "#ededed",
        foreground_color: "#f9f9f9",
        box_shadow: "0 1px 3px 0 #999999",
        title_color: "#212121",
        temperature_color: "#757575",
        text_color: "#828282",
    };

    pub const DARK: Theme = Theme {
        name: "dark",
        background_color: "#1F2022",
        foreground_color: "#121416",
        box_shadow: "0 1px 4px 0 rgba(12, 12, 13, 0.2), 0 0 0 1px rgba(0, 0, 0, 0.15)",
        title_color: "#f9f9fa",
        temperature_color: "#dddddd",
        text_color: "#cccccc",
    };
}

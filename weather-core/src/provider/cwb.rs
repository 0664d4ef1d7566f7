use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::{Result, WeatherError},
    model::{CurrentObservation, ForecastSummary},
    moment::{SunTimesSource, SunWindow, parse_clock, taiwan_offset},
};

use super::WeatherSource;

pub const DEFAULT_BASE_URL: &str = "https://opendata.cwa.gov.tw/api/v1/rest/datastore";

const OBSERVATION_DATASET: &str = "O-A0003-001";
const FORECAST_DATASET: &str = "F-C0032-001";
const SUN_TIMES_DATASET: &str = "A-B0062-001";

const OBSERVATION: &str = "observation";
const FORECAST: &str = "forecast";
const SUN_TIMES: &str = "sun times";

/// Client for the Central Weather Administration open-data REST API.
#[derive(Debug, Clone)]
pub struct CwbClient {
    authorization_key: String,
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl CwbClient {
    pub fn new(
        authorization_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            authorization_key: authorization_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout of the underlying HTTP client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get_records<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        dataset: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{dataset}", self.base_url);
        debug!(endpoint, dataset, ?query, "requesting upstream dataset");

        let res = self
            .http
            .get(&url)
            .query(&[("Authorization", self.authorization_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|err| WeatherError::network(endpoint, err.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|err| {
                let message = format!("failed to read body: {}", err.without_url());
                WeatherError::network(endpoint, message)
            })?;

        if !status.is_success() {
            return Err(WeatherError::network(
                endpoint,
                format!("status {status}: {}", truncate_body(&body)),
            ));
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|err| WeatherError::data_shape(endpoint, format!("invalid JSON: {err}")))?;

        if let Some(flag) = envelope.success.as_deref().filter(|flag| *flag != "true") {
            let message = format!("upstream reported success={flag}");
            return Err(WeatherError::network(endpoint, message));
        }

        serde_json::from_value(envelope.records)
            .map_err(|err| WeatherError::data_shape(endpoint, format!("unexpected records: {err}")))
    }
}

/// `success` is checked before `records` is decoded into the dataset's shape.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<String>,
    #[serde(default)]
    records: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ObservationRecords {
    location: Vec<ObservationStation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationStation {
    location_name: String,
    time: ObservationTime,
    weather_element: Vec<ObservationElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationTime {
    obs_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationElement {
    element_name: String,
    element_value: String,
}

#[derive(Debug, Deserialize)]
struct ForecastRecords {
    location: Vec<ForecastCity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastCity {
    weather_element: Vec<ForecastElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastElement {
    element_name: String,
    time: Vec<ForecastBucket>,
}

#[derive(Debug, Deserialize)]
struct ForecastBucket {
    parameter: ForecastParameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastParameter {
    parameter_name: String,
    #[serde(default)]
    parameter_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SunRecords {
    locations: SunLocations,
}

#[derive(Debug, Deserialize)]
struct SunLocations {
    location: Vec<SunCounty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SunCounty {
    county_name: String,
    time: Vec<SunDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SunDay {
    date: String,
    sun_rise_time: String,
    sun_set_time: String,
}

/// Upstream payloads list their values as named elements in no fixed order.
trait NamedElement {
    fn element_name(&self) -> &str;
}

impl NamedElement for ObservationElement {
    fn element_name(&self) -> &str {
        &self.element_name
    }
}

impl NamedElement for ForecastElement {
    fn element_name(&self) -> &str {
        &self.element_name
    }
}

fn find_element<'a, E: NamedElement>(
    elements: &'a [E],
    name: &str,
    endpoint: &'static str,
) -> Result<&'a E> {
    elements
        .iter()
        .find(|element| element.element_name() == name)
        .ok_or_else(|| WeatherError::data_shape(endpoint, format!("element '{name}' not found")))
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str, endpoint: &'static str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        WeatherError::data_shape(endpoint, format!("element '{name}' is not a number: '{raw}'"))
    })
}

/// First (nearest) bucket of a forecast element.
fn nearest_bucket<'a>(
    elements: &'a [ForecastElement],
    name: &str,
) -> Result<&'a ForecastParameter> {
    let element = find_element(elements, name, FORECAST)?;
    element
        .time
        .first()
        .map(|bucket| &bucket.parameter)
        .ok_or_else(|| {
            WeatherError::data_shape(FORECAST, format!("element '{name}' has no time buckets"))
        })
}

/// Observation times come as local `YYYY-MM-DD HH:MM:SS`; newer payloads use RFC 3339.
fn parse_observation_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| taiwan_offset().from_local_datetime(&naive).single())
        .ok_or_else(|| WeatherError::data_shape(OBSERVATION, format!("invalid obsTime '{raw}'")))
}

impl ObservationRecords {
    fn into_observation(self) -> Result<CurrentObservation> {
        let station = self
            .location
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::data_shape(OBSERVATION, "no station in response"))?;

        let elements = &station.weather_element;
        let wind = find_element(elements, "WDSD", OBSERVATION)?;
        let temp = find_element(elements, "TEMP", OBSERVATION)?;

        Ok(CurrentObservation {
            observation_time: parse_observation_time(&station.time.obs_time)?,
            wind_speed: parse_number(&wind.element_value, "WDSD", OBSERVATION)?,
            temperature: parse_number(&temp.element_value, "TEMP", OBSERVATION)?,
            location_name: station.location_name,
        })
    }
}

impl ForecastRecords {
    fn into_summary(self) -> Result<ForecastSummary> {
        let city = self
            .location
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::data_shape(FORECAST, "no city in response"))?;

        let elements = &city.weather_element;
        let wx = nearest_bucket(elements, "Wx")?;
        let pop = nearest_bucket(elements, "PoP")?;
        let ci = nearest_bucket(elements, "CI")?;

        let code = wx
            .parameter_value
            .as_deref()
            .ok_or_else(|| WeatherError::data_shape(FORECAST, "element 'Wx' has no weather code"))?;

        Ok(ForecastSummary {
            description: wx.parameter_name.clone(),
            weather_code: parse_number(code, "Wx", FORECAST)?,
            rain_possibility: parse_number(&pop.parameter_name, "PoP", FORECAST)?,
            comfortability: ci.parameter_name.clone(),
        })
    }
}

impl SunRecords {
    fn into_window(self, city_name: &str, date: NaiveDate) -> Result<Option<SunWindow>> {
        let wanted = date.format("%Y-%m-%d").to_string();

        let Some(day) = self
            .locations
            .location
            .iter()
            .filter(|county| county.county_name == city_name)
            .flat_map(|county| county.time.iter())
            .find(|day| day.date == wanted)
        else {
            return Ok(None);
        };

        let clock = |raw: &str| {
            parse_clock(raw).map_err(|err| WeatherError::data_shape(SUN_TIMES, err.to_string()))
        };

        Ok(SunWindow::from_local_times(date, clock(&day.sun_rise_time)?, clock(&day.sun_set_time)?))
    }
}

#[async_trait]
impl WeatherSource for CwbClient {
    async fn current_observation(&self, observation_key: &str) -> Result<CurrentObservation> {
        let records: ObservationRecords = self
            .get_records(OBSERVATION, OBSERVATION_DATASET, &[("locationName", observation_key)])
            .await?;
        records.into_observation()
    }

    async fn forecast(&self, forecast_key: &str) -> Result<ForecastSummary> {
        let records: ForecastRecords = self
            .get_records(FORECAST, FORECAST_DATASET, &[("locationName", forecast_key)])
            .await?;
        records.into_summary()
    }
}

#[async_trait]
impl SunTimesSource for CwbClient {
    async fn sun_window(&self, city_name: &str, date: NaiveDate) -> Result<Option<SunWindow>> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = [("CountyName", city_name), ("Date", day.as_str())];
        let records: SunRecords = self.get_records(SUN_TIMES, SUN_TIMES_DATASET, &query).await?;
        records.into_window(city_name, date)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

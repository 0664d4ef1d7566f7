//! Application state of the dashboard: selected location, page, moment and
//! the aggregator feeding the weather card.

use std::{path::Path, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    Config,
    aggregator::{FetchStatus, WeatherAggregator, WeatherState},
    error::Result,
    location::{Location, find_location, resolve},
    model::WeatherRecord,
    moment::{self, Moment, SunTimesSource, Theme},
    provider::WeatherSource,
    weather_code,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    WeatherCard,
    WeatherSetting,
}

#[derive(Debug)]
pub struct Dashboard {
    source: Arc<dyn WeatherSource>,
    sun_times: Arc<dyn SunTimesSource>,
    timeout: Duration,
    location: &'static Location,
    aggregator: WeatherAggregator,
    moment: Moment,
    page: Page,
}

impl Dashboard {
    /// Resolves `city_name` and computes the moment. Does not fetch weather.
    pub async fn new(
        source: Arc<dyn WeatherSource>,
        sun_times: Arc<dyn SunTimesSource>,
        city_name: &str,
        timeout: Duration,
    ) -> Self {
        let location = resolve(city_name);
        let aggregator = WeatherAggregator::new(source.clone(), location.keys(), timeout);
        let moment = current_moment(sun_times.as_ref(), location, &Utc::now()).await;

        Self {
            source,
            sun_times,
            timeout,
            location,
            aggregator,
            moment,
            page: Page::WeatherCard,
        }
    }

    pub async fn from_config(
        config: &Config,
        source: Arc<dyn WeatherSource>,
        sun_times: Arc<dyn SunTimesSource>,
    ) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs());
        Self::new(source, sun_times, config.city_name(), timeout).await
    }

    pub fn location(&self) -> &'static Location {
        self.location
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn moment(&self) -> Moment {
        self.moment
    }

    pub fn theme(&self) -> Theme {
        self.moment.theme()
    }

    pub fn weather(&self) -> WeatherState {
        self.aggregator.snapshot()
    }

    pub fn aggregator(&self) -> &WeatherAggregator {
        &self.aggregator
    }

    /// Icon for the current record, `None` when the weather code has no class.
    pub fn icon_name(&self) -> Option<String> {
        let code = self.aggregator.snapshot().record.weather_code;
        weather_code::classify(code).map(|class| class.icon_name(self.moment))
    }

    /// Initial fetch for the active location; no-op once a cycle has settled.
    ///
    /// While a cycle is in flight this joins it instead of returning the
    /// loading placeholder.
    pub async fn load(&self) -> Result<WeatherRecord> {
        let state = self.aggregator.snapshot();
        match state.status {
            FetchStatus::Idle | FetchStatus::Loading => self.aggregator.refresh().await,
            FetchStatus::Failed(err) => Err(err),
            FetchStatus::Ready => Ok(state.record),
        }
    }

    /// Manual refresh.
    pub async fn refresh(&self) -> Result<WeatherRecord> {
        self.aggregator.refresh().await
    }

    pub fn open_settings(&mut self) {
        self.page = Page::WeatherSetting;
    }

    pub fn close_settings(&mut self) {
        self.page = Page::WeatherCard;
    }

    /// Persist `city_name` and switch the dashboard to it.
    pub async fn save_city(
        &mut self,
        city_name: &str,
        config: &mut Config,
        config_path: &Path,
    ) -> anyhow::Result<()> {
        let location = find_location(city_name)?;

        config.set_city_name(location.city_name);
        config.save_to(config_path)?;
        info!(city = location.city_name, "saved city selection");

        self.switch_location(location).await;
        self.page = Page::WeatherCard;
        Ok(())
    }

    async fn switch_location(&mut self, location: &'static Location) {
        if location == self.location {
            return;
        }
        self.location = location;
        self.aggregator =
            WeatherAggregator::new(self.source.clone(), location.keys(), self.timeout);
        self.moment = current_moment(self.sun_times.as_ref(), location, &Utc::now()).await;
    }

    /// Recompute the moment for the active location at `now`.
    pub async fn recompute_moment_at(&mut self, now: &DateTime<Utc>) -> Moment {
        self.moment = current_moment(self.sun_times.as_ref(), self.location, now).await;
        self.moment
    }
}

/// Missing sun data falls back to day.
async fn current_moment(
    sun_times: &dyn SunTimesSource,
    location: &Location,
    now: &DateTime<Utc>,
) -> Moment {
    match moment::classify(sun_times, location.sunrise_city_name, now).await {
        Ok(Some(moment)) => moment,
        Ok(None) => {
            warn!(city = location.sunrise_city_name, "no sunrise/sunset data, assuming day");
            Moment::Day
        }
        Err(err) => {
            warn!(
                city = location.sunrise_city_name,
                error = %err,
                "sun times unavailable, assuming day"
            );
            Moment::Day
        }
    }
}

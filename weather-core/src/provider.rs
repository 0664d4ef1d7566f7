use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    Config,
    error::Result,
    model::{CurrentObservation, ForecastSummary},
    moment::{SunTimesSource, SunriseSunsetTable},
    provider::cwb::CwbClient,
};

pub mod cwb;

/// Added to the fetch-cycle timeout for the HTTP client so the cycle deadline
/// fires first and surfaces as `WeatherError::Timeout`.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Upstream seam of the aggregator: one call per endpoint.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Real-time observation for a weather station.
    async fn current_observation(&self, observation_key: &str) -> Result<CurrentObservation>;

    /// Nearest forecast bucket for a city.
    async fn forecast(&self, forecast_key: &str) -> Result<ForecastSummary>;
}

/// Construct the upstream client from config.
pub fn client_from_config(config: &Config) -> anyhow::Result<CwbClient> {
    let key = config.authorization_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No authorization key configured.\n\
             Hint: run `weather configure` or set CWB_AUTHORIZATION_KEY."
        )
    })?;

    let timeout = Duration::from_secs(config.request_timeout_secs()) + CLIENT_TIMEOUT_GRACE;
    CwbClient::new(key, config.base_url(), timeout)
}

/// Sun-time source: the offline table when one is configured, else the upstream client.
pub fn sun_source_from_config(
    config: &Config,
    client: &CwbClient,
) -> anyhow::Result<Arc<dyn SunTimesSource>> {
    match &config.sun_table_path {
        Some(path) => {
            let table = SunriseSunsetTable::load(path)?;
            debug!(path = %path.display(), entries = table.len(), "loaded sunrise/sunset table");
            Ok(Arc::new(table))
        }
        None => Ok(Arc::new(client.clone())),
    }
}

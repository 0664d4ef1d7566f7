//! Fetches both upstream endpoints for one location and merges them into a
//! single [`WeatherRecord`].
//!
//! At most one fetch cycle runs per aggregator: a refresh issued while another
//! is in flight waits for that cycle and shares its outcome. State changes are
//! published on a `watch` channel so a UI can observe the loading flag.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, WeatherError},
    location::LocationKeys,
    model::WeatherRecord,
    provider::WeatherSource,
};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    /// No cycle has run yet.
    Idle,
    Loading,
    Ready,
    /// Last cycle failed; the record still holds the data of the previous success.
    Failed(WeatherError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherState {
    pub record: WeatherRecord,
    pub status: FetchStatus,
}

/// Fetch observation and forecast concurrently and merge them.
///
/// Either request failing fails the whole call; nothing from the other
/// request is kept.
pub async fn fetch_weather(
    source: &dyn WeatherSource,
    keys: &LocationKeys,
) -> Result<WeatherRecord> {
    let (current, forecast) = tokio::try_join!(
        source.current_observation(&keys.observation_key),
        source.forecast(&keys.forecast_key),
    )?;

    Ok(WeatherRecord::merge(current, forecast))
}

#[derive(Debug)]
pub struct WeatherAggregator {
    source: Arc<dyn WeatherSource>,
    keys: LocationKeys,
    timeout: Duration,
    state: watch::Sender<WeatherState>,
}

impl WeatherAggregator {
    pub fn new(source: Arc<dyn WeatherSource>, keys: LocationKeys, timeout: Duration) -> Self {
        let (state, _) = watch::channel(WeatherState {
            record: WeatherRecord::default(),
            status: FetchStatus::Idle,
        });

        Self { source, keys, timeout, state }
    }

    pub fn keys(&self) -> &LocationKeys {
        &self.keys
    }

    pub fn snapshot(&self) -> WeatherState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.state.subscribe()
    }

    /// Run one fetch cycle, or join the one already in flight.
    pub async fn refresh(&self) -> Result<WeatherRecord> {
        let started = self.state.send_if_modified(|state| {
            if matches!(state.status, FetchStatus::Loading) {
                return false;
            }
            state.status = FetchStatus::Loading;
            state.record.is_loading = true;
            true
        });

        if !started {
            debug!(keys = ?self.keys, "refresh already in flight, waiting for it");
            return self.settled().await;
        }

        let in_flight = InFlight { state: &self.state, settled: false };

        let cycle = fetch_weather(self.source.as_ref(), &self.keys);
        let outcome = match tokio::time::timeout(self.timeout, cycle).await {
            Ok(result) => result,
            Err(_) => Err(WeatherError::Timeout { after: self.timeout }),
        };

        match &outcome {
            Ok(record) => info!(
                location = %record.location_name,
                weather_code = record.weather_code,
                "weather refreshed"
            ),
            Err(err) => warn!(keys = ?self.keys, error = %err, "weather refresh failed"),
        }

        in_flight.settle(&outcome);
        outcome
    }

    async fn settled(&self) -> Result<WeatherRecord> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state.status, FetchStatus::Loading))
            .await
            .map_err(|_| WeatherError::Cancelled)?;

        match &state.status {
            FetchStatus::Failed(err) => Err(err.clone()),
            _ => Ok(state.record.clone()),
        }
    }
}

/// Settles the shared state even when the refresh future is dropped mid-flight.
struct InFlight<'a> {
    state: &'a watch::Sender<WeatherState>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: &Result<WeatherRecord>) {
        self.state.send_modify(|state| match outcome {
            Ok(record) => {
                state.record = record.clone();
                state.status = FetchStatus::Ready;
            }
            Err(err) => {
                state.record.is_loading = false;
                state.status = FetchStatus::Failed(err.clone());
            }
        });
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("weather refresh dropped before completion");
        self.state.send_modify(|state| {
            state.record.is_loading = false;
            state.status = FetchStatus::Failed(WeatherError::Cancelled);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::model::{CurrentObservation, ForecastSummary};

    #[derive(Debug, Default)]
    struct FakeSource {
        delay: Duration,
        observation_error: Mutex<Option<WeatherError>>,
        forecast_error: Mutex<Option<WeatherError>>,
        forecast_code: Mutex<i32>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_delay(delay: Duration) -> Self {
            Self { delay, ..Self::default() }
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn current_observation(&self, observation_key: &str) -> Result<CurrentObservation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if let Some(err) = self.observation_error.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(CurrentObservation {
                observation_time: DateTime::parse_from_rfc3339("2024-06-21T14:00:00+08:00")
                    .unwrap(),
                location_name: observation_key.to_string(),
                temperature: 28.6,
                wind_speed: 3.1,
            })
        }

        async fn forecast(&self, _forecast_key: &str) -> Result<ForecastSummary> {
            tokio::time::sleep(self.delay).await;
            if let Some(err) = self.forecast_error.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(ForecastSummary {
                description: "晴時多雲".into(),
                weather_code: *self.forecast_code.lock().unwrap(),
                rain_possibility: 10,
                comfortability: "舒適".into(),
            })
        }
    }

    fn keys() -> LocationKeys {
        LocationKeys { observation_key: "臺北".into(), forecast_key: "臺北市".into() }
    }

    fn aggregator(source: Arc<FakeSource>) -> WeatherAggregator {
        WeatherAggregator::new(source, keys(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn starts_idle_and_loading() {
        let agg = aggregator(Arc::new(FakeSource::default()));
        let state = agg.snapshot();
        assert_eq!(state.status, FetchStatus::Idle);
        assert!(state.record.is_loading);
    }

    #[tokio::test]
    async fn refresh_merges_both_endpoints() {
        let source = Arc::new(FakeSource::default());
        *source.forecast_code.lock().unwrap() = 2;
        let agg = aggregator(source);

        let record = agg.refresh().await.unwrap();
        assert!(!record.is_loading);
        assert_eq!(record.location_name, "臺北");
        assert_eq!(record.temperature, 28.6);
        assert_eq!(record.wind_speed, 3.1);
        assert_eq!(record.description, "晴時多雲");
        assert_eq!(record.weather_code, 2);
        assert_eq!(record.rain_possibility, 10);
        assert_eq!(record.comfortability, "舒適");

        let state = agg.snapshot();
        assert_eq!(state.status, FetchStatus::Ready);
        assert_eq!(state.record, record);
    }

    #[tokio::test]
    async fn observation_failure_commits_nothing() {
        let source = Arc::new(FakeSource::default());
        *source.observation_error.lock().unwrap() =
            Some(WeatherError::network("observation", "status 500"));
        let agg = aggregator(source);
        let before = agg.snapshot().record;

        let err = agg.refresh().await.unwrap_err();
        assert!(matches!(err, WeatherError::Network { endpoint: "observation", .. }));

        let state = agg.snapshot();
        assert_eq!(state.status, FetchStatus::Failed(err));
        assert!(!state.record.is_loading);
        assert_eq!(state.record.description, before.description);
        assert_eq!(state.record.location_name, before.location_name);
    }

    #[tokio::test]
    async fn forecast_failure_keeps_previous_record() {
        let source = Arc::new(FakeSource::default());
        *source.forecast_code.lock().unwrap() = 1;
        let agg = aggregator(source.clone());
        let first = agg.refresh().await.unwrap();

        *source.forecast_code.lock().unwrap() = 8;
        *source.forecast_error.lock().unwrap() =
            Some(WeatherError::data_shape("forecast", "element 'CI' not found"));
        let err = agg.refresh().await.unwrap_err();
        assert!(matches!(err, WeatherError::DataShape { .. }));

        let state = agg.snapshot();
        assert_eq!(state.record, first);
        assert!(matches!(state.status, FetchStatus::Failed(_)));
    }

    #[tokio::test]
    async fn loading_flag_is_visible_while_in_flight() {
        let agg = aggregator(Arc::new(FakeSource::with_delay(Duration::from_millis(50))));

        let (result, seen_loading) = tokio::join!(agg.refresh(), async {
            tokio::task::yield_now().await;
            let state = agg.snapshot();
            state.record.is_loading && state.status == FetchStatus::Loading
        });

        assert!(result.is_ok());
        assert!(seen_loading);
        assert!(!agg.snapshot().record.is_loading);
    }

    #[tokio::test]
    async fn overlapping_refreshes_are_coalesced() {
        let source = Arc::new(FakeSource::with_delay(Duration::from_millis(50)));
        let agg = aggregator(source.clone());

        let (first, second) = tokio::join!(agg.refresh(), agg.refresh());

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let source = Arc::new(FakeSource::with_delay(Duration::from_secs(30)));
        let agg = WeatherAggregator::new(source, keys(), Duration::from_millis(20));

        let err = agg.refresh().await.unwrap_err();
        assert_eq!(err, WeatherError::Timeout { after: Duration::from_millis(20) });
        assert!(!agg.snapshot().record.is_loading);
    }

    #[tokio::test]
    async fn dropped_refresh_does_not_stick_loading() {
        let agg = aggregator(Arc::new(FakeSource::with_delay(Duration::from_secs(30))));

        let outer = tokio::time::timeout(Duration::from_millis(20), agg.refresh()).await;
        assert!(outer.is_err());

        let state = agg.snapshot();
        assert!(!state.record.is_loading);
        assert_eq!(state.status, FetchStatus::Failed(WeatherError::Cancelled));
    }

    #[tokio::test]
    async fn subscribers_see_settled_state() {
        let agg = aggregator(Arc::new(FakeSource::default()));
        let mut rx = agg.subscribe();

        agg.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, FetchStatus::Ready);
    }
}

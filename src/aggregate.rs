use std::fmt;

use crate::config::WindowConfig;
use crate::model::{
    AirQualityReading, AirQualitySummary, BirdObservation, BirdSummary, WeatherReading,
    WeatherSummary,
};
use crate::store::{ReadingStore, StoreError};

#[derive(Debug)]
pub enum QueryError {
    /// The window is legitimately empty. Not a fault.
    NoRecentReadings,
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        QueryError::Store(err)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::NoRecentReadings => write!(f, "no recent readings"),
            QueryError::Store(e) => write!(f, "store failure: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

// Every window is anchored at the caller-supplied `now`, so the boundary is
// a pure function of its arguments and pins down exactly in tests.

/// Newest environmental reading inside the latest window.
pub fn latest_weather(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<WeatherReading, QueryError> {
    store
        .latest_weather_since(now - windows.latest_window_secs)?
        .ok_or(QueryError::NoRecentReadings)
}

/// Newest particulate reading inside the latest window.
pub fn latest_air_quality(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<AirQualityReading, QueryError> {
    store
        .latest_air_quality_since(now - windows.latest_window_secs)?
        .ok_or(QueryError::NoRecentReadings)
}

/// Newest bird observation inside the latest window.
pub fn latest_bird(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<BirdObservation, QueryError> {
    store
        .latest_bird_since(now - windows.latest_window_secs)?
        .ok_or(QueryError::NoRecentReadings)
}

/// Per-field averages over the latest window. An empty window is an error,
/// never a row of zeros.
pub fn recent_weather(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<WeatherSummary, QueryError> {
    let summary = store.weather_summary_since(now - windows.latest_window_secs)?;
    if summary.num_readings == 0 {
        return Err(QueryError::NoRecentReadings);
    }
    Ok(summary)
}

pub fn recent_air_quality(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<AirQualitySummary, QueryError> {
    let summary = store.air_quality_summary_since(now - windows.latest_window_secs)?;
    if summary.num_readings == 0 {
        return Err(QueryError::NoRecentReadings);
    }
    Ok(summary)
}

/// Who is at the feeder right now: confidence-ranked species over the short
/// observation window, floored so classifier noise stays out.
pub fn observed_birds(
    store: &ReadingStore,
    windows: &WindowConfig,
    now: f64,
) -> Result<BirdSummary, QueryError> {
    let summary = store.bird_summary_since(
        now - windows.observation_window_secs,
        windows.confidence_floor,
    )?;
    if summary.num_readings == 0 {
        return Err(QueryError::NoRecentReadings);
    }
    Ok(summary)
}

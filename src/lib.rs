pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod model;
pub mod sensor;
pub mod server;
pub mod store;

use crate::aggregate::QueryError;
use crate::config::{HubConfig, WindowConfig};
use crate::model::{
    epoch_now, AirQualityIngest, AirQualityReading, AirQualitySummary, BirdIngest,
    BirdObservation, BirdSummary, WeatherIngest, WeatherReading, WeatherSummary,
};
use crate::store::{ReadingStore, StoreError};

/// Shared station state behind the API: one reading store plus the window
/// parameters. Handlers stay stateless and borrow this through an `Arc`.
pub struct WeatherHub {
    store: ReadingStore,
    windows: WindowConfig,
}

impl WeatherHub {
    /// Opens the store and runs table bootstrap. Callers bind endpoints
    /// only after this returns.
    pub fn open(config: &HubConfig) -> Result<Self, StoreError> {
        let store = ReadingStore::open(&config.db_path)?;
        Ok(Self {
            store,
            windows: config.windows,
        })
    }

    // --- INGESTION ---

    /// Appends one environmental reading. `Ok(false)` means the id had
    /// already been stored and this delivery was absorbed.
    pub fn ingest_weather(&self, payload: WeatherIngest) -> Result<bool, StoreError> {
        self.store.append_weather(&payload.into())
    }

    pub fn ingest_air_quality(&self, payload: AirQualityIngest) -> Result<bool, StoreError> {
        self.store.append_air_quality(&payload.into())
    }

    pub fn ingest_bird(&self, payload: BirdIngest) -> Result<bool, StoreError> {
        self.store.append_bird(&payload.into())
    }

    // --- QUERIES ---
    // Each call anchors its window at the current clock.

    pub fn latest_weather(&self) -> Result<WeatherReading, QueryError> {
        aggregate::latest_weather(&self.store, &self.windows, epoch_now())
    }

    pub fn latest_air_quality(&self) -> Result<AirQualityReading, QueryError> {
        aggregate::latest_air_quality(&self.store, &self.windows, epoch_now())
    }

    pub fn latest_bird(&self) -> Result<BirdObservation, QueryError> {
        aggregate::latest_bird(&self.store, &self.windows, epoch_now())
    }

    pub fn recent_weather(&self) -> Result<WeatherSummary, QueryError> {
        aggregate::recent_weather(&self.store, &self.windows, epoch_now())
    }

    pub fn recent_air_quality(&self) -> Result<AirQualitySummary, QueryError> {
        aggregate::recent_air_quality(&self.store, &self.windows, epoch_now())
    }

    pub fn observed_birds(&self) -> Result<BirdSummary, QueryError> {
        aggregate::observed_birds(&self.store, &self.windows, epoch_now())
    }
}

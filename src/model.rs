use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch as a float. Readings carry producer-assigned
/// stamps on this axis; the hub samples it once per query to anchor windows.
pub fn epoch_now() -> f64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        // A clock before the epoch reads as zero.
        Err(_) => 0.0,
    }
}

/// Reading ids must be non-empty; whitespace does not count.
pub fn id_is_valid(id: &str) -> bool {
    !id.trim().is_empty()
}

// --- STORED ROWS ---

/// One environmental sample as stored. Measurement columns are nullable;
/// rows from older producers can carry gaps in any of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReading {
    pub id: String,
    pub ts: f64, // producer-assigned epoch seconds
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

/// One particulate sample as stored, ug/m3 per size bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AirQualityReading {
    pub id: String,
    pub ts: f64,
    pub pm1: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

/// One identified bird call as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BirdObservation {
    pub id: String,
    pub ts: f64,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub confidence: Option<f64>, // classifier score in [0, 1]
}

// --- WIRE PAYLOADS ---

/// Body of POST /weather/latest. Every field is required on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherIngest {
    pub id: String,
    pub ts: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

impl From<WeatherIngest> for WeatherReading {
    fn from(p: WeatherIngest) -> Self {
        Self {
            id: p.id,
            ts: p.ts,
            temperature: Some(p.temperature),
            humidity: Some(p.humidity),
            pressure: Some(p.pressure),
        }
    }
}

/// Body of POST /air/latest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityIngest {
    pub id: String,
    pub ts: f64,
    pub pm1: f64,
    pub pm2_5: f64,
    pub pm10: f64,
}

impl From<AirQualityIngest> for AirQualityReading {
    fn from(p: AirQualityIngest) -> Self {
        Self {
            id: p.id,
            ts: p.ts,
            pm1: Some(p.pm1),
            pm2_5: Some(p.pm2_5),
            pm10: Some(p.pm10),
        }
    }
}

/// Body of POST /birds/latest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdIngest {
    pub id: String,
    pub ts: f64,
    pub scientific_name: String,
    pub common_name: String,
    pub confidence: f64,
}

impl From<BirdIngest> for BirdObservation {
    fn from(p: BirdIngest) -> Self {
        Self {
            id: p.id,
            ts: p.ts,
            scientific_name: Some(p.scientific_name),
            common_name: Some(p.common_name),
            confidence: Some(p.confidence),
        }
    }
}

// --- WINDOW SUMMARIES ---

/// Sliding-window averages over environmental rows. Each field averages its
/// own non-null values; `latest_reading` is the newest stamp in the window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherSummary {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub num_readings: i64,
    pub latest_reading: Option<f64>,
}

/// Sliding-window averages over particulate rows.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AirQualitySummary {
    pub pm1: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub num_readings: i64,
    pub latest_reading: Option<f64>,
}

/// One ranked species in the observation window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BirdTally {
    pub common_name: String,
    pub confidence: f64, // summed over the window
}

/// Confidence-ranked species heard in the observation window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BirdSummary {
    pub sightings: Vec<BirdTally>,
    pub num_readings: i64,
    pub latest_reading: Option<f64>,
}

use std::path::PathBuf;

/// Sliding-window parameters for the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// How far back "latest" and the recent averages look, in seconds.
    pub latest_window_secs: f64,
    /// The shorter horizon for the bird ranking, in seconds.
    pub observation_window_secs: f64,
    /// Observations scoring below this never enter the ranking.
    pub confidence_floor: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            latest_window_secs: 300.0,
            observation_window_secs: 60.0,
            confidence_floor: 0.1,
        }
    }
}

/// Everything the hub needs to come up. Built from flags in main and handed
/// to `WeatherHub::open`; no module-level state anywhere.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub db_path: PathBuf,
    pub windows: WindowConfig,
}

/// Producer-side settings for stratus-logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Base URL of the hub readings are forwarded to.
    pub server_url: String,
    /// The producer's own local database file.
    pub db_path: PathBuf,
    /// Seconds between sampling cycles.
    pub interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_match_the_station_cadence() {
        let windows = WindowConfig::default();
        assert_eq!(windows.latest_window_secs, 300.0);
        assert_eq!(windows.observation_window_secs, 60.0);
        assert_eq!(windows.confidence_floor, 0.1);
    }
}

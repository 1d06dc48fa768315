use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use stratus::config::LoggerConfig;
use stratus::model::{epoch_now, AirQualityIngest, WeatherIngest};
use stratus::sensor::{SimulatedBme280, SimulatedPms5003};
use stratus::store::ReadingStore;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the hub readings are forwarded to
    #[clap(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// SQLite file for the producer's own local copy
    #[clap(long, default_value = "db/stratus-logger.db")]
    db: PathBuf,

    /// Seconds between sampling cycles
    #[clap(long, default_value = "60")]
    interval_secs: u64,
}

fn main() {
    let args = Args::parse();

    println!("--- [Stratus Logger] ---");
    println!("Hub: {}", args.server);
    println!("Local Database: {}", args.db.display());
    println!("Interval: {}s", args.interval_secs);
    println!("------------------------");

    let config = LoggerConfig {
        server_url: args.server,
        db_path: args.db,
        interval_secs: args.interval_secs,
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(async_main(config));
}

async fn async_main(config: LoggerConfig) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,stratus=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let store = ReadingStore::open(&config.db_path).expect("Failed to open local store");
    let client = reqwest::Client::new();
    let instance = Uuid::new_v4();
    tracing::info!(
        "logger instance {} sampling every {}s",
        instance,
        config.interval_secs
    );

    let mut bme = SimulatedBme280::new();
    let mut pms = SimulatedPms5003::new();

    // interval(0) panics; one second is the shortest sane cadence.
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    loop {
        ticker.tick().await;
        run_cycle(&store, &client, &config.server_url, &mut bme, &mut pms).await;
    }
}

/// One sampling pass. Both categories share the cycle's run id, so a
/// re-delivered cycle collapses into the same rows hub-side. Every failure
/// on the data path is logged and swallowed; sampling never stops.
async fn run_cycle(
    store: &ReadingStore,
    client: &reqwest::Client,
    base_url: &str,
    bme: &mut SimulatedBme280,
    pms: &mut SimulatedPms5003,
) {
    let run_id = Uuid::now_v7().to_string();
    let ts = epoch_now();

    match bme.sample() {
        Ok(sample) => {
            let payload = WeatherIngest {
                id: run_id.clone(),
                ts,
                temperature: sample.temperature,
                humidity: sample.humidity,
                pressure: sample.pressure,
            };
            if let Err(e) = store.append_weather(&payload.clone().into()) {
                tracing::error!("local weather append failed: {}", e);
            }
            forward(client, base_url, "weather", &payload).await;
        }
        Err(e) => tracing::warn!("environmental probe read failed: {}", e),
    }

    match pms.sample() {
        Ok(sample) => {
            let payload = AirQualityIngest {
                id: run_id,
                ts,
                pm1: sample.pm1,
                pm2_5: sample.pm2_5,
                pm10: sample.pm10,
            };
            if let Err(e) = store.append_air_quality(&payload.clone().into()) {
                tracing::error!("local air quality append failed: {}", e);
            }
            forward(client, base_url, "air", &payload).await;
        }
        Err(e) => tracing::warn!("particulate probe read failed: {}", e),
    }
}

/// Forwarding is fire-and-forget. The hub going away must never stall
/// sampling or the local record.
async fn forward<T: serde::Serialize>(
    client: &reqwest::Client,
    base_url: &str,
    category: &str,
    payload: &T,
) {
    let url = format!("{}/{}/latest", base_url.trim_end_matches('/'), category);
    match client.post(&url).json(payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("forwarded {} reading", category);
        }
        Ok(resp) => tracing::warn!("hub rejected {} reading: HTTP {}", category, resp.status()),
        Err(e) => tracing::warn!("forwarding {} reading failed: {}", category, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn cycle_records_locally_even_with_the_hub_down() {
        let dir = tempdir().unwrap();
        let store = ReadingStore::open(&dir.path().join("logger.db")).unwrap();
        let client = reqwest::Client::new();
        let mut bme = SimulatedBme280::new();
        let mut pms = SimulatedPms5003::new();

        // Nothing listens here; forwarding fails, sampling goes on.
        let base = "http://127.0.0.1:9";

        // A probe read can drop out, so give the cycle a few chances.
        for _ in 0..10 {
            run_cycle(&store, &client, base, &mut bme, &mut pms).await;
            let weather = store.weather_summary_since(0.0).unwrap();
            let air = store.air_quality_summary_since(0.0).unwrap();
            if weather.num_readings > 0 && air.num_readings > 0 {
                break;
            }
        }

        assert!(store.weather_summary_since(0.0).unwrap().num_readings > 0);
        assert!(store.air_quality_summary_since(0.0).unwrap().num_readings > 0);
    }

    #[tokio::test]
    async fn cycles_mint_distinct_run_ids() {
        let dir = tempdir().unwrap();
        let store = ReadingStore::open(&dir.path().join("logger.db")).unwrap();
        let client = reqwest::Client::new();
        let mut bme = SimulatedBme280::new();
        let mut pms = SimulatedPms5003::new();
        let base = "http://127.0.0.1:9";

        for _ in 0..10 {
            run_cycle(&store, &client, base, &mut bme, &mut pms).await;
        }

        // Ten cycles, ten ids; every good read landed as its own row.
        let weather = store.weather_summary_since(0.0).unwrap();
        assert!(weather.num_readings > 1);
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use stratus::config::{HubConfig, WindowConfig};
use stratus::server;
use stratus::WeatherHub;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Port the API binds on
    #[clap(long, default_value = "8000")]
    port: u16,

    /// SQLite file holding the reading store
    #[clap(long, default_value = "db/stratus.db")]
    db: PathBuf,

    /// Sliding window for latest/recent queries, in seconds
    #[clap(long, default_value = "300")]
    latest_window_secs: f64,

    /// Sliding window for the bird ranking, in seconds
    #[clap(long, default_value = "60")]
    observation_window_secs: f64,

    /// Observations scoring below this are ignored by the ranking
    #[clap(long, default_value = "0.1")]
    confidence_floor: f64,
}

fn main() {
    let args = Args::parse();

    println!("--- [Stratus Weather Hub] ---");
    println!("Database: {}", args.db.display());
    println!("Latest Window: {}s", args.latest_window_secs);
    println!("Observation Window: {}s", args.observation_window_secs);
    println!("-----------------------------");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,stratus=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = HubConfig {
        db_path: args.db.clone(),
        windows: WindowConfig {
            latest_window_secs: args.latest_window_secs,
            observation_window_secs: args.observation_window_secs,
            confidence_floor: args.confidence_floor,
        },
    };

    println!("Initializing Reading Store...");
    // Bootstrap completes before the port opens; no request ever races
    // table creation.
    let hub = Arc::new(WeatherHub::open(&config).expect("Failed to open reading store"));

    let server_hub = hub.clone();
    let port = args.port;
    tokio::spawn(async move {
        server::run(server_hub, port).await;
    });

    println!("Stratus API listening on port {}", args.port);
    println!("Hub is Ready.");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    println!("Shutting down.");
}

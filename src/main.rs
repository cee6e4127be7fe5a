//! spotify-mqtt - Main Entry Point
//!
//! Polls the Spotify player state and republishes it as a retained MQTT
//! message until SIGINT or SIGTERM.

use clap::{Parser, Subcommand};
use spotify_mqtt::config::BridgeConfig;
use spotify_mqtt::error::sanitize_error_message;
use spotify_mqtt::mqtt_span;
use spotify_mqtt::observability::init_default_logging;
use spotify_mqtt::poller::Poller;
use spotify_mqtt::transport::mqtt::{message_handler::run_echo_logger, MqttClient};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Default configuration file locations, in lookup order
const DEFAULT_CONFIG_PATHS: &[&str] = &["spotify-mqtt.toml", "config/spotify-mqtt.toml"];

/// Publish the Spotify "now playing" state to an MQTT topic
#[derive(Parser)]
#[command(name = "spotify-mqtt")]
#[command(about = "Publish the Spotify now-playing state as a retained MQTT message")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "SPOTIFY_MQTT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting spotify-mqtt v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "Failed to load configuration: {}",
                sanitize_error_message(&e.to_string())
            );
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", sanitize_error_message(&e.to_string()));
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(BridgeConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(BridgeConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, reading MQTT_SERVER, MQTT_PORT and MQTT_TOPIC");
    Ok(BridgeConfig::from_env()?)
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = config.spotify_credentials()?;

    let mut client = MqttClient::new(config.mqtt.clone())?;
    client
        .connect()
        .instrument(mqtt_span!(server = %config.mqtt.server, port = config.mqtt.port))
        .await?;

    let echo_task = client
        .take_inbound_receiver()
        .map(|receiver| tokio::spawn(run_echo_logger(receiver)));

    let mut poller = Poller::from_config(&config, credentials, client)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        let _ = shutdown_tx.send(true);
    });

    let result = poller.run(shutdown_rx).await;
    poller.shutdown().await;

    // The echo channel closes once the client is gone
    if let Some(handle) = echo_task {
        if tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .is_err()
        {
            warn!("Echo logger did not stop in time");
        }
    }

    result.map_err(Into::into)
}

fn handle_config_command(
    config: &BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);

        match config.spotify_credentials() {
            Ok(credentials) => println!("Spotify credentials: {credentials:?}"),
            Err(e) => println!("Spotify credentials: unavailable ({e})"),
        }
    }

    info!("Configuration validation complete");
    Ok(())
}

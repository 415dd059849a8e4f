//! Main entry point for the cart admin service.
//!
//! Loads the configuration, wires storage and the refund provider into the
//! admin engine, and serves the admin API until interrupted.

use cart_config::Config;
use cart_core::{AdminBuilder, AdminFactories};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the cart admin service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started cart admin");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = AdminBuilder::new(config.clone())
		.build(AdminFactories::with_all_implementations())
		.await?;
	let engine = Arc::new(engine);

	let cleanup = engine.spawn_storage_cleanup();

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, Arc::clone(&engine)) => {
					tracing::info!("API server finished");
					result?;
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown requested");
				}
			}
		},
		None => {
			tracing::warn!("API server disabled, only storage cleanup is running");
			tokio::signal::ctrl_c().await?;
		},
	}

	cleanup.abort();
	tracing::info!("Stopped cart admin");
	Ok(())
}

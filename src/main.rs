//! # Optimization Gateway - Entry Point
//! src/main.rs
//!
//! Carga `.env`, parsea la configuración, arranca el pool de jobs y el
//! servidor HTTP.

use clap::Parser;
use optimization_gateway::config::Config;
use optimization_gateway::engine;
use optimization_gateway::jobs::{JobManager, JobManagerConfig};
use optimization_gateway::server::Server;
use optimization_gateway::telemetry;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    config.log_summary();

    let engine = engine::from_config(&config)?;
    info!(engine = engine.name(), "optimization engine ready");

    let manager = Arc::new(JobManager::new(
        JobManagerConfig::from_config(&config),
        engine,
    )?);

    let server = Server::bind(config, Arc::clone(&manager))?;
    let result = server.run();

    manager.shutdown();
    Ok(result?)
}

fn main() -> ExitCode {
    // Un .env ausente no es un error
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    if let Err(e) = telemetry::init_logging(&config.log_level, config.log_format) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

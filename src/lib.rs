//! # Optimization Gateway
//! src/lib.rs
//!
//! Orquestador asíncrono de jobs frente a un motor de optimización opaco.
//! Un cliente envía una entrada JSON, recibe un ID de inmediato y consulta
//! el estado hasta que el job termina.
//!
//! ## Arquitectura
//!
//! - `jobs`: registro, cola acotada, pool de workers, ejecución y limpieza
//! - `engine`: frontera con el motor (heurística local o proceso externo)
//! - `http`: parsing de requests y construcción de responses
//! - `router`: enrutamiento de peticiones a handlers
//! - `server`: servidor TCP, un thread por conexión
//! - `metrics`: métricas de requests
//! - `config`: CLI y variables de entorno
//! - `telemetry`: logging con `tracing`
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use optimization_gateway::config::Config;
//! use optimization_gateway::engine;
//! use optimization_gateway::jobs::{JobManager, JobManagerConfig};
//! use optimization_gateway::server::Server;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let engine = engine::from_config(&config)?;
//! let manager = Arc::new(JobManager::new(JobManagerConfig::from_config(&config), engine)?);
//!
//! let server = Server::bind(config, manager)?;
//! server.run()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod http;
pub mod jobs;
pub mod metrics;
pub mod router;
pub mod server;
pub mod telemetry;

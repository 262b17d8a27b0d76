//! # Sistema de Jobs
//!
//! Ejecuta optimizaciones largas sin bloquear las conexiones HTTP.
//!
//! ```text
//! submit → JobStore (processing) → JobQueue → worker → executor → motor
//!                                                          ↓
//!                  status / list ← JobStore (completed | failed)
//! ```
//!
//! El reaper desaloja periódicamente los jobs viejos.
//!
//! ## Endpoints
//!
//! - `POST /run` - Encolar job
//! - `GET /status/{job_id}` - Consultar estado
//! - `GET /jobs` - Listar todos los jobs
//! - `GET /health` - Salud del servicio

pub mod error;
pub mod executor;
pub mod handlers;
pub mod manager;
pub mod query;
pub mod queue;
pub mod reaper;
pub mod storage;
pub mod types;

pub use error::{QueryError, StoreError, SubmitError};
pub use manager::{JobManager, JobManagerConfig, JobStats};
pub use query::{HealthReport, JobListing, JobQuery};
pub use storage::{JobStore, StatusCounts};
pub use types::{FailureKind, JobId, JobRecord, JobStatus, JobUpdate};

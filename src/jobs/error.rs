//! # Errores del Sistema de Jobs
//! src/jobs/error.rs

use crate::jobs::queue::{QueueClosed, QueueFull};
use crate::jobs::types::JobId;
use thiserror::Error;

/// Errores del store de jobs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("job {0} already exists")]
    Duplicate(JobId),

    #[error("job {0} already reached a terminal state")]
    AlreadyTerminal(JobId),
}

/// Rechazos síncronos al encolar un job. Nunca dejan estado parcial.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Request body cannot be empty")]
    EmptyInput,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Queue is full (max capacity: {capacity})")]
    QueueFull { capacity: usize },

    #[error("Job manager is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<QueueFull> for SubmitError {
    fn from(full: QueueFull) -> Self {
        SubmitError::QueueFull {
            capacity: full.capacity,
        }
    }
}

impl From<QueueClosed> for SubmitError {
    fn from(_: QueueClosed) -> Self {
        SubmitError::ShuttingDown
    }
}

/// Errores de consulta
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// ID desconocido o ya desalojado por el reaper; no es un error interno
    #[error("Job ID not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

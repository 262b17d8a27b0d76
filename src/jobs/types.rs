//! # Tipos y Estructuras para el Sistema de Jobs
//! src/jobs/types.rs
//!
//! Define el registro de un job (`JobRecord`) y las únicas mutaciones que
//! admite (`JobUpdate`). El store es el dueño de los registros; el resto del
//! sistema sólo ve copias.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Identificador opaco de un job (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Genera un ID nuevo. Nunca se reutiliza.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Estado de un job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// El motor todavía no terminó
    Processing,

    /// El motor devolvió un resultado
    Completed,

    /// El motor falló, entró en pánico o excedió el deadline
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// Causa de un job fallido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// El motor devolvió un error
    Engine,

    /// El motor entró en pánico
    Panic,

    /// La llamada al motor excedió el deadline configurado
    Timeout,
}

/// Registro de un job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Payload opaco del motor (sólo si `completed`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Descripción del error (sólo si `failed`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    /// Segundos dentro del motor, fijado en la transición terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl JobRecord {
    /// Crea un registro nuevo en `processing`
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();

        Self {
            id,
            status: JobStatus::Processing,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            error_kind: None,
            execution_time: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Aplica una actualización terminal y refresca `updated_at`.
    ///
    /// El llamador (el store) debe verificar antes que el registro no sea
    /// terminal.
    pub(crate) fn apply(&mut self, update: JobUpdate) {
        match update {
            JobUpdate::Completed { result, execution_time } => {
                self.status = JobStatus::Completed;
                self.result = Some(result);
                self.execution_time = Some(execution_time.as_secs_f64());
            }
            JobUpdate::Failed { error, kind, execution_time } => {
                self.status = JobStatus::Failed;
                self.error = Some(error);
                self.error_kind = Some(kind);
                self.execution_time = Some(execution_time.as_secs_f64());
            }
        }
        self.touch();
    }

    /// `updated_at` es estrictamente creciente aunque el reloj repita valor
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }
}

/// Actualización parcial de un job.
///
/// Sólo existen las dos transiciones terminales, así que `result` y `error`
/// nunca pueden coexistir.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Completed {
        result: Value,
        execution_time: Duration,
    },
    Failed {
        error: String,
        kind: FailureKind,
        execution_time: Duration,
    },
}

impl JobUpdate {
    pub fn completed(result: Value, execution_time: Duration) -> Self {
        JobUpdate::Completed { result, execution_time }
    }

    pub fn failed(error: impl Into<String>, kind: FailureKind, execution_time: Duration) -> Self {
        JobUpdate::Failed {
            error: error.into(),
            kind,
            execution_time,
        }
    }

    /// Estado al que lleva esta actualización
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Completed { .. } => JobStatus::Completed,
            JobUpdate::Failed { .. } => JobStatus::Failed,
        }
    }
}

//! # Consultas de Jobs
//! src/jobs/query.rs
//!
//! Vistas de sólo lectura sobre el store: estado de un job, listado
//! completo y salud del servicio.

use crate::jobs::error::QueryError;
use crate::jobs::storage::JobStore;
use crate::jobs::types::{JobId, JobRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Listado de todos los jobs conocidos
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    pub total_jobs: usize,
    pub jobs: BTreeMap<String, JobRecord>,
}

/// Respuesta de salud
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobQuery {
    store: JobStore,
}

impl JobQuery {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    /// Snapshot de un job. Un ID desalojado es indistinguible de uno que
    /// nunca existió.
    pub fn status(&self, id: JobId) -> Result<JobRecord, QueryError> {
        self.store.get(id)?.ok_or(QueryError::NotFound)
    }

    /// Igual que `status`, pero acepta el ID tal como llega en la URL
    pub fn status_str(&self, raw_id: &str) -> Result<JobRecord, QueryError> {
        let id: JobId = raw_id.trim().parse().map_err(|_| QueryError::NotFound)?;
        self.status(id)
    }

    /// Snapshot de todos los jobs; `total_jobs` siempre coincide con `jobs`
    pub fn list_all(&self) -> Result<JobListing, QueryError> {
        let jobs: BTreeMap<String, JobRecord> = self
            .store
            .list()?
            .into_iter()
            .map(|(id, record)| (id.to_string(), record))
            .collect();

        Ok(JobListing {
            total_jobs: jobs.len(),
            jobs,
        })
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: Utc::now(),
        }
    }
}

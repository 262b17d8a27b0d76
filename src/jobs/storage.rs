//! # Store de Jobs en Memoria
//! src/jobs/storage.rs
//!
//! Registro thread-safe de todos los jobs del proceso. Es el único dueño de
//! los `JobRecord`: todas las mutaciones pasan por aquí y quedan serializadas
//! por un único `Mutex`. Nada se persiste; los registros viven lo que vive el
//! proceso o hasta que el reaper los desaloja.
//!
//! El lock sólo se toma durante la mutación en memoria, nunca durante la
//! llamada al motor.

use crate::jobs::error::StoreError;
use crate::jobs::types::{JobId, JobRecord, JobStatus, JobUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Store de jobs. Clonar comparte el mismo estado.
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
}

/// Conteo de jobs por estado
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStore {
    /// Crea un store vacío
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // Cada mutación es un único insert/retain/apply: un pánico con el lock
    // tomado no deja un registro a medio escribir, así que se recupera el mapa
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserta un job nuevo en `processing`
    pub fn create(&self, id: JobId) -> Result<(), StoreError> {
        let mut jobs = self.lock();

        if jobs.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }

        jobs.insert(id, JobRecord::new(id));
        Ok(())
    }

    /// Aplica una actualización terminal.
    ///
    /// Retorna `Ok(false)` si el job ya no existe (por ejemplo, lo desalojó
    /// el reaper mientras el motor corría): no se resucita el registro.
    pub fn update(&self, id: JobId, update: JobUpdate) -> Result<bool, StoreError> {
        let mut jobs = self.lock();

        let Some(record) = jobs.get_mut(&id) else {
            warn!(job_id = %id, status = update.status().as_str(), "update for unknown job ignored");
            return Ok(false);
        };

        if record.is_terminal() {
            return Err(StoreError::AlreadyTerminal(id));
        }

        record.apply(update);
        Ok(true)
    }

    /// Copia del registro de un job
    pub fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.lock();
        Ok(jobs.get(&id).cloned())
    }

    /// Copia de todos los jobs, ordenada por fecha de creación
    pub fn list(&self) -> Result<Vec<(JobId, JobRecord)>, StoreError> {
        let mut snapshot: Vec<(JobId, JobRecord)> = {
            let jobs = self.lock();
            jobs.iter().map(|(id, record)| (*id, record.clone())).collect()
        };

        snapshot.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at));
        Ok(snapshot)
    }

    /// Elimina todos los jobs creados hace más de `max_age`
    pub fn evict_older_than(&self, max_age: Duration) -> Result<usize, StoreError> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.evict_created_before(cutoff)
    }

    /// Elimina todos los jobs con `created_at` anterior a `cutoff`
    pub fn evict_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut jobs = self.lock();
        let before = jobs.len();

        jobs.retain(|_, record| record.created_at >= cutoff);

        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, remaining = jobs.len(), "evicted stale jobs");
        }

        Ok(removed)
    }

    /// Número de jobs almacenados
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock().len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Conteo por estado (para /metrics)
    pub fn counts(&self) -> Result<StatusCounts, StoreError> {
        let jobs = self.lock();
        let mut counts = StatusCounts::default();

        for record in jobs.values() {
            match record.status {
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }

        Ok(counts)
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for JobStore {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
        }
    }
}

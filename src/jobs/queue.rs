//! # Cola Acotada para Jobs
//! src/jobs/queue.rs
//!
//! Cola FIFO thread-safe con capacidad máxima. Alimenta al pool fijo de
//! workers: cuando está llena se rechaza el trabajo nuevo (backpressure) en
//! lugar de lanzar threads sin límite.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// La cola alcanzó su capacidad máxima
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is full (max capacity: {capacity})")]
pub struct QueueFull {
    pub capacity: usize,
}

/// La cola fue cerrada y no acepta más trabajo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is closed")]
pub struct QueueClosed;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola FIFO acotada
pub struct JobQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,

    /// Despierta a los workers cuando hay trabajo o la cola se cierra
    condvar: Arc<Condvar>,

    max_capacity: usize,
}

impl<T> JobQueue<T> {
    /// Crea una nueva cola con capacidad máxima
    pub fn new(max_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::with_capacity(max_capacity.min(1024)),
                closed: false,
            })),
            condvar: Arc::new(Condvar::new()),
            max_capacity,
        }
    }

    // El estado de la cola sigue siendo consistente aunque un thread haya
    // entrado en pánico con el lock tomado: cada operación es un push/pop.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola `item` si hay espacio.
    ///
    /// `admit` corre con el lock de la cola tomado, justo antes del push. Si
    /// falla, el item no se encola. Así el llamador puede registrar el job en
    /// el store sólo cuando ya tiene lugar garantizado en la cola.
    pub fn admit<E, F>(&self, item: T, admit: F) -> Result<(), E>
    where
        F: FnOnce(&T) -> Result<(), E>,
        E: From<QueueFull> + From<QueueClosed>,
    {
        let mut state = self.lock();

        if state.closed {
            return Err(QueueClosed.into());
        }

        if state.items.len() >= self.max_capacity {
            return Err(QueueFull {
                capacity: self.max_capacity,
            }
            .into());
        }

        admit(&item)?;
        state.items.push_back(item);

        self.condvar.notify_one();

        Ok(())
    }

    /// Encola sin paso de admisión
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        self.admit(item, |_| Ok::<(), QueueError>(()))
    }

    /// Desencola el item más antiguo.
    ///
    /// Bloquea hasta que haya uno disponible. Retorna `None` cuando la cola
    /// está cerrada y vacía.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }

            if state.closed {
                return None;
            }

            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Intenta desencolar sin bloquear
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Cierra la cola: no admite más trabajo y despierta a todos los workers.
    /// Los items pendientes todavía se pueden desencolar.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.condvar.notify_all();
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_capacity
    }

    /// Obtiene estadísticas de la cola
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();

        QueueStats {
            total: state.items.len(),
            capacity: self.max_capacity,
            closed: state.closed,
        }
    }
}

/// Error de `enqueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error(transparent)]
    Full(#[from] QueueFull),

    #[error(transparent)]
    Closed(#[from] QueueClosed),
}

/// Estadísticas de una cola
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub capacity: usize,
    pub closed: bool,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            condvar: Arc::clone(&self.condvar),
            max_capacity: self.max_capacity,
        }
    }
}

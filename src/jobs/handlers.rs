//! # Handlers HTTP para Jobs
//! src/jobs/handlers.rs
//!
//! Implementa los endpoints del sistema de jobs:
//! - `POST /run`
//! - `GET /status/{job_id}`
//! - `GET /jobs`
//! - `GET /health`
//! - `GET /metrics`

use crate::http::{Request, Response, StatusCode};
use crate::jobs::error::{QueryError, SubmitError};
use crate::jobs::manager::JobManager;
use crate::metrics::MetricsCollector;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

/// Segundos para el header `Retry-After` (redondeado hacia arriba, mínimo 1)
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

fn internal_error(e: &dyn std::error::Error) -> Response {
    error!(error = %e, "request failed");
    Response::error(StatusCode::InternalServerError, "Internal server error")
}

/// Handler para `POST /run`
///
/// Encola un job con el body JSON como entrada y retorna su ID sin esperar
/// al motor.
///
/// # Ejemplo de response (202)
/// ```json
/// {"message": "Optimization job started", "job_id": "3f2b..."}
/// ```
pub fn run_handler(req: &Request, job_manager: &JobManager, retry_after: Duration) -> Response {
    if req.media_type().as_deref() != Some("application/json") {
        return Response::error(
            StatusCode::UnsupportedMediaType,
            "Content-Type must be application/json",
        );
    }

    if req.body().iter().all(u8::is_ascii_whitespace) {
        return Response::error(StatusCode::BadRequest, &SubmitError::EmptyInput.to_string());
    }

    let input: Value = match serde_json::from_slice(req.body()) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "rejected malformed JSON body");
            return Response::error(StatusCode::BadRequest, &format!("Invalid JSON: {}", e));
        }
    };

    match job_manager.submit(input) {
        Ok(job_id) => Response::json_value(
            StatusCode::Accepted,
            &json!({
                "message": "Optimization job started",
                "job_id": job_id,
            }),
        ),
        Err(e @ (SubmitError::EmptyInput | SubmitError::InvalidInput(_))) => {
            Response::error(StatusCode::BadRequest, &e.to_string())
        }
        Err(e @ SubmitError::QueueFull { .. }) => {
            Response::error(StatusCode::ServiceUnavailable, &e.to_string())
                .with_header("Retry-After", &retry_after_secs(retry_after).to_string())
        }
        Err(e @ SubmitError::ShuttingDown) => {
            Response::error(StatusCode::ServiceUnavailable, &e.to_string())
        }
        Err(SubmitError::Store(e)) => internal_error(&e),
    }
}

/// Handler para `GET /status/{job_id}`
///
/// Un ID malformado se trata igual que uno desconocido.
pub fn status_handler(job_id: &str, job_manager: &JobManager) -> Response {
    match job_manager.query().status_str(job_id) {
        Ok(record) => Response::json_value(StatusCode::Ok, &record),
        Err(e @ QueryError::NotFound) => {
            debug!(job_id, "job not found");
            Response::error(StatusCode::NotFound, &e.to_string())
        }
        Err(QueryError::Store(e)) => internal_error(&e),
    }
}

/// Handler para `GET /jobs`
pub fn jobs_handler(job_manager: &JobManager) -> Response {
    match job_manager.query().list_all() {
        Ok(listing) => Response::json_value(StatusCode::Ok, &listing),
        Err(e) => internal_error(&e),
    }
}

/// Handler para `GET /health`
pub fn health_handler(job_manager: &JobManager) -> Response {
    Response::json_value(StatusCode::Ok, &job_manager.query().health())
}

/// Handler para `GET /metrics`: métricas de requests más estado de la cola
pub fn metrics_handler(job_manager: &JobManager, metrics: &MetricsCollector) -> Response {
    let jobs = match job_manager.stats() {
        Ok(stats) => stats,
        Err(e) => return internal_error(&e),
    };

    Response::json_value(
        StatusCode::Ok,
        &json!({
            "requests": metrics.snapshot(),
            "jobs": jobs,
        }),
    )
}

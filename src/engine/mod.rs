//! # Motor de Optimización
//!
//! Frontera con el motor externo. Para el sistema de jobs el motor es una
//! función opaca: JSON de entrada → JSON de resultado o error. Puede tardar
//! lo que quiera; nunca se llama con locks tomados.
//!
//! ## Implementaciones
//!
//! - `setpoint`: heurística local sobre lecturas de sensores y límites de seguridad
//! - `command`: proceso externo que lee JSON por stdin y escribe JSON por stdout
//!
//! Cualquier closure `Fn(&Value) -> Result<Value, EngineError>` también es un
//! motor, lo que simplifica los tests.

pub mod command;
pub mod setpoint;

pub use command::CommandEngine;
pub use setpoint::SetpointEngine;

use crate::config::{Config, ConfigError, EngineKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errores que puede devolver un motor
#[derive(Debug, Error)]
pub enum EngineError {
    /// La entrada no tiene la forma que el motor espera
    #[error("{0}")]
    InvalidInput(String),

    /// Falla genérica del motor
    #[error("{0}")]
    Failed(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("engine exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    /// El motor cortó su propia ejecución al vencer el deadline
    #[error("engine call exceeded deadline of {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        EngineError::Failed(message.into())
    }
}

/// Un motor de optimización
pub trait OptimizationEngine: Send + Sync {
    /// Nombre corto para logs
    fn name(&self) -> &str {
        "engine"
    }

    /// Ejecuta una optimización. Puede bloquear el thread que lo llama.
    fn run(&self, input: &Value) -> Result<Value, EngineError>;

    /// `true` si `run_with_deadline` detiene el trabajo por sí mismo y
    /// retorna `EngineError::Timeout` cuando vence el deadline. Si es
    /// `false`, el executor vigila el deadline desde un thread auxiliar.
    fn enforces_deadline(&self) -> bool {
        false
    }

    /// Ejecuta con un deadline. Por defecto lo ignora y delega en `run`.
    fn run_with_deadline(&self, input: &Value, _deadline: Duration) -> Result<Value, EngineError> {
        self.run(input)
    }
}

impl<F> OptimizationEngine for F
where
    F: Fn(&Value) -> Result<Value, EngineError> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn run(&self, input: &Value) -> Result<Value, EngineError> {
        self(input)
    }
}

/// Construye el motor configurado
pub fn from_config(config: &Config) -> Result<Arc<dyn OptimizationEngine>, ConfigError> {
    match config.engine {
        EngineKind::Setpoint => Ok(Arc::new(SetpointEngine::default())),
        EngineKind::Command => {
            let program = config
                .engine_cmd
                .clone()
                .ok_or(ConfigError::MissingEngineCommand)?;
            Ok(Arc::new(CommandEngine::new(program, config.engine_args.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_is_an_engine() {
        let engine = |input: &Value| -> Result<Value, EngineError> {
            Ok(json!({"echo": input.clone()}))
        };

        let output = engine.run(&json!({"x": 1})).unwrap();
        assert_eq!(output, json!({"echo": {"x": 1}}));
        assert_eq!(OptimizationEngine::name(&engine), "closure");
    }

    #[test]
    fn test_closures_leave_deadline_to_executor() {
        let engine = |_: &Value| -> Result<Value, EngineError> { Ok(json!({"done": true})) };

        assert!(!engine.enforces_deadline());
        let output = engine
            .run_with_deadline(&json!({}), Duration::from_millis(1))
            .unwrap();
        assert_eq!(output, json!({"done": true}));
    }

    #[test]
    fn test_timeout_message() {
        let err = EngineError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "engine call exceeded deadline of 250 ms");
    }

    #[test]
    fn test_failed_message_is_verbatim() {
        assert_eq!(EngineError::failed("bad input").to_string(), "bad input");
    }

    #[test]
    fn test_from_config_default_is_setpoint() {
        let engine = from_config(&Config::default()).unwrap();
        assert_eq!(engine.name(), "setpoint");
    }

    #[test]
    fn test_from_config_command_requires_program() {
        let mut config = Config::default();
        config.engine = EngineKind::Command;

        assert!(matches!(from_config(&config), Err(ConfigError::MissingEngineCommand)));

        config.engine_cmd = Some("cat".to_string());
        let engine = from_config(&config).unwrap();
        assert_eq!(engine.name(), "command");
    }
}

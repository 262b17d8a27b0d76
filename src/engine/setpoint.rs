//! # Motor de Setpoints
//! src/engine/setpoint.rs
//!
//! Motor local por defecto. Recibe lecturas de sensores, la configuración
//! actual de la unidad y sus límites de seguridad, y propone nuevos
//! setpoints:
//!
//! - Se calcula el margen libre de cada lectura `X` que tenga un límite `max_X`.
//! - Si el peor margen está por debajo del margen de seguridad, todos los
//!   setpoints numéricos bajan un 5%.
//! - Si no, suben en proporción al margen libre (como mucho un 5%).
//! - Un setpoint con límite propio `max_<setpoint>` nunca lo supera.
//!
//! ## Entrada
//!
//! ```json
//! {
//!   "sensor_readings":  {"temperature": 85.5, "pressure": 2.3},
//!   "current_settings": {"pump_speed": 80, "valve_position": 65},
//!   "safety_limits":    {"max_temperature": 95, "max_pressure": 3.0},
//!   "safety_margin": 0.05
//! }
//! ```

use crate::engine::{EngineError, OptimizationEngine};
use chrono::Utc;
use serde_json::{json, Map, Value};

const REQUIRED_FIELDS: [&str; 3] = ["sensor_readings", "current_settings", "safety_limits"];

/// Paso máximo de ajuste por corrida
const MAX_STEP: f64 = 0.05;

/// Motor heurístico de setpoints
#[derive(Debug, Clone)]
pub struct SetpointEngine {
    default_margin: f64,
}

impl SetpointEngine {
    pub fn new(default_margin: f64) -> Self {
        Self {
            default_margin: default_margin.clamp(0.0, 1.0),
        }
    }

    fn object<'a>(input: &'a Value, field: &str) -> Result<&'a Map<String, Value>, EngineError> {
        input
            .get(field)
            .ok_or_else(|| EngineError::InvalidInput(format!("Missing required field: {}", field)))?
            .as_object()
            .ok_or_else(|| EngineError::InvalidInput(format!("Field '{}' must be an object", field)))
    }

    /// Margen libre (0..1) por lectura con límite conocido
    fn headroom(
        readings: &Map<String, Value>,
        limits: &Map<String, Value>,
    ) -> Vec<(String, f64)> {
        readings
            .iter()
            .filter_map(|(name, value)| {
                let reading = value.as_f64()?;
                let limit = limits.get(&format!("max_{}", name))?.as_f64()?;
                if limit <= 0.0 {
                    return None;
                }
                Some((name.clone(), 1.0 - reading / limit))
            })
            .collect()
    }
}

impl Default for SetpointEngine {
    fn default() -> Self {
        Self::new(0.05)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl OptimizationEngine for SetpointEngine {
    fn name(&self) -> &str {
        "setpoint"
    }

    fn run(&self, input: &Value) -> Result<Value, EngineError> {
        for field in REQUIRED_FIELDS {
            if input.get(field).is_none() {
                return Err(EngineError::InvalidInput(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }

        let readings = Self::object(input, "sensor_readings")?;
        let settings = Self::object(input, "current_settings")?;
        let limits = Self::object(input, "safety_limits")?;

        let margin = input
            .get("safety_margin")
            .and_then(Value::as_f64)
            .map(|m| m.clamp(0.0, 1.0))
            .unwrap_or(self.default_margin);

        let headroom = Self::headroom(readings, limits);
        let violations: Vec<&str> = headroom
            .iter()
            .filter(|(_, free)| *free < 0.0)
            .map(|(name, _)| name.as_str())
            .collect();
        let min_headroom = headroom
            .iter()
            .map(|(_, free)| *free)
            .fold(None, |acc: Option<f64>, free| Some(acc.map_or(free, |a| a.min(free))));

        // Sin pares lectura/límite no hay base para mover nada
        let factor = match min_headroom {
            None => 1.0,
            Some(free) if free < margin => 1.0 - MAX_STEP,
            Some(free) => 1.0 + (free - margin).min(MAX_STEP),
        };

        let mut new_settings = Map::new();
        let mut clamped = Vec::new();
        for (name, value) in settings {
            let Some(current) = value.as_f64() else {
                new_settings.insert(name.clone(), value.clone());
                continue;
            };

            let mut proposed = current * factor;
            if let Some(limit) = limits.get(&format!("max_{}", name)).and_then(Value::as_f64) {
                if proposed > limit {
                    proposed = limit;
                    clamped.push(name.clone());
                }
            }
            new_settings.insert(name.clone(), json!(round2(proposed)));
        }

        let action = if factor > 1.0 {
            "increase"
        } else if factor < 1.0 {
            "reduce"
        } else {
            "hold"
        };

        Ok(json!({
            "success": true,
            "new_settings": new_settings,
            "expected_improvements": {
                "action": action,
                "setpoint_change_pct": round2((factor - 1.0) * 100.0),
            },
            "safety_verification": {
                "passed": violations.is_empty(),
                "violations": violations,
                "min_headroom": min_headroom.map(round2),
                "safety_margin": margin,
                "clamped_settings": clamped,
            },
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

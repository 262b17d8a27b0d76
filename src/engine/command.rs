//! # Motor como Proceso Externo
//! src/engine/command.rs
//!
//! Lanza un proceso por corrida: escribe el JSON de entrada en su stdin y
//! lee un documento JSON de su stdout. Un exit code distinto de cero es un
//! error del motor, con el stderr capturado como descripción.
//!
//! Con deadline el proceso se mata cuando vence: un optimizador colgado no
//! deja procesos ni threads acumulándose por cada job vencido.

use crate::engine::{EngineError, OptimizationEngine};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Máximo de stderr que se copia al mensaje de error
const STDERR_EXCERPT: usize = 2048;

/// Cada cuánto se revisa si el proceso terminó mientras corre el deadline
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Corre el proceso. Con `deadline`, el proceso se mata si no termina a
    /// tiempo y se retorna `EngineError::Timeout`.
    fn execute(&self, input: &Value, deadline: Option<Duration>) -> Result<Value, EngineError> {
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Io {
                context: format!("failed to spawn engine ({})", self.program),
                source,
            })?;

        // stdin se escribe y stdout/stderr se leen en otros threads: si el
        // proceso llena un pipe mientras este thread espera, ninguno avanza
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                let result = stdin.write_all(&payload);
                drop(stdin);
                result
            })
        });
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        // En timeout los threads de E/S quedan sueltos; terminan al cerrarse
        // los pipes del proceso muerto
        let status = match deadline {
            Some(deadline) => wait_until(&mut child, deadline)?,
            None => child.wait().map_err(wait_error)?,
        };

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // Un proceso que termina sin leer stdin produce BrokenPipe; lo
                // que importa es su exit code
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(source)) => {
                    return Err(EngineError::Io {
                        context: "write engine stdin failed".to_string(),
                        source,
                    })
                }
                Err(_) => return Err(EngineError::failed("engine stdin writer panicked")),
            }
        }

        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;

        if !status.success() {
            return Err(EngineError::ExitStatus {
                status: status.to_string(),
                stderr: excerpt(&stderr),
            });
        }

        Ok(serde_json::from_slice(&stdout)?)
    }
}

type Reader = JoinHandle<io::Result<Vec<u8>>>;

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Reader> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: Option<Reader>) -> Result<Vec<u8>, EngineError> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };

    match reader.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(source)) => Err(EngineError::Io {
            context: "failed to read engine output".to_string(),
            source,
        }),
        Err(_) => Err(EngineError::failed("engine output reader panicked")),
    }
}

fn wait_error(source: io::Error) -> EngineError {
    EngineError::Io {
        context: "failed to wait for engine".to_string(),
        source,
    }
}

/// Espera al proceso hasta `deadline`; al vencer lo mata y lo recoge
fn wait_until(child: &mut Child, deadline: Duration) -> Result<ExitStatus, EngineError> {
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            return Ok(status);
        }

        if started.elapsed() >= deadline {
            // Puede fallar si el proceso terminó justo ahora; wait lo recoge igual
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Timeout(deadline));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl OptimizationEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    fn run(&self, input: &Value) -> Result<Value, EngineError> {
        self.execute(input, None)
    }

    fn enforces_deadline(&self) -> bool {
        true
    }

    fn run_with_deadline(&self, input: &Value, deadline: Duration) -> Result<Value, EngineError> {
        self.execute(input, Some(deadline))
    }
}

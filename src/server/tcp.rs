//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Servidor TCP que maneja múltiples conexiones simultáneas usando threads.
//! Cada conexión se procesa en su propio thread y lleva un único request.
//! El trabajo pesado nunca corre aquí: `/run` sólo encola y responde.

use crate::config::Config;
use crate::http::request::find_head_end;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::{handlers as job_handlers, JobManager};
use crate::metrics::MetricsCollector;
use crate::router::Router;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Tamaño de cada lectura del socket
const READ_CHUNK: usize = 8192;

/// Límite del bloque de headers
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Un cliente que no termina de mandar su request libera el thread tras esto
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Registra las rutas del API de jobs
pub fn build_router(
    job_manager: Arc<JobManager>,
    metrics: MetricsCollector,
    retry_after: Duration,
) -> Router {
    let mut router = Router::new();

    {
        let job_manager = Arc::clone(&job_manager);
        router.post("/run", move |req, _| {
            job_handlers::run_handler(req, &job_manager, retry_after)
        });
    }
    {
        let job_manager = Arc::clone(&job_manager);
        router.get("/status/{job_id}", move |_, params| {
            job_handlers::status_handler(params.get("job_id").unwrap_or_default(), &job_manager)
        });
    }
    {
        let job_manager = Arc::clone(&job_manager);
        router.get("/jobs", move |_, _| job_handlers::jobs_handler(&job_manager));
    }
    {
        let job_manager = Arc::clone(&job_manager);
        router.get("/health", move |_, _| job_handlers::health_handler(&job_manager));
    }
    router.get("/metrics", move |_, _| {
        job_handlers::metrics_handler(&job_manager, &metrics)
    });

    router
}

/// Resultado de leer un request del socket
enum Incoming {
    /// El cliente cerró sin mandar nada
    Closed,
    Request(Request),
    /// Request rechazado antes de rutear (malformado o demasiado grande)
    Reject(Response),
}

fn bad_request(e: impl std::fmt::Display) -> Incoming {
    Incoming::Reject(Response::error(
        StatusCode::BadRequest,
        &format!("Invalid request: {}", e),
    ))
}

/// Lee headers y luego exactamente `Content-Length` bytes de body.
///
/// Un body declarado mayor a `max_body` se rechaza con 413 sin leerlo.
fn read_request(stream: &mut impl Read, max_body: usize) -> io::Result<Incoming> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break Some(end);
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Ok(bad_request("headers too large"));
        }

        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    if buf.is_empty() {
        return Ok(Incoming::Closed);
    }

    // El cliente cerró su lado sin la línea vacía final: se intenta igual
    let Some(head_end) = head_end else {
        return Ok(match Request::parse(&buf) {
            Ok(request) => Incoming::Request(request),
            Err(e) => bad_request(e),
        });
    };

    let head = match Request::parse(&buf[..head_end]) {
        Ok(head) => head,
        Err(e) => return Ok(bad_request(e)),
    };

    let length = match head.content_length() {
        Ok(length) => length.unwrap_or(0),
        Err(e) => return Ok(bad_request(e)),
    };

    if length > max_body {
        return Ok(Incoming::Reject(Response::error(
            StatusCode::PayloadTooLarge,
            &format!("Request body too large (max {} bytes)", max_body),
        )));
    }

    let total = head_end + length;
    while buf.len() < total {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    buf.truncate(total);

    Ok(match Request::parse(&buf) {
        Ok(request) => Incoming::Request(request),
        Err(e) => bad_request(e),
    })
}

/// Detiene un `Server` en ejecución desde otro thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Despierta al accept() bloqueado
        let _ = TcpStream::connect(self.addr);
    }
}

/// Servidor HTTP concurrente con métricas
pub struct Server {
    config: Config,
    router: Arc<Router>,
    metrics: MetricsCollector,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Abre el socket y registra las rutas. No acepta conexiones hasta `run`.
    pub fn bind(config: Config, job_manager: Arc<JobManager>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address())?;
        let metrics = MetricsCollector::new();
        let router = build_router(
            job_manager,
            metrics.clone(),
            Duration::from_millis(config.retry_after_ms),
        );

        Ok(Self {
            config,
            router: Arc::new(router),
            metrics,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr()?,
        })
    }

    /// Acepta conexiones hasta que se pida el apagado
    pub fn run(&self) -> io::Result<()> {
        info!(address = %self.local_addr()?, "server listening");

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let metrics = self.metrics.clone();
            let max_body = self.config.max_body_bytes;

            metrics.increment_active_connections();

            let spawned = thread::Builder::new()
                .name("http-conn".to_string())
                .spawn(move || {
                    if let Err(e) = Self::handle_connection(stream, &router, &metrics, max_body) {
                        debug!(error = %e, "connection error");
                    }
                    metrics.decrement_active_connections();
                });

            if let Err(e) = spawned {
                warn!(error = %e, "failed to spawn connection thread");
                self.metrics.decrement_active_connections();
            }
        }

        info!("server stopped");
        Ok(())
    }

    fn handle_connection(
        mut stream: TcpStream,
        router: &Router,
        metrics: &MetricsCollector,
        max_body: usize,
    ) -> io::Result<()> {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let thread_id = format!("{:?}", thread::current().id());

        let span = info_span!("request", request_id = %request_id);
        let _enter = span.enter();

        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let (mut response, route, method, path) = match read_request(&mut stream, max_body)? {
            Incoming::Closed => {
                debug!("connection closed before any request");
                return Ok(());
            }
            Incoming::Reject(mut response) => {
                Router::add_common_headers(&mut response);
                (response, "rejected".to_string(), "-", "-".to_string())
            }
            Incoming::Request(request) => {
                let routed = router.route(&request);
                let response = routed
                    .response
                    .gzip_if_accepted(request.header("accept-encoding"));
                (
                    response,
                    routed.route,
                    request.method().as_str(),
                    request.path().to_string(),
                )
            }
        };

        // Headers de observabilidad
        response.add_header("X-Request-Id", &request_id);
        response.add_header("X-Worker-Thread", &thread_id);
        response.add_header("X-Worker-Pid", &std::process::id().to_string());

        stream.write_all(&response.to_bytes())?;
        stream.flush()?;

        let latency = start.elapsed();
        let status = response.status().as_u16();
        metrics.record_request(&route, status, latency);

        debug!(
            method,
            path = %path,
            status,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "request handled"
        );

        Ok(())
    }
}

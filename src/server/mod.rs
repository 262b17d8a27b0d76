//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes, un thread por conexión
//! 3. Lee y parsea requests HTTP
//! 4. Rutea al API de jobs y envía la respuesta

pub mod tcp;

pub use tcp::{build_router, Server, ShutdownHandle};

//! # Módulo HTTP
//!
//! Implementación mínima del protocolo sobre `TcpStream`, sin frameworks:
//!
//! - Parsing de requests (request line, headers, body por `Content-Length`)
//! - Construcción de responses con body JSON y compresión gzip opcional
//! - Códigos de estado
//!
//! Cada conexión lleva un único request; la respuesta se envía con
//! `Connection: close`.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;

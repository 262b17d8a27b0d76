//! # Construcción de Respuestas HTTP
//!
//! API tipo builder para armar respuestas y convertirlas a bytes.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use optimization_gateway::http::{Response, StatusCode};
//! use serde_json::json;
//!
//! let response = Response::json_value(StatusCode::Accepted, &json!({"job_id": "abc"}));
//! assert_eq!(response.status(), StatusCode::Accepted);
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.starts_with(b"HTTP/1.0 202 Accepted\r\n"));
//! ```

use super::StatusCode;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use tracing::error;

/// Bodies más chicos que esto no se comprimen
pub const GZIP_MIN_BYTES: usize = 1024;

/// Representa una respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,

    /// Headers HTTP; HashMap para evitar duplicados
    headers: HashMap<String, String>,

    body: Vec<u8>,
}

impl Response {
    /// Crea una respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Agrega un header; si ya existe, se sobrescribe
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Versión mutable de `with_header`
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Establece el cuerpo y su `Content-Length`
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self.headers
            .insert("Content-Length".to_string(), self.body.len().to_string());
        self
    }

    /// Serializa `value` como body JSON.
    ///
    /// Si la serialización falla la respuesta se convierte en un 500.
    pub fn json_value<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", "application/json")
                .with_body_bytes(body),
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                Self::error(StatusCode::InternalServerError, "Internal server error")
            }
        }
    }

    /// Respuesta de error con formato `{"error": "mensaje"}`
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = json!({ "error": message }).to_string();
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(&body)
    }

    /// Comprime el body con gzip si el cliente lo acepta y el body es grande.
    ///
    /// `accept_encoding` es el valor crudo del header `Accept-Encoding`.
    pub fn gzip_if_accepted(mut self, accept_encoding: Option<&str>) -> Self {
        let accepts_gzip = accept_encoding
            .map(|value| {
                value
                    .split(',')
                    .any(|enc| enc.split(';').next().map(str::trim) == Some("gzip"))
            })
            .unwrap_or(false);

        if !accepts_gzip
            || self.body.len() < GZIP_MIN_BYTES
            || self.headers.contains_key("Content-Encoding")
        {
            return self;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        let compressed = match encoder.write_all(&self.body) {
            Ok(()) => encoder.finish(),
            Err(e) => Err(e),
        };

        match compressed {
            Ok(bytes) => {
                self.add_header("Content-Encoding", "gzip");
                self.add_header("Vary", "Accept-Encoding");
                self.with_body_bytes(bytes)
            }
            Err(e) => {
                error!(error = %e, "gzip compression failed, sending identity body");
                self
            }
        }
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket:
    /// status line, headers, línea vacía y body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(128 + self.body.len());

        result.extend_from_slice(format!("HTTP/1.0 {}\r\n", self.status).as_bytes());

        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&self.body);

        result
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_with_body_sets_content_length() {
        let response = Response::new(StatusCode::Ok).with_body("Hello World");

        assert_eq!(response.body(), b"Hello World");
        assert_eq!(response.header("Content-Length"), Some("11"));
    }

    #[test]
    fn test_json_value() {
        let response = Response::json_value(StatusCode::Accepted, &json!({"job_id": "abc"}));

        assert_eq!(response.status(), StatusCode::Accepted);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body(), br#"{"job_id":"abc"}"#);
    }

    #[test]
    fn test_error_response_escapes_message() {
        let response = Response::error(StatusCode::BadRequest, "bad \"quoted\" input");

        let value: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(value, json!({"error": "bad \"quoted\" input"}));
    }

    #[test]
    fn test_to_bytes() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_body("Test");

        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nTest"));
    }

    #[test]
    fn test_gzip_large_body() {
        let body = "x".repeat(4096);
        let response = Response::new(StatusCode::Ok)
            .with_body(&body)
            .gzip_if_accepted(Some("deflate, gzip;q=0.8"));

        assert_eq!(response.header("Content-Encoding"), Some("gzip"));
        assert!(response.body().len() < body.len());
        assert_eq!(
            response.header("Content-Length"),
            Some(response.body().len().to_string().as_str())
        );

        let mut decoded = String::new();
        GzDecoder::new(response.body()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_gzip_skipped_for_small_body_or_no_accept() {
        let small = Response::new(StatusCode::Ok)
            .with_body("tiny")
            .gzip_if_accepted(Some("gzip"));
        assert!(small.header("Content-Encoding").is_none());

        let large = Response::new(StatusCode::Ok)
            .with_body(&"y".repeat(4096))
            .gzip_if_accepted(None);
        assert!(large.header("Content-Encoding").is_none());
        assert_eq!(large.body().len(), 4096);
    }
}

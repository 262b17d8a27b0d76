//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea (método, path) a handlers.
//!
//! ```text
//! Request → Router → Handler → Response
//! ```
//!
//! Los patrones admiten segmentos variables entre llaves, por ejemplo
//! `/status/{job_id}`. Un path desconocido retorna 404; un path conocido con
//! otro método retorna 405 con el header `Allow`.

use crate::http::{Method, Request, Response, StatusCode};
use std::collections::HashMap;

/// Valores de los segmentos variables del patrón
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Un handler recibe el request y los parámetros del path
pub type Handler = Box<dyn Fn(&Request, &Params) -> Response + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        Some(Params(params))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .map(|part| {
            match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(part.to_string()),
            }
        })
        .collect()
}

/// Resultado de rutear un request
pub struct Routed {
    pub response: Response,

    /// Patrón que atendió el request, o `"unmatched"`. Se usa como etiqueta
    /// de métricas para no crear una serie por cada job ID.
    pub route: String,
}

/// Router que mapea rutas a handlers
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta con su handler
    pub fn register<F>(&mut self, method: Method, pattern: &str, handler: F)
    where
        F: Fn(&Request, &Params) -> Response + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            handler: Box::new(handler),
        });
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&Request, &Params) -> Response + Send + Sync + 'static,
    {
        self.register(Method::GET, pattern, handler);
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&Request, &Params) -> Response + Send + Sync + 'static,
    {
        self.register(Method::POST, pattern, handler);
    }

    /// Encuentra y ejecuta el handler apropiado para un request
    pub fn route(&self, request: &Request) -> Routed {
        let mut allowed: Vec<&'static str> = Vec::new();
        let mut matched_pattern = None;

        for route in &self.routes {
            let Some(params) = route.matches(request.path()) else {
                continue;
            };

            if route.method == request.method() {
                let mut response = (route.handler)(request, &params);
                Self::add_common_headers(&mut response);
                return Routed {
                    response,
                    route: route.pattern.clone(),
                };
            }

            allowed.push(route.method.as_str());
            matched_pattern.get_or_insert_with(|| route.pattern.clone());
        }

        let (mut response, route) = match matched_pattern {
            Some(pattern) => {
                let response = Response::error(StatusCode::MethodNotAllowed, "Method not allowed")
                    .with_header("Allow", &allowed.join(", "));
                (response, pattern)
            }
            None => (
                Response::error(StatusCode::NotFound, "Resource not found"),
                "unmatched".to_string(),
            ),
        };

        Self::add_common_headers(&mut response);
        Routed { response, route }
    }

    /// Agrega headers comunes a todas las respuestas
    pub fn add_common_headers(response: &mut Response) {
        response.add_header("Server", concat!("optimization-gateway/", env!("CARGO_PKG_VERSION")));
        response.add_header("Connection", "close");
    }
}

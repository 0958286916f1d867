use crate::model::{Filter, ModelRegistry};
use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};

/// Per-request state threaded through the pipeline and the dispatcher.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Filter,
    pub body: Value,
    pub status: StatusCode,
    pub response_body: Value,
    pub db: ModelRegistry,
}

impl RequestContext {
    /// Fresh context: empty query, `{}` body, status 200 and an empty JSON
    /// object as the response body.
    pub fn new(method: Method, path: impl Into<String>, db: ModelRegistry) -> Self {
        Self {
            method,
            path: path.into(),
            query: Filter::new(),
            body: Value::Object(Map::new()),
            status: StatusCode::OK,
            response_body: Value::Object(Map::new()),
            db,
        }
    }

    pub fn with_query(mut self, query: Filter) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

//! Request pipeline and application bootstrap.
//!
//! Stage order, outermost first:
//!
//! ```text
//! TraceLayer                  request/response logging
//!   ResponseTimeInterceptor   X-Response-Time, X-Powered-By
//!     JsonContentInterceptor  content type forced to JSON
//!       handle_request        body/query parsing, dispatch, error capture
//! ```
//!
//! Both registries are built before [`App`] exists and are read-only from
//! then on.

use crate::context::RequestContext;
use crate::controller::ControllerRegistry;
use crate::dispatch::{Dispatcher, capture_error};
use crate::error::HttpError;
use crate::interceptor::{InterceptorLayer, JsonContentInterceptor, ResponseTimeInterceptor};
use crate::model::{Filter, ModelRegistry};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
    models: ModelRegistry,
    expose_error_stack: bool,
}

/// A fully initialized application, ready to serve.
pub struct App {
    state: AppState,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.state.models
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        self.state.dispatcher.controllers()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_request)
            .with_state(self.state.clone())
            .layer(InterceptorLayer::new(vec![
                Box::new(ResponseTimeInterceptor),
                Box::new(JsonContentInterceptor),
            ]))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until Ctrl+C or SIGTERM.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Listening on http://{}", addr);
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Builder for [`App`]
pub struct AppBuilder {
    models: ModelRegistry,
    controllers: ControllerRegistry,
    expose_error_stack: bool,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            models: ModelRegistry::default(),
            controllers: ControllerRegistry::default(),
            expose_error_stack: true,
        }
    }

    pub fn models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    pub fn controllers(mut self, controllers: ControllerRegistry) -> Self {
        self.controllers = controllers;
        self
    }

    /// Include the diagnostic trace in error bodies (on by default).
    pub fn expose_error_stack(mut self, expose: bool) -> Self {
        self.expose_error_stack = expose;
        self
    }

    pub fn build(self) -> App {
        for name in self.controllers.names() {
            let model = self.controllers.get(name).and_then(|c| c.model());
            match model {
                Some(model) if !self.models.contains(model) => tracing::warn!(
                    "Controller {} is bound to unknown model {}; its requests will fail",
                    name,
                    model
                ),
                None => tracing::warn!("Controller {} declares no model", name),
                Some(_) => {}
            }
        }

        App {
            state: AppState {
                dispatcher: Dispatcher::new(self.controllers),
                models: self.models,
                expose_error_stack: self.expose_error_stack,
            },
        }
    }
}

async fn handle_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let mut ctx = RequestContext::new(method, uri.path(), state.models.clone());

    let outcome = async {
        ctx.query = parse_query(uri.query())?;
        let body = body.map_err(body_rejection)?;
        ctx.body = parse_body(&headers, &body)?;
        state.dispatcher.dispatch(&mut ctx).await
    }
    .await;
    if let Err(err) = outcome {
        capture_error(&mut ctx, &err, state.expose_error_stack);
    }

    (ctx.status, Json(ctx.response_body)).into_response()
}

/// A body that could not be read, e.g. one over the size limit, keeps the
/// rejection's status.
fn body_rejection(rejection: BytesRejection) -> HttpError {
    HttpError::new()
        .with_code(rejection.status())
        .with_message(rejection.body_text())
}

/// Query string to a filter; repeated keys collect into an array.
pub fn parse_query(query: Option<&str>) -> Result<Filter, HttpError> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(Filter::new());
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| HttpError::bad_request().with_message(format!("Invalid query string: {e}")))?;
    Ok(collect_pairs(pairs))
}

fn collect_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            None => {
                map.insert(key, Value::String(value));
            }
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    map
}

/// JSON and url-encoded bodies are parsed; anything else reads as `{}`.
pub fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Value, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if content_type == "application/json" || content_type.ends_with("+json") {
        serde_json::from_slice(body)
            .map_err(|e| HttpError::bad_request().with_message(format!("Invalid JSON body: {e}")))
    } else if content_type == "application/x-www-form-urlencoded" {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| HttpError::bad_request().with_message(format!("Invalid form body: {e}")))?;
        Ok(Value::Object(collect_pairs(pairs)))
    } else {
        Ok(Value::Object(Map::new()))
    }
}

/// Completes on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

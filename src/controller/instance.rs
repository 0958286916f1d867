use super::ControllerDescriptor;
use crate::context::RequestContext;
use crate::error::HttpError;
use crate::model::{Filter, Model, ModelRegistry};
use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// A controller bound to one request.
///
/// Created by the dispatcher for every request and dropped once the action
/// has returned. Binding fails with [`HttpError::model_not_defined`] when the
/// controller declares no model, or one the registry does not know.
pub struct Controller {
    name: String,
    method: Method,
    path: String,
    query: Filter,
    body: Value,
    status: StatusCode,
    db: ModelRegistry,
    model: Arc<dyn Model>,
}

impl Controller {
    pub(crate) fn bind(
        descriptor: &ControllerDescriptor,
        ctx: &RequestContext,
    ) -> Result<Self, HttpError> {
        let model = descriptor
            .model()
            .and_then(|name| ctx.db.get(name))
            .cloned()
            .ok_or_else(HttpError::model_not_defined)?;

        Ok(Self {
            name: descriptor.name().to_string(),
            method: ctx.method.clone(),
            path: ctx.path.clone(),
            query: ctx.query.clone(),
            body: ctx.body.clone(),
            status: ctx.status,
            db: ctx.db.clone(),
            model,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parsed query string.
    pub fn query(&self) -> &Filter {
        &self.query
    }

    /// Parsed request body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn db(&self) -> &ModelRegistry {
        &self.db
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Set the response status; `None` restores 200.
    pub fn status(&mut self, code: impl Into<Option<StatusCode>>) {
        self.status = code.into().unwrap_or(StatusCode::OK);
    }

    pub fn current_status(&self) -> StatusCode {
        self.status
    }

    /// Hand the request body to the model and answer with the created record.
    pub async fn create(&mut self) -> Result<Value, HttpError> {
        Ok(self.model.create(self.body.clone()).await?)
    }

    /// Read every record matching the query string.
    pub async fn read(&mut self) -> Result<Value, HttpError> {
        let records = self.model.find_all(&self.query).await?;
        Ok(Value::Array(records))
    }

    /// Placeholder: succeeds with a `null` body until overridden.
    ///
    /// The response is a `200` carrying JSON `null`, never an empty `204`.
    pub async fn update(&mut self) -> Result<Value, HttpError> {
        Ok(Value::Null)
    }

    /// Placeholder: succeeds with a `null` body until overridden, answered
    /// like [`Controller::update`].
    pub async fn delete(&mut self) -> Result<Value, HttpError> {
        Ok(Value::Null)
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("method", &self.method)
            .field("path", &self.path)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

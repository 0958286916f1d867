//! Path → controller → verb-checked action → response body.

use crate::context::RequestContext;
use crate::controller::ControllerRegistry;
use crate::error::{HttpError, StatusError};
use serde_json::Value;
use std::sync::Arc;

/// Split `/<controller>/<action>[/...]` into its first two segments.
///
/// Segments past the second are ignored.
pub fn parse_path(path: &str) -> Option<(&str, &str)> {
    let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
    let controller = segments.next().filter(|s| !s.is_empty())?;
    let action = segments.next().filter(|s| !s.is_empty())?;
    Some((controller, action))
}

#[derive(Clone)]
pub struct Dispatcher {
    controllers: Arc<ControllerRegistry>,
}

impl Dispatcher {
    pub fn new(controllers: ControllerRegistry) -> Self {
        Self {
            controllers: Arc::new(controllers),
        }
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Resolve and run the action named by `ctx.path`, committing its result
    /// to `ctx.response_body`.
    ///
    /// Errors are returned untouched; turning them into a response is the
    /// caller's job (see [`capture_error`]).
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> Result<(), HttpError> {
        let (controller_name, action_name) =
            parse_path(&ctx.path).ok_or_else(HttpError::not_found)?;
        let descriptor = self
            .controllers
            .get(controller_name)
            .ok_or_else(HttpError::not_found)?;

        let mut controller = descriptor.instantiate(ctx)?;

        let action = descriptor
            .action(action_name)
            .ok_or_else(HttpError::method_not_allowed)?;
        if !descriptor.verbs().permits(action_name, &ctx.method) {
            tracing::debug!(
                "{} not allowed for {}/{}",
                ctx.method,
                controller_name,
                action_name
            );
            return Err(HttpError::method_not_allowed());
        }

        tracing::debug!("Dispatching {} {}/{}", ctx.method, controller_name, action_name);
        let body = action(&mut controller).await?;

        ctx.status = controller.current_status();
        ctx.response_body = body;
        Ok(())
    }
}

/// Turn a failure into the `{error, stack, code}` response body.
pub fn capture_error(ctx: &mut RequestContext, err: &HttpError, expose_stack: bool) {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!("{} {} failed: {}", ctx.method, ctx.path, err.stack());
    } else {
        tracing::warn!("{} {} rejected: {}", ctx.method, ctx.path, err);
    }

    let mut body = serde_json::Map::new();
    body.insert("error".to_string(), Value::from(err.message()));
    if expose_stack {
        body.insert("stack".to_string(), Value::from(err.stack()));
    }
    body.insert("code".to_string(), Value::from(status.as_u16()));

    ctx.status = status;
    ctx.response_body = Value::Object(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerDefinition;
    use crate::model::{MemoryModel, ModelDefinition, ModelRegistry};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    static ORPHAN_RAN: AtomicBool = AtomicBool::new(false);

    async fn models() -> ModelRegistry {
        ModelRegistry::builder()
            .register(MemoryModel::new(
                "Widget",
                ModelDefinition {
                    timestamps: false,
                    ..Default::default()
                },
            ))
            .unwrap()
            .initialize()
            .await
            .unwrap()
    }

    fn dispatcher() -> Dispatcher {
        let controllers = ControllerRegistry::builder()
            .register(
                "widgets",
                ControllerDefinition::new()
                    .model("Widget")
                    .verb("search", Method::POST)
                    .action("search", |c| Box::pin(c.read()))
                    .action("accept", |c| {
                        Box::pin(async move {
                            c.status(StatusCode::ACCEPTED);
                            Ok(json!({"accepted": true}))
                        })
                    })
                    .action("fail", |_| {
                        Box::pin(async {
                            Err(HttpError::from(anyhow::anyhow!("database is down")))
                        })
                    }),
            )
            .unwrap()
            .register(
                "orphans",
                ControllerDefinition::new().model("Ghost").action("touch", |_| {
                    Box::pin(async {
                        ORPHAN_RAN.store(true, Ordering::SeqCst);
                        Ok(Value::Null)
                    })
                }),
            )
            .unwrap()
            .build();
        Dispatcher::new(controllers)
    }

    async fn run(method: Method, path: &str, body: Value) -> Result<RequestContext, HttpError> {
        let mut ctx = RequestContext::new(method, path, models().await).with_body(body);
        dispatcher().dispatch(&mut ctx).await.map(|()| ctx)
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("/widgets/read"), Some(("widgets", "read")));
        assert_eq!(parse_path("/widgets/read/extra"), Some(("widgets", "read")));
        assert_eq!(parse_path("widgets/read"), Some(("widgets", "read")));
        assert_eq!(parse_path("/widgets"), None);
        assert_eq!(parse_path("/widgets/"), None);
        assert_eq!(parse_path("/"), None);
        assert_eq!(parse_path("//read"), None);
    }

    #[tokio::test]
    async fn test_unknown_paths_are_not_found() {
        for path in ["/", "/widgets", "/ghosts/read"] {
            let err = run(Method::GET, path, json!({})).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_unknown_action_is_method_not_allowed() {
        let err = run(Method::GET, "/widgets/explode", json!({})).await.unwrap_err();
        assert!(matches!(err, HttpError::MethodNotAllowed { .. }));
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_verb_gating() {
        let ctx = run(Method::GET, "/widgets/read", json!({})).await.unwrap();
        assert_eq!(ctx.response_body, json!([]));

        let err = run(Method::PATCH, "/widgets/read", json!({})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);

        let err = run(Method::GET, "/widgets/search", json!({})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        run(Method::POST, "/widgets/search", json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_unmapped_actions_take_any_verb() {
        for method in [Method::GET, Method::DELETE, Method::PATCH] {
            let ctx = run(method, "/widgets/accept", json!({})).await.unwrap();
            assert_eq!(ctx.status, StatusCode::ACCEPTED);
            assert_eq!(ctx.response_body, json!({"accepted": true}));
        }
    }

    #[tokio::test]
    async fn test_missing_model_stops_before_the_action() {
        let err = run(Method::GET, "/orphans/touch", json!({})).await.unwrap_err();
        assert!(matches!(err, HttpError::ModelNotDefined { .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!ORPHAN_RAN.load(Ordering::SeqCst));

        // Binding happens before action lookup, so a bad action is still a 500 here.
        let err = run(Method::GET, "/orphans/nothing", json!({})).await.unwrap_err();
        assert!(matches!(err, HttpError::ModelNotDefined { .. }));
    }

    #[tokio::test]
    async fn test_create_returns_the_model_result() {
        let models = models().await;
        let dispatcher = dispatcher();

        let mut ctx = RequestContext::new(Method::POST, "/widgets/create", models.clone())
            .with_body(json!({"name": "a"}));
        dispatcher.dispatch(&mut ctx).await.unwrap();
        assert_eq!(ctx.status, StatusCode::OK);
        assert_eq!(ctx.response_body, json!({"id": 1, "name": "a"}));

        let mut query = crate::model::Filter::new();
        query.insert("name".to_string(), json!("a"));
        let mut ctx =
            RequestContext::new(Method::GET, "/widgets/read", models).with_query(query);
        dispatcher.dispatch(&mut ctx).await.unwrap();
        assert_eq!(ctx.response_body, json!([{"id": 1, "name": "a"}]));
    }

    #[tokio::test]
    async fn test_placeholders_answer_null() {
        let ctx = run(Method::PUT, "/widgets/update", json!({})).await.unwrap();
        assert_eq!(ctx.response_body, Value::Null);
        assert_eq!(ctx.status, StatusCode::OK);
        let ctx = run(Method::DELETE, "/widgets/delete", json!({})).await.unwrap();
        assert_eq!(ctx.response_body, Value::Null);
    }

    #[tokio::test]
    async fn test_capture_error_shapes_the_body() {
        let err = run(Method::GET, "/widgets/fail", json!({})).await.unwrap_err();
        let mut ctx = RequestContext::new(Method::GET, "/widgets/fail", ModelRegistry::default());

        capture_error(&mut ctx, &err, true);
        assert_eq!(ctx.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.response_body["error"], json!("database is down"));
        assert_eq!(ctx.response_body["code"], json!(500));
        assert!(ctx.response_body["stack"].as_str().unwrap().contains("database is down"));

        capture_error(&mut ctx, &HttpError::not_found(), false);
        assert_eq!(ctx.status, StatusCode::NOT_FOUND);
        assert_eq!(ctx.response_body, json!({"error": "Unknown path", "code": 404}));
    }
}

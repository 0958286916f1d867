use super::{Interceptor, InterceptorError, Next};
use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer running an ordered chain of interceptors around the inner service.
#[derive(Clone)]
pub struct InterceptorLayer {
    interceptors: Arc<Vec<Box<dyn Interceptor>>>,
}

impl InterceptorLayer {
    pub fn new(interceptors: Vec<Box<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
        }
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = InterceptorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptorMiddleware {
            inner,
            interceptors: Arc::clone(&self.interceptors),
        }
    }
}

#[derive(Clone)]
pub struct InterceptorMiddleware<S> {
    inner: S,
    interceptors: Arc<Vec<Box<dyn Interceptor>>>,
}

/// 500 response for a failure raised by an interceptor itself.
pub(crate) fn failure_response(err: &InterceptorError) -> Response {
    tracing::error!("Request pipeline failed: {}", err);
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "code": status.as_u16(),
        })),
    )
        .into_response()
}

impl<S> Service<Request<Body>> for InterceptorMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<InterceptorError> + Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is cloned per call and polled for readiness by `oneshot`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let interceptors = Arc::clone(&self.interceptors);
        let inner = self.inner.clone();

        Box::pin(async move {
            let mut chain = Next::new(move |req| {
                Box::pin(async move {
                    use tower::ServiceExt;
                    inner.oneshot(req).await.map_err(Into::<InterceptorError>::into)
                })
            });

            // Wrap from the innermost interceptor outwards so index 0 runs first.
            for i in (0..interceptors.len()).rev() {
                let interceptors = Arc::clone(&interceptors);
                let next = chain;
                chain = Next::new(move |req| {
                    Box::pin(async move { interceptors[i].intercept(req, next).await })
                });
            }

            Ok(match chain.run(request).await {
                Ok(response) => response,
                Err(err) => failure_response(&err),
            })
        })
    }
}

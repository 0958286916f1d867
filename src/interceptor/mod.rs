//! Request pipeline stages.
//!
//! Each stage is an [`Interceptor`]: it sees the request before the rest of
//! the chain runs and the response after it returns. [`InterceptorLayer`]
//! mounts an ordered list of them on a router; the first interceptor wraps
//! everything after it.

mod json;
mod layer;
mod timing;

pub use json::JsonContentInterceptor;
pub use layer::{InterceptorLayer, InterceptorMiddleware};
pub use timing::{POWERED_BY, ResponseTimeInterceptor, X_POWERED_BY, X_RESPONSE_TIME};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;

/// Standard return type for interceptors.
pub type InterceptorResult = Result<Response, InterceptorError>;

/// A type-erased error for interceptors.
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

type ChainFuture = Pin<Box<dyn Future<Output = InterceptorResult> + Send>>;

/// The remainder of the chain after the current interceptor.
pub struct Next {
    run: Box<dyn FnOnce(Request<Body>) -> ChainFuture + Send>,
}

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> ChainFuture + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Run the rest of the chain.
    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}

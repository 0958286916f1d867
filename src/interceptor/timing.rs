use super::layer::failure_response;
use super::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
};
use std::time::Instant;

pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");
pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Software signature sent with every response.
pub const POWERED_BY: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Times everything downstream and annotates the response with the elapsed
/// milliseconds and the software signature.
#[derive(Clone, Default)]
pub struct ResponseTimeInterceptor;

#[async_trait]
impl Interceptor for ResponseTimeInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let start = Instant::now();

        let mut response = match next.run(request).await {
            Ok(response) => response,
            Err(e) => failure_response(&e),
        };

        let elapsed = start.elapsed();
        tracing::debug!("{} {} {} {:?}", method, uri, response.status(), elapsed);

        let headers = response.headers_mut();
        headers.insert(
            X_RESPONSE_TIME,
            HeaderValue::from_str(&format!("{}ms", elapsed.as_millis()))?,
        );
        headers.insert(X_POWERED_BY, HeaderValue::from_static(POWERED_BY));
        Ok(response)
    }
}

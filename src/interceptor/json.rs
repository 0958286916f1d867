use super::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, header},
};

/// JSON is the only representation served: the response content type is
/// always `application/json`.
#[derive(Clone, Default)]
pub struct JsonContentInterceptor;

/// Whether the `Accept` header admits a JSON response. A missing header
/// accepts anything.
pub fn accepts_json(headers: &HeaderMap) -> bool {
    let mut values = headers.get_all(header::ACCEPT).iter().peekable();
    if values.peek().is_none() {
        return true;
    }
    values
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|range| range.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .any(|range| {
            matches!(range.as_str(), "application/json" | "application/*" | "*/*")
                || range.ends_with("+json")
        })
}

#[async_trait]
impl Interceptor for JsonContentInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        if !accepts_json(request.headers()) {
            tracing::debug!(
                "{} {} does not accept JSON; answering with JSON anyway",
                request.method(),
                request.uri()
            );
        }

        let mut response = next.run(request).await?;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }
}

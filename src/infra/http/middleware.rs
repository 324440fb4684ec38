use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_FORWARDED_ID_LEN: usize = 64;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse a sane upstream `x-request-id` so proxy and application logs line up.
fn forwarded_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let usable = !raw.is_empty()
        && raw.len() <= MAX_FORWARDED_ID_LEN
        && raw
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'));
    usable.then(|| raw.to_string())
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = forwarded_request_id(request.headers())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext { request_id };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Logs every 4xx/5xx with the `ErrorReport` a handler attached, if any.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let failure = FailedResponse {
        status,
        method: method.as_str(),
        path: uri.path(),
        query: uri.query().unwrap_or(""),
        elapsed_ms: start.elapsed().as_millis(),
        source,
        messages: &messages,
        request_id: &request_id,
    };
    failure.log();

    response
}

struct FailedResponse<'a> {
    status: StatusCode,
    method: &'a str,
    path: &'a str,
    query: &'a str,
    elapsed_ms: u128,
    source: &'static str,
    messages: &'a [String],
    request_id: &'a str,
}

impl FailedResponse<'_> {
    fn detail(&self) -> &str {
        self.messages
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    fn log(&self) {
        let detail = self.detail();
        if self.status.is_server_error() {
            error!(
                target = "quire::http::response",
                status = self.status.as_u16(),
                method = self.method,
                path = self.path,
                query = self.query,
                elapsed_ms = self.elapsed_ms,
                source = self.source,
                detail,
                chain = ?self.messages,
                request_id = self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "quire::http::response",
                status = self.status.as_u16(),
                method = self.method,
                path = self.path,
                query = self.query,
                elapsed_ms = self.elapsed_ms,
                source = self.source,
                detail,
                chain = ?self.messages,
                request_id = self.request_id,
                "client request error",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).expect("header value"));
        headers
    }

    #[test]
    fn forwarded_id_is_reused_when_well_formed() {
        assert_eq!(
            forwarded_request_id(&headers_with("edge-42.a_b")).as_deref(),
            Some("edge-42.a_b")
        );
    }

    #[test]
    fn forwarded_id_is_ignored_when_missing_or_odd() {
        assert!(forwarded_request_id(&HeaderMap::new()).is_none());
        assert!(forwarded_request_id(&headers_with("   ")).is_none());
        assert!(forwarded_request_id(&headers_with("has space")).is_none());
        assert!(forwarded_request_id(&headers_with(&"x".repeat(65))).is_none());
    }
}

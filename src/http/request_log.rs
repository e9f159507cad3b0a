// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Instant;

use axum::body::Body;
use axum::body::Bytes;
use axum::body::HttpBody;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::Request;
use axum::http::Response;
use axum::http::header;
use http_body_util::BodyExt;
use tower::Layer;
use tower::Service;

use crate::attr::Attr;
use crate::config::MiddlewareConfig;
use crate::http::REQUEST_ID_HEADER;
use crate::http::RequestId;
use crate::http::client_ip;
use crate::http::resolve_logger;
use crate::logger::Logger;
use crate::record::Level;

const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "x-access-token",
    "x-csrf-token",
];

/// Cache outcome of a response, attached by handlers as a response extension.
///
/// ```
/// use axum::response::IntoResponse;
/// use axum::response::Response;
/// use logsieve::http::CacheStatus;
///
/// fn cached(body: String) -> Response {
///     let mut response = body.into_response();
///     response.extensions_mut().insert(CacheStatus::new("HIT"));
///     response
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus(pub Cow<'static, str>);

impl CacheStatus {
    pub fn new(status: impl Into<Cow<'static, str>>) -> Self {
        Self(status.into())
    }
}

/// Options of [`RequestLogLayer`].
#[derive(Debug, Clone)]
pub struct RequestLogConfig {
    /// Capture request bodies of `POST`, `PUT` and `PATCH` requests.
    pub log_body: bool,
    /// Capture request headers, sensitive values filtered.
    pub log_headers: bool,
    /// Captured bodies longer than this are truncated.
    pub max_body_size: usize,
    /// Requests whose path starts with one of these are not logged.
    pub skip_paths: Vec<String>,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self::from(&MiddlewareConfig::default())
    }
}

impl From<&MiddlewareConfig> for RequestLogConfig {
    fn from(config: &MiddlewareConfig) -> Self {
        Self {
            log_body: config.log_body,
            log_headers: config.log_headers,
            max_body_size: config.max_body_size,
            skip_paths: ["/health", "/ping", "/metrics"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Layer that logs one `HTTP Request` record per request.
///
/// The record is emitted at [`Level::Error`] for server errors, [`Level::Warn`] for client errors
/// and [`Level::Info`] otherwise. Headers and bodies are only attached when the response failed or
/// the logger is enabled for [`Level::Debug`].
#[derive(Debug, Clone, Default)]
pub struct RequestLogLayer {
    config: Arc<RequestLogConfig>,
    logger: Option<Logger>,
}

impl RequestLogLayer {
    pub fn new(config: RequestLogConfig) -> Self {
        Self {
            config: Arc::new(config),
            logger: None,
        }
    }

    /// Log to `logger` instead of the default logger.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            config: self.config.clone(),
            logger: self.logger.clone(),
        }
    }
}

/// Service that logs one record per request.
#[derive(Debug, Clone)]
pub struct RequestLogService<S> {
    inner: S,
    config: Arc<RequestLogConfig>,
    logger: Option<Logger>,
}

impl<S, ResBody> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ResBody: HttpBody + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path().to_string();
        if self.config.skip_paths.iter().any(|p| path.starts_with(p.as_str())) {
            return Box::pin(self.inner.call(request));
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();
        let logger = resolve_logger(&self.logger);

        Box::pin(async move {
            let start = Instant::now();
            let info = RequestInfo::new(&request, &config);

            let (request, body) = if config.log_body && should_capture_body(&request) {
                let (parts, body) = request.into_parts();
                // a body that fails to arrive is forwarded empty
                let bytes = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(_) => Bytes::new(),
                };
                let request = Request::from_parts(parts, Body::from(bytes.clone()));
                (request, Some(bytes))
            } else {
                (request, None)
            };

            let response = inner.call(request).await?;
            let latency = start.elapsed();

            let status = response.status().as_u16();
            let level = level_for_status(status);
            if !logger.enabled(level) {
                return Ok(response);
            }

            let request_size = match &body {
                Some(bytes) => bytes.len() as u64,
                None => info.content_length,
            };
            let response_size = content_length(response.headers())
                .or_else(|| response.body().size_hint().exact())
                .unwrap_or(0);

            let mut attrs = vec![
                Attr::new("type", "http_request"),
                Attr::new("method", info.method.to_string()),
                Attr::new("path", path),
                Attr::new("status", status),
                Attr::new("latency", latency),
                Attr::new("client_ip", info.client_ip),
                Attr::new("user_agent", info.user_agent),
                Attr::new("request_size", request_size),
                Attr::new("response_size", response_size),
            ];
            if let Some(query) = info.query {
                attrs.push(Attr::new("query", query));
            }
            if let Some(CacheStatus(cache)) = response.extensions().get::<CacheStatus>() {
                attrs.push(Attr::new("cache", cache.clone()));
            }

            let verbose = status >= 400 || logger.enabled(Level::Debug);
            if verbose && !info.headers.is_empty() {
                attrs.push(Attr::group("headers", info.headers));
            }
            if let Some(bytes) = body.filter(|b| verbose && !b.is_empty()) {
                attrs.push(Attr::new(
                    "request_body",
                    prepare_body(&bytes, config.max_body_size),
                ));
            }
            if let Some(id) = info.request_id {
                attrs.push(Attr::new("request_id", id));
            }

            logger.log(level, "HTTP Request", attrs);
            Ok(response)
        })
    }
}

/// What is kept of the request once it is handed to the inner service.
struct RequestInfo {
    method: Method,
    query: Option<String>,
    client_ip: String,
    user_agent: String,
    content_length: u64,
    request_id: Option<String>,
    headers: Vec<Attr>,
}

impl RequestInfo {
    fn new(request: &Request<Body>, config: &RequestLogConfig) -> Self {
        let headers = request.headers();
        let request_id = match request.extensions().get::<RequestId>() {
            Some(id) => Some(id.to_string()),
            None => headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        };

        RequestInfo {
            method: request.method().clone(),
            query: request
                .uri()
                .query()
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            client_ip: client_ip(request),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            content_length: content_length(headers).unwrap_or(0),
            request_id,
            headers: if config.log_headers {
                header_attrs(headers)
            } else {
                vec![]
            },
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn header_attrs(headers: &HeaderMap) -> Vec<Attr> {
    headers
        .keys()
        .map(|name| {
            let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[FILTERED]".to_string()
            } else {
                headers
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            Attr::new(name.as_str().to_string(), value)
        })
        .collect()
}

fn should_capture_body<B>(request: &Request<B>) -> bool {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return false;
    }

    !request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

fn prepare_body(bytes: &[u8], max_size: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let body = if text.len() > max_size {
        let mut end = max_size;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &text[..end])
    } else {
        text.into_owned()
    };

    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => value.to_string(),
            Err(_) => trimmed.to_string(),
        };
    }
    body
}

fn level_for_status(status: u16) -> Level {
    match status {
        500.. => Level::Error,
        400..=499 => Level::Warn,
        _ => Level::Info,
    }
}

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

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use axum::http::Request;
use axum::http::Response;
use axum::http::StatusCode;
use axum::http::header;
use futures::FutureExt;
use tower::Layer;
use tower::Service;

use crate::attr::Attr;
use crate::http::client_ip;
use crate::http::resolve_logger;
use crate::logger::Logger;

/// Layer that turns a panic of the inner service into a `500 Internal Server Error`.
///
/// Each recovered panic is logged as one `Panic recovered` record at error level.
#[derive(Debug, Clone, Default)]
pub struct RecoveryLayer {
    logger: Option<Logger>,
}

impl RecoveryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log to `logger` instead of the default logger.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service that turns a panic of the inner service into a `500 Internal Server Error`.
#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: S,
    logger: Option<Logger>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RecoveryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let panic = PanicContext {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            client_ip: client_ip(&request),
            user_agent: request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            logger: resolve_logger(&self.logger),
        };

        let inner = &mut self.inner;
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| inner.call(request))) {
            Ok(future) => future,
            Err(payload) => return Box::pin(async move { Ok(panic.recover(payload)) }),
        };

        Box::pin(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Ok(panic.recover(payload)),
            }
        })
    }
}

struct PanicContext {
    method: String,
    path: String,
    client_ip: String,
    user_agent: String,
    logger: Logger,
}

impl PanicContext {
    fn recover<B: Default>(self, payload: Box<dyn Any + Send>) -> Response<B> {
        self.logger.error(
            "Panic recovered",
            [
                Attr::new("type", "panic"),
                Attr::new("method", self.method),
                Attr::new("path", self.path),
                Attr::new("client_ip", self.client_ip),
                Attr::new("error", panic_message(payload.as_ref())),
                Attr::new("user_agent", self.user_agent),
            ],
        );

        let mut response = Response::new(B::default());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

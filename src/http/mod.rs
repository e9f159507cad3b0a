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

//! Request middleware for axum and tower services.
//!
//! Stack the layers so that request ids are assigned before requests are logged, and panics are
//! recovered innermost:
//!
//! ```
//! use axum::Router;
//! use axum::routing::get;
//! use logsieve::http::RecoveryLayer;
//! use logsieve::http::RequestIdLayer;
//! use logsieve::http::RequestLogLayer;
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(RecoveryLayer::new())
//!     .layer(RequestLogLayer::default())
//!     .layer(RequestIdLayer::new());
//! ```

use crate::logger::Logger;
use crate::logger::default_logger;

mod client_ip;
mod recovery;
mod request_id;
mod request_log;

pub use self::client_ip::client_ip;
pub use self::recovery::RecoveryLayer;
pub use self::recovery::RecoveryService;
pub use self::request_id::REQUEST_ID_HEADER;
pub use self::request_id::RequestId;
pub use self::request_id::RequestIdLayer;
pub use self::request_id::RequestIdService;
pub use self::request_log::CacheStatus;
pub use self::request_log::RequestLogConfig;
pub use self::request_log::RequestLogLayer;
pub use self::request_log::RequestLogService;

/// The logger a layer was given, or the default logger at the time of the request.
fn resolve_logger(logger: &Option<Logger>) -> Logger {
    logger.clone().unwrap_or_else(default_logger)
}

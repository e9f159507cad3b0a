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

//! Logsieve is a structured logging pipeline for HTTP services.
//!
//! # Overview
//!
//! A [`Logger`] hands records to a chain of [handlers](handler::Handler). A
//! [`Sink`](handler::Sink) renders records with a [layout](layout) (colorized, plain text or JSON)
//! and writes them to the console or a [rolling file](writer::RollingFileWriter). A
//! [`SmartFilter`](filter::SmartFilter) drops noise before it reaches a sink: framework debug
//! chatter, health checks, browser devtools noise and repeated transient errors. A
//! [`Dispatch`](handler::Dispatch) fans records out to several handlers.
//!
//! The whole chain can be assembled from a YAML [configuration](config::Config), and the
//! [`http`] module provides axum / tower layers that log one record per request.
//!
//! # Examples
//!
//! Assemble a pipeline by hand:
//!
//! ```
//! use logsieve::Attr;
//! use logsieve::Level;
//! use logsieve::Logger;
//! use logsieve::filter::SmartFilter;
//! use logsieve::handler::Sink;
//! use logsieve::layout::ColorLayout;
//!
//! let console = Sink::stderr().with_layout(ColorLayout::default());
//! let logger = Logger::new(SmartFilter::new(console).min_level(Level::Info));
//!
//! logger.info("server started", [Attr::new("port", 8080)]);
//! ```
//!
//! Or from configuration, installing the default logger and the `log` crate bridge:
//!
//! ```
//! use logsieve::config::Config;
//!
//! let config = Config::from_yaml_str("logger:\n  output:\n    file:\n      enabled: false\n")
//!     .unwrap();
//! logsieve::setup::init(&config).unwrap();
//! logsieve::bridge::setup_log_crate();
//!
//! log::warn!(attempt = 3; "upstream timeout");
//! logsieve::setup::shutdown();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod attr;
pub mod bridge;
pub mod config;
pub mod filter;
pub mod handler;
pub mod highlight;
pub mod layout;
pub mod logger;
pub mod privacy;
pub mod record;
pub mod setup;
pub mod trap;
pub mod writer;

#[cfg(feature = "http")]
pub mod http;

mod clock;
mod error;

pub use self::attr::Attr;
pub use self::error::Error;
pub use self::logger::Logger;
pub use self::record::Level;
pub use self::record::Record;

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

//! Assemble a handler chain from a [`Config`].

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use crate::Error;
use crate::config::Config;
use crate::config::ConsoleFormat;
use crate::config::FileFormat;
use crate::filter::SmartFilter;
use crate::handler::Dispatch;
use crate::handler::Handler;
use crate::handler::Sink;
use crate::layout::ColorLayout;
use crate::layout::JsonLayout;
use crate::layout::Layout;
use crate::layout::TextLayout;
use crate::logger::Logger;
use crate::logger::set_default_logger;
use crate::logger::take_default_logger;
use crate::privacy::Privacy;
use crate::privacy::set_privacy;
use crate::writer::RollingFileWriterBuilder;

const MEGABYTE: usize = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Build the root handler described by `config`.
///
/// The console sink writes to the standard error and is wrapped by a [`SmartFilter`] when smart
/// filtering is on. The file sink is never filtered. When no sink is enabled, a colorized console
/// sink is used.
///
/// # Errors
///
/// Return an error if the log directory or the log file cannot be created.
pub fn build_handler(config: &Config) -> Result<Box<dyn Handler>, Error> {
    let logger = &config.logger;
    let level = logger.level();
    let mut handlers: Vec<Box<dyn Handler>> = vec![];

    let console = &logger.output.console;
    if console.enabled {
        let layout: Box<dyn Layout> = match console.format {
            ConsoleFormat::Color => {
                ColorLayout::default()
                    .highlight(logger.features.keyword_highlight)
                    .into()
            }
            ConsoleFormat::Text => TextLayout::default().into(),
            ConsoleFormat::Json => JsonLayout::default().into(),
        };
        let sink = Sink::stderr().with_layout(layout).with_min_level(level);

        if logger.features.smart_filter {
            let filter = SmartFilter::new(sink)
                .min_level(level)
                .dedup_window(logger.features.dedup_window);
            handlers.push(filter.into());
        } else {
            handlers.push(sink.into());
        }
    }

    let file = &logger.output.file;
    if file.enabled {
        let rotation = &file.rotation;
        let mut builder = RollingFileWriterBuilder::new(&file.path).compress(rotation.compress);
        if let Some(max_size) = NonZeroUsize::new(rotation.max_size.saturating_mul(MEGABYTE)) {
            builder = builder.max_file_size(max_size);
        }
        if let Some(max_backups) = NonZeroUsize::new(rotation.max_backups) {
            builder = builder.max_backups(max_backups);
        }
        if rotation.max_age > 0 {
            let max_age = rotation.max_age.saturating_mul(SECONDS_PER_DAY);
            builder = builder.max_age(Duration::from_secs(max_age));
        }
        let writer = builder.build()?;

        let layout: Box<dyn Layout> = match file.format {
            FileFormat::Text => TextLayout::default().into(),
            FileFormat::Json => JsonLayout::default().into(),
        };
        let sink = Sink::new(writer).with_layout(layout).with_min_level(level);
        handlers.push(sink.into());
    }

    match handlers.len() {
        0 => {
            let sink = Sink::stderr()
                .with_layout(ColorLayout::default())
                .with_min_level(level);
            Ok(sink.into())
        }
        1 => Ok(handlers.remove(0)),
        _ => Ok(Dispatch::new(handlers).into()),
    }
}

/// Build a [`Logger`] over [`build_handler`].
pub fn build_logger(config: &Config) -> Result<Logger, Error> {
    build_handler(config).map(Logger::new)
}

/// Build a logger, install it as the default logger and install the privacy switches.
///
/// # Errors
///
/// Return an error if a sink cannot be constructed. Nothing is installed in that case.
///
/// # Examples
///
/// ```
/// use logsieve::config::Config;
///
/// let mut config = Config::default();
/// config.logger.output.file.enabled = false;
///
/// let logger = logsieve::setup::init(&config).unwrap();
/// logger.info("service started", []);
/// logsieve::setup::shutdown();
/// ```
pub fn init(config: &Config) -> Result<Logger, Error> {
    let logger = build_logger(config)?;
    set_privacy(Privacy::from(config.logger.features.privacy));
    set_default_logger(logger.clone());
    Ok(logger)
}

/// Load the configuration at `path`, falling back to the defaults, then [`init`].
pub fn init_from_path(path: impl AsRef<Path>) -> Result<Logger, Error> {
    init(&Config::load_or_default(path))
}

/// Flush and uninstall the default logger.
pub fn shutdown() {
    if let Some(logger) = take_default_logger() {
        logger.flush();
    }
}

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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::time::SystemTime;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::Error;
use crate::trap::DefaultTrap;
use crate::trap::Trap;
use crate::clock::Clock;

const GZ_SUFFIX: &str = ".gz";

/// A writer for a log file that is rotated once it reaches a size limit.
///
/// The active file keeps its configured name. On rotation it becomes `<name>.1`, and older
/// archives shift to `<name>.2`, `<name>.3` and so on. Archives are optionally gzip compressed
/// (`<name>.1.gz`), and pruned by count and by age.
#[derive(Debug)]
pub struct RollingFileWriter {
    state: State,
    writer: File,
}

impl Drop for RollingFileWriter {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            let err = Error::new("failed to flush file writer on dropped").with_source(err);
            self.state.trap.trap(&err);
        }
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.should_rollover(buf.len()) {
            self.state.current_filesize = 0;
            self.state.refresh_writer(&mut self.writer);
        }

        self.writer
            .write(buf)
            .inspect(|&n| self.state.current_filesize += n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A builder for configuring [`RollingFileWriter`].
#[derive(Debug)]
pub struct RollingFileWriterBuilder {
    // required
    path: PathBuf,

    // has default
    max_size: Option<NonZeroUsize>,
    max_backups: Option<NonZeroUsize>,
    max_age: Option<Duration>,
    compress: bool,
    clock: Clock,
    trap: Box<dyn Trap>,
}

impl RollingFileWriterBuilder {
    /// Creates a new [`RollingFileWriterBuilder`] for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: None,
            max_backups: None,
            max_age: None,
            compress: false,
            clock: Clock::DefaultClock,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the trap for the rolling file writer.
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Set the maximum size of a log file in bytes.
    #[must_use]
    pub fn max_file_size(mut self, n: NonZeroUsize) -> Self {
        self.max_size = Some(n);
        self
    }

    /// Set the maximum number of archived files to keep.
    #[must_use]
    pub fn max_backups(mut self, n: NonZeroUsize) -> Self {
        self.max_backups = Some(n);
        self
    }

    /// Remove archives older than `age` on rotation.
    #[must_use]
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Gzip archives on rotation.
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the [`RollingFileWriter`].
    ///
    /// # Errors
    ///
    /// Return an error if the path has no file name, or if the log directory or the log file
    /// cannot be created.
    pub fn build(self) -> Result<RollingFileWriter, Error> {
        let Self {
            path,
            max_size,
            max_backups,
            max_age,
            compress,
            clock,
            trap,
        } = self;

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new("log file path must end with a file name")
                    .with_context("path", path.display())
            })?;
        let log_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (state, writer) = State::new(
            log_dir,
            filename,
            max_size,
            max_backups,
            max_age,
            compress,
            clock,
            trap,
        )?;

        Ok(RollingFileWriter { state, writer })
    }
}

#[derive(Debug)]
struct Archive {
    filepath: PathBuf,
    index: usize,
    compressed: bool,
    modified: Option<SystemTime>,
}

#[derive(Debug)]
struct State {
    log_dir: PathBuf,
    log_filename: String,
    current_filesize: usize,
    max_size: Option<NonZeroUsize>,
    max_backups: Option<NonZeroUsize>,
    max_age: Option<Duration>,
    compress: bool,
    clock: Clock,
    trap: Box<dyn Trap>,
}

impl State {
    #[allow(clippy::too_many_arguments)]
    fn new(
        log_dir: PathBuf,
        log_filename: String,
        max_size: Option<NonZeroUsize>,
        max_backups: Option<NonZeroUsize>,
        max_age: Option<Duration>,
        compress: bool,
        clock: Clock,
        trap: Box<dyn Trap>,
    ) -> Result<(Self, File), Error> {
        fs::create_dir_all(&log_dir).map_err(|err| {
            Error::new("failed to create log directory")
                .with_context("dir", log_dir.display())
                .with_source(err)
        })?;

        let mut state = State {
            log_dir,
            log_filename,
            current_filesize: 0,
            max_size,
            max_backups,
            max_age,
            compress,
            clock,
            trap,
        };

        let file = state.open_log_writer()?;
        state.current_filesize = file
            .metadata()
            .map(|metadata| metadata.len() as usize)
            .unwrap_or_default();

        Ok((state, file))
    }

    fn current_filename(&self) -> PathBuf {
        self.log_dir.join(&self.log_filename)
    }

    fn archive_filename(&self, index: usize, compressed: bool) -> PathBuf {
        let filename = &self.log_filename;
        let suffix = if compressed { GZ_SUFFIX } else { "" };
        self.log_dir.join(format!("{filename}.{index}{suffix}"))
    }

    // continue to use an existing current log file
    fn open_log_writer(&self) -> Result<File, Error> {
        let filename = self.current_filename();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)
            .map_err(|err| {
                Error::new("failed to open log file")
                    .with_context("path", filename.display())
                    .with_source(err)
            })
    }

    fn list_archives(&self) -> Result<Vec<Archive>, Error> {
        let read_dir = fs::read_dir(&self.log_dir).map_err(|err| {
            Error::new(format!(
                "failed to read log dir: {}",
                self.log_dir.display()
            ))
            .with_source(err)
        })?;

        let prefix = format!("{}.", self.log_filename);
        let archives = read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let metadata = entry.metadata().ok()?;
                // the writer only creates files, not directories or symlinks
                if !metadata.is_file() {
                    return None;
                }

                let filename = entry.file_name();
                // if the filename is not a UTF-8 string, skip it.
                let rest = filename.to_str()?.strip_prefix(&prefix)?;
                let (rest, compressed) = match rest.strip_suffix(GZ_SUFFIX) {
                    Some(rest) => (rest, true),
                    None => (rest, false),
                };
                let index = usize::from_str(rest).ok()?;

                Some(Archive {
                    filepath: entry.path(),
                    index,
                    compressed,
                    modified: metadata.modified().ok(),
                })
            })
            .collect::<Vec<_>>();

        Ok(archives)
    }

    fn rotate_log_writer(&self) -> Result<File, Error> {
        let mut archives = self.list_archives()?;
        archives.sort_by(|a, b| b.index.cmp(&a.index));
        for archive in &archives {
            let next = self.archive_filename(archive.index + 1, archive.compressed);
            fs::rename(&archive.filepath, &next).map_err(|err| {
                Error::new(format!(
                    "failed to rotate log: {}",
                    archive.filepath.display()
                ))
                .with_source(err)
            })?;
        }

        let current_filepath = self.current_filename();
        let archive_filepath = self.archive_filename(1, false);
        fs::rename(&current_filepath, &archive_filepath).map_err(|err| {
            Error::new(format!(
                "failed to archive log: {}",
                current_filepath.display()
            ))
            .with_source(err)
        })?;

        if self.compress {
            let compressed = self.archive_filename(1, true);
            if let Err(err) = compress_file(&archive_filepath, &compressed) {
                let err = Error::new("failed to compress archived log")
                    .with_context("path", archive_filepath.display())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }

        if let Err(err) = self.delete_expired_logs() {
            let err = Error::new("failed to delete expired logs").with_source(err);
            self.trap.trap(&err);
        }

        self.open_log_writer()
    }

    fn delete_expired_logs(&self) -> Result<(), Error> {
        let now = self.clock.now();
        for archive in self.list_archives()? {
            let over_count = self
                .max_backups
                .is_some_and(|max| archive.index > max.get());
            let over_age = match (self.max_age, archive.modified) {
                (Some(max_age), Some(modified)) => now
                    .duration_since(modified)
                    .is_ok_and(|age| age > max_age),
                _ => false,
            };

            if over_count || over_age {
                let filepath = &archive.filepath;
                fs::remove_file(filepath).map_err(|err| {
                    Error::new(format!("failed to remove old log: {}", filepath.display()))
                        .with_source(err)
                })?;
            }
        }
        Ok(())
    }

    fn refresh_writer(&self, file: &mut File) {
        if let Err(err) = file.flush() {
            let err = Error::new("failed to flush previous writer").with_source(err);
            self.trap.trap(&err);
        }

        match self.rotate_log_writer() {
            Ok(new_file) => *file = new_file,
            Err(err) => {
                let err = Error::new("failed to rotate log writer").with_source(err);
                self.trap.trap(&err);
            }
        }
    }

    fn should_rollover(&self, incoming: usize) -> bool {
        self.max_size.is_some_and(|n| {
            self.current_filesize > 0 && self.current_filesize + incoming > n.get()
        })
    }
}

fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let output = File::create(dst)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(src)
}

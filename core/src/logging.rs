//! Category-based log routing on top of the `log` facade.
//!
//! A [`LogConfig`] declares named appenders (output sinks) and named categories
//! (logical streams). Each category points at one or more appenders and carries
//! a minimum level. [`LogConfig::build`] opens the sinks and yields a
//! [`LogRouter`], which dispatches every record by its target: the target names
//! the category, and unknown targets fall back to `default`.
use crate::error::LogSetupError;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use env_logger::{Target, WriteStyle};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CATEGORY: &str = "default";
pub const BLOCK_INFO_CATEGORY: &str = "blockInfo";
pub const STATUS_CATEGORY: &str = "status";

pub enum AppenderKind {
    Stdout,
    /// Human-facing console output (standard output).
    Console,
    /// Appends to the file, creating it and its parent directories.
    File(PathBuf),
    Pipe(Box<dyn Write + Send>),
}

impl fmt::Debug for AppenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppenderKind::Stdout => f.write_str("Stdout"),
            AppenderKind::Console => f.write_str("Console"),
            AppenderKind::File(path) => f.debug_tuple("File").field(path).finish(),
            AppenderKind::Pipe(_) => f.write_str("Pipe(..)"),
        }
    }
}

#[derive(Debug)]
pub struct AppenderSpec {
    pub name: String,
    pub kind: AppenderKind,
}

#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub name: String,
    pub appenders: Vec<String>,
    pub level: LevelFilter,
}

#[derive(Debug, Default)]
pub struct LogConfig {
    pub appenders: Vec<AppenderSpec>,
    pub categories: Vec<CategorySpec>,
}

/// `Date.toISOString()` shape: UTC, millisecond precision, `Z` suffix.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an appender. Redeclaring a name replaces the earlier sink.
    pub fn appender(mut self, name: &str, kind: AppenderKind) -> Self {
        match self.appenders.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.appenders.push(AppenderSpec {
                name: name.to_string(),
                kind,
            }),
        }
        self
    }

    /// Declares a category. Redeclaring a name replaces its appenders and level.
    pub fn category(mut self, name: &str, appenders: &[&str], level: LevelFilter) -> Self {
        let spec = CategorySpec {
            name: name.to_string(),
            appenders: appenders.iter().map(|a| a.to_string()).collect(),
            level,
        };
        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = spec,
            None => self.categories.push(spec),
        }
        self
    }

    pub fn log_file_path(started_at: DateTime<Utc>, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{}.log", iso_timestamp(started_at)))
    }

    /// The probe's layout: everything on stdout, block info to a per-run file,
    /// node status to the console.
    pub fn for_run(started_at: DateTime<Utc>, log_dir: &Path) -> Self {
        Self::new()
            .appender(DEFAULT_CATEGORY, AppenderKind::Stdout)
            .appender(
                BLOCK_INFO_CATEGORY,
                AppenderKind::File(Self::log_file_path(started_at, log_dir)),
            )
            .appender(STATUS_CATEGORY, AppenderKind::Console)
            .category(DEFAULT_CATEGORY, &[DEFAULT_CATEGORY], LevelFilter::Trace)
            .category(BLOCK_INFO_CATEGORY, &[BLOCK_INFO_CATEGORY], LevelFilter::Info)
            .category(STATUS_CATEGORY, &[STATUS_CATEGORY], LevelFilter::Info)
    }

    pub fn build(self) -> Result<LogRouter, LogSetupError> {
        let mut sinks: HashMap<String, Arc<env_logger::Logger>> = HashMap::new();
        for spec in self.appenders {
            let sink = open_appender(spec.kind)?;
            sinks.insert(spec.name, Arc::new(sink));
        }

        let mut routes = HashMap::new();
        for category in self.categories {
            let mut appenders = Vec::with_capacity(category.appenders.len());
            for name in &category.appenders {
                let sink = sinks
                    .get(name)
                    .ok_or_else(|| LogSetupError::UnknownAppender {
                        category: category.name.clone(),
                        appender: name.clone(),
                    })?;
                appenders.push(Arc::clone(sink));
            }
            routes.insert(
                category.name,
                Route {
                    level: category.level,
                    appenders,
                },
            );
        }

        let default = routes
            .remove(DEFAULT_CATEGORY)
            .ok_or(LogSetupError::MissingDefault)?;
        Ok(LogRouter { default, routes })
    }
}

fn format_record(buf: &mut env_logger::fmt::Formatter, record: &Record<'_>) -> io::Result<()> {
    writeln!(
        buf,
        "[{}] [{}] {} - {}",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.args()
    )
}

fn open_appender(kind: AppenderKind) -> Result<env_logger::Logger, LogSetupError> {
    let target = match kind {
        AppenderKind::Stdout | AppenderKind::Console => Target::Stdout,
        AppenderKind::File(path) => {
            let io_err = |source| LogSetupError::Io {
                path: path.clone(),
                source,
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(io_err)?;
            Target::Pipe(Box::new(file))
        }
        AppenderKind::Pipe(writer) => Target::Pipe(writer),
    };

    // Levels are enforced per category by the router.
    Ok(env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .write_style(WriteStyle::Never)
        .target(target)
        .format(format_record)
        .build())
}

struct Route {
    level: LevelFilter,
    appenders: Vec<Arc<env_logger::Logger>>,
}

pub struct LogRouter {
    default: Route,
    routes: HashMap<String, Route>,
}

impl LogRouter {
    fn route(&self, target: &str) -> &Route {
        self.routes.get(target).unwrap_or(&self.default)
    }

    /// Handle for logging against one category.
    pub fn category<'a>(&'a self, name: &'a str) -> Category<'a> {
        Category::new(self, name)
    }

    pub fn max_level(&self) -> LevelFilter {
        self.routes
            .values()
            .map(|r| r.level)
            .fold(self.default.level, std::cmp::max)
    }

    /// Makes this router the process-wide `log` logger. Only the first call succeeds.
    pub fn install(self) -> Result<(), LogSetupError> {
        let max_level = self.max_level();
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for LogRouter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.route(metadata.target()).level
    }

    fn log(&self, record: &Record<'_>) {
        let route = self.route(record.target());
        if record.level() > route.level {
            return;
        }
        for appender in &route.appenders {
            appender.log(record);
        }
    }

    fn flush(&self) {
        for route in self.routes.values().chain(std::iter::once(&self.default)) {
            for appender in &route.appenders {
                appender.flush();
            }
        }
    }
}

/// A named logical stream on top of any `log::Log`, typically a [`LogRouter`]
/// or the installed global logger.
#[derive(Clone, Copy)]
pub struct Category<'a> {
    logger: &'a dyn Log,
    name: &'a str,
}

impl<'a> Category<'a> {
    pub fn new(logger: &'a dyn Log, name: &'a str) -> Self {
        Category { logger, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(self.name)
            .build();
        self.logger.log(&record);
    }

    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// In-memory sink shared between a test and the appender writing into it.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CaptureBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

#[cfg(test)]
impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Logging setup for the Chameleon runtime.
//!
//! All runtime diagnostics are emitted through `tracing`. This module installs
//! a `tracing-subscriber` stack from [`LoggingConfig`], or from a hand-built
//! [`LoggingBuilder`].
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use chameleon_runtime::config::load_config;
//! use chameleon_runtime::logging;
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.settings()?.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use chameleon_runtime::config::SpanEventConfig;
//! use chameleon_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .directive("chameleon_runtime=debug")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .init();
//! ```
//!
//! Dispatch calls run inside `dispatch` spans carrying the capability and the
//! service name, so [`SpanEventConfig::LIFECYCLE`] shows each service invocation
//! with its duration.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

impl SpanEventConfig {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close, which carries the span's duration.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Every span event.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn fmt_span(&self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builds the subscriber: a [`LoggingConfig`] plus extra filter directives.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
}

impl LoggingBuilder {
    /// Starts from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from `config`.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            directives: Vec::new(),
        }
    }

    /// Sets the global level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Adds a filter directive such as `chameleon_runtime=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Writes to `path` (rotated per `logging.rotation`).
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path);
        self
    }

    /// Global level, then per-module filters sorted by module, then extra directives.
    fn filter_directives(&self) -> Vec<String> {
        let mut modules: Vec<_> = self.config.filters.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));

        std::iter::once(self.config.level.as_str().to_string())
            .chain(modules.into_iter().map(|(module, level)| format!("{module}={level}")))
            .chain(self.directives.iter().cloned())
            .collect()
    }

    /// `RUST_LOG` replaces the global level; every other directive is added on top.
    fn build_filter(&self) -> EnvFilter {
        let mut directives = self.filter_directives().into_iter();
        let level = directives.next().unwrap_or_else(|| LogLevel::Info.to_string());
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        for directive in directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => warn!(directive = %directive, error = %e, "Ignoring invalid log directive"),
            }
        }
        filter
    }

    fn file_appender(&self) -> Option<RollingFileAppender> {
        let path = self.config.file_path.as_deref()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .unwrap_or_else(|| OsStr::new("chameleon.log"))
            .to_string_lossy()
            .into_owned();

        RollingFileAppender::builder()
            .rotation(self.config.rotation.into())
            .filename_prefix(name)
            .max_log_files((self.config.max_files as usize).max(1))
            .build(dir)
            .map_err(|e| warn!(path = %path.display(), error = %e, "Cannot open log file"))
            .ok()
    }

    /// The writer for the configured output. Falls back to stdout when the
    /// log file cannot be opened; the flag reports that.
    fn writer(&self) -> (BoxMakeWriter, bool) {
        match self.config.output {
            LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), false),
            LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), false),
            LogOutput::File => match self.file_appender() {
                Some(appender) => (BoxMakeWriter::new(appender), false),
                None => (BoxMakeWriter::new(std::io::stdout), true),
            },
        }
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let location = self.config.file_location;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.config.span_events.fmt_span())
            .with_thread_ids(self.config.thread_ids)
            .with_file(location)
            .with_line_number(location);

        match self.config.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => layer.compact().boxed(),
        }
    }

    /// Installs the subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber. Fails if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, fell_back) = self.writer();
        let result = tracing_subscriber::registry()
            .with(self.fmt_layer(writer))
            .with(self.build_filter())
            .try_init();

        if fell_back {
            warn!("File output requested but no usable log file, falling back to stdout");
        }
        if cfg!(not(feature = "json-log")) && self.config.format == LogFormat::Json {
            warn!("JSON log format requires the `json-log` feature, using compact");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };
        config
            .filters
            .insert("chameleon_transport".into(), LogLevel::Trace);
        config.filters.insert("axum".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config).directive("hyper=off");
        assert_eq!(
            builder.filter_directives(),
            vec!["debug", "axum=warn", "chameleon_transport=trace", "hyper=off"]
        );
    }

    #[test]
    fn test_setters_override_config() {
        let builder = LoggingBuilder::from_config(&LoggingConfig::default())
            .with_level(LogLevel::Warn)
            .format(LogFormat::Pretty)
            .span_events(SpanEventConfig::LIFECYCLE);
        assert_eq!(builder.filter_directives(), vec!["warn"]);
        assert_eq!(builder.config.format, LogFormat::Pretty);
        assert_eq!(builder.config.span_events, SpanEventConfig::LIFECYCLE);
    }

    #[test]
    fn test_span_events() {
        assert_eq!(SpanEventConfig::NONE.fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEventConfig::FULL.fmt_span(), FmtSpan::FULL);
        assert_eq!(
            SpanEventConfig::LIFECYCLE.fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        assert!(builder.file_appender().is_none());
        assert!(builder.writer().1);

        let builder = LoggingBuilder::new().output(LogOutput::Stderr);
        assert!(!builder.writer().1);
    }
}

//! Logging initialization using `tracing` and `tracing-subscriber`.
//!
//! Output is controlled by:
//! - [`EnvFilter`]: log level filtering, read from `RUST_LOG`
//! - [`LogFormat`]: output format (json, full, compact, bare, pretty), read from `GEOSYNC_LOG_FORMAT`
//!
//! When stderr is a terminal, every open span is also rendered as a progress spinner.

use std::io::{self, IsTerminal as _};
use std::str::FromStr;

use tracing::dispatcher::{SetGlobalDefaultError, set_global_default};
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_log::{InterestCacheConfig, LogTracer};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{MakeWriter, layer as fmt_layer};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("Unable to install the tracing subscriber: {0}")]
    SubscriberError(#[from] SetGlobalDefaultError),

    #[error("Unable to bridge log records into tracing: {0}")]
    LogBridgeError(#[from] log::SetLoggerError),
}

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs.
    Full,
    /// A variant of the full format, optimized for short line lengths.
    Compact,
    /// No timestamps, targets or ANSI colors.
    Bare,
    /// Multi-line logs for local development.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl LogFormat {
    fn layer<S, W>(self, writer: W) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt_layer().with_writer(writer);
        match self {
            Self::Full => layer.with_span_events(FmtSpan::NONE).boxed(),
            Self::Compact => layer.compact().with_span_events(FmtSpan::NONE).boxed(),
            Self::Pretty => layer.pretty().boxed(),
            Self::Bare => layer
                .compact()
                .with_span_events(FmtSpan::NONE)
                .without_time()
                .with_target(false)
                .with_ansi(false)
                .boxed(),
            Self::Json => layer.json().with_span_events(FmtSpan::NONE).boxed(),
        }
    }

    /// Install the global subscriber. Logs go to stderr so that exported documents
    /// can be piped from stdout.
    ///
    /// Uses `set_global_default` directly because `SubscriberInitExt::init()` would also
    /// install its own `LogTracer`, conflicting with the bridge set up by [`init_tracing`].
    pub fn init(self, env_filter: EnvFilter, use_progress: bool) -> Result<(), LoggingError> {
        let registry = tracing_subscriber::registry().with(env_filter);
        let dispatch: Dispatch = if use_progress {
            let progress = IndicatifLayer::new();
            let writer = progress.get_stderr_writer();
            registry.with(self.layer(writer)).with(progress).into()
        } else {
            registry.with(self.layer(io::stderr)).into()
        };
        set_global_default(dispatch)?;
        Ok(())
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "bare" => Ok(Self::Bare),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: json, full, compact, bare or pretty"
            )),
        }
    }
}

fn init_log_bridge(env_filter: &EnvFilter) -> Result<(), log::SetLoggerError> {
    let mut builder = LogTracer::builder().with_interest_cache(InterestCacheConfig::default());
    if let Some(Some(max_level)) = env_filter.max_level_hint().map(LevelFilter::into_level) {
        let max_level = match max_level {
            Level::TRACE => log::LevelFilter::Trace,
            Level::DEBUG => log::LevelFilter::Debug,
            Level::INFO => log::LevelFilter::Info,
            Level::WARN => log::LevelFilter::Warn,
            Level::ERROR => log::LevelFilter::Error,
        };
        builder = builder.with_max_level(max_level);
    }
    builder.init()
}

/// Initialize the global tracing subscriber for the given filter and format.
///
/// An unparsable filter falls back to `debug`, an unknown format to [`LogFormat::default`].
/// Progress spinners are shown only for non-JSON output on a terminal.
pub fn init_tracing(filter: &str, format: Option<String>) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}', falling back to debug");
        EnvFilter::new("debug")
    });

    let log_format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .map_err(|e| {
                    eprintln!("Warning: {e}");
                    eprintln!("Falling back to default format ({:?})", LogFormat::default());
                })
                .ok()
        })
        .unwrap_or_default();

    init_log_bridge(&env_filter)?;
    let use_progress = log_format != LogFormat::Json && io::stderr().is_terminal();
    log_format.init(env_filter, use_progress)
}

/// Build the filter from `RUST_LOG`, keeping `geosync_core` at the level given for `geosync`.
#[must_use]
pub fn ensure_core_log_level_matches(rust_log: Option<String>) -> String {
    const APP: &str = "geosync=";
    const CORE: &str = "geosync_core=";

    let Some(rust_log) = rust_log else {
        return format!("{APP}info,{CORE}info");
    };
    if rust_log.contains(CORE) {
        return rust_log;
    }
    match rust_log.split(',').find_map(|s| s.strip_prefix(APP)) {
        Some(level) => format!("{rust_log},{CORE}{level}"),
        None => rust_log,
    }
}

// Logging System for Troupe
//
// This module provides a unified logging interface for the runtime and the
// actors built on it. It is built on top of the `tracing` ecosystem.
//
// # Usage Examples
//
// ```rust
// use troupe::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Worker threads inherit the global subscriber, so anything logged from an
// actor task ends up in the same sink, tagged with the worker thread name.

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for the logging system
///
/// # Examples
///
/// ```rust
/// use troupe::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("troupe=debug,troupe::timer=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            if let Ok(directive) = directive.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            let layer = fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);
            if config.show_time {
                Box::new(registry.with(layer))
            } else {
                Box::new(registry.with(layer.without_time()))
            }
        };

        set_global_subscriber(subscriber);
    });
}

// Helper function to set the global subscriber
fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode (created if missing) as a log sink.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// Console output respects the ANSI setting, file output is always plain.
/// Fails if the log file cannot be opened.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // surface a bad path to the caller instead of silently logging to stderr
    drop(file_writer(log_file)?);

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || -> Box<dyn io::Write + Send + Sync> {
                match file_writer(&log_file_path) {
                    Ok(writer) => writer,
                    Err(_) => Box::new(io::stderr()),
                }
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level for the runtime, TRACE for the timer subsystem.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("troupe=debug,troupe::timer=trace".to_string()),
    });
}

/// INFO level, JSON output, no file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// WARN level, compact output for test runs.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Create a span for actor-scoped work
///
/// # Examples
///
/// ```rust
/// use troupe::actor_span;
///
/// let span = actor_span!("user", "session-7");
/// let _guard = span.enter();
///
/// // With additional fields
/// let span = actor_span!("room", "room-1", members = 3);
/// ```
#[macro_export]
macro_rules! actor_span {
    ($actor_type:expr, $actor_id:expr) => {
        tracing::debug_span!("actor", kind = $actor_type, id = %$actor_id)
    };
    ($actor_type:expr, $actor_id:expr, $($fields:tt)*) => {
        tracing::debug_span!("actor", kind = $actor_type, id = %$actor_id, $($fields)*)
    };
}

/// Log actor lifecycle events - use for important actor state changes
///
/// # Examples
///
/// ```rust
/// use troupe::log_lifecycle;
///
/// log_lifecycle!("room", "room-1", "created");
/// log_lifecycle!("user", "session-7", "dropped", reason = "disconnect");
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($actor_type:expr, $actor_id:expr, $event:expr) => {
        tracing::info!(actor_type = $actor_type, actor_id = %$actor_id, event = $event);
    };
    ($actor_type:expr, $actor_id:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(actor_type = $actor_type, actor_id = %$actor_id, event = $event, $($fields)*);
    };
}

/// Log scheduling events
///
/// # Examples
///
/// ```rust
/// use troupe::log_scheduler;
///
/// log_scheduler!("worker_pool", "started");
/// log_scheduler!("timer", "started", workers = 4);
/// ```
#[macro_export]
macro_rules! log_scheduler {
    ($scheduler:expr, $event:expr) => {
        tracing::debug!(scheduler = $scheduler, event = $event);
    };
    ($scheduler:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(scheduler = $scheduler, event = $event, $($fields)*);
    };
}

/// Log error events - use for all error conditions
///
/// # Examples
///
/// ```rust
/// use troupe::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
/// log_error!(error);
/// log_error!(error, component = "chat", operation = "enter_room");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*);
    };
}

/// Get the current tracing dispatcher
///
/// Useful for threads spawned outside the runtime that should log through
/// the same configuration.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

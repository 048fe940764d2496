// Logging for the linear algebra engine
//
// A thin layer over the `tracing` ecosystem. The binary initializes it once
// at startup; library code only emits events and spans.
//
// # Usage Examples
//
// ```rust
// use lae::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Log Macros
//
// ```rust
// use lae::{log_node, log_scheduler, worker_span};
//
// let span = worker_span!(3);
// let _guard = span.enter();
// log_scheduler!("tired_executor", "task_dispatched", worker = 3);
// log_node!("ADD", "resolved", rows = 2, cols = 2);
// ```

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Once};

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system
///
/// # Examples
///
/// ```rust
/// use lae::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     target_filters: Some("lae::scheduling=trace".to_string()),
///     ..Default::default()
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
            show_file_line: false,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

impl LogConfig {
    /// Builds the event filter: `RUST_LOG` first, then the configured level
    /// and target directives.
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());
        if let Some(filters) = &self.target_filters {
            for directive in filters.split(',').filter_map(|f| f.trim().parse().ok()) {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

/// Initialize the logging system with the given configuration.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(config.env_filter());

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(fmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(console_layer(&config))),
            (false, false) => Box::new(registry.with(console_layer(&config).without_time())),
        };

        set_global_subscriber(subscriber);
    });
}

/// Initialize logging to the console and to `log_file`.
///
/// # Errors
/// Returns an error if the file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let file = Arc::new(file);

    INIT.call_once(|| {
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(file)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true);

        let subscriber = tracing_subscriber::registry()
            .with(config.env_filter())
            .with(console_layer(&config))
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level with file/line information and TRACE for the scheduler.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("lae=debug,lae::scheduling=trace".to_string()),
    });
}

/// INFO level, JSON output for log aggregators.
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

/// Warnings and errors only, to keep test output clean.
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

fn console_layer<S>(config: &LogConfig) -> fmt::Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info)
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Span covering everything a worker thread does.
///
/// ```rust
/// let span = lae::worker_span!(0);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! worker_span {
    ($worker_id:expr) => {
        tracing::debug_span!("worker", id = $worker_id)
    };
    ($worker_id:expr, $($fields:tt)*) => {
        tracing::debug_span!("worker", id = $worker_id, $($fields)*)
    };
}

/// Log scheduling events
///
/// ```rust
/// lae::log_scheduler!("tired_executor", "task_dispatched", worker = 2, fatigue = 0.0);
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

/// Log expression tree progress
///
/// ```rust
/// lae::log_node!("MULTIPLY", "resolved", rows = 3);
/// ```
#[macro_export]
macro_rules! log_node {
    ($node_type:expr, $event:expr) => {
        tracing::info!(node = %$node_type, event = $event);
    };
    ($node_type:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(node = %$node_type, event = $event, $($fields)*);
    };
}

/// Log an error with optional context fields
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// lae::log_error!(error, operation = "write_output");
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

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};

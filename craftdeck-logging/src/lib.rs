//! Tracing setup for craftdeck binaries
//!
//! Configured through environment variables:
//!
//! | Variable        | Values                      | Default            |
//! |-----------------|-----------------------------|--------------------|
//! | `RUST_LOG`      | any `EnvFilter` directive   | unset              |
//! | `LOG_LEVEL`     | used when `RUST_LOG` is unset | `info`           |
//! | `LOG_OUTPUT`    | `console`, `file`, `both`   | `console`          |
//! | `LOG_FORMAT`    | `human`, `json`             | `human`            |
//! | `LOG_FILE_PATH` | path of the rolling log     | `/tmp/craftdeck.log` |

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, registry, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Dependencies that are too chatty at `debug`
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "tokio=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub file_path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            format: LogFormat::Human,
            file_path: PathBuf::from("/tmp/craftdeck.log"),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Unrecognised values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let output = match lookup("LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => defaults.output,
        };
        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => defaults.format,
        };

        Self {
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            output,
            format,
            file_path: lookup("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in QUIET_TARGETS {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

fn fmt_layer<W>(writer: W, format: LogFormat, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Human => layer.boxed(),
    }
}

/// Initialise the global subscriber from environment variables.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file, otherwise buffered lines are lost on exit.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if matches!(settings.output, LogOutput::Console | LogOutput::Both) {
        layers.push(fmt_layer(std::io::stdout, settings.format, true));
    }

    if matches!(settings.output, LogOutput::File | LogOutput::Both) {
        let path = settings.file_path.as_path();
        let dir = path.parent().unwrap_or_else(|| Path::new("/tmp"));
        let file_name = path
            .file_name()
            .unwrap_or_else(|| "craftdeck.log".as_ref());

        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);
        layers.push(fmt_layer(writer, settings.format, false));
    }

    // A subscriber may already be installed (tests, embedding)
    let _ = registry()
        .with(layers)
        .with(settings.env_filter())
        .try_init();

    guard
}

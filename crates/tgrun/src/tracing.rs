//! Tracing initialization for the CLI.

use clap::ValueEnum;
use std::io;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log verbosity, mapped onto an `EnvFilter` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Show everything.
    Trace,
    /// Debug and above.
    Debug,
    /// Info and above (default).
    Info,
    /// Warnings and errors only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact single-line key=value records.
    KeyValue,
    /// Pretty multi-line human format.
    Pretty,
    /// Structured JSON records.
    Json,
}

/// Initialize the global subscriber. `RUST_LOG` overrides the CLI level.
pub fn init(level: LogLevel, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str();
        EnvFilter::new(format!(
            "tgrun={level},tgrun_core={level},tgrun_config={level},tgrun_graph={level},tgrun_backend={level},tgrun_codegen={level},tgrun_runner={level},tgrun_stack={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::KeyValue => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false);
            registry.with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true);
            registry.with(layer).init();
        }
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true);
            registry.with(layer).init();
        }
    }
}

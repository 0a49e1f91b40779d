//! Thin wrapper around `tracing-subscriber` so the CLI and tests configure
//! logging the same way: stderr, `EnvFilter`-driven, level gated by
//! `--verbosity` unless `RUST_LOG` is set.

use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Verbosity;

pub fn init(verbosity: Verbosity, no_color: bool) {
    let default_directive = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Info => "info",
        Verbosity::Debug => "debug",
        Verbosity::Trace => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .init();
}

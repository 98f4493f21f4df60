//! tracing setup. Output goes to stderr; stdout carries the IPC protocol.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    let default_filter = format!("attendanced={}", level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(false),
    );

    // A second call (tests) keeps the first subscriber.
    let _ = subscriber.try_init();
}

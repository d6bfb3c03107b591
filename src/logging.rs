use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `default_level`.
/// The terminal dashboard owns stdout, so it asks for stderr.
pub fn init_logging(default_level: Level, to_stderr: bool) {
    let level = default_level.as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sales_dashboard={},sales_server={}", level, level))
    });

    let layer = if to_stderr {
        fmt::layer().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stdout).boxed()
    };

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

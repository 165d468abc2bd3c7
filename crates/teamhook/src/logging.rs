use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Level for a `-v` count: warnings by default, then info, debug, trace.
pub fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("teamhook={}", level_for(verbose))));

    // Ignore the error when a subscriber is already installed (tests).
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

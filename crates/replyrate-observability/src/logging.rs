//! Structured logging setup

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Noisy dependencies kept at `warn` unless `RUST_LOG` says otherwise
const QUIET_TARGETS: [&str; 3] = ["hyper=warn", "reqwest=warn", "h2=warn"];

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter for the configured level.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn build_env_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(parse_level(level).to_string());
    for directive in QUIET_TARGETS {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Failed to parse log directive '{}': {}", directive, e),
        }
    }
    filter
}

/// Install the global subscriber (plain text or JSON lines)
pub fn init_logging(level: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_env_filter(level);
    if json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

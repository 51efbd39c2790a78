//! Logging setup for the INVEST crates.
//!
//! Installs a `tracing` subscriber with an env filter and either a pretty or a
//! structured JSON formatter. `RUST_LOG` takes precedence over the configured
//! level when it is set.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

/// Build the env filter, preferring `RUST_LOG` when present.
fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(log_level)
}

/// Initialize logging.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for pretty output
///
/// Calling this more than once is harmless; later calls keep the first subscriber.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);
    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        "Logging initialized"
    );
}

/// Initialize logging from the observability section.
pub fn init_from_config(config: &ObservabilityConfig) {
    init_logging(&config.log_level, &config.log_format);
}

/// Create a tracing span for one (company, year) decision.
///
/// # Example
///
/// ```ignore
/// let span = decision_span!("screen", company, year, route = "network");
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! decision_span {
    ($name:expr, $company:expr, $year:expr) => {
        tracing::info_span!($name, company = %$company, year = $year)
    };
    ($name:expr, $company:expr, $year:expr, $($field:tt)*) => {
        tracing::info_span!($name, company = %$company, year = $year, $($field)*)
    };
}

/// Create a tracing span for a learning run over one network.
#[macro_export]
macro_rules! learning_span {
    ($network:expr, $scoring:expr) => {
        tracing::info_span!("learn", network = %$network, scoring = %$scoring)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("debug", "pretty");
        init_logging("info", "json");
        tracing::debug!("still logging");
    }

    #[test]
    fn test_spans_carry_fields() {
        let span = decision_span!("screen", "ACME", 2019);
        let _enter = span.enter();
        let learn = learning_span!("value", "mdl");
        drop(learn);
    }
}

#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs a stderr fmt subscriber. `RUST_LOG` takes precedence over the
/// configured filter. Returns false when a global subscriber is already set.
pub fn init(cfg: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(cfg))
        .try_init()
        .is_ok()
}

fn filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_installed() {
        let cfg = LoggingConfig::default();
        let _ = init(&cfg);
        assert!(!init(&cfg));
    }
}

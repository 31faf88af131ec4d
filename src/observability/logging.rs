use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initializes the logging system with the given configuration.
pub fn init_logging(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.include_target)
                .with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(config.include_target);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_target(config.include_target);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    tracing::info!("logging initialized at level {}", config.level);
}

/// Masks sensitive values (API keys, payout account references) for logging.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    if value.len() <= visible_chars * 2 {
        return "*".repeat(value.len());
    }

    let prefix = &value[..visible_chars];
    let suffix = &value[value.len() - visible_chars..];
    let masked_len = value.len() - (visible_chars * 2);

    format!("{}{}{}", prefix, "*".repeat(masked_len), suffix)
}

/// Masks a payout destination, keeping only the trailing digits that a
/// support operator needs to identify the account.
pub fn mask_payout_reference(reference: &str) -> String {
    mask_sensitive(reference, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive_short_string() {
        assert_eq!(mask_sensitive("abc", 2), "***");
    }

    #[test]
    fn test_mask_sensitive_long_string() {
        assert_eq!(mask_sensitive("1234567890", 2), "12******90");
    }

    #[test]
    fn test_mask_payout_reference() {
        let masked = mask_payout_reference("RCP_0a1b2c3d4e");
        assert!(masked.starts_with("RCP"));
        assert!(masked.ends_with("d4e"));
        assert!(masked.contains('*'));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::from("json"), LogFormat::Json);
        assert_eq!(LogFormat::from("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from("unknown"), LogFormat::Pretty);
    }
}

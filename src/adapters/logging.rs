//! Tracing subscriber setup from the `[logging]` section.

use crate::ports::config_port::ConfigPort;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = Self::default();
        Self {
            level: config
                .get_string("logging", "level")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or(defaults.level),
            format: config
                .get_string("logging", "format")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or(defaults.format),
        }
    }

    /// Installs the global subscriber on stderr. `RUST_LOG` overrides the level.
    /// A second call is a no-op.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let _ = match self.format.as_str() {
            "json" => fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
        };
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn reads_logging_section() {
        let config =
            FileConfigAdapter::from_string("[logging]\nlevel = DEBUG\nformat = json\n").unwrap();
        assert_eq!(
            LoggingConfig::from_config(&config),
            LoggingConfig {
                level: "debug".into(),
                format: "json".into(),
            }
        );
    }

    #[test]
    fn missing_section_uses_defaults() {
        let config = FileConfigAdapter::from_string("[data]\nfiles = a_b_c.csv\n").unwrap();
        assert_eq!(LoggingConfig::from_config(&config), LoggingConfig::default());
    }
}

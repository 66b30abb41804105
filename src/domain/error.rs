//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for btlens.
#[derive(Debug, thiserror::Error)]
pub enum BtlensError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to load {file}: {reason}")]
    Load { file: String, reason: String },

    #[error("entry date {date} falls on a weekend")]
    WeekendEntry { date: NaiveDate },

    #[error("unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("table is not grouped by {dimension}")]
    MissingDimension { dimension: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("search space of {assignments} assignments exceeds the limit of {limit}")]
    SearchSpaceTooLarge { assignments: u128, limit: u128 },

    #[error("no trade data has been loaded")]
    NotReady,

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BtlensError {
    /// Process exit status for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            BtlensError::Io(_) => 1,
            BtlensError::ConfigParse { .. }
            | BtlensError::ConfigMissing { .. }
            | BtlensError::ConfigInvalid { .. } => 2,
            BtlensError::Load { .. } | BtlensError::WeekendEntry { .. } => 3,
            BtlensError::UnknownMetric { .. }
            | BtlensError::MissingDimension { .. }
            | BtlensError::InvalidParameter { .. }
            | BtlensError::SearchSpaceTooLarge { .. } => 4,
            BtlensError::NotReady | BtlensError::InsufficientData { .. } => 5,
        }
    }
}

impl From<&BtlensError> for std::process::ExitCode {
    fn from(err: &BtlensError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_offending_values() {
        let err = BtlensError::UnknownMetric {
            name: "Omega".into(),
        };
        assert_eq!(err.to_string(), "unknown metric: Omega");

        let err = BtlensError::ConfigInvalid {
            section: "monte_carlo".into(),
            key: "days".into(),
            reason: "days must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [monte_carlo] days: days must be at least 1"
        );
    }

    #[test]
    fn weekend_entry_mentions_date() {
        let err = BtlensError::WeekendEntry {
            date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
        };
        assert!(err.to_string().contains("2024-01-06"));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(BtlensError::Io(std::io::Error::other("x")).exit_code(), 1);
        assert_eq!(
            BtlensError::ConfigMissing {
                section: "data".into(),
                key: "files".into(),
            }
            .exit_code(),
            2
        );
        assert_eq!(
            BtlensError::Load {
                file: "a.csv".into(),
                reason: "bad".into(),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            BtlensError::SearchSpaceTooLarge {
                assignments: 243,
                limit: 100,
            }
            .exit_code(),
            4
        );
        assert_eq!(BtlensError::NotReady.exit_code(), 5);
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BtlensError = io.into();
        assert!(matches!(err, BtlensError::Io(_)));
    }
}

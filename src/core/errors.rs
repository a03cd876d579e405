//! NRS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, NrsError>;

/// Top-level error type for the repository generator.
#[derive(Debug, Error)]
pub enum NrsError {
    #[error("[NRS-1001] invalid LEVEL {level}: accepted values are 1..=4")]
    InvalidLevel { level: i64 },

    #[error("[NRS-1002] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[NRS-1003] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[NRS-1004] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error(
        "[NRS-2001] infeasible budget: CSV presets {}MB + {}MB + {}MB = {csv_total}MB \
         must be below TOTAL_BUDGET_MB={total_budget}MB",
        csv_sizes[0],
        csv_sizes[1],
        csv_sizes[2]
    )]
    InfeasibleBudget {
        csv_sizes: [u64; 3],
        csv_total: u64,
        total_budget: u64,
    },

    #[error("[NRS-2901] planner invariant violated: {details}")]
    PlanInvariant { details: String },

    #[error("[NRS-3001] output directory {path} is not empty (use --force to replace it)")]
    OutputNotEmpty { path: PathBuf },

    #[error("[NRS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[NRS-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[NRS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl NrsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidLevel { .. } => "NRS-1001",
            Self::InvalidConfig { .. } => "NRS-1002",
            Self::MissingConfig { .. } => "NRS-1003",
            Self::ConfigParse { .. } => "NRS-1004",
            Self::InfeasibleBudget { .. } => "NRS-2001",
            Self::PlanInvariant { .. } => "NRS-2901",
            Self::OutputNotEmpty { .. } => "NRS-3001",
            Self::Io { .. } => "NRS-3002",
            Self::Serialization { .. } => "NRS-3101",
            Self::Runtime { .. } => "NRS-3900",
        }
    }

    /// Whether the user can fix the failure by changing configuration.
    #[must_use]
    pub const fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::InvalidLevel { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InfeasibleBudget { .. }
                | Self::OutputNotEmpty { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for NrsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for NrsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

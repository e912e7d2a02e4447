//! Error type shared by the whole crate.
//!
//! Only genuinely malformed input is an error. "No data yet" situations
//! (unknown task or student, too few observations to discretize) degrade to a
//! neutral value and never reach this type.

use thiserror::Error;

/// Errors raised by defectrank operations.
#[derive(Error, Debug)]
pub enum RankError {
    // Input referencing things outside the catalog
    #[error("defect '{id}' is not in the defect catalog")]
    UnknownDefect { id: String },

    #[error("defect '{id}' appears more than once in the defect catalog")]
    DuplicateDefect { id: String },

    // Malformed pairwise input
    #[error("submission '{submission}' has no present defects to rank")]
    NoDefects { submission: String },

    #[error("submission '{submission}' is missing a comparison between '{a}' and '{b}'")]
    MissingPair {
        submission: String,
        a: String,
        b: String,
    },

    #[error("submission '{submission}' compares '{a}' and '{b}' more than once")]
    DuplicatePair {
        submission: String,
        a: String,
        b: String,
    },

    #[error("submission '{submission}' compares defect '{id}' with itself")]
    SelfComparison { submission: String, id: String },

    #[error("comparison rows mix submissions '{expected}' and '{found}'")]
    MixedSubmissions { expected: String, found: String },

    #[error("comparison for submission '{submission}' references defect '{id}' which is not present")]
    UnexpectedDefect { submission: String, id: String },

    // Saved state that does not fit the caller
    #[error("saved model is a '{found}' model, expected '{expected}'")]
    ModelKindMismatch { expected: String, found: String },

    #[error("saved model columns do not match the defect catalog ({reason})")]
    CatalogMismatch { reason: String },

    #[error("unsupported model state version {found} (this build reads version {supported})")]
    UnsupportedStateVersion { found: u32, supported: u32 },

    #[error("unknown model kind '{0}'")]
    UnknownModelKind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RankError>;

//! Error types for genflow.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Every error belongs to one [`ErrorKind`]:
//! - **Configuration**: empty credential pool, bad config values or arguments
//! - **Upstream**: transport failures, rejected calls, missing identifiers or records
//! - **ContentFiltered**: the service refused the prompt or image on policy grounds
//! - **GenerationFailed**: any other terminal job failure
//! - **ResultMissing**: a video job succeeded but reported no URL
//! - **Cancelled**: the caller cancelled the orchestration
//! - **Internal**: I/O, serialization, unclassified
//!
//! Each error has a stable error code (e.g., `GENF-U001`) for programmatic handling.

use thiserror::Error;

// =============================================================================
// Error Kinds
// =============================================================================

/// High-level error kinds used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-side setup problems (empty pool, invalid config).
    Configuration,
    /// The remote service or the transport to it failed.
    Upstream,
    /// Vendor content-policy rejection.
    ContentFiltered,
    /// Terminal job failure other than a content-policy rejection.
    GenerationFailed,
    /// Video job reported success without a result URL.
    ResultMissing,
    /// The orchestration was cancelled by the caller.
    Cancelled,
    /// Unexpected local failure.
    Internal,
}

impl ErrorKind {
    /// Returns a human-readable description of the kind.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Upstream => "Upstream error",
            Self::ContentFiltered => "Content filtered",
            Self::GenerationFailed => "Generation failed",
            Self::ResultMissing => "Result missing",
            Self::Cancelled => "Cancelled",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this kind.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Upstream => "U",
            Self::ContentFiltered | Self::GenerationFailed | Self::ResultMissing => "G",
            Self::Cancelled => "K",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `genflow` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Upstream or unexpected failure
    GeneralError = 1,
    /// Invalid configuration or arguments
    ConfigError = 2,
    /// The service accepted the job but it did not produce a result
    GenerationRejected = 3,
    /// Interrupted by the user
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for genflow operations.
#[derive(Error, Debug)]
pub enum GenError {
    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// No credential was supplied for the call.
    #[error("credential pool is empty")]
    EmptyCredentialPool,

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error parsing the configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A caller-supplied argument was rejected before any remote call.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    // ==========================================================================
    // Upstream errors
    // ==========================================================================
    /// The transport failed before a response was received.
    #[error("{operation} failed: {message}")]
    Upstream { operation: String, message: String },

    /// The remote call timed out.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// The service answered with a non-success HTTP status.
    #[error("{operation} returned HTTP {status}")]
    HttpStatus { operation: String, status: u16 },

    /// The service answered with a non-zero envelope code.
    #[error("{operation} rejected by service (ret={code}): {message}")]
    ApiRejected {
        operation: String,
        code: String,
        message: String,
    },

    /// An expected field was absent from a response.
    #[error("{operation} response is missing '{field}'")]
    MissingField { operation: String, field: String },

    /// A status query returned no record for the polled job.
    #[error("no record returned for job {job_id}")]
    RecordMissing { job_id: String },

    // ==========================================================================
    // Generation outcomes
    // ==========================================================================
    /// The service rejected the job on content-policy grounds.
    #[error("content filtered by the service (fail code {fail_code})")]
    ContentFiltered { fail_code: String },

    /// The job reached a terminal failure state.
    #[error("{kind} generation failed{}", fail_code_suffix(.fail_code))]
    GenerationFailed {
        kind: String,
        fail_code: Option<String>,
    },

    /// The video job succeeded but no URL was reported.
    #[error("video job {job_id} finished without a result URL")]
    ResultMissing { job_id: String },

    /// The caller cancelled the orchestration.
    #[error("operation cancelled")]
    Cancelled,

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    /// Shorthand for an [`GenError::Upstream`] error.
    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`GenError::MissingField`] error.
    pub fn missing_field(operation: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            operation: operation.into(),
            field: field.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCredentialPool
            | Self::Config(_)
            | Self::ConfigParse { .. }
            | Self::InvalidArgument { .. } => ErrorKind::Configuration,

            Self::Upstream { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::ApiRejected { .. }
            | Self::MissingField { .. }
            | Self::RecordMissing { .. } => ErrorKind::Upstream,

            Self::ContentFiltered { .. } => ErrorKind::ContentFiltered,
            Self::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            Self::ResultMissing { .. } => ErrorKind::ResultMissing,
            Self::Cancelled => ErrorKind::Cancelled,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.kind() {
            ErrorKind::Configuration => ExitCode::ConfigError,
            ErrorKind::ContentFiltered
            | ErrorKind::GenerationFailed
            | ErrorKind::ResultMissing => ExitCode::GenerationRejected,
            ErrorKind::Cancelled => ExitCode::Cancelled,
            ErrorKind::Upstream | ErrorKind::Internal => ExitCode::GeneralError,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `GENF-{prefix}{number}`, see [`ErrorKind::code_prefix`].
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCredentialPool => "GENF-C001",
            Self::Config(_) => "GENF-C002",
            Self::ConfigParse { .. } => "GENF-C003",
            Self::InvalidArgument { .. } => "GENF-C004",

            Self::Upstream { .. } => "GENF-U001",
            Self::Timeout { .. } => "GENF-U002",
            Self::HttpStatus { .. } => "GENF-U003",
            Self::ApiRejected { .. } => "GENF-U004",
            Self::MissingField { .. } => "GENF-U010",
            Self::RecordMissing { .. } => "GENF-U011",

            Self::ContentFiltered { .. } => "GENF-G001",
            Self::GenerationFailed { .. } => "GENF-G002",
            Self::ResultMissing { .. } => "GENF-G003",

            Self::Cancelled => "GENF-K001",

            Self::Io(_) => "GENF-X001",
            Self::Json(_) => "GENF-X002",
            Self::Other(_) => "GENF-X099",
        }
    }
}

fn fail_code_suffix(fail_code: &Option<String>) -> String {
    fail_code
        .as_deref()
        .map(|code| format!(" (fail code {code})"))
        .unwrap_or_default()
}

/// Result type alias for genflow operations.
pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_descriptions() {
        assert_eq!(ErrorKind::Configuration.description(), "Configuration error");
        assert_eq!(ErrorKind::ContentFiltered.to_string(), "Content filtered");
        assert_eq!(ErrorKind::Upstream.code_prefix(), "U");
    }

    #[test]
    fn upstream_variants_share_a_kind() {
        let errors = [
            GenError::upstream("submit", "connection reset"),
            GenError::Timeout {
                operation: "poll".to_string(),
                seconds: 30,
            },
            GenError::HttpStatus {
                operation: "credit".to_string(),
                status: 502,
            },
            GenError::ApiRejected {
                operation: "submit".to_string(),
                code: "5000".to_string(),
                message: "insufficient credit".to_string(),
            },
            GenError::missing_field("submit", "aigc_data.task_id"),
            GenError::RecordMissing {
                job_id: "123".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Upstream, "{err}");
            assert_eq!(err.exit_code(), ExitCode::GeneralError);
            assert!(err.error_code().starts_with("GENF-U"));
        }
    }

    #[test]
    fn generation_outcomes_map_to_rejected_exit_code() {
        let filtered = GenError::ContentFiltered {
            fail_code: "2038".to_string(),
        };
        assert_eq!(filtered.kind(), ErrorKind::ContentFiltered);
        assert_eq!(filtered.exit_code(), ExitCode::GenerationRejected);

        let failed = GenError::GenerationFailed {
            kind: "image".to_string(),
            fail_code: Some("9999".to_string()),
        };
        assert_eq!(failed.kind(), ErrorKind::GenerationFailed);
        assert_eq!(failed.to_string(), "image generation failed (fail code 9999)");

        let failed = GenError::GenerationFailed {
            kind: "video".to_string(),
            fail_code: None,
        };
        assert_eq!(failed.to_string(), "video generation failed");

        let missing = GenError::ResultMissing {
            job_id: "t1".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::ResultMissing);
        assert_eq!(missing.exit_code(), ExitCode::GenerationRejected);
    }

    #[test]
    fn empty_pool_is_configuration_error() {
        let err = GenError::EmptyCredentialPool;
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
        assert_eq!(err.error_code(), "GENF-C001");
    }

    #[test]
    fn cancelled_exit_code() {
        assert_eq!(GenError::Cancelled.exit_code(), ExitCode::Cancelled);
        assert_eq!(i32::from(ExitCode::Cancelled), 130);
    }

    #[test]
    fn io_errors_are_internal() {
        let err: GenError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.error_code(), "GENF-X001");
    }
}

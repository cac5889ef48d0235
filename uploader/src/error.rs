//! Error types for the upload wizard.
//!
//! One enum per concern, mirroring the pipeline stages:
//!
//! - [`CsvError`] - file decoding and CSV parsing
//! - [`ApiError`] - transport and server failures from the backing service
//! - [`EmulationError`] - organization / admin resolution for super users
//! - [`SubmissionError`] - job submission refusals and failures
//! - [`WizardError`] - navigation refusals raised by the state machine
//! - [`ConfigError`] - environment configuration
//!
//! Conversions are provided via `From` so `?` works across boundaries.
//! Row-level validation problems are *not* errors: they are collected as
//! [`crate::models::ValidationError`] values inside a
//! [`crate::models::ValidationResult`].

use thiserror::Error;

use crate::wizard::Step;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading or parsing an uploaded CSV file.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes could not be decoded to text.
    #[error("Failed to decode file: {0}")]
    Encoding(String),

    /// File exceeds the accepted upload size.
    #[error("File is too large ({size} bytes, maximum is {max} bytes)")]
    TooLarge { size: usize, max: usize },

    /// The file contains no non-empty line at all.
    #[error("CSV file is empty")]
    EmptyFile,

    /// A header row exists but no data rows follow it.
    #[error("CSV file has a header row but no data rows")]
    NoDataRows,
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors talking to the backing record service.
///
/// Server-provided text is always kept verbatim so operators can see the
/// exact row or field the server complained about.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Request(String),

    /// Non-success HTTP status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered `success: false`.
    #[error("{0}")]
    Server(String),

    /// The response body did not match the expected shape.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

// =============================================================================
// Emulation Errors
// =============================================================================

/// Errors resolving an emulation context.
#[derive(Debug, Error)]
pub enum EmulationError {
    /// Only the super user role may act on behalf of another organization.
    #[error("Only super users can act on behalf of another organization")]
    NotPrivileged,

    /// The selected organization is not in the customer list.
    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    /// The organization has no administrator to own the uploaded records.
    #[error("No administrators found for '{org_name}'; cannot upload on its behalf")]
    NoAdmins { org_name: String },

    /// Customer or admin lookup failed.
    #[error("Organization lookup failed: {0}")]
    Lookup(#[from] ApiError),
}

// =============================================================================
// Submission Errors
// =============================================================================

/// Errors submitting validated rows to the background processor.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Submission attempted without a passing validation result.
    #[error("Upload has not passed validation")]
    NotValidated,

    /// Every row lacked its identifying fields.
    #[error("No rows to process: every row is missing its identifying fields")]
    NoRowsToProcess,

    /// Emulating without a resolvable admin target.
    #[error("Emulation context has no administrators; submission refused")]
    EmulationWithoutAdmins,

    /// The server refused the job.
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// Transport or server failure.
    #[error("Submission failed: {0}")]
    Api(#[from] ApiError),
}

// =============================================================================
// Wizard Errors
// =============================================================================

/// Navigation refusals from the wizard state machine.
#[derive(Debug, Error)]
pub enum WizardError {
    /// A validation or submission call is still in flight.
    #[error("An operation is already in progress")]
    Busy,

    /// The current step's forward predicate does not hold.
    #[error("Cannot leave '{}': {reason}", step.label())]
    StepIncomplete { step: Step, reason: &'static str },

    /// Validation ran and found problems.
    #[error("Validation failed with {errors} error(s)")]
    ValidationFailed { errors: usize },

    /// `prev` on the first step.
    #[error("Already at the first step")]
    AtFirstStep,

    /// `next` on the results step; only a new upload is possible.
    #[error("Upload finished; start a new upload to continue")]
    AtTerminalStep,

    /// Organization selection attempted by a non-privileged operator.
    #[error("Organization selection is only available to super users")]
    NotPrivileged,

    /// Emulation setup failed.
    #[error(transparent)]
    Emulation(#[from] EmulationError),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors loading [`crate::config::ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    /// An environment variable has an unusable value.
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for backing service calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for emulation resolution.
pub type EmulationResult<T> = Result<T, EmulationError>;

/// Result type for job submission.
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Result type for wizard navigation.
pub type WizardResult<T> = Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let api_err = ApiError::Server("customer suspended".into());
        let emu_err: EmulationError = api_err.into();
        assert!(emu_err.to_string().contains("customer suspended"));

        let wiz_err: WizardError = emu_err.into();
        assert!(wiz_err.to_string().contains("customer suspended"));
    }

    #[test]
    fn test_server_message_is_verbatim() {
        let err = SubmissionError::from(ApiError::Server("Row 4: UPN already exists".into()));
        assert_eq!(err.to_string(), "Submission failed: Row 4: UPN already exists");
    }

    #[test]
    fn test_step_incomplete_format() {
        let err = WizardError::StepIncomplete {
            step: Step::SelectFile,
            reason: "no file selected",
        };
        let msg = err.to_string();
        assert!(msg.contains("Select file"));
        assert!(msg.contains("no file selected"));
    }
}

//! # VESPA Upload - staff and student bulk upload pipeline
//!
//! Loads staff records, student records and per-student subject data into
//! the VESPA record service from a CSV file, through a step-by-step wizard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Validate   │────▶│   Process   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │(local+remote│     │ (job queue) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vespa_upload::{ClientConfig, HttpBackend, SelectedFile, UploadType, Wizard};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let wizard = Wizard::new(Arc::new(HttpBackend::new(config.clone())), config.operator);
//!
//!     wizard.select_upload_type(UploadType::Staff).await?;
//!     wizard.next().await?;
//!     wizard.select_file(SelectedFile::from_path("staff.csv")?).await?;
//!     wizard.next().await?; // -> Validate
//!     wizard.next().await?; // runs validation -> Process
//!     wizard.next().await?; // submits -> Results
//!     println!("{:?}", wizard.job().await);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per pipeline stage
//! - [`config`] - Limits and environment configuration
//! - [`models`] - Upload types, rows, findings, emulation context, jobs
//! - [`parser`] - CSV decoding and parsing
//! - [`validation`] - Per-type rule tables and the local validator
//! - [`remote`] - Server-side validation and subject checks
//! - [`emulation`] - Acting on behalf of another organization
//! - [`submission`] - Handing validated rows to the background processor
//! - [`wizard`] - The step-by-step state machine
//! - [`templates`] - CSV templates
//! - [`api`] - Backing service client
//! - [`logs`] - Progress log broadcasting

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod remote;
pub mod validation;

// Emulation and submission
pub mod emulation;
pub mod submission;

// Workflow
pub mod templates;
pub mod wizard;

// Backing service
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ApiError, ConfigError, CsvError, EmulationError, SubmissionError, WizardError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AdminContact, CsvRow, EmulatedOrg, EmulationContext, ErrorKind, JobStatus, LoggedInUser, Organization,
    Percentile, ProcessingJob, ProcessingOptions, Role, RowRef, UploadCategory, UploadType, ValidationError,
    ValidationResult, ValidationSource,
};

// =============================================================================
// Re-exports - Parsing & Validation
// =============================================================================

pub use parser::{parse_csv, parse_rows, to_csv, ParsedCsv, SelectedFile};
pub use validation::{validate, validate_file, validate_local};

// =============================================================================
// Re-exports - Workflow
// =============================================================================

pub use config::ClientConfig;
pub use emulation::{EmulationBanner, EmulationResolver};
pub use submission::{submit, submit_job, Submission};
pub use wizard::{Step, StepPlan, Wizard, WizardSession};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::{Backend, HttpBackend};

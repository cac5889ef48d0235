//! Backing record service access.
//!
//! [`Backend`] is the seam every network-facing component is generic over:
//! the validators, the emulation resolver, the job submitter and the wizard.
//! [`HttpBackend`] talks to the real service over HTTP.
//!
//! | Method | Path                                  | Used by                 |
//! |--------|---------------------------------------|-------------------------|
//! | GET    | `/templates/{type}`                   | template download       |
//! | POST   | `/{type}/validate`                    | remote validation       |
//! | POST   | `/validation/check-subjects`          | KS5 subject check       |
//! | POST   | `/{type}/process`                     | job submission          |
//! | GET    | `/vespa-customers`                    | organization picker     |
//! | GET    | `/customer-admin-details?customerId=` | emulation admin lookup  |

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::HttpBackend;
pub use types::*;

use crate::error::ApiResult;
use crate::models::{AdminContact, CsvRow, Organization, UploadType};

/// Operations the wizard needs from the backing service.
///
/// Failures are returned as [`crate::error::ApiError`]; `success: false`
/// bodies of the lookup endpoints are already turned into errors, while
/// validation and processing responses are returned as-is for the caller
/// to interpret.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// CSV template text for an upload type.
    async fn download_template(&self, upload_type: UploadType) -> ApiResult<String>;

    /// Server-side semantic validation of parsed rows.
    async fn validate_rows(&self, upload_type: UploadType, rows: &[CsvRow]) -> ApiResult<ValidateResponse>;

    /// Returns the subset of `names` the server does not recognise.
    async fn check_subjects(&self, names: &[String]) -> ApiResult<Vec<String>>;

    /// Hands a batch to the background processor.
    async fn process(&self, upload_type: UploadType, request: &ProcessRequest) -> ApiResult<ProcessResponse>;

    /// Organizations a super user may act for.
    async fn list_customers(&self) -> ApiResult<Vec<Organization>>;

    /// Administrators of one organization.
    async fn admin_details(&self, customer_id: &str) -> ApiResult<Vec<AdminContact>>;
}

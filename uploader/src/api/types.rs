//! Wire types for the backing record service.
//!
//! Field names are camelCase on the wire. Response fields default leniently
//! so an error body (`{"success": false, "message": "..."}`) still decodes
//! and its text can be shown verbatim.

use serde::{Deserialize, Serialize};

use crate::models::{
    AdminContact, CsvRow, EmulationContext, ErrorKind, LoggedInUser, Organization, Percentile,
    ProcessingOptions, RowRef, UploadType, ValidationError,
};

// =============================================================================
// Remote validation
// =============================================================================

/// Body of `POST /{type}/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub csv_data: Vec<CsvRow>,
}

/// Response of `POST /{type}/validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<RemoteFinding>,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn not_applicable() -> RowRef {
    RowRef::NotApplicable
}

/// A finding as reported by the server-side validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFinding {
    #[serde(default = "not_applicable")]
    pub row: RowRef,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl From<RemoteFinding> for ValidationError {
    fn from(finding: RemoteFinding) -> Self {
        ValidationError {
            row: finding.row,
            kind: finding
                .kind
                .as_deref()
                .map(ErrorKind::from_server)
                .unwrap_or(ErrorKind::InvalidValue),
            field: finding.field,
            message: finding.message,
        }
    }
}

/// Body of `POST /validation/check-subjects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSubjectsRequest {
    pub subject_names: Vec<String>,
}

/// Response of `POST /validation/check-subjects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSubjectsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub invalid_subject_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Processing
// =============================================================================

/// Body of `POST /{type}/process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub csv_data: Vec<CsvRow>,
    pub options: ProcessOptionsWire,
    pub context: ContextWire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptionsWire {
    pub send_notifications: bool,
    pub notification_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_calculators: Option<bool>,
    pub percentile: Percentile,
}

impl ProcessOptionsWire {
    /// Resolve defaults: notifications go to the operator unless another
    /// address was given; calculator flag only exists for subject uploads.
    pub fn from_options(
        options: &ProcessingOptions,
        upload_type: UploadType,
        operator: &LoggedInUser,
    ) -> Self {
        let notification_email = options
            .notification_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(operator.email.as_str())
            .to_string();

        Self {
            send_notifications: options.send_notifications,
            notification_email,
            run_calculators: upload_type
                .is_subject_upload()
                .then_some(options.run_calculators),
            percentile: options.percentile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWire {
    pub is_emulating: bool,
    pub logged_in_user: LoggedInUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulated_school: Option<EmulatedSchoolWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatedSchoolWire {
    pub id: String,
    pub name: String,
    pub admins: Vec<AdminContact>,
}

impl From<&EmulationContext> for ContextWire {
    fn from(ctx: &EmulationContext) -> Self {
        Self {
            is_emulating: ctx.is_emulating(),
            logged_in_user: ctx.logged_in_user().clone(),
            emulated_school: ctx.emulated_org().map(|org| EmulatedSchoolWire {
                id: org.org_id.clone(),
                name: org.org_name.clone(),
                admins: org.admins.clone(),
            }),
        }
    }
}

/// Response of `POST /{type}/process`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Organization lookups
// =============================================================================

/// Response of `GET /vespa-customers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomersResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub customers: Vec<Organization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of `GET /customer-admin-details?customerId=...`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDetailsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub admins: Vec<AdminContact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shape of an error body on a non-success status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn text(self) -> Option<String> {
        self.message.or(self.error)
    }
}

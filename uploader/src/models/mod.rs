//! Domain models for the upload wizard.
//!
//! - [`UploadType`] / [`UploadCategory`] - what is being uploaded
//! - [`CsvRow`] - one parsed data line, column name to trimmed cell
//! - [`ValidationError`] / [`ValidationResult`] - shared shape for local and remote findings
//! - [`EmulationContext`] - who the upload is performed as
//! - [`ProcessingOptions`] / [`ProcessingJob`] - submission inputs and outcome

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CsvError, EmulationError};

// =============================================================================
// Upload Type
// =============================================================================

/// Top-level choice on the first wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadCategory {
    Staff,
    Student,
}

impl UploadCategory {
    /// Student uploads need a subtype before the wizard can move on.
    pub fn requires_subtype(self) -> bool {
        matches!(self, Self::Student)
    }
}

/// Kind of upload. Drives the rule table, the template and the endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadType {
    Staff,
    StudentOnboard,
    #[serde(rename = "StudentKS4Subjects")]
    StudentKs4Subjects,
    #[serde(rename = "StudentKS5Subjects")]
    StudentKs5Subjects,
}

impl UploadType {
    pub const ALL: [UploadType; 4] = [
        Self::Staff,
        Self::StudentOnboard,
        Self::StudentKs4Subjects,
        Self::StudentKs5Subjects,
    ];

    pub fn category(self) -> UploadCategory {
        match self {
            Self::Staff => UploadCategory::Staff,
            _ => UploadCategory::Student,
        }
    }

    /// Identifier used in `GET /templates/{slug}`.
    pub fn as_slug(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::StudentOnboard => "student-onboard",
            Self::StudentKs4Subjects => "student-ks4-subjects",
            Self::StudentKs5Subjects => "student-ks5-subjects",
        }
    }

    /// Path prefix of the `/validate` and `/process` endpoints.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::StudentOnboard => "students/onboard",
            Self::StudentKs4Subjects => "students/ks4-subjects",
            Self::StudentKs5Subjects => "students/ks5-subjects",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Staff => "Staff",
            Self::StudentOnboard => "Student onboarding",
            Self::StudentKs4Subjects => "KS4 subjects",
            Self::StudentKs5Subjects => "KS5 subjects",
        }
    }

    /// Subject uploads feed the MEG calculators.
    pub fn is_subject_upload(self) -> bool {
        matches!(self, Self::StudentKs4Subjects | Self::StudentKs5Subjects)
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl FromStr for UploadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "student-onboard" | "onboard" | "students" => Ok(Self::StudentOnboard),
            "student-ks4-subjects" | "ks4-subjects" | "ks4" => Ok(Self::StudentKs4Subjects),
            "student-ks5-subjects" | "ks5-subjects" | "ks5" => Ok(Self::StudentKs5Subjects),
            other => Err(format!(
                "unknown upload type '{other}' (expected staff, onboard, ks4 or ks5)"
            )),
        }
    }
}

// =============================================================================
// CSV Row
// =============================================================================

/// One data line of the uploaded file.
///
/// Keeps the header order of the source file. Serialises as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Cell value for `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Cell value for `column`, treating absent and blank alike.
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for CsvRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for CsvRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = CsvRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<CsvRow, A::Error> {
                let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    fields.push((key, value));
                }
                Ok(CsvRow { fields })
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

// =============================================================================
// Validation Findings
// =============================================================================

/// Row reference of a finding: a 1-based data row, or `"N/A"` for file-level problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RowRefRepr", into = "RowRefRepr")]
pub enum RowRef {
    Data(usize),
    NotApplicable,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RowRefRepr {
    Number(usize),
    Text(String),
    Null,
}

impl From<RowRefRepr> for RowRef {
    fn from(repr: RowRefRepr) -> Self {
        match repr {
            RowRefRepr::Number(n) => RowRef::Data(n),
            RowRefRepr::Null => RowRef::NotApplicable,
            RowRefRepr::Text(s) => s
                .trim()
                .parse()
                .map(RowRef::Data)
                .unwrap_or(RowRef::NotApplicable),
        }
    }
}

impl From<RowRef> for RowRefRepr {
    fn from(row: RowRef) -> Self {
        match row {
            RowRef::Data(n) => RowRefRepr::Number(n),
            RowRef::NotApplicable => RowRefRepr::Text("N/A".to_string()),
        }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Data(n) => write!(f, "{n}"),
            RowRef::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingField,
    FormatError,
    InvalidValue,
    InvalidSubject,
    ApiError,
    CsvError,
}

impl ErrorKind {
    /// Map a server-reported kind onto the local taxonomy.
    pub fn from_server(kind: &str) -> Self {
        let normalized: String = kind
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "missingfield" | "missing" | "required" => Self::MissingField,
            "formaterror" | "format" => Self::FormatError,
            "invalidsubject" | "subject" => Self::InvalidSubject,
            "csverror" | "csv" => Self::CsvError,
            "apierror" | "api" => Self::ApiError,
            _ => Self::InvalidValue,
        }
    }
}

/// A single finding, rendered uniformly whichever validator produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub row: RowRef,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn missing_field(row: usize, field: &str) -> Self {
        Self {
            row: RowRef::Data(row),
            kind: ErrorKind::MissingField,
            field: Some(field.to_string()),
            message: format!("Missing required field '{field}'"),
        }
    }

    pub fn format(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row: RowRef::Data(row),
            kind: ErrorKind::FormatError,
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn invalid_value(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row: RowRef::Data(row),
            kind: ErrorKind::InvalidValue,
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn invalid_subject(row: usize, column: &str, subject: &str) -> Self {
        Self {
            row: RowRef::Data(row),
            kind: ErrorKind::InvalidSubject,
            field: Some(column.to_string()),
            message: format!(
                "Unrecognized subject '{subject}': check spelling or required prefix for non-standard qualification types"
            ),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self {
            row: RowRef::NotApplicable,
            kind: ErrorKind::ApiError,
            field: None,
            message: message.into(),
        }
    }

    pub fn csv(err: &CsvError) -> Self {
        Self {
            row: RowRef::NotApplicable,
            kind: ErrorKind::CsvError,
            field: None,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "Row {}, '{}': {}", self.row, field, self.message),
            None => write!(f, "Row {}: {}", self.row, self.message),
        }
    }
}

/// Which validator produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationSource {
    Local,
    Remote,
}

/// Outcome of one validation attempt. Replaces any earlier result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub rows: Vec<CsvRow>,
    pub source: ValidationSource,
}

impl ValidationResult {
    pub fn new(rows: Vec<CsvRow>, errors: Vec<ValidationError>, source: ValidationSource) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            rows,
            source,
        }
    }

    /// Fatal parse failure: no rows, one `CsvError` finding.
    pub fn csv_failure(err: &CsvError) -> Self {
        Self::new(Vec::new(), vec![ValidationError::csv(err)], ValidationSource::Local)
    }

    /// Unverifiable upload: the remote check could not be completed.
    pub fn api_failure(rows: Vec<CsvRow>, message: impl Into<String>, source: ValidationSource) -> Self {
        Self::new(rows, vec![ValidationError::api(message)], source)
    }
}

// =============================================================================
// Operator & Emulation
// =============================================================================

/// Operator role. Only [`Role::SuperUser`] may emulate another organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperUser,
    StaffAdmin,
    Other(String),
}

impl Role {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::SuperUser)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "superuser" => Role::SuperUser,
            "staffadmin" => Role::StaffAdmin,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SuperUser => f.write_str("Super User"),
            Role::StaffAdmin => f.write_str("Staff Admin"),
            Role::Other(s) => f.write_str(s),
        }
    }
}

/// The operator driving the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// Organization offered in the super user picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub school_id_text: Option<String>,
}

/// Administrative contact of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminContact {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Anything else the lookup returned, forwarded untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AdminContact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// The organization a super user is acting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmulatedOrg {
    pub org_id: String,
    pub org_name: String,
    pub admins: Vec<AdminContact>,
}

/// Identity under which an upload is performed.
///
/// When emulating, the target organization is always present and has at
/// least one admin; [`EmulationContext::emulating`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmulationContext {
    is_emulating: bool,
    logged_in_user: LoggedInUser,
    emulated_org: Option<EmulatedOrg>,
}

impl EmulationContext {
    /// Operator uploads for their own organization.
    pub fn direct(user: LoggedInUser) -> Self {
        Self {
            is_emulating: false,
            logged_in_user: user,
            emulated_org: None,
        }
    }

    /// Operator acts for `org`.
    pub fn emulating(user: LoggedInUser, org: EmulatedOrg) -> Result<Self, EmulationError> {
        if !user.role.is_privileged() {
            return Err(EmulationError::NotPrivileged);
        }
        if org.admins.is_empty() {
            return Err(EmulationError::NoAdmins { org_name: org.org_name });
        }
        Ok(Self {
            is_emulating: true,
            logged_in_user: user,
            emulated_org: Some(org),
        })
    }

    pub fn is_emulating(&self) -> bool {
        self.is_emulating
    }

    pub fn logged_in_user(&self) -> &LoggedInUser {
        &self.logged_in_user
    }

    pub fn emulated_org(&self) -> Option<&EmulatedOrg> {
        self.emulated_org.as_ref()
    }

    /// Holds for every context built through the constructors; checked again
    /// before submission since deserialised contexts bypass them.
    pub fn is_consistent(&self) -> bool {
        match (&self.is_emulating, &self.emulated_org) {
            (true, Some(org)) => !org.admins.is_empty(),
            (true, None) => false,
            (false, org) => org.is_none(),
        }
    }
}

// =============================================================================
// Processing
// =============================================================================

/// Percentile benchmark used by the MEG calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Percentile {
    P60,
    #[default]
    P75,
    P90,
    P100,
}

impl TryFrom<u8> for Percentile {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            60 => Ok(Self::P60),
            75 => Ok(Self::P75),
            90 => Ok(Self::P90),
            100 => Ok(Self::P100),
            other => Err(format!("unsupported percentile {other} (expected 60, 75, 90 or 100)")),
        }
    }
}

impl From<Percentile> for u8 {
    fn from(p: Percentile) -> Self {
        match p {
            Percentile::P60 => 60,
            Percentile::P75 => 75,
            Percentile::P90 => 90,
            Percentile::P100 => 100,
        }
    }
}

impl FromStr for Percentile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches("th");
        let value: u8 = digits
            .parse()
            .map_err(|_| format!("invalid percentile '{s}'"))?;
        Percentile::try_from(value)
    }
}

/// Options collected on the process step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub send_notifications: bool,
    /// Defaults to the operator's email when notifications are on.
    pub notification_email: Option<String>,
    /// Only sent for subject uploads.
    pub run_calculators: bool,
    pub percentile: Percentile,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            send_notifications: true,
            notification_email: None,
            run_calculators: true,
            percentile: Percentile::default(),
        }
    }
}

/// Acknowledgment state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    SubmissionFailed,
}

/// Terminal state of an upload session.
///
/// Completion is reported by email from the background processor; the
/// client never polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub total_rows: usize,
    pub submitted_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn queued(job_id: impl Into<String>, message: impl Into<String>, total_rows: usize) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            message: message.into(),
            total_rows,
            submitted_at: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>, total_rows: usize) -> Self {
        Self {
            job_id: String::new(),
            status: JobStatus::SubmissionFailed,
            message: message.into(),
            total_rows,
            submitted_at: Utc::now(),
        }
    }

    pub fn is_queued(&self) -> bool {
        self.status == JobStatus::Queued
    }
}

//! Per-upload-type rule tables.
//!
//! One [`UploadSchema`] per [`UploadType`] lists the columns, which are
//! required, how each cell is checked, how subject columns pair up, and
//! which fields identify a row for the background processor. The local
//! validator, the submission filter and template generation all read the
//! same table.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MAX_SUBJECT_PAIRS;
use crate::models::{CsvRow, UploadType};

/// Staff type codes accepted in the comma-separated `Staff Type` column.
pub const STAFF_TYPE_CODES: &[&str] = &["admin", "tut", "hoy", "sub", "gen"];

/// Accepted academic levels for onboarding.
pub const LEVELS: &[&str] = &["Level 2", "Level 3"];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// `local@domain.tld` shape check.
pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// How a non-empty cell is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// Any text.
    Text,
    Email,
    /// Comma-separated emails; blank entries are ignored.
    EmailList,
    Number,
    /// Exactly one of the listed values.
    OneOf(&'static [&'static str]),
    /// Comma-separated codes, each from the list (case-insensitive).
    CodeList(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub format: FieldFormat,
}

const fn required(name: &'static str, format: FieldFormat) -> FieldRule {
    FieldRule {
        name,
        required: true,
        format,
    }
}

const fn optional(name: &'static str, format: FieldFormat) -> FieldRule {
    FieldRule {
        name,
        required: false,
        format,
    }
}

/// Subject column layout of subject uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectColumns {
    None,
    /// `subN` with companion `exN`: both present or both absent.
    Paired {
        subject: &'static str,
        companion: &'static str,
    },
    /// `subN` alone; the qualification type travels as a name prefix.
    SubjectOnly { subject: &'static str },
}

/// Fields the background processor keys a row on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    AllOf(&'static [&'static str]),
    AnyOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSchema {
    pub upload_type: UploadType,
    pub fields: &'static [FieldRule],
    pub subjects: SubjectColumns,
    pub identity: Identity,
}

const STAFF_FIELDS: &[FieldRule] = &[
    required("Title", FieldFormat::Text),
    required("First Name", FieldFormat::Text),
    required("Last Name", FieldFormat::Text),
    required("Email Address", FieldFormat::Email),
    required("Staff Type", FieldFormat::CodeList(STAFF_TYPE_CODES)),
    optional("Year Group", FieldFormat::Text),
    optional("Group", FieldFormat::Text),
    optional("Faculty", FieldFormat::Text),
];

const ONBOARD_FIELDS: &[FieldRule] = &[
    required("UPN", FieldFormat::Text),
    required("Firstname", FieldFormat::Text),
    required("Lastname", FieldFormat::Text),
    required("Student Email", FieldFormat::Email),
    required("Group", FieldFormat::Text),
    required("Year Gp", FieldFormat::Number),
    required("Level", FieldFormat::OneOf(LEVELS)),
    optional("Gender", FieldFormat::Text),
    optional("DOB", FieldFormat::Text),
    optional("ULN", FieldFormat::Text),
    optional("Tutors", FieldFormat::EmailList),
    optional("Head of Year", FieldFormat::EmailList),
    optional("Subject Teachers", FieldFormat::EmailList),
];

const KS4_FIELDS: &[FieldRule] = &[
    required("UPN", FieldFormat::Text),
    required("Student Email", FieldFormat::Email),
    optional("KS2 Score", FieldFormat::Number),
];

const KS5_FIELDS: &[FieldRule] = &[
    required("UPN", FieldFormat::Text),
    required("Student Email", FieldFormat::Email),
    optional("GCSE Prior Attainment", FieldFormat::Number),
];

static STAFF: UploadSchema = UploadSchema {
    upload_type: UploadType::Staff,
    fields: STAFF_FIELDS,
    subjects: SubjectColumns::None,
    identity: Identity::AllOf(&["Email Address"]),
};

static ONBOARD: UploadSchema = UploadSchema {
    upload_type: UploadType::StudentOnboard,
    fields: ONBOARD_FIELDS,
    subjects: SubjectColumns::None,
    identity: Identity::AllOf(&["Student Email"]),
};

static KS4: UploadSchema = UploadSchema {
    upload_type: UploadType::StudentKs4Subjects,
    fields: KS4_FIELDS,
    subjects: SubjectColumns::Paired {
        subject: "sub",
        companion: "ex",
    },
    identity: Identity::AnyOf(&["UPN", "Student Email"]),
};

static KS5: UploadSchema = UploadSchema {
    upload_type: UploadType::StudentKs5Subjects,
    fields: KS5_FIELDS,
    subjects: SubjectColumns::SubjectOnly { subject: "sub" },
    identity: Identity::AnyOf(&["UPN", "Student Email"]),
};

/// Rule table for an upload type.
pub fn schema(upload_type: UploadType) -> &'static UploadSchema {
    match upload_type {
        UploadType::Staff => &STAFF,
        UploadType::StudentOnboard => &ONBOARD,
        UploadType::StudentKs4Subjects => &KS4,
        UploadType::StudentKs5Subjects => &KS5,
    }
}

impl UploadSchema {
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }

    /// Subject column names `sub1` ..= `sub10`, empty for non-subject uploads.
    pub fn subject_columns(&self) -> Vec<String> {
        match self.subjects {
            SubjectColumns::None => Vec::new(),
            SubjectColumns::Paired { subject, .. } | SubjectColumns::SubjectOnly { subject } => {
                (1..=MAX_SUBJECT_PAIRS).map(|n| format!("{subject}{n}")).collect()
            }
        }
    }

    /// Template column order: declared fields, then subject columns.
    pub fn template_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self.fields.iter().map(|f| f.name.to_string()).collect();
        match self.subjects {
            SubjectColumns::None => {}
            SubjectColumns::Paired { subject, companion } => {
                for n in 1..=MAX_SUBJECT_PAIRS {
                    headers.push(format!("{subject}{n}"));
                    headers.push(format!("{companion}{n}"));
                }
            }
            SubjectColumns::SubjectOnly { subject } => {
                headers.extend((1..=MAX_SUBJECT_PAIRS).map(|n| format!("{subject}{n}")));
            }
        }
        headers
    }

    /// Whether a row carries the fields the processor keys on.
    pub fn identifies(&self, row: &CsvRow) -> bool {
        match self.identity {
            Identity::AllOf(fields) => fields.iter().all(|f| row.non_empty(f).is_some()),
            Identity::AnyOf(fields) => fields.iter().any(|f| row.non_empty(f).is_some()),
        }
    }
}

/// Check one non-empty cell. Returns the offending message, if any.
pub fn check_format(format: FieldFormat, value: &str) -> Option<String> {
    match format {
        FieldFormat::Text => None,
        FieldFormat::Email => (!is_email(value)).then(|| format!("'{value}' is not a valid email address")),
        FieldFormat::EmailList => {
            let bad: Vec<&str> = split_list(value).filter(|e| !is_email(e)).collect();
            (!bad.is_empty()).then(|| format!("Invalid email address(es): {}", bad.join(", ")))
        }
        FieldFormat::Number => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => None,
            _ => Some(format!("'{value}' is not a number")),
        },
        FieldFormat::OneOf(allowed) => (!allowed.contains(&value))
            .then(|| format!("'{value}' must be one of: {}", allowed.join(", "))),
        FieldFormat::CodeList(codes) => {
            let bad: Vec<&str> = split_list(value)
                .filter(|token| !codes.iter().any(|c| c.eq_ignore_ascii_case(token)))
                .collect();
            (!bad.is_empty()).then(|| {
                format!(
                    "Unknown code(s) {}; allowed: {}",
                    bad.join(", "),
                    codes.join(", ")
                )
            })
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_email("jsmith@x.com"));
        assert!(is_email("a.b+c@school.org.uk"));
        assert!(!is_email("jsmith@x"));
        assert!(!is_email("j smith@x.com"));
        assert!(!is_email("@x.com"));
    }

    #[test]
    fn test_code_list() {
        let codes = FieldFormat::CodeList(STAFF_TYPE_CODES);
        assert_eq!(check_format(codes, "tut,sub"), None);
        assert_eq!(check_format(codes, "TUT, hoy,"), None);
        let msg = check_format(codes, "tutx").unwrap();
        assert!(msg.contains("tutx"));
    }

    #[test]
    fn test_one_of_is_exact() {
        let level = FieldFormat::OneOf(LEVELS);
        assert_eq!(check_format(level, "Level 3"), None);
        assert!(check_format(level, "level 3").is_some());
        assert!(check_format(level, "Level 4").is_some());
    }

    #[test]
    fn test_number() {
        assert_eq!(check_format(FieldFormat::Number, "5.62"), None);
        assert_eq!(check_format(FieldFormat::Number, "13"), None);
        assert!(check_format(FieldFormat::Number, "five").is_some());
        assert!(check_format(FieldFormat::Number, "NaN").is_some());
    }

    #[test]
    fn test_email_list_reports_each_bad_entry() {
        let msg = check_format(FieldFormat::EmailList, "a@s.org, bad, c@s.org, worse").unwrap();
        assert!(msg.contains("bad, worse"));
    }

    #[test]
    fn test_template_headers() {
        let ks4 = schema(UploadType::StudentKs4Subjects).template_headers();
        assert_eq!(&ks4[..3], &["UPN", "Student Email", "KS2 Score"]);
        assert_eq!(ks4[3], "sub1");
        assert_eq!(ks4[4], "ex1");
        assert_eq!(ks4.last().map(String::as_str), Some("ex10"));

        let ks5 = schema(UploadType::StudentKs5Subjects).template_headers();
        assert_eq!(ks5.last().map(String::as_str), Some("sub10"));
        assert!(!ks5.iter().any(|h| h.starts_with("ex")));
    }

    #[test]
    fn test_identity_rules() {
        let row = CsvRow::new(vec![
            ("UPN".into(), "".into()),
            ("Student Email".into(), "s@school.org".into()),
        ]);
        assert!(schema(UploadType::StudentKs4Subjects).identifies(&row));
        assert!(schema(UploadType::StudentOnboard).identifies(&row));
        assert!(!schema(UploadType::Staff).identifies(&row));
    }
}

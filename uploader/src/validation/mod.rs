//! Local validation of parsed rows.
//!
//! Checks run per [`UploadType`] from the rule table in [`rules`]:
//!
//! - required columns present in the file, required cells non-empty
//! - formats: emails, numbers, enumerated values, code lists
//! - subject columns: `subN`/`exN` pairing for N = 1..10, at least one subject
//!
//! Every violation is collected; nothing short-circuits. Only when the local
//! pass is clean and the upload is a KS5 subject upload are subject names
//! reconciled against the server, in a single batched call.
//!
//! [`validate_file`] runs the whole validation step: parse, local rules,
//! then optionally the server-side check in [`crate::remote`].

pub mod rules;

use std::collections::HashSet;

use crate::api::Backend;
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{
    CsvRow, ErrorKind, RowRef, UploadType, ValidationError, ValidationResult, ValidationSource,
};
use crate::parser::parse_rows;
use crate::remote;

pub use rules::{schema, FieldFormat, FieldRule, Identity, SubjectColumns, UploadSchema};

/// Apply the local rule table. Pure and deterministic: the same rows always
/// give the same errors in the same order.
pub fn validate_local(upload_type: UploadType, rows: &[CsvRow]) -> Vec<ValidationError> {
    let schema = schema(upload_type);
    let mut errors = Vec::new();

    let Some(first) = rows.first() else {
        return errors;
    };

    let present: HashSet<&str> = first.columns().collect();
    let absent_columns: HashSet<&str> = schema
        .required_fields()
        .filter(|name| !present.contains(name))
        .collect();

    for name in schema.required_fields().filter(|n| absent_columns.contains(n)) {
        errors.push(ValidationError {
            row: RowRef::NotApplicable,
            kind: ErrorKind::MissingField,
            field: Some(name.to_string()),
            message: format!("Column '{name}' is missing from the file"),
        });
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;

        for rule in schema.fields {
            match row.non_empty(rule.name) {
                None if rule.required && !absent_columns.contains(rule.name) => {
                    errors.push(ValidationError::missing_field(row_number, rule.name));
                }
                None => {}
                Some(value) => {
                    if let Some(message) = rules::check_format(rule.format, value) {
                        errors.push(format_error(rule.format, row_number, rule.name, message));
                    }
                }
            }
        }

        check_subjects(schema, row_number, row, &mut errors);
    }

    errors
}

/// Enumerated and code-list violations are invalid values; the rest are formats.
fn format_error(format: FieldFormat, row: usize, field: &str, message: String) -> ValidationError {
    match format {
        FieldFormat::OneOf(_) | FieldFormat::CodeList(_) => ValidationError::invalid_value(row, field, message),
        _ => ValidationError::format(row, field, message),
    }
}

fn check_subjects(schema: &UploadSchema, row_number: usize, row: &CsvRow, errors: &mut Vec<ValidationError>) {
    match schema.subjects {
        SubjectColumns::None => {}
        SubjectColumns::Paired { subject, companion } => {
            let mut complete = 0;
            let mut half_pairs = false;
            for n in 1..=crate::config::MAX_SUBJECT_PAIRS {
                let sub_col = format!("{subject}{n}");
                let comp_col = format!("{companion}{n}");
                match (row.non_empty(&sub_col), row.non_empty(&comp_col)) {
                    (Some(_), Some(_)) => complete += 1,
                    (Some(_), None) => {
                        half_pairs = true;
                        errors.push(ValidationError {
                            message: format!("'{sub_col}' has a subject but '{comp_col}' is empty"),
                            ..ValidationError::missing_field(row_number, &comp_col)
                        });
                    }
                    (None, Some(_)) => {
                        half_pairs = true;
                        errors.push(ValidationError {
                            message: format!("'{comp_col}' has a grade but '{sub_col}' is empty"),
                            ..ValidationError::missing_field(row_number, &sub_col)
                        });
                    }
                    (None, None) => {}
                }
            }
            if complete == 0 && !half_pairs {
                errors.push(ValidationError {
                    message: format!("At least one subject/grade pair ({subject}1/{companion}1) is required"),
                    ..ValidationError::missing_field(row_number, &format!("{subject}1"))
                });
            }
        }
        SubjectColumns::SubjectOnly { subject } => {
            let any = schema.subject_columns().iter().any(|col| row.non_empty(col).is_some());
            if !any {
                errors.push(ValidationError {
                    message: format!("At least one subject ({subject}1) is required"),
                    ..ValidationError::missing_field(row_number, &format!("{subject}1"))
                });
            }
        }
    }
}

/// Every non-empty subject name across all rows, first-seen order, no duplicates.
pub fn collect_subject_names(upload_type: UploadType, rows: &[CsvRow]) -> Vec<String> {
    let columns = schema(upload_type).subject_columns();
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for row in rows {
        for col in &columns {
            if let Some(name) = row.non_empty(col) {
                if seen.insert(name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

/// One `InvalidSubject` error per (row, column) holding an unrecognised name.
pub fn map_invalid_subjects(upload_type: UploadType, rows: &[CsvRow], invalid: &[String]) -> Vec<ValidationError> {
    let invalid: HashSet<&str> = invalid.iter().map(String::as_str).collect();
    let columns = schema(upload_type).subject_columns();
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        for col in &columns {
            if let Some(name) = row.non_empty(col) {
                if invalid.contains(name) {
                    errors.push(ValidationError::invalid_subject(idx + 1, col, name));
                }
            }
        }
    }
    errors
}

/// Local validation of parsed rows, plus the KS5 subject check when the
/// local rules pass.
pub async fn validate<B: Backend>(backend: &B, upload_type: UploadType, rows: Vec<CsvRow>) -> ValidationResult {
    let errors = validate_local(upload_type, &rows);
    if !errors.is_empty() {
        log_warning(format!("{} local validation error(s)", errors.len()));
        return ValidationResult::new(rows, errors, ValidationSource::Local);
    }

    if upload_type != UploadType::StudentKs5Subjects {
        return ValidationResult::new(rows, errors, ValidationSource::Local);
    }

    let names = collect_subject_names(upload_type, &rows);
    log_info(format!("Checking {} distinct subject name(s)...", names.len()));
    match remote::check_subject_names(backend, &names).await {
        Ok(invalid) => {
            let errors = map_invalid_subjects(upload_type, &rows, &invalid);
            if errors.is_empty() {
                log_success("All subject names recognised");
            }
            ValidationResult::new(rows, errors, ValidationSource::Local)
        }
        Err(e) => ValidationResult::api_failure(
            rows,
            format!("Could not verify subject names: {e}"),
            ValidationSource::Local,
        ),
    }
}

/// The whole validation step for a selected file.
///
/// Parse failures become a single `CsvError` finding with no rows. Remote
/// validation runs only when `remote_check` is set and the local pass is clean.
pub async fn validate_file<B: Backend>(
    backend: &B,
    upload_type: UploadType,
    contents: &str,
    remote_check: bool,
) -> ValidationResult {
    let rows = match parse_rows(contents) {
        Ok(rows) => rows,
        Err(e) => {
            log_warning(format!("CSV error: {e}"));
            return ValidationResult::csv_failure(&e);
        }
    };
    log_success(format!("Parsed {} row(s)", rows.len()));

    let local = validate(backend, upload_type, rows).await;
    if !local.is_valid || !remote_check {
        return local;
    }

    remote::validate_remote(backend, upload_type, local.rows).await
}

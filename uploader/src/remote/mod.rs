//! Server-side validation and subject-name checks.
//!
//! The server knows things the rule table cannot: existing accounts,
//! duplicate records, the recognised subject catalogue. Its findings come
//! back in the same [`ValidationError`] shape as local ones.
//!
//! A transport failure never counts as "valid": it becomes a single
//! `ApiError` finding and the upload stays blocked.

use crate::api::{Backend, ValidateResponse};
use crate::error::ApiResult;
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{CsvRow, UploadType, ValidationError, ValidationResult, ValidationSource};

/// Send every distinct subject name in one request; returns the unrecognised ones.
///
/// An empty list is not sent.
pub async fn check_subject_names<B: Backend>(backend: &B, names: &[String]) -> ApiResult<Vec<String>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let invalid = backend.check_subjects(names).await?;
    if !invalid.is_empty() {
        log_warning(format!("{} unrecognised subject name(s)", invalid.len()));
    }
    Ok(invalid)
}

/// Ask the server to validate parsed rows.
pub async fn validate_remote<B: Backend>(backend: &B, upload_type: UploadType, rows: Vec<CsvRow>) -> ValidationResult {
    log_info(format!("Validating {} row(s) on the server...", rows.len()));

    match backend.validate_rows(upload_type, &rows).await {
        Ok(response) => interpret(rows, response),
        Err(e) => {
            log_error(format!("Server validation unavailable: {e}"));
            ValidationResult::api_failure(rows, format!("Server validation failed: {e}"), ValidationSource::Remote)
        }
    }
}

fn interpret(rows: Vec<CsvRow>, response: ValidateResponse) -> ValidationResult {
    if response.row_count != 0 && response.row_count != rows.len() {
        log_warning(format!(
            "Server counted {} row(s), file has {}",
            response.row_count,
            rows.len()
        ));
    }

    let errors: Vec<ValidationError> = response.errors.into_iter().map(ValidationError::from).collect();

    if !response.success && errors.is_empty() {
        let message = response
            .message
            .unwrap_or_else(|| "Server rejected the file without details".to_string());
        log_error(&message);
        return ValidationResult::api_failure(rows, message, ValidationSource::Remote);
    }

    if errors.is_empty() {
        log_success("Server validation passed");
    } else {
        log_warning(format!("{} server validation error(s)", errors.len()));
    }
    ValidationResult::new(rows, errors, ValidationSource::Remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::api::RemoteFinding;
    use crate::models::{ErrorKind, RowRef};

    fn rows(n: usize) -> Vec<CsvRow> {
        (0..n)
            .map(|i| CsvRow::new(vec![("Email Address".into(), format!("s{i}@x.com"))]))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_subject_list_skips_request() {
        let backend = FakeBackend::default();
        assert!(check_subject_names(&backend, &[]).await.unwrap().is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_subject_check_failure_is_error() {
        let backend = FakeBackend::default().failing_subject_check();
        let err = check_subject_names(&backend, &["A - Maths".to_string()]).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_remote_findings_are_kept() {
        let backend = FakeBackend::default().with_validate_response(ValidateResponse {
            success: false,
            errors: vec![RemoteFinding {
                row: RowRef::Data(2),
                kind: Some("duplicate".into()),
                field: Some("Email Address".into()),
                message: "Email already registered".into(),
            }],
            row_count: 2,
            message: None,
        });

        let result = validate_remote(&backend, UploadType::Staff, rows(2)).await;
        assert!(!result.is_valid);
        assert_eq!(result.source, ValidationSource::Remote);
        assert_eq!(result.errors[0].row, RowRef::Data(2));
        assert_eq!(result.errors[0].kind, ErrorKind::InvalidValue);
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_without_findings_blocks() {
        let backend = FakeBackend::default().with_validate_response(ValidateResponse {
            success: false,
            message: Some("Customer archived".into()),
            ..ValidateResponse::default()
        });

        let result = validate_remote(&backend, UploadType::Staff, rows(1)).await;
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::ApiError);
        assert_eq!(result.errors[0].message, "Customer archived");
    }

    #[tokio::test]
    async fn test_transport_failure_blocks() {
        let backend = FakeBackend::default().failing_validation();
        let result = validate_remote(&backend, UploadType::StudentOnboard, rows(3)).await;
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::ApiError);
        assert_eq!(result.errors[0].row, RowRef::NotApplicable);
    }
}

//! Hand a validated upload to the background processor.
//!
//! One request per upload, no polling: the processor emails the operator
//! (or the notification address) with per-row outcomes once it is done.
//! The synchronous acknowledgment only tells us whether the job was queued.

use crate::api::{Backend, ContextWire, ProcessOptionsWire, ProcessRequest};
use crate::error::{SubmissionError, SubmissionResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{CsvRow, EmulationContext, ProcessingJob, ProcessingOptions, UploadType, ValidationResult};
use crate::validation::schema;

/// Drop rows missing the fields the processor keys on.
pub fn filter_rows(upload_type: UploadType, rows: &[CsvRow]) -> Vec<CsvRow> {
    let schema = schema(upload_type);
    rows.iter().filter(|row| schema.identifies(row)).cloned().collect()
}

/// Everything a submission needs.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub upload_type: UploadType,
    pub validation: &'a ValidationResult,
    pub options: &'a ProcessingOptions,
    pub context: &'a EmulationContext,
}

/// Build the request body, refusing anything that must not be sent.
pub fn build_request(submission: &Submission<'_>) -> SubmissionResult<ProcessRequest> {
    if !submission.validation.is_valid {
        return Err(SubmissionError::NotValidated);
    }
    if !submission.context.is_consistent() {
        return Err(SubmissionError::EmulationWithoutAdmins);
    }

    let rows = filter_rows(submission.upload_type, &submission.validation.rows);
    let dropped = submission.validation.rows.len() - rows.len();
    if rows.is_empty() {
        return Err(SubmissionError::NoRowsToProcess);
    }
    if dropped > 0 {
        log_warning(format!("{dropped} row(s) without identifying fields skipped"));
    }

    Ok(ProcessRequest {
        csv_data: rows,
        options: ProcessOptionsWire::from_options(
            submission.options,
            submission.upload_type,
            submission.context.logged_in_user(),
        ),
        context: ContextWire::from(submission.context),
    })
}

/// Synchronous acknowledgment of a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub job_id: String,
    pub message: String,
    pub total_rows: usize,
}

/// Submit once and interpret the acknowledgment.
pub async fn submit<B: Backend>(backend: &B, submission: &Submission<'_>) -> SubmissionResult<Acknowledgment> {
    let request = build_request(submission)?;
    let total = request.csv_data.len();
    log_info(format!(
        "Submitting {total} row(s) to /{}/process...",
        submission.upload_type.endpoint()
    ));

    let response = backend.process(submission.upload_type, &request).await?;
    if !response.success {
        return Err(SubmissionError::Rejected(
            response
                .message
                .unwrap_or_else(|| "The server did not accept the job".to_string()),
        ));
    }

    Ok(Acknowledgment {
        job_id: response.job_id.unwrap_or_default(),
        message: response.message.unwrap_or_else(|| {
            "Upload queued. You will receive an email when processing completes.".to_string()
        }),
        total_rows: total,
    })
}

/// Submit and fold every outcome into a [`ProcessingJob`].
pub async fn submit_job<B: Backend>(backend: &B, submission: &Submission<'_>) -> ProcessingJob {
    match submit(backend, submission).await {
        Ok(ack) => {
            log_success(format!("Job {} queued ({} row(s))", ack.job_id, ack.total_rows));
            ProcessingJob::queued(ack.job_id, ack.message, ack.total_rows)
        }
        Err(e) => {
            log_error(e.to_string());
            ProcessingJob::failed(e.to_string(), submission.validation.rows.len())
        }
    }
}

//! In-memory [`Backend`] for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::{Backend, ProcessRequest, ProcessResponse, ValidateResponse};
use crate::error::{ApiError, ApiResult};
use crate::models::{AdminContact, CsvRow, Organization, UploadType};

#[derive(Default)]
pub(crate) struct FakeBackend {
    invalid_subjects: Vec<String>,
    fail_subject_check: bool,
    validate_response: Option<ValidateResponse>,
    fail_validation: bool,
    customers: Vec<Organization>,
    admins: HashMap<String, Vec<AdminContact>>,
    process_response: Option<ProcessResponse>,
    fail_process: bool,
    /// When set, `validate_rows` and `process` wait for a notification.
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<&'static str>>,
    last_process: Mutex<Option<(UploadType, ProcessRequest)>>,
}

impl FakeBackend {
    pub fn with_invalid_subjects(mut self, names: &[&str]) -> Self {
        self.invalid_subjects = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_subject_check(mut self) -> Self {
        self.fail_subject_check = true;
        self
    }

    pub fn with_validate_response(mut self, response: ValidateResponse) -> Self {
        self.validate_response = Some(response);
        self
    }

    pub fn failing_validation(mut self) -> Self {
        self.fail_validation = true;
        self
    }

    pub fn with_customer(mut self, id: &str, name: &str, admins: &[&str]) -> Self {
        self.customers.push(Organization {
            id: id.to_string(),
            name: name.to_string(),
            school_id_text: Some(format!("SCH-{id}")),
        });
        self.admins
            .insert(id.to_string(), admins.iter().map(|e| AdminContact::new(*e)).collect());
        self
    }

    pub fn with_process_response(mut self, response: ProcessResponse) -> Self {
        self.process_response = Some(response);
        self
    }

    pub fn failing_process(mut self) -> Self {
        self.fail_process = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_process(&self) -> Option<(UploadType, ProcessRequest)> {
        self.last_process.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

impl Backend for FakeBackend {
    async fn download_template(&self, upload_type: UploadType) -> ApiResult<String> {
        self.record("download_template");
        Ok(format!("# template for {upload_type}\n"))
    }

    async fn validate_rows(&self, _upload_type: UploadType, rows: &[CsvRow]) -> ApiResult<ValidateResponse> {
        self.record("validate_rows");
        self.wait_gate().await;
        if self.fail_validation {
            return Err(ApiError::Request("connection refused".into()));
        }
        Ok(self.validate_response.clone().unwrap_or(ValidateResponse {
            success: true,
            errors: Vec::new(),
            row_count: rows.len(),
            message: None,
        }))
    }

    async fn check_subjects(&self, names: &[String]) -> ApiResult<Vec<String>> {
        self.record("check_subjects");
        if self.fail_subject_check {
            return Err(ApiError::Status {
                status: 503,
                message: "Service unavailable".into(),
            });
        }
        Ok(names
            .iter()
            .filter(|n| self.invalid_subjects.contains(n))
            .cloned()
            .collect())
    }

    async fn process(&self, upload_type: UploadType, request: &ProcessRequest) -> ApiResult<ProcessResponse> {
        self.record("process");
        *self.last_process.lock().unwrap() = Some((upload_type, request.clone()));
        self.wait_gate().await;
        if self.fail_process {
            return Err(ApiError::Request("connection reset".into()));
        }
        Ok(self.process_response.clone().unwrap_or(ProcessResponse {
            success: true,
            job_id: Some("job-1".into()),
            message: Some("Upload queued".into()),
        }))
    }

    async fn list_customers(&self) -> ApiResult<Vec<Organization>> {
        self.record("list_customers");
        Ok(self.customers.clone())
    }

    async fn admin_details(&self, customer_id: &str) -> ApiResult<Vec<AdminContact>> {
        self.record("admin_details");
        self.admins
            .get(customer_id)
            .cloned()
            .ok_or_else(|| ApiError::Server(format!("Unknown customer {customer_id}")))
    }
}

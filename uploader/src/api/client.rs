//! HTTP implementation of [`Backend`] using `reqwest`.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::types::{
    AdminDetailsResponse, CheckSubjectsRequest, CheckSubjectsResponse, CustomersResponse, ErrorBody,
    ProcessRequest, ProcessResponse, ValidateRequest, ValidateResponse,
};
use super::Backend;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::logs::log_info_indent;
use crate::models::{AdminContact, CsvRow, Organization, UploadType};

/// Longest slice of a non-JSON error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Backing service client.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lookup or validation request, with the configured timeout.
    fn lookup(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.lookup_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        log_info_indent(format!("GET {url}"), 1);
        self.lookup(self.client.get(url))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        log_info_indent(format!("POST {url}"), 1);
        self.client.post(url)
    }
}

/// Decode a JSON body; any non-success status is an error carrying the
/// server's `message`/`error` text, or the raw body when there is none.
async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()));
    }

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::text)
        .unwrap_or_else(|| truncate(&body));
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Decode a JSON body even on a non-success status, so validation findings
/// and `{"success": false, "message": ...}` refusals reach the caller intact.
async fn read_json_lenient<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<T>(&body) {
        Ok(parsed) => Ok(parsed),
        Err(e) if status.is_success() => Err(ApiError::InvalidResponse(e.to_string())),
        Err(_) => Err(ApiError::Status {
            status: status.as_u16(),
            message: truncate(&body),
        }),
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "(empty response)".to_string();
    }
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn server_failure(message: Option<String>, what: &str) -> ApiError {
    ApiError::Server(message.unwrap_or_else(|| format!("{what} failed")))
}

impl Backend for HttpBackend {
    async fn download_template(&self, upload_type: UploadType) -> ApiResult<String> {
        let response = self
            .get(&format!("templates/{}", upload_type.as_slug()))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::text)
                .unwrap_or_else(|| truncate(&body));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn validate_rows(&self, upload_type: UploadType, rows: &[CsvRow]) -> ApiResult<ValidateResponse> {
        let request = ValidateRequest {
            csv_data: rows.to_vec(),
        };
        let builder = self.post(&format!("{}/validate", upload_type.endpoint()));
        let response = self.lookup(builder).json(&request).send().await?;
        read_json_lenient(response).await
    }

    async fn check_subjects(&self, names: &[String]) -> ApiResult<Vec<String>> {
        let request = CheckSubjectsRequest {
            subject_names: names.to_vec(),
        };
        let builder = self.post("validation/check-subjects");
        let response = self.lookup(builder).json(&request).send().await?;
        let body: CheckSubjectsResponse = read_json(response).await?;
        if !body.success {
            return Err(server_failure(body.message, "Subject check"));
        }
        Ok(body.invalid_subject_names)
    }

    async fn process(&self, upload_type: UploadType, request: &ProcessRequest) -> ApiResult<ProcessResponse> {
        let response = self
            .post(&format!("{}/process", upload_type.endpoint()))
            .json(request)
            .send()
            .await?;
        read_json_lenient(response).await
    }

    async fn list_customers(&self) -> ApiResult<Vec<Organization>> {
        let response = self.get("vespa-customers").send().await?;
        let body: CustomersResponse = read_json(response).await?;
        if !body.success {
            return Err(server_failure(body.message, "Customer lookup"));
        }
        Ok(body.customers)
    }

    async fn admin_details(&self, customer_id: &str) -> ApiResult<Vec<AdminContact>> {
        let response = self
            .get("customer-admin-details")
            .query(&[("customerId", customer_id)])
            .send()
            .await?;
        let body: AdminDetailsResponse = read_json(response).await?;
        if !body.success {
            return Err(server_failure(body.message, "Admin lookup"));
        }
        Ok(body.admins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY + 20);
        let short = truncate(&body);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), MAX_ERROR_BODY + 3);
    }

    #[test]
    fn test_truncate_empty_body() {
        assert_eq!(truncate("  \n"), "(empty response)");
    }

    #[test]
    fn test_server_failure_keeps_message() {
        let err = server_failure(Some("Customer archived".into()), "Admin lookup");
        assert_eq!(err.to_string(), "Customer archived");
        let err = server_failure(None, "Admin lookup");
        assert_eq!(err.to_string(), "Admin lookup failed");
    }
}

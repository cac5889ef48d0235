//! CSV templates for each upload type.

use crate::api::Backend;
use crate::error::{ApiResult, CsvResult};
use crate::logs::log_success;
use crate::models::UploadType;
use crate::parser::to_csv;
use crate::validation::schema;

/// Fetch the server's template.
pub async fn download<B: Backend>(backend: &B, upload_type: UploadType) -> ApiResult<String> {
    let text = backend.download_template(upload_type).await?;
    log_success(format!("Downloaded {} template", upload_type.label()));
    Ok(text)
}

/// Header-only template built from the local rule table.
pub fn blank(upload_type: UploadType) -> CsvResult<String> {
    to_csv(&schema(upload_type).template_headers(), &[])
}

/// File name offered when saving a template.
pub fn file_name(upload_type: UploadType) -> String {
    format!("{}-template.csv", upload_type.as_slug())
}

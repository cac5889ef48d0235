//! Stub of the VESPA record service for integration tests
//!
//! Serves the upload endpoints on an ephemeral port with axum and records
//! every request body, so tests can drive `HttpBackend` and `Wizard` over
//! real HTTP and inspect what was sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vespa_upload::{ClientConfig, LoggedInUser, UploadType};

/// Behaviour of the stub.
#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    /// Subject names `/validation/check-subjects` reports as unrecognised.
    pub invalid_subjects: Vec<String>,
    /// Respond 500 to `/validation/check-subjects`.
    pub subject_check_down: bool,
    /// Findings `/{type}/validate` returns (empty means success).
    pub validate_errors: Vec<Value>,
    /// `(id, name, admin emails)` for the customer list and admin lookup.
    pub customers: Vec<(String, String, Vec<String>)>,
    /// Body and status of `/{type}/process`; defaults to a queued job.
    pub process_reply: Option<(StatusCode, Value)>,
}

#[derive(Default)]
struct Recorded {
    requests: Vec<(String, Value)>,
}

struct StubState {
    config: StubConfig,
    recorded: Mutex<Recorded>,
}

impl StubState {
    fn record(&self, path: impl Into<String>, body: Value) {
        self.recorded.lock().unwrap().requests.push((path.into(), body));
    }
}

/// Running stub service.
pub struct StubService {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubService {
    /// Bind an ephemeral port and start serving in the background.
    pub async fn start(config: StubConfig) -> Self {
        let state = Arc::new(StubState {
            config,
            recorded: Mutex::new(Recorded::default()),
        });

        let mut router = Router::new()
            .route("/api/templates/{slug}", get(template))
            .route("/api/validation/check-subjects", post(check_subjects))
            .route("/api/vespa-customers", get(customers))
            .route("/api/customer-admin-details", get(admin_details));
        for upload_type in UploadType::ALL {
            let prefix = upload_type.endpoint();
            router = router
                .route(&format!("/api/{prefix}/validate"), post(validate))
                .route(&format!("/api/{prefix}/process"), post(process));
        }
        let app = router.with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn client_config(&self, operator: LoggedInUser) -> ClientConfig {
        ClientConfig::new(self.base_url(), operator)
    }

    /// Bodies received on paths ending with `suffix`, in arrival order.
    pub fn requests_to(&self, suffix: &str) -> Vec<Value> {
        self.state
            .recorded
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(path, _)| path.ends_with(suffix))
            .map(|(_, body)| body.clone())
            .collect()
    }
}

async fn template(Path(slug): Path<String>) -> Response {
    match slug.as_str() {
        "staff" => "Title,First Name,Last Name,Email Address,Staff Type\r\n".into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": format!("No template '{slug}'") }))).into_response(),
    }
}

async fn validate(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let rows = body["csvData"].as_array().map(Vec::len).unwrap_or(0);
    state.record("/validate", body);

    let errors = &state.config.validate_errors;
    if errors.is_empty() {
        return Json(json!({ "success": true, "errors": [], "rowCount": rows })).into_response();
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "errors": errors, "rowCount": rows })),
    )
        .into_response()
}

async fn check_subjects(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let names: Vec<String> = body["subjectNames"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    state.record("/check-subjects", body);

    if state.config.subject_check_down {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Subject catalogue offline" })),
        )
            .into_response();
    }
    let invalid: Vec<&String> = names
        .iter()
        .filter(|n| state.config.invalid_subjects.contains(n))
        .collect();
    Json(json!({ "success": true, "invalidSubjectNames": invalid })).into_response()
}

async fn process(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    state.record("/process", body);
    match &state.config.process_reply {
        Some((status, reply)) => (*status, Json(reply.clone())).into_response(),
        None => Json(json!({ "success": true, "jobId": "job-1", "message": "Queued" })).into_response(),
    }
}

async fn customers(State(state): State<Arc<StubState>>) -> Json<Value> {
    let customers: Vec<Value> = state
        .config
        .customers
        .iter()
        .map(|(id, name, _)| json!({ "id": id, "name": name, "schoolIdText": format!("SCH-{id}") }))
        .collect();
    Json(json!({ "success": true, "customers": customers }))
}

async fn admin_details(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let id = params.get("customerId").cloned().unwrap_or_default();
    state.record("/customer-admin-details", json!({ "customerId": id }));

    match state.config.customers.iter().find(|(cid, _, _)| *cid == id) {
        Some((_, _, admins)) => {
            let admins: Vec<Value> = admins.iter().map(|e| json!({ "email": e, "role": "Staff Admin" })).collect();
            Json(json!({ "success": true, "admins": admins })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": format!("Customer {id} not found") })),
        )
            .into_response(),
    }
}

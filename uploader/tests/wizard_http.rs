//! End-to-end wizard runs against the stub record service over HTTP.

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{StubConfig, StubService};
use vespa_upload::{
    templates, Backend, ErrorKind, HttpBackend, JobStatus, LoggedInUser, Role, RowRef, SelectedFile, Step,
    UploadType, Wizard, WizardError,
};

const KS4_CSV: &str = "UPN,Student Email,KS2 Score,sub1,ex1,sub2,ex2\n\
                       A100,amy@school.org,105,Maths,7,Art,6\n\
                       B200,ben@school.org,,English,5,,\n";

const KS5_CSV: &str = "UPN,Student Email,sub1,sub2\n\
                       A100,amy@school.org,A - Physics,Quantum Telepathy\n";

const STAFF_CSV: &str = "Title,First Name,Last Name,Email Address,Staff Type\n\
                         Mr,John,Smith,jsmith@x.com,\"tut,sub\"\n";

fn operator(role: Role) -> LoggedInUser {
    LoggedInUser {
        id: "u-7".into(),
        email: "ops@vespa.academy".into(),
        role,
    }
}

fn wizard(stub: &StubService, role: Role) -> Wizard<HttpBackend> {
    let backend = HttpBackend::new(stub.client_config(operator(role.clone())));
    Wizard::new(Arc::new(backend), operator(role))
}

#[tokio::test]
async fn test_ks4_upload_is_queued() {
    let stub = StubService::start(StubConfig {
        process_reply: Some((StatusCode::OK, json!({ "success": true, "jobId": "abc123" }))),
        ..StubConfig::default()
    })
    .await;
    let w = wizard(&stub, Role::StaffAdmin);

    w.select_upload_type(UploadType::StudentKs4Subjects).await.unwrap();
    assert_eq!(w.next().await.unwrap(), Step::SelectFile);
    w.select_file(SelectedFile::from_text("ks4.csv", KS4_CSV)).await.unwrap();
    assert_eq!(w.next().await.unwrap(), Step::Validate);
    assert_eq!(w.next().await.unwrap(), Step::Process);
    assert_eq!(w.next().await.unwrap(), Step::Results);

    let job = w.job().await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.job_id, "abc123");
    assert_eq!(job.total_rows, 2);

    let validated = stub.requests_to("/validate");
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0]["csvData"][0]["UPN"], "A100");

    let processed = stub.requests_to("/process");
    assert_eq!(processed.len(), 1);
    let body = &processed[0];
    assert_eq!(body["csvData"].as_array().unwrap().len(), 2);
    assert_eq!(body["options"]["sendNotifications"], true);
    assert_eq!(body["options"]["notificationEmail"], "ops@vespa.academy");
    assert_eq!(body["options"]["runCalculators"], true);
    assert_eq!(body["options"]["percentile"], 75);
    assert_eq!(body["context"]["isEmulating"], false);
    assert_eq!(body["context"]["loggedInUser"]["role"], "Staff Admin");
    assert!(body["context"].get("emulatedSchool").is_none());
}

#[tokio::test]
async fn test_super_user_needs_org_with_admins() {
    let stub = StubService::start(StubConfig {
        customers: vec![
            ("c1".into(), "Ashlyns School".into(), vec!["head@ashlyns.org".into()]),
            ("c2".into(), "Empty Academy".into(), vec![]),
        ],
        ..StubConfig::default()
    })
    .await;
    let w = wizard(&stub, Role::SuperUser);

    w.select_upload_type(UploadType::Staff).await.unwrap();
    assert_eq!(w.next().await.unwrap(), Step::SelectOrganization);

    let orgs = w.load_organizations().await.unwrap();
    assert_eq!(orgs.len(), 2);
    assert_eq!(w.search_organizations("ashlyns").await.len(), 1);

    assert!(w.select_organization("c2").await.is_err());
    assert!(w.banner().await.is_failed());
    assert!(matches!(w.next().await, Err(WizardError::StepIncomplete { .. })));

    w.select_organization("c1").await.unwrap();
    assert_eq!(w.next().await.unwrap(), Step::SelectFile);
    w.select_file(SelectedFile::from_text("staff.csv", STAFF_CSV)).await.unwrap();
    w.next().await.unwrap();
    w.next().await.unwrap();
    assert_eq!(w.next().await.unwrap(), Step::Results);

    let processed = stub.requests_to("/process");
    let context = &processed[0]["context"];
    assert_eq!(context["isEmulating"], true);
    assert_eq!(context["emulatedSchool"]["id"], "c1");
    assert_eq!(context["emulatedSchool"]["admins"][0]["email"], "head@ashlyns.org");
    assert_eq!(context["emulatedSchool"]["admins"][0]["role"], "Staff Admin");
    assert!(processed[0]["options"].get("runCalculators").is_none());
}

#[tokio::test]
async fn test_ks5_unrecognised_subject_blocks() {
    let stub = StubService::start(StubConfig {
        invalid_subjects: vec!["Quantum Telepathy".into()],
        ..StubConfig::default()
    })
    .await;
    let w = wizard(&stub, Role::StaffAdmin);

    w.select_upload_type(UploadType::StudentKs5Subjects).await.unwrap();
    w.next().await.unwrap();
    w.select_file(SelectedFile::from_text("ks5.csv", KS5_CSV)).await.unwrap();
    w.next().await.unwrap();

    assert!(matches!(w.next().await, Err(WizardError::ValidationFailed { errors: 1 })));
    assert_eq!(w.step().await, Step::Validate);

    let result = w.validation().await.unwrap();
    assert_eq!(result.errors[0].kind, ErrorKind::InvalidSubject);
    assert_eq!(result.errors[0].row, RowRef::Data(1));
    assert_eq!(result.errors[0].field.as_deref(), Some("sub2"));

    let checked = stub.requests_to("/check-subjects");
    assert_eq!(checked, vec![json!({ "subjectNames": ["A - Physics", "Quantum Telepathy"] })]);
    assert!(stub.requests_to("/validate").is_empty());
}

#[tokio::test]
async fn test_subject_check_outage_is_not_a_pass() {
    let stub = StubService::start(StubConfig {
        subject_check_down: true,
        ..StubConfig::default()
    })
    .await;
    let backend = HttpBackend::new(stub.client_config(operator(Role::StaffAdmin)));

    let err = backend.check_subjects(&["A - Physics".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("Subject catalogue offline"));

    let result = vespa_upload::validate_file(&backend, UploadType::StudentKs5Subjects, KS5_CSV, true).await;
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::ApiError);
    assert!(result.errors[0].message.contains("Subject catalogue offline"));
}

#[tokio::test]
async fn test_server_findings_are_shown_verbatim() {
    let stub = StubService::start(StubConfig {
        validate_errors: vec![json!({
            "row": 1,
            "type": "InvalidValue",
            "field": "Email Address",
            "message": "jsmith@x.com already belongs to another school"
        })],
        ..StubConfig::default()
    })
    .await;
    let w = wizard(&stub, Role::StaffAdmin);

    w.select_upload_type(UploadType::Staff).await.unwrap();
    w.next().await.unwrap();
    w.select_file(SelectedFile::from_text("staff.csv", STAFF_CSV)).await.unwrap();
    w.next().await.unwrap();

    assert!(w.next().await.is_err());
    let result = w.validation().await.unwrap();
    assert_eq!(result.errors[0].message, "jsmith@x.com already belongs to another school");
    assert_eq!(result.errors[0].field.as_deref(), Some("Email Address"));
}

#[tokio::test]
async fn test_rejected_submission_ends_session() {
    let stub = StubService::start(StubConfig {
        process_reply: Some((
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Row 1: account is locked" }),
        )),
        ..StubConfig::default()
    })
    .await;
    let w = wizard(&stub, Role::StaffAdmin);

    w.select_upload_type(UploadType::Staff).await.unwrap();
    w.next().await.unwrap();
    w.select_file(SelectedFile::from_text("staff.csv", STAFF_CSV)).await.unwrap();
    w.next().await.unwrap();
    w.next().await.unwrap();

    assert_eq!(w.next().await.unwrap(), Step::Results);
    let job = w.job().await.unwrap();
    assert_eq!(job.status, JobStatus::SubmissionFailed);
    assert!(job.message.contains("Row 1: account is locked"));
    assert!(matches!(w.next().await, Err(WizardError::AtTerminalStep)));

    w.start_new_upload().await;
    assert_eq!(w.step().await, Step::SelectUploadType);
    assert_eq!(stub.requests_to("/process").len(), 1);
}

#[tokio::test]
async fn test_template_download() {
    let stub = StubService::start(StubConfig::default()).await;
    let backend = HttpBackend::new(stub.client_config(operator(Role::StaffAdmin)));

    let text = templates::download(&backend, UploadType::Staff).await.unwrap();
    assert!(text.starts_with("Title,First Name"));

    let err = templates::download(&backend, UploadType::StudentOnboard).await.unwrap_err();
    assert!(err.to_string().contains("404"));
    assert!(err.to_string().contains("No template 'student-onboard'"));
}

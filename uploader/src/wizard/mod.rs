//! The upload wizard state machine.
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐
//! │ Upload type │──▶│ Organization │──▶│   File   │──▶│ Validate │──▶│ Process │──▶│ Results │
//! └─────────────┘   │ (super user) │   └──────────┘   └──────────┘   └─────────┘   └─────────┘
//!                   └──────────────┘
//! ```
//!
//! A [`Wizard`] owns one [`WizardSession`] behind an async mutex. Forward
//! navigation is gated per step; on the validate and process steps `next`
//! runs the pipeline instead of just checking a precondition. At most one
//! validation or submission is in flight per session. The lock is not held
//! across network calls, so `prev` stays responsive while one is outstanding.
//! Selections may change during a validation, whose result is then
//! discarded; they are refused during a submission, whose acknowledgment is
//! always kept unless the session was reset.

pub mod steps;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::Backend;
use crate::emulation::{search_organizations, EmulationBanner, EmulationResolver};
use crate::error::{WizardError, WizardResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{
    EmulationContext, LoggedInUser, Organization, ProcessingJob, ProcessingOptions, UploadCategory, UploadType,
    ValidationResult,
};
use crate::parser::SelectedFile;
use crate::submission::{submit_job, Submission};
use crate::validation::validate_file;

pub use steps::{Step, StepPlan};

/// Pipeline call outstanding for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InFlight {
    Validation,
    Submission,
}

struct ValidationRun {
    upload_type: UploadType,
    contents: String,
    generation: u64,
    resets: u64,
}

struct SubmissionRun {
    upload_type: UploadType,
    validation: ValidationResult,
    options: ProcessingOptions,
    context: EmulationContext,
    resets: u64,
}

/// State of one upload session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSession {
    pub id: Uuid,
    pub operator: LoggedInUser,
    #[serde(skip)]
    plan: StepPlan,
    step_index: usize,
    pub category: Option<UploadCategory>,
    pub upload_type: Option<UploadType>,
    #[serde(skip)]
    pub file: Option<SelectedFile>,
    pub validation: Option<ValidationResult>,
    pub job: Option<ProcessingJob>,
    pub emulation: Option<EmulationContext>,
    pub banner: EmulationBanner,
    pub options: ProcessingOptions,
    pub in_flight: Option<InFlight>,
    /// Bumped whenever the upload type or file changes, and on reset.
    pub generation: u64,
    /// Bumped on reset only.
    pub resets: u64,
    #[serde(skip)]
    organizations: Vec<Organization>,
    selected_org: Option<String>,
}

impl WizardSession {
    pub fn new(operator: LoggedInUser) -> Self {
        let plan = StepPlan::for_role(&operator.role);
        // non-privileged operators always upload for their own organization
        let emulation = (!operator.role.is_privileged()).then(|| EmulationContext::direct(operator.clone()));
        Self {
            id: Uuid::new_v4(),
            operator,
            plan,
            step_index: 0,
            category: None,
            upload_type: None,
            file: None,
            validation: None,
            job: None,
            emulation,
            banner: EmulationBanner::Inactive,
            options: ProcessingOptions::default(),
            in_flight: None,
            generation: 0,
            resets: 0,
            organizations: Vec::new(),
            selected_org: None,
        }
    }

    pub fn plan(&self) -> StepPlan {
        self.plan
    }

    pub fn step(&self) -> Step {
        self.plan.get(self.step_index).unwrap_or(Step::Results)
    }

    /// 1-based position within the role's plan.
    pub fn step_number(&self) -> usize {
        self.step_index + 1
    }

    pub fn total_steps(&self) -> usize {
        self.plan.len()
    }

    pub fn selected_organization(&self) -> Option<&str> {
        self.selected_org.as_deref()
    }

    fn advance(&mut self) -> Step {
        if self.step_index + 1 < self.plan.len() {
            self.step_index += 1;
        }
        let step = self.step();
        log_info(format!("Step {}/{}: {}", self.step_number(), self.total_steps(), step.label()));
        step
    }

    fn invalidate(&mut self) {
        self.validation = None;
        self.generation += 1;
    }

    /// Fresh session for the same operator; the counters keep counting so
    /// in-flight results from before the reset are discarded.
    fn reset(&mut self) {
        let generation = self.generation + 1;
        let resets = self.resets + 1;
        *self = Self::new(self.operator.clone());
        self.generation = generation;
        self.resets = resets;
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    fn ensure_editable(&self) -> WizardResult<()> {
        if self.step().is_terminal() {
            return Err(WizardError::AtTerminalStep);
        }
        Ok(())
    }

    /// Selections are locked at the terminal step and while rows are being
    /// handed to the processor.
    fn ensure_selectable(&self) -> WizardResult<()> {
        self.ensure_editable()?;
        if self.in_flight == Some(InFlight::Submission) {
            return Err(WizardError::Busy);
        }
        Ok(())
    }

    fn begin_validation(&mut self) -> WizardResult<ValidationRun> {
        let incomplete = |reason| WizardError::StepIncomplete {
            step: Step::Validate,
            reason,
        };
        let upload_type = self.upload_type.ok_or(incomplete("choose an upload type"))?;
        let contents = self
            .file
            .as_ref()
            .map(|f| f.contents.clone())
            .ok_or(incomplete("choose a CSV file"))?;
        self.in_flight = Some(InFlight::Validation);
        Ok(ValidationRun {
            upload_type,
            contents,
            generation: self.generation,
            resets: self.resets,
        })
    }

    /// `None` when a job was already acknowledged for this session.
    fn begin_submission(&mut self) -> WizardResult<Option<SubmissionRun>> {
        if self.job.is_some() {
            return Ok(None);
        }
        let incomplete = |reason| WizardError::StepIncomplete {
            step: Step::Process,
            reason,
        };
        let validation = self
            .validation
            .clone()
            .filter(|v| v.is_valid)
            .ok_or(incomplete("validate the file first"))?;
        let upload_type = self.upload_type.ok_or(incomplete("choose an upload type"))?;
        let context = self.emulation.clone().ok_or(incomplete("choose an organization"))?;
        self.in_flight = Some(InFlight::Submission);
        Ok(Some(SubmissionRun {
            upload_type,
            validation,
            options: self.options.clone(),
            context,
            resets: self.resets,
        }))
    }

    /// Clear the in-flight marker unless a reset already replaced it.
    fn finish(&mut self, resets: u64) -> bool {
        if self.resets != resets {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Forward predicate of the plain (non-action) steps.
    fn check_forward(&self, step: Step) -> WizardResult<()> {
        let incomplete = |reason| Err(WizardError::StepIncomplete { step, reason });
        match step {
            Step::SelectUploadType => match (self.category, self.upload_type) {
                (None, _) => incomplete("choose an upload type"),
                (Some(c), None) if c.requires_subtype() => incomplete("choose a student upload type"),
                (Some(_), None) => incomplete("choose an upload type"),
                (Some(_), Some(_)) => Ok(()),
            },
            Step::SelectOrganization => match &self.emulation {
                Some(ctx) if ctx.is_emulating() => Ok(()),
                _ => incomplete("choose an organization whose administrators can be resolved"),
            },
            Step::SelectFile => match self.file {
                Some(_) => Ok(()),
                None => incomplete("choose a CSV file"),
            },
            Step::Validate | Step::Process => Ok(()),
            Step::Results => Err(WizardError::AtTerminalStep),
        }
    }
}

/// Handle to one wizard session. Clones share the session.
pub struct Wizard<B> {
    backend: Arc<B>,
    remote_validation: bool,
    session: Arc<Mutex<WizardSession>>,
}

impl<B> Clone for Wizard<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            remote_validation: self.remote_validation,
            session: Arc::clone(&self.session),
        }
    }
}

impl<B: Backend> Wizard<B> {
    pub fn new(backend: Arc<B>, operator: LoggedInUser) -> Self {
        log_info(format!("New upload session for {} ({})", operator.email, operator.role));
        Self {
            backend,
            remote_validation: true,
            session: Arc::new(Mutex::new(WizardSession::new(operator))),
        }
    }

    /// Also run server-side validation after local rules pass (on by default).
    pub fn with_remote_validation(mut self, enabled: bool) -> Self {
        self.remote_validation = enabled;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> WizardSession {
        self.session.lock().await.clone()
    }

    pub async fn step(&self) -> Step {
        self.session.lock().await.step()
    }

    pub async fn is_processing(&self) -> bool {
        self.session.lock().await.is_processing()
    }

    pub async fn banner(&self) -> EmulationBanner {
        self.session.lock().await.banner.clone()
    }

    pub async fn validation(&self) -> Option<ValidationResult> {
        self.session.lock().await.validation.clone()
    }

    pub async fn job(&self) -> Option<ProcessingJob> {
        self.session.lock().await.job.clone()
    }

    // =========================================================================
    // Selections
    // =========================================================================

    /// Choose staff or student. Staff has no subtype and selects itself.
    pub async fn select_category(&self, category: UploadCategory) -> WizardResult<()> {
        let mut session = self.session.lock().await;
        session.ensure_selectable()?;
        session.category = Some(category);
        let upload_type = match category {
            UploadCategory::Staff => Some(UploadType::Staff),
            UploadCategory::Student => session.upload_type.filter(|t| t.category() == UploadCategory::Student),
        };
        if session.upload_type != upload_type {
            session.upload_type = upload_type;
            session.invalidate();
        }
        Ok(())
    }

    pub async fn select_upload_type(&self, upload_type: UploadType) -> WizardResult<()> {
        let mut session = self.session.lock().await;
        session.ensure_selectable()?;
        session.category = Some(upload_type.category());
        if session.upload_type != Some(upload_type) {
            session.upload_type = Some(upload_type);
            session.invalidate();
            log_info(format!("Upload type: {}", upload_type.label()));
        }
        Ok(())
    }

    pub async fn select_file(&self, file: SelectedFile) -> WizardResult<()> {
        let mut session = self.session.lock().await;
        session.ensure_selectable()?;
        log_info(format!("File: {} ({} bytes, {})", file.name, file.size, file.encoding));
        session.file = Some(file);
        session.invalidate();
        Ok(())
    }

    pub async fn set_options(&self, options: ProcessingOptions) -> WizardResult<()> {
        let mut session = self.session.lock().await;
        session.ensure_selectable()?;
        session.options = options;
        Ok(())
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    /// Fetch the organizations a super user may act for.
    pub async fn load_organizations(&self) -> WizardResult<Vec<Organization>> {
        let operator = self.privileged_operator().await?;
        let mut resolver = EmulationResolver::new(self.backend.as_ref(), &operator);
        resolver.load().await?;
        let organizations = resolver.into_organizations();
        self.session.lock().await.organizations = organizations.clone();
        Ok(organizations)
    }

    /// Filter the loaded organizations.
    pub async fn search_organizations(&self, query: &str) -> Vec<Organization> {
        let session = self.session.lock().await;
        search_organizations(&session.organizations, query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Choose the organization to act for and resolve its administrators.
    ///
    /// On failure the banner shows the error and the organization step stays
    /// blocked; another organization may be chosen.
    pub async fn select_organization(&self, org_id: &str) -> WizardResult<()> {
        let (operator, organizations) = {
            let mut session = self.session.lock().await;
            if !session.operator.role.is_privileged() {
                return Err(WizardError::NotPrivileged);
            }
            session.ensure_selectable()?;
            let org_name = session
                .organizations
                .iter()
                .find(|o| o.id == org_id)
                .map(|o| o.name.clone())
                .unwrap_or_else(|| org_id.to_string());
            session.selected_org = Some(org_id.to_string());
            session.emulation = None;
            session.banner = EmulationBanner::Resolving { org_name };
            (session.operator.clone(), session.organizations.clone())
        };

        let mut resolver = EmulationResolver::with_organizations(self.backend.as_ref(), &operator, organizations);
        let resolved = resolver.resolve(org_id).await;

        let mut session = self.session.lock().await;
        if session.organizations.is_empty() {
            session.organizations = resolver.into_organizations();
        }
        if session.selected_org.as_deref() != Some(org_id) {
            log_warning(format!("Discarding admin lookup for {org_id}: selection changed"));
            return Ok(());
        }
        match resolved {
            Ok(context) => {
                session.banner = EmulationBanner::active(&context);
                session.emulation = Some(context);
                Ok(())
            }
            Err(e) => {
                session.banner = EmulationBanner::Failed { message: e.to_string() };
                Err(e.into())
            }
        }
    }

    async fn privileged_operator(&self) -> WizardResult<LoggedInUser> {
        let session = self.session.lock().await;
        if !session.operator.role.is_privileged() {
            return Err(WizardError::NotPrivileged);
        }
        Ok(session.operator.clone())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move forward, running validation or submission on their steps.
    ///
    /// Returns the step the session is on afterwards.
    pub async fn next(&self) -> WizardResult<Step> {
        let mut session = self.session.lock().await;
        if session.is_processing() {
            return Err(WizardError::Busy);
        }
        match session.step() {
            Step::Validate => {
                let run = session.begin_validation()?;
                drop(session);
                self.run_validation(run).await
            }
            Step::Process => {
                let Some(run) = session.begin_submission()? else {
                    // already acknowledged; never resubmit
                    return Ok(session.advance());
                };
                drop(session);
                self.run_submission(run).await
            }
            step => {
                session.check_forward(step)?;
                Ok(session.advance())
            }
        }
    }

    /// Move back one step. Collected state, including a recorded job, is kept.
    pub async fn prev(&self) -> WizardResult<Step> {
        let mut session = self.session.lock().await;
        if session.step_index == 0 {
            return Err(WizardError::AtFirstStep);
        }
        session.step_index -= 1;
        Ok(session.step())
    }

    /// Discard everything and return to the first step.
    pub async fn start_new_upload(&self) {
        let mut session = self.session.lock().await;
        session.reset();
        log_info("Starting a new upload");
    }

    async fn run_validation(&self, run: ValidationRun) -> WizardResult<Step> {
        log_info(format!("Validating {} upload...", run.upload_type.label()));
        let result = validate_file(self.backend.as_ref(), run.upload_type, &run.contents, self.remote_validation).await;

        let mut session = self.session.lock().await;
        if !session.finish(run.resets) || session.generation != run.generation {
            log_warning("Discarding validation result: upload type or file changed");
            return Ok(session.step());
        }

        let is_valid = result.is_valid;
        let errors = result.errors.len();
        session.validation = Some(result);

        if !is_valid {
            log_warning(format!("Validation failed with {errors} error(s)"));
            return Err(WizardError::ValidationFailed { errors });
        }
        log_success("Validation passed");
        if session.step() != Step::Validate {
            return Ok(session.step());
        }
        Ok(session.advance())
    }

    async fn run_submission(&self, run: SubmissionRun) -> WizardResult<Step> {
        let job = submit_job(
            self.backend.as_ref(),
            &Submission {
                upload_type: run.upload_type,
                validation: &run.validation,
                options: &run.options,
                context: &run.context,
            },
        )
        .await;

        let mut session = self.session.lock().await;
        if !session.finish(run.resets) {
            log_warning(format!("Submission finished after the session was reset (job '{}')", job.job_id));
            return Ok(session.step());
        }
        session.job = Some(job);
        if session.step() != Step::Process {
            return Ok(session.step());
        }
        Ok(session.advance())
    }
}

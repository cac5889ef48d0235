//! Acting on behalf of another organization.
//!
//! Only super users emulate. The resolver lists candidate organizations,
//! narrows them by search, and resolves the chosen one's administrators.
//! An organization with no administrators cannot be emulated: the
//! background processor uses the admin list to own records and send
//! notifications.

use serde::{Deserialize, Serialize};

use crate::api::Backend;
use crate::error::{EmulationError, EmulationResult};
use crate::logs::{log_error, log_info, log_success};
use crate::models::{AdminContact, EmulatedOrg, EmulationContext, LoggedInUser, Organization};

/// Organization lookup and admin resolution for one operator.
pub struct EmulationResolver<'a, B> {
    backend: &'a B,
    operator: &'a LoggedInUser,
    organizations: Vec<Organization>,
}

impl<'a, B: Backend> EmulationResolver<'a, B> {
    pub fn new(backend: &'a B, operator: &'a LoggedInUser) -> Self {
        Self {
            backend,
            operator,
            organizations: Vec::new(),
        }
    }

    /// Resolver over an already fetched organization list.
    pub fn with_organizations(backend: &'a B, operator: &'a LoggedInUser, organizations: Vec<Organization>) -> Self {
        Self {
            backend,
            operator,
            organizations,
        }
    }

    fn ensure_privileged(&self) -> EmulationResult<()> {
        if self.operator.role.is_privileged() {
            Ok(())
        } else {
            Err(EmulationError::NotPrivileged)
        }
    }

    /// Fetch the organization list, replacing any earlier one.
    pub async fn load(&mut self) -> EmulationResult<&[Organization]> {
        self.ensure_privileged()?;
        log_info("Loading organizations...");
        self.organizations = self.backend.list_customers().await?;
        log_success(format!("{} organization(s) available", self.organizations.len()));
        Ok(&self.organizations)
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn into_organizations(self) -> Vec<Organization> {
        self.organizations
    }

    /// Case-insensitive substring match on name or school id. An empty
    /// query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Organization> {
        search_organizations(&self.organizations, query)
    }

    /// Resolve the administrators of `org_id` into an emulation context.
    ///
    /// Loads the organization list first if it has not been fetched yet.
    pub async fn resolve(&mut self, org_id: &str) -> EmulationResult<EmulationContext> {
        self.ensure_privileged()?;
        if self.organizations.is_empty() {
            self.load().await?;
        }

        let org = self
            .organizations
            .iter()
            .find(|o| o.id == org_id)
            .cloned()
            .ok_or_else(|| EmulationError::OrganizationNotFound(org_id.to_string()))?;

        log_info(format!("Resolving administrators for {}...", org.name));
        let admins = match self.backend.admin_details(&org.id).await {
            Ok(admins) => admins,
            Err(e) => {
                log_error(format!("Admin lookup for {} failed: {e}", org.name));
                return Err(e.into());
            }
        };

        let context = EmulationContext::emulating(
            self.operator.clone(),
            EmulatedOrg {
                org_id: org.id,
                org_name: org.name,
                admins,
            },
        );
        match &context {
            Ok(ctx) => {
                if let Some(org) = ctx.emulated_org() {
                    log_success(format!("Acting for {} ({} admin(s))", org.org_name, org.admins.len()));
                }
            }
            Err(e) => log_error(e.to_string()),
        }
        context
    }
}

pub fn search_organizations<'o>(organizations: &'o [Organization], query: &str) -> Vec<&'o Organization> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return organizations.iter().collect();
    }
    organizations
        .iter()
        .filter(|o| {
            o.name.to_lowercase().contains(&needle)
                || o
                    .school_id_text
                    .as_deref()
                    .is_some_and(|id| id.to_lowercase().contains(&needle))
        })
        .collect()
}

/// What the "acting as" banner shows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EmulationBanner {
    #[default]
    Inactive,
    Resolving {
        org_name: String,
    },
    Active {
        org_name: String,
        admins: Vec<AdminContact>,
    },
    Failed {
        message: String,
    },
}

impl EmulationBanner {
    pub fn active(context: &EmulationContext) -> Self {
        match context.emulated_org() {
            Some(org) => Self::Active {
                org_name: org.org_name.clone(),
                admins: org.admins.clone(),
            },
            None => Self::Inactive,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Self::Inactive => String::new(),
            Self::Resolving { org_name } => format!("Resolving {org_name}..."),
            Self::Active { org_name, admins } => {
                let emails: Vec<&str> = admins.iter().map(|a| a.email.as_str()).collect();
                format!("Acting on behalf of {org_name} (admins: {})", emails.join(", "))
            }
            Self::Failed { message } => format!("Emulation failed: {message}"),
        }
    }
}

use chrono::NaiveDate;
use tracing::{info, warn};

use shared::types::{Capability, Employee, EmployeeDraft, EmployeeOptions, Page, Session};

use crate::api::{ApiClient, ApiError, Transport};
use crate::pages::{Notice, Redirect};
use crate::session::{Navigation, SessionStorage, SessionStore};

/// Form sections, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Basic,
    Personal,
    Employment,
    Emergency,
    Banking,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Basic,
        Section::Personal,
        Section::Employment,
        Section::Emergency,
        Section::Banking,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Basic => "Basic Information",
            Section::Personal => "Personal Details",
            Section::Employment => "Employment",
            Section::Emergency => "Emergency Contact",
            Section::Banking => "Banking",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Following section; the last one stays put.
    pub fn next(&self) -> Section {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }

    /// Preceding section; the first one stays put.
    pub fn previous(&self) -> Section {
        Self::ALL[self.index().saturating_sub(1)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: i64 },
}

/// Five-section employee editor sharing one draft.
#[derive(Debug, Clone)]
pub struct EmployeeForm {
    mode: FormMode,
    section: Section,
    pub draft: EmployeeDraft,
    pub options: EmployeeOptions,
    /// Cleared once a submission succeeds; the caller then re-fetches.
    pub open: bool,
    /// Messages from the last failed submission.
    pub errors: Vec<String>,
    /// Problems met while loading the form.
    pub notices: Vec<Notice>,
}

impl EmployeeForm {
    pub fn create(options: EmployeeOptions) -> Self {
        Self {
            mode: FormMode::Create,
            section: Section::Basic,
            draft: EmployeeDraft::default(),
            options,
            open: true,
            errors: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn edit(employee: &Employee, options: EmployeeOptions) -> Self {
        Self {
            mode: FormMode::Edit { id: employee.id },
            draft: EmployeeDraft::from(employee),
            ..Self::create(options)
        }
    }

    /// Fetch the employee and the option lists for editing.
    ///
    /// Without the employee there is nothing to edit. Missing option lists
    /// leave the form usable with a notice.
    pub async fn load_for_edit<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        id: i64,
    ) -> Result<Result<Self, Notice>, Redirect> {
        let token = require_manage(session)?;

        let (employee, options) = tokio::join!(api.employee(&token, id), api.employee_options(&token));
        if employee.as_ref().err().is_some_and(ApiError::is_unauthorized)
            || options.as_ref().err().is_some_and(ApiError::is_unauthorized)
        {
            return Err(session.invalidate().into());
        }

        let employee = match employee {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to load employee {}: {}", id, e);
                return Ok(Err(Notice::Error(e.message_or("Failed to load employee"))));
            }
        };
        let mut notices = Vec::new();
        let options = match options {
            Ok(options) => options,
            Err(e) => {
                warn!("Failed to load employee options: {}", e);
                notices.push(Notice::Error("Failed to load employee options".to_string()));
                EmployeeOptions::default()
            }
        };

        let mut form = Self::edit(&employee, options);
        form.notices = notices;
        Ok(Ok(form))
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn next(&mut self) {
        self.section = self.section.next();
    }

    pub fn previous(&mut self) {
        self.section = self.section.previous();
    }

    /// Validate against `today`, then POST or PUT the draft.
    ///
    /// Returns `Ok(true)` when saved. On failure the form stays open with
    /// its values and `errors` explains why.
    pub async fn submit<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        today: NaiveDate,
    ) -> Result<bool, Redirect> {
        self.errors.clear();

        if let Err(e) = self.draft.validate(today) {
            self.errors.push(e.to_string());
            return Ok(false);
        }

        let token = require_manage(session)?;

        let result = match self.mode {
            FormMode::Create => api.create_employee(&token, &self.draft.create_payload()).await,
            FormMode::Edit { id } => {
                api.update_employee(&token, id, &self.draft.update_payload())
                    .await
            }
        };

        match result {
            Ok(_) => {
                match self.mode {
                    FormMode::Create => info!("Created employee {}", self.draft.employee_id),
                    FormMode::Edit { id } => info!("Updated employee record {}", id),
                }
                self.open = false;
                Ok(true)
            }
            Err(ApiError::Unauthorized) => Err(session.invalidate().into()),
            Err(e) => {
                warn!("Employee save rejected: {}", e);
                self.errors = match e.details() {
                    Some(details) => details.to_vec(),
                    None => vec![e.message_or("Failed to save employee")],
                };
                Ok(false)
            }
        }
    }
}

fn require_manage<S: SessionStorage>(session: &SessionStore<S>) -> Result<String, Redirect> {
    let token = session.require_token()?;
    let allowed = session
        .session()
        .map(Session::authorizer)
        .is_some_and(|a| a.allows(Capability::ManageEmployees));
    if !allowed {
        return Err(Redirect {
            to: Navigation::Dashboard,
            notice: Some(Notice::Error(format!(
                "You do not have access to {}",
                Page::Employees.label()
            ))),
        });
    }
    Ok(token)
}

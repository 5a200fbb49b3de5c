//! Page controllers: each one loads its view through the gateway, keeps the
//! view state and turns failures into notices.
//!
//! Every controller follows the same entry sequence: token check (no token
//! means login, no request sent), capability check against the role table
//! (missing capability means a notice and the dashboard), then the fetches.
//! A 401 from any fetch goes through [`SessionStore::invalidate`] once.

use std::path::{Path, PathBuf};

use hyper::StatusCode;
use tracing::{debug, warn};

use shared::types::*;

use crate::api::{ApiClient, ApiError, Transport};
use crate::session::{Navigation, SessionStorage, SessionStore};

// ---------------------------------------------------------------------------
// Notices and redirects
// ---------------------------------------------------------------------------

/// Transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Success(s) | Notice::Error(s) => s,
        }
    }
}

/// A controller could not stay on its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: Navigation,
    pub notice: Option<Notice>,
}

impl From<Navigation> for Redirect {
    fn from(to: Navigation) -> Self {
        Self { to, notice: None }
    }
}

/// Token plus role check shared by every page.
fn enter<S: SessionStorage>(
    session: &SessionStore<S>,
    page: Page,
) -> Result<(String, Authorizer), Redirect> {
    let token = session.require_token()?;
    let authorizer = session
        .session()
        .map(Session::authorizer)
        .ok_or(Navigation::Login)?;

    if !authorizer.can_open(page) {
        warn!("{} may not open {}", authorizer.role(), page.label());
        return Err(Redirect {
            to: Navigation::Dashboard,
            notice: Some(Notice::Error(format!(
                "You do not have access to {}",
                page.label()
            ))),
        });
    }
    Ok((token, authorizer))
}

/// Resolve a fetch: 401 invalidates the session, any other failure becomes
/// an error notice and the empty view model.
fn settle<T: Default, S: SessionStorage>(
    result: Result<T, ApiError>,
    session: &mut SessionStore<S>,
    notices: &mut Vec<Notice>,
    failure: &str,
) -> Result<T, Redirect> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => Err(session.invalidate().into()),
        Err(e) => {
            warn!("{}: {}", failure, e);
            notices.push(Notice::Error(failure.to_string()));
            Ok(T::default())
        }
    }
}

/// Resolve an action: 401 invalidates the session, other failures become a
/// notice carrying the backend's message.
fn act<T, S: SessionStorage>(
    result: Result<T, ApiError>,
    session: &mut SessionStore<S>,
    notices: &mut Vec<Notice>,
    failure: &str,
) -> Result<Option<T>, Redirect> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::Unauthorized) => Err(session.invalidate().into()),
        Err(e) => {
            warn!("{}: {}", failure, e);
            notices.push(Notice::Error(e.message_or(failure)));
            Ok(None)
        }
    }
}

fn denied(notices: &mut Vec<Notice>) {
    notices.push(Notice::Error(
        "You do not have permission to perform this action".to_string(),
    ));
}

// ---------------------------------------------------------------------------
// Client-side search
// ---------------------------------------------------------------------------

/// Rows that can be narrowed by a free-text query over already-fetched data.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    /// Case-insensitive substring match on any field. An empty query
    /// matches everything.
    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self
                .search_fields()
                .iter()
                .any(|f| f.to_lowercase().contains(&query))
    }
}

pub fn search<'a, T: Searchable>(rows: &'a [T], query: &str) -> Vec<&'a T> {
    rows.iter().filter(|r| r.matches(query)).collect()
}

impl Searchable for Employee {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.name.as_str(),
            self.email.as_str(),
            self.employee_id.as_str(),
        ];
        fields.extend(self.department.as_deref());
        fields.extend(self.position.as_deref());
        fields
    }
}

impl Searchable for PayrollRun {
    fn search_fields(&self) -> Vec<&str> {
        self.employee_name.as_deref().into_iter().collect()
    }
}

impl Searchable for Payslip {
    fn search_fields(&self) -> Vec<&str> {
        self.employee_name.as_deref().into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DashboardPage {
    pub user: SessionUser,
    pub employee: Option<SessionEmployee>,
    pub nav: Vec<NavItem>,
    pub summary: Summary,
    pub notices: Vec<Notice>,
}

impl DashboardPage {
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<Self, Redirect> {
        let (token, authorizer) = enter(session, Page::Dashboard)?;
        let Some(user) = session.user().cloned() else {
            return Err(Navigation::Login.into());
        };
        let employee = session.employee().cloned();

        let mut notices = Vec::new();
        let summary = settle(
            api.summary(&token).await,
            session,
            &mut notices,
            "Failed to load dashboard",
        )?;

        Ok(Self {
            user,
            employee,
            nav: authorizer.nav_items(),
            summary,
            notices,
        })
    }
}

// ---------------------------------------------------------------------------
// Employees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EmployeesPage {
    token: String,
    authorizer: Authorizer,
    pub employees: Vec<Employee>,
    pub options: EmployeeOptions,
    pub notices: Vec<Notice>,
}

impl EmployeesPage {
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<Self, Redirect> {
        let (token, authorizer) = enter(session, Page::Employees)?;
        let mut page = Self {
            token,
            authorizer,
            employees: Vec::new(),
            options: EmployeeOptions::default(),
            notices: Vec::new(),
        };
        page.refresh(session, api).await?;
        Ok(page)
    }

    /// Re-fetch the list and the option lists together.
    pub async fn refresh<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<(), Redirect> {
        let (list, options) = tokio::join!(
            api.employees(&self.token),
            api.employee_options(&self.token)
        );
        if list.as_ref().err().is_some_and(ApiError::is_unauthorized)
            || options.as_ref().err().is_some_and(ApiError::is_unauthorized)
        {
            return Err(session.invalidate().into());
        }

        self.employees = settle(list, session, &mut self.notices, "Failed to load employees")?
            .employees;
        self.options = settle(
            options,
            session,
            &mut self.notices,
            "Failed to load employee options",
        )?;
        Ok(())
    }

    pub fn visible(&self, query: &str) -> Vec<&Employee> {
        search(&self.employees, query)
    }

    pub fn can_edit(&self) -> bool {
        self.authorizer.allows(Capability::ManageEmployees)
    }

    pub fn can_delete(&self) -> bool {
        self.authorizer.allows(Capability::DeleteEmployees)
    }

    /// Delete one employee and re-fetch. Returns whether it was deleted.
    pub async fn delete<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        id: i64,
    ) -> Result<bool, Redirect> {
        if !self.can_delete() {
            denied(&mut self.notices);
            return Ok(false);
        }

        let deleted = act(
            api.delete_employee(&self.token, id).await,
            session,
            &mut self.notices,
            "Failed to delete employee",
        )?;
        if deleted.is_none() {
            return Ok(false);
        }

        self.notices
            .push(Notice::Success("Employee deleted successfully".to_string()));
        self.refresh(session, api).await?;
        Ok(true)
    }
}

/// One employee record.
#[derive(Debug, Clone)]
pub struct EmployeePage {
    pub employee: Employee,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl EmployeePage {
    /// A record the backend does not know sends the user back to the list.
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        id: i64,
    ) -> Result<Self, Redirect> {
        let (token, authorizer) = enter(session, Page::Employees)?;

        let employee = match api.employee(&token, id).await {
            Ok(employee) => employee,
            Err(ApiError::Unauthorized) => return Err(session.invalidate().into()),
            Err(ApiError::Backend { status, .. }) if status == StatusCode::NOT_FOUND => {
                debug!("Employee {} not found", id);
                return Err(Redirect {
                    to: Navigation::Employees,
                    notice: Some(Notice::Error("Employee not found".to_string())),
                });
            }
            Err(e) => {
                warn!("Failed to load employee {}: {}", id, e);
                return Err(Redirect {
                    to: Navigation::Employees,
                    notice: Some(Notice::Error(e.message_or("Failed to load employee"))),
                });
            }
        };

        Ok(Self {
            employee,
            can_edit: authorizer.allows(Capability::ManageEmployees),
            can_delete: authorizer.allows(Capability::DeleteEmployees),
        })
    }
}

// ---------------------------------------------------------------------------
// Payroll
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PayrollPage {
    token: String,
    authorizer: Authorizer,
    pub month: u32,
    pub year: i32,
    pub runs: Vec<PayrollRun>,
    pub employees: Vec<Employee>,
    pub notices: Vec<Notice>,
}

impl PayrollPage {
    /// Load runs for `month`/`year` together with the employees eligible
    /// for payroll. The period is not range-checked here.
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        month: u32,
        year: i32,
    ) -> Result<Self, Redirect> {
        let (token, authorizer) = enter(session, Page::Payroll)?;
        let mut page = Self {
            token,
            authorizer,
            month,
            year,
            runs: Vec::new(),
            employees: Vec::new(),
            notices: Vec::new(),
        };

        let (runs, employees) = tokio::join!(
            api.payroll_runs(&page.token, month, year),
            api.payroll_employees(&page.token)
        );
        if runs.as_ref().err().is_some_and(ApiError::is_unauthorized)
            || employees.as_ref().err().is_some_and(ApiError::is_unauthorized)
        {
            return Err(session.invalidate().into());
        }

        page.runs = settle(runs, session, &mut page.notices, "Failed to load payrolls")?
            .payroll_runs;
        page.employees = settle(
            employees,
            session,
            &mut page.notices,
            "Failed to load employees",
        )?
        .employees;
        Ok(page)
    }

    /// Switch period and re-fetch its runs.
    pub async fn select_period<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        month: u32,
        year: i32,
    ) -> Result<(), Redirect> {
        self.month = month;
        self.year = year;
        self.reload_runs(session, api).await
    }

    async fn reload_runs<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<(), Redirect> {
        self.runs = settle(
            api.payroll_runs(&self.token, self.month, self.year).await,
            session,
            &mut self.notices,
            "Failed to load payrolls",
        )?
        .payroll_runs;
        Ok(())
    }

    pub fn visible(&self, query: &str) -> Vec<&PayrollRun> {
        search(&self.runs, query)
    }

    /// Employees without a run for the selected period.
    pub fn available(&self) -> Vec<&Employee> {
        available_employees(&self.employees, &self.runs, self.month, self.year)
    }

    pub fn can_manage(&self) -> bool {
        self.authorizer.allows(Capability::ManagePayroll)
    }

    /// Create one run for the selected period.
    pub async fn create_run<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        employee_id: Option<i64>,
        deductions: f64,
    ) -> Result<bool, Redirect> {
        if !self.can_manage() {
            denied(&mut self.notices);
            return Ok(false);
        }
        let Some(employee_id) = employee_id else {
            self.notices
                .push(Notice::Error("Please select an employee".to_string()));
            return Ok(false);
        };

        let run = NewPayrollRun {
            employee_id,
            month: self.month,
            year: self.year,
            deductions,
        };
        let created = act(
            api.create_run(&self.token, &run).await,
            session,
            &mut self.notices,
            "Failed to create payroll",
        )?;
        if created.is_none() {
            return Ok(false);
        }

        self.notices
            .push(Notice::Success("Payroll run created".to_string()));
        self.reload_runs(session, api).await?;
        Ok(true)
    }

    pub async fn process<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        run_id: i64,
    ) -> Result<bool, Redirect> {
        if !self.can_manage() {
            denied(&mut self.notices);
            return Ok(false);
        }

        let processed = act(
            api.process_run(&self.token, run_id).await,
            session,
            &mut self.notices,
            "Failed to process payroll",
        )?;
        if processed.is_none() {
            return Ok(false);
        }

        self.notices.push(Notice::Success(
            "Payroll processed successfully".to_string(),
        ));
        self.reload_runs(session, api).await?;
        Ok(true)
    }

    /// Ask the backend to create runs for every eligible employee in the
    /// selected period.
    pub async fn bulk_create<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        default_deductions: f64,
    ) -> Result<Option<BulkPayrollOutcome>, Redirect> {
        if !self.can_manage() {
            denied(&mut self.notices);
            return Ok(None);
        }

        let request = BulkPayrollRequest {
            month: self.month,
            year: self.year,
            default_deductions,
        };
        let Some(outcome) = act(
            api.bulk_runs(&self.token, &request).await,
            session,
            &mut self.notices,
            "Failed to create bulk payroll",
        )?
        else {
            return Ok(None);
        };

        self.notices.push(Notice::Success(format!(
            "{}. {} records created.",
            outcome.message, outcome.success_count
        )));
        if outcome.error_count > 0 {
            self.notices.push(Notice::Error(format!(
                "{} errors occurred",
                outcome.error_count
            )));
        }
        self.reload_runs(session, api).await?;
        Ok(Some(outcome))
    }
}

// ---------------------------------------------------------------------------
// Payslips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PayslipsPage {
    token: String,
    /// False when the backend only returns the caller's own payslips.
    pub all_employees: bool,
    pub payslips: Vec<Payslip>,
    pub notices: Vec<Notice>,
}

impl PayslipsPage {
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<Self, Redirect> {
        let (token, authorizer) = enter(session, Page::Payslips)?;
        let mut notices = Vec::new();
        let payslips = settle(
            api.payslips(&token).await,
            session,
            &mut notices,
            "Failed to load payslips",
        )?
        .payslips;

        Ok(Self {
            token,
            all_employees: authorizer.allows(Capability::ViewAllPayslips),
            payslips,
            notices,
        })
    }

    pub fn visible(&self, query: &str) -> Vec<&Payslip> {
        search(&self.payslips, query)
    }

    /// Download the PDF into `dir`. Returns the written path.
    pub async fn download<S: SessionStorage, T: Transport>(
        &mut self,
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
        id: i64,
        dir: &Path,
    ) -> Result<Option<PathBuf>, Redirect> {
        let Some(document) = act(
            api.payslip_pdf(&self.token, id).await,
            session,
            &mut self.notices,
            "Failed to download PDF",
        )?
        else {
            return Ok(None);
        };

        let target = dir.join(&document.filename);
        if let Err(e) = tokio::fs::write(&target, &document.bytes).await {
            warn!("Failed to write {}: {}", target.display(), e);
            self.notices
                .push(Notice::Error("Failed to download PDF".to_string()));
            return Ok(None);
        }

        debug!("Wrote {} bytes to {}", document.bytes.len(), target.display());
        self.notices
            .push(Notice::Success("PDF downloaded successfully".to_string()));
        Ok(Some(target))
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AnalyticsPage {
    pub departments: Vec<DepartmentShare>,
    pub trends: Vec<MonthlyTrend>,
    pub notices: Vec<Notice>,
}

impl AnalyticsPage {
    /// Distribution and trend are fetched together. A 401 from either ends
    /// the session once.
    pub async fn load<S: SessionStorage, T: Transport>(
        session: &mut SessionStore<S>,
        api: &ApiClient<T>,
    ) -> Result<Self, Redirect> {
        let (token, _) = enter(session, Page::Analytics)?;

        let (distribution, trend) = tokio::join!(
            api.department_distribution(&token),
            api.monthly_trend(&token)
        );
        if distribution
            .as_ref()
            .err()
            .is_some_and(ApiError::is_unauthorized)
            || trend.as_ref().err().is_some_and(ApiError::is_unauthorized)
        {
            return Err(session.invalidate().into());
        }

        let mut notices = Vec::new();
        let failure = "Failed to load analytics";
        let departments = settle(distribution, session, &mut notices, failure)?.departments;
        let trends = settle(trend, session, &mut notices, failure)?.trends;
        notices.dedup();

        Ok(Self {
            departments,
            trends,
            notices,
        })
    }
}

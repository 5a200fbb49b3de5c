use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::NaiveDate;
use hyper::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use hyper::{Method, StatusCode};
use serde_json::{Value, json};

use console::api::{ApiRequest, ApiResponse};
use console::form::{EmployeeForm, FormMode};
use console::pages::*;
use console::{
    ApiClient, ApiError, FileStorage, MemoryStorage, Navigation, SessionStore, Transport,
};
use shared::types::{EmployeeOptions, LoginData, Role, SessionUser};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Sent {
    method: Method,
    path: String,
    token: Option<String>,
    body: Option<Value>,
}

type Reply = (StatusCode, HeaderMap, Bytes);

/// Answers by method and path (query ignored). Unscripted calls get a 404.
#[derive(Debug, Clone, Default)]
struct Scripted {
    replies: Arc<Mutex<HashMap<(Method, String), Reply>>>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl Scripted {
    fn reply(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.reply_with(method, path, status, HeaderMap::new(), body.to_string())
    }

    fn reply_with(
        &self,
        method: Method,
        path: &str,
        status: u16,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> &Self {
        self.replies.lock().unwrap().insert(
            (method, path.to_string()),
            (StatusCode::from_u16(status).unwrap(), headers, body.into()),
        );
        self
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self, method: Method, path: &str) -> usize {
        self.sent()
            .iter()
            .filter(|s| s.method == method && s.path.split('?').next() == Some(path))
            .count()
    }
}

impl Transport for Scripted {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let path = req
            .path_and_query
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        self.sent.lock().unwrap().push(Sent {
            method: req.method.clone(),
            path: req.path_and_query.clone(),
            token: req.token.clone(),
            body: req
                .body
                .as_ref()
                .map(|b| serde_json::from_slice(b).unwrap()),
        });

        let reply = self.replies.lock().unwrap().get(&(req.method, path)).cloned();
        let (status, headers, body) = reply.unwrap_or((
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            Bytes::from_static(br#"{"error":"Endpoint not found"}"#),
        ));
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn setup() -> (Scripted, ApiClient<Scripted>) {
    let script = Scripted::default();
    (script.clone(), ApiClient::new(script))
}

fn signed_in(role: Role) -> SessionStore<MemoryStorage> {
    let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
    let user = SessionUser {
        id: 1,
        email: "someone@example.com".into(),
        role,
    };
    store.set_session("tok".into(), user, None).unwrap();
    store
}

fn signed_out() -> SessionStore<MemoryStorage> {
    SessionStore::open(MemoryStorage::new()).unwrap()
}

fn employee_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "employee_id": format!("EMP{id:03}"),
        "department": "Engineering",
        "basic_salary": 5000.0,
    })
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

// ---------------------------------------------------------------------------
// Entry checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_token_goes_to_login_without_a_request() {
    let (script, api) = setup();
    let mut session = signed_out();

    let err = EmployeesPage::load(&mut session, &api).await.unwrap_err();
    assert_eq!(err, Redirect::from(Navigation::Login));

    let err = DashboardPage::load(&mut session, &api).await.unwrap_err();
    assert_eq!(err.to, Navigation::Login);
    assert!(script.sent().is_empty());
}

#[tokio::test]
async fn missing_capability_returns_to_dashboard_with_notice() {
    let (script, api) = setup();
    let mut session = signed_in(Role::Employee);

    let err = PayrollPage::load(&mut session, &api, 5, 2024)
        .await
        .unwrap_err();
    assert_eq!(err.to, Navigation::Dashboard);
    assert_eq!(
        err.notice,
        Some(Notice::Error("You do not have access to Payroll".into()))
    );
    assert!(script.sent().is_empty());
    assert!(session.token().is_some());
}

#[tokio::test]
async fn dashboard_shows_role_navigation_and_summary() {
    let (script, api) = setup();
    script.reply(
        Method::GET,
        "/api/analytics/summary",
        200,
        json!({"total_employees": 4, "total_payroll": 12000.5, "total_payslips": 9, "average_salary": 3000.0}),
    );
    let mut session = signed_in(Role::Employee);

    let dash = DashboardPage::load(&mut session, &api).await.unwrap();
    let labels: Vec<_> = dash.nav.iter().map(|n| n.label).collect();
    assert_eq!(labels, ["Dashboard", "Payslips"]);
    assert_eq!(dash.summary.total_employees, 4);
    assert!(dash.notices.is_empty());
    assert_eq!(script.sent()[0].token.as_deref(), Some("tok"));
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_unauthorized_fetches_invalidate_once() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/analytics/department-distribution", 401, json!({"error": "Token has expired"}))
        .reply(Method::GET, "/api/analytics/monthly-trend", 401, json!({"error": "Token has expired"}));
    let mut session = signed_in(Role::Hr);

    let err = AnalyticsPage::load(&mut session, &api).await.unwrap_err();
    assert_eq!(err.to, Navigation::Login);
    assert_eq!(session.invalidations(), 1);
    assert!(session.session().is_none());
    assert_eq!(script.sent().len(), 2);
}

#[tokio::test]
async fn other_failures_give_an_empty_view_and_one_notice() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/analytics/department-distribution", 500, json!({"error": "boom"}))
        .reply(Method::GET, "/api/analytics/monthly-trend", 500, json!({"error": "boom"}));
    let mut session = signed_in(Role::Admin);

    let page = AnalyticsPage::load(&mut session, &api).await.unwrap();
    assert!(page.departments.is_empty());
    assert!(page.trends.is_empty());
    assert_eq!(
        page.notices,
        vec![Notice::Error("Failed to load analytics".into())]
    );
    assert_eq!(session.invalidations(), 0);
}

#[tokio::test]
async fn one_unauthorized_fetch_ends_the_session_whatever_the_other_returns() {
    for other in [200, 500] {
        let (script, api) = setup();
        script
            .reply(Method::GET, "/api/analytics/department-distribution", 401, json!({"error": "Token has expired"}))
            .reply(Method::GET, "/api/analytics/monthly-trend", other, json!({"trends": []}));
        let mut session = signed_in(Role::Hr);

        let err = AnalyticsPage::load(&mut session, &api).await.unwrap_err();
        assert_eq!(err, Redirect::from(Navigation::Login), "trend status {other}");
        assert_eq!(session.invalidations(), 1, "trend status {other}");
        assert!(session.session().is_none());
    }
}

#[tokio::test]
async fn rejected_login_is_not_a_session_expiry() {
    let (script, api) = setup();
    script.reply(Method::POST, "/api/auth/login", 401, json!({"error": "Invalid credentials"}));

    let err = api
        .login(&LoginData {
            email: "a@b.co".into(),
            password: "nope".into(),
        })
        .await
        .unwrap_err();
    assert!(!err.is_unauthorized());
    assert_eq!(err.message_or("Login failed"), "Invalid credentials");
}

// ---------------------------------------------------------------------------
// Employees
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_filters_the_fetched_list() {
    let (script, api) = setup();
    script
        .reply(
            Method::GET,
            "/api/employees",
            200,
            json!({"employees": [employee_json(1, "Ada"), employee_json(2, "Grace")]}),
        )
        .reply(Method::GET, "/api/employees/options", 200, json!({"departments": ["Engineering"]}));
    let mut session = signed_in(Role::Hr);

    let page = EmployeesPage::load(&mut session, &api).await.unwrap();
    assert_eq!(page.employees.len(), 2);
    assert_eq!(page.visible("grace").len(), 1);
    assert_eq!(page.visible("EMP00").len(), 2);
    assert_eq!(page.options.departments, ["Engineering"]);
    assert!(page.can_edit());
    assert!(!page.can_delete());
}

#[tokio::test]
async fn hr_cannot_delete() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/employees", 200, json!({"employees": []}))
        .reply(Method::GET, "/api/employees/options", 200, json!({}));
    let mut session = signed_in(Role::Hr);

    let mut page = EmployeesPage::load(&mut session, &api).await.unwrap();
    assert!(!page.delete(&mut session, &api, 3).await.unwrap());
    assert_eq!(script.count(Method::DELETE, "/api/employees/3"), 0);
    assert_eq!(
        page.notices.last().map(Notice::text),
        Some("You do not have permission to perform this action")
    );
}

#[tokio::test]
async fn admin_delete_refetches_the_list() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/employees", 200, json!({"employees": [employee_json(3, "Ada")]}))
        .reply(Method::GET, "/api/employees/options", 200, json!({}))
        .reply(Method::DELETE, "/api/employees/3", 200, json!({"message": "Employee deleted"}));
    let mut session = signed_in(Role::Admin);

    let mut page = EmployeesPage::load(&mut session, &api).await.unwrap();
    assert!(page.delete(&mut session, &api, 3).await.unwrap());
    assert_eq!(script.count(Method::DELETE, "/api/employees/3"), 1);
    assert_eq!(script.count(Method::GET, "/api/employees"), 2);
    assert_eq!(
        page.notices,
        vec![Notice::Success("Employee deleted successfully".into())]
    );
}

#[tokio::test]
async fn employee_detail_shows_the_record() {
    let (script, api) = setup();
    script.reply(Method::GET, "/api/employees/3", 200, employee_json(3, "Ada"));
    let mut session = signed_in(Role::Hr);

    let page = EmployeePage::load(&mut session, &api, 3).await.unwrap();
    assert_eq!(page.employee.name, "Ada");
    assert_eq!(page.employee.employee_id, "EMP003");
    assert!(page.can_edit);
    assert!(!page.can_delete);
}

#[tokio::test]
async fn unknown_employee_returns_to_the_list() {
    let (script, api) = setup();
    script.reply(Method::GET, "/api/employees/404", 404, json!({"error": "Employee not found"}));
    let mut session = signed_in(Role::Admin);

    let err = EmployeePage::load(&mut session, &api, 404).await.unwrap_err();
    assert_eq!(
        err,
        Redirect {
            to: Navigation::Employees,
            notice: Some(Notice::Error("Employee not found".into())),
        }
    );
    assert_eq!(session.invalidations(), 0);
}

#[tokio::test]
async fn employee_detail_needs_a_live_session_and_the_right_role() {
    let (script, api) = setup();
    script.reply(Method::GET, "/api/employees/3", 401, json!({"error": "Token has expired"}));

    let mut session = signed_in(Role::Employee);
    let err = EmployeePage::load(&mut session, &api, 3).await.unwrap_err();
    assert_eq!(err.to, Navigation::Dashboard);
    assert!(script.sent().is_empty());

    let mut session = signed_in(Role::Hr);
    let err = EmployeePage::load(&mut session, &api, 3).await.unwrap_err();
    assert_eq!(err.to, Navigation::Login);
    assert_eq!(session.invalidations(), 1);
}

// ---------------------------------------------------------------------------
// Payroll
// ---------------------------------------------------------------------------

fn script_payroll(script: &Scripted) {
    script
        .reply(
            Method::GET,
            "/api/payroll/runs",
            200,
            json!({"payroll_runs": [{
                "id": 10, "employee_id": 1, "employee_name": "Ada",
                "month": 5, "year": 2024, "basic_salary": 5000.0,
                "deductions": 100.0, "net_salary": 4900.0, "status": "draft"
            }]}),
        )
        .reply(
            Method::GET,
            "/api/payroll/employees",
            200,
            json!({"employees": [employee_json(1, "Ada"), employee_json(2, "Grace")]}),
        );
}

#[tokio::test]
async fn payroll_lists_period_and_available_employees() {
    let (script, api) = setup();
    script_payroll(&script);
    let mut session = signed_in(Role::Admin);

    let page = PayrollPage::load(&mut session, &api, 5, 2024).await.unwrap();
    let runs_call = script
        .sent()
        .into_iter()
        .find(|s| s.path.starts_with("/api/payroll/runs"))
        .unwrap();
    assert_eq!(runs_call.path, "/api/payroll/runs?month=5&year=2024");

    let names: Vec<_> = page.available().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Grace"]);
    assert_eq!(page.visible("ada").len(), 1);
}

#[tokio::test]
async fn out_of_range_month_is_sent_as_given() {
    let (script, api) = setup();
    script_payroll(&script);
    let mut session = signed_in(Role::Admin);

    PayrollPage::load(&mut session, &api, 13, 2024).await.unwrap();
    let runs_call = script
        .sent()
        .into_iter()
        .find(|s| s.path.starts_with("/api/payroll/runs"))
        .unwrap();
    assert_eq!(runs_call.path, "/api/payroll/runs?month=13&year=2024");
}

#[tokio::test]
async fn bulk_create_reports_counts() {
    let (script, api) = setup();
    script_payroll(&script);
    script.reply(
        Method::POST,
        "/api/payroll/runs/bulk",
        201,
        json!({"message": "Bulk payroll created", "success_count": 1, "error_count": 2}),
    );
    let mut session = signed_in(Role::Admin);

    let mut page = PayrollPage::load(&mut session, &api, 5, 2024).await.unwrap();
    let outcome = page.bulk_create(&mut session, &api, 50.0).await.unwrap();
    assert_eq!(outcome.map(|o| o.success_count), Some(1));

    let bulk = script
        .sent()
        .into_iter()
        .find(|s| s.method == Method::POST)
        .unwrap();
    assert_eq!(
        bulk.body,
        Some(json!({"month": 5, "year": 2024, "default_deductions": 50.0}))
    );
    assert_eq!(
        page.notices,
        vec![
            Notice::Success("Bulk payroll created. 1 records created.".into()),
            Notice::Error("2 errors occurred".into()),
        ]
    );
    assert_eq!(script.count(Method::GET, "/api/payroll/runs"), 2);
}

#[tokio::test]
async fn create_run_requires_a_selected_employee() {
    let (script, api) = setup();
    script_payroll(&script);
    let mut session = signed_in(Role::Admin);

    let mut page = PayrollPage::load(&mut session, &api, 5, 2024).await.unwrap();
    assert!(!page.create_run(&mut session, &api, None, 0.0).await.unwrap());
    assert_eq!(
        page.notices,
        vec![Notice::Error("Please select an employee".into())]
    );
    assert_eq!(script.count(Method::POST, "/api/payroll/runs"), 0);
}

#[tokio::test]
async fn backend_message_surfaces_on_failed_process() {
    let (script, api) = setup();
    script_payroll(&script);
    script.reply(
        Method::POST,
        "/api/payroll/runs/10/process",
        400,
        json!({"error": "Payroll run already processed"}),
    );
    let mut session = signed_in(Role::Admin);

    let mut page = PayrollPage::load(&mut session, &api, 5, 2024).await.unwrap();
    assert!(!page.process(&mut session, &api, 10).await.unwrap());
    assert_eq!(
        page.notices,
        vec![Notice::Error("Payroll run already processed".into())]
    );
}

// ---------------------------------------------------------------------------
// Payslips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pdf_download_uses_disposition_filename() {
    let (script, api) = setup();
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"../slip_7.pdf\""),
    );
    script
        .reply(Method::GET, "/api/payslips", 200, json!({"payslips": []}))
        .reply_with(Method::GET, "/api/payslips/7/pdf", 200, headers, &b"%PDF-1.4"[..]);
    let mut session = signed_in(Role::Employee);
    let dir = tempfile::tempdir().unwrap();

    let mut page = PayslipsPage::load(&mut session, &api).await.unwrap();
    assert!(!page.all_employees);
    let path = page
        .download(&mut session, &api, 7, dir.path())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(path, dir.path().join("slip_7.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    assert_eq!(
        page.notices,
        vec![Notice::Success("PDF downloaded successfully".into())]
    );
}

#[tokio::test]
async fn pdf_download_falls_back_to_default_name() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/payslips", 200, json!({"payslips": []}))
        .reply_with(Method::GET, "/api/payslips/4/pdf", 200, HeaderMap::new(), &b"%PDF"[..]);
    let mut session = signed_in(Role::Admin);
    let dir = tempfile::tempdir().unwrap();

    let mut page = PayslipsPage::load(&mut session, &api).await.unwrap();
    assert!(page.all_employees);
    let path = page.download(&mut session, &api, 4, dir.path()).await.unwrap();
    assert_eq!(path, Some(dir.path().join("payslip_4.pdf")));
}

// ---------------------------------------------------------------------------
// Employee form
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_draft_is_not_sent() {
    let (script, api) = setup();
    let mut session = signed_in(Role::Hr);
    let mut form = EmployeeForm::create(EmployeeOptions::default());
    form.draft.email = "ada@example.com".into();

    assert!(!form.submit(&mut session, &api, today()).await.unwrap());
    assert_eq!(form.errors, ["Name is required"]);
    assert!(form.open);

    form.draft.name = "Ada".into();
    form.draft.employee_id = "EMP001".into();
    form.draft.basic_salary = 0.0;
    assert!(!form.submit(&mut session, &api, today()).await.unwrap());
    assert_eq!(form.errors, ["Please enter a valid salary greater than 0"]);

    form.draft.basic_salary = 4000.0;
    form.draft.hire_date = NaiveDate::from_ymd_opt(2024, 6, 2);
    assert!(!form.submit(&mut session, &api, today()).await.unwrap());
    assert_eq!(form.errors, ["Hire date cannot be in the future"]);

    assert!(script.sent().is_empty());
}

#[tokio::test]
async fn edit_submits_put_without_employee_id() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/employees/9", 200, employee_json(9, "Ada"))
        .reply(Method::GET, "/api/employees/options", 200, json!({}))
        .reply(Method::PUT, "/api/employees/9", 200, json!({"message": "Employee updated"}));
    let mut session = signed_in(Role::Admin);

    let mut form = EmployeeForm::load_for_edit(&mut session, &api, 9)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(form.mode(), FormMode::Edit { id: 9 });
    form.draft.position = "Lead".into();

    assert!(form.submit(&mut session, &api, today()).await.unwrap());
    assert!(!form.open);

    let put = script
        .sent()
        .into_iter()
        .find(|s| s.method == Method::PUT)
        .unwrap();
    let body = put.body.unwrap();
    assert!(body.get("employee_id").is_none());
    assert_eq!(body["position"], "Lead");
    assert_eq!(body["name"], "Ada");
}

#[tokio::test]
async fn edit_form_opens_with_a_notice_when_options_fail() {
    let (script, api) = setup();
    script
        .reply(Method::GET, "/api/employees/9", 200, employee_json(9, "Ada"))
        .reply(Method::GET, "/api/employees/options", 500, json!({"error": "boom"}));
    let mut session = signed_in(Role::Hr);

    let form = EmployeeForm::load_for_edit(&mut session, &api, 9)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(form.draft.name, "Ada");
    assert!(form.options.departments.is_empty());
    assert_eq!(
        form.notices,
        vec![Notice::Error("Failed to load employee options".into())]
    );
    assert_eq!(session.invalidations(), 0);
}

#[tokio::test]
async fn backend_validation_details_are_listed() {
    let (script, api) = setup();
    script.reply(
        Method::POST,
        "/api/employees",
        400,
        json!({"error": "Validation failed", "details": ["Email already exists", "Employee ID already exists"]}),
    );
    let mut session = signed_in(Role::Hr);
    let mut form = EmployeeForm::create(EmployeeOptions::default());
    form.draft.name = "Ada".into();
    form.draft.email = "ada@example.com".into();
    form.draft.employee_id = "EMP001".into();
    form.draft.basic_salary = 4000.0;

    assert!(!form.submit(&mut session, &api, today()).await.unwrap());
    assert_eq!(
        form.errors,
        ["Email already exists", "Employee ID already exists"]
    );
    assert!(form.open);
    assert_eq!(script.sent()[0].body.as_ref().unwrap()["employee_id"], "EMP001");
}

#[tokio::test]
async fn expired_session_during_submit_goes_to_login() {
    let (script, api) = setup();
    script.reply(Method::POST, "/api/employees", 401, json!({"error": "Token has expired"}));
    let mut session = signed_in(Role::Admin);
    let mut form = EmployeeForm::create(EmployeeOptions::default());
    form.draft.name = "Ada".into();
    form.draft.email = "ada@example.com".into();
    form.draft.employee_id = "EMP001".into();
    form.draft.basic_salary = 4000.0;

    let err = form.submit(&mut session, &api, today()).await.unwrap_err();
    assert_eq!(err.to, Navigation::Login);
    assert_eq!(session.invalidations(), 1);
}

#[tokio::test]
async fn employee_role_cannot_open_the_form() {
    let (script, api) = setup();
    let mut session = signed_in(Role::Employee);

    let err = EmployeeForm::load_for_edit(&mut session, &api, 9)
        .await
        .unwrap_err();
    assert_eq!(err.to, Navigation::Dashboard);
    assert!(script.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Session persistence
// ---------------------------------------------------------------------------

#[test]
fn file_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");
    let user = SessionUser {
        id: 5,
        email: "hr@example.com".into(),
        role: Role::Hr,
    };

    let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
    store.set_session("persisted".into(), user, None).unwrap();

    let reopened = SessionStore::open(FileStorage::new(&path)).unwrap();
    assert_eq!(reopened.token(), Some("persisted"));
    assert_eq!(reopened.user().map(|u| u.role), Some(Role::Hr));

    let mut reopened = reopened;
    reopened.invalidate();
    assert!(!path.exists());
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::employee::Employee;

// ---------------------------------------------------------------------------
// Payroll runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Draft,
    Processed,
    Cancelled,
}

/// One employee's payroll for a month. `net_salary` is computed by the
/// backend; the client never derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: i64,
    pub employee_id: i64,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub month: u32,
    pub year: i32,
    pub basic_salary: f64,
    #[serde(default)]
    pub deductions: f64,
    pub net_salary: f64,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayrollRunList {
    #[serde(default)]
    pub payroll_runs: Vec<PayrollRun>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u64,
    #[serde(default)]
    pub current_page: u64,
}

/// Body for `POST /api/payroll/runs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPayrollRun {
    pub employee_id: i64,
    pub month: u32,
    pub year: i32,
    pub deductions: f64,
}

/// Body for `POST /api/payroll/runs/bulk`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkPayrollRequest {
    pub month: u32,
    pub year: i32,
    pub default_deductions: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkPayrollOutcome {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
}

/// Employees that have no run yet for `month`/`year`: the set difference
/// between all employees and the (employee_id, month, year) triples of the
/// existing runs. Order of `employees` is preserved.
pub fn available_employees<'a>(
    employees: &'a [Employee],
    runs: &[PayrollRun],
    month: u32,
    year: i32,
) -> Vec<&'a Employee> {
    let taken: HashSet<(i64, u32, i32)> = runs
        .iter()
        .map(|r| (r.employee_id, r.month, r.year))
        .collect();

    employees
        .iter()
        .filter(|e| !taken.contains(&(e.id, month, year)))
        .collect()
}

// ---------------------------------------------------------------------------
// Payslips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Unpaid,
}

/// Finalized artifact of a processed run. Immutable from the client's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payslip {
    pub id: i64,
    pub employee_id: i64,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub payroll_run_id: i64,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    pub basic_salary: f64,
    #[serde(default)]
    pub total_allowances: f64,
    #[serde(default)]
    pub total_deductions: f64,
    #[serde(default)]
    pub tax: f64,
    pub gross_salary: f64,
    pub net_salary: f64,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayslipList {
    #[serde(default)]
    pub payslips: Vec<Payslip>,
}

/// Default download name when the backend sends no `Content-Disposition`.
pub fn default_payslip_filename(id: &str) -> String {
    format!("payslip_{}.pdf", id)
}

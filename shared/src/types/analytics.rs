use serde::{Deserialize, Serialize};

/// Dashboard totals. `Default` is the all-zero view shown when the summary
/// cannot be loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total_employees: u64,
    #[serde(default)]
    pub total_payroll: f64,
    #[serde(default)]
    pub total_payslips: u64,
    #[serde(default)]
    pub average_salary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentShare {
    pub department: String,
    pub employee_count: u64,
    pub total_salary: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentDistribution {
    #[serde(default)]
    pub departments: Vec<DepartmentShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub year: i32,
    pub month: u32,
    pub total_payroll: f64,
    pub employee_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendSeries {
    #[serde(default)]
    pub trends: Vec<MonthlyTrend>,
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Employee as returned by the backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Assigned at creation, never edited afterwards.
    pub employee_id: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Backend reports the current salary; `null` when none is on record.
    #[serde(default, alias = "current_salary")]
    pub basic_salary: Option<f64>,

    // Personal
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,

    // Employment
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub employment_type: Option<String>,

    // Emergency contact
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub emergency_contact_relationship: Option<String>,

    // Banking
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub bank_account: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeList {
    #[serde(default)]
    pub employees: Vec<Employee>,
}

/// Static option lists offered by `GET /api/employees/options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeOptions {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub positions: Vec<String>,
    #[serde(default)]
    pub employment_types: Vec<String>,
    #[serde(default)]
    pub genders: Vec<String>,
}

// ---------------------------------------------------------------------------
// Draft (form submission state)
// ---------------------------------------------------------------------------

/// Editable employee data shared by every section of the employee form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmployeeDraft {
    // Basic
    pub name: String,
    pub email: String,
    pub employee_id: String,
    pub phone: String,

    // Personal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gender: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,

    // Employment
    pub department: String,
    pub position: String,
    pub basic_salary: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub employment_type: String,

    // Emergency contact
    #[serde(skip_serializing_if = "String::is_empty")]
    pub emergency_contact_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub emergency_contact_phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub emergency_contact_relationship: String,

    // Banking
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bank_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bank_account: String,
}

impl From<&Employee> for EmployeeDraft {
    fn from(e: &Employee) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: e.name.clone(),
            email: e.email.clone(),
            employee_id: e.employee_id.clone(),
            phone: text(&e.phone),
            date_of_birth: e.date_of_birth,
            gender: text(&e.gender),
            address: text(&e.address),
            department: text(&e.department),
            position: text(&e.position),
            basic_salary: e.basic_salary.unwrap_or(0.0),
            hire_date: e.hire_date,
            employment_type: text(&e.employment_type),
            emergency_contact_name: text(&e.emergency_contact_name),
            emergency_contact_phone: text(&e.emergency_contact_phone),
            emergency_contact_relationship: text(&e.emergency_contact_relationship),
            bank_name: text(&e.bank_name),
            bank_account: text(&e.bank_account),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter a valid salary greater than 0")]
    NonPositiveSalary,

    #[error("{0} cannot be in the future")]
    FutureDate(&'static str),
}

impl EmployeeDraft {
    /// Shape and range checks run before any request is sent.
    /// Returns the first failing rule.
    pub fn validate(&self, today: NaiveDate) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::MissingField("Name"));
        }
        if self.email.trim().is_empty() {
            return Err(DraftError::MissingField("Email"));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(DraftError::InvalidEmail);
        }
        if self.employee_id.trim().is_empty() {
            return Err(DraftError::MissingField("Employee ID"));
        }
        // NaN fails this comparison too.
        if !(self.basic_salary > 0.0) {
            return Err(DraftError::NonPositiveSalary);
        }
        if self.date_of_birth.is_some_and(|d| d > today) {
            return Err(DraftError::FutureDate("Date of birth"));
        }
        if self.hire_date.is_some_and(|d| d > today) {
            return Err(DraftError::FutureDate("Hire date"));
        }
        Ok(())
    }

    /// Body for `POST /api/employees`.
    pub fn create_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Body for `PUT /api/employees/{id}`. `employee_id` is never sent on
    /// the update path.
    pub fn update_payload(&self) -> serde_json::Value {
        let mut value = self.create_payload();
        if let Some(map) = value.as_object_mut() {
            map.remove("employee_id");
        }
        value
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

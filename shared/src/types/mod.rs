pub mod analytics;
pub mod employee;
pub mod json_error;
pub mod payroll;
pub mod role;
pub mod server_config;
pub mod session;

pub use self::analytics::{DepartmentDistribution, DepartmentShare, MonthlyTrend, Summary, TrendSeries};
pub use self::employee::{DraftError, Employee, EmployeeDraft, EmployeeList, EmployeeOptions};
pub use self::json_error::{BackendError, ErrorResponse};
pub use self::payroll::{
    BulkPayrollOutcome, BulkPayrollRequest, NewPayrollRun, PaymentStatus, PayrollRun,
    PayrollRunList, Payslip, PayslipList, RunStatus, available_employees, default_payslip_filename,
};
pub use self::role::{Authorizer, Capability, NavItem, Page, Role};
pub use self::session::{
    LoginData, LoginResponse, RegistrationData, Session, SessionEmployee, SessionUser,
};
pub use self::server_config::{
    AppConfig, BackendConfig, ConfigError, PathsConfig, ServerConfig, SessionConfig,
};

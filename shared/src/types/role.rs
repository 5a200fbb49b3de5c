use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role attached to the session user.
///
/// Unknown role strings deserialize to [`Role::Employee`], the least
/// privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "hr" => Role::Hr,
            _ => Role::Employee,
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewDashboard,
    ViewEmployees,
    ManageEmployees,
    DeleteEmployees,
    ViewPayroll,
    ManagePayroll,
    ViewPayslips,
    ViewAllPayslips,
    ViewAnalytics,
}

/// Every capability granted to each role. This table is the only place role
/// permissions are defined; navigation and page gating are derived from it.
const CAPABILITY_TABLE: &[(Role, &[Capability])] = &[
    (
        Role::Admin,
        &[
            Capability::ViewDashboard,
            Capability::ViewEmployees,
            Capability::ManageEmployees,
            Capability::DeleteEmployees,
            Capability::ViewPayroll,
            Capability::ManagePayroll,
            Capability::ViewPayslips,
            Capability::ViewAllPayslips,
            Capability::ViewAnalytics,
        ],
    ),
    (
        Role::Hr,
        &[
            Capability::ViewDashboard,
            Capability::ViewEmployees,
            Capability::ManageEmployees,
            Capability::ViewPayroll,
            Capability::ViewPayslips,
            Capability::ViewAllPayslips,
            Capability::ViewAnalytics,
        ],
    ),
    (
        Role::Employee,
        &[Capability::ViewDashboard, Capability::ViewPayslips],
    ),
];

// ---------------------------------------------------------------------------
// Pages and navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Dashboard,
    Employees,
    Payroll,
    Payslips,
    Analytics,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Dashboard,
        Page::Employees,
        Page::Payroll,
        Page::Payslips,
        Page::Analytics,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Page::Dashboard => "/dashboard",
            Page::Employees => "/employees",
            Page::Payroll => "/payroll",
            Page::Payslips => "/payslips",
            Page::Analytics => "/analytics",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Employees => "Employees",
            Page::Payroll => "Payroll",
            Page::Payslips => "Payslips",
            Page::Analytics => "Analytics",
        }
    }

    /// Capability required to open the page at all.
    pub fn required(&self) -> Capability {
        match self {
            Page::Dashboard => Capability::ViewDashboard,
            Page::Employees => Capability::ViewEmployees,
            Page::Payroll => Capability::ViewPayroll,
            Page::Payslips => Capability::ViewPayslips,
            Page::Analytics => Capability::ViewAnalytics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

/// Central role check consulted by every page.
///
/// Client-side gating is a convenience: the backend re-validates the token
/// and role on every request.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer {
    role: Role,
}

impl Authorizer {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        CAPABILITY_TABLE
            .iter()
            .find(|(role, _)| *role == self.role)
            .map(|(_, caps)| *caps)
            .unwrap_or(&[])
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn can_open(&self, page: Page) -> bool {
        self.allows(page.required())
    }

    /// Navigation links visible to this role, in display order.
    pub fn nav_items(&self) -> Vec<NavItem> {
        Page::ALL
            .iter()
            .filter(|page| self.can_open(**page))
            .map(|page| NavItem {
                href: page.path(),
                label: page.label(),
            })
            .collect()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::role::{Authorizer, Role};

// ---------------------------------------------------------------------------
// Login wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

/// Successful login body returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: SessionUser,
    #[serde(default)]
    pub employee: Option<SessionEmployee>,
}

/// Registration payload. `employee` is only sent for hr/employee accounts.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationData {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<SessionEmployee>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEmployee {
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
    pub employee_id: String,
}

/// Everything the client keeps between commands. There is no expiry: a
/// stale token is only discovered by the next 401.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    #[serde(default)]
    pub employee: Option<SessionEmployee>,
}

impl Session {
    pub fn authorizer(&self) -> Authorizer {
        Authorizer::new(self.user.role)
    }
}

impl From<LoginResponse> for Session {
    fn from(login: LoginResponse) -> Self {
        Self {
            token: login.access_token,
            user: login.user,
            employee: login.employee,
        }
    }
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("employee", &self.employee)
            .finish()
    }
}

impl fmt::Display for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.email, self.role)
    }
}

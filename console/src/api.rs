use std::future::Future;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, HeaderMap, LOCATION};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use shared::types::*;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The gateway or backend answered 401.
    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("{} ({status})", .error.message_or("request failed"))]
    Backend {
        status: StatusCode,
        error: BackendError,
    },

    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not build request: {0}")]
    Request(#[from] http::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Message for a notice: the backend's own text, or `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ApiError::Backend { error, .. } => error.message_or(fallback),
            _ => fallback.to_string(),
        }
    }

    /// Field-level validation failures, when the backend sent a list.
    pub fn details(&self) -> Option<&[String]> {
        match self {
            ApiError::Backend { error, .. } => error.validation_details(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path_and_query: String,
    pub token: Option<String>,
    pub cookie: Option<String>,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            token: None,
            cookie: None,
            body: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends one request to the gateway.
pub trait Transport {
    fn send(&self, req: ApiRequest) -> impl Future<Output = Result<ApiResponse, ApiError>> + Send;
}

/// HTTP/1 transport to a running gateway.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
}

impl HyperTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Transport for HyperTransport {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = Request::builder()
            .method(req.method.clone())
            .uri(format!("{}{}", self.base_url, req.path_and_query))
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &req.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = &req.cookie {
            builder = builder.header(COOKIE, cookie.as_str());
        }
        let request = builder.body(Full::new(req.body.unwrap_or_default()))?;

        debug!("{} {}", req.method, req.path_and_query);

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .to_bytes();

        Ok(ApiResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A downloaded binary document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub filename: String,
    pub bytes: Bytes,
}

/// Answer to a plain page request, used to check the page guard.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnswer {
    pub status: StatusCode,
    pub location: Option<String>,
}

/// Typed calls to the gateway's `/api` surface.
#[derive(Debug, Clone)]
pub struct ApiClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn exchange(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.send(req).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !response.status.is_success() {
            return Err(ApiError::Backend {
                status: response.status,
                error: BackendError::from_slice(&response.body),
            });
        }
        Ok(response)
    }

    async fn fetch<R: DeserializeOwned>(&self, req: ApiRequest) -> Result<R, ApiError> {
        let response = self.exchange(req).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn get(token: &str, path: impl Into<String>) -> ApiRequest {
        ApiRequest::new(Method::GET, path).bearer(token)
    }

    // ── Auth ─────────────────────────────────────────────────────────────────

    /// Wrong credentials are a backend rejection, not an expired session.
    pub async fn login(&self, data: &LoginData) -> Result<LoginResponse, ApiError> {
        let req = ApiRequest::new(Method::POST, "/api/auth/login").json(data)?;
        let response = self.transport.send(req).await?;
        if !response.status.is_success() {
            return Err(ApiError::Backend {
                status: response.status,
                error: BackendError::from_slice(&response.body),
            });
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn register(&self, data: &RegistrationData) -> Result<serde_json::Value, ApiError> {
        let req = ApiRequest::new(Method::POST, "/api/auth/register").json(data)?;
        self.fetch(req).await
    }

    pub async fn me(&self, token: &str) -> Result<serde_json::Value, ApiError> {
        self.fetch(Self::get(token, "/api/auth/me")).await
    }

    // ── Analytics ────────────────────────────────────────────────────────────

    pub async fn summary(&self, token: &str) -> Result<Summary, ApiError> {
        self.fetch(Self::get(token, "/api/analytics/summary")).await
    }

    pub async fn department_distribution(
        &self,
        token: &str,
    ) -> Result<DepartmentDistribution, ApiError> {
        self.fetch(Self::get(token, "/api/analytics/department-distribution"))
            .await
    }

    pub async fn monthly_trend(&self, token: &str) -> Result<TrendSeries, ApiError> {
        self.fetch(Self::get(token, "/api/analytics/monthly-trend"))
            .await
    }

    // ── Employees ────────────────────────────────────────────────────────────

    pub async fn employees(&self, token: &str) -> Result<EmployeeList, ApiError> {
        self.fetch(Self::get(token, "/api/employees")).await
    }

    pub async fn employee(&self, token: &str, id: i64) -> Result<Employee, ApiError> {
        self.fetch(Self::get(token, format!("/api/employees/{id}")))
            .await
    }

    pub async fn employee_options(&self, token: &str) -> Result<EmployeeOptions, ApiError> {
        self.fetch(Self::get(token, "/api/employees/options")).await
    }

    pub async fn create_employee(
        &self,
        token: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let req = ApiRequest::new(Method::POST, "/api/employees")
            .bearer(token)
            .json(payload)?;
        self.fetch(req).await
    }

    pub async fn update_employee(
        &self,
        token: &str,
        id: i64,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let req = ApiRequest::new(Method::PUT, format!("/api/employees/{id}"))
            .bearer(token)
            .json(payload)?;
        self.fetch(req).await
    }

    pub async fn delete_employee(&self, token: &str, id: i64) -> Result<(), ApiError> {
        let req = ApiRequest::new(Method::DELETE, format!("/api/employees/{id}")).bearer(token);
        self.exchange(req).await.map(|_| ())
    }

    // ── Payroll ──────────────────────────────────────────────────────────────

    /// Month and year are passed through as given; the backend filters.
    pub async fn payroll_runs(
        &self,
        token: &str,
        month: u32,
        year: i32,
    ) -> Result<PayrollRunList, ApiError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("month", &month.to_string())
            .append_pair("year", &year.to_string())
            .finish();
        self.fetch(Self::get(token, format!("/api/payroll/runs?{query}")))
            .await
    }

    pub async fn payroll_employees(&self, token: &str) -> Result<EmployeeList, ApiError> {
        self.fetch(Self::get(token, "/api/payroll/employees")).await
    }

    pub async fn create_run(
        &self,
        token: &str,
        run: &NewPayrollRun,
    ) -> Result<serde_json::Value, ApiError> {
        let req = ApiRequest::new(Method::POST, "/api/payroll/runs")
            .bearer(token)
            .json(run)?;
        self.fetch(req).await
    }

    pub async fn process_run(&self, token: &str, id: i64) -> Result<serde_json::Value, ApiError> {
        let req = ApiRequest::new(Method::POST, format!("/api/payroll/runs/{id}/process"))
            .bearer(token)
            .json(&serde_json::json!({}))?;
        self.fetch(req).await
    }

    pub async fn bulk_runs(
        &self,
        token: &str,
        request: &BulkPayrollRequest,
    ) -> Result<BulkPayrollOutcome, ApiError> {
        let req = ApiRequest::new(Method::POST, "/api/payroll/runs/bulk")
            .bearer(token)
            .json(request)?;
        self.fetch(req).await
    }

    // ── Payslips ─────────────────────────────────────────────────────────────

    pub async fn payslips(&self, token: &str) -> Result<PayslipList, ApiError> {
        self.fetch(Self::get(token, "/api/payslips")).await
    }

    pub async fn payslip_pdf(&self, token: &str, id: i64) -> Result<Document, ApiError> {
        let response = self
            .exchange(Self::get(token, format!("/api/payslips/{id}/pdf")))
            .await?;

        let filename = response
            .headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| default_payslip_filename(&id.to_string()));

        Ok(Document {
            filename,
            bytes: response.body,
        })
    }

    // ── Pages ────────────────────────────────────────────────────────────────

    /// Request a page the way a browser would, with the session cookie.
    pub async fn fetch_page(
        &self,
        path: &str,
        cookie: Option<String>,
    ) -> Result<PageAnswer, ApiError> {
        let mut req = ApiRequest::new(Method::GET, path);
        req.cookie = cookie;
        let response = self.transport.send(req).await?;
        Ok(PageAnswer {
            status: response.status,
            location: response
                .headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

/// `filename` from a `Content-Disposition` value, quotes removed. Any
/// directory part is dropped.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').find_map(|part| {
        let (key, val) = part.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| val.trim().trim_matches('"'))
    })?;
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

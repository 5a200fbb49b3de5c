//! Terminal client for the payroll gateway: session handling, page
//! controllers and the employee form.

pub mod api;
pub mod form;
pub mod pages;
pub mod session;

pub use api::{ApiClient, ApiError, HyperTransport, Transport};
pub use session::{FileStorage, MemoryStorage, Navigation, SessionStorage, SessionStore};

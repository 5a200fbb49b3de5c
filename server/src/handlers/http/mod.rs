pub mod auth;
pub mod guard;
pub mod routes;
pub mod utils;

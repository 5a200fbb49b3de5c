//! Types shared by the payroll gateway and the console client.

pub mod config;
pub mod types;

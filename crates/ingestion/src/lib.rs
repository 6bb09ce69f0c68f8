//! Offline World Bank loader for the WDI dashboard database.

pub mod api_client;
pub mod loader;
pub mod topics;

pub use api_client::{ApiError, RetryPolicy, WorldBankClient};
pub use loader::{LoadConfig, LoadReport, Loader};

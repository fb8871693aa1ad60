//! Remote catalog access
//!
//! [`RemoteCatalog`] is the write interface the import pipeline depends on;
//! [`ErpNextClient`] implements it over the ERPNext REST API.

pub mod client;
pub mod constants;
pub mod error;
pub mod remote;
pub mod resilience;

pub use client::ErpNextClient;
pub use error::RemoteError;
pub use remote::{RecordFields, RemoteCatalog};
pub use resilience::{Retryable, RetryConfig, RetryPolicy, RetryableError};

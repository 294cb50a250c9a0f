//! Rankify API client module
//!
//! HTTP client for the bulk-create and category endpoints of the Rankify
//! backend. [`ApiClient`] is also the production [`crate::sink::UploadSink`].

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
pub use types::*;

//! # API Shared
//!
//! Shared definitions for the CareLink APIs.
//!
//! Contains:
//! - Request and response types (`dto` module) with OpenAPI schemas
//! - Conversions from request bodies into core service inputs
//! - Shared services like `HealthService`
//! - Authentication helpers for bearer tokens and client origin headers
//!
//! Used by `api-rest` and the `carelink` CLI.

pub mod auth;
pub mod dto;
pub mod health;
pub mod parse;

pub use dto::*;
pub use health::HealthService;

//! Record identifiers and document numbers.
//!
//! Every CareLink entity is keyed by a *canonical* UUID: **32 lowercase hexadecimal
//! characters** (no hyphens), the same value produced by `Uuid::new_v4().simple()`.
//! Externally supplied identifiers (path segments, CLI arguments) must already be canonical;
//! hyphenated or uppercase forms are rejected rather than normalised.
//!
//! Alongside record ids this crate issues the human-readable numbers printed on documents:
//! - invoice numbers: `INV-YYYYMMDD-NNNN`
//! - payment transaction ids: `TXN` followed by 8 uppercase hex characters

mod service;

pub use service::{InvoiceNumber, RecordId, TransactionId};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;

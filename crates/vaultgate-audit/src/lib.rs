//! # Vaultgate Audit
//!
//! Append-only JSONL audit trail for the gateway. One [`entry::AuditEntry`]
//! per pipeline outcome, one compact JSON line per entry, rotated by size
//! and age, queryable with filters and pagination, and cleaned up past a
//! retention horizon.
//!
//! The entry schema is deliberately closed: nothing beyond
//! `{timestamp, secretId, action, outcome, reason, domain, method}` can be
//! serialized, so neither secret values nor environment variable names can
//! reach disk through this crate.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{AuditEntry, Outcome};
pub use error::AuditError;
pub use store::{AuditPage, AuditQuery, AuditStore};

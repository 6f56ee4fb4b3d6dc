//! Audit sink for the fund distribution ledger.
//!
//! Every state change in the distribution core is mirrored by an immutable
//! [`AuditEvent`]. The sink is external to the core and may fail; the core
//! treats a failed append as a failed operation. This crate provides:
//! - The [`AuditLog`] trait boundary
//! - [`AuditEvent`] records with BLAKE3 integrity hashes
//! - [`InMemoryAuditLog`] for tests and embedding
//! - [`FileAuditLog`], a crash-recoverable append-only file sink

pub mod error;
pub mod event;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::AuditError;
pub use event::{AuditEvent, EventId, EventKind};
pub use file::FileAuditLog;
pub use memory::InMemoryAuditLog;
pub use traits::{AuditLog, AuditReceipt};

//! Foundation types for the fund distribution ledger.
//!
//! Every other crate in the workspace depends on `fund-types`.
//!
//! # Key Types
//!
//! - [`Address`]: 32-byte account identifier derived from a principal label
//! - [`BlockHeight`]: Host-supplied block index used for voting windows
//! - [`VotingWindow`]: Half-open `[start, end)` block range
//! - [`ProjectId`] / [`ProposalId`]: Monotonic record identifiers (always >= 1)
//! - [`Amount`]: A quantity of the single fungible unit of value

pub mod address;
pub mod block;
pub mod error;
pub mod ids;

pub use address::Address;
pub use block::{BlockHeight, VotingWindow};
pub use error::TypeError;
pub use ids::{ProjectId, ProposalId};

/// A quantity of the ledger's single fungible unit of value.
pub type Amount = u64;

//! Value transfer boundary for the fund distribution ledger.
//!
//! The distribution core never touches balances directly. It moves value
//! through the [`ValueTransfer`] trait, which must apply each transfer
//! atomically and leave no partial effect on failure. This crate provides:
//! - The `ValueTransfer` trait boundary
//! - [`TransferReceipt`] records with hash-linked integrity
//! - [`InMemoryBalances`], a complete implementation for tests and embedding

pub mod error;
pub mod memory;
pub mod receipt;
pub mod traits;

pub use error::LedgerError;
pub use memory::InMemoryBalances;
pub use receipt::{TransferKind, TransferReceipt};
pub use traits::ValueTransfer;

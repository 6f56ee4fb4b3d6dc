//! Voter eligibility boundary for the fund distribution ledger.
//!
//! The governance directory that decides who may vote lives outside the
//! distribution core. The core only asks one question of it, through the
//! [`VoterRegistry`] trait. [`InMemoryVoterRegistry`] is a complete
//! implementation for tests and embedding.

pub mod memory;
pub mod traits;

pub use memory::InMemoryVoterRegistry;
pub use traits::VoterRegistry;

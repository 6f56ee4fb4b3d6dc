//! Distribution core for the fund distribution ledger.
//!
//! Admin-registered projects receive funds through time-boxed proposals.
//! Eligible voters cast one vote each inside a block-height window, and an
//! approved proposal releases its amount exactly once, never beyond the
//! project's allocation. Every state change is mirrored to an external audit
//! sink; a failed append fails the call.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fund_audit::InMemoryAuditLog;
//! use fund_core::{CallContext, DistributorConfig, FundDistributor, ProjectStatus};
//! use fund_ledger::{InMemoryBalances, ValueTransfer};
//! use fund_types::Address;
//! use fund_voters::InMemoryVoterRegistry;
//!
//! let admin = Address::derive("ST1ADMIN");
//! let recipient = Address::derive("ST1RECIPIENT");
//! let config = DistributorConfig::new(admin);
//!
//! let balances = Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
//! balances.credit(&admin, 1_000).unwrap();
//! let voters = Arc::new(InMemoryVoterRegistry::with_voters(
//!     config.governance_contract.clone(),
//!     [admin],
//! ));
//! let audit = Arc::new(InMemoryAuditLog::new(config.audit_logger_contract.clone()));
//! let distributor = FundDistributor::new(config, balances.clone(), voters, audit).unwrap();
//!
//! let project = distributor
//!     .register_project(CallContext::new(admin, 0), recipient, "well", vec![], ProjectStatus::Active)
//!     .unwrap();
//! distributor.set_allocation(CallContext::new(admin, 0), project.get(), 500).unwrap();
//! let proposal = distributor
//!     .propose_distribution(CallContext::new(admin, 0), project.get(), 500)
//!     .unwrap();
//! distributor.vote_on_proposal(CallContext::new(admin, 1), proposal.get(), true).unwrap();
//! distributor.execute_distribution(CallContext::new(admin, 145), proposal.get()).unwrap();
//!
//! assert_eq!(balances.balance_of(&recipient).unwrap(), 500);
//! ```

pub mod config;
pub mod context;
pub mod distributor;
pub mod error;
pub mod executor;
pub mod project;
pub mod proposal;
pub mod validation;
pub mod voting;

pub use config::{ConfigError, DistributorConfig, ProposerPolicy};
pub use context::CallContext;
pub use distributor::FundDistributor;
pub use error::{DistributorError, Result};
pub use executor::{DistributionExecutor, ReleaseCheck, ReleaseContext, ReleasePlan};
pub use project::{Milestone, Project, ProjectRegistry, ProjectStatus};
pub use proposal::{Proposal, ProposalStatus, ProposalStore};
pub use voting::Ballot;

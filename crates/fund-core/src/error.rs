use fund_audit::AuditError;
use fund_ledger::LedgerError;
use fund_types::{Amount, BlockHeight, ProjectId, ProposalId};

use crate::config::ConfigError;

/// Every way a distribution call can fail.
///
/// Each variant maps to one stable numeric [`code`](DistributorError::code)
/// so callers can branch on the outcome without matching on payloads. A
/// returned error means the call changed nothing, except a `TransferFailed`
/// from an execution whose reversal failed: that release stays committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributorError {
    // -- authorization --------------------------------------------------
    #[error("caller is not authorized for this operation")]
    NotAuthorized,

    #[error("voter registry {found:?} does not match governance contract {expected:?}")]
    GovernanceNotVerified { expected: String, found: String },

    #[error("value ledger {found:?} does not match escrow contract {expected:?}")]
    EscrowNotVerified { expected: String, found: String },

    // -- validation -----------------------------------------------------
    #[error("invalid address: the null address cannot receive funds")]
    InvalidAddress,

    #[error("invalid description: {0}")]
    InvalidDescription(String),

    #[error("invalid milestone: {0}")]
    InvalidMilestone(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid percentage")]
    InvalidPercentage,

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid project id: identifiers start at 1")]
    InvalidProjectId,

    #[error("invalid proposal id: identifiers start at 1")]
    InvalidProposalId,

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    // -- lifecycle ------------------------------------------------------
    #[error("{0} already exists")]
    ProjectAlreadyExists(ProjectId),

    #[error("{0} not found")]
    ProjectNotFound(ProjectId),

    #[error("{0} not found")]
    ProposalNotFound(ProposalId),

    #[error("{0} has already been executed")]
    ProposalAlreadyExecuted(ProposalId),

    // -- fund state -----------------------------------------------------
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("allocation exceeded: requested {requested}, remaining {remaining}")]
    AllocationExceeded { requested: Amount, remaining: Amount },

    #[error("milestones not achieved: release would reach {required}, achieved milestones cover {achieved}")]
    MilestoneNotAchieved { required: Amount, achieved: Amount },

    #[error("distribution not approved: {votes_for} for, {votes_against} against")]
    DistributionNotApproved { votes_for: u64, votes_against: u64 },

    // -- voting ---------------------------------------------------------
    #[error("invalid vote: {0}")]
    InvalidVote(String),

    #[error("voting period ended at {end}")]
    VotingPeriodEnded { end: BlockHeight },

    #[error("voting period active until {end}")]
    VotingPeriodActive { end: BlockHeight },

    // -- capacity -------------------------------------------------------
    #[error("maximum number of projects ({max}) reached")]
    MaxProjectsExceeded { max: u64 },

    // -- infrastructure -------------------------------------------------
    #[error("audit logging failed: {0}")]
    LoggingFailed(String),

    #[error("value transfer failed: {0}")]
    TransferFailed(String),

    #[error("distributor state lock poisoned")]
    StatePoisoned,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DistributorError {
    /// Stable numeric code for this error.
    pub fn code(&self) -> u32 {
        match self {
            Self::NotAuthorized => 100,
            Self::InvalidProjectId => 101,
            Self::InvalidAddress => 102,
            Self::InvalidDescription(_) => 103,
            Self::InvalidMilestone(_) => 104,
            Self::InvalidAmount(_) => 105,
            Self::ProjectAlreadyExists(_) => 106,
            Self::ProjectNotFound(_) => 107,
            Self::InsufficientFunds { .. } => 108,
            Self::MilestoneNotAchieved { .. } => 109,
            Self::DistributionNotApproved { .. } => 111,
            Self::InvalidVote(_) => 112,
            Self::VotingPeriodEnded { .. } => 113,
            Self::VotingPeriodActive { .. } => 114,
            Self::MaxProjectsExceeded { .. } => 115,
            Self::InvalidTimestamp(_) => 116,
            Self::InvalidPercentage => 117,
            Self::AllocationExceeded { .. } => 118,
            Self::InvalidStatus(_) => 119,
            Self::LoggingFailed(_) => 120,
            Self::GovernanceNotVerified { .. } => 121,
            Self::EscrowNotVerified { .. } => 122,
            Self::InvalidProposalId => 123,
            Self::ProposalNotFound(_) => 124,
            Self::ProposalAlreadyExecuted(_) => 125,
            Self::StatePoisoned => 126,
            Self::TransferFailed(_) => 127,
            Self::Config(_) => 128,
        }
    }
}

impl From<LedgerError> for DistributorError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientFunds {
                balance, requested, ..
            } => Self::InsufficientFunds { balance, requested },
            other => Self::TransferFailed(other.to_string()),
        }
    }
}

impl From<AuditError> for DistributorError {
    fn from(error: AuditError) -> Self {
        Self::LoggingFailed(error.to_string())
    }
}

/// Convenience alias used throughout the distribution core.
pub type Result<T> = std::result::Result<T, DistributorError>;

//! Proposal store: distribution proposals and the votes cast on them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fund_types::{Address, Amount, BlockHeight, ProjectId, ProposalId, VotingWindow};
use fund_voters::VoterRegistry;

use crate::config::{DistributorConfig, ProposerPolicy};
use crate::context::CallContext;
use crate::error::{DistributorError, Result};
use crate::project::{Project, ProjectStatus};
use crate::validation;

/// Where a proposal stands at a given block height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalStatus {
    /// The voting window is still open.
    Voting,
    /// The window closed with more votes for than against.
    Approved,
    /// The window closed without a majority for. Terminal.
    Rejected,
    /// Funds were released. Terminal.
    Executed,
}

/// A time-boxed request to release `amount` to a project.
///
/// `executed` moves from `false` to `true` exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub project_id: ProjectId,
    pub amount: Amount,
    pub proposer: Address,
    pub votes_for: u64,
    pub votes_against: u64,
    pub window: VotingWindow,
    pub executed: bool,
}

impl Proposal {
    pub fn start_block(&self) -> BlockHeight {
        self.window.start()
    }

    pub fn end_block(&self) -> BlockHeight {
        self.window.end()
    }

    /// Strict majority of votes cast.
    pub fn is_approved(&self) -> bool {
        self.votes_for > self.votes_against
    }

    pub fn status(&self, now: BlockHeight) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if !self.window.has_closed_at(now) {
            ProposalStatus::Voting
        } else if self.is_approved() {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        }
    }
}

impl ProposerPolicy {
    /// Returns `true` if `caller` may open a proposal under this policy.
    pub fn permits(
        &self,
        config: &DistributorConfig,
        voters: &dyn VoterRegistry,
        caller: &Address,
    ) -> bool {
        match self {
            Self::AdminOnly => *caller == config.admin,
            Self::AdminOrVoter => *caller == config.admin || voters.is_eligible_voter(caller),
            Self::Anyone => true,
        }
    }
}

/// Exclusive owner of proposal and vote records.
#[derive(Debug)]
pub struct ProposalStore {
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: BTreeMap<(ProposalId, Address), bool>,
    next_id: u64,
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: BTreeMap::new(),
            votes: BTreeMap::new(),
            next_id: ProposalId::FIRST.get(),
        }
    }

    /// The id the next proposal will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn get(&self, id: ProposalId) -> Result<&Proposal> {
        self.proposals
            .get(&id)
            .ok_or(DistributorError::ProposalNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: ProposalId) -> Result<&mut Proposal> {
        self.proposals
            .get_mut(&id)
            .ok_or(DistributorError::ProposalNotFound(id))
    }

    /// All proposals against `project`, in id order.
    pub fn for_project(&self, project: ProjectId) -> Vec<Proposal> {
        self.proposals
            .values()
            .filter(|p| p.project_id == project)
            .cloned()
            .collect()
    }

    /// The recorded choice of `voter` on `proposal`, if any.
    pub fn vote_of(&self, proposal: ProposalId, voter: &Address) -> Option<bool> {
        self.votes.get(&(proposal, *voter)).copied()
    }

    pub(crate) fn insert_vote(&mut self, proposal: ProposalId, voter: Address, support: bool) {
        self.votes.insert((proposal, voter), support);
    }

    /// Validate a new proposal against `project` and build the record.
    ///
    /// The caller is responsible for the proposer-policy check and for
    /// resolving `project`; this covers the budget and window rules.
    pub fn plan_proposal(
        &self,
        config: &DistributorConfig,
        ctx: &CallContext,
        project: &Project,
        amount: Amount,
    ) -> Result<Proposal> {
        if project.status != ProjectStatus::Active {
            return Err(DistributorError::InvalidStatus(format!(
                "{} is {}",
                project.id, project.status
            )));
        }
        validation::positive_amount(amount)?;
        project.check_release(amount)?;

        let window = VotingWindow::open(ctx.block_height, config.voting_period).ok_or_else(|| {
            DistributorError::InvalidTimestamp(format!(
                "voting window from {} overflows the block range",
                ctx.block_height
            ))
        })?;

        Ok(Proposal {
            id: validation::proposal_id(self.next_id)?,
            project_id: project.id,
            amount,
            proposer: ctx.caller,
            votes_for: 0,
            votes_against: 0,
            window,
            executed: false,
        })
    }

    /// Store a proposal produced by [`Self::plan_proposal`].
    pub fn insert(&mut self, proposal: Proposal) {
        self.next_id = proposal.id.get().saturating_add(1);
        self.proposals.insert(proposal.id, proposal);
    }
}

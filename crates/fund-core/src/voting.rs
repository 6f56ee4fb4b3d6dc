//! Voting engine: one vote per address per proposal, inside the window.
//!
//! Tallies are pure counts. A lopsided early tally never closes the window;
//! the outcome is only read once the window has run to its end block.

use fund_types::{Address, ProposalId};
use fund_voters::VoterRegistry;

use crate::context::CallContext;
use crate::error::{DistributorError, Result};
use crate::proposal::ProposalStore;

/// A validated vote, ready to be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub proposal_id: ProposalId,
    pub voter: Address,
    pub support: bool,
}

/// Validate a vote by `ctx.caller` on `proposal_id`.
///
/// Checks, first failure wins:
/// 1. the proposal exists
/// 2. it has not been executed
/// 3. the voting window is still open
/// 4. the caller is an eligible voter
/// 5. the caller has not voted on it before
pub fn check_ballot(
    store: &ProposalStore,
    voters: &dyn VoterRegistry,
    ctx: &CallContext,
    proposal_id: ProposalId,
    support: bool,
) -> Result<Ballot> {
    let proposal = store.get(proposal_id)?;

    if proposal.executed {
        return Err(DistributorError::ProposalAlreadyExecuted(proposal_id));
    }
    if proposal.window.has_closed_at(ctx.block_height) {
        return Err(DistributorError::VotingPeriodEnded {
            end: proposal.end_block(),
        });
    }
    if !voters.is_eligible_voter(&ctx.caller) {
        return Err(DistributorError::NotAuthorized);
    }
    if store.vote_of(proposal_id, &ctx.caller).is_some() {
        return Err(DistributorError::InvalidVote(format!(
            "{} has already voted on {proposal_id}",
            ctx.caller
        )));
    }

    Ok(Ballot {
        proposal_id,
        voter: ctx.caller,
        support,
    })
}

/// Count a ballot produced by [`check_ballot`] and record the voter.
///
/// The tally and the vote record change together or not at all.
pub fn apply_ballot(store: &mut ProposalStore, ballot: &Ballot) -> Result<()> {
    if store.vote_of(ballot.proposal_id, &ballot.voter).is_some() {
        return Err(DistributorError::InvalidVote(format!(
            "{} has already voted on {}",
            ballot.voter, ballot.proposal_id
        )));
    }

    let proposal = store.get_mut(ballot.proposal_id)?;
    let counter = if ballot.support {
        &mut proposal.votes_for
    } else {
        &mut proposal.votes_against
    };
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| DistributorError::InvalidVote("tally overflow".into()))?;

    store.insert_vote(ballot.proposal_id, ballot.voter, ballot.support);
    Ok(())
}

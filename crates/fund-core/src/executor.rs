//! Distribution executor: the release-check pipeline and the commit step.
//!
//! A release is planned against a snapshot of the registry and store, the
//! value transfer happens outside this module, and [`commit_release`] then
//! applies the released-total update and the executed flag together.

use fund_types::{Address, Amount, BlockHeight, ProjectId, ProposalId};

use crate::error::{DistributorError, Result};
use crate::project::{Project, ProjectRegistry};
use crate::proposal::{Proposal, ProposalStore};

// ---------------------------------------------------------------------------
// ReleaseCheck
// ---------------------------------------------------------------------------

/// What every release check gets to look at.
pub struct ReleaseContext<'a> {
    pub proposal: &'a Proposal,
    /// `None` when the referenced project no longer resolves.
    pub project: Option<&'a Project>,
    pub now: BlockHeight,
}

/// A single precondition on releasing a proposal's funds.
///
/// Checks run in pipeline order and the first failure is returned as-is.
pub trait ReleaseCheck: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()>;
}

/// The proposal has not been executed yet.
pub struct NotExecuted;

impl ReleaseCheck for NotExecuted {
    fn name(&self) -> &str {
        "not-executed"
    }

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()> {
        if context.proposal.executed {
            return Err(DistributorError::ProposalAlreadyExecuted(context.proposal.id));
        }
        Ok(())
    }
}

/// The voting window has run to its end block.
pub struct WindowClosed;

impl ReleaseCheck for WindowClosed {
    fn name(&self) -> &str {
        "window-closed"
    }

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()> {
        if !context.proposal.window.has_closed_at(context.now) {
            return Err(DistributorError::VotingPeriodActive {
                end: context.proposal.end_block(),
            });
        }
        Ok(())
    }
}

/// Strictly more votes for than against.
pub struct MajorityApproved;

impl ReleaseCheck for MajorityApproved {
    fn name(&self) -> &str {
        "majority-approved"
    }

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()> {
        let proposal = context.proposal;
        if !proposal.is_approved() {
            return Err(DistributorError::DistributionNotApproved {
                votes_for: proposal.votes_for,
                votes_against: proposal.votes_against,
            });
        }
        Ok(())
    }
}

/// The project exists and the release fits inside its allocation.
pub struct WithinAllocation;

impl ReleaseCheck for WithinAllocation {
    fn name(&self) -> &str {
        "within-allocation"
    }

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()> {
        let project = context
            .project
            .ok_or(DistributorError::ProjectNotFound(context.proposal.project_id))?;
        project.check_release(context.proposal.amount).map(|_| ())
    }
}

/// Achieved milestones cover the cumulative release.
pub struct MilestonesAchieved;

impl ReleaseCheck for MilestonesAchieved {
    fn name(&self) -> &str {
        "milestones-achieved"
    }

    fn evaluate(&self, context: &ReleaseContext<'_>) -> Result<()> {
        let project = context
            .project
            .ok_or(DistributorError::ProjectNotFound(context.proposal.project_id))?;
        project.check_milestones(context.proposal.amount)
    }
}

// ---------------------------------------------------------------------------
// DistributionExecutor
// ---------------------------------------------------------------------------

/// Everything needed to carry out an approved release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleasePlan {
    pub proposal_id: ProposalId,
    pub project_id: ProjectId,
    pub recipient: Address,
    pub amount: Amount,
}

/// Ordered pipeline of release checks.
pub struct DistributionExecutor {
    checks: Vec<Box<dyn ReleaseCheck>>,
}

impl Default for DistributionExecutor {
    fn default() -> Self {
        Self::standard()
    }
}

impl DistributionExecutor {
    /// An executor with no checks beyond proposal existence.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// The standard pipeline:
    /// NotExecuted -> WindowClosed -> MajorityApproved -> WithinAllocation -> MilestonesAchieved
    pub fn standard() -> Self {
        let mut executor = Self::empty();
        executor.add_check(Box::new(NotExecuted));
        executor.add_check(Box::new(WindowClosed));
        executor.add_check(Box::new(MajorityApproved));
        executor.add_check(Box::new(WithinAllocation));
        executor.add_check(Box::new(MilestonesAchieved));
        executor
    }

    pub fn add_check(&mut self, check: Box<dyn ReleaseCheck>) {
        self.checks.push(check);
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check against `proposal_id` and describe the release.
    pub fn plan(
        &self,
        registry: &ProjectRegistry,
        store: &ProposalStore,
        now: BlockHeight,
        proposal_id: ProposalId,
    ) -> Result<ReleasePlan> {
        let proposal = store.get(proposal_id)?;
        let project = registry.get(proposal.project_id).ok();
        let context = ReleaseContext {
            proposal,
            project,
            now,
        };

        for check in &self.checks {
            check.evaluate(&context)?;
        }

        let project = project.ok_or(DistributorError::ProjectNotFound(proposal.project_id))?;
        Ok(ReleasePlan {
            proposal_id,
            project_id: project.id,
            recipient: project.recipient,
            amount: proposal.amount,
        })
    }
}

/// Apply a planned release: bump the project's released total and mark the
/// proposal executed.
///
/// Both records are validated before either is written, so the pair is
/// updated together or not at all.
pub fn commit_release(
    registry: &mut ProjectRegistry,
    store: &mut ProposalStore,
    plan: &ReleasePlan,
) -> Result<()> {
    let proposal = store.get(plan.proposal_id)?;
    if proposal.executed {
        return Err(DistributorError::ProposalAlreadyExecuted(plan.proposal_id));
    }
    registry.get(plan.project_id)?.check_release(plan.amount)?;

    registry.record_release(plan.project_id, plan.amount)?;
    store.get_mut(plan.proposal_id)?.executed = true;
    Ok(())
}

/// Undo a [`commit_release`] whose value transfer was reversed.
pub(crate) fn revert_release(
    registry: &mut ProjectRegistry,
    store: &mut ProposalStore,
    plan: &ReleasePlan,
) -> Result<()> {
    let proposal = store.get_mut(plan.proposal_id)?;
    if !proposal.executed {
        return Ok(());
    }
    proposal.executed = false;
    registry.undo_release(plan.project_id, plan.amount)
}

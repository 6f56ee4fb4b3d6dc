use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, error, info, warn};

use fund_audit::{AuditEvent, AuditLog, AuditReceipt, EventKind};
use fund_ledger::{TransferReceipt, ValueTransfer};
use fund_types::{Address, Amount, BlockHeight, ProjectId, ProposalId};
use fund_voters::VoterRegistry;

use crate::config::DistributorConfig;
use crate::context::CallContext;
use crate::error::{DistributorError, Result};
use crate::executor::{self, DistributionExecutor};
use crate::project::{Milestone, Project, ProjectRegistry, ProjectStatus};
use crate::proposal::{Proposal, ProposalStatus, ProposalStore};
use crate::validation;
use crate::voting;

/// Mutable ledger state, guarded as a single unit.
struct DistributorState {
    registry: ProjectRegistry,
    store: ProposalStore,
    /// Highest block height seen by a successful mutating call.
    last_block: Option<BlockHeight>,
}

/// The public surface of the fund distribution ledger.
///
/// Composes the project registry, proposal store, voting engine, and
/// distribution executor behind one lock, and drives the three external
/// collaborators: the value ledger, the voter registry, and the audit sink.
///
/// Every mutating call holds the write lock from its first check to its last
/// effect. A call that returns `Err` has changed nothing, with one
/// exception: an execution whose transfer could not be reversed stays
/// committed and reports `TransferFailed`.
pub struct FundDistributor {
    config: DistributorConfig,
    state: RwLock<DistributorState>,
    transfer: Arc<dyn ValueTransfer>,
    voters: Arc<dyn VoterRegistry>,
    audit: Arc<dyn AuditLog>,
    executor: DistributionExecutor,
}

impl FundDistributor {
    /// Build a distributor over the given collaborators.
    ///
    /// Each collaborator must report the contract id the configuration names
    /// for it.
    pub fn new(
        config: DistributorConfig,
        transfer: Arc<dyn ValueTransfer>,
        voters: Arc<dyn VoterRegistry>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        config.validate()?;

        if voters.contract_id() != config.governance_contract {
            return Err(DistributorError::GovernanceNotVerified {
                expected: config.governance_contract.clone(),
                found: voters.contract_id().to_string(),
            });
        }
        if transfer.contract_id() != config.escrow_contract {
            return Err(DistributorError::EscrowNotVerified {
                expected: config.escrow_contract.clone(),
                found: transfer.contract_id().to_string(),
            });
        }
        if audit.contract_id() != config.audit_logger_contract {
            return Err(DistributorError::LoggingFailed(format!(
                "audit sink {:?} does not match audit logger contract {:?}",
                audit.contract_id(),
                config.audit_logger_contract
            )));
        }

        info!(
            admin = %config.admin,
            treasury = %config.treasury(),
            voting_period = config.voting_period,
            max_projects = config.max_projects,
            "fund distributor started"
        );

        Ok(Self {
            config,
            state: RwLock::new(DistributorState {
                registry: ProjectRegistry::new(),
                store: ProposalStore::new(),
                last_block: None,
            }),
            transfer,
            voters,
            audit,
            executor: DistributionExecutor::standard(),
        })
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    // -- mutating operations ------------------------------------------------

    /// Register a funding recipient. Admin only.
    pub fn register_project(
        &self,
        ctx: CallContext,
        recipient: Address,
        description: &str,
        milestones: Vec<Milestone>,
        status: ProjectStatus,
    ) -> Result<ProjectId> {
        self.transact("register_project", &ctx, |state| {
            let project = state.registry.plan_registration(
                &self.config,
                &ctx,
                recipient,
                description,
                milestones,
                status,
            )?;
            let id = project.id;
            self.record(EventKind::ProjectRegistered, id.get(), &ctx)?;

            info!(
                project = %id,
                %recipient,
                allocated = project.total_allocated,
                milestones = project.milestones.len(),
                height = %ctx.block_height,
                "project registered"
            );
            state.registry.insert(project);
            Ok(id)
        })
    }

    /// Open a distribution proposal against an active project.
    pub fn propose_distribution(
        &self,
        ctx: CallContext,
        project_id: u64,
        amount: Amount,
    ) -> Result<ProposalId> {
        self.transact("propose_distribution", &ctx, |state| {
            if !self
                .config
                .proposer_policy
                .permits(&self.config, &*self.voters, &ctx.caller)
            {
                return Err(DistributorError::NotAuthorized);
            }
            let project_id = validation::project_id(project_id)?;
            let project = state.registry.get(project_id)?;
            let proposal = state.store.plan_proposal(&self.config, &ctx, project, amount)?;
            let id = proposal.id;
            self.record(EventKind::DistributionProposed, id.get(), &ctx)?;

            info!(
                proposal = %id,
                project = %project_id,
                amount,
                start = %proposal.start_block(),
                end = %proposal.end_block(),
                "distribution proposed"
            );
            state.store.insert(proposal);
            Ok(id)
        })
    }

    /// Cast the caller's single vote on an open proposal.
    pub fn vote_on_proposal(&self, ctx: CallContext, proposal_id: u64, support: bool) -> Result<()> {
        self.transact("vote_on_proposal", &ctx, |state| {
            let proposal_id = validation::proposal_id(proposal_id)?;
            let ballot = voting::check_ballot(&state.store, &*self.voters, &ctx, proposal_id, support)?;
            self.record(EventKind::VoteCast, proposal_id.get(), &ctx)?;
            voting::apply_ballot(&mut state.store, &ballot)?;

            info!(proposal = %proposal_id, voter = %ctx.caller, support, "vote cast");
            Ok(())
        })
    }

    /// Release an approved proposal's funds from the treasury to the
    /// project recipient.
    ///
    /// The transfer happens first, then the release is committed, then the
    /// audit event is appended. If the append fails, the commit is undone and
    /// the transfer reversed. If the reversal fails too, the release stays
    /// committed and `TransferFailed` is returned, so the proposal cannot pay
    /// out a second time.
    pub fn execute_distribution(&self, ctx: CallContext, proposal_id: u64) -> Result<TransferReceipt> {
        self.transact("execute_distribution", &ctx, |state| {
            let proposal_id = validation::proposal_id(proposal_id)?;
            let plan = self
                .executor
                .plan(&state.registry, &state.store, ctx.block_height, proposal_id)?;

            let receipt = self
                .transfer
                .transfer(plan.amount, &self.config.treasury(), &plan.recipient)?;

            if let Err(cause) = executor::commit_release(&mut state.registry, &mut state.store, &plan) {
                self.compensate(&receipt, &cause)?;
                return Err(cause);
            }

            if let Err(cause) = self.record(EventKind::DistributionExecuted, proposal_id.get(), &ctx) {
                if let Err(reversal) = self.compensate(&receipt, &cause) {
                    warn!(
                        proposal = %proposal_id,
                        amount = plan.amount,
                        "release left committed without an audit record"
                    );
                    return Err(reversal);
                }
                executor::revert_release(&mut state.registry, &mut state.store, &plan)?;
                return Err(cause);
            }

            info!(
                proposal = %proposal_id,
                project = %plan.project_id,
                recipient = %plan.recipient,
                amount = plan.amount,
                transfer_seq = receipt.seq,
                "distribution executed"
            );
            Ok(receipt)
        })
    }

    /// Replace a project's allocation cap. Admin only. The cap may not drop
    /// below what has already been released.
    pub fn set_allocation(&self, ctx: CallContext, project_id: u64, total: Amount) -> Result<()> {
        self.transact("set_allocation", &ctx, |state| {
            let project_id = validation::project_id(project_id)?;
            state
                .registry
                .check_allocation(&self.config, &ctx, project_id, total)?;
            self.record(EventKind::AllocationUpdated, project_id.get(), &ctx)?;
            state.registry.set_allocation(project_id, total)?;

            info!(project = %project_id, total, "allocation updated");
            Ok(())
        })
    }

    /// Mark one of a project's milestones achieved. Admin only.
    pub fn mark_milestone_achieved(&self, ctx: CallContext, project_id: u64, index: usize) -> Result<()> {
        self.transact("mark_milestone_achieved", &ctx, |state| {
            let project_id = validation::project_id(project_id)?;
            state
                .registry
                .check_milestone_achievement(&self.config, &ctx, project_id, index)?;
            self.record(EventKind::MilestoneAchieved, project_id.get(), &ctx)?;
            state.registry.mark_milestone_achieved(project_id, index)?;

            info!(project = %project_id, milestone = index, "milestone achieved");
            Ok(())
        })
    }

    pub fn set_project_status(&self, ctx: CallContext, project_id: u64, status: ProjectStatus) -> Result<()> {
        self.transact("set_project_status", &ctx, |state| {
            let project_id = validation::project_id(project_id)?;
            state
                .registry
                .check_status_change(&self.config, &ctx, project_id)?;
            self.record(EventKind::ProjectStatusChanged, project_id.get(), &ctx)?;
            state.registry.set_status(project_id, status)?;

            info!(project = %project_id, %status, "project status changed");
            Ok(())
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn get_project(&self, project_id: u64) -> Result<Project> {
        let project_id = validation::project_id(project_id)?;
        self.read()?.registry.get(project_id).cloned()
    }

    pub fn get_proposal(&self, proposal_id: u64) -> Result<Proposal> {
        let proposal_id = validation::proposal_id(proposal_id)?;
        self.read()?.store.get(proposal_id).cloned()
    }

    pub fn has_voted(&self, proposal_id: u64, voter: &Address) -> Result<bool> {
        self.get_vote(proposal_id, voter).map(|vote| vote.is_some())
    }

    /// The recorded choice of `voter`, or `None` if they have not voted.
    pub fn get_vote(&self, proposal_id: u64, voter: &Address) -> Result<Option<bool>> {
        let proposal_id = validation::proposal_id(proposal_id)?;
        Ok(self.read()?.store.vote_of(proposal_id, voter))
    }

    pub fn proposal_status(&self, proposal_id: u64, now: u64) -> Result<ProposalStatus> {
        let proposal_id = validation::proposal_id(proposal_id)?;
        Ok(self.read()?.store.get(proposal_id)?.status(BlockHeight::new(now)))
    }

    /// Every proposal opened against `project_id`, oldest first.
    pub fn proposals_for_project(&self, project_id: u64) -> Result<Vec<Proposal>> {
        let project_id = validation::project_id(project_id)?;
        let state = self.read()?;
        state.registry.get(project_id)?;
        Ok(state.store.for_project(project_id))
    }

    pub fn project_count(&self) -> Result<usize> {
        Ok(self.read()?.registry.len())
    }

    pub fn next_project_id(&self) -> Result<u64> {
        Ok(self.read()?.registry.next_id())
    }

    pub fn next_proposal_id(&self) -> Result<u64> {
        Ok(self.read()?.store.next_id())
    }

    // -- internals ----------------------------------------------------------

    fn read(&self) -> Result<RwLockReadGuard<'_, DistributorState>> {
        self.state.read().map_err(|_| DistributorError::StatePoisoned)
    }

    /// Run `op` under the write lock after the height check.
    fn transact<T>(
        &self,
        operation: &'static str,
        ctx: &CallContext,
        op: impl FnOnce(&mut DistributorState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| DistributorError::StatePoisoned)?;

        let result = match state.last_block {
            Some(last) if ctx.block_height < last => Err(DistributorError::InvalidTimestamp(
                format!("block {} is behind last seen block {last}", ctx.block_height),
            )),
            _ => op(&mut *state),
        };

        match &result {
            Ok(_) => {
                state.last_block = Some(match state.last_block {
                    Some(last) => last.max(ctx.block_height),
                    None => ctx.block_height,
                });
            }
            Err(error) => {
                debug!(
                    operation,
                    caller = %ctx.caller,
                    height = %ctx.block_height,
                    code = error.code(),
                    %error,
                    "operation rejected"
                );
            }
        }
        result
    }

    fn record(&self, kind: EventKind, subject: u64, ctx: &CallContext) -> Result<AuditReceipt> {
        let event = AuditEvent::new(kind, Some(subject), ctx.caller, ctx.block_height);
        Ok(self.audit.log_event(&event)?)
    }

    /// Reverse a transfer whose release could not be completed.
    fn compensate(&self, receipt: &TransferReceipt, cause: &DistributorError) -> Result<()> {
        warn!(
            transfer_seq = receipt.seq,
            amount = receipt.amount,
            %cause,
            "distribution failed after transfer; reversing"
        );
        self.transfer.reverse(receipt).map(|_| ()).map_err(|reversal| {
            error!(
                transfer_seq = receipt.seq,
                amount = receipt.amount,
                error = %reversal,
                "transfer reversal failed"
            );
            DistributorError::TransferFailed(format!("reversal failed: {reversal}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fund_audit::{AuditError, FileAuditLog, InMemoryAuditLog};
    use fund_ledger::{InMemoryBalances, TransferKind};
    use fund_voters::InMemoryVoterRegistry;
    use proptest::prelude::*;
    use std::thread;

    const TREASURY_FUNDS: Amount = 10_000;

    fn admin() -> Address {
        Address::derive("ST1ADMIN")
    }

    fn recipient() -> Address {
        Address::derive("ST1RECIPIENT")
    }

    fn voter(n: usize) -> Address {
        Address::derive(&format!("ST1VOTER{n}"))
    }

    struct Harness {
        distributor: FundDistributor,
        balances: Arc<InMemoryBalances>,
        voters: Arc<InMemoryVoterRegistry>,
        audit: Arc<InMemoryAuditLog>,
    }

    fn harness_with(config: DistributorConfig) -> Harness {
        let balances = Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
        balances.credit(&config.treasury(), TREASURY_FUNDS).unwrap();
        let voters = Arc::new(InMemoryVoterRegistry::with_voters(
            config.governance_contract.clone(),
            [admin(), voter(1), voter(2), voter(3)],
        ));
        let audit = Arc::new(InMemoryAuditLog::new(config.audit_logger_contract.clone()));
        let distributor = FundDistributor::new(
            config,
            balances.clone(),
            voters.clone(),
            audit.clone(),
        )
        .unwrap();
        Harness {
            distributor,
            balances,
            voters,
            audit,
        }
    }

    fn harness() -> Harness {
        harness_with(DistributorConfig::new(admin()))
    }

    fn at(height: u64) -> CallContext {
        CallContext::new(admin(), height)
    }

    /// Register project 1 with no milestones, give it 1000, and propose 500
    /// at block 0.
    fn scenario_setup(h: &Harness) -> ProposalId {
        let project = h
            .distributor
            .register_project(at(0), recipient(), "community garden", vec![], ProjectStatus::Active)
            .unwrap();
        assert_eq!(project.get(), 1);
        h.distributor.set_allocation(at(0), project.get(), 1_000).unwrap();
        h.distributor.propose_distribution(at(0), project.get(), 500).unwrap()
    }

    #[test]
    fn scenario_a_full_distribution_flow() {
        let h = harness();
        let proposal_id = scenario_setup(&h);
        assert_eq!(proposal_id.get(), 1);

        let proposal = h.distributor.get_proposal(1).unwrap();
        assert_eq!(proposal.start_block(), BlockHeight::new(0));
        assert_eq!(proposal.end_block(), BlockHeight::new(144));

        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();
        assert_eq!(h.distributor.get_proposal(1).unwrap().votes_for, 1);
        assert!(h.distributor.has_voted(1, &admin()).unwrap());

        let receipt = h.distributor.execute_distribution(at(145), 1).unwrap();
        assert_eq!(receipt.amount, 500);
        assert_eq!(receipt.from, admin());
        assert_eq!(receipt.to, recipient());

        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 500);
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 500);
        assert_eq!(h.balances.balance_of(&admin()).unwrap(), TREASURY_FUNDS - 500);
        assert_eq!(
            h.distributor.proposal_status(1, 145).unwrap(),
            ProposalStatus::Executed
        );

        let kinds: Vec<_> = h.audit.events().unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ProjectRegistered,
                EventKind::AllocationUpdated,
                EventKind::DistributionProposed,
                EventKind::VoteCast,
                EventKind::DistributionExecuted,
            ]
        );
    }

    #[test]
    fn scenario_b_second_execution_is_rejected() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();
        h.distributor.execute_distribution(at(145), 1).unwrap();

        let error = h.distributor.execute_distribution(at(146), 1).unwrap_err();
        assert_eq!(error, DistributorError::ProposalAlreadyExecuted(ProposalId::FIRST));
        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 500);
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 500);
    }

    #[test]
    fn scenario_c_execution_inside_window_is_rejected() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();

        let error = h.distributor.execute_distribution(at(100), 1).unwrap_err();
        assert_eq!(
            error,
            DistributorError::VotingPeriodActive {
                end: BlockHeight::new(144)
            }
        );
        assert!(!h.distributor.get_proposal(1).unwrap().executed);
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 0);
    }

    #[test]
    fn scenario_d_ineligible_voter_leaves_tally_unchanged() {
        let h = harness();
        scenario_setup(&h);
        let stranger = CallContext::new(Address::derive("ST1STRANGER"), 1);

        let error = h.distributor.vote_on_proposal(stranger, 1, true).unwrap_err();
        assert_eq!(error, DistributorError::NotAuthorized);

        let proposal = h.distributor.get_proposal(1).unwrap();
        assert_eq!((proposal.votes_for, proposal.votes_against), (0, 0));
        assert!(!h.distributor.has_voted(1, &stranger.caller).unwrap());
    }

    #[test]
    fn scenario_e_overbudget_proposal_creates_nothing() {
        let h = harness();
        h.distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap();
        h.distributor.set_allocation(at(0), 1, 400).unwrap();
        let events_before = h.audit.len();

        let error = h.distributor.propose_distribution(at(0), 1, 500).unwrap_err();
        assert_eq!(
            error,
            DistributorError::AllocationExceeded {
                requested: 500,
                remaining: 400
            }
        );
        assert_eq!(h.distributor.next_proposal_id().unwrap(), 1);
        assert_eq!(h.audit.len(), events_before);
    }

    #[test]
    fn vote_at_end_block_is_rejected() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(143), 1, true).unwrap();

        let late = CallContext::new(voter(1), 144);
        let error = h.distributor.vote_on_proposal(late, 1, false).unwrap_err();
        assert_eq!(
            error,
            DistributorError::VotingPeriodEnded {
                end: BlockHeight::new(144)
            }
        );
    }

    #[test]
    fn double_vote_is_rejected() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();

        let error = h.distributor.vote_on_proposal(at(2), 1, false).unwrap_err();
        assert!(matches!(error, DistributorError::InvalidVote(_)));
        assert_eq!(h.distributor.get_vote(1, &admin()).unwrap(), Some(true));
        let proposal = h.distributor.get_proposal(1).unwrap();
        assert_eq!((proposal.votes_for, proposal.votes_against), (1, 0));
    }

    #[test]
    fn tie_is_not_approved() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();
        h.distributor
            .vote_on_proposal(CallContext::new(voter(1), 1), 1, false)
            .unwrap();

        assert_eq!(h.distributor.proposal_status(1, 144).unwrap(), ProposalStatus::Rejected);
        let error = h.distributor.execute_distribution(at(144), 1).unwrap_err();
        assert_eq!(
            error,
            DistributorError::DistributionNotApproved {
                votes_for: 1,
                votes_against: 1
            }
        );
    }

    #[test]
    fn non_admin_cannot_register_or_administer() {
        let h = harness();
        let outsider = CallContext::new(voter(1), 0);

        let error = h
            .distributor
            .register_project(outsider, recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap_err();
        assert_eq!(error, DistributorError::NotAuthorized);

        h.distributor
            .register_project(at(0), recipient(), "desc", vec![Milestone::new("m", 10)], ProjectStatus::Active)
            .unwrap();
        assert_eq!(
            h.distributor.set_allocation(outsider, 1, 10).unwrap_err(),
            DistributorError::NotAuthorized
        );
        assert_eq!(
            h.distributor.mark_milestone_achieved(outsider, 1, 0).unwrap_err(),
            DistributorError::NotAuthorized
        );
        assert_eq!(
            h.distributor
                .set_project_status(outsider, 1, ProjectStatus::Suspended)
                .unwrap_err(),
            DistributorError::NotAuthorized
        );
    }

    #[test]
    fn proposer_policy_is_enforced() {
        let mut config = DistributorConfig::new(admin());
        config.proposer_policy = crate::config::ProposerPolicy::AdminOnly;
        let h = harness_with(config);
        h.distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap();
        h.distributor.set_allocation(at(0), 1, 100).unwrap();

        let error = h
            .distributor
            .propose_distribution(CallContext::new(voter(1), 0), 1, 10)
            .unwrap_err();
        assert_eq!(error, DistributorError::NotAuthorized);
        assert!(h.distributor.propose_distribution(at(0), 1, 10).is_ok());
    }

    #[test]
    fn default_policy_admits_eligible_voters_only() {
        let h = harness();
        scenario_setup(&h);
        assert!(h
            .distributor
            .propose_distribution(CallContext::new(voter(2), 1), 1, 100)
            .is_ok());
        assert_eq!(
            h.distributor
                .propose_distribution(CallContext::new(Address::derive("ST1STRANGER"), 1), 1, 100)
                .unwrap_err(),
            DistributorError::NotAuthorized
        );

        h.voters.remove_voter(&voter(2));
        assert_eq!(
            h.distributor
                .propose_distribution(CallContext::new(voter(2), 1), 1, 100)
                .unwrap_err(),
            DistributorError::NotAuthorized
        );
    }

    #[test]
    fn zero_ids_are_invalid() {
        let h = harness();
        assert_eq!(h.distributor.get_project(0).unwrap_err(), DistributorError::InvalidProjectId);
        assert_eq!(h.distributor.get_proposal(0).unwrap_err(), DistributorError::InvalidProposalId);
        assert_eq!(
            h.distributor.propose_distribution(at(0), 0, 1).unwrap_err(),
            DistributorError::InvalidProjectId
        );
        assert_eq!(
            h.distributor.get_project(7).unwrap_err(),
            DistributorError::ProjectNotFound(ProjectId::new(7).unwrap())
        );
    }

    #[test]
    fn suspended_project_accepts_no_proposals() {
        let h = harness();
        scenario_setup(&h);
        h.distributor
            .set_project_status(at(1), 1, ProjectStatus::Suspended)
            .unwrap();

        let error = h.distributor.propose_distribution(at(1), 1, 10).unwrap_err();
        assert!(matches!(error, DistributorError::InvalidStatus(_)));
        assert_eq!(h.distributor.get_project(1).unwrap().status, ProjectStatus::Suspended);
    }

    #[test]
    fn milestones_gate_execution() {
        let h = harness();
        h.distributor
            .register_project(
                at(0),
                recipient(),
                "bridge",
                vec![Milestone::new("survey", 300), Milestone::new("build", 700)],
                ProjectStatus::Active,
            )
            .unwrap();
        assert_eq!(h.distributor.get_project(1).unwrap().total_allocated, 1_000);

        h.distributor.propose_distribution(at(0), 1, 300).unwrap();
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();

        let error = h.distributor.execute_distribution(at(150), 1).unwrap_err();
        assert_eq!(
            error,
            DistributorError::MilestoneNotAchieved {
                required: 300,
                achieved: 0
            }
        );
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 0);

        h.distributor.mark_milestone_achieved(at(150), 1, 0).unwrap();
        h.distributor.execute_distribution(at(150), 1).unwrap();
        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 300);
    }

    #[test]
    fn insufficient_treasury_changes_nothing() {
        let h = harness();
        h.distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap();
        h.distributor
            .set_allocation(at(0), 1, TREASURY_FUNDS * 2)
            .unwrap();
        h.distributor
            .propose_distribution(at(0), 1, TREASURY_FUNDS + 1)
            .unwrap();
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();

        let error = h.distributor.execute_distribution(at(200), 1).unwrap_err();
        assert_eq!(
            error,
            DistributorError::InsufficientFunds {
                balance: TREASURY_FUNDS,
                requested: TREASURY_FUNDS + 1
            }
        );
        assert!(!h.distributor.get_proposal(1).unwrap().executed);
        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 0);
        assert!(h.balances.journal().unwrap().is_empty());
    }

    #[test]
    fn audit_failure_after_transfer_reverses_it() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();

        h.audit.set_available(false);
        let error = h.distributor.execute_distribution(at(145), 1).unwrap_err();
        assert!(matches!(error, DistributorError::LoggingFailed(_)));

        assert!(!h.distributor.get_proposal(1).unwrap().executed);
        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 0);
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 0);
        assert_eq!(h.balances.balance_of(&admin()).unwrap(), TREASURY_FUNDS);

        let journal = h.balances.journal().unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].kind, TransferKind::Reversal { reverses_seq: 1 });
        h.balances.validate_journal().unwrap();

        h.audit.set_available(true);
        h.distributor.execute_distribution(at(145), 1).unwrap();
        assert_eq!(h.balances.balance_of(&recipient()).unwrap(), 500);
    }

    /// Audit sink that lets the recipient spend its payout, then fails the
    /// executed-event append.
    struct SpendingRecipientAudit {
        contract_id: String,
        balances: Arc<InMemoryBalances>,
        elsewhere: Address,
    }

    impl AuditLog for SpendingRecipientAudit {
        fn contract_id(&self) -> &str {
            &self.contract_id
        }

        fn log_event(&self, event: &AuditEvent) -> std::result::Result<AuditReceipt, AuditError> {
            if event.kind == EventKind::DistributionExecuted {
                let held = self.balances.balance_of(&recipient()).unwrap();
                self.balances.transfer(held, &recipient(), &self.elsewhere).unwrap();
                return Err(AuditError::Unavailable("sink offline".into()));
            }
            Ok(AuditReceipt {
                seq: 1,
                event_id: event.id.clone(),
            })
        }

        fn events(&self) -> std::result::Result<Vec<AuditEvent>, AuditError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn unreversible_payout_stays_committed() {
        let config = DistributorConfig::new(admin());
        let balances = Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
        balances.credit(&admin(), TREASURY_FUNDS).unwrap();
        let voters = Arc::new(InMemoryVoterRegistry::with_voters(
            config.governance_contract.clone(),
            [admin()],
        ));
        let audit = Arc::new(SpendingRecipientAudit {
            contract_id: config.audit_logger_contract.clone(),
            balances: balances.clone(),
            elsewhere: Address::derive("ST1ELSEWHERE"),
        });
        let distributor = FundDistributor::new(config, balances.clone(), voters, audit).unwrap();

        distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap();
        distributor.set_allocation(at(0), 1, 1_000).unwrap();
        distributor.propose_distribution(at(0), 1, 500).unwrap();
        distributor.vote_on_proposal(at(1), 1, true).unwrap();

        let error = distributor.execute_distribution(at(145), 1).unwrap_err();
        assert_eq!(error.code(), 127);
        assert!(matches!(error, DistributorError::TransferFailed(ref m) if m.starts_with("reversal failed")));
        assert!(distributor.get_proposal(1).unwrap().executed);
        let released = distributor.get_project(1).unwrap().total_released;
        assert_eq!(released, 500);

        let error = distributor.execute_distribution(at(146), 1).unwrap_err();
        assert!(matches!(error, DistributorError::ProposalAlreadyExecuted(_)));

        let outflow = TREASURY_FUNDS - balances.balance_of(&admin()).unwrap();
        assert_eq!(outflow, released);
        assert_eq!(balances.balance_of(&Address::derive("ST1ELSEWHERE")).unwrap(), 500);
    }

    #[test]
    fn executed_event_follows_the_committed_release() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();
        h.distributor.execute_distribution(at(145), 1).unwrap();

        let last = h.audit.last().unwrap();
        assert_eq!(last.kind, EventKind::DistributionExecuted);
        assert_eq!(last.subject_id, Some(1));
        assert!(h.distributor.get_proposal(1).unwrap().executed);
        assert_eq!(h.distributor.get_project(1).unwrap().total_released, 500);
    }

    #[test]
    fn audit_failure_rejects_vote() {
        let h = harness();
        scenario_setup(&h);
        let events = h.audit.len();

        h.audit.set_available(false);
        let error = h.distributor.vote_on_proposal(at(1), 1, true).unwrap_err();
        assert!(matches!(error, DistributorError::LoggingFailed(_)));

        let proposal = h.distributor.get_proposal(1).unwrap();
        assert_eq!((proposal.votes_for, proposal.votes_against), (0, 0));
        assert!(!h.distributor.has_voted(1, &admin()).unwrap());
        assert_eq!(h.distributor.get_vote(1, &admin()).unwrap(), None);
        assert_eq!(h.audit.len(), events);

        h.audit.set_available(true);
        h.distributor.vote_on_proposal(at(1), 1, true).unwrap();
        assert_eq!(h.distributor.get_proposal(1).unwrap().votes_for, 1);
    }

    #[test]
    fn audit_failure_rejects_proposal() {
        let h = harness();
        scenario_setup(&h);
        assert_eq!(h.distributor.next_proposal_id().unwrap(), 2);

        h.audit.set_available(false);
        let error = h.distributor.propose_distribution(at(2), 1, 100).unwrap_err();
        assert_eq!(error.code(), 120);
        assert_eq!(h.distributor.next_proposal_id().unwrap(), 2);
        assert_eq!(h.distributor.proposals_for_project(1).unwrap().len(), 1);
        assert!(h.distributor.get_proposal(2).is_err());

        h.audit.set_available(true);
        let id = h.distributor.propose_distribution(at(2), 1, 100).unwrap();
        assert_eq!(id.get(), 2);
    }

    #[test]
    fn audit_failure_rejects_registration() {
        let h = harness();
        h.audit.set_available(false);
        let error = h
            .distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap_err();
        assert_eq!(error.code(), 120);
        assert_eq!(h.distributor.project_count().unwrap(), 0);
        assert_eq!(h.distributor.next_project_id().unwrap(), 1);
    }

    #[test]
    fn block_height_cannot_move_backwards() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.vote_on_proposal(at(50), 1, true).unwrap();

        let error = h
            .distributor
            .vote_on_proposal(CallContext::new(voter(1), 49), 1, true)
            .unwrap_err();
        assert!(matches!(error, DistributorError::InvalidTimestamp(_)));

        // A rejected call does not advance the clock.
        assert!(h.distributor.execute_distribution(at(100), 1).is_err());
        h.distributor
            .vote_on_proposal(CallContext::new(voter(1), 60), 1, true)
            .unwrap();
    }

    #[test]
    fn mismatched_collaborators_are_rejected() {
        let config = DistributorConfig::new(admin());
        let balances: Arc<dyn ValueTransfer> =
            Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
        let audit: Arc<dyn AuditLog> =
            Arc::new(InMemoryAuditLog::new(config.audit_logger_contract.clone()));
        let voters: Arc<dyn VoterRegistry> =
            Arc::new(InMemoryVoterRegistry::new(config.governance_contract.clone()));

        let wrong_voters: Arc<dyn VoterRegistry> = Arc::new(InMemoryVoterRegistry::new("other-dao"));
        let error = FundDistributor::new(config.clone(), balances.clone(), wrong_voters, audit.clone())
            .err()
            .unwrap();
        assert_eq!(error.code(), 121);

        let wrong_escrow: Arc<dyn ValueTransfer> = Arc::new(InMemoryBalances::new("other-vault"));
        let error = FundDistributor::new(config.clone(), wrong_escrow, voters.clone(), audit)
            .err()
            .unwrap();
        assert_eq!(error.code(), 122);

        let wrong_audit: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new("other-logger"));
        let error = FundDistributor::new(config, balances, voters, wrong_audit)
            .err()
            .unwrap();
        assert!(matches!(error, DistributorError::LoggingFailed(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = DistributorConfig::new(admin());
        config.voting_period = 0;
        let balances: Arc<dyn ValueTransfer> =
            Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
        let voters: Arc<dyn VoterRegistry> =
            Arc::new(InMemoryVoterRegistry::new(config.governance_contract.clone()));
        let audit: Arc<dyn AuditLog> =
            Arc::new(InMemoryAuditLog::new(config.audit_logger_contract.clone()));

        let error = FundDistributor::new(config, balances, voters, audit).err().unwrap();
        assert!(matches!(error, DistributorError::Config(_)));
    }

    #[test]
    fn proposals_for_project_lists_in_order() {
        let h = harness();
        scenario_setup(&h);
        h.distributor.propose_distribution(at(1), 1, 200).unwrap();

        let proposals = h.distributor.proposals_for_project(1).unwrap();
        let amounts: Vec<_> = proposals.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![500, 200]);
        assert!(h.distributor.proposals_for_project(2).is_err());
    }

    #[test]
    fn file_audit_log_records_the_whole_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let config = DistributorConfig::new(admin());

        {
            let balances = Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
            balances.credit(&admin(), TREASURY_FUNDS).unwrap();
            let voters = Arc::new(InMemoryVoterRegistry::with_voters(
                config.governance_contract.clone(),
                [admin()],
            ));
            let audit = Arc::new(FileAuditLog::open(config.audit_logger_contract.clone(), &path).unwrap());
            let distributor = FundDistributor::new(config.clone(), balances, voters, audit).unwrap();

            distributor
                .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
                .unwrap();
            distributor.set_allocation(at(0), 1, 500).unwrap();
            distributor.propose_distribution(at(0), 1, 500).unwrap();
            distributor.vote_on_proposal(at(1), 1, true).unwrap();
            distributor.execute_distribution(at(145), 1).unwrap();
        }

        let reopened = FileAuditLog::open(config.audit_logger_contract.clone(), &path).unwrap();
        let events = reopened.events().unwrap();
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.verify_integrity()));
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::DistributionExecuted);
        assert_eq!(last.subject_id, Some(1));
        assert_eq!(last.block_height, BlockHeight::new(145));
    }

    #[test]
    fn concurrent_votes_and_executions_are_atomic() {
        const VOTERS: usize = 16;
        let mut config = DistributorConfig::new(admin());
        config.proposer_policy = crate::config::ProposerPolicy::AdminOnly;

        let balances = Arc::new(InMemoryBalances::new(config.escrow_contract.clone()));
        balances.credit(&admin(), TREASURY_FUNDS).unwrap();
        let voters = Arc::new(InMemoryVoterRegistry::with_voters(
            config.governance_contract.clone(),
            (0..VOTERS).map(voter),
        ));
        let audit = Arc::new(InMemoryAuditLog::new(config.audit_logger_contract.clone()));
        let distributor =
            Arc::new(FundDistributor::new(config, balances.clone(), voters, audit).unwrap());

        distributor
            .register_project(at(0), recipient(), "desc", vec![], ProjectStatus::Active)
            .unwrap();
        distributor.set_allocation(at(0), 1, 1_000).unwrap();
        distributor.propose_distribution(at(0), 1, 500).unwrap();

        let handles: Vec<_> = (0..VOTERS)
            .map(|n| {
                let distributor = Arc::clone(&distributor);
                thread::spawn(move || {
                    let ctx = CallContext::new(voter(n), 10);
                    distributor.vote_on_proposal(ctx, 1, true).unwrap();
                    // Every second voter retries; the retry must be rejected.
                    if n % 2 == 0 {
                        assert!(distributor.vote_on_proposal(ctx, 1, false).is_err());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let proposal = distributor.get_proposal(1).unwrap();
        assert_eq!(proposal.votes_for, VOTERS as u64);
        assert_eq!(proposal.votes_against, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let distributor = Arc::clone(&distributor);
                thread::spawn(move || distributor.execute_distribution(at(200), 1).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(balances.balance_of(&recipient()).unwrap(), 500);
        assert_eq!(distributor.get_project(1).unwrap().total_released, 500);
    }

    // -- property: released never exceeds allocation -------------------------

    #[derive(Clone, Debug)]
    enum Op {
        SetAllocation { project: u64, total: Amount },
        Achieve { project: u64, index: usize },
        Propose { project: u64, amount: Amount },
        Vote { voter: usize, proposal: u64, support: bool },
        Execute { proposal: u64 },
        Advance { blocks: u64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1..=2u64, 0..1_500u64).prop_map(|(project, total)| Op::SetAllocation { project, total }),
            (1..=2u64, 0..3usize).prop_map(|(project, index)| Op::Achieve { project, index }),
            (1..=2u64, 0..800u64).prop_map(|(project, amount)| Op::Propose { project, amount }),
            (0..5usize, 0..6u64, any::<bool>())
                .prop_map(|(voter, proposal, support)| Op::Vote { voter, proposal, support }),
            (0..6u64).prop_map(|proposal| Op::Execute { proposal }),
            (0..25u64).prop_map(|blocks| Op::Advance { blocks }),
        ]
    }

    proptest! {
        #[test]
        fn released_never_exceeds_allocation(ops in proptest::collection::vec(op_strategy(), 1..60)) {
            let mut config = DistributorConfig::new(admin());
            config.voting_period = 10;
            let h = harness_with(config);
            let recipients = [Address::derive("recipient-1"), Address::derive("recipient-2")];

            h.distributor
                .register_project(at(0), recipients[0], "open budget", vec![], ProjectStatus::Active)
                .unwrap();
            h.distributor
                .register_project(
                    at(0),
                    recipients[1],
                    "milestone budget",
                    vec![Milestone::new("first", 200), Milestone::new("second", 300)],
                    ProjectStatus::Active,
                )
                .unwrap();

            let mut now = 0u64;
            for op in ops {
                // Outcomes vary; only the invariants below matter.
                let _ = match op {
                    Op::SetAllocation { project, total } => {
                        h.distributor.set_allocation(at(now), project, total)
                    }
                    Op::Achieve { project, index } => {
                        h.distributor.mark_milestone_achieved(at(now), project, index)
                    }
                    Op::Propose { project, amount } => {
                        h.distributor.propose_distribution(at(now), project, amount).map(|_| ())
                    }
                    Op::Vote { voter: n, proposal, support } => {
                        let caller = if n == 0 { admin() } else { voter(n) };
                        h.distributor
                            .vote_on_proposal(CallContext::new(caller, now), proposal, support)
                    }
                    Op::Execute { proposal } => {
                        h.distributor.execute_distribution(at(now), proposal).map(|_| ())
                    }
                    Op::Advance { blocks } => {
                        now += blocks;
                        Ok(())
                    }
                };

                let mut released_total = 0;
                for (index, recipient) in recipients.iter().enumerate() {
                    let project = h.distributor.get_project(index as u64 + 1).unwrap();
                    prop_assert!(project.total_released <= project.total_allocated);
                    prop_assert_eq!(h.balances.balance_of(recipient).unwrap(), project.total_released);

                    let executed: Amount = h
                        .distributor
                        .proposals_for_project(project.id.get())
                        .unwrap()
                        .iter()
                        .filter(|p| p.executed)
                        .map(|p| p.amount)
                        .sum();
                    prop_assert_eq!(executed, project.total_released);
                    released_total += project.total_released;
                }
                prop_assert_eq!(
                    h.balances.balance_of(&admin()).unwrap(),
                    TREASURY_FUNDS - released_total
                );
            }
        }
    }
}

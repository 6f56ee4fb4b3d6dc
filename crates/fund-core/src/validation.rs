//! Input checks shared by the registry and the proposal store.

use fund_types::{Address, Amount, ProjectId, ProposalId};

use crate::config::DistributorConfig;
use crate::error::{DistributorError, Result};
use crate::project::Milestone;

pub fn project_id(raw: u64) -> Result<ProjectId> {
    ProjectId::new(raw).map_err(|_| DistributorError::InvalidProjectId)
}

pub fn proposal_id(raw: u64) -> Result<ProposalId> {
    ProposalId::new(raw).map_err(|_| DistributorError::InvalidProposalId)
}

pub fn require_admin(config: &DistributorConfig, caller: &Address) -> Result<()> {
    if *caller != config.admin {
        return Err(DistributorError::NotAuthorized);
    }
    Ok(())
}

pub fn recipient(address: &Address) -> Result<()> {
    if address.is_zero() {
        return Err(DistributorError::InvalidAddress);
    }
    Ok(())
}

/// Descriptions are measured in characters, not bytes.
pub fn description(text: &str, max_len: usize) -> Result<()> {
    let len = text.chars().count();
    if len == 0 {
        return Err(DistributorError::InvalidDescription("must not be empty".into()));
    }
    if len > max_len {
        return Err(DistributorError::InvalidDescription(format!(
            "{len} characters exceeds limit of {max_len}"
        )));
    }
    Ok(())
}

/// Validate a milestone list and return the sum of its amounts.
pub fn milestones(config: &DistributorConfig, milestones: &[Milestone]) -> Result<Amount> {
    if milestones.len() > config.max_milestones {
        return Err(DistributorError::InvalidMilestone(format!(
            "{} milestones exceeds limit of {}",
            milestones.len(),
            config.max_milestones
        )));
    }

    let mut total: Amount = 0;
    for (index, milestone) in milestones.iter().enumerate() {
        let len = milestone.description.chars().count();
        if len == 0 || len > config.max_milestone_description_len {
            return Err(DistributorError::InvalidMilestone(format!(
                "milestone {index} description must be 1..={} characters",
                config.max_milestone_description_len
            )));
        }
        total = total.checked_add(milestone.amount).ok_or_else(|| {
            DistributorError::InvalidMilestone("milestone amounts overflow".into())
        })?;
    }
    Ok(total)
}

pub fn positive_amount(amount: Amount) -> Result<()> {
    if amount == 0 {
        return Err(DistributorError::InvalidAmount("must be greater than zero".into()));
    }
    Ok(())
}

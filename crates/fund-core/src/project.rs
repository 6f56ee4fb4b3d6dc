//! Project registry: recipients, milestone budgets, and release totals.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fund_types::{Address, Amount, BlockHeight, ProjectId};

use crate::config::DistributorConfig;
use crate::context::CallContext;
use crate::error::{DistributorError, Result};
use crate::validation;

/// Lifecycle status of a project. Only `Active` projects accept proposals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Active,
    Completed,
    Suspended,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = DistributorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "suspended" => Ok(Self::Suspended),
            other => Err(DistributorError::InvalidStatus(format!(
                "unknown project status {other:?}"
            ))),
        }
    }
}

/// A budgeted deliverable. Fixed at registration except for `achieved`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub description: String,
    pub amount: Amount,
    pub achieved: bool,
}

impl Milestone {
    /// A milestone that has not been achieved yet.
    pub fn new(description: impl Into<String>, amount: Amount) -> Self {
        Self {
            description: description.into(),
            amount,
            achieved: false,
        }
    }
}

/// A funding recipient record.
///
/// Invariant: `total_released <= total_allocated`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub recipient: Address,
    pub description: String,
    pub milestones: Vec<Milestone>,
    pub status: ProjectStatus,
    pub total_allocated: Amount,
    pub total_released: Amount,
    pub registered_at: BlockHeight,
}

impl Project {
    /// Allocation not yet released.
    pub fn remaining(&self) -> Amount {
        self.total_allocated.saturating_sub(self.total_released)
    }

    /// Sum of the amounts of achieved milestones.
    pub fn achieved_amount(&self) -> Amount {
        self.milestones
            .iter()
            .filter(|m| m.achieved)
            .fold(0, |acc: Amount, m| acc.saturating_add(m.amount))
    }

    /// Check that releasing `amount` keeps the project within its allocation.
    pub fn check_release(&self, amount: Amount) -> Result<Amount> {
        self.total_released
            .checked_add(amount)
            .filter(|total| *total <= self.total_allocated)
            .ok_or(DistributorError::AllocationExceeded {
                requested: amount,
                remaining: self.remaining(),
            })
    }

    /// Check that releasing `amount` is covered by achieved milestones.
    ///
    /// Projects registered without milestones are gated by allocation only.
    pub fn check_milestones(&self, amount: Amount) -> Result<()> {
        if self.milestones.is_empty() {
            return Ok(());
        }
        let required = self.total_released.saturating_add(amount);
        let achieved = self.achieved_amount();
        if required > achieved {
            return Err(DistributorError::MilestoneNotAchieved { required, achieved });
        }
        Ok(())
    }
}

/// Exclusive owner of all project records.
#[derive(Debug)]
pub struct ProjectRegistry {
    projects: BTreeMap<ProjectId, Project>,
    next_id: u64,
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self {
            projects: BTreeMap::new(),
            next_id: ProjectId::FIRST.get(),
        }
    }

    /// The id the next registered project will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: ProjectId) -> Result<&Project> {
        self.projects
            .get(&id)
            .ok_or(DistributorError::ProjectNotFound(id))
    }

    fn get_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or(DistributorError::ProjectNotFound(id))
    }

    /// Validate a registration and build the record it would create.
    ///
    /// Checks run in a fixed order and the first failure is returned.
    pub fn plan_registration(
        &self,
        config: &DistributorConfig,
        ctx: &CallContext,
        recipient: Address,
        description: &str,
        milestones: Vec<Milestone>,
        status: ProjectStatus,
    ) -> Result<Project> {
        validation::require_admin(config, &ctx.caller)?;
        if self.next_id >= config.max_projects {
            return Err(DistributorError::MaxProjectsExceeded {
                max: config.max_projects,
            });
        }
        validation::recipient(&recipient)?;
        validation::description(description, config.max_description_len)?;
        let total_allocated = validation::milestones(config, &milestones)?;

        let id = validation::project_id(self.next_id)?;
        if self.projects.contains_key(&id) {
            return Err(DistributorError::ProjectAlreadyExists(id));
        }

        Ok(Project {
            id,
            recipient,
            description: description.to_string(),
            milestones,
            status,
            total_allocated,
            total_released: 0,
            registered_at: ctx.block_height,
        })
    }

    /// Store a project produced by [`Self::plan_registration`].
    pub fn insert(&mut self, project: Project) {
        self.next_id = project.id.get() + 1;
        self.projects.insert(project.id, project);
    }

    /// Check an allocation change. The new cap may not drop below what has
    /// already been released.
    pub fn check_allocation(
        &self,
        config: &DistributorConfig,
        ctx: &CallContext,
        id: ProjectId,
        total: Amount,
    ) -> Result<()> {
        validation::require_admin(config, &ctx.caller)?;
        let project = self.get(id)?;
        if total < project.total_released {
            return Err(DistributorError::AllocationExceeded {
                requested: project.total_released,
                remaining: total,
            });
        }
        Ok(())
    }

    pub fn set_allocation(&mut self, id: ProjectId, total: Amount) -> Result<()> {
        let project = self.get_mut(id)?;
        if total < project.total_released {
            return Err(DistributorError::AllocationExceeded {
                requested: project.total_released,
                remaining: total,
            });
        }
        project.total_allocated = total;
        Ok(())
    }

    pub fn check_milestone_achievement(
        &self,
        config: &DistributorConfig,
        ctx: &CallContext,
        id: ProjectId,
        index: usize,
    ) -> Result<()> {
        validation::require_admin(config, &ctx.caller)?;
        let project = self.get(id)?;
        match project.milestones.get(index) {
            None => Err(DistributorError::InvalidMilestone(format!(
                "{id} has no milestone {index}"
            ))),
            Some(m) if m.achieved => Err(DistributorError::InvalidMilestone(format!(
                "milestone {index} of {id} is already achieved"
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn mark_milestone_achieved(&mut self, id: ProjectId, index: usize) -> Result<()> {
        let project = self.get_mut(id)?;
        let milestone = project.milestones.get_mut(index).ok_or_else(|| {
            DistributorError::InvalidMilestone(format!("{id} has no milestone {index}"))
        })?;
        milestone.achieved = true;
        Ok(())
    }

    pub fn check_status_change(
        &self,
        config: &DistributorConfig,
        ctx: &CallContext,
        id: ProjectId,
    ) -> Result<()> {
        validation::require_admin(config, &ctx.caller)?;
        self.get(id).map(|_| ())
    }

    pub fn set_status(&mut self, id: ProjectId, status: ProjectStatus) -> Result<()> {
        self.get_mut(id)?.status = status;
        Ok(())
    }

    /// Add `amount` to the project's released total.
    pub fn record_release(&mut self, id: ProjectId, amount: Amount) -> Result<()> {
        let project = self.get_mut(id)?;
        project.total_released = project.check_release(amount)?;
        Ok(())
    }

    /// Take back a release recorded by [`Self::record_release`].
    pub(crate) fn undo_release(&mut self, id: ProjectId, amount: Amount) -> Result<()> {
        let project = self.get_mut(id)?;
        project.total_released = project.total_released.saturating_sub(amount);
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use fund_types::Address;

/// Errors raised while loading or validating a [`DistributorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config value {field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Who may open a distribution proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposerPolicy {
    /// Only the configured admin.
    AdminOnly,
    /// The admin or any address the voter registry accepts.
    #[default]
    AdminOrVoter,
    /// Any caller.
    Anyone,
}

/// Process-wide configuration for the distribution core.
///
/// Set once at construction; nothing in the core mutates it afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// The only address allowed to register and administer projects.
    pub admin: Address,
    /// Account that funds are released from. Defaults to `admin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treasury: Option<Address>,
    /// Project ids must stay below this bound.
    #[serde(default = "defaults::max_projects")]
    pub max_projects: u64,
    /// Length of every voting window, in blocks.
    #[serde(default = "defaults::voting_period")]
    pub voting_period: u64,
    #[serde(default = "defaults::max_description_len")]
    pub max_description_len: usize,
    #[serde(default = "defaults::max_milestones")]
    pub max_milestones: usize,
    #[serde(default = "defaults::max_milestone_description_len")]
    pub max_milestone_description_len: usize,
    #[serde(default)]
    pub proposer_policy: ProposerPolicy,
    #[serde(default = "defaults::governance_contract")]
    pub governance_contract: String,
    #[serde(default = "defaults::escrow_contract")]
    pub escrow_contract: String,
    #[serde(default = "defaults::audit_logger_contract")]
    pub audit_logger_contract: String,
}

mod defaults {
    pub fn max_projects() -> u64 {
        500
    }
    pub fn voting_period() -> u64 {
        144
    }
    pub fn max_description_len() -> usize {
        500
    }
    pub fn max_milestones() -> usize {
        20
    }
    pub fn max_milestone_description_len() -> usize {
        200
    }
    pub fn governance_contract() -> String {
        "SP000000000000000000002Q6VF78.governance-dao".into()
    }
    pub fn escrow_contract() -> String {
        "SP000000000000000000002Q6VF78.escrow-vault".into()
    }
    pub fn audit_logger_contract() -> String {
        "SP000000000000000000002Q6VF78.audit-logger".into()
    }
}

impl DistributorConfig {
    /// Configuration with default limits, administered by `admin`.
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            treasury: None,
            max_projects: defaults::max_projects(),
            voting_period: defaults::voting_period(),
            max_description_len: defaults::max_description_len(),
            max_milestones: defaults::max_milestones(),
            max_milestone_description_len: defaults::max_milestone_description_len(),
            proposer_policy: ProposerPolicy::default(),
            governance_contract: defaults::governance_contract(),
            escrow_contract: defaults::escrow_contract(),
            audit_logger_contract: defaults::audit_logger_contract(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The account distributions are paid from.
    pub fn treasury(&self) -> Address {
        self.treasury.unwrap_or(self.admin)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.is_zero() {
            return Err(invalid("admin", "must not be the null address"));
        }
        if self.treasury().is_zero() {
            return Err(invalid("treasury", "must not be the null address"));
        }
        if self.max_projects == 0 {
            return Err(invalid("max_projects", "must be at least 1"));
        }
        if self.voting_period == 0 {
            return Err(invalid("voting_period", "must span at least one block"));
        }
        if self.max_description_len == 0 {
            return Err(invalid("max_description_len", "must be at least 1"));
        }
        if self.max_milestone_description_len == 0 {
            return Err(invalid("max_milestone_description_len", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

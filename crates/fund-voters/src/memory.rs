//! In-memory voter registry for testing and ephemeral use.

use std::collections::HashSet;
use std::sync::RwLock;

use tracing::warn;

use fund_types::Address;

use crate::traits::VoterRegistry;

/// An in-memory implementation of [`VoterRegistry`].
///
/// Eligible addresses live in a `HashSet` behind a `RwLock`.
#[derive(Debug)]
pub struct InMemoryVoterRegistry {
    contract_id: String,
    voters: RwLock<HashSet<Address>>,
}

impl InMemoryVoterRegistry {
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            voters: RwLock::new(HashSet::new()),
        }
    }

    /// Create a registry pre-populated with `voters`.
    pub fn with_voters(
        contract_id: impl Into<String>,
        voters: impl IntoIterator<Item = Address>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            voters: RwLock::new(voters.into_iter().collect()),
        }
    }

    /// Grant voting rights. Returns `false` if the address was already eligible.
    pub fn add_voter(&self, voter: Address) -> bool {
        match self.voters.write() {
            Ok(mut voters) => voters.insert(voter),
            Err(_) => {
                warn!(%voter, "voter registry lock poisoned; add ignored");
                false
            }
        }
    }

    /// Revoke voting rights. Returns `true` if the address was eligible.
    pub fn remove_voter(&self, voter: &Address) -> bool {
        match self.voters.write() {
            Ok(mut voters) => voters.remove(voter),
            Err(_) => {
                warn!(%voter, "voter registry lock poisoned; removal ignored");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.voters.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VoterRegistry for InMemoryVoterRegistry {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    fn is_eligible_voter(&self, voter: &Address) -> bool {
        match self.voters.read() {
            Ok(voters) => voters.contains(voter),
            Err(_) => {
                warn!(%voter, "voter registry lock poisoned; treating as ineligible");
                false
            }
        }
    }
}

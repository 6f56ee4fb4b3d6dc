use fund_types::Address;

/// Directory of addresses allowed to vote on distribution proposals.
///
/// Implementations must be thread-safe. A registry that cannot answer
/// (for example because its backing store is unavailable) must report the
/// address as not eligible.
pub trait VoterRegistry: Send + Sync {
    /// Identifier of the governance contract backing this registry.
    fn contract_id(&self) -> &str;

    /// Returns `true` if `voter` may cast votes.
    fn is_eligible_voter(&self, voter: &Address) -> bool;
}

use fund_types::{Address, Amount};

/// Errors produced by balance ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("balance of {account} would overflow")]
    BalanceOverflow { account: Address },

    #[error("transfer receipt not found in journal")]
    ReceiptNotFound,

    #[error("transfer at seq {seq} has already been reversed")]
    AlreadyReversed { seq: u64 },

    #[error("a reversal cannot itself be reversed")]
    NotReversible,

    #[error("journal integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

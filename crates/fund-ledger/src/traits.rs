use fund_types::{Address, Amount};

use crate::error::LedgerError;
use crate::receipt::TransferReceipt;

/// Atomic value transfer primitive provided by the hosting ledger.
///
/// Implementations must be thread-safe and must apply each transfer as a
/// unit: either both balances change or neither does.
pub trait ValueTransfer: Send + Sync {
    /// Identifier of the escrow contract backing this ledger.
    fn contract_id(&self) -> &str;

    /// Current balance of `account`. Unknown accounts hold zero.
    fn balance_of(&self, account: &Address) -> Result<Amount, LedgerError>;

    /// Move `amount` from `from` to `to`.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] when `from` cannot cover
    /// the amount.
    fn transfer(
        &self,
        amount: Amount,
        from: &Address,
        to: &Address,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Undo a previously applied transfer by moving the same amount back.
    ///
    /// Used by callers whose own operation failed after the transfer was
    /// applied. Each transfer can be reversed at most once.
    fn reverse(&self, receipt: &TransferReceipt) -> Result<TransferReceipt, LedgerError>;
}

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use fund_types::{Address, Amount};

use crate::error::LedgerError;
use crate::receipt::{TransferKind, TransferReceipt};
use crate::traits::ValueTransfer;

/// In-memory balance ledger for tests, local demos, and embedding.
pub struct InMemoryBalances {
    contract_id: String,
    inner: RwLock<BalanceState>,
}

#[derive(Default)]
struct BalanceState {
    balances: HashMap<Address, Amount>,
    journal: Vec<TransferReceipt>,
    reversed: HashSet<u64>,
}

impl InMemoryBalances {
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            inner: RwLock::new(BalanceState::default()),
        }
    }

    /// Mint `amount` into `account`. Not journaled; used to seed balances.
    pub fn credit(&self, account: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        let balance = state.balances.entry(*account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { account: *account })?;
        Ok(*balance)
    }

    /// All journal entries in application order.
    pub fn journal(&self) -> Result<Vec<TransferReceipt>, LedgerError> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(state.journal.clone())
    }

    /// Validate the journal hash chain and sequence numbering.
    pub fn validate_journal(&self) -> Result<(), LedgerError> {
        let journal = self.journal()?;

        for (index, receipt) in journal.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if receipt.seq != expected_seq {
                return Err(LedgerError::IntegrityViolation {
                    seq: receipt.seq,
                    reason: format!("expected seq {expected_seq}, found {}", receipt.seq),
                });
            }

            let expected_prev = index.checked_sub(1).map(|i| journal[i].receipt_hash);
            if receipt.prev_hash != expected_prev {
                return Err(LedgerError::IntegrityViolation {
                    seq: receipt.seq,
                    reason: "previous hash link mismatch".into(),
                });
            }

            if recompute_receipt_hash(receipt)? != receipt.receipt_hash {
                return Err(LedgerError::IntegrityViolation {
                    seq: receipt.seq,
                    reason: "receipt hash mismatch".into(),
                });
            }
        }

        Ok(())
    }

    /// Debit `from` and credit `to` in one step, then journal the movement.
    ///
    /// Both balance updates are computed before either is written, so a
    /// failure leaves the state untouched.
    fn apply(
        state: &mut BalanceState,
        kind: TransferKind,
        amount: Amount,
        from: &Address,
        to: &Address,
    ) -> Result<TransferReceipt, LedgerError> {
        let from_balance = state.balances.get(from).copied().unwrap_or(0);
        let debited = from_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                account: *from,
                balance: from_balance,
                requested: amount,
            })?;

        if from != to {
            let to_balance = state.balances.get(to).copied().unwrap_or(0);
            let credited = to_balance
                .checked_add(amount)
                .ok_or(LedgerError::BalanceOverflow { account: *to })?;
            state.balances.insert(*from, debited);
            state.balances.insert(*to, credited);
        }

        let mut receipt = TransferReceipt {
            seq: (state.journal.len() + 1) as u64,
            kind,
            from: *from,
            to: *to,
            amount,
            prev_hash: state.journal.last().map(|r| r.receipt_hash),
            receipt_hash: [0; 32],
        };
        receipt.receipt_hash = recompute_receipt_hash(&receipt)?;
        state.journal.push(receipt.clone());

        debug!(seq = receipt.seq, %from, %to, amount, "transfer applied");
        Ok(receipt)
    }
}

impl ValueTransfer for InMemoryBalances {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    fn balance_of(&self, account: &Address) -> Result<Amount, LedgerError> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(state.balances.get(account).copied().unwrap_or(0))
    }

    fn transfer(
        &self,
        amount: Amount,
        from: &Address,
        to: &Address,
    ) -> Result<TransferReceipt, LedgerError> {
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        Self::apply(&mut state, TransferKind::Transfer, amount, from, to)
    }

    fn reverse(&self, receipt: &TransferReceipt) -> Result<TransferReceipt, LedgerError> {
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;

        if receipt.is_reversal() {
            return Err(LedgerError::NotReversible);
        }

        let index = receipt
            .seq
            .checked_sub(1)
            .ok_or(LedgerError::ReceiptNotFound)? as usize;
        match state.journal.get(index) {
            Some(original) if original.receipt_hash == receipt.receipt_hash => {}
            _ => return Err(LedgerError::ReceiptNotFound),
        }
        if state.reversed.contains(&receipt.seq) {
            return Err(LedgerError::AlreadyReversed { seq: receipt.seq });
        }

        let reversal = Self::apply(
            &mut state,
            TransferKind::Reversal {
                reverses_seq: receipt.seq,
            },
            receipt.amount,
            &receipt.to,
            &receipt.from,
        )?;
        state.reversed.insert(receipt.seq);
        Ok(reversal)
    }
}

fn recompute_receipt_hash(receipt: &TransferReceipt) -> Result<[u8; 32], LedgerError> {
    let mut canonical = receipt.clone();
    canonical.receipt_hash = [0; 32];

    let encoded = serde_json::to_vec(&canonical)
        .map_err(|e| LedgerError::Serialization(e.to_string()))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"fund-transfer-v1:");
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}

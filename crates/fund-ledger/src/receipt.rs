use serde::{Deserialize, Serialize};

use fund_types::{Address, Amount};

/// Whether a journal entry is a forward transfer or the undo of one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Transfer,
    /// Compensates the transfer recorded at `reverses_seq`.
    Reversal { reverses_seq: u64 },
}

/// Journal record of an applied balance movement.
///
/// Receipts form a hash chain: each one commits to the hash of its
/// predecessor, so rewriting any past entry breaks every later link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub seq: u64,
    pub kind: TransferKind,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub prev_hash: Option<[u8; 32]>,
    pub receipt_hash: [u8; 32],
}

impl TransferReceipt {
    pub fn is_reversal(&self) -> bool {
        matches!(self.kind, TransferKind::Reversal { .. })
    }

    /// Short hex form of the receipt hash.
    pub fn short_hash(&self) -> String {
        hex::encode(&self.receipt_hash[..4])
    }
}

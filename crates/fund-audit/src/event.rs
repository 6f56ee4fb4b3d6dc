use serde::{Deserialize, Serialize};

use fund_types::{Address, BlockHeight};

/// Unique identifier for an audit event: the BLAKE3 hash of its content.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// Classification of audit events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ProjectRegistered,
    ProjectStatusChanged,
    AllocationUpdated,
    MilestoneAchieved,
    DistributionProposed,
    VoteCast,
    DistributionExecuted,
}

impl EventKind {
    /// The event name as recorded by the audit logger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectRegistered => "project-registered",
            Self::ProjectStatusChanged => "project-status-changed",
            Self::AllocationUpdated => "allocation-updated",
            Self::MilestoneAchieved => "milestone-achieved",
            Self::DistributionProposed => "distribution-proposed",
            Self::VoteCast => "vote-cast",
            Self::DistributionExecuted => "distribution-executed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit record.
///
/// Carries the event name, the id of the record it concerns (if any), the
/// address that triggered it, and the block height at which it happened,
/// plus a BLAKE3 integrity hash over those fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub subject_id: Option<u64>,
    pub sender: Address,
    pub block_height: BlockHeight,
    pub integrity_hash: [u8; 32],
}

impl AuditEvent {
    /// Build a new event, computing its integrity hash and id.
    pub fn new(
        kind: EventKind,
        subject_id: Option<u64>,
        sender: Address,
        block_height: BlockHeight,
    ) -> Self {
        let integrity_hash = Self::compute_integrity(kind, subject_id, &sender, block_height);
        Self {
            id: EventId::from_hash(integrity_hash),
            kind,
            subject_id,
            sender,
            block_height,
            integrity_hash,
        }
    }

    /// Verify the integrity hash matches the event's content.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_integrity(
            self.kind,
            self.subject_id,
            &self.sender,
            self.block_height,
        );
        self.integrity_hash == expected && self.id.hash == expected
    }

    fn compute_integrity(
        kind: EventKind,
        subject_id: Option<u64>,
        sender: &Address,
        block_height: BlockHeight,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"fund-audit-event-v1:");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        match subject_id {
            Some(id) => {
                hasher.update(&[1]);
                hasher.update(&id.to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(sender.as_bytes());
        hasher.update(&block_height.get().to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}

use crate::error::Result;
use crate::event::{AuditEvent, EventId};

/// Acknowledgement that an event was durably appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReceipt {
    /// Position of the event in the sink, starting at 1.
    pub seq: u64,
    pub event_id: EventId,
}

/// Append-only sink for audit events.
///
/// Implementations must be thread-safe. An `Err` means the event was NOT
/// recorded; callers must not treat the triggering operation as complete.
pub trait AuditLog: Send + Sync {
    /// Identifier of the audit logger contract backing this sink.
    fn contract_id(&self) -> &str;

    /// Append `event` to the log.
    fn log_event(&self, event: &AuditEvent) -> Result<AuditReceipt>;

    /// All recorded events in append order.
    fn events(&self) -> Result<Vec<AuditEvent>>;
}

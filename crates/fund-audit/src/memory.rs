use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracing::debug;

use crate::error::{AuditError, Result};
use crate::event::AuditEvent;
use crate::traits::{AuditLog, AuditReceipt};

/// In-memory audit sink for tests and embedding.
///
/// The sink can be switched offline with [`InMemoryAuditLog::set_available`]
/// to exercise failure handling in callers.
#[derive(Debug)]
pub struct InMemoryAuditLog {
    contract_id: String,
    events: RwLock<Vec<AuditEvent>>,
    available: AtomicBool,
}

impl InMemoryAuditLog {
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            events: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle whether appends succeed.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// The most recently appended event.
    pub fn last(&self) -> Option<AuditEvent> {
        self.events.read().ok().and_then(|events| events.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for InMemoryAuditLog {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    fn log_event(&self, event: &AuditEvent) -> Result<AuditReceipt> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable(format!(
                "{} is offline",
                self.contract_id
            )));
        }

        let mut events = self.events.write().map_err(|_| AuditError::LockPoisoned)?;
        events.push(event.clone());
        let seq = events.len() as u64;

        debug!(seq, kind = %event.kind, subject = ?event.subject_id, "audit event recorded");
        Ok(AuditReceipt {
            seq,
            event_id: event.id.clone(),
        })
    }

    fn events(&self) -> Result<Vec<AuditEvent>> {
        let events = self.events.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(events.clone())
    }
}

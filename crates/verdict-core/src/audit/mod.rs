//! Audit trail (part of C8, §3, §6).

pub mod event;
pub mod trail;

pub use event::{AuditEvent, AuditEventKind, AuditSeverity, ErrorRecord, PerformanceMetrics};
pub use trail::{BucketEvidenceTrail, DecisionTrail, LlmResponseSummary};

/// Assigns monotonically increasing sequence numbers within one pipeline run, used as the
/// emission-order tie-break for audit events that share a timestamp (§5: "Ordering guarantees").
pub struct AuditSession {
    pub session_id: String,
    next_sequence: std::sync::atomic::AtomicU64,
}

impl AuditSession {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            next_sequence: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn next_event(&self, kind: AuditEventKind, severity: AuditSeverity) -> AuditEvent {
        let sequence = self.next_sequence.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        AuditEvent::new(kind, severity, self.session_id.clone(), sequence)
    }
}

impl Default for AuditSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_monotonic_within_a_session() {
        let session = AuditSession::new();
        let a = session.next_event(AuditEventKind::ClassificationStarted, AuditSeverity::Info);
        let b = session.next_event(AuditEventKind::ClassificationCompleted, AuditSeverity::Info);
        assert!(b.sequence > a.sequence);
        assert_eq!(a.session_id, b.session_id);
    }
}

//! AuditLog mirroring onto the `audit.log` subject

use ekyc_events::{AuditEvent, Envelope, EventPayload};
use ekyc_store::AuditEntry;

/// Envelope announcing a persisted audit entry
pub fn audit_envelope(source_service: &str, entry: &AuditEntry) -> Envelope {
    Envelope::new(
        source_service,
        entry.correlation_id.clone(),
        entry.session_id.clone(),
        EventPayload::Audit(AuditEvent {
            audit_id: entry.id.clone(),
            action: entry.action.clone(),
            actor: entry.actor.clone(),
            details: entry.details.clone(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekyc_events::Subject;
    use serde_json::json;

    #[test]
    fn test_audit_envelope_mirrors_entry() {
        let details = json!({"score": "0.9"});
        let entry = AuditEntry::new("S-1", "decision.made", "system", "corr-1", details);
        let envelope = audit_envelope("kyc-service", &entry);

        assert_eq!(envelope.subject(), Subject::AuditLog);
        assert_eq!(envelope.session_id(), "S-1");
        assert_eq!(envelope.correlation_id(), "corr-1");
        match &envelope.data {
            EventPayload::Audit(event) => {
                assert_eq!(event.audit_id, entry.id);
                assert_eq!(event.action, "decision.made");
                assert_eq!(event.details["score"], "0.9");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{employee::CandidateId, requester::RequesterId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Verification,
    Linking,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// Record of a verification or linking step. Never carries a code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub requester_id: Option<RequesterId>,
    pub candidate_id: Option<CandidateId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        requester_id: Option<RequesterId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            requester_id,
            candidate_id: None,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_candidate(mut self, candidate_id: CandidateId) -> Self {
        self.candidate_id = Some(candidate_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes each event as a single JSON line through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(
                target: "staffbridge::audit",
                event_name = "audit.event",
                event_type = %event.event_type,
                correlation_id = %event.correlation_id,
                payload = %payload,
                "audit event"
            ),
            Err(error) => tracing::warn!(
                target: "staffbridge::audit",
                event_name = "audit.encode_failed",
                event_type = %event.event_type,
                error = %error,
                "audit event could not be encoded"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink},
        domain::{employee::CandidateId, requester::RequesterId},
    };

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                Some(RequesterId::from("tg-1001")),
                "req-123",
                "link.confirmed",
                AuditCategory::Linking,
                "linking-service",
                AuditOutcome::Success,
            )
            .with_candidate(CandidateId(42))
            .with_metadata("attempts", "1"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].requester_id.as_ref().map(RequesterId::as_str), Some("tg-1001"));
        assert_eq!(events[0].candidate_id, Some(CandidateId(42)));
        assert!(events[0].metadata.contains_key("attempts"));
    }

    #[test]
    fn events_serialize_with_snake_case_enums() {
        let event = AuditEvent::new(
            None,
            "sweep",
            "verification.cleanup",
            AuditCategory::System,
            "sweeper",
            AuditOutcome::Success,
        );
        let json = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(json["category"], "system");
        assert_eq!(json["outcome"], "success");
    }
}

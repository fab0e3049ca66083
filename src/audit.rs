// 📜 Audit Trail - append-only, hash-chained record of every funding action
//
// Every event stores the hash of the event before it and a SHA-256 over its
// own canonical content. Rewriting or deleting any past event breaks the chain
// at that point, which `verify_audit_chain` reports.

use crate::clock::format_timestamp;
use crate::error::Result;
use crate::store::AuditLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const ENTITY_DRAW_REQUEST: &str = "draw_request";
pub const ENTITY_WIRE_BATCH: &str = "wire_batch";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,

    pub timestamp: DateTime<Utc>,

    /// Hash of the previous event in the log (None for the first event)
    #[serde(default)]
    pub prev_hash: Option<String>,

    /// Filled in by the store when the event is appended
    #[serde(default)]
    pub hash: String,
}

impl AuditEvent {
    pub fn new(
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor: actor.to_string(),
            before: None,
            after: None,
            timestamp,
            prev_hash: None,
            hash: String::new(),
        }
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }

    /// SHA-256 over the canonical content, chained to `prev_hash`.
    pub fn compute_hash(&self, prev_hash: Option<&str>) -> String {
        // serde_json::Value objects are BTreeMaps: key order is canonical
        let canonical = serde_json::json!({
            "id": self.id,
            "entity_type": self.entity_type,
            "entity_id": self.entity_id,
            "action": self.action,
            "actor": self.actor,
            "before": self.before,
            "after": self.after,
            "timestamp": format_timestamp(self.timestamp),
            "prev_hash": prev_hash,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Link this event after `prev_hash` and stamp its own hash.
    pub fn seal(mut self, prev_hash: Option<String>) -> Self {
        self.hash = self.compute_hash(prev_hash.as_deref());
        self.prev_hash = prev_hash;
        self
    }
}

// ============================================================================
// CHAIN VERIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditChainReport {
    pub events_checked: usize,

    /// First event whose link or hash does not verify
    pub first_broken: Option<String>,
}

impl AuditChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

pub fn verify_audit_chain<S: AuditLog + ?Sized>(log: &S) -> Result<AuditChainReport> {
    let events = log.all_events()?;
    let mut prev: Option<String> = None;

    for (checked, event) in events.iter().enumerate() {
        let link_ok = event.prev_hash == prev;
        let hash_ok = event.compute_hash(event.prev_hash.as_deref()) == event.hash;

        if !link_ok || !hash_ok {
            tracing::warn!(event_id = %event.id, position = checked, "audit chain broken");
            return Ok(AuditChainReport {
                events_checked: checked,
                first_broken: Some(event.id.clone()),
            });
        }
        prev = Some(event.hash.clone());
    }

    Ok(AuditChainReport {
        events_checked: events.len(),
        first_broken: None,
    })
}

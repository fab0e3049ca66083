// 🪜 Draw Status Transitions
//
// draft → review → approved → staged       (operator driven, audited)
//            └──→ rejected
// staged → funded happens only inside WireBatchFunder.

use crate::audit::{AuditEvent, ENTITY_DRAW_REQUEST};
use crate::clock::Clock;
use crate::entities::{DrawRequest, DrawStatus};
use crate::error::{EngineError, Result};
use crate::store::{AuditLog, DrawRecords};
use serde_json::json;
use tracing::info;

pub fn transition_draw<S>(
    store: &S,
    clock: &dyn Clock,
    actor: &str,
    draw_id: &str,
    to: DrawStatus,
) -> Result<DrawRequest>
where
    S: DrawRecords + AuditLog + ?Sized,
{
    let mut draw = store
        .draw(draw_id)?
        .ok_or_else(|| EngineError::NotFound(format!("draw request {}", draw_id)))?;
    let from = draw.status;

    if !from.can_transition_to(to) {
        return Err(EngineError::InvalidTransition(format!(
            "draw {} cannot move from {} to {}",
            draw_id,
            from.as_str(),
            to.as_str()
        )));
    }

    // Conditional on the status we just read; a concurrent change loses here
    if !store.update_draw_status(draw_id, from, to)? {
        return Err(EngineError::InvalidTransition(format!(
            "draw {} is no longer {}",
            draw_id,
            from.as_str()
        )));
    }
    draw.status = to;

    store.append_event(
        AuditEvent::new(ENTITY_DRAW_REQUEST, draw_id, "status_changed", actor, clock.now())
            .with_before(json!({ "status": from.as_str() }))
            .with_after(json!({ "status": to.as_str() })),
    )?;

    info!(draw_id, from = from.as_str(), to = to.as_str(), "draw status changed");
    Ok(draw)
}

// 💸 Wire Batch Funder - move a set of staged draws into one funded wire batch
//
// Preconditions are all checked before anything is written:
//   builder id present → draw ids present → funded_at parses
//   → every draw exists → every draw is staged
//
// Once they hold, funding is best-effort per draw: the batch row is written
// first, then each draw goes through the conditional staged → funded update.
// A draw that fails is reported and audited on the batch, never rolled back.

use crate::audit::{AuditEvent, ENTITY_DRAW_REQUEST, ENTITY_WIRE_BATCH};
use crate::clock::{format_timestamp, Clock};
use crate::entities::{DrawStatus, WireBatch};
use crate::error::{EngineError, Result};
use crate::store::{AuditLog, BatchRecords, DrawRecords};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::{error, info, warn};

pub const DEFAULT_ACTOR: &str = "draw-engine";

/// Request body of the funding call. Every field is optional at the type
/// level so a missing one surfaces as `MissingField` rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingRequest {
    #[serde(default)]
    pub builder_id: Option<String>,

    #[serde(default)]
    pub draw_ids: Option<Vec<String>>,

    #[serde(default)]
    pub funded_at: Option<String>,

    #[serde(default)]
    pub wire_reference: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl FundingRequest {
    pub fn new(builder_id: &str, draw_ids: &[&str], funded_at: &str) -> Self {
        FundingRequest {
            builder_id: Some(builder_id.to_string()),
            draw_ids: Some(draw_ids.iter().map(|id| id.to_string()).collect()),
            funded_at: Some(funded_at.to_string()),
            wire_reference: None,
            notes: None,
        }
    }

    pub fn with_wire_reference(mut self, reference: &str) -> Self {
        self.wire_reference = Some(reference.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDraw {
    pub draw_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingResult {
    pub batch_id: String,
    pub funded_at: DateTime<Utc>,
    pub draw_count: usize,
    pub total_amount: f64,
    pub funded_draw_ids: Vec<String>,

    /// Draws left unfunded; the batch total no longer matches them
    pub failed_draws: Vec<FailedDraw>,
}

impl FundingResult {
    pub fn is_complete(&self) -> bool {
        self.failed_draws.is_empty()
    }
}

/// Accepts full RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_funded_at(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| EngineError::InvalidDate(value.to_string()))
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

struct ValidatedRequest {
    builder_id: String,
    draw_ids: Vec<String>,
    funded_at: DateTime<Utc>,
}

fn validate(request: &FundingRequest) -> Result<ValidatedRequest> {
    let builder_id = non_blank(&request.builder_id).ok_or(EngineError::MissingField("builder_id"))?;

    let mut seen = HashSet::new();
    let draw_ids: Vec<String> = request
        .draw_ids
        .iter()
        .flatten()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect();
    if draw_ids.is_empty() {
        return Err(EngineError::MissingField("draw_ids"));
    }

    let funded_at = non_blank(&request.funded_at).ok_or(EngineError::MissingField("funded_at"))?;
    let funded_at = parse_funded_at(funded_at)?;

    Ok(ValidatedRequest {
        builder_id: builder_id.to_string(),
        draw_ids,
        funded_at,
    })
}

pub struct WireBatchFunder<'s, S: ?Sized> {
    store: &'s S,
    clock: &'s dyn Clock,
    actor: String,
}

impl<'s, S> WireBatchFunder<'s, S>
where
    S: DrawRecords + BatchRecords + AuditLog + ?Sized,
{
    pub fn new(store: &'s S, clock: &'s dyn Clock) -> Self {
        WireBatchFunder {
            store,
            clock,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn fund(&self, request: &FundingRequest) -> Result<FundingResult> {
        let ValidatedRequest {
            builder_id,
            draw_ids,
            funded_at,
        } = validate(request)?;

        // ====================================================================
        // PRECONDITIONS
        // ====================================================================

        let draws = self.store.draws_by_ids(&draw_ids)?;
        if draws.len() != draw_ids.len() {
            let found: HashSet<&str> = draws.iter().map(|d| d.id.as_str()).collect();
            let missing = draw_ids
                .iter()
                .filter(|id| !found.contains(id.as_str()))
                .cloned()
                .collect();
            return Err(EngineError::DrawCountMismatch {
                expected: draw_ids.len(),
                found: draws.len(),
                missing,
            });
        }

        // Staged but already linked to a batch counts as an offender too.
        // Report offenders in request order
        let not_staged: HashSet<&str> = draws
            .iter()
            .filter(|d| d.status != DrawStatus::Staged || d.wire_batch_id.is_some())
            .map(|d| d.id.as_str())
            .collect();
        if !not_staged.is_empty() {
            let ids = draw_ids
                .iter()
                .filter(|id| not_staged.contains(id.as_str()))
                .cloned()
                .collect();
            return Err(EngineError::InvalidDrawStatus { ids });
        }

        // ====================================================================
        // BATCH + PER-DRAW FAN-OUT
        // ====================================================================

        let total_amount = round_cents(draws.iter().map(|d| d.total_amount).sum());
        let batch = WireBatch::funded(
            &builder_id,
            total_amount,
            funded_at,
            request.wire_reference.clone(),
            request.notes.clone(),
            self.clock.now(),
        );
        self.store.insert_wire_batch(&batch)?;

        let mut funded_draw_ids = Vec::new();
        let mut failed_draws = Vec::new();

        for draw_id in &draw_ids {
            match self.store.fund_draw_if_staged(draw_id, &batch.id, funded_at) {
                Ok(true) => {
                    let event = AuditEvent::new(
                        ENTITY_DRAW_REQUEST,
                        draw_id,
                        "funded",
                        &self.actor,
                        self.clock.now(),
                    )
                    .with_before(json!({ "status": DrawStatus::Staged.as_str() }))
                    .with_after(json!({
                        "status": DrawStatus::Funded.as_str(),
                        "wire_batch_id": batch.id,
                        "funded_at": format_timestamp(funded_at),
                    }));
                    self.append(event);
                    funded_draw_ids.push(draw_id.clone());
                }
                Ok(false) => {
                    warn!(draw_id = %draw_id, batch_id = %batch.id, "draw no longer staged, skipped");
                    failed_draws.push(FailedDraw {
                        draw_id: draw_id.clone(),
                        reason: "draw was no longer staged or already batched".to_string(),
                    });
                }
                Err(e) => {
                    error!(draw_id = %draw_id, batch_id = %batch.id, error = %e, "failed to fund draw");
                    failed_draws.push(FailedDraw {
                        draw_id: draw_id.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        if !failed_draws.is_empty() {
            warn!(
                batch_id = %batch.id,
                failed = failed_draws.len(),
                "wire batch funded incompletely, needs manual reconciliation"
            );
            let event = AuditEvent::new(
                ENTITY_WIRE_BATCH,
                &batch.id,
                "funding_incomplete",
                &self.actor,
                self.clock.now(),
            )
            .with_after(json!({
                "batch_total": total_amount,
                "funded_draw_ids": funded_draw_ids,
                "failed_draws": failed_draws,
            }));
            self.append(event);
        }

        let summary = AuditEvent::new(
            ENTITY_WIRE_BATCH,
            &batch.id,
            "created_and_funded",
            &self.actor,
            self.clock.now(),
        )
        .with_after(json!({
            "builder_id": builder_id,
            "draw_count": draw_ids.len(),
            "total_amount": total_amount,
            "funded_at": format_timestamp(funded_at),
            "wire_reference": request.wire_reference,
        }));
        self.append(summary);

        info!(
            batch_id = %batch.id,
            builder_id = %builder_id,
            draws = draw_ids.len(),
            funded = funded_draw_ids.len(),
            total_amount,
            "wire batch funded"
        );

        Ok(FundingResult {
            batch_id: batch.id,
            funded_at,
            draw_count: draw_ids.len(),
            total_amount,
            funded_draw_ids,
            failed_draws,
        })
    }

    // The mutation already happened; a lost audit row is logged, not raised
    fn append(&self, event: AuditEvent) {
        let action = event.action.clone();
        let entity_id = event.entity_id.clone();
        if let Err(e) = self.store.append_event(event) {
            error!(action = %action, entity_id = %entity_id, error = %e, "failed to append audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::SqliteStore;
    use crate::entities::{DrawRequest, WireBatchStatus};

    fn create_test_clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap())
    }

    fn add_draw(store: &SqliteStore, status: DrawStatus, total: f64) -> DrawRequest {
        let draw = DrawRequest::new("p1", status, total);
        store.insert_draw(&draw).unwrap();
        draw
    }

    #[test]
    fn test_funds_two_staged_draws() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let d1 = add_draw(&store, DrawStatus::Staged, 1000.0);
        let d2 = add_draw(&store, DrawStatus::Staged, 2000.0);

        let request = FundingRequest::new("B", &[&d1.id, &d2.id], "2025-03-08")
            .with_wire_reference("WIRE-889");
        let result = WireBatchFunder::new(&store, &clock).fund(&request).unwrap();

        assert_eq!(result.total_amount, 3000.0);
        assert_eq!(result.draw_count, 2);
        assert!(result.is_complete());
        assert_eq!(
            result.funded_at,
            Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap()
        );

        let batch = store.wire_batch(&result.batch_id).unwrap().unwrap();
        assert_eq!(batch.status, WireBatchStatus::Funded);
        assert_eq!(batch.total_amount, 3000.0);
        assert_eq!(batch.submitted_at, result.funded_at);

        for id in [&d1.id, &d2.id] {
            let draw = store.draw(id).unwrap().unwrap();
            assert_eq!(draw.status, DrawStatus::Funded);
            assert_eq!(draw.wire_batch_id.as_deref(), Some(result.batch_id.as_str()));
        }

        let events = store.all_events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].action, "created_and_funded");
        assert_eq!(events[2].entity_id, result.batch_id);
    }

    #[test]
    fn test_rejects_non_staged_with_exact_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let d1 = add_draw(&store, DrawStatus::Staged, 1000.0);
        let d2 = add_draw(&store, DrawStatus::Approved, 500.0);
        let d3 = add_draw(&store, DrawStatus::Draft, 250.0);

        let request = FundingRequest::new("B", &[&d1.id, &d2.id, &d3.id], "2025-03-08");
        let err = WireBatchFunder::new(&store, &clock).fund(&request).unwrap_err();

        match err {
            EngineError::InvalidDrawStatus { ids } => assert_eq!(ids, vec![d2.id, d3.id]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.table_count("wire_batches").unwrap(), 0);
        assert_eq!(store.table_count("audit_events").unwrap(), 0);
        assert_eq!(store.draw(&d1.id).unwrap().unwrap().status, DrawStatus::Staged);
    }

    #[test]
    fn test_rejects_staged_draw_already_in_a_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let fresh = add_draw(&store, DrawStatus::Staged, 1000.0);
        let mut linked = DrawRequest::new("p1", DrawStatus::Staged, 500.0);
        linked.wire_batch_id = Some("older-batch".to_string());
        store.insert_draw(&linked).unwrap();

        let request = FundingRequest::new("B", &[&fresh.id, &linked.id], "2025-03-08");
        let err = WireBatchFunder::new(&store, &clock).fund(&request).unwrap_err();

        match err {
            EngineError::InvalidDrawStatus { ids } => assert_eq!(ids, vec![linked.id.clone()]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.table_count("wire_batches").unwrap(), 0);
        assert_eq!(store.table_count("audit_events").unwrap(), 0);
        assert_eq!(store.draw(&fresh.id).unwrap().unwrap().status, DrawStatus::Staged);
    }

    #[test]
    fn test_missing_draw_reports_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let d1 = add_draw(&store, DrawStatus::Staged, 1000.0);

        let request = FundingRequest::new("B", &[&d1.id, "ghost"], "2025-03-08");
        let err = WireBatchFunder::new(&store, &clock).fund(&request).unwrap_err();

        match err {
            EngineError::DrawCountMismatch {
                expected,
                found,
                missing,
            } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
                assert_eq!(missing, vec!["ghost".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.table_count("wire_batches").unwrap(), 0);
    }

    #[test]
    fn test_validation_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let funder = WireBatchFunder::new(&store, &clock);

        let err = funder.fund(&FundingRequest::default()).unwrap_err();
        assert_eq!(err.reason(), "missing_field");
        assert!(err.to_string().contains("builder_id"));

        let err = funder
            .fund(&FundingRequest::new("B", &[], "2025-03-08"))
            .unwrap_err();
        assert!(err.to_string().contains("draw_ids"));

        let err = funder
            .fund(&FundingRequest::new("B", &["d1"], "next tuesday"))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid_date");
    }

    #[test]
    fn test_duplicate_ids_collapsed() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = create_test_clock();
        let d1 = add_draw(&store, DrawStatus::Staged, 1234.565);

        let request = FundingRequest::new("B", &[&d1.id, &d1.id], "2025-03-08T14:30:00Z");
        let result = WireBatchFunder::new(&store, &clock).fund(&request).unwrap();

        assert_eq!(result.draw_count, 1);
        assert_eq!(result.funded_draw_ids, vec![d1.id]);
        assert_eq!(store.all_events().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_funded_at_forms() {
        assert_eq!(
            parse_funded_at("2025-01-31").unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_funded_at("2025-01-31T10:00:00-05:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 15, 0, 0).unwrap()
        );
        assert!(parse_funded_at("2025-02-30").is_err());
        assert!(parse_funded_at("").is_err());
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(1000.0 + 2000.0), 3000.0);
    }
}

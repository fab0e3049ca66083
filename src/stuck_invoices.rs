// ⏳ Stuck Invoice Reconciler - foreclose on an extraction worker that never called back
//
// pending(status_detail=processing), older than the cutoff
//   → error(status_detail=error, reconciled=true)
//
// The reconciler does not cancel or restart the external work. With
// auto_retry_once it only marks `auto_retry_attempted` so an external trigger
// can re-submit the file exactly once.

use crate::clock::Clock;
use crate::entities::InvoiceStatus;
use crate::error::{EngineError, Result};
use crate::store::InvoiceRecords;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_STUCK_AFTER_MINUTES: i64 = 10;

fn default_older_than_minutes() -> f64 {
    DEFAULT_STUCK_AFTER_MINUTES as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckInvoiceFilter {
    #[serde(default)]
    pub draw_request_id: Option<String>,

    /// Fractional minutes allowed (7.5 = 7m30s)
    #[serde(default = "default_older_than_minutes")]
    pub older_than_minutes: f64,

    #[serde(default)]
    pub auto_retry_once: bool,
}

impl Default for StuckInvoiceFilter {
    fn default() -> Self {
        StuckInvoiceFilter {
            draw_request_id: None,
            older_than_minutes: default_older_than_minutes(),
            auto_retry_once: false,
        }
    }
}

impl StuckInvoiceFilter {
    pub fn for_draw(draw_request_id: &str) -> Self {
        StuckInvoiceFilter {
            draw_request_id: Some(draw_request_id.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckReconcileReport {
    pub draw_request_id: Option<String>,
    pub cutoff: DateTime<Utc>,
    pub scanned: usize,
    pub marked_error: usize,
    pub skipped: usize,
    pub marked_ids: Vec<String>,

    /// Subset of marked_ids flagged for the one external retry
    pub retry_ids: Vec<String>,

    /// Invoices whose update failed; still eligible next run
    pub failed_ids: Vec<String>,
}

pub fn timeout_message(older_than_minutes: f64) -> String {
    format!(
        "Invoice processing timed out: no completion callback within {} minutes",
        older_than_minutes
    )
}

pub struct StuckProcessReconciler<'s, S: ?Sized> {
    store: &'s S,
    clock: &'s dyn Clock,
}

impl<'s, S> StuckProcessReconciler<'s, S>
where
    S: InvoiceRecords + ?Sized,
{
    pub fn new(store: &'s S, clock: &'s dyn Clock) -> Self {
        StuckProcessReconciler { store, clock }
    }

    pub fn reconcile(&self, filter: &StuckInvoiceFilter) -> Result<StuckReconcileReport> {
        if !filter.older_than_minutes.is_finite() || filter.older_than_minutes < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "olderThanMinutes must be a number >= 0, got {}",
                filter.older_than_minutes
            )));
        }

        let now = self.clock.now();
        let age_ms = (filter.older_than_minutes * 60_000.0).round() as i64;
        let cutoff = Duration::try_milliseconds(age_ms)
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!(
                    "olderThanMinutes {} is out of range",
                    filter.older_than_minutes
                ))
            })?;

        let candidates = self
            .store
            .pending_invoices_before(cutoff, filter.draw_request_id.as_deref())?;

        let mut report = StuckReconcileReport {
            draw_request_id: filter.draw_request_id.clone(),
            cutoff,
            scanned: candidates.len(),
            marked_error: 0,
            skipped: 0,
            marked_ids: Vec::new(),
            retry_ids: Vec::new(),
            failed_ids: Vec::new(),
        };
        let message = timeout_message(filter.older_than_minutes);

        for invoice in candidates {
            let mut flags = invoice.flags.clone();

            // Completed out-of-band, never entered processing, or already handled
            let retry = match flags.mark_timed_out(message.clone(), now, filter.auto_retry_once) {
                Ok(retry) => retry,
                Err(_) => {
                    debug!(invoice_id = %invoice.id, status_detail = ?invoice.flags.status_detail, "skipping invoice");
                    report.skipped += 1;
                    continue;
                }
            };

            match self
                .store
                .update_invoice_state(&invoice.id, InvoiceStatus::Error, &flags)
            {
                Ok(()) => {
                    report.marked_error += 1;
                    if retry {
                        report.retry_ids.push(invoice.id.clone());
                    }
                    report.marked_ids.push(invoice.id);
                }
                Err(e) => {
                    warn!(invoice_id = %invoice.id, error = %e, "failed to mark stuck invoice");
                    report.failed_ids.push(invoice.id);
                }
            }
        }

        info!(
            cutoff = %cutoff,
            scanned = report.scanned,
            marked_error = report.marked_error,
            skipped = report.skipped,
            failed = report.failed_ids.len(),
            "stuck invoice reconciliation finished"
        );

        Ok(report)
    }
}

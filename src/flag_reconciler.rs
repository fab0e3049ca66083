// 🚩 Invoice Flag Reconciler - keep NO_INVOICE in step with invoice linkage
//
// NO_INVOICE holds iff:
//   amount_requested > 0  AND  no invoice linked (by id or matched amount)
//   AND the draw has at least one invoice uploaded
//
// A draw with zero invoices never carries the flag: lines that still hold it
// (last invoice deleted, draw cleared) lose it.
//
// Runs after every invoice create/delete. Writes only lines whose flag
// actually changes, so a second run with no data change writes nothing.
// Internal housekeeping: no audit events.

use crate::entities::LineFlag;
use crate::error::Result;
use crate::store::{DrawRecords, InvoiceRecords};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagReconcileReport {
    pub draw_request_id: String,
    pub invoice_count: usize,
    pub lines_checked: usize,

    /// Lines that gained NO_INVOICE
    pub flagged: Vec<String>,

    /// Lines that lost NO_INVOICE
    pub cleared: Vec<String>,

    /// Lines whose update failed; they stay as they were until the next run
    pub failed: Vec<String>,
}

impl FlagReconcileReport {
    pub fn writes(&self) -> usize {
        self.flagged.len() + self.cleared.len()
    }
}

pub struct InvoiceFlagReconciler<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> InvoiceFlagReconciler<'s, S>
where
    S: DrawRecords + InvoiceRecords + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        InvoiceFlagReconciler { store }
    }

    pub fn reconcile(&self, draw_request_id: &str) -> Result<FlagReconcileReport> {
        let lines = self.store.lines_for_draw(draw_request_id)?;
        let invoices = self.store.invoices_for_draw(draw_request_id)?;

        let mut report = FlagReconcileReport {
            draw_request_id: draw_request_id.to_string(),
            invoice_count: invoices.len(),
            ..Default::default()
        };

        // No uploads (yet, or any more): the flag can only be removed
        let has_invoices = !invoices.is_empty();
        if !has_invoices {
            debug!(draw_request_id, "no invoices uploaded, clearing stale NO_INVOICE only");
        }

        for mut line in lines {
            report.lines_checked += 1;

            let needs_invoice = has_invoices && line.needs_invoice();
            if line.has_flag(LineFlag::NoInvoice) == needs_invoice {
                continue;
            }
            line.set_flag(LineFlag::NoInvoice, needs_invoice);

            match self.store.update_line_flags(&line.id, &line.flags) {
                Ok(()) if needs_invoice => report.flagged.push(line.id),
                Ok(()) => report.cleared.push(line.id),
                Err(e) => {
                    warn!(draw_request_id, line_id = %line.id, error = %e, "failed to persist NO_INVOICE flag");
                    report.failed.push(line.id);
                }
            }
        }

        info!(
            draw_request_id,
            checked = report.lines_checked,
            flagged = report.flagged.len(),
            cleared = report.cleared.len(),
            failed = report.failed.len(),
            "invoice flags reconciled"
        );

        Ok(report)
    }
}

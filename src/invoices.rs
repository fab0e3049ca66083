// 📥 Invoice Lifecycle - upload, worker completion, delete, bulk clear
//
// Every operation that changes which invoices a draw has ends by re-running
// the flag reconciler for that draw, so NO_INVOICE never lags behind.

use crate::clock::Clock;
use crate::entities::{Invoice, InvoiceStatus};
use crate::error::{EngineError, Result};
use crate::flag_reconciler::{FlagReconcileReport, InvoiceFlagReconciler};
use crate::store::{DrawRecords, InvoiceRecords};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceChange {
    pub invoice: Invoice,
    pub flags: FlagReconcileReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearedInvoices {
    pub draw_request_id: String,
    pub removed: usize,

    /// Storage keys the caller should delete from file storage
    pub file_refs: Vec<String>,
    pub flags: FlagReconcileReport,
}

pub struct InvoiceService<'s, S: ?Sized> {
    store: &'s S,
    clock: &'s dyn Clock,
}

impl<'s, S> InvoiceService<'s, S>
where
    S: DrawRecords + InvoiceRecords + ?Sized,
{
    pub fn new(store: &'s S, clock: &'s dyn Clock) -> Self {
        InvoiceService { store, clock }
    }

    fn reconcile_flags(&self, draw_request_id: &str) -> Result<FlagReconcileReport> {
        InvoiceFlagReconciler::new(self.store).reconcile(draw_request_id)
    }

    /// New upload, handed to the extraction worker (`status_detail = processing`).
    pub fn record_upload(
        &self,
        draw_request_id: &str,
        file_ref: Option<String>,
    ) -> Result<InvoiceChange> {
        if self.store.draw(draw_request_id)?.is_none() {
            return Err(EngineError::NotFound(format!("draw request {}", draw_request_id)));
        }

        let invoice = Invoice::uploaded(draw_request_id, file_ref, self.clock.now());
        self.store.insert_invoice(&invoice)?;
        info!(invoice_id = %invoice.id, draw_request_id, "invoice uploaded");

        let flags = self.reconcile_flags(draw_request_id)?;
        Ok(InvoiceChange { invoice, flags })
    }

    /// Completion callback from the worker. Refused once the stuck reconciler
    /// has already closed the invoice out.
    pub fn complete_processing(&self, invoice_id: &str) -> Result<InvoiceChange> {
        let mut invoice = self
            .store
            .invoice(invoice_id)?
            .ok_or_else(|| EngineError::NotFound(format!("invoice {}", invoice_id)))?;

        if invoice.flags.reconciled {
            return Err(EngineError::InvalidTransition(format!(
                "invoice {} was already timed out by reconciliation",
                invoice_id
            )));
        }

        invoice.flags.mark_complete(self.clock.now())?;
        invoice.status = InvoiceStatus::Complete;
        self.store
            .update_invoice_state(&invoice.id, invoice.status, &invoice.flags)?;
        info!(invoice_id, "invoice processing complete");

        let flags = self.reconcile_flags(&invoice.draw_request_id)?;
        Ok(InvoiceChange { invoice, flags })
    }

    pub fn delete_invoice(&self, invoice_id: &str) -> Result<InvoiceChange> {
        let invoice = self
            .store
            .delete_invoice(invoice_id)?
            .ok_or_else(|| EngineError::NotFound(format!("invoice {}", invoice_id)))?;
        info!(invoice_id, draw_request_id = %invoice.draw_request_id, "invoice deleted");

        let flags = self.reconcile_flags(&invoice.draw_request_id)?;
        Ok(InvoiceChange { invoice, flags })
    }

    /// Removes every invoice of a draw.
    pub fn clear_invoices(&self, draw_request_id: &str) -> Result<ClearedInvoices> {
        let removed = self.store.delete_invoices_for_draw(draw_request_id)?;
        let file_refs = removed
            .iter()
            .filter_map(|invoice| invoice.file_ref.clone())
            .collect();
        info!(draw_request_id, removed = removed.len(), "invoices cleared");

        let flags = self.reconcile_flags(draw_request_id)?;
        Ok(ClearedInvoices {
            draw_request_id: draw_request_id.to_string(),
            removed: removed.len(),
            file_refs,
            flags,
        })
    }
}

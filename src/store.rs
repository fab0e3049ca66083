// 🗃️ Record Access Interface
//
// The engine reads and writes persisted records only through these traits.
// `SqliteStore` (db.rs) is the shipped implementation; anything offering
// per-row reads and the conditional draw update can stand in for it.
//
// Split by record family so each component only asks for what it touches:
//   InvoiceFlagReconciler  → DrawRecords + InvoiceRecords
//   StuckProcessReconciler → InvoiceRecords
//   WireBatchFunder        → DrawRecords + BatchRecords + AuditLog

use crate::audit::AuditEvent;
use crate::entities::{
    BudgetLine, DrawRequest, DrawRequestLine, DrawStatus, Invoice, InvoiceFlags, InvoiceStatus,
    LineFlag, WireBatch,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub trait BudgetRecords {
    fn insert_budget_line(&self, line: &BudgetLine) -> Result<()>;
    fn budget_lines_for_project(&self, project_id: &str) -> Result<Vec<BudgetLine>>;
}

pub trait DrawRecords {
    fn insert_draw(&self, draw: &DrawRequest) -> Result<()>;
    fn draw(&self, id: &str) -> Result<Option<DrawRequest>>;
    fn draws_by_ids(&self, ids: &[String]) -> Result<Vec<DrawRequest>>;

    /// Move `id` from `from` to `to` only if it is still in `from`.
    /// Returns false when the row was not in `from` (or does not exist).
    fn update_draw_status(&self, id: &str, from: DrawStatus, to: DrawStatus) -> Result<bool>;

    /// Atomically `staged → funded` with batch link, only if the draw is still
    /// staged and unbatched. Returns false when another writer got there first.
    fn fund_draw_if_staged(&self, id: &str, batch_id: &str, funded_at: DateTime<Utc>)
        -> Result<bool>;

    fn insert_line(&self, line: &DrawRequestLine) -> Result<()>;
    fn line(&self, id: &str) -> Result<Option<DrawRequestLine>>;
    fn lines_for_draw(&self, draw_id: &str) -> Result<Vec<DrawRequestLine>>;
    fn update_line_flags(&self, line_id: &str, flags: &BTreeSet<LineFlag>) -> Result<()>;

    /// Persist invoice link, matched amount, confidence and flags of a line.
    fn update_line_match(&self, line: &DrawRequestLine) -> Result<()>;
}

pub trait InvoiceRecords {
    fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;
    fn invoice(&self, id: &str) -> Result<Option<Invoice>>;
    fn invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>>;

    /// `status = pending` and `created_at < cutoff`, oldest first.
    fn pending_invoices_before(
        &self,
        cutoff: DateTime<Utc>,
        draw_id: Option<&str>,
    ) -> Result<Vec<Invoice>>;

    fn update_invoice_state(&self, id: &str, status: InvoiceStatus, flags: &InvoiceFlags)
        -> Result<()>;

    /// Deletes the invoice and unlinks any line pointing at it.
    fn delete_invoice(&self, id: &str) -> Result<Option<Invoice>>;

    /// Bulk clear for one draw. Returns the removed invoices.
    fn delete_invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>>;
}

pub trait BatchRecords {
    fn insert_wire_batch(&self, batch: &WireBatch) -> Result<()>;
    fn wire_batch(&self, id: &str) -> Result<Option<WireBatch>>;
    fn draws_for_batch(&self, batch_id: &str) -> Result<Vec<DrawRequest>>;
}

pub trait AuditLog {
    /// Chains and stores the event; returns it sealed.
    fn append_event(&self, event: AuditEvent) -> Result<AuditEvent>;
    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEvent>>;

    /// Whole log in append order.
    fn all_events(&self) -> Result<Vec<AuditEvent>>;
}

/// Everything at once, for callers (CLI, server) that hold one store.
pub trait DrawStore: BudgetRecords + DrawRecords + InvoiceRecords + BatchRecords + AuditLog {}

impl<T> DrawStore for T where
    T: BudgetRecords + DrawRecords + InvoiceRecords + BatchRecords + AuditLog
{
}

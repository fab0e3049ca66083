// Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use draw_engine::audit::AuditEvent;
use draw_engine::{
    AuditLog, BatchRecords, BudgetRecords, BudgetLine, DrawRecords, DrawRequest, DrawRequestLine,
    DrawStatus, FixedClock, Invoice, InvoiceFlags, InvoiceRecords, InvoiceStatus, LineFlag,
    SqliteStore, WireBatch,
};
use std::collections::{BTreeSet, HashSet};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 14, 13, 0, 0).unwrap()
}

pub fn create_test_clock() -> FixedClock {
    FixedClock::new(t0())
}

pub fn create_test_store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

pub fn add_draw(store: &dyn DrawRecords, status: DrawStatus, total: f64) -> DrawRequest {
    let draw = DrawRequest::new("project-1", status, total);
    store.insert_draw(&draw).unwrap();
    draw
}

/// SqliteStore that fails (or loses the conditional race) for chosen ids.
pub struct FlakyStore {
    pub inner: SqliteStore,
    pub fail_fund: HashSet<String>,
    pub lose_race: HashSet<String>,
    pub fail_invoice_update: HashSet<String>,
    pub fail_line_update: HashSet<String>,
    pub fail_audit: bool,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        FlakyStore {
            inner,
            fail_fund: HashSet::new(),
            lose_race: HashSet::new(),
            fail_invoice_update: HashSet::new(),
            fail_line_update: HashSet::new(),
            fail_audit: false,
        }
    }
}

impl BudgetRecords for FlakyStore {
    fn insert_budget_line(&self, line: &BudgetLine) -> Result<()> {
        self.inner.insert_budget_line(line)
    }

    fn budget_lines_for_project(&self, project_id: &str) -> Result<Vec<BudgetLine>> {
        self.inner.budget_lines_for_project(project_id)
    }
}

impl DrawRecords for FlakyStore {
    fn insert_draw(&self, draw: &DrawRequest) -> Result<()> {
        self.inner.insert_draw(draw)
    }

    fn draw(&self, id: &str) -> Result<Option<DrawRequest>> {
        self.inner.draw(id)
    }

    fn draws_by_ids(&self, ids: &[String]) -> Result<Vec<DrawRequest>> {
        self.inner.draws_by_ids(ids)
    }

    fn update_draw_status(&self, id: &str, from: DrawStatus, to: DrawStatus) -> Result<bool> {
        self.inner.update_draw_status(id, from, to)
    }

    fn fund_draw_if_staged(&self, id: &str, batch_id: &str, funded_at: DateTime<Utc>) -> Result<bool> {
        if self.fail_fund.contains(id) {
            bail!("disk I/O error while funding {}", id);
        }
        if self.lose_race.contains(id) {
            return Ok(false);
        }
        self.inner.fund_draw_if_staged(id, batch_id, funded_at)
    }

    fn insert_line(&self, line: &DrawRequestLine) -> Result<()> {
        self.inner.insert_line(line)
    }

    fn line(&self, id: &str) -> Result<Option<DrawRequestLine>> {
        self.inner.line(id)
    }

    fn lines_for_draw(&self, draw_id: &str) -> Result<Vec<DrawRequestLine>> {
        self.inner.lines_for_draw(draw_id)
    }

    fn update_line_flags(&self, line_id: &str, flags: &BTreeSet<LineFlag>) -> Result<()> {
        if self.fail_line_update.contains(line_id) {
            bail!("database is locked");
        }
        self.inner.update_line_flags(line_id, flags)
    }

    fn update_line_match(&self, line: &DrawRequestLine) -> Result<()> {
        self.inner.update_line_match(line)
    }
}

impl InvoiceRecords for FlakyStore {
    fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.inner.insert_invoice(invoice)
    }

    fn invoice(&self, id: &str) -> Result<Option<Invoice>> {
        self.inner.invoice(id)
    }

    fn invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>> {
        self.inner.invoices_for_draw(draw_id)
    }

    fn pending_invoices_before(
        &self,
        cutoff: DateTime<Utc>,
        draw_id: Option<&str>,
    ) -> Result<Vec<Invoice>> {
        self.inner.pending_invoices_before(cutoff, draw_id)
    }

    fn update_invoice_state(&self, id: &str, status: InvoiceStatus, flags: &InvoiceFlags) -> Result<()> {
        if self.fail_invoice_update.contains(id) {
            bail!("database is locked");
        }
        self.inner.update_invoice_state(id, status, flags)
    }

    fn delete_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        self.inner.delete_invoice(id)
    }

    fn delete_invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>> {
        self.inner.delete_invoices_for_draw(draw_id)
    }
}

impl BatchRecords for FlakyStore {
    fn insert_wire_batch(&self, batch: &WireBatch) -> Result<()> {
        self.inner.insert_wire_batch(batch)
    }

    fn wire_batch(&self, id: &str) -> Result<Option<WireBatch>> {
        self.inner.wire_batch(id)
    }

    fn draws_for_batch(&self, batch_id: &str) -> Result<Vec<DrawRequest>> {
        self.inner.draws_for_batch(batch_id)
    }
}

impl AuditLog for FlakyStore {
    fn append_event(&self, event: AuditEvent) -> Result<AuditEvent> {
        if self.fail_audit {
            bail!("audit log unavailable");
        }
        self.inner.append_event(event)
    }

    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEvent>> {
        self.inner.events_for_entity(entity_type, entity_id)
    }

    fn all_events(&self) -> Result<Vec<AuditEvent>> {
        self.inner.all_events()
    }
}

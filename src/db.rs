use crate::audit::AuditEvent;
use crate::clock::{format_timestamp, parse_timestamp};
use crate::entities::{
    BudgetLine, DrawRequest, DrawRequestLine, DrawStatus, Invoice, InvoiceFlags, InvoiceStatus,
    LineFlag, WireBatch, WireBatchStatus,
};
use crate::store::{AuditLog, BatchRecords, BudgetRecords, DrawRecords, InvoiceRecords};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// COLUMN LISTS (kept in one place so row mappers and SELECTs agree)
// ============================================================================

const BUDGET_COLUMNS: &str =
    "id, project_id, category, raw_category, budget_amount, spent_amount";

const DRAW_COLUMNS: &str = "id, project_id, status, total_amount, funded_at, wire_batch_id";

const LINE_COLUMNS: &str = "id, draw_request_id, budget_line_id, amount_requested, invoice_id,
     matched_invoice_amount, flags, confidence";

const INVOICE_COLUMNS: &str = "id, draw_request_id, status, flags, created_at, file_ref";

const BATCH_COLUMNS: &str = "id, builder_id, total_amount, status, submitted_at, funded_at,
     wire_reference, notes, created_at";

const EVENT_COLUMNS: &str = "event_id, entity_type, entity_id, action, actor, before_data,
     after_data, timestamp, prev_hash, hash";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Budget and draw tables
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS budget_lines (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            category TEXT NOT NULL,
            raw_category TEXT,
            budget_amount REAL NOT NULL DEFAULT 0,
            spent_amount REAL NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS draw_requests (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            status TEXT NOT NULL,
            total_amount REAL NOT NULL DEFAULT 0,
            funded_at TEXT,
            wire_batch_id TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            CHECK (wire_batch_id IS NULL OR status IN ('staged', 'funded'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS draw_request_lines (
            id TEXT PRIMARY KEY,
            draw_request_id TEXT NOT NULL,
            budget_line_id TEXT,
            amount_requested REAL NOT NULL DEFAULT 0,
            invoice_id TEXT,
            matched_invoice_amount REAL,
            flags TEXT NOT NULL DEFAULT '[]',
            confidence REAL
        )",
        [],
    )?;

    // ==========================================================================
    // Invoices (flags = serialized InvoiceFlags)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            draw_request_id TEXT NOT NULL,
            status TEXT NOT NULL,
            flags TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            file_ref TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS wire_batches (
            id TEXT PRIMARY KEY,
            builder_id TEXT NOT NULL,
            total_amount REAL NOT NULL,
            status TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            funded_at TEXT,
            wire_reference TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Audit Events (append-only, hash chained)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            action TEXT NOT NULL,
            actor TEXT NOT NULL,
            before_data TEXT,
            after_data TEXT,
            timestamp TEXT NOT NULL,
            prev_hash TEXT,
            hash TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS audit_events_no_update
            BEFORE UPDATE ON audit_events
         BEGIN
            SELECT RAISE(ABORT, 'audit_events is append-only');
         END;
         CREATE TRIGGER IF NOT EXISTS audit_events_no_delete
            BEFORE DELETE ON audit_events
         BEGIN
            SELECT RAISE(ABORT, 'audit_events is append-only');
         END;",
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_project ON budget_lines(project_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lines_draw ON draw_request_lines(draw_request_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invoices_draw ON invoices(draw_request_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invoices_pending ON invoices(status, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_draws_batch ON draw_requests(wire_batch_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON audit_events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPERS
// ============================================================================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| conversion_error(idx, format!("bad timestamp '{}'", raw)))
}

fn optional_timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("bad timestamp '{}'", raw))),
    }
}

fn optional_json_at(row: &Row, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| conversion_error(idx, e.to_string())),
    }
}

fn budget_from_row(row: &Row) -> rusqlite::Result<BudgetLine> {
    Ok(BudgetLine {
        id: row.get(0)?,
        project_id: row.get(1)?,
        category: row.get(2)?,
        raw_category: row.get(3)?,
        budget_amount: row.get(4)?,
        spent_amount: row.get(5)?,
    })
}

fn draw_from_row(row: &Row) -> rusqlite::Result<DrawRequest> {
    let status: String = row.get(2)?;
    Ok(DrawRequest {
        id: row.get(0)?,
        project_id: row.get(1)?,
        status: DrawStatus::parse(&status)
            .ok_or_else(|| conversion_error(2, format!("unknown draw status '{}'", status)))?,
        total_amount: row.get(3)?,
        funded_at: optional_timestamp_at(row, 4)?,
        wire_batch_id: row.get(5)?,
    })
}

fn line_from_row(row: &Row) -> rusqlite::Result<DrawRequestLine> {
    let flags_json: String = row.get(6)?;
    let flags: BTreeSet<LineFlag> =
        serde_json::from_str(&flags_json).map_err(|e| conversion_error(6, e.to_string()))?;

    Ok(DrawRequestLine {
        id: row.get(0)?,
        draw_request_id: row.get(1)?,
        budget_line_id: row.get(2)?,
        amount_requested: row.get(3)?,
        invoice_id: row.get(4)?,
        matched_invoice_amount: row.get(5)?,
        flags,
        confidence: row.get(7)?,
    })
}

fn invoice_from_row(row: &Row) -> rusqlite::Result<Invoice> {
    let status: String = row.get(2)?;
    let flags_json: String = row.get(3)?;

    Ok(Invoice {
        id: row.get(0)?,
        draw_request_id: row.get(1)?,
        status: InvoiceStatus::parse(&status)
            .ok_or_else(|| conversion_error(2, format!("unknown invoice status '{}'", status)))?,
        flags: InvoiceFlags::from_json(&flags_json).map_err(|e| conversion_error(3, e.to_string()))?,
        created_at: timestamp_at(row, 4)?,
        file_ref: row.get(5)?,
    })
}

fn batch_from_row(row: &Row) -> rusqlite::Result<WireBatch> {
    let status: String = row.get(3)?;
    Ok(WireBatch {
        id: row.get(0)?,
        builder_id: row.get(1)?,
        total_amount: row.get(2)?,
        status: WireBatchStatus::parse(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown batch status '{}'", status)))?,
        submitted_at: timestamp_at(row, 4)?,
        funded_at: optional_timestamp_at(row, 5)?,
        wire_reference: row.get(6)?,
        notes: row.get(7)?,
        created_at: timestamp_at(row, 8)?,
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<AuditEvent> {
    Ok(AuditEvent {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action: row.get(3)?,
        actor: row.get(4)?,
        before: optional_json_at(row, 5)?,
        after: optional_json_at(row, 6)?,
        timestamp: timestamp_at(row, 7)?,
        prev_hash: row.get(8)?,
        hash: row.get(9)?,
    })
}

fn json_or_null(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to serialize audit snapshot")
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed implementation of every record trait.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn).context("Failed to set up schema")?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Row count of one of the engine's tables.
    pub fn table_count(&self, table: &str) -> Result<i64> {
        let table = match table {
            "budget_lines" | "draw_requests" | "draw_request_lines" | "invoices"
            | "wire_batches" | "audit_events" => table,
            other => bail!("Unknown table: {}", other),
        };
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count)
    }

    fn lines_linked_to(&self, invoice_id: &str) -> Result<Vec<DrawRequestLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM draw_request_lines WHERE invoice_id = ?1",
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![invoice_id], line_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    /// Drops the invoice link (and the flags that only make sense with one).
    fn unlink_invoice(&self, invoice_id: &str) -> Result<()> {
        for mut line in self.lines_linked_to(invoice_id)? {
            line.invoice_id = None;
            line.matched_invoice_amount = None;
            line.confidence = None;
            line.flags.remove(&LineFlag::AmountMismatch);
            line.flags.remove(&LineFlag::LowConfidence);
            self.update_line_match(&line)?;
        }
        Ok(())
    }
}

impl BudgetRecords for SqliteStore {
    fn insert_budget_line(&self, line: &BudgetLine) -> Result<()> {
        self.conn.execute(
            "INSERT INTO budget_lines (
                id, project_id, category, raw_category, budget_amount, spent_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                line.id,
                line.project_id,
                line.category,
                line.raw_category,
                line.budget_amount,
                line.spent_amount,
            ],
        )?;
        Ok(())
    }

    fn budget_lines_for_project(&self, project_id: &str) -> Result<Vec<BudgetLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM budget_lines WHERE project_id = ?1 ORDER BY rowid",
            BUDGET_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![project_id], budget_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }
}

impl DrawRecords for SqliteStore {
    fn insert_draw(&self, draw: &DrawRequest) -> Result<()> {
        self.conn.execute(
            "INSERT INTO draw_requests (
                id, project_id, status, total_amount, funded_at, wire_batch_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                draw.id,
                draw.project_id,
                draw.status.as_str(),
                draw.total_amount,
                draw.funded_at.map(format_timestamp),
                draw.wire_batch_id,
            ],
        )?;
        Ok(())
    }

    fn draw(&self, id: &str) -> Result<Option<DrawRequest>> {
        let draw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM draw_requests WHERE id = ?1", DRAW_COLUMNS),
                params![id],
                draw_from_row,
            )
            .optional()?;
        Ok(draw)
    }

    fn draws_by_ids(&self, ids: &[String]) -> Result<Vec<DrawRequest>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM draw_requests WHERE id IN ({})",
            DRAW_COLUMNS, placeholders
        ))?;
        let draws = stmt
            .query_map(params_from_iter(ids.iter()), draw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(draws)
    }

    fn update_draw_status(&self, id: &str, from: DrawStatus, to: DrawStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE draw_requests SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id, from.as_str(), to.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn fund_draw_if_staged(
        &self,
        id: &str,
        batch_id: &str,
        funded_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE draw_requests
             SET status = 'funded', wire_batch_id = ?2, funded_at = ?3
             WHERE id = ?1 AND status = 'staged' AND wire_batch_id IS NULL",
            params![id, batch_id, format_timestamp(funded_at)],
        )?;
        Ok(changed == 1)
    }

    fn insert_line(&self, line: &DrawRequestLine) -> Result<()> {
        let flags_json = serde_json::to_string(&line.flags)?;
        self.conn.execute(
            "INSERT INTO draw_request_lines (
                id, draw_request_id, budget_line_id, amount_requested, invoice_id,
                matched_invoice_amount, flags, confidence
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                line.id,
                line.draw_request_id,
                line.budget_line_id,
                line.amount_requested,
                line.invoice_id,
                line.matched_invoice_amount,
                flags_json,
                line.confidence,
            ],
        )?;
        Ok(())
    }

    fn line(&self, id: &str) -> Result<Option<DrawRequestLine>> {
        let line = self
            .conn
            .query_row(
                &format!("SELECT {} FROM draw_request_lines WHERE id = ?1", LINE_COLUMNS),
                params![id],
                line_from_row,
            )
            .optional()?;
        Ok(line)
    }

    fn lines_for_draw(&self, draw_id: &str) -> Result<Vec<DrawRequestLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM draw_request_lines WHERE draw_request_id = ?1 ORDER BY rowid",
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![draw_id], line_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    fn update_line_flags(&self, line_id: &str, flags: &BTreeSet<LineFlag>) -> Result<()> {
        let flags_json = serde_json::to_string(flags)?;
        let changed = self.conn.execute(
            "UPDATE draw_request_lines SET flags = ?2 WHERE id = ?1",
            params![line_id, flags_json],
        )?;
        if changed == 0 {
            bail!("Draw line {} not found", line_id);
        }
        Ok(())
    }

    fn update_line_match(&self, line: &DrawRequestLine) -> Result<()> {
        let flags_json = serde_json::to_string(&line.flags)?;
        let changed = self.conn.execute(
            "UPDATE draw_request_lines
             SET invoice_id = ?2, matched_invoice_amount = ?3, confidence = ?4, flags = ?5
             WHERE id = ?1",
            params![
                line.id,
                line.invoice_id,
                line.matched_invoice_amount,
                line.confidence,
                flags_json,
            ],
        )?;
        if changed == 0 {
            bail!("Draw line {} not found", line.id);
        }
        Ok(())
    }
}

impl InvoiceRecords for SqliteStore {
    fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let flags_json = invoice.flags.to_json()?;
        self.conn.execute(
            "INSERT INTO invoices (
                id, draw_request_id, status, flags, created_at, file_ref
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                invoice.id,
                invoice.draw_request_id,
                invoice.status.as_str(),
                flags_json,
                format_timestamp(invoice.created_at),
                invoice.file_ref,
            ],
        )?;
        Ok(())
    }

    fn invoice(&self, id: &str) -> Result<Option<Invoice>> {
        let invoice = self
            .conn
            .query_row(
                &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
                params![id],
                invoice_from_row,
            )
            .optional()?;
        Ok(invoice)
    }

    fn invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM invoices WHERE draw_request_id = ?1 ORDER BY created_at, id",
            INVOICE_COLUMNS
        ))?;
        let invoices = stmt
            .query_map(params![draw_id], invoice_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(invoices)
    }

    fn pending_invoices_before(
        &self,
        cutoff: DateTime<Utc>,
        draw_id: Option<&str>,
    ) -> Result<Vec<Invoice>> {
        let cutoff = format_timestamp(cutoff);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM invoices
             WHERE status = 'pending' AND created_at < ?1
               AND (?2 IS NULL OR draw_request_id = ?2)
             ORDER BY created_at, id",
            INVOICE_COLUMNS
        ))?;
        let invoices = stmt
            .query_map(params![cutoff, draw_id], invoice_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(invoices)
    }

    fn update_invoice_state(
        &self,
        id: &str,
        status: InvoiceStatus,
        flags: &InvoiceFlags,
    ) -> Result<()> {
        let flags_json = flags.to_json()?;
        let changed = self.conn.execute(
            "UPDATE invoices SET status = ?2, flags = ?3 WHERE id = ?1",
            params![id, status.as_str(), flags_json],
        )?;
        if changed == 0 {
            bail!("Invoice {} not found", id);
        }
        Ok(())
    }

    fn delete_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(invoice) = self.invoice(id)? else {
            return Ok(None);
        };
        self.unlink_invoice(id)?;
        tx.execute("DELETE FROM invoices WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(Some(invoice))
    }

    fn delete_invoices_for_draw(&self, draw_id: &str) -> Result<Vec<Invoice>> {
        let tx = self.conn.unchecked_transaction()?;

        let invoices = self.invoices_for_draw(draw_id)?;
        for invoice in &invoices {
            self.unlink_invoice(&invoice.id)?;
        }
        tx.execute(
            "DELETE FROM invoices WHERE draw_request_id = ?1",
            params![draw_id],
        )?;

        tx.commit()?;
        Ok(invoices)
    }
}

impl BatchRecords for SqliteStore {
    fn insert_wire_batch(&self, batch: &WireBatch) -> Result<()> {
        self.conn.execute(
            "INSERT INTO wire_batches (
                id, builder_id, total_amount, status, submitted_at, funded_at,
                wire_reference, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch.id,
                batch.builder_id,
                batch.total_amount,
                batch.status.as_str(),
                format_timestamp(batch.submitted_at),
                batch.funded_at.map(format_timestamp),
                batch.wire_reference,
                batch.notes,
                format_timestamp(batch.created_at),
            ],
        )?;
        Ok(())
    }

    fn wire_batch(&self, id: &str) -> Result<Option<WireBatch>> {
        let batch = self
            .conn
            .query_row(
                &format!("SELECT {} FROM wire_batches WHERE id = ?1", BATCH_COLUMNS),
                params![id],
                batch_from_row,
            )
            .optional()?;
        Ok(batch)
    }

    fn draws_for_batch(&self, batch_id: &str) -> Result<Vec<DrawRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM draw_requests WHERE wire_batch_id = ?1 ORDER BY rowid",
            DRAW_COLUMNS
        ))?;
        let draws = stmt
            .query_map(params![batch_id], draw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(draws)
    }
}

impl AuditLog for SqliteStore {
    fn append_event(&self, event: AuditEvent) -> Result<AuditEvent> {
        let tx = self.conn.unchecked_transaction()?;

        let prev_hash: Option<String> = tx
            .query_row(
                "SELECT hash FROM audit_events ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let event = event.seal(prev_hash);

        tx.execute(
            "INSERT INTO audit_events (
                event_id, entity_type, entity_id, action, actor, before_data,
                after_data, timestamp, prev_hash, hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id,
                event.entity_type,
                event.entity_id,
                event.action,
                event.actor,
                json_or_null(&event.before)?,
                json_or_null(&event.after)?,
                format_timestamp(event.timestamp),
                event.prev_hash,
                event.hash,
            ],
        )?;

        tx.commit()?;
        Ok(event)
    }

    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM audit_events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY seq",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map(params![entity_type, entity_id], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn all_events(&self) -> Result<Vec<AuditEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM audit_events ORDER BY seq", EVENT_COLUMNS))?;
        let events = stmt
            .query_map([], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

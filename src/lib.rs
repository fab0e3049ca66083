// Draw Engine - Core Library
// Invoice matching, stuck-invoice reconciliation and wire-batch funding for
// construction draw requests. Used by the CLI, the API server and tests.

pub mod error;
pub mod clock;
pub mod entities;
pub mod store;
pub mod db;
pub mod audit;
pub mod similarity;       // Levenshtein + tiered label score
pub mod matcher;          // Best budget category for a label
pub mod flag_reconciler;  // NO_INVOICE upkeep
pub mod stuck_invoices;   // Timed-out extraction callbacks
pub mod funding;          // Wire batch funding
pub mod invoices;
pub mod invoice_matching;
pub mod import;
pub mod draws;
pub mod auth;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entities::{
    BudgetLine, DrawRequest, DrawRequestLine, DrawStatus, Invoice, InvoiceFlags, InvoiceStatus,
    LineFlag, StatusDetail, WireBatch, WireBatchStatus,
};
pub use store::{AuditLog, BatchRecords, BudgetRecords, DrawRecords, DrawStore, InvoiceRecords};
pub use db::{setup_database, SqliteStore};
pub use audit::{verify_audit_chain, AuditChainReport, AuditEvent};
pub use matcher::{find_best_match, CategoryMatch, CategoryMatcher, MatchCandidate};
pub use flag_reconciler::{FlagReconcileReport, InvoiceFlagReconciler};
pub use stuck_invoices::{StuckInvoiceFilter, StuckProcessReconciler, StuckReconcileReport};
pub use funding::{FailedDraw, FundingRequest, FundingResult, WireBatchFunder};
pub use invoices::InvoiceService;
pub use invoice_matching::{InvoiceLineMatcher, LineSuggestion};
pub use import::{preview_budget_csv, preview_budget_file, ImportPreview};
pub use draws::transition_draw;
pub use config::EngineConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

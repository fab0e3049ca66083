// 🏗️ Draw Request Entities - a builder's request for loan funds, and its lines
//
// Status moves forward only:
//   draft → review → approved → staged → funded
//                 ↘ rejected
// Funding is the only way into `funded` (see funding.rs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// DRAW STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawStatus {
    Draft,
    Review,
    Approved,
    Staged,
    Funded,
    Rejected,
}

impl DrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawStatus::Draft => "draft",
            DrawStatus::Review => "review",
            DrawStatus::Approved => "approved",
            DrawStatus::Staged => "staged",
            DrawStatus::Funded => "funded",
            DrawStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(DrawStatus::Draft),
            "review" => Some(DrawStatus::Review),
            "approved" => Some(DrawStatus::Approved),
            "staged" => Some(DrawStatus::Staged),
            "funded" => Some(DrawStatus::Funded),
            "rejected" => Some(DrawStatus::Rejected),
            _ => None,
        }
    }

    /// Operator-driven transitions. `staged → funded` only happens through funding.
    pub fn can_transition_to(&self, next: DrawStatus) -> bool {
        matches!(
            (self, next),
            (DrawStatus::Draft, DrawStatus::Review)
                | (DrawStatus::Review, DrawStatus::Approved)
                | (DrawStatus::Review, DrawStatus::Rejected)
                | (DrawStatus::Approved, DrawStatus::Staged)
        )
    }

    /// Only these statuses may carry a wire batch link.
    pub fn may_hold_batch(&self) -> bool {
        matches!(self, DrawStatus::Staged | DrawStatus::Funded)
    }
}

// ============================================================================
// DRAW REQUEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRequest {
    pub id: String,
    pub project_id: String,
    pub status: DrawStatus,
    pub total_amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_batch_id: Option<String>,
}

impl DrawRequest {
    pub fn new(project_id: &str, status: DrawStatus, total_amount: f64) -> Self {
        DrawRequest {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            status,
            total_amount,
            funded_at: None,
            wire_batch_id: None,
        }
    }
}

// ============================================================================
// LINE FLAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineFlag {
    /// Money requested, draw has uploads, none linked to this line
    NoInvoice,
    /// Linked invoice amount differs from the requested amount
    AmountMismatch,
    /// Linked by a match below the confidence threshold
    LowConfidence,
}

impl LineFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineFlag::NoInvoice => "NO_INVOICE",
            LineFlag::AmountMismatch => "AMOUNT_MISMATCH",
            LineFlag::LowConfidence => "LOW_CONFIDENCE",
        }
    }
}

// ============================================================================
// DRAW REQUEST LINE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRequestLine {
    pub id: String,
    pub draw_request_id: String,

    /// Budget category this line draws against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_line_id: Option<String>,

    pub amount_requested: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_invoice_amount: Option<f64>,

    #[serde(default)]
    pub flags: BTreeSet<LineFlag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl DrawRequestLine {
    pub fn new(draw_request_id: &str, budget_line_id: Option<&str>, amount_requested: f64) -> Self {
        DrawRequestLine {
            id: uuid::Uuid::new_v4().to_string(),
            draw_request_id: draw_request_id.to_string(),
            budget_line_id: budget_line_id.map(str::to_string),
            amount_requested,
            invoice_id: None,
            matched_invoice_amount: None,
            flags: BTreeSet::new(),
            confidence: None,
        }
    }

    pub fn has_linked_invoice(&self) -> bool {
        self.invoice_id.is_some() || self.matched_invoice_amount.is_some()
    }

    pub fn needs_invoice(&self) -> bool {
        self.amount_requested > 0.0 && !self.has_linked_invoice()
    }

    pub fn has_flag(&self, flag: LineFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Sets or clears `flag`. Returns true if the set changed.
    pub fn set_flag(&mut self, flag: LineFlag, on: bool) -> bool {
        if on {
            self.flags.insert(flag)
        } else {
            self.flags.remove(&flag)
        }
    }
}

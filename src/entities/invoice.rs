// 🧾 Invoice Entity - uploaded invoice plus its processing sub-state
//
// Overall status:   pending → complete | error
// status_detail:    processing → complete | error   (never backward)
// reconciled:       sticky once true

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Complete,
    Error,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Complete => "complete",
            InvoiceStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(InvoiceStatus::Pending),
            "complete" => Some(InvoiceStatus::Complete),
            "error" => Some(InvoiceStatus::Error),
            _ => None,
        }
    }
}

/// Sub-state reported by the external extraction worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusDetail {
    Processing,
    Complete,
    Error,
}

// ============================================================================
// FLAG BAG
// ============================================================================

/// Closed set of per-invoice processing flags.
///
/// Persisted as a JSON object. Unknown keys or wrongly typed values are a
/// deserialization error, so a corrupted row surfaces instead of reading as
/// "no flags".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<StatusDetail>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub reconciled: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_retry_attempted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl InvoiceFlags {
    pub fn processing() -> Self {
        InvoiceFlags {
            status_detail: Some(StatusDetail::Processing),
            ..Default::default()
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status_detail == Some(StatusDetail::Processing)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Normal completion path: worker reported success.
    pub fn mark_complete(&mut self, at: DateTime<Utc>) -> Result<()> {
        if !self.is_processing() {
            return Err(EngineError::InvalidTransition(format!(
                "status_detail {:?} cannot move to complete",
                self.status_detail
            )));
        }
        self.status_detail = Some(StatusDetail::Complete);
        self.completed_at = Some(at);
        Ok(())
    }

    /// Timeout path. Returns true when this call marked the single retry.
    pub fn mark_timed_out(
        &mut self,
        message: String,
        at: DateTime<Utc>,
        request_retry: bool,
    ) -> Result<bool> {
        if !self.is_processing() || self.reconciled {
            return Err(EngineError::InvalidTransition(format!(
                "status_detail {:?} (reconciled={}) cannot move to error",
                self.status_detail, self.reconciled
            )));
        }
        self.status_detail = Some(StatusDetail::Error);
        self.error = Some(message);
        self.completed_at = Some(at);
        self.reconciled = true;

        if request_retry && !self.auto_retry_attempted {
            self.auto_retry_attempted = true;
            return Ok(true);
        }
        Ok(false)
    }
}

// ============================================================================
// INVOICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub draw_request_id: String,
    pub status: InvoiceStatus,
    pub flags: InvoiceFlags,
    pub created_at: DateTime<Utc>,

    /// Storage key of the uploaded file; storage itself lives elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
}

impl Invoice {
    /// Freshly uploaded invoice, handed to the extraction worker.
    pub fn uploaded(draw_request_id: &str, file_ref: Option<String>, at: DateTime<Utc>) -> Self {
        Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            draw_request_id: draw_request_id.to_string(),
            status: InvoiceStatus::Pending,
            flags: InvoiceFlags::processing(),
            created_at: at,
            file_ref,
        }
    }
}

// 🏦 Wire Batch Entity - one outgoing wire covering several funded draws
//
// Created exactly once per funding operation. Only status and notes may change
// afterwards; the total is fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireBatchStatus {
    Submitted,
    Funded,
    Cancelled,
}

impl WireBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireBatchStatus::Submitted => "submitted",
            WireBatchStatus::Funded => "funded",
            WireBatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submitted" => Some(WireBatchStatus::Submitted),
            "funded" => Some(WireBatchStatus::Funded),
            "cancelled" => Some(WireBatchStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBatch {
    pub id: String,
    pub builder_id: String,
    pub total_amount: f64,
    pub status: WireBatchStatus,
    pub submitted_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl WireBatch {
    /// Batch recorded after the wire already went out.
    pub fn funded(
        builder_id: &str,
        total_amount: f64,
        funded_at: DateTime<Utc>,
        wire_reference: Option<String>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        WireBatch {
            id: uuid::Uuid::new_v4().to_string(),
            builder_id: builder_id.to_string(),
            total_amount,
            status: WireBatchStatus::Funded,
            submitted_at: funded_at,
            funded_at: Some(funded_at),
            wire_reference,
            notes,
            created_at,
        }
    }
}

// 📐 Budget Line Entity - one category of a project's construction budget
//
// The canonical category is what the lender tracks ("Framing Labor").
// The raw category is what the builder typed on their sheet ("framing - labor"),
// kept because invoices tend to use the builder's wording.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub id: String,

    #[serde(default)]
    pub project_id: String,

    /// Canonical category name
    pub category: String,

    /// Category as supplied by the builder, if it differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_category: Option<String>,

    #[serde(default)]
    pub budget_amount: f64,

    #[serde(default)]
    pub spent_amount: f64,
}

impl BudgetLine {
    pub fn new(project_id: &str, category: &str, budget_amount: f64) -> Self {
        BudgetLine {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            category: category.to_string(),
            raw_category: None,
            budget_amount,
            spent_amount: 0.0,
        }
    }

    pub fn with_raw_category(mut self, raw: &str) -> Self {
        self.raw_category = Some(raw.to_string());
        self
    }

    pub fn remaining(&self) -> f64 {
        self.budget_amount - self.spent_amount
    }

    /// Reject rows that the matcher and store cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::MissingField("id"));
        }
        if self.category.trim().is_empty() {
            return Err(EngineError::MissingField("category"));
        }
        if !self.budget_amount.is_finite() || !self.spent_amount.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "budget line {} has a non-finite amount",
                self.id
            )));
        }
        Ok(())
    }
}

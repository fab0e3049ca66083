// 🔗 Invoice → Draw Line Matching
//
// suggest_line: which line of a draw does an invoice item label belong to,
//               judged by the budget category behind each line.
// apply_match:  link an invoice to a line and keep the per-line review flags
//               (AMOUNT_MISMATCH, LOW_CONFIDENCE) consistent with the link.

use crate::entities::{BudgetLine, DrawRequestLine, LineFlag};
use crate::error::{EngineError, Result};
use crate::flag_reconciler::{FlagReconcileReport, InvoiceFlagReconciler};
use crate::matcher::CategoryMatcher;
use crate::store::{BudgetRecords, DrawRecords, InvoiceRecords};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Matched and requested amounts further apart than this raise AMOUNT_MISMATCH.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSuggestion {
    pub line_id: String,
    pub budget_line_id: String,
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMatch {
    pub line: DrawRequestLine,
    pub flags: FlagReconcileReport,
}

pub struct InvoiceLineMatcher<'s, S: ?Sized> {
    store: &'s S,
    matcher: CategoryMatcher,
}

impl<'s, S> InvoiceLineMatcher<'s, S>
where
    S: BudgetRecords + DrawRecords + InvoiceRecords + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        InvoiceLineMatcher {
            store,
            matcher: CategoryMatcher::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.matcher = CategoryMatcher::with_threshold(threshold);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.matcher.threshold
    }

    pub fn suggest_line(&self, draw_request_id: &str, label: &str) -> Result<Option<LineSuggestion>> {
        let draw = self
            .store
            .draw(draw_request_id)?
            .ok_or_else(|| EngineError::NotFound(format!("draw request {}", draw_request_id)))?;

        let lines = self.store.lines_for_draw(draw_request_id)?;
        let budget_by_id: HashMap<String, BudgetLine> = self
            .store
            .budget_lines_for_project(&draw.project_id)?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        // Candidates in draw-line order so ties resolve to the earlier line
        let mut candidates: Vec<BudgetLine> = Vec::new();
        let mut line_for_budget: HashMap<String, String> = HashMap::new();
        for line in &lines {
            let Some(budget) = line
                .budget_line_id
                .as_ref()
                .and_then(|id| budget_by_id.get(id))
            else {
                continue;
            };
            if line_for_budget.contains_key(&budget.id) {
                continue;
            }
            line_for_budget.insert(budget.id.clone(), line.id.clone());
            candidates.push(budget.clone());
        }

        let suggestion = self
            .matcher
            .find_best_match(label, &candidates)
            .and_then(|found| {
                line_for_budget
                    .get(&found.candidate.id)
                    .map(|line_id| LineSuggestion {
                        line_id: line_id.clone(),
                        budget_line_id: found.candidate.id.clone(),
                        category: found.candidate.category.clone(),
                        score: found.score,
                    })
            });

        debug!(draw_request_id, label, found = suggestion.is_some(), "line suggestion");
        Ok(suggestion)
    }

    pub fn apply_match(
        &self,
        line_id: &str,
        invoice_id: &str,
        matched_amount: f64,
        confidence: f64,
    ) -> Result<AppliedMatch> {
        if !matched_amount.is_finite() || matched_amount < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "matched amount must be a non-negative number, got {}",
                matched_amount
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::InvalidArgument(format!(
                "confidence must be within [0, 1], got {}",
                confidence
            )));
        }

        let mut line = self
            .store
            .line(line_id)?
            .ok_or_else(|| EngineError::NotFound(format!("draw line {}", line_id)))?;
        let invoice = self
            .store
            .invoice(invoice_id)?
            .ok_or_else(|| EngineError::NotFound(format!("invoice {}", invoice_id)))?;

        if invoice.draw_request_id != line.draw_request_id {
            return Err(EngineError::InvalidArgument(format!(
                "invoice {} belongs to draw {}, line {} to draw {}",
                invoice.id, invoice.draw_request_id, line.id, line.draw_request_id
            )));
        }

        line.invoice_id = Some(invoice.id);
        line.matched_invoice_amount = Some(matched_amount);
        line.confidence = Some(confidence);
        line.set_flag(
            LineFlag::AmountMismatch,
            (matched_amount - line.amount_requested).abs() > AMOUNT_TOLERANCE,
        );
        line.set_flag(LineFlag::LowConfidence, confidence < self.matcher.threshold);

        self.store.update_line_match(&line)?;
        info!(
            line_id,
            invoice_id,
            matched_amount,
            confidence,
            flags = ?line.flags,
            "invoice matched to draw line"
        );

        let flags = InvoiceFlagReconciler::new(self.store).reconcile(&line.draw_request_id)?;
        // Reload: the reconciler may have cleared NO_INVOICE on this line
        let line = self.store.line(line_id)?.unwrap_or(line);

        Ok(AppliedMatch { line, flags })
    }
}

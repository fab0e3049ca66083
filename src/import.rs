// 📄 Budget Import Preview - match uploaded category labels before saving them
//
// CSV layout: header row with `category` and `amount` columns (any order,
// case-insensitive). Without recognisable headers the first two columns are
// used. Nothing is persisted; the caller decides what to keep.

use crate::entities::BudgetLine;
use crate::error::{EngineError, Result};
use crate::matcher::CategoryMatcher;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewMatch {
    pub budget_line_id: String,
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    /// 1-indexed line in the source file (header is line 1)
    pub line_number: usize,
    pub label: String,
    pub amount: Option<f64>,
    pub matched: Option<PreviewMatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportPreview {
    pub rows: Vec<PreviewRow>,
    pub matched: usize,
    pub unmatched: usize,
    pub invalid: usize,
}

/// "$12,500.00" → 12500.0, "(300)" → -300.0
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn column_positions(headers: &csv::StringRecord) -> (usize, usize, bool) {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    match (find("category"), find("amount")) {
        (Some(category), Some(amount)) => (category, amount, true),
        _ => (0, 1, false),
    }
}

pub fn preview_budget_csv<R: Read>(
    reader: R,
    budget_lines: &[BudgetLine],
    matcher: &CategoryMatcher,
) -> Result<ImportPreview> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut preview = ImportPreview::default();
    let mut records = reader.records().enumerate().peekable();

    // Header row, if the first record names both columns
    let (category_col, amount_col) = match records.peek() {
        Some((_, Ok(first))) => {
            let (category, amount, is_header) = column_positions(first);
            if is_header {
                records.next();
            }
            (category, amount)
        }
        _ => (0, 1),
    };

    for (index, result) in records {
        let line_number = index + 1;
        let record = result.map_err(|e| {
            EngineError::InvalidArgument(format!("CSV line {}: {}", line_number, e))
        })?;

        let label = record.get(category_col).unwrap_or("").trim().to_string();
        if label.is_empty() && record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let raw_amount = record.get(amount_col).unwrap_or("");
        let amount = parse_amount(raw_amount);

        let error = if label.is_empty() {
            Some("missing category".to_string())
        } else if amount.is_none() {
            Some(format!("invalid amount {:?}", raw_amount))
        } else {
            None
        };

        let matched = if label.is_empty() {
            None
        } else {
            matcher
                .find_best_match(&label, budget_lines)
                .map(|found| PreviewMatch {
                    budget_line_id: found.candidate.id.clone(),
                    category: found.candidate.category.clone(),
                    score: found.score,
                })
        };

        if error.is_some() {
            preview.invalid += 1;
        } else if matched.is_some() {
            preview.matched += 1;
        } else {
            preview.unmatched += 1;
        }

        preview.rows.push(PreviewRow {
            line_number,
            label,
            amount,
            matched,
            error,
        });
    }

    info!(
        rows = preview.rows.len(),
        matched = preview.matched,
        unmatched = preview.unmatched,
        invalid = preview.invalid,
        "budget import previewed"
    );

    Ok(preview)
}

pub fn preview_budget_file(
    path: &Path,
    budget_lines: &[BudgetLine],
    matcher: &CategoryMatcher,
) -> Result<ImportPreview> {
    let file = File::open(path).map_err(|e| {
        EngineError::InvalidArgument(format!("cannot open {}: {}", path.display(), e))
    })?;
    preview_budget_csv(file, budget_lines, matcher)
}

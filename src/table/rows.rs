//! Data-row parsing: cells to service items.

use crate::filters::validation::is_summary_row;
use crate::model::{normalize_item_code, parse_item_tuple, ItemCode, ServiceItem, ServiceSource};
use crate::table::header::ColumnMapping;
use crate::text::normalize::parse_quantity;
use crate::text::patterns;
use crate::text::units::normalize_unit;

/// Result of parsing the data rows of one table.
#[derive(Debug, Clone, Default)]
pub struct RowParseOutcome {
    /// Parsed items, in row order.
    pub servicos: Vec<ServiceItem>,
    /// Rows skipped as section headings.
    pub skipped_sections: usize,
    /// Rows skipped as summary/total rows.
    pub skipped_summary: usize,
    /// Rows recovered through the embedded-code path.
    pub hidden_recovered: usize,
}

/// Parse data rows into service items using the resolved column mapping.
pub fn parse_rows(
    rows: &[Vec<String>],
    mapping: &ColumnMapping,
    page: Option<u32>,
    planilha: Option<u32>,
) -> RowParseOutcome {
    let mut outcome = RowParseOutcome::default();

    for row in rows {
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i))
                .map(|c| c.trim().to_string())
                .unwrap_or_default()
        };

        let item_text = cell(mapping.item);
        let unit_text = cell(mapping.unidade);
        let qty_text = cell(mapping.quantidade);
        let mut desc = cell(mapping.descricao);

        // No description column mapped: synthesize from unmapped cells.
        if mapping.descricao.is_none() {
            desc = build_description_from_cells(row, &mapping.assigned());
        }

        let mut item = parse_code_cell(&item_text);
        let mut unit = normalize_unit(&unit_text);
        let mut qty = parse_quantity(&qty_text);

        // Hidden item: the code sits mid-description together with unit
        // and quantity, and the item cell gave us nothing.
        if item.is_none() && unit.is_empty() && qty.is_none() {
            if let Some(caps) = patterns::EMBEDDED_ITEM_END.captures(&desc) {
                let start = caps.get(1).unwrap().start();
                if start > 0 {
                    let before = desc[..start].trim().to_string();
                    if before.chars().count() >= 10 {
                        item = parse_code_cell(&caps[1]);
                        unit = normalize_unit(&caps[2]);
                        qty = parse_quantity(&caps[3]);
                        desc = before;
                        outcome.hidden_recovered += 1;
                    }
                }
            }
        }

        if desc.is_empty() && item.is_none() {
            continue;
        }

        // Section heading: a bare section number with no unit or quantity
        // and an all-caps title.
        if is_section_row(&item_text, &desc, &unit, qty) {
            outcome.skipped_sections += 1;
            continue;
        }

        if is_summary_row(&desc) {
            outcome.skipped_summary += 1;
            continue;
        }

        let mut servico = ServiceItem::new(desc, ServiceSource::Table);
        servico.item = item;
        servico.quantidade = qty;
        if !unit.is_empty() {
            servico.unidade = Some(unit);
        }
        servico.page = page;
        servico.planilha = planilha;
        outcome.servicos.push(servico);
    }

    outcome
}

/// Parse an item cell, tolerating prefixes, suffixes and loose spacing.
fn parse_code_cell(text: &str) -> Option<ItemCode> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(code) = ItemCode::parse(trimmed) {
        return Some(code);
    }
    normalize_item_code(trimmed, false).and_then(|base| ItemCode::parse(&base))
}

fn is_section_row(item_text: &str, desc: &str, unit: &str, qty: Option<f64>) -> bool {
    if !unit.is_empty() || qty.is_some() {
        return false;
    }
    let tuple = parse_item_tuple(item_text);
    let is_bare_section_number = matches!(&tuple, Some(t) if t.len() == 1);
    if !is_bare_section_number && !item_text.trim().is_empty() {
        return false;
    }
    is_bare_section_number && patterns::is_section_header(desc)
}

/// Concatenate unmapped cells into a description.
fn build_description_from_cells(row: &[String], exclude: &[usize]) -> String {
    let mut parts = Vec::new();
    for (idx, cell) in row.iter().enumerate() {
        if exclude.contains(&idx) {
            continue;
        }
        let text = cell.trim();
        if text.chars().count() > 2 {
            parts.push(text);
        }
    }
    parts.join(" ")
}

/// Whether a quantity is the item code leaked into the quantity column
/// (`"1.2"` leaking as `12.0`).
pub fn item_qty_matches_code(code: &ItemCode, qty: f64) -> bool {
    let digits = code.digits();
    if digits.is_empty() {
        return false;
    }
    digits.parse::<f64>().map(|d| d == qty).unwrap_or(false)
}

/// Null out quantities that are actually the item code, when the pattern
/// dominates the table.
///
/// Requires at least `min_samples` coded rows with quantities and a match
/// ratio of `min_ratio`; returns how many quantities were cleared.
pub fn clear_code_leak_quantities(
    servicos: &mut [ServiceItem],
    min_ratio: f64,
    min_samples: usize,
) -> usize {
    let mut total = 0usize;
    let mut matches = 0usize;
    for s in servicos.iter() {
        if let (Some(code), Some(qty)) = (&s.item, s.quantidade) {
            total += 1;
            if item_qty_matches_code(code, qty) {
                matches += 1;
            }
        }
    }

    let ratio = if total > 0 {
        matches as f64 / total as f64
    } else {
        0.0
    };
    if total < min_samples || ratio < min_ratio {
        return 0;
    }

    let mut cleared = 0usize;
    for s in servicos.iter_mut() {
        if let (Some(code), Some(qty)) = (&s.item, s.quantidade) {
            if item_qty_matches_code(code, qty) {
                s.quantidade = None;
                cleared += 1;
            }
        }
    }
    if cleared > 0 {
        log::info!(
            "cleared {} quantities leaked from the item column (ratio {:.0}%)",
            cleared,
            ratio * 100.0
        );
    }
    cleared
}

/// Copy a unit onto unitless items when every coded sibling (same code
/// prefix) agrees on one.
pub fn infer_units_from_siblings(servicos: &mut [ServiceItem]) -> usize {
    use std::collections::HashMap;

    let mut prefix_units: HashMap<Vec<u16>, Option<String>> = HashMap::new();
    for s in servicos.iter() {
        let (code, unit) = match (&s.item, &s.unidade) {
            (Some(c), Some(u)) if !u.is_empty() => (c, u),
            _ => continue,
        };
        let comps = code.components();
        if comps.len() < 2 {
            continue;
        }
        let prefix = comps[..comps.len() - 1].to_vec();
        match prefix_units.entry(prefix) {
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(Some(unit.clone()));
            }
            std::collections::hash_map::Entry::Occupied(mut e) => {
                if e.get().as_deref() != Some(unit.as_str()) {
                    // Disagreement poisons the prefix.
                    e.insert(None);
                }
            }
        }
    }

    let mut inferred = 0usize;
    for s in servicos.iter_mut() {
        if s.unidade.is_some() {
            continue;
        }
        let code = match &s.item {
            Some(c) if c.components().len() >= 2 => c,
            _ => continue,
        };
        let prefix = code.components()[..code.components().len() - 1].to_vec();
        if let Some(Some(unit)) = prefix_units.get(&prefix) {
            s.unidade = Some(unit.clone());
            inferred += 1;
        }
    }
    inferred
}

//! Content-based column classification and validation.
//!
//! When the header leaves roles unresolved, per-column statistics decide
//! which column holds descriptions, units and quantities; a weighted score
//! finds the item column when no header named one.

use crate::config::TableConfig;
use crate::model::parse_item_tuple;
use crate::table::header::ColumnMapping;
use crate::text::normalize::{normalize_description, parse_quantity};
use crate::text::units::{canonical_unit, normalize_unit};

/// Per-column statistics over the data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStats {
    /// Non-empty cells.
    pub non_empty: usize,
    /// Ratio of cells parseable as quantities.
    pub numeric_ratio: f64,
    /// Ratio of cells that are unit tokens.
    pub unit_ratio: f64,
    /// Average cell text length.
    pub avg_len: f64,
}

/// Compute statistics for each of `total_cols` columns.
pub fn compute_column_stats(rows: &[Vec<String>], total_cols: usize) -> Vec<ColumnStats> {
    let mut stats = Vec::with_capacity(total_cols);

    for col in 0..total_cols {
        let mut non_empty = 0usize;
        let mut numeric = 0usize;
        let mut unit_hits = 0usize;
        let mut text_len = 0usize;

        for row in rows {
            let cell = match row.get(col) {
                Some(c) => c.trim(),
                None => continue,
            };
            if cell.is_empty() {
                continue;
            }
            non_empty += 1;
            if parse_quantity(cell).is_some() {
                numeric += 1;
            }
            let unit_norm = normalize_description(&normalize_unit(cell)).replace(' ', "");
            if canonical_unit(&unit_norm).is_some() {
                unit_hits += 1;
            }
            text_len += cell.chars().count();
        }

        if non_empty == 0 {
            stats.push(ColumnStats::default());
            continue;
        }
        stats.push(ColumnStats {
            non_empty,
            numeric_ratio: numeric as f64 / non_empty as f64,
            unit_ratio: unit_hits as f64 / non_empty as f64,
            avg_len: text_len as f64 / non_empty as f64,
        });
    }

    stats
}

/// Fill unresolved roles from column content.
///
/// Description takes the longest non-numeric column, unit the highest
/// unit-token ratio, quantity the highest numeric ratio; columns already
/// claimed by another role are skipped.
pub fn map_columns_by_content(stats: &[ColumnStats], mapping: &mut ColumnMapping) {
    if mapping.descricao.is_none() {
        let mut best: Option<(usize, f64)> = None;
        for (col, s) in stats.iter().enumerate() {
            if is_taken(mapping, col) {
                continue;
            }
            if s.numeric_ratio < 0.7 && best.map(|(_, len)| s.avg_len > len).unwrap_or(s.avg_len > 0.0)
            {
                best = Some((col, s.avg_len));
            }
        }
        mapping.descricao = best.map(|(col, _)| col);
    }

    if mapping.unidade.is_none() {
        let mut best: Option<(usize, f64)> = None;
        for (col, s) in stats.iter().enumerate() {
            if is_taken(mapping, col) {
                continue;
            }
            if s.unit_ratio > best.map(|(_, r)| r).unwrap_or(0.0) {
                best = Some((col, s.unit_ratio));
            }
        }
        mapping.unidade = best.map(|(col, _)| col);
    }

    if mapping.quantidade.is_none() {
        let mut best: Option<(usize, f64)> = None;
        for (col, s) in stats.iter().enumerate() {
            if is_taken(mapping, col) {
                continue;
            }
            if s.numeric_ratio > best.map(|(_, r)| r).unwrap_or(0.0) {
                best = Some((col, s.numeric_ratio));
            }
        }
        mapping.quantidade = best.map(|(col, _)| col);
    }
}

fn is_taken(mapping: &ColumnMapping, col: usize) -> bool {
    mapping.assigned().contains(&col)
}

/// Validate the mapping against the column statistics, dropping roles whose
/// evidence is too weak and re-searching a quantity column positioned left
/// of the unit column.
pub fn validate_mapping(mapping: &mut ColumnMapping, stats: &[ColumnStats], config: &TableConfig) {
    if stats.is_empty() {
        return;
    }

    let stat = |idx: Option<usize>| idx.and_then(|i| stats.get(i));

    // Resolve duplicate assignments in favor of the earlier role.
    if mapping.descricao.is_some()
        && [mapping.item, mapping.unidade, mapping.quantidade].contains(&mapping.descricao)
    {
        mapping.descricao = None;
    }
    if mapping.unidade.is_some()
        && [mapping.item, mapping.descricao, mapping.quantidade].contains(&mapping.unidade)
    {
        mapping.unidade = None;
    }
    if mapping.quantidade.is_some()
        && [mapping.item, mapping.descricao, mapping.unidade].contains(&mapping.quantidade)
    {
        mapping.quantidade = None;
    }

    if let Some(s) = stat(mapping.unidade) {
        if s.unit_ratio < config.min_unit_ratio {
            mapping.unidade = None;
        }
    }
    if let Some(s) = stat(mapping.quantidade) {
        if s.numeric_ratio < config.min_qty_ratio {
            mapping.quantidade = None;
        }
    }
    if let Some(s) = stat(mapping.descricao) {
        if s.avg_len < config.min_desc_len || s.numeric_ratio > config.max_desc_numeric {
            mapping.descricao = None;
        }
    }

    // A quantity column left of the unit column is leakage; look for a
    // better numeric column to the right of the unit.
    if let (Some(unit_col), Some(qty_col)) = (mapping.unidade, mapping.quantidade) {
        if qty_col < unit_col {
            let mut best: Option<(usize, f64)> = None;
            for col in (unit_col + 1)..stats.len() {
                if [mapping.item, mapping.descricao].contains(&Some(col)) {
                    continue;
                }
                let r = stats[col].numeric_ratio;
                if r >= config.min_qty_ratio && r > best.map(|(_, b)| b).unwrap_or(0.0) {
                    best = Some((col, r));
                }
            }
            if let Some((col, _)) = best {
                mapping.quantidade = Some(col);
            }
        }
    }
}

/// Score breakdown for a candidate item column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemColumnScore {
    /// Weighted total.
    pub score: f64,
    /// Ratio of cells matching the item-tuple pattern.
    pub pattern_ratio: f64,
    /// Ratio of consecutive tuple pairs in non-decreasing order.
    pub seq_ratio: f64,
    /// Ratio of distinct tuples among matches.
    pub unique_ratio: f64,
}

/// Score one column as a potential item column.
///
/// Weighted features: pattern match 0.45, monotonic sequence 0.20,
/// distinctness 0.20, left position 0.10, short length 0.05.
pub fn score_item_column(cells: &[String], col_index: usize, total_cols: usize) -> ItemColumnScore {
    let mut non_empty = 0usize;
    let mut tuples: Vec<Vec<u16>> = Vec::new();
    let mut lengths: Vec<usize> = Vec::new();

    for cell in cells {
        let text = cell.trim();
        if text.is_empty() {
            continue;
        }
        non_empty += 1;
        if let Some(tuple) = parse_item_tuple(text) {
            lengths.push(text.chars().count());
            tuples.push(tuple);
        }
    }

    if non_empty == 0 {
        return ItemColumnScore::default();
    }

    let matches = tuples.len();
    let pattern_ratio = matches as f64 / non_empty as f64;
    let unique_ratio = if matches > 0 {
        let mut distinct = tuples.clone();
        distinct.sort();
        distinct.dedup();
        distinct.len() as f64 / matches as f64
    } else {
        0.0
    };

    let mut ordered = 0usize;
    let mut total_pairs = 0usize;
    for pair in tuples.windows(2) {
        total_pairs += 1;
        if pair[1] >= pair[0] {
            ordered += 1;
        }
    }
    let seq_ratio = if total_pairs > 0 {
        ordered as f64 / total_pairs as f64
    } else {
        0.0
    };

    let avg_len = if lengths.is_empty() {
        99.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };
    let length_bonus = if avg_len <= 6.0 {
        1.0
    } else if avg_len <= 10.0 {
        0.5
    } else {
        0.0
    };

    let left_bias = 1.0 - (col_index as f64 / (total_cols.max(2) - 1) as f64);

    ItemColumnScore {
        score: 0.45 * pattern_ratio
            + 0.2 * seq_ratio
            + 0.2 * unique_ratio
            + 0.1 * left_bias
            + 0.05 * length_bonus,
        pattern_ratio,
        seq_ratio,
        unique_ratio,
    }
}

/// Find the item column by content when the header did not name one.
///
/// Only the leftmost few columns are eligible; the best score must clear
/// `config.item_col_min_score`.
pub fn detect_item_column(
    rows: &[Vec<String>],
    total_cols: usize,
    mapping: &ColumnMapping,
    config: &TableConfig,
) -> Option<(usize, ItemColumnScore)> {
    let mut best: Option<(usize, ItemColumnScore)> = None;

    for col in 0..total_cols.min(config.item_col_max_index + 1) {
        if is_taken(mapping, col) {
            continue;
        }
        let cells: Vec<String> = rows
            .iter()
            .map(|r| r.get(col).cloned().unwrap_or_default())
            .collect();
        let score = score_item_column(&cells, col, total_cols);
        if score.score > best.as_ref().map(|(_, s)| s.score).unwrap_or(0.0) {
            best = Some((col, score));
        }
    }

    best.filter(|(_, s)| s.score >= config.item_col_min_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["1.1".into(), "Alvenaria de vedação com blocos".into(), "M2".into(), "416,65".into()],
            vec!["1.2".into(), "Pintura látex acrílica em paredes".into(), "M2".into(), "502,18".into()],
            vec!["2.1".into(), "Escavação mecânica de valas".into(), "M3".into(), "88,00".into()],
            vec!["2.2".into(), "Reaterro compactado de valas".into(), "M3".into(), "74,10".into()],
        ]
    }

    #[test]
    fn test_column_stats() {
        let stats = compute_column_stats(&rows(), 4);
        assert_eq!(stats.len(), 4);
        assert!(stats[0].numeric_ratio < 1.0 || stats[0].avg_len < 5.0);
        assert_eq!(stats[2].unit_ratio, 1.0);
        assert_eq!(stats[3].numeric_ratio, 1.0);
        assert!(stats[1].avg_len > 20.0);
    }

    #[test]
    fn test_content_mapping_fills_roles() {
        let stats = compute_column_stats(&rows(), 4);
        let mut mapping = ColumnMapping {
            item: Some(0),
            ..Default::default()
        };
        map_columns_by_content(&stats, &mut mapping);
        assert_eq!(mapping.descricao, Some(1));
        assert_eq!(mapping.unidade, Some(2));
        assert_eq!(mapping.quantidade, Some(3));
    }

    #[test]
    fn test_validation_drops_weak_unit() {
        let bad_rows: Vec<Vec<String>> = (0..10)
            .map(|i| vec![format!("{}.1", i), "Descrição longa o suficiente".into(), "XYZA".into(), "10,0".into()])
            .collect();
        let stats = compute_column_stats(&bad_rows, 4);
        let mut mapping = ColumnMapping {
            unidade: Some(2),
            quantidade: Some(3),
            descricao: Some(1),
            ..Default::default()
        };
        validate_mapping(&mut mapping, &stats, &TableConfig::default());
        assert_eq!(mapping.unidade, None);
        assert_eq!(mapping.quantidade, Some(3));
    }

    #[test]
    fn test_validation_requantifies_right_of_unit() {
        // Quantity mapped left of unit: re-search to the right.
        let data: Vec<Vec<String>> = (0..10)
            .map(|i| {
                vec![
                    format!("1.{}", i + 1),
                    "10,0".into(),
                    "M2".into(),
                    format!("{},5", 100 + i),
                ]
            })
            .collect();
        let stats = compute_column_stats(&data, 4);
        let mut mapping = ColumnMapping {
            item: Some(0),
            quantidade: Some(1),
            unidade: Some(2),
            ..Default::default()
        };
        validate_mapping(&mut mapping, &stats, &TableConfig::default());
        assert_eq!(mapping.quantidade, Some(3));
    }

    #[test]
    fn test_item_column_scoring() {
        let cells: Vec<String> = ["1.1", "1.2", "2.1", "2.2", "3.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let score = score_item_column(&cells, 0, 4);
        assert_eq!(score.pattern_ratio, 1.0);
        assert_eq!(score.seq_ratio, 1.0);
        assert_eq!(score.unique_ratio, 1.0);
        assert!(score.score >= 0.9);
    }

    #[test]
    fn test_item_column_rejects_text() {
        let cells: Vec<String> = ["Alvenaria", "Pintura", "Escavação"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let score = score_item_column(&cells, 0, 4);
        assert!(score.score < 0.5);
    }

    #[test]
    fn test_detect_item_column() {
        let detected = detect_item_column(&rows(), 4, &ColumnMapping::default(), &TableConfig::default());
        assert_eq!(detected.map(|(col, _)| col), Some(0));
    }
}

//! Table recovery: from row-major cell grids to service items.
//!
//! Works without a schema. Header detection and column-role inference run
//! per table (planilha); the parsed items then go through column-leak
//! cleanup and sibling unit inference. Confidence comes from the quality
//! assessor.

pub mod columns;
pub mod header;
pub mod rows;

use serde::Serialize;

use crate::config::{CascadeConfig, TableConfig};
use crate::model::ServiceItem;
use crate::quality;

pub use columns::{compute_column_stats, score_item_column, ColumnStats, ItemColumnScore};
pub use header::{detect_header_row, map_columns_by_header, ColumnMapping};
pub use rows::{clear_code_leak_quantities, infer_units_from_siblings, parse_rows};

/// One table as extracted from the document: row-major cells plus the page
/// it was found on.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Row-major cells.
    pub rows: Vec<Vec<String>>,
    /// 1-based page, when known.
    pub page: Option<u32>,
}

/// Per-table debug record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDebug {
    /// Index of the detected header row, if any.
    pub header_row: Option<usize>,
    /// Resolved column indices `[item, descricao, unidade, quantidade]`.
    pub mapping: [Option<usize>; 4],
    /// Item column found by content scoring instead of the header.
    pub item_by_content: bool,
    /// Rows skipped as section headings.
    pub skipped_sections: usize,
    /// Rows skipped as summary rows.
    pub skipped_summary: usize,
    /// Rows recovered through the embedded-code path.
    pub hidden_recovered: usize,
    /// Items parsed out of this table.
    pub items: usize,
}

/// Debug record for a whole recovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryDebug {
    /// Per-table records.
    pub tables: Vec<TableDebug>,
    /// Quantities nulled by the column-leak cleanup.
    pub leak_cleared: usize,
    /// Units copied from unanimous siblings.
    pub units_inferred: usize,
}

/// Result of a recovery pass.
#[derive(Debug, Clone, Default)]
pub struct TableOutcome {
    /// Recovered items, document order.
    pub servicos: Vec<ServiceItem>,
    /// Confidence in `[0, 1]` from the quality assessor.
    pub confidence: f64,
    /// Debug trail.
    pub debug: RecoveryDebug,
}

/// Schema-free table recovery.
#[derive(Debug, Clone)]
pub struct TableRecovery {
    table: TableConfig,
    min_items_for_confidence: usize,
}

impl TableRecovery {
    /// Build a recovery pass from the table and cascade settings.
    pub fn new(table: &TableConfig, cascade: &CascadeConfig) -> Self {
        Self {
            table: table.clone(),
            min_items_for_confidence: cascade.min_items_for_confidence,
        }
    }

    /// Recover service items from a set of tables.
    pub fn recover(&self, tables: &[RawTable]) -> TableOutcome {
        let mut outcome = TableOutcome::default();

        for (planilha, table) in tables.iter().enumerate() {
            let debug = self.recover_one(table, planilha as u32, &mut outcome.servicos);
            outcome.debug.tables.push(debug);
        }

        outcome.debug.leak_cleared = clear_code_leak_quantities(&mut outcome.servicos, 0.7, 10);
        outcome.debug.units_inferred = infer_units_from_siblings(&mut outcome.servicos);

        let stats = quality::compute_stats(&outcome.servicos);
        outcome.confidence = quality::quality_score(&stats, self.min_items_for_confidence);
        log::debug!(
            "table recovery: {} items from {} tables, confidence {:.2}",
            outcome.servicos.len(),
            tables.len(),
            outcome.confidence
        );
        outcome
    }

    fn recover_one(
        &self,
        table: &RawTable,
        planilha: u32,
        into: &mut Vec<ServiceItem>,
    ) -> TableDebug {
        let mut debug = TableDebug::default();
        if table.rows.is_empty() {
            return debug;
        }

        let total_cols = table.rows.iter().map(|r| r.len()).max().unwrap_or(0);
        if total_cols == 0 {
            return debug;
        }

        let header_idx = detect_header_row(
            &table.rows,
            self.table.header_rows_limit,
            self.table.header_min_keywords,
        );
        debug.header_row = header_idx;

        let mut mapping = match header_idx {
            Some(idx) => map_columns_by_header(&table.rows[idx]),
            None => ColumnMapping::default(),
        };

        let data_rows: Vec<Vec<String>> = match header_idx {
            Some(idx) => table.rows[idx + 1..].to_vec(),
            None => table.rows.clone(),
        };
        if data_rows.is_empty() {
            return debug;
        }

        if mapping.item.is_none() {
            if let Some((col, score)) =
                columns::detect_item_column(&data_rows, total_cols, &mapping, &self.table)
            {
                log::debug!(
                    "item column {} found by content (score {:.3})",
                    col,
                    score.score
                );
                mapping.item = Some(col);
                debug.item_by_content = true;
            }
        }

        let stats = compute_column_stats(&data_rows, total_cols);
        columns::map_columns_by_content(&stats, &mut mapping);
        columns::validate_mapping(&mut mapping, &stats, &self.table);
        debug.mapping = [
            mapping.item,
            mapping.descricao,
            mapping.unidade,
            mapping.quantidade,
        ];

        let parsed = parse_rows(&data_rows, &mapping, table.page, Some(planilha));
        debug.skipped_sections = parsed.skipped_sections;
        debug.skipped_summary = parsed.skipped_summary;
        debug.hidden_recovered = parsed.hidden_recovered;
        debug.items = parsed.servicos.len();
        into.extend(parsed.servicos);
        debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn config() -> (TableConfig, CascadeConfig) {
        (TableConfig::default(), CascadeConfig::default())
    }

    #[test]
    fn test_recover_clean_table() {
        let (table_cfg, cascade_cfg) = config();
        let recovery = TableRecovery::new(&table_cfg, &cascade_cfg);
        let table = RawTable {
            rows: vec![
                row(&["ITEM", "DESCRIÇÃO", "UNIDADE", "QUANTIDADE"]),
                row(&["1.1", "Alvenaria de vedação", "M2", "416,65"]),
                row(&["1.2", "Pintura látex acrílica", "M2", "502,18"]),
            ],
            page: Some(1),
        };
        let outcome = recovery.recover(&[table]);
        assert_eq!(outcome.servicos.len(), 2);
        assert_eq!(outcome.servicos[0].quantidade, Some(416.65));
        assert_eq!(outcome.servicos[1].quantidade, Some(502.18));
        assert_eq!(outcome.debug.tables[0].header_row, Some(0));
        assert_eq!(outcome.servicos[0].planilha, Some(0));
    }

    #[test]
    fn test_recover_headerless_table() {
        let (table_cfg, cascade_cfg) = config();
        let recovery = TableRecovery::new(&table_cfg, &cascade_cfg);
        let rows: Vec<Vec<String>> = (1..=12)
            .map(|i| {
                row(&[
                    &format!("3.{}", i),
                    "Execução de revestimento cerâmico em paredes",
                    "M2",
                    &format!("{},00", 100 + i),
                ])
            })
            .collect();
        let outcome = recovery.recover(&[RawTable { rows, page: None }]);
        assert_eq!(outcome.servicos.len(), 12);
        assert!(outcome.debug.tables[0].item_by_content);
        assert!(outcome
            .servicos
            .iter()
            .all(|s| s.item.is_some() && s.quantidade.is_some()));
    }

    #[test]
    fn test_multiple_planilhas_tagged() {
        let (table_cfg, cascade_cfg) = config();
        let recovery = TableRecovery::new(&table_cfg, &cascade_cfg);
        let make = |code: &str| RawTable {
            rows: vec![
                row(&["ITEM", "DESCRIÇÃO", "UNID", "QTD"]),
                row(&[code, "Execução de pintura acrílica", "M2", "10,00"]),
            ],
            page: None,
        };
        let outcome = recovery.recover(&[make("1.1"), make("1.1")]);
        assert_eq!(outcome.servicos.len(), 2);
        assert_eq!(outcome.servicos[0].planilha, Some(0));
        assert_eq!(outcome.servicos[1].planilha, Some(1));
    }
}

//! Service filters, composed as a pipeline.
//!
//! Each filter takes the list and returns the survivors plus a debug
//! record. Filters never invent items: every output item was an input
//! item, at most with a rewritten code (missing-prefix repair).

pub mod classification;
pub mod validation;

use std::collections::HashMap;

use serde::Serialize;

use crate::config::DedupConfig;
use crate::model::ServiceItem;

pub use classification::{filter_classification_paths, is_classification_path};
pub use validation::{
    dominant_item_length, filter_by_item_length, filter_by_item_prefix, filter_invalid_units,
    filter_summary_rows, is_summary_row, repair_missing_prefix, CoherenceDebug,
};

/// Debug trail of a full filter pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    /// Items dropped as classification paths.
    pub classification_removed: usize,
    /// Items dropped as summary rows.
    pub summary_removed: usize,
    /// Items dropped for unrecognizable units.
    pub invalid_unit_removed: usize,
    /// Item-length coherence record.
    pub length: CoherenceDebug,
    /// Item-prefix coherence record.
    pub prefix: CoherenceDebug,
    /// Codes rewritten by the missing-prefix repair.
    pub prefix_repaired: usize,
}

/// Run the full filter pipeline in its canonical order.
pub fn apply_all(
    servicos: Vec<ServiceItem>,
    config: &DedupConfig,
) -> (Vec<ServiceItem>, FilterReport) {
    let mut report = FilterReport::default();

    let before = servicos.len();
    let servicos = filter_classification_paths(servicos);
    report.classification_removed = before - servicos.len();

    let before = servicos.len();
    let servicos = filter_summary_rows(servicos);
    report.summary_removed = before - servicos.len();

    let before = servicos.len();
    let servicos = filter_invalid_units(servicos);
    report.invalid_unit_removed = before - servicos.len();

    let (servicos, length_debug) = filter_by_item_length(servicos, config);
    report.length = length_debug;

    let (mut servicos, prefix_debug) = filter_by_item_prefix(servicos, config);
    report.prefix = prefix_debug;

    let dominant = dominant_prefix(&servicos);
    report.prefix_repaired = repair_missing_prefix(&mut servicos, dominant);

    if report.classification_removed + report.summary_removed + report.invalid_unit_removed > 0 {
        log::debug!(
            "filters: -{} classification, -{} summary, -{} invalid unit, {} repaired",
            report.classification_removed,
            report.summary_removed,
            report.invalid_unit_removed,
            report.prefix_repaired
        );
    }
    (servicos, report)
}

/// Most common first component among 3+-deep codes, used as the repair
/// target. 2-deep codes are the repair candidates themselves, so they do
/// not vote.
fn dominant_prefix(servicos: &[ServiceItem]) -> Option<u16> {
    let mut counts: HashMap<u16, usize> = HashMap::new();
    for s in servicos {
        if let Some(code) = &s.item {
            if code.components().len() >= 3 {
                *counts.entry(code.components()[0]).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(prefix, count)| (count, std::cmp::Reverse(prefix)))
        .map(|(prefix, _)| prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemCode, ServiceSource};

    fn svc(code: Option<&str>, desc: &str) -> ServiceItem {
        let mut s = ServiceItem::new(desc, ServiceSource::Table);
        s.item = code.and_then(ItemCode::parse);
        s
    }

    #[test]
    fn test_pipeline_composition() {
        let servicos = vec![
            svc(Some("1.1"), "Alvenaria de vedação com blocos cerâmicos")
                .with_unit("M2")
                .with_quantity(10.0),
            svc(None, "TOTAL GERAL"),
            svc(None, "EXECUÇÃO > OBRAS"),
            svc(Some("1.2"), "Pintura látex acrílica em paredes")
                .with_unit("M2")
                .with_quantity(20.0),
        ];
        let (out, report) = apply_all(servicos, &DedupConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(report.summary_removed, 1);
        assert_eq!(report.classification_removed, 1);
    }

    #[test]
    fn test_filters_never_invent_items() {
        let input = vec![
            svc(Some("1.1"), "Alvenaria de vedação").with_unit("M2").with_quantity(1.0),
            svc(Some("1.2"), "Pintura látex").with_unit("M2").with_quantity(2.0),
        ];
        let snapshot = input.clone();
        let (out, _) = apply_all(input, &DedupConfig::default());
        for item in &out {
            assert!(snapshot.iter().any(|s| s == item));
        }
    }
}

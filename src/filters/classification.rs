//! Classification-path rejection.
//!
//! CAT registries embed taxonomy paths (`EXECUÇÃO > OBRAS > FUNDAÇÃO`)
//! between the real service rows. Those are never services, but technical
//! comparisons (`FCK >= 25MPA`) legitimately contain `>` and must survive.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::ServiceItem;

lazy_static! {
    static ref COMPARISON_RE: Regex = Regex::new(r"(>=|<=|>|<)\s*\d").unwrap();
}

/// Description prefixes that always mark a classification row.
const INVALID_PREFIXES: &[&str] = &[
    "DIRETA OBRAS",
    "1 - DIRETA",
    "2 - DIRETA",
    "ATIVIDADE TÉCNICA",
    "CLASSIFICAÇÃO",
];

/// Whether the text is a technical comparison rather than a taxonomy path.
pub fn is_technical_comparison(desc_upper: &str) -> bool {
    if desc_upper.is_empty() {
        return false;
    }
    if desc_upper.contains("FCK") || desc_upper.contains("MPA") {
        return true;
    }
    COMPARISON_RE.is_match(desc_upper)
}

/// Whether a description names a classification path instead of a service.
pub fn is_classification_path(descricao: &str) -> bool {
    if descricao.is_empty() {
        return false;
    }
    let desc_upper = descricao.trim().to_uppercase();

    if descricao.contains('>') && !is_technical_comparison(&desc_upper) {
        return true;
    }
    if INVALID_PREFIXES.iter().any(|p| desc_upper.starts_with(p)) {
        return true;
    }
    desc_upper.starts_with("EXECUÇÃO") && desc_upper.contains('>')
}

/// Drop classification paths, keeping items that can still be salvaged.
///
/// Items carrying a valid code and positive quantity survive even with a
/// short or path-shaped description, because the reconstructor can recover
/// their text later.
pub fn filter_classification_paths(servicos: Vec<ServiceItem>) -> Vec<ServiceItem> {
    if servicos.is_empty() {
        return servicos;
    }

    let mut filtered = Vec::with_capacity(servicos.len());
    for servico in servicos {
        let descricao = servico.descricao.trim().to_string();
        let salvageable = servico.has_valid_item_and_quantity();

        if descricao.is_empty() {
            if salvageable {
                filtered.push(servico);
            }
            continue;
        }

        let desc_upper = descricao.to_uppercase();
        if descricao.contains('>') && !(salvageable || is_technical_comparison(&desc_upper)) {
            continue;
        }
        if INVALID_PREFIXES.iter().any(|p| desc_upper.starts_with(p)) {
            continue;
        }
        if desc_upper.starts_with("EXECUÇÃO") && desc_upper.contains('>') && !salvageable {
            continue;
        }
        if descricao.chars().count() < 5 {
            if salvageable {
                filtered.push(servico);
            }
            continue;
        }
        filtered.push(servico);
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemCode, ServiceSource};

    fn svc(desc: &str) -> ServiceItem {
        ServiceItem::new(desc, ServiceSource::Table)
    }

    #[test]
    fn test_classification_paths_detected() {
        assert!(is_classification_path("EXECUÇÃO > OBRAS > FUNDAÇÃO"));
        assert!(is_classification_path("DIRETA OBRAS DE EDIFICAÇÕES"));
        assert!(is_classification_path("ATIVIDADE TÉCNICA CONCLUÍDA"));
        assert!(!is_classification_path("Concreto FCK >= 25MPA lançado"));
        assert!(!is_classification_path("Alvenaria de vedação"));
    }

    #[test]
    fn test_filter_drops_paths_keeps_comparisons() {
        let servicos = vec![
            svc("EXECUÇÃO > OBRAS > FUNDAÇÃO"),
            svc("Concreto FCK >= 25MPA lançado em fundações"),
            svc("Alvenaria de vedação"),
        ];
        let out = filter_classification_paths(servicos);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| !s.descricao.starts_with("EXECUÇÃO")));
    }

    #[test]
    fn test_salvage_with_code_and_quantity() {
        // Scenario: path-shaped description, but valid code + quantity.
        let item = svc("EXECUÇÃO > OBRAS > FUNDAÇÃO")
            .with_item(ItemCode::parse("7.4").unwrap())
            .with_unit("M3")
            .with_quantity(120.0);
        let out = filter_classification_paths(vec![item]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_short_descriptions_dropped_unless_salvageable() {
        let short = svc("xx");
        let short_with_code = svc("xx")
            .with_item(ItemCode::parse("1.2").unwrap())
            .with_quantity(10.0);
        let out = filter_classification_paths(vec![short, short_with_code]);
        assert_eq!(out.len(), 1);
        assert!(out[0].item.is_some());
    }
}

//! Comparison primitives for services: quantities, descriptions, whole
//! items.

use crate::model::ServiceItem;
use crate::text::normalize::{extract_keywords, normalize_description};
use crate::text::units::normalize_unit;

/// Whether two quantities are close enough to be the same measurement.
///
/// Missing values compare equal; zeros never match; otherwise an absolute
/// difference of 1.0 or a relative difference of 20 % is tolerated.
pub fn quantities_similar(qty_a: Option<f64>, qty_b: Option<f64>) -> bool {
    let (a, b) = match (qty_a, qty_b) {
        (Some(a), Some(b)) => (a, b),
        _ => return true,
    };
    if a == 0.0 || b == 0.0 {
        return false;
    }
    let diff = (a - b).abs();
    if diff <= 1.0 {
        return true;
    }
    let base = a.abs().max(b.abs());
    base > 0.0 && diff / base <= 0.2
}

/// Whether two descriptions read as the same service.
///
/// Equality or containment after normalization, or a keyword overlap of at
/// least half the smaller set.
pub fn descriptions_similar(desc_a: &str, desc_b: &str) -> bool {
    if desc_a.is_empty() || desc_b.is_empty() {
        return false;
    }
    let norm_a = normalize_description(desc_a);
    let norm_b = normalize_description(desc_b);
    if norm_a == norm_b {
        return true;
    }
    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        return true;
    }
    let kw_a = extract_keywords(desc_a);
    let kw_b = extract_keywords(desc_b);
    if kw_a.is_empty() || kw_b.is_empty() {
        return false;
    }
    let common = kw_a.intersection(&kw_b).count();
    let min_len = kw_a.len().min(kw_b.len());
    common >= (min_len / 2).max(1)
}

/// Whether two items describe the same service: similar descriptions,
/// compatible units and similar quantities.
pub fn items_similar(a: &ServiceItem, b: &ServiceItem) -> bool {
    if !descriptions_similar(a.descricao.trim(), b.descricao.trim()) {
        return false;
    }
    let unit_a = a.unidade.as_deref().map(normalize_unit).unwrap_or_default();
    let unit_b = b.unidade.as_deref().map(normalize_unit).unwrap_or_default();
    if !unit_a.is_empty() && !unit_b.is_empty() && unit_a != unit_b {
        return false;
    }
    quantities_similar(a.quantidade, b.quantidade)
}

/// Stable dedupe key: code plus the first 50 normalized description chars.
pub fn servico_key(servico: &ServiceItem) -> (String, String) {
    let item = servico
        .item
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_default();
    let desc = normalize_description(&servico.descricao);
    let truncated: String = desc.chars().take(50).collect();
    (item, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemCode, ServiceSource};

    #[test]
    fn test_quantities_similar() {
        assert!(quantities_similar(Some(100.0), Some(100.5)));
        assert!(quantities_similar(Some(100.0), Some(115.0)));
        assert!(!quantities_similar(Some(100.0), Some(150.0)));
        assert!(quantities_similar(None, Some(5.0)));
        assert!(!quantities_similar(Some(0.0), Some(5.0)));
    }

    #[test]
    fn test_descriptions_similar_containment() {
        assert!(descriptions_similar(
            "Alvenaria de vedação",
            "Alvenaria de vedação com blocos cerâmicos"
        ));
        assert!(!descriptions_similar("Alvenaria de vedação", ""));
    }

    #[test]
    fn test_descriptions_similar_keyword_overlap() {
        assert!(descriptions_similar(
            "Pintura látex acrílica em paredes internas",
            "Pintura acrílica paredes"
        ));
        assert!(!descriptions_similar(
            "Pintura látex acrílica",
            "Escavação mecânica de valas"
        ));
    }

    #[test]
    fn test_items_similar_units_must_agree() {
        let a = ServiceItem::new("Pintura látex acrílica", ServiceSource::Table).with_unit("M2");
        let b = ServiceItem::new("Pintura látex acrílica", ServiceSource::Text).with_unit("M3");
        assert!(!items_similar(&a, &b));

        let c = ServiceItem::new("Pintura látex acrílica", ServiceSource::Text).with_unit("m²");
        assert!(items_similar(&a, &c));
    }

    #[test]
    fn test_servico_key_truncates() {
        let long_desc = "Execução de estrutura metálica para cobertura em aço galvanizado \
                         com tratamento anticorrosivo";
        let s = ServiceItem::new(long_desc, ServiceSource::Table)
            .with_item(ItemCode::parse("2.1").unwrap());
        let (item, desc) = servico_key(&s);
        assert_eq!(item, "2.1");
        assert_eq!(desc.chars().count(), 50);
    }
}

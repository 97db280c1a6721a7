//! Quality assessment of extracted service lists.
//!
//! Drives the cascade: each stage's output is measured here and the runner
//! decides whether to stop or escalate to a more expensive source.

use std::collections::HashMap;

use crate::config::NoiseConfig;
use crate::model::ServiceItem;
use crate::text::corruption::alpha_ratio;
use crate::text::normalize::normalize_description;

/// Aggregate statistics over a service list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceStats {
    /// Total items.
    pub total: usize,
    /// Items carrying a code.
    pub with_item: usize,
    /// Items carrying a unit.
    pub with_unit: usize,
    /// Items carrying a positive quantity.
    pub with_qty: usize,
    /// Ratio of repeated normalized descriptions.
    pub duplicate_ratio: f64,
}

impl ServiceStats {
    /// Ratio of items with a code.
    pub fn item_ratio(&self) -> f64 {
        ratio(self.with_item, self.total)
    }

    /// Ratio of items with a unit.
    pub fn unit_ratio(&self) -> f64 {
        ratio(self.with_unit, self.total)
    }

    /// Ratio of items with a positive quantity.
    pub fn qty_ratio(&self) -> f64 {
        ratio(self.with_qty, self.total)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Compute aggregate statistics for a service list.
pub fn compute_stats(servicos: &[ServiceItem]) -> ServiceStats {
    let total = servicos.len();
    if total == 0 {
        return ServiceStats::default();
    }

    let with_item = servicos.iter().filter(|s| s.item.is_some()).count();
    let with_unit = servicos
        .iter()
        .filter(|s| s.unidade.as_deref().map(|u| !u.is_empty()).unwrap_or(false))
        .count();
    let with_qty = servicos.iter().filter(|s| s.has_positive_quantity()).count();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for servico in servicos {
        let norm = normalize_description(&servico.descricao);
        if !norm.is_empty() {
            *counts.entry(norm).or_insert(0) += 1;
        }
    }
    let duplicates: usize = counts.values().filter(|&&v| v > 1).map(|v| v - 1).sum();

    ServiceStats {
        total,
        with_item,
        with_unit,
        with_qty,
        duplicate_ratio: duplicates as f64 / total as f64,
    }
}

/// Ratio of items carrying a positive quantity. Shorthand used all over
/// the cascade gating.
pub fn qty_ratio(servicos: &[ServiceItem]) -> f64 {
    compute_stats(servicos).qty_ratio()
}

/// Ratio of items that are complete: code, description, unit and quantity.
pub fn complete_ratio(servicos: &[ServiceItem]) -> f64 {
    if servicos.is_empty() {
        return 0.0;
    }
    let complete = servicos
        .iter()
        .filter(|s| {
            s.item.is_some()
                && !s.descricao.trim().is_empty()
                && s.unidade.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
                && s.has_positive_quantity()
        })
        .count();
    complete as f64 / servicos.len() as f64
}

/// Description-level quality metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionQuality {
    /// Average length of non-empty descriptions.
    pub avg_len: f64,
    /// Ratio of short (or empty) descriptions.
    pub short_ratio: f64,
    /// Mean alphabetic-to-alphanumeric ratio.
    pub alpha_ratio: f64,
}

/// Compute description-level quality metrics.
pub fn compute_description_quality(
    servicos: &[ServiceItem],
    short_len: usize,
) -> DescriptionQuality {
    let total = servicos.len();
    if total == 0 {
        return DescriptionQuality::default();
    }

    let mut lengths = Vec::new();
    let mut short_count = 0usize;
    let mut alpha_ratios = Vec::new();

    for servico in servicos {
        let desc = servico.descricao.trim();
        if desc.is_empty() {
            short_count += 1;
            continue;
        }
        let len = desc.chars().count();
        lengths.push(len);
        if len < short_len {
            short_count += 1;
        }
        if let Some(r) = alpha_ratio(desc) {
            alpha_ratios.push(r);
        }
    }

    DescriptionQuality {
        avg_len: mean_usize(&lengths),
        short_ratio: short_count as f64 / total as f64,
        alpha_ratio: mean_f64(&alpha_ratios),
    }
}

fn mean_usize(values: &[usize]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<usize>() as f64 / values.len() as f64
    }
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Which noise checks failed, for the debug trail.
#[derive(Debug, Clone, Default)]
pub struct NoiseReport {
    /// The list was judged noisy.
    pub noisy: bool,
    /// Number of failing checks.
    pub failures: usize,
    /// Names of the failing checks with their observed values.
    pub reasons: Vec<(&'static str, f64)>,
}

/// Detect whether an OCR-derived service list is too noisy to trust.
///
/// At least `config.min_failures` of the five checks must fail.
pub fn is_noisy(servicos: &[ServiceItem], config: &NoiseConfig) -> NoiseReport {
    let stats = compute_stats(servicos);
    let quality = compute_description_quality(servicos, config.short_desc_len);

    let mut reasons = Vec::new();
    if stats.unit_ratio() < config.min_unit_ratio {
        reasons.push(("unit_ratio", stats.unit_ratio()));
    }
    if stats.qty_ratio() < config.min_qty_ratio {
        reasons.push(("qty_ratio", stats.qty_ratio()));
    }
    if quality.avg_len < config.min_avg_desc_len {
        reasons.push(("avg_desc_len", quality.avg_len));
    }
    if quality.short_ratio > config.max_short_desc_ratio {
        reasons.push(("short_desc_ratio", quality.short_ratio));
    }
    if quality.alpha_ratio < config.min_alpha_ratio {
        reasons.push(("alpha_ratio", quality.alpha_ratio));
    }

    let failures = reasons.len();
    NoiseReport {
        noisy: failures >= config.min_failures,
        failures,
        reasons,
    }
}

/// Overall quality score in `[0, 1]`.
///
/// Starts at 1 and subtracts 0.2 each for poor unit/quantity/item coverage,
/// 0.1 for a high duplicate ratio and 0.2 for very small lists.
pub fn quality_score(stats: &ServiceStats, min_items: usize) -> f64 {
    if stats.total == 0 {
        return 0.0;
    }
    let mut score: f64 = 1.0;
    if stats.unit_ratio() < 0.8 {
        score -= 0.2;
    }
    if stats.qty_ratio() < 0.8 {
        score -= 0.2;
    }
    if stats.item_ratio() < 0.4 {
        score -= 0.2;
    }
    if stats.duplicate_ratio > 0.35 {
        score -= 0.1;
    }
    if stats.total < min_items {
        score -= 0.2;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemCode, ServiceSource};

    fn full_item(code: &str, desc: &str) -> ServiceItem {
        ServiceItem::new(desc, ServiceSource::Table)
            .with_item(ItemCode::parse(code).unwrap())
            .with_unit("M2")
            .with_quantity(10.0)
    }

    #[test]
    fn test_stats_empty() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.qty_ratio(), 0.0);
    }

    #[test]
    fn test_stats_counts() {
        let servicos = vec![
            full_item("1.1", "Alvenaria de vedação"),
            ServiceItem::new("Pintura látex", ServiceSource::Text),
        ];
        let stats = compute_stats(&servicos);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_item, 1);
        assert_eq!(stats.with_qty, 1);
        assert_eq!(stats.qty_ratio(), 0.5);
    }

    #[test]
    fn test_duplicate_ratio() {
        let servicos = vec![
            full_item("1.1", "Pintura látex"),
            full_item("1.2", "Pintura latex"),
            full_item("1.3", "Escavação"),
        ];
        let stats = compute_stats(&servicos);
        // The two pintura rows normalize identically.
        assert!((stats.duplicate_ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_complete_ratio() {
        let servicos = vec![
            full_item("1.1", "Alvenaria de vedação"),
            ServiceItem::new("Sem nada", ServiceSource::Text),
        ];
        assert_eq!(complete_ratio(&servicos), 0.5);
    }

    #[test]
    fn test_noise_detection() {
        let config = NoiseConfig::default();
        // Short garbage descriptions without units or quantities.
        let noisy: Vec<ServiceItem> = (0..10)
            .map(|i| ServiceItem::new(format!("x{}", i), ServiceSource::GridOcr))
            .collect();
        let report = is_noisy(&noisy, &config);
        assert!(report.noisy);
        assert!(report.failures >= config.min_failures);

        let clean: Vec<ServiceItem> = (0..10)
            .map(|i| full_item(&format!("1.{}", i + 1), "Execução de alvenaria estrutural"))
            .collect();
        assert!(!is_noisy(&clean, &config).noisy);
    }

    #[test]
    fn test_quality_score_penalties() {
        let servicos: Vec<ServiceItem> = (0..30)
            .map(|i| full_item(&format!("1.{}", i + 1), &format!("Serviço completo {}", i)))
            .collect();
        let stats = compute_stats(&servicos);
        assert_eq!(quality_score(&stats, 25), 1.0);

        // Few items: -0.2.
        let few: Vec<ServiceItem> = (0..5)
            .map(|i| full_item(&format!("1.{}", i + 1), &format!("Serviço {}", i)))
            .collect();
        let stats = compute_stats(&few);
        assert_eq!(quality_score(&stats, 25), 0.8);

        assert_eq!(quality_score(&ServiceStats::default(), 25), 0.0);
    }
}

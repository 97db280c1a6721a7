//! Validation filters: summary rows, unit enforcement, code-depth and
//! code-prefix coherence, missing-prefix repair.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::config::DedupConfig;
use crate::model::{ItemCode, ServiceItem};
use crate::text::normalize::normalize_description;
use crate::text::units::is_valid_unit;

lazy_static! {
    static ref TOTAL_OF_RE: Regex = Regex::new(r"^(VALOR\s+)?TOTAL\s+(DA|DO)\b").unwrap();
}

/// Whether a description is a summary/total row.
pub fn is_summary_row(desc: &str) -> bool {
    let normalized = normalize_description(desc);
    if normalized.is_empty() {
        return false;
    }
    if normalized.starts_with("TOTAL") || TOTAL_OF_RE.is_match(&normalized) {
        return true;
    }
    if normalized.starts_with("SUBTOTAL") || normalized.starts_with("RESUMO") {
        return true;
    }
    if desc.trim_start().starts_with('#') {
        return true;
    }
    matches!(
        normalized.as_str(),
        "ITEM" | "DISCRIMINACAO" | "DISCRIMINACAO DOS SERVICOS EXECUTADOS"
    )
}

/// Drop summary/total rows.
pub fn filter_summary_rows(servicos: Vec<ServiceItem>) -> Vec<ServiceItem> {
    servicos
        .into_iter()
        .filter(|s| !is_summary_row(&s.descricao))
        .collect()
}

/// Drop items whose unit is not recognizable.
///
/// Tokens of at most three characters are exempt; longer unknown tokens
/// are words leaked from the description column. Items without a unit are
/// untouched.
pub fn filter_invalid_units(servicos: Vec<ServiceItem>) -> Vec<ServiceItem> {
    servicos
        .into_iter()
        .filter(|s| match s.unidade.as_deref() {
            Some(unit) if !unit.is_empty() => is_valid_unit(unit),
            _ => true,
        })
        .collect()
}

/// Debug record of a depth/prefix filter application.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoherenceDebug {
    /// The filter actually removed or rewrote something.
    pub applied: bool,
    /// Ratio of items supporting the dominant depth/prefix.
    pub ratio: f64,
    /// Items removed.
    pub filtered_out: usize,
    /// Off-pattern items kept because they were individually convincing.
    pub kept_mismatch: usize,
}

/// Dominant code depth (component count) and its support ratio.
pub fn dominant_item_length(servicos: &[ServiceItem]) -> (Option<usize>, f64) {
    let lengths: Vec<usize> = servicos
        .iter()
        .filter_map(|s| s.item.as_ref())
        .map(|c| c.components().len())
        .collect();
    if lengths.is_empty() {
        return (None, 0.0);
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for len in &lengths {
        *counts.entry(*len).or_insert(0) += 1;
    }
    let (dominant, count) = counts
        .into_iter()
        .max_by_key(|&(len, count)| (count, std::cmp::Reverse(len)))
        .unwrap();
    (Some(dominant), count as f64 / lengths.len() as f64)
}

/// Keep only items whose code depth matches the dominant depth.
///
/// Activates when the dominant depth covers at least
/// `config.item_length_ratio` of the coded items and is at least 2.
/// Off-depth items survive when they carry a quantity, a valid unit and a
/// description of at least `config.item_length_keep_min_desc` chars.
pub fn filter_by_item_length(
    servicos: Vec<ServiceItem>,
    config: &DedupConfig,
) -> (Vec<ServiceItem>, CoherenceDebug) {
    let (dominant, ratio) = dominant_item_length(&servicos);
    let mut debug = CoherenceDebug {
        ratio,
        ..Default::default()
    };

    let dominant = match dominant {
        Some(d) if ratio >= config.item_length_ratio && d >= 2 => d,
        _ => return (servicos, debug),
    };

    let before = servicos.len();
    let mut filtered = Vec::with_capacity(before);
    for servico in servicos {
        let depth = servico.item.as_ref().map(|c| c.components().len());
        match depth {
            None => filtered.push(servico),
            Some(d) if d == dominant => filtered.push(servico),
            Some(_) => {
                let unit_ok = servico
                    .unidade
                    .as_deref()
                    .map(is_valid_unit)
                    .unwrap_or(false);
                let desc_ok =
                    servico.descricao.trim().chars().count() >= config.item_length_keep_min_desc;
                if servico.has_positive_quantity() && unit_ok && desc_ok {
                    debug.kept_mismatch += 1;
                    filtered.push(servico);
                }
            }
        }
    }

    debug.applied = true;
    debug.filtered_out = before - filtered.len();
    (filtered, debug)
}

/// Keep only items whose first component belongs to the contiguous prefix
/// run around the dominant prefix.
///
/// A table holding sections 2, 3 and 4 keeps all three; an isolated
/// section 9 from a stray table is dropped. Nothing happens when the
/// contiguous run already covers 95 % of the items.
pub fn filter_by_item_prefix(
    servicos: Vec<ServiceItem>,
    config: &DedupConfig,
) -> (Vec<ServiceItem>, CoherenceDebug) {
    let prefixes: Vec<u16> = servicos
        .iter()
        .filter_map(|s| s.item.as_ref())
        .map(|c| c.components()[0])
        .collect();
    let mut debug = CoherenceDebug::default();
    if prefixes.is_empty() {
        return (servicos, debug);
    }

    let mut counts: HashMap<u16, usize> = HashMap::new();
    for p in &prefixes {
        *counts.entry(*p).or_insert(0) += 1;
    }
    let (dominant, dominant_count) = counts
        .iter()
        .max_by_key(|&(p, count)| (*count, std::cmp::Reverse(*p)))
        .map(|(p, c)| (*p, *c))
        .unwrap();
    debug.ratio = dominant_count as f64 / prefixes.len() as f64;

    if debug.ratio < config.item_prefix_ratio {
        return (servicos, debug);
    }

    // Contiguous run of prefixes around the dominant one.
    let mut unique: Vec<u16> = counts.keys().copied().collect();
    unique.sort_unstable();
    let pos = unique.iter().position(|&p| p == dominant).unwrap();
    let mut contiguous = vec![dominant];
    let mut i = pos;
    while i > 0 && unique[i - 1] + 1 == unique[i] {
        i -= 1;
        contiguous.push(unique[i]);
    }
    let mut i = pos;
    while i + 1 < unique.len() && unique[i] + 1 == unique[i + 1] {
        i += 1;
        contiguous.push(unique[i]);
    }

    let contiguous_count: usize = contiguous.iter().map(|p| counts[p]).sum();
    if contiguous_count as f64 / prefixes.len() as f64 >= 0.95 {
        return (servicos, debug);
    }

    let before = servicos.len();
    let filtered: Vec<ServiceItem> = servicos
        .into_iter()
        .filter(|s| match &s.item {
            Some(code) => contiguous.contains(&code.components()[0]),
            None => true,
        })
        .collect();

    debug.applied = true;
    debug.filtered_out = before - filtered.len();
    (filtered, debug)
}

/// Prepend the dominant first component to 2-component codes that lost it.
///
/// A table of `5.1.x` items with a stray `1.2` suggests the section number
/// was clipped; the repair produces `5.1.2` unless that code already
/// exists.
pub fn repair_missing_prefix(
    servicos: &mut [ServiceItem],
    dominant_prefix: Option<u16>,
) -> usize {
    let dominant = match dominant_prefix {
        Some(d) => d,
        None => return 0,
    };

    let mut existing: std::collections::HashSet<String> = servicos
        .iter()
        .filter_map(|s| s.item.as_ref())
        .map(|c| c.to_string())
        .collect();

    let mut repaired = 0usize;
    for servico in servicos.iter_mut() {
        let code = match &servico.item {
            Some(c) if c.prefix().is_none() && c.components().len() == 2 => c.clone(),
            _ => continue,
        };
        if code.components()[0] == dominant {
            continue;
        }
        let mut comps = vec![dominant];
        comps.extend_from_slice(code.components());
        let new_code = match ItemCode::from_components(&comps) {
            Some(c) => c.with_suffix(code.suffix()),
            None => continue,
        };
        if existing.contains(&new_code.to_string()) {
            continue;
        }
        existing.insert(new_code.to_string());
        servico.item = Some(new_code);
        repaired += 1;
    }
    repaired
}

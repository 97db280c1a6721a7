//! The four dedupe strategies and the orphan-suffix cleanup.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::DedupConfig;
use crate::model::{RestartPrefix, ServiceItem};
use crate::text::normalize::{extract_keywords, normalize_description};
use crate::text::similarity::{descriptions_similar, items_similar, quantities_similar, servico_key};
use crate::text::units::normalize_unit;

use super::index::KeywordIndex;

/// Counts per dedupe strategy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    /// Parent/child pairs collapsed.
    pub pair_removed: usize,
    /// Restart-prefixed duplicates folded.
    pub restart_removed: usize,
    /// Same-planilha duplicates folded.
    pub planilha_removed: usize,
    /// Codeless duplicates collapsed by description + unit.
    pub desc_unit_removed: usize,
    /// Orphan suffixes rewritten to the base code.
    pub orphan_suffixes_fixed: usize,
}

impl DedupReport {
    fn total(&self) -> usize {
        self.pair_removed + self.restart_removed + self.planilha_removed + self.desc_unit_removed
    }
}

/// Pair/restart/planilha/description-unit deduplication.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    /// Build a deduplicator with the given thresholds.
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Apply all strategies in order. Each is idempotent, so the composed
    /// pass is as well.
    pub fn dedupe(&self, servicos: Vec<ServiceItem>) -> (Vec<ServiceItem>, DedupReport) {
        let mut report = DedupReport::default();

        let servicos = self.pair_duplicates(servicos, &mut report);
        let servicos = self.restart_duplicates(servicos, &mut report);
        let servicos = self.planilha_duplicates(servicos, &mut report);
        let mut servicos = self.desc_unit_duplicates(servicos, &mut report);
        report.orphan_suffixes_fixed = orphan_suffix_cleanup(&mut servicos);

        if report.total() > 0 {
            log::debug!(
                "dedupe: -{} pair, -{} restart, -{} planilha, -{} desc/unit",
                report.pair_removed,
                report.restart_removed,
                report.planilha_removed,
                report.desc_unit_removed
            );
        }
        (servicos, report)
    }

    /// Strategy 1: a child code (`a.b.c`) duplicating its parent (`a.b`)
    /// with a near-identical quantity and similar description. The richer
    /// description survives.
    fn pair_duplicates(
        &self,
        servicos: Vec<ServiceItem>,
        report: &mut DedupReport,
    ) -> Vec<ServiceItem> {
        let mut by_code: HashMap<String, usize> = HashMap::new();
        for (i, s) in servicos.iter().enumerate() {
            if let Some(code) = &s.item {
                by_code.entry(code.to_string()).or_insert(i);
            }
        }

        let mut drop: HashSet<usize> = HashSet::new();

        for (child_idx, child) in servicos.iter().enumerate() {
            let child_code = match &child.item {
                Some(c) if c.components().len() > 2 => c,
                _ => continue,
            };
            let parent_components = &child_code.components()[..child_code.components().len() - 1];
            let parent_key = match crate::model::ItemCode::from_components(parent_components) {
                Some(c) => c.with_prefix(child_code.prefix()).to_string(),
                None => continue,
            };
            let parent_idx = match by_code.get(&parent_key) {
                Some(&i) if i != child_idx && !drop.contains(&i) => i,
                _ => continue,
            };
            if drop.contains(&child_idx) {
                continue;
            }

            let parent = &servicos[parent_idx];
            if !quantities_similar(parent.quantidade, child.quantidade) {
                continue;
            }
            if !descriptions_similar(parent.descricao.trim(), child.descricao.trim()) {
                continue;
            }

            let parent_len = parent.descricao.trim().chars().count();
            let child_len = child.descricao.trim().chars().count();
            if parent_len >= child_len && parent_len >= 30 {
                // Parent carries the real description; the child is an echo.
                drop.insert(child_idx);
            } else if child_len > parent_len {
                // Parent was a header row; the child is the service.
                drop.insert(parent_idx);
            }
        }

        report.pair_removed += drop.len();
        keep_except(servicos, &drop)
    }

    /// Strategy 2: the same base code with and without an `Sk-` prefix,
    /// same unit, same quantity. Legacy `AD-` codes never fold.
    fn restart_duplicates(
        &self,
        servicos: Vec<ServiceItem>,
        report: &mut DedupReport,
    ) -> Vec<ServiceItem> {
        let mut by_base: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, s) in servicos.iter().enumerate() {
            if let Some(code) = &s.item {
                if matches!(code.prefix(), None | Some(RestartPrefix::Segment(_))) {
                    by_base.entry(code.base_str()).or_default().push(i);
                }
            }
        }

        let mut drop: HashSet<usize> = HashSet::new();
        for indices in by_base.values() {
            if indices.len() < 2 {
                continue;
            }
            for (a_pos, &a) in indices.iter().enumerate() {
                for &b in &indices[a_pos + 1..] {
                    if drop.contains(&a) || drop.contains(&b) {
                        continue;
                    }
                    let (sa, sb) = (&servicos[a], &servicos[b]);
                    let prefixed_a = sa.item.as_ref().unwrap().prefix().is_some();
                    let prefixed_b = sb.item.as_ref().unwrap().prefix().is_some();
                    if prefixed_a == prefixed_b {
                        continue;
                    }
                    let unit_a = sa.unidade.as_deref().map(normalize_unit).unwrap_or_default();
                    let unit_b = sb.unidade.as_deref().map(normalize_unit).unwrap_or_default();
                    if unit_a != unit_b {
                        continue;
                    }
                    if sa.quantidade != sb.quantidade {
                        continue;
                    }
                    // Same measurement twice; keep the better description.
                    let len_a = sa.descricao.trim().chars().count();
                    let len_b = sb.descricao.trim().chars().count();
                    drop.insert(if len_a >= len_b { b } else { a });
                }
            }
        }

        report.restart_removed += drop.len();
        keep_except(servicos, &drop)
    }

    /// Strategy 3: two items with the same code inside one planilha. The
    /// one carrying a quantity and the richer description wins.
    fn planilha_duplicates(
        &self,
        servicos: Vec<ServiceItem>,
        report: &mut DedupReport,
    ) -> Vec<ServiceItem> {
        let mut best: HashMap<(Option<u32>, String), usize> = HashMap::new();
        let mut drop: HashSet<usize> = HashSet::new();

        for (i, s) in servicos.iter().enumerate() {
            let code = match &s.item {
                Some(c) => c.to_string(),
                None => continue,
            };
            let key = (s.planilha, code);
            match best.get(&key) {
                None => {
                    best.insert(key, i);
                }
                Some(&prev) => {
                    let winner = pick_richer(&servicos[prev], prev, s, i);
                    let loser = if winner == prev { i } else { prev };
                    best.insert(key, winner);
                    drop.insert(loser);
                }
            }
        }

        report.planilha_removed += drop.len();
        keep_except(servicos, &drop)
    }

    /// Strategy 4: codeless items sharing normalized description and unit.
    fn desc_unit_duplicates(
        &self,
        servicos: Vec<ServiceItem>,
        report: &mut DedupReport,
    ) -> Vec<ServiceItem> {
        let mut best: HashMap<(String, String), usize> = HashMap::new();
        let mut drop: HashSet<usize> = HashSet::new();

        for (i, s) in servicos.iter().enumerate() {
            if s.item.is_some() {
                continue;
            }
            let desc: String = normalize_description(&s.descricao)
                .chars()
                .take(self.config.max_desc_chars)
                .collect();
            if desc.is_empty() {
                continue;
            }
            let unit = s.unidade.as_deref().map(normalize_unit).unwrap_or_default();
            let key = (desc, unit);
            match best.get(&key) {
                None => {
                    best.insert(key, i);
                }
                Some(&prev) => {
                    let winner = pick_richer(&servicos[prev], prev, s, i);
                    let loser = if winner == prev { i } else { prev };
                    best.insert(key, winner);
                    drop.insert(loser);
                }
            }
        }

        report.desc_unit_removed += drop.len();
        keep_except(servicos, &drop)
    }
}

/// Prefer the item with a quantity; on a tie, the longer description; on a
/// further tie, the earlier item.
fn pick_richer(a: &ServiceItem, a_idx: usize, b: &ServiceItem, b_idx: usize) -> usize {
    let a_qty = a.has_positive_quantity();
    let b_qty = b.has_positive_quantity();
    if a_qty != b_qty {
        return if a_qty { a_idx } else { b_idx };
    }
    let a_len = a.descricao.trim().chars().count();
    let b_len = b.descricao.trim().chars().count();
    if b_len > a_len {
        b_idx
    } else {
        a_idx
    }
}

fn keep_except(servicos: Vec<ServiceItem>, drop: &HashSet<usize>) -> Vec<ServiceItem> {
    servicos
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, s)| s)
        .collect()
}

/// Rewrite `-A`/`-B` suffixes whose base code does not exist in the same
/// planilha back to the base code.
pub fn orphan_suffix_cleanup(servicos: &mut [ServiceItem]) -> usize {
    let existing: HashSet<(Option<u32>, String)> = servicos
        .iter()
        .filter_map(|s| s.item.as_ref().map(|c| (s.planilha, c.to_string())))
        .collect();

    let mut fixed = 0usize;
    for servico in servicos.iter_mut() {
        let code = match &servico.item {
            Some(c) if c.suffix().is_some() => c.clone(),
            _ => continue,
        };
        let base = code.with_suffix(None);
        if !existing.contains(&(servico.planilha, base.to_string())) {
            servico.item = Some(base);
            fixed += 1;
        }
    }
    fixed
}

/// Merge two service lists, preferring the primary.
///
/// A secondary item joins only when it is neither key-identical nor
/// similar to a primary item. Per-item field preference across sources:
/// the side carrying a non-null quantity wins; ties go to the primary
/// (native-text) side.
pub fn merge_prefer_primary(
    primary: Vec<ServiceItem>,
    secondary: Vec<ServiceItem>,
) -> Vec<ServiceItem> {
    if secondary.is_empty() {
        return primary;
    }
    if primary.is_empty() {
        return secondary;
    }

    let mut keys: HashSet<(String, String)> = primary.iter().map(servico_key).collect();
    let index = KeywordIndex::build(&primary);
    let mut result = primary;

    for servico in secondary {
        let key = servico_key(&servico);
        if keys.contains(&key) {
            // Key-identical: let a quantity-bearing secondary fill a
            // quantity hole on the primary side.
            if servico.has_positive_quantity() {
                if let Some(existing) = result
                    .iter_mut()
                    .find(|s| servico_key(s) == key && !s.has_positive_quantity())
                {
                    existing.quantidade = servico.quantidade;
                    if existing.unidade.is_none() {
                        existing.unidade = servico.unidade.clone();
                    }
                }
            }
            continue;
        }

        let keywords = extract_keywords(servico.descricao.trim());
        let mut is_dup = false;
        for candidate in index.candidates(&keywords) {
            if items_similar(&servico, &result[candidate]) {
                is_dup = true;
                break;
            }
        }
        if !is_dup {
            keys.insert(key);
            result.push(servico);
        }
    }

    result
}

/// Drop codeless items whose description duplicates a coded item.
///
/// Codeless items are echoes of the table rows when the same region was
/// read twice by different sources. Distinctive long keywords shared with
/// any coded item also disqualify a codeless item.
pub fn remove_codeless_duplicates(
    servicos: Vec<ServiceItem>,
    similarity_threshold: f64,
) -> Vec<ServiceItem> {
    let (coded, codeless): (Vec<ServiceItem>, Vec<ServiceItem>) =
        servicos.into_iter().partition(|s| s.item.is_some());

    if coded.is_empty() {
        // Only codeless items: collapse by normalized description.
        let mut seen: HashSet<String> = HashSet::new();
        return codeless
            .into_iter()
            .filter(|s| {
                let norm: String = normalize_description(&s.descricao).chars().take(50).collect();
                !norm.is_empty() && seen.insert(norm)
            })
            .collect();
    }

    let index = KeywordIndex::build(&coded);
    let distinctive: HashSet<String> = coded
        .iter()
        .flat_map(|s| extract_keywords(s.descricao.trim()))
        .filter(|kw| kw.chars().count() >= 6 && !COMMON_TERMS.contains(&kw.as_str()))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept_codeless = Vec::new();

    for servico in codeless {
        let desc = servico.descricao.trim();
        let norm: String = normalize_description(desc).chars().take(50).collect();
        if norm.is_empty() || seen.contains(&norm) {
            continue;
        }

        let keywords = extract_keywords(desc);
        let similar_to_coded = index
            .candidates(&keywords)
            .into_iter()
            .any(|i| index.similarity_with(&keywords, i) >= similarity_threshold);
        if similar_to_coded {
            continue;
        }
        if keywords
            .iter()
            .any(|kw| kw.chars().count() >= 6 && distinctive.contains(kw))
        {
            continue;
        }

        seen.insert(norm);
        kept_codeless.push(servico);
    }

    let mut result = coded;
    result.extend(kept_codeless);
    result
}

/// Generic construction terms that do not identify a specific service.
const COMMON_TERMS: &[&str] = &[
    "EXECUCAO",
    "FORNECIMENTO",
    "INSTALACAO",
    "SERVICO",
    "SERVICOS",
    "MATERIAL",
    "MATERIAIS",
    "EQUIPAMENTO",
    "EQUIPAMENTOS",
    "CONSTRUCAO",
    "OBRA",
    "OBRAS",
    "MANUTENCAO",
    "REFORMA",
    "REPARO",
    "SISTEMA",
    "ESTRUTURA",
    "REVESTIMENTO",
    "PINTURA",
    "ACABAMENTO",
    "FUNDACAO",
    "CONCRETO",
    "ARMADO",
    "SIMPLES",
    "DUPLO",
    "TRIPLO",
    "COMPLETO",
    "CONFORME",
    "PROJETO",
    "NORMA",
    "PADRAO",
    "MODELO",
    "TIPO",
];

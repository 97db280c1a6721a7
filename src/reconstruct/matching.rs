//! Candidate ranking: quantity matches, scores and description extraction.

use lazy_static::lazy_static;
use regex::Regex;

use crate::text::corruption::is_corrupted_text;
use crate::text::normalize::parse_quantity;
use crate::text::patterns;
use crate::text::units::{canonical_unit, normalize_unit};

use super::index::LineCandidate;

lazy_static! {
    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Extract `(unit, qty)` from accumulated candidate text, preferring a
/// trailing pair.
pub fn extract_unit_qty(texto: &str) -> (Option<String>, Option<f64>) {
    let caps = patterns::UNIT_QTY_END
        .captures(texto)
        .or_else(|| patterns::UNIT_QTY_MID.captures(texto));
    match caps {
        Some(caps) => {
            let unit = normalize_unit(&caps[1]);
            let qty = parse_quantity(&caps[2]);
            (Some(unit), qty)
        }
        None => (None, None),
    }
}

/// Canonical unit for comparisons; falls back to the normalized token.
fn comparable_unit(unit: Option<&str>) -> Option<String> {
    let unit = unit?;
    if unit.is_empty() {
        return None;
    }
    Some(canonical_unit(unit).unwrap_or_else(|| normalize_unit(unit)))
}

/// Cluster candidates by line proximity (≤ 200 lines apart), preserving
/// document order.
pub fn group_candidates_by_proximity(candidates: &[LineCandidate]) -> Vec<Vec<LineCandidate>> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<LineCandidate> = candidates.to_vec();
    sorted.sort_by_key(|c| c.line);

    let mut groups: Vec<Vec<LineCandidate>> = Vec::new();
    let mut current = vec![sorted[0].clone()];
    for candidate in sorted.into_iter().skip(1) {
        let prev_line = current.last().unwrap().line;
        if candidate.line - prev_line <= 200 {
            current.push(candidate);
        } else {
            groups.push(std::mem::take(&mut current));
            current.push(candidate);
        }
    }
    groups.push(current);
    groups
}

/// Segment index of an item-code string: `S2-…` → 1, unprefixed → 0.
pub fn segment_index(item_code: &str) -> usize {
    patterns::SEGMENT_PREFIX
        .captures(item_code)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .map(|k| k.saturating_sub(1))
        .unwrap_or(0)
}

/// Keep candidates near the item's page: same page first, then within
/// `max_page_distance`. Empty when nothing is in range.
pub fn filter_candidates_by_page(
    candidates: Vec<LineCandidate>,
    servico_page: Option<u32>,
    line_page_map: &[u32],
    max_page_distance: u32,
) -> Vec<LineCandidate> {
    let page = match servico_page {
        Some(p) if !line_page_map.is_empty() => p,
        _ => return candidates,
    };

    let page_of = |c: &LineCandidate| super::index::page_of_line(line_page_map, c.line);

    let same_page: Vec<LineCandidate> = candidates
        .iter()
        .filter(|c| page_of(c) == Some(page))
        .cloned()
        .collect();
    if !same_page.is_empty() {
        return same_page;
    }

    candidates
        .into_iter()
        .filter(|c| {
            page_of(c)
                .map(|p| p.abs_diff(page) <= max_page_distance)
                .unwrap_or(false)
        })
        .collect()
}

/// Pick the candidate group for the item: the `k`-th cluster for `Sk-`
/// codes, the first otherwise. The second return value records whether the
/// group was explicitly selected.
pub fn select_candidate_group(
    candidates: Vec<LineCandidate>,
    original_item: &str,
) -> (Vec<LineCandidate>, bool) {
    let has_segment_prefix = patterns::SEGMENT_PREFIX.is_match(original_item);
    if candidates.len() <= 1 {
        return (candidates, has_segment_prefix);
    }

    let groups = group_candidates_by_proximity(&candidates);
    if groups.len() > 1 {
        let idx = segment_index(original_item).min(groups.len() - 1);
        return (groups.into_iter().nth(idx).unwrap(), true);
    }
    (groups.into_iter().next().unwrap_or_default(), has_segment_prefix)
}

/// A candidate whose unit and quantity equal the item's wins outright.
pub fn find_quantity_match<'a>(
    candidates: &'a [LineCandidate],
    expected_unit: Option<&str>,
    expected_qty: Option<f64>,
) -> Option<&'a LineCandidate> {
    let expected_unit = comparable_unit(expected_unit)?;
    let expected_qty = expected_qty?;
    if expected_qty == 0.0 {
        return None;
    }

    candidates.iter().find(|c| {
        c.qty == Some(expected_qty)
            && comparable_unit(c.unit.as_deref()).as_deref() == Some(expected_unit.as_str())
    })
}

/// Score a candidate: longer descriptions, matching units and matching
/// quantities are worth progressively more.
pub fn score_candidate(
    candidate: &LineCandidate,
    desc: &str,
    expected_unit: Option<&str>,
    expected_qty: Option<f64>,
) -> i64 {
    let mut score = 0i64;
    let desc_len = desc.chars().count();

    if desc_len >= 50 {
        score += 50;
    } else if desc_len >= 30 {
        score += 25;
    }

    let cand_unit = comparable_unit(candidate.unit.as_deref());
    if let (Some(expected), Some(cand)) = (comparable_unit(expected_unit), cand_unit) {
        if expected == cand {
            score += 100;
        }
    }

    if let (Some(expected), Some(cand)) = (expected_qty, candidate.qty) {
        if expected == cand {
            score += 200;
        } else if expected > 0.0 && ((expected - cand).abs() / expected.max(0.01)) < 0.05 {
            score += 150;
        }
    }

    if score == 0 {
        score = desc_len as i64;
    }
    score
}

/// Extract the description proper from an accumulated candidate line:
/// the code and the unit/quantity pair are stripped, embedded codes are
/// spliced out.
pub fn extract_description_from_line(line: &str, item: &str) -> Option<String> {
    let desc = line.trim();
    if desc.is_empty() {
        return None;
    }

    // Code embedded mid-line: keep text before it, plus any continuation
    // after the unit/qty pair (up to a composition reference).
    if !desc.starts_with(item) {
        let embedded = Regex::new(&format!(
            r"(?i){}\s+(?:{})\s+[\d.,]+",
            regex::escape(item),
            patterns::UNIT_ALT
        ))
        .ok()?;
        if let Some(m) = embedded.find(desc) {
            if m.start() > 0 {
                let before = desc[..m.start()].trim();
                let after = desc[m.end()..].trim();

                let (continuation, af_code) = match patterns::AF_CODE_ANYWHERE.find(after) {
                    Some(af) => (after[..af.start()].trim(), af.as_str()),
                    None => (after, ""),
                };

                if !before.is_empty() {
                    let mut result = before.to_string();
                    if !continuation.is_empty() {
                        result = format!("{} {}", result, continuation);
                    }
                    if !af_code.is_empty() {
                        result = format!("{} {}", result, af_code);
                    }
                    let result = WS_RE.replace_all(&result, " ").trim().to_string();
                    if result.chars().count() >= 5 {
                        return Some(result);
                    }
                }
            }
        }
    }

    // Leading and mid-line occurrences of the code itself.
    let start_re = Regex::new(&format!(r"^(?:S\d+-|AD\d*-)?{}(?:-[A-Z])?\s+", regex::escape(item))).ok()?;
    let mut cleaned = start_re.replace(desc, "").to_string();
    let mid_re = Regex::new(&format!(r"\s(?:S\d+-|AD\d*-)?{}(?:-[A-Z])?\s", regex::escape(item))).ok()?;
    cleaned = mid_re.replace_all(&cleaned, " ").to_string();

    if cleaned.is_empty() {
        return None;
    }

    cleaned = patterns::UNIT_QTY_DESC_START.replace(&cleaned, "").to_string();
    cleaned = patterns::UNIT_QTY_DESC_MID.replace_all(&cleaned, " ").to_string();
    let cleaned = WS_RE.replace_all(&cleaned, " ").trim().to_string();

    if cleaned.chars().count() < 5 {
        return None;
    }
    if patterns::DESC_ONLY_UNIT_QTY.is_match(&cleaned) {
        return None;
    }
    Some(cleaned)
}

/// Outcome of a reconstruction match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// 1-based line of the matched candidate.
    pub line: u32,
    /// Final description.
    pub descricao: String,
    /// The matched line was corrupted; the existing description was kept.
    pub desc_corrupted: bool,
}

/// Build the result for a candidate whose quantity matched exactly.
///
/// A corrupted candidate still anchors the item to its line, but the
/// existing description is preserved and flagged.
pub fn build_match_result(
    candidate: &LineCandidate,
    item: &str,
    current_desc: &str,
) -> MatchResult {
    let desc = extract_description_from_line(&candidate.text, item);
    let corrupted = candidate.corrupted || is_corrupted_text(&candidate.text);

    if let Some(desc) = &desc {
        if desc.chars().count() >= 10 && !corrupted {
            return MatchResult {
                line: candidate.line,
                descricao: desc.clone(),
                desc_corrupted: false,
            };
        }
    }

    if current_desc.chars().count() >= 20 && !is_corrupted_text(current_desc) {
        return MatchResult {
            line: candidate.line,
            descricao: current_desc.to_string(),
            desc_corrupted: true,
        };
    }

    MatchResult {
        line: candidate.line,
        descricao: desc.unwrap_or_else(|| current_desc.to_string()),
        desc_corrupted: true,
    }
}

/// Find the best candidate for an item.
#[allow(clippy::too_many_arguments)]
pub fn find_best_match(
    candidates: Vec<LineCandidate>,
    item: &str,
    expected_unit: Option<&str>,
    expected_qty: Option<f64>,
    current_desc: &str,
    original_item: &str,
    servico_page: Option<u32>,
    line_page_map: &[u32],
) -> Option<MatchResult> {
    if candidates.is_empty() {
        return None;
    }

    let has_segment_prefix = patterns::SEGMENT_PREFIX.is_match(original_item);
    let max_distance = if has_segment_prefix { 1 } else { 2 };

    let page_filtered =
        filter_candidates_by_page(candidates, servico_page, line_page_map, max_distance);
    if page_filtered.is_empty() {
        return None;
    }

    let selected_by_page = servico_page.is_some() && !line_page_map.is_empty();
    let (working, group_selected) = select_candidate_group(page_filtered, original_item);
    let group_explicit = selected_by_page || group_selected;

    if let Some(candidate) = find_quantity_match(&working, expected_unit, expected_qty) {
        return Some(build_match_result(candidate, item, current_desc));
    }

    // Restart items must agree on quantity with something in their
    // segment; a miss means the segment index was wrong.
    if has_segment_prefix {
        if let Some(expected) = expected_qty {
            let any_close = working.iter().any(|c| {
                c.qty
                    .map(|q| (q - expected).abs() / expected.max(0.01) < 0.1)
                    .unwrap_or(false)
            });
            if !any_close {
                return None;
            }
        }
    }

    let current_starts_with_unit = patterns::DESC_STARTS_WITH_UNIT.is_match(current_desc);
    let mut best: Option<(i64, MatchResult)> = None;

    for candidate in &working {
        let desc = match extract_description_from_line(&candidate.text, item) {
            Some(d) if d.chars().count() >= 10 => d,
            _ => continue,
        };
        if candidate.corrupted || is_corrupted_text(&candidate.text) {
            continue;
        }
        if patterns::DESC_STARTS_WITH_UNIT.is_match(&desc) {
            continue;
        }
        // Protection rule: a long existing description only yields to a
        // longer candidate, unless the group was explicitly chosen.
        if !group_explicit
            && !current_starts_with_unit
            && current_desc.chars().count() >= 50
            && desc.chars().count() < current_desc.chars().count()
        {
            continue;
        }

        let score = score_candidate(candidate, &desc, expected_unit, expected_qty);
        let better = match &best {
            None => true,
            Some((best_score, best_result)) => {
                score > *best_score
                    || (score == *best_score
                        && desc.chars().count() > best_result.descricao.chars().count())
            }
        };
        if better {
            best = Some((
                score,
                MatchResult {
                    line: candidate.line,
                    descricao: desc,
                    desc_corrupted: false,
                },
            ));
        }
    }

    best.map(|(_, result)| result)
}

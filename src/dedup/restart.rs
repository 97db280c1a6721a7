//! Restart-segment detection and `Sk-` rewriting.
//!
//! Some attestations append an addendum that restarts the item numbering:
//! the same `1.1, 1.2, …` tree appears twice in one document. The second
//! and later trees get `S2-`, `S3-`, … prefixes so the codes stay unique
//! and sort after the original plan.

use std::collections::HashSet;

use crate::config::RestartConfig;
use crate::model::{RestartPrefix, ServiceItem};

/// Detect restarted numbering and rewrite later segments with `Sk-`
/// prefixes. Returns the number of rewritten segments.
///
/// Only unprefixed codes participate; a segment is confirmed as a restart
/// when its codes overlap the first segment by at least
/// `config.min_overlap` codes and `config.min_overlap_ratio` of its size.
pub fn apply_restart_prefixes(servicos: &mut [ServiceItem], config: &RestartConfig) -> usize {
    // Positions of unprefixed coded items, in document order.
    let coded: Vec<usize> = servicos
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.item
                .as_ref()
                .map(|c| c.prefix().is_none())
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect();

    if coded.len() < config.min_codes {
        return 0;
    }

    // Split into segments: a new segment starts when a base code repeats
    // within the current segment.
    let mut segments: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for &pos in &coded {
        let base = servicos[pos].item.as_ref().unwrap().base_str();
        if seen.contains(&base) && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            seen.clear();
        }
        seen.insert(base);
        current.push(pos);
    }
    if !current.is_empty() {
        segments.push(current);
    }

    if segments.len() < 2 {
        return 0;
    }

    let first_codes: HashSet<String> = segments[0]
        .iter()
        .map(|&i| servicos[i].item.as_ref().unwrap().base_str())
        .collect();

    let mut rewritten = 0usize;
    let mut next_segment = 2u32;

    for segment in segments.into_iter().skip(1) {
        let codes: HashSet<String> = segment
            .iter()
            .map(|&i| servicos[i].item.as_ref().unwrap().base_str())
            .collect();
        let overlap = codes.intersection(&first_codes).count();
        let ratio = overlap as f64 / codes.len().max(1) as f64;

        if overlap >= config.min_overlap && ratio >= config.min_overlap_ratio {
            for &i in &segment {
                let code = servicos[i].item.clone().unwrap();
                servicos[i].item =
                    Some(code.with_prefix(Some(RestartPrefix::Segment(next_segment))));
            }
            log::debug!(
                "restart segment confirmed: {} items rewritten with S{}-",
                segment.len(),
                next_segment
            );
            next_segment += 1;
            rewritten += 1;
        }
    }

    rewritten
}

//! Line indexing: map every item code to the candidate lines that could
//! carry its description.

use indexmap::IndexMap;

use crate::model::normalize_item_code;
use crate::text::corruption::is_corrupted_text;
use crate::text::normalize::parse_quantity;
use crate::text::patterns;
use crate::text::units::normalize_unit;

use super::collect::{
    collect_continuation_lines, collect_previous_lines, is_description_fragment,
    should_prefix_with_previous,
};
use super::matching::extract_unit_qty;

/// One candidate line for an item, with its accumulated continuation text.
#[derive(Debug, Clone)]
pub struct LineCandidate {
    /// 1-based line number of the anchor line.
    pub line: u32,
    /// Anchor line plus absorbed neighbors.
    pub text: String,
    /// Unit extracted from the accumulated text.
    pub unit: Option<String>,
    /// Quantity extracted from the accumulated text.
    pub qty: Option<f64>,
    /// The anchor line reads as OCR-corrupted.
    pub corrupted: bool,
    /// The code was embedded mid-line rather than leading it.
    pub embedded: bool,
}

/// Map 1-based line numbers to 1-based page numbers, driven by the
/// `--- Página N ---` markers the extractors emit.
pub fn build_line_page_map(texto: &str) -> Vec<u32> {
    let mut pages = Vec::new();
    let mut current = 1u32;
    for line in texto.lines() {
        if let Some(caps) = patterns::PAGE_MARKER.captures(line.trim()) {
            if let Ok(page) = caps[1].parse::<u32>() {
                current = page;
            }
        }
        pages.push(current);
    }
    pages
}

/// Page of a 1-based line, per the map built above.
pub fn page_of_line(map: &[u32], line: u32) -> Option<u32> {
    map.get((line as usize).checked_sub(1)?).copied()
}

/// Build the index `base code → candidate lines`.
///
/// A candidate is a line starting with an item code, or a line with the
/// code embedded near its end (`desc code UNIT qty`). Each candidate
/// accumulates continuation text forward and, when the in-line description
/// is a fragment, backward.
pub fn build_item_line_index(texto: &str) -> IndexMap<String, Vec<LineCandidate>> {
    let mut index: IndexMap<String, Vec<LineCandidate>> = IndexMap::new();
    let lines: Vec<&str> = texto.lines().collect();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = patterns::ITEM_LINE.captures(line) {
            let code_text = caps.get(1).unwrap().as_str();
            let item_code = match normalize_item_code(code_text, true) {
                Some(c) => c,
                None => continue,
            };

            let corrupted = is_corrupted_text(line);
            let mut full_text = line.to_string();

            // `code UNIT qty` with the description elsewhere: look behind.
            let unit_first = patterns::UNIT_FIRST.is_match(line);
            if unit_first && i > 0 {
                let prev_text = collect_previous_lines(&lines, i, 3);
                if !prev_text.is_empty() {
                    full_text = format!("{} {}", prev_text, line);
                }
            }

            // `code desc UNIT qty` with a fragment description: maybe
            // prefix the previous line.
            if !unit_first && i > 0 {
                if let Some(caps) = patterns::UNIT_LAST.captures(line) {
                    let desc_in_line = caps.get(2).unwrap().as_str().trim();
                    let prev_line = lines[i - 1].trim();
                    if should_prefix_with_previous(desc_in_line, prev_line, &lines, i) {
                        full_text = format!("{} {}", prev_line, line);
                    }
                }
            }

            // A composition reference closes the description; nothing to
            // collect beyond it.
            if !patterns::AF_CODE_ANYWHERE.is_match(line) {
                let continuation = collect_continuation_lines(&lines, i + 1, 5);
                if !continuation.is_empty() {
                    full_text = format!("{} {}", full_text, continuation);
                }
            }

            let (unit, qty) = extract_unit_qty(&full_text);
            index.entry(item_code).or_default().push(LineCandidate {
                line: (i + 1) as u32,
                text: full_text,
                unit,
                qty,
                corrupted,
                embedded: false,
            });
            continue;
        }

        // Code embedded near the end of the line.
        if let Some(caps) = patterns::EMBEDDED_ITEM_END.captures(line) {
            let m = caps.get(1).unwrap();
            if m.start() == 0 {
                continue;
            }
            let item_code = match normalize_item_code(&caps[1], true) {
                Some(c) => c,
                None => continue,
            };
            let desc_part = line[..m.start()].trim();
            if desc_part.chars().count() < 20 {
                continue;
            }

            let unit = normalize_unit(&caps[2]);
            let qty = parse_quantity(&caps[3]);
            let corrupted = is_corrupted_text(line);
            let mut full_text = line.to_string();

            if i > 0 {
                let prev_line = lines[i - 1].trim();
                if is_description_fragment(desc_part, prev_line)
                    || desc_part.chars().count() < 25
                {
                    let prev_text = collect_previous_lines(&lines, i, 3);
                    if !prev_text.is_empty() {
                        full_text = format!("{} {}", prev_text, line);
                    }
                }
            }

            let continuation = collect_continuation_lines(&lines, i + 1, 5);
            if !continuation.is_empty() {
                full_text = format!("{} {}", full_text, continuation);
            }

            // A bare composition reference on the next line belongs here.
            if let Some(next) = lines.get(i + 1) {
                let next = next.trim();
                if patterns::AF_ONLY.is_match(next) {
                    full_text = format!("{} {}", line, next);
                }
            }

            index.entry(item_code).or_default().push(LineCandidate {
                line: (i + 1) as u32,
                text: full_text,
                unit: Some(unit),
                qty,
                corrupted,
                embedded: true,
            });
        }
    }

    index
}

//! Text-section harvesting: service items straight from the raw text.
//!
//! When table recovery is weak, the raw text still carries
//! `code desc UNIT qty` lines. This pass reuses the reconstructor's line
//! index to mint items directly from those lines.

use crate::model::{ItemCode, ServiceItem, ServiceSource};
use crate::reconstruct::index::{build_item_line_index, build_line_page_map, page_of_line};
use crate::reconstruct::matching::extract_description_from_line;

/// Harvest service items from the raw text.
///
/// One item per indexed candidate line with a parseable description; the
/// description is capped at `max_desc_len` characters.
pub fn harvest_text_items(texto: &str, max_desc_len: usize) -> Vec<ServiceItem> {
    if texto.trim().is_empty() {
        return Vec::new();
    }

    let index = build_item_line_index(texto);
    let page_map = build_line_page_map(texto);
    let mut servicos = Vec::new();

    for (code_str, candidates) in &index {
        let code = match ItemCode::parse(code_str) {
            Some(c) => c,
            None => continue,
        };
        for candidate in candidates {
            let desc = match extract_description_from_line(&candidate.text, code_str) {
                Some(d) => d,
                None => continue,
            };
            if candidate.corrupted {
                continue;
            }
            let desc: String = desc.chars().take(max_desc_len).collect();

            let mut servico = ServiceItem::new(desc, ServiceSource::Text);
            servico.item = Some(code.clone());
            servico.unidade = candidate.unit.clone().filter(|u| !u.is_empty());
            servico.quantidade = candidate.qty;
            servico.line = Some(candidate.line);
            servico.page = page_of_line(&page_map, candidate.line);
            servicos.push(servico);
        }
    }

    log::debug!("text harvest: {} items from raw text", servicos.len());
    servicos
}

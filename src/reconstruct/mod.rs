//! Description reconstruction against the raw extracted text.
//!
//! Table and OCR sources routinely truncate, merge or garble descriptions.
//! The raw text is the ground truth: for every item with a code, the
//! reconstructor finds the text lines carrying that code, reassembles the
//! wording across line and page boundaries, and rewrites the item's
//! description when a trustworthy match exists.

pub mod collect;
pub mod index;
pub mod matching;

use crate::model::{normalize_item_code, DescSource, ServiceItem};

pub use index::{build_item_line_index, build_line_page_map, LineCandidate};
pub use matching::{find_best_match, MatchResult};

/// Rewrites service descriptions from the raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionReconstructor;

impl DescriptionReconstructor {
    /// Create a reconstructor.
    pub fn new() -> Self {
        Self
    }

    /// Rewrite descriptions in place. Returns how many items were fixed.
    ///
    /// Items whose code never appears in the text, or whose candidates all
    /// fail ranking, keep their current description untouched.
    pub fn fix_descriptions(&self, servicos: &mut [ServiceItem], texto: &str) -> usize {
        if texto.is_empty() || servicos.is_empty() {
            return 0;
        }

        let item_lines = build_item_line_index(texto);
        let line_page_map = build_line_page_map(texto);
        log::debug!(
            "reconstructor: {} unique codes indexed from {} chars of text",
            item_lines.len(),
            texto.len()
        );

        let mut fixed = 0usize;
        for servico in servicos.iter_mut() {
            let original_item = servico
                .item
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default();
            let item = match normalize_item_code(&original_item, true) {
                Some(i) => i,
                None => continue,
            };

            let candidates = match item_lines.get(&item) {
                Some(c) if !c.is_empty() => c.clone(),
                _ => continue,
            };

            let result = find_best_match(
                candidates,
                &item,
                servico.unidade.as_deref(),
                servico.quantidade,
                &servico.descricao,
                &original_item,
                servico.page,
                &line_page_map,
            );

            match result {
                Some(m) => {
                    servico.descricao = m.descricao;
                    servico.desc_source = Some(DescSource::TextoOriginal);
                    servico.line = Some(m.line);
                    servico.desc_corrupted = m.desc_corrupted;
                    fixed += 1;
                }
                None => {
                    servico.desc_source = None;
                    servico.line = None;
                    servico.desc_corrupted = false;
                }
            }
        }

        log::debug!("reconstructor: {}/{} descriptions fixed", fixed, servicos.len());
        fixed
    }
}

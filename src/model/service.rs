//! The atomic extraction result: one service line item.

use serde::{Deserialize, Serialize};

use super::item_code::ItemCode;

/// Which extraction path produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceSource {
    /// Recovered from a structured table.
    Table,
    /// Harvested from the raw text.
    Text,
    /// Returned by a text-model analysis.
    Ai,
    /// Returned by the vision model.
    Vision,
    /// Returned by the hosted document-intelligence service.
    DocAi,
    /// Recovered by grid OCR.
    GridOcr,
}

/// Where a final description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescSource {
    /// Rewritten from the raw extracted text (the ground truth).
    TextoOriginal,
}

/// One extracted service line item.
///
/// Created by an extractor; the reconstructor may rewrite `descricao`, the
/// deduplicator may drop or merge it, the filters may drop it. After the
/// pipeline emits the final [`AttestationExtraction`](super::AttestationExtraction)
/// items are immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    /// Hierarchical item code, when one was recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemCode>,
    /// Free-text description.
    pub descricao: String,
    /// Executed quantity. Serialized as a JSON number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantidade: Option<f64>,
    /// Canonical uppercase unit token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidade: Option<String>,
    /// Extraction path that produced the item.
    pub source: ServiceSource,
    /// 1-based page the item was found on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// 1-based line in the raw text, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Tabular section (planilha) the item belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planilha: Option<u32>,
    /// The matched source line was OCR-corrupted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub desc_corrupted: bool,
    /// Set when the description was recovered from the raw text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_source: Option<DescSource>,
}

impl ServiceItem {
    /// Create an item with a description and source; everything else unset.
    pub fn new(descricao: impl Into<String>, source: ServiceSource) -> Self {
        Self {
            item: None,
            descricao: descricao.into(),
            quantidade: None,
            unidade: None,
            source,
            page: None,
            line: None,
            planilha: None,
            desc_corrupted: false,
            desc_source: None,
        }
    }

    /// Builder: set the item code.
    pub fn with_item(mut self, code: ItemCode) -> Self {
        self.item = Some(code);
        self
    }

    /// Builder: set the quantity.
    pub fn with_quantity(mut self, qty: f64) -> Self {
        self.quantidade = Some(qty);
        self
    }

    /// Builder: set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unidade = Some(unit.into());
        self
    }

    /// Builder: set the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Builder: set the planilha index.
    pub fn with_planilha(mut self, planilha: u32) -> Self {
        self.planilha = Some(planilha);
        self
    }

    /// Whether the quantity is present and positive.
    pub fn has_positive_quantity(&self) -> bool {
        self.quantidade.map(|q| q > 0.0).unwrap_or(false)
    }

    /// Whether the item carries a code of at least two components and a
    /// positive quantity. Such items survive filters even with a poor
    /// description, because the reconstructor can recover the text later.
    pub fn has_valid_item_and_quantity(&self) -> bool {
        self.item.is_some() && self.has_positive_quantity()
    }

    /// Canonical sort position: coded items by their sort key, codeless
    /// items last (stable).
    pub fn sort_key(&self) -> (bool, Option<(u32, Vec<u16>, u8)>) {
        match &self.item {
            Some(code) => (false, Some(code.sort_key())),
            None => (true, None),
        }
    }
}

/// Sort services into the canonical order. Stable, so codeless items keep
/// their relative positions at the tail.
pub fn sort_services(servicos: &mut [ServiceItem]) {
    servicos.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

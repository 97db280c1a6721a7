//! Header detection and header-driven column mapping.

use crate::text::normalize::normalize_header;

/// Keywords that identify a header row, after normalization.
const HEADER_KEYWORDS: &[&str] = &[
    "ITEM",
    "ITENS",
    "COD",
    "CODIGO",
    "DESCRICAO",
    "DISCRIMINACAO",
    "SERVICO",
    "SERVICOS",
    "UNID",
    "UNIDADE",
    "QTD",
    "QTE",
    "QUANT",
    "QUANTIDADE",
    "EXECUTADA",
    "EXECUTADO",
    "VALOR",
    "CUSTO",
    "PRECO",
];

/// Column-role assignment produced by the mapping passes.
///
/// `None` means the role is unresolved; content-based mapping fills the
/// gaps afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Item-code column.
    pub item: Option<usize>,
    /// Description column.
    pub descricao: Option<usize>,
    /// Unit column.
    pub unidade: Option<usize>,
    /// Quantity column.
    pub quantidade: Option<usize>,
    /// Price/value column (recognized only to keep it out of the others).
    pub valor: Option<usize>,
}

impl ColumnMapping {
    /// Columns already claimed by some role.
    pub fn assigned(&self) -> Vec<usize> {
        [self.item, self.descricao, self.unidade, self.quantidade, self.valor]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Find the header row within the first `rows_limit` rows.
///
/// A row qualifies when at least `min_keywords` of its normalized cells
/// contain a header keyword; the best-scoring row wins, earliest on ties.
pub fn detect_header_row(
    rows: &[Vec<String>],
    rows_limit: usize,
    min_keywords: usize,
) -> Option<usize> {
    let mut best_score = 0usize;
    let mut best_index = None;

    for (idx, row) in rows.iter().take(rows_limit).enumerate() {
        let mut score = 0usize;
        for cell in row {
            let text = normalize_header(cell);
            if text.is_empty() {
                continue;
            }
            if HEADER_KEYWORDS.iter().any(|kw| text.contains(kw)) {
                score += 1;
            }
        }
        if score > best_score {
            best_score = score;
            best_index = Some(idx);
        }
    }

    if best_score >= min_keywords {
        best_index
    } else {
        None
    }
}

/// Map columns to roles from the header cells alone.
pub fn map_columns_by_header(header_row: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();

    for (idx, cell) in header_row.iter().enumerate() {
        let text = normalize_header(cell);
        if text.is_empty() {
            continue;
        }
        if mapping.item.is_none() && (text.contains("ITEM") || text.contains("COD")) {
            mapping.item = Some(idx);
        }
        if mapping.descricao.is_none()
            && (text.contains("DESCRICAO")
                || text.contains("DISCRIMINACAO")
                || text.contains("SERVICO"))
        {
            mapping.descricao = Some(idx);
        }
        if mapping.unidade.is_none() && text.contains("UNID") {
            mapping.unidade = Some(idx);
        }
        if mapping.quantidade.is_none()
            && (text.contains("QUANT")
                || text.contains("QTD")
                || text.contains("QTE")
                || text.contains("EXECUTAD"))
        {
            mapping.quantidade = Some(idx);
        }
        if mapping.valor.is_none()
            && (text.contains("VALOR") || text.contains("CUSTO") || text.contains("PRECO"))
        {
            mapping.valor = Some(idx);
        }
    }

    mapping
}

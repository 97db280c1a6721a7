//! Unit-of-measure vocabulary and normalization.
//!
//! The canonical vocabulary covers the units that actually occur in
//! construction-industry attestations. Superscripts are folded on input
//! (`M²` → `M2`, `M³` → `M3`).

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Canonical unit tokens.
pub const UNIT_VOCABULARY: &[&str] = &[
    "M", "M2", "M3", "ML", "KM", "UN", "PC", "KG", "T", "L", "CJ", "PAR", "JG", "VB", "GL", "H",
    "DIA", "MES", "SC", "CX", "PT", "FX",
];

lazy_static! {
    /// Recognized synonyms, mapped to their canonical token.
    static ref UNIT_SYNONYMS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("UND", "UN");
        m.insert("UNID", "UN");
        m.insert("UNIDADE", "UN");
        m.insert("PECA", "PC");
        m.insert("PECAS", "PC");
        m.insert("TON", "T");
        m.insert("LT", "L");
        m.insert("LITRO", "L");
        m.insert("CONJ", "CJ");
        m.insert("CONJUNTO", "CJ");
        m.insert("PARES", "PAR");
        m.insert("JOGO", "JG");
        m.insert("VERBA", "VB");
        m.insert("GLOBAL", "GL");
        m.insert("HR", "H");
        m.insert("HORA", "H");
        m.insert("D", "DIA");
        m.insert("MESES", "MES");
        m.insert("SACO", "SC");
        m.insert("CAIXA", "CX");
        m.insert("PONTO", "PT");
        m.insert("FAIXA", "FX");
        m.insert("METRO", "M");
        m.insert("METROS", "M");
        m
    };
}

/// Normalize a raw unit string: uppercase, whitespace stripped,
/// superscripts folded.
pub fn normalize_unit(unit: &str) -> String {
    let mut out = String::with_capacity(unit.len());
    for c in unit.trim().chars() {
        match c {
            '²' => out.push('2'),
            '³' => out.push('3'),
            c if c.is_whitespace() => {}
            c => out.extend(c.to_uppercase()),
        }
    }
    out.replace("M^2", "M2").replace("M^3", "M3")
}

/// Map a raw unit to its canonical vocabulary token, if recognized.
/// Accented synonyms (`PÇ`, `PEÇA`) fold to their ASCII forms first.
pub fn canonical_unit(unit: &str) -> Option<String> {
    let normalized = crate::text::normalize::fold_ascii(&normalize_unit(unit));
    if normalized.is_empty() {
        return None;
    }
    if UNIT_VOCABULARY.contains(&normalized.as_str()) {
        return Some(normalized);
    }
    UNIT_SYNONYMS
        .get(normalized.as_str())
        .map(|c| c.to_string())
}

/// Whether a unit token is acceptable on a service item.
///
/// A token is valid when it is in the vocabulary (directly or via a
/// synonym), or when it is at most three characters long; long unknown
/// tokens are almost always words leaked from the description column.
pub fn is_valid_unit(unit: &str) -> bool {
    let normalized = normalize_unit(unit);
    if normalized.is_empty() {
        return false;
    }
    if canonical_unit(&normalized).is_some() {
        return true;
    }
    normalized.chars().count() <= 3
}

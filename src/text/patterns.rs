//! Shared compiled patterns for line classification.
//!
//! Every regex that more than one layer needs lives here, compiled once.
//! The unit alternation is ordered longest-first so `M2` wins over `M`.

use lazy_static::lazy_static;
use regex::Regex;

/// Unit token alternation used inside composed patterns.
pub const UNIT_ALT: &str =
    "M2XKM|M3XKM|M2|M3|M²|M³|ML|KM|UND|UNID|UN|PC|KG|TON|DIA|MES|CONJ|CJ|PAR|JG|VB|GL|SC|CX|PT|FX|T|L|H|M";

lazy_static! {
    /// Line starting with an item code (restart prefix and suffix allowed).
    /// Capture 1 is the full code text.
    pub static ref ITEM_LINE: Regex = Regex::new(
        r"(?i)^((?:S\d+-|AD\d*-)?\d{1,3}(?:\.\d{1,3}){1,3}(?:-[A-Z])?)[\s\-–—.]"
    )
    .unwrap();

    /// Item line where unit and quantity come right after the code
    /// (description lives on a neighboring line).
    pub static ref UNIT_FIRST: Regex = Regex::new(&format!(
        r"(?i)^(?:S\d+-|AD\d*-)?\d{{1,3}}(?:\.\d{{1,3}}){{1,3}}(?:-[A-Z])?\s+(?:{UNIT_ALT})\s+\d[\d.,]*"
    ))
    .unwrap();

    /// Item line `code desc UNIT qty`; capture 2 is the in-line description.
    pub static ref UNIT_LAST: Regex = Regex::new(&format!(
        r"(?i)^((?:S\d+-|AD\d*-)?\d{{1,3}}(?:\.\d{{1,3}}){{1,3}}(?:-[A-Z])?)\s+(.+?)\s+(?:{UNIT_ALT})\s+\d[\d.,]*\s*$"
    ))
    .unwrap();

    /// Item code embedded mid-line with unit and quantity at the end.
    /// Captures: 1 code, 2 unit, 3 quantity.
    pub static ref EMBEDDED_ITEM_END: Regex = Regex::new(&format!(
        r"(?i)(\d{{1,3}}(?:\.\d{{1,3}}){{1,3}})\s+({UNIT_ALT})\s+(\d[\d.,]*)\s*$"
    ))
    .unwrap();

    /// Item code appearing mid-line followed by unit and quantity; marks a
    /// line that belongs to a different row.
    pub static ref ITEM_CODE_MID: Regex = Regex::new(&format!(
        r"(?i)\s\d{{1,3}}(?:\.\d{{1,3}}){{1,3}}\s+(?:{UNIT_ALT})\s+\d[\d.,]*"
    ))
    .unwrap();

    /// SINAPI composition reference (`AF_06/2014`).
    pub static ref AF_CODE_ANYWHERE: Regex = Regex::new(r"AF_\d{2}/\d{4}").unwrap();
    /// Composition reference at end of line.
    pub static ref AF_CODE_END: Regex = Regex::new(r"AF_\d{2}/\d{4}\)?\.?\s*$").unwrap();
    /// Line that is nothing but a composition reference.
    pub static ref AF_ONLY: Regex = Regex::new(r"^\(?AF_\d{2}/\d{4}\)?\.?$").unwrap();

    /// Restart-segment prefix at the start of a code.
    pub static ref SEGMENT_PREFIX: Regex = Regex::new(r"(?i)^S(\d+)-").unwrap();

    /// Page marker emitted by the extractors (`--- Página 3 ---`).
    pub static ref PAGE_MARKER: Regex =
        Regex::new(r"(?i)---\s*p[áa]gina\s+(\d+)\s*---").unwrap();

    /// Bare pagination line (`Página 3`, `Pág. 3 de 12`).
    pub static ref PAGE_BARE: Regex =
        Regex::new(r"(?i)^p[áa]g(?:ina)?\.?\s*\d+(?:\s*(?:de|/)\s*\d+)?$").unwrap();

    /// Bare numbering line (`3`, `3/12`).
    pub static ref PAGINATION_SIMPLE: Regex = Regex::new(r"^\d+\s*(?:/\s*\d+)?$").unwrap();

    /// Line ending in a connective that promises a continuation.
    pub static ref CONTINUATION_WORDS_END: Regex = Regex::new(
        r"(?i)\b(DE|DA|DO|DAS|DOS|E|OU|COM|PARA|EM|SOBRE|SOB|ENTRE|INCLUSIVE|INCLUINDO|CONFORME|TIPO|SENDO|ATE)\s*$"
    )
    .unwrap();

    /// Unit + quantity at end of line. Captures: 1 unit, 2 quantity.
    pub static ref UNIT_QTY_END: Regex = Regex::new(&format!(
        r"(?i)\b({UNIT_ALT})\s+(\d[\d.,]*)\s*$"
    ))
    .unwrap();

    /// Unit + quantity anywhere. Captures: 1 unit, 2 quantity.
    pub static ref UNIT_QTY_MID: Regex = Regex::new(&format!(
        r"(?i)\b({UNIT_ALT})\s+(\d[\d.,]*)"
    ))
    .unwrap();

    /// Unit + quantity at the start of a (stripped) description.
    pub static ref UNIT_QTY_DESC_START: Regex = Regex::new(&format!(
        r"(?i)^(?:{UNIT_ALT})\s+\d[\d.,]*\s*"
    ))
    .unwrap();

    /// Unit + quantity in the middle of a description.
    pub static ref UNIT_QTY_DESC_MID: Regex = Regex::new(&format!(
        r"(?i)\s(?:{UNIT_ALT})\s+\d[\d.,]*(?:\s|$)"
    ))
    .unwrap();

    /// Description that is nothing but unit/quantity residue.
    pub static ref DESC_ONLY_UNIT_QTY: Regex = Regex::new(&format!(
        r"(?i)^(?:{UNIT_ALT})?\s*\d[\d.,]*\s*$"
    ))
    .unwrap();

    /// Description starting with a unit + quantity pair (belongs to the
    /// neighboring row, not this one).
    pub static ref DESC_STARTS_WITH_UNIT: Regex = Regex::new(&format!(
        r"(?i)^(?:{UNIT_ALT})\s+\d[\d.,]*"
    ))
    .unwrap();

    /// Leading section number (`"2."`, `"2.1 -"`).
    pub static ref SECTION_NUMBER: Regex =
        Regex::new(r"^\d{1,3}(?:\.\d{1,3})*\s*[-–—.]?\s*").unwrap();

    /// Footer line with place and long-form date
    /// (`JOÃO PESSOA/PB 12 DE MARÇO DE 2023`).
    pub static ref FOOTER_DATE: Regex = Regex::new(
        r"(?i)[A-ZÀ-Ú\s]+/[A-Z]{2}\s+\d{1,2}\s+DE\s+(JANEIRO|FEVEREIRO|MARÇO|MARCO|ABRIL|MAIO|JUNHO|JULHO|AGOSTO|SETEMBRO|OUTUBRO|NOVEMBRO|DEZEMBRO)\s+DE\s+\d{4}"
    )
    .unwrap();
}

/// Prefixes that mark footer/header furniture, never description text.
pub const STOP_PREFIXES: &[&str] = &[
    "CNPJ",
    "CPF",
    "PREFEITURA",
    "CONSELHO",
    "CREA",
    "CEP",
    "EMAIL",
    "E-MAIL",
    "TEL",
    "TELEFONE",
    "IMPRESSO",
    "PÁGINA",
    "PAGINA",
    "DOCUSIGN",
    "HTTP",
    "WWW",
];

/// Whether a line is a section heading rather than an item row.
///
/// Section headings are short, fully uppercase, optionally numbered lines
/// without a trailing unit/quantity pair
/// (`"2. SERVIÇOS PRELIMINARES"`, `"FUNDAÇÕES"`).
pub fn is_section_header(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 80 {
        return false;
    }
    if UNIT_QTY_END.is_match(trimmed) {
        return false;
    }

    // Strip an optional leading section number.
    let rest = match SECTION_NUMBER.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };

    let alpha = rest.chars().filter(|c| c.is_alphabetic()).count();
    if alpha < 4 {
        return false;
    }
    !rest.chars().any(|c| c.is_lowercase())
}

//! Deterministic text-normalization primitives.
//!
//! Everything here is pure and side-effect free. The aggressive
//! normalization (`normalize_description`) and keyword extraction are
//! memoized through a bounded global cache, since the comparison layers
//! call them repeatedly with the same inputs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Stopwords dropped during keyword extraction: pt-BR function words and
/// unit tokens that carry no meaning for similarity.
pub const STOPWORDS: &[&str] = &[
    "DE", "DO", "DA", "EM", "PARA", "COM", "E", "A", "O", "AS", "OS", "UN", "M2", "M3", "ML", "M",
    "VB", "KG", "INCLUSIVE", "INCLUSIV", "TIPO", "MODELO", "TRACO",
];

const CACHE_CAPACITY: usize = 2048;

lazy_static! {
    static ref PUNCT_RE: Regex = Regex::new(r"[^A-Za-z0-9_\s]").unwrap();
    static ref DIGIT_I_RE: Regex = Regex::new(r"(\d)[Il](\d)").unwrap();
    static ref DIGIT_O_RE: Regex = Regex::new(r"(\d)O(\d)").unwrap();
    static ref LEADING_CODE_RE: Regex = Regex::new(r"^\d+(\.\d+)*\s*[-–—]?\s*").unwrap();
    static ref CONTROL_RE: Regex = Regex::new(r"[\x00-\x1f\x7f]").unwrap();
    static ref DESC_CACHE: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
    static ref KEYWORD_CACHE: Mutex<HashMap<String, BTreeSet<String>>> = Mutex::new(HashMap::new());
}

/// Strip diacritics and drop everything outside ASCII.
pub fn fold_ascii(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii())
        .collect()
}

/// Aggressive normalization for comparison and deduplication.
///
/// Strips diacritics, uppercases, folds punctuation to spaces, repairs
/// digit/letter OCR confusions (`9I9` → `919`, `1O5` → `105`) and collapses
/// whitespace runs. Idempotent.
pub fn normalize_description(desc: &str) -> String {
    if desc.is_empty() {
        return String::new();
    }
    if let Some(hit) = DESC_CACHE.lock().unwrap().get(desc) {
        return hit.clone();
    }

    let mut text = fold_ascii(desc).to_uppercase();
    text = text.replace(';', ",").replace(':', ",");
    text = PUNCT_RE.replace_all(&text, " ").into_owned();
    // Repair to a fixpoint: overlapping confusions ("1I1I1") need a
    // second pass.
    loop {
        let repaired = DIGIT_I_RE.replace_all(&text, "${1}1${2}").into_owned();
        let repaired = DIGIT_O_RE.replace_all(&repaired, "${1}0${2}").into_owned();
        if repaired == text {
            break;
        }
        text = repaired;
    }
    let result = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut cache = DESC_CACHE.lock().unwrap();
    if cache.len() >= CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(desc.to_string(), result.clone());
    result
}

/// Normalize a table-header cell. Same folding as descriptions.
pub fn normalize_header(value: &str) -> String {
    normalize_description(value)
}

/// Normalization tuned for similarity matching: a leading item code is
/// stripped before the aggressive folding.
pub fn normalize_desc_for_match(desc: &str) -> String {
    if desc.is_empty() {
        return String::new();
    }
    let cleaned = LEADING_CODE_RE.replace(desc, "");
    normalize_description(&cleaned)
}

/// Light normalization for display: whitespace collapse, control-character
/// removal, smart quotes and dashes folded. Case and accents are kept.
pub fn normalize_for_display(desc: &str) -> String {
    if desc.is_empty() {
        return String::new();
    }
    let mut text = desc.split_whitespace().collect::<Vec<_>>().join(" ");
    text = CONTROL_RE.replace_all(&text, "").into_owned();
    text = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2013}', '\u{2014}'], "-");
    text.trim().to_string()
}

/// Remove unexpected Unicode from OCR output, keeping ASCII and the
/// Latin-1 supplement letters (`À`–`ÿ`). Everything else becomes a space.
pub fn sanitize_description(desc: &str) -> String {
    if desc.is_empty() {
        return String::new();
    }
    let replaced: String = desc
        .chars()
        .map(|c| {
            let code = c as u32;
            if code < 128 || (0xC0..=0xFF).contains(&code) {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the meaningful keyword set of a description.
pub fn extract_keywords(desc: &str) -> BTreeSet<String> {
    if desc.is_empty() {
        return BTreeSet::new();
    }
    if let Some(hit) = KEYWORD_CACHE.lock().unwrap().get(desc) {
        return hit.clone();
    }

    let normalized = normalize_description(desc);
    let result: BTreeSet<String> = normalized
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect();

    let mut cache = KEYWORD_CACHE.lock().unwrap();
    if cache.len() >= CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(desc.to_string(), result.clone());
    result
}

/// Jaccard similarity over keyword sets, 0 when either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let kw_a = extract_keywords(a);
    let kw_b = extract_keywords(b);
    if kw_a.is_empty() || kw_b.is_empty() {
        return 0.0;
    }
    let intersection = kw_a.intersection(&kw_b).count();
    let union = kw_a.union(&kw_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Parse a quantity cell in Brazilian number format.
///
/// Dots are thousands separators, the comma is the decimal mark:
/// `"1.234,56"` → `1234.56`, `"416,65"` → `416.65`.
pub fn parse_quantity(value: &str) -> Option<f64> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }
    let swapped = text.replace('.', "").replace(',', ".");
    let cleaned: String = swapped
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

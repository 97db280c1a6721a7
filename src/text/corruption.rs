//! Heuristics for OCR garbage and corrupted lines.

use crate::text::normalize::{fold_ascii, normalize_description};

/// Footer/certification tokens that show up mirrored when the OCR engine
/// reads a rotated or watermarked footer.
const REVERSED_FOOTER_TOKENS: &[&str] = &[
    "CONSELHO",
    "REGISTRADO",
    "DOCUMENTO",
    "CERTIDAO",
    "IMPRESSO",
    "CHAVE",
    "CREA",
    "AGRONOMIA",
    "ENGENHARIA",
    "CONFERIR",
    "FOLHAS",
    "QRCODE",
    "QR",
    "PAGINA",
    "PAG",
];

const VOWELS: &[char] = &[
    'a', 'e', 'i', 'o', 'u', 'á', 'é', 'í', 'ó', 'ú', 'à', 'â', 'ê', 'ô', 'ã', 'õ',
];

/// Whether a single line reads as OCR garbage.
///
/// Flags lines whose alphabetic content has almost no vowels, or that are
/// dominated by non-alphanumeric runs.
pub fn is_corrupted_text(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 4 {
        return false;
    }

    let lower = trimmed.to_lowercase();
    let letters = lower.chars().filter(|c| c.is_alphabetic()).count();
    let vowels = lower.chars().filter(|c| VOWELS.contains(c)).count();

    if letters >= 8 && (vowels as f64) < letters as f64 * 0.15 {
        return true;
    }

    let total = trimmed.chars().count();
    let non_alnum = trimmed
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    total >= 8 && non_alnum as f64 > total as f64 * 0.5
}

/// Whether a whole extraction reads as garbage rather than document text.
///
/// Used by the native-text extractor to reject PDFs whose embedded text
/// layer is an artifact (vector junk, encrypted glyph soup).
pub fn is_garbage_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let total = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return true;
    }

    let alpha = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    if (alpha as f64) < total as f64 * 0.3 {
        return true;
    }

    let lower = trimmed.to_lowercase();
    let vowels = lower.chars().filter(|c| VOWELS.contains(c)).count();
    alpha >= 40 && (vowels as f64) < alpha as f64 * 0.2
}

/// Detect footer lines mirrored by the OCR engine
/// (`"ohlesnoC"` → `"Conselho"`).
pub fn looks_like_reversed_footer_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 6 {
        return false;
    }
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let reversed: String = words
        .iter()
        .map(|w| w.chars().rev().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");
    let normalized = fold_ascii(&reversed).to_uppercase();

    REVERSED_FOOTER_TOKENS
        .iter()
        .any(|token| normalized.contains(token))
}

/// Ratio of alphabetic to alphanumeric characters of a description.
/// Low values indicate digit soup from a failed table read.
pub fn alpha_ratio(desc: &str) -> Option<f64> {
    let letters = desc.chars().filter(|c| c.is_alphabetic()).count();
    let alnum = desc.chars().filter(|c| c.is_alphanumeric()).count();
    if alnum == 0 {
        None
    } else {
        Some(letters as f64 / alnum as f64)
    }
}

/// Whether the normalized description still carries alphabetic content.
pub fn has_alpha_content(desc: &str) -> bool {
    normalize_description(desc)
        .chars()
        .any(|c| c.is_ascii_alphabetic())
}

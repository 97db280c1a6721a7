//! Continuation and prefix line collection.
//!
//! A description frequently spans physical lines, interleaved with footers,
//! section headings and OCR junk. The collectors walk forward and backward
//! from an item line, absorbing genuine continuations and stopping at
//! anything that belongs to another row or to page furniture.

use lazy_static::lazy_static;
use regex::Regex;

use crate::text::corruption::looks_like_reversed_footer_line;
use crate::text::normalize::fold_ascii;
use crate::text::patterns::{self, STOP_PREFIXES};

/// Technical nouns that start a new description rather than continue one.
/// ASCII-folded uppercase.
pub const TECHNICAL_NOUNS: &[&str] = &[
    "CABO", "TUBO", "CAIXA", "TOMADA", "DISJUNTOR", "DISJUNTORES", "QUADRO", "PONTO", "ELETRODUTO",
    "INTERRUPTOR", "LUMINARIA", "LAMPADA", "TORNEIRA", "REGISTRO", "VALVULA", "TANQUE", "CHUVEIRO",
    "PORTA", "JANELA", "VIDRO", "PINTURA", "REVESTIMENTO", "ARGAMASSA", "CONCRETO", "ALVENARIA",
    "DEMOLICAO", "ESCAVACAO", "FORNECIMENTO", "EXECUCAO", "INSTALACAO", "ASSENTAMENTO", "CALHA",
    "MOLA", "TRILHO", "RALO", "VISOR", "FECHADURA", "PISO", "TETO", "FORRO", "RODAPE", "SOLEIRA",
    "PEITORIL", "BANCADA", "GUARDA", "CORRIMAO", "GRAMA", "GRAMADO", "JARDIM", "PAISAGISMO",
    "PLANTIO", "MEIO-FIO", "SARJETA", "CALCADA", "PASSEIO",
];

/// Common noun + adjective pairs; the adjective on the next line continues
/// the noun, it does not start a new row. Both sides ASCII-folded.
const COMPOUND_PAIRS: &[(&str, &[&str])] = &[
    ("CAIXA", &["ELETRICA", "PLASTICA"]),
    ("TOMADA", &["RESIDENCIAL", "INDUSTRIAL", "ESPECIAL"]),
    ("CABO", &["FLEXIVEL", "RIGIDO", "ISOLADO"]),
    ("DISJUNTOR", &["MONOPOLAR", "BIPOLAR", "TRIPOLAR", "TERMOMAGNETICO"]),
    ("QUADRO", &["ELETRICO", "DISTRIBUICAO"]),
    ("PONTO", &["ELETRICO", "HIDRAULICO"]),
    ("ELETRODUTO", &["FLEXIVEL", "RIGIDO", "PVC"]),
    ("TUBO", &["PVC", "GALVANIZADO", "FLEXIVEL"]),
    (
        "CONCRETO",
        &["INTERNA", "INTERNAS", "EXTERNA", "EXTERNAS", "INTERNO", "EXTERNO", "APARENTE", "ARMADO", "SIMPLES", "MAGRO"],
    ),
    (
        "ALVENARIA",
        &["INTERNA", "INTERNAS", "EXTERNA", "EXTERNAS", "ESTRUTURAL", "VEDACAO"],
    ),
    ("PAREDE", &["INTERNA", "INTERNAS", "EXTERNA", "EXTERNAS"]),
    ("ESTRUTURA", &["METALICA", "MADEIRA"]),
    ("LAJE", &["MACICA", "NERVURADA", "PRE-MOLDADA"]),
];

lazy_static! {
    static ref STARTS_BRACKET_RE: Regex = Regex::new(r"^[(\[]").unwrap();
    static ref STARTS_PREPOSITION_RE: Regex =
        Regex::new(r"(?i)^(DE|DA|DO|E|OU|COM|PARA|EM|NO|NA)\s").unwrap();
    static ref SHORT_TOKEN_RE: Regex = Regex::new(r"^[A-Z]{1,3}[,\s]").unwrap();
    static ref TECH_SPEC_RE: Regex = Regex::new(r"^\d+[A-Z/,]").unwrap();
    static ref MORTAR_MIX_RE: Regex = Regex::new(r"^\d+(?::\d+){1,3}\b").unwrap();
    static ref ADJECTIVE_RE: Regex =
        Regex::new(r"^[A-ZÁÉÍÓÚÀÂÊÔ]{4,}(AL|AR|ER|OR|VEL|AIS|EIS|OS|A|O|E|I|S)$").unwrap();
    static ref DASH_UNIT_QTY_END_RE: Regex = Regex::new(&format!(
        r"(?i)\s-\s*(?:{})\s+[\d.,]+\s*$",
        patterns::UNIT_ALT
    ))
    .unwrap();
    static ref CLOSES_THEN_TEXT_RE: Regex = Regex::new(r"^[)}\]]\s*[A-Z]").unwrap();
}

fn word_upper(word: &str) -> String {
    fold_ascii(word).to_uppercase()
}

fn is_technical_noun(word: &str) -> bool {
    let w = word_upper(word);
    let w = w.trim_end_matches(|c: char| ",.;:".contains(c));
    TECHNICAL_NOUNS.contains(&w)
        || (w.ends_with('S') && TECHNICAL_NOUNS.contains(&&w[..w.len() - 1]))
}

fn compound_pair(prev_last: &str, next_first: &str) -> bool {
    let noun = word_upper(prev_last);
    let adj = word_upper(next_first);
    let adj = adj.trim_end_matches(|c: char| ",.;:".contains(c));
    COMPOUND_PAIRS
        .iter()
        .any(|(n, adjs)| *n == noun && adjs.contains(&adj))
}

/// Whether `prev_line` may be glued in front of a description.
pub fn is_valid_prefix_line(prev_line: &str) -> bool {
    if prev_line.chars().count() < 10 {
        return false;
    }
    if patterns::ITEM_LINE.is_match(prev_line) {
        return false;
    }
    !patterns::is_section_header(prev_line)
}

/// Whether a description reads as a fragment that needs the previous line.
pub fn is_description_fragment(desc: &str, prev_line: &str) -> bool {
    if desc.is_empty() {
        return true;
    }

    if STARTS_BRACKET_RE.is_match(desc) {
        return true;
    }
    if desc.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) {
        return true;
    }
    if STARTS_PREPOSITION_RE.is_match(desc) {
        return true;
    }
    if SHORT_TOKEN_RE.is_match(desc) {
        return true;
    }
    if TECH_SPEC_RE.is_match(desc) {
        return true;
    }
    if MORTAR_MIX_RE.is_match(desc) {
        return true;
    }
    if !prev_line.is_empty() && patterns::CONTINUATION_WORDS_END.is_match(prev_line) {
        return true;
    }

    if !prev_line.is_empty() {
        let prev_last = prev_line.split_whitespace().last().unwrap_or("");
        let prev_ends_clean = !prev_last.is_empty()
            && !prev_last.ends_with(['.', ',', ';', ':'])
            && !prev_last.contains("AF_");

        let first_word = desc.split_whitespace().next().unwrap_or("");
        let first_clean = first_word.trim_end_matches(|c: char| ",.;:".contains(c));

        let first_is_adjective = !first_clean.is_empty()
            && !is_technical_noun(first_clean)
            && ADJECTIVE_RE.is_match(&word_upper(first_clean));
        if prev_ends_clean && first_is_adjective {
            return true;
        }

        if compound_pair(prev_last, first_clean) {
            return true;
        }

        if prev_line.trim_end().ends_with(',') {
            return true;
        }
    }

    false
}

/// Whether the previous line is itself the tail of another item.
pub fn prev_line_is_continuation(prev_line: &str, lines: &[&str], line_idx: usize) -> bool {
    if prev_line.is_empty() {
        return false;
    }
    if patterns::AF_CODE_END.is_match(prev_line) {
        return true;
    }
    if CLOSES_THEN_TEXT_RE.is_match(prev_line) {
        return true;
    }
    if prev_line.ends_with('.') && prev_line.contains("AF_") {
        return true;
    }

    // Walk back a few lines: an item line above (without an intervening
    // section break) means prev_line is its continuation.
    if line_idx >= 2 && !patterns::ITEM_LINE.is_match(prev_line) {
        let first = prev_line.split_whitespace().next().unwrap_or("");
        if is_technical_noun(first) {
            return false;
        }
        let lower_bound = line_idx.saturating_sub(7);
        for j in (lower_bound..line_idx.saturating_sub(1)).rev() {
            let check = lines[j].trim();
            if check.is_empty() {
                break;
            }
            if patterns::is_section_header(check) {
                break;
            }
            if patterns::AF_CODE_ANYWHERE.is_match(check) {
                break;
            }
            if patterns::ITEM_LINE.is_match(check) {
                return true;
            }
        }
    }

    false
}

/// Decide whether the previous line should be glued in front of the
/// in-line description.
pub fn should_prefix_with_previous(
    desc_in_line: &str,
    prev_line: &str,
    lines: &[&str],
    line_idx: usize,
) -> bool {
    let is_fragment = is_description_fragment(desc_in_line, prev_line);
    if !is_fragment && desc_in_line.chars().count() >= 25 {
        return false;
    }
    if !is_valid_prefix_line(prev_line) {
        return false;
    }
    if patterns::AF_ONLY.is_match(prev_line) {
        return false;
    }
    if patterns::PAGINATION_SIMPLE.is_match(prev_line) {
        return false;
    }
    !prev_line_is_continuation(prev_line, lines, line_idx)
}

/// Collect continuation text after an item line.
///
/// Walks forward from `start_idx`, absorbing genuine continuations and
/// stopping at blank lines, other item lines, section headings, footer
/// furniture and OCR junk. Short lines that begin with a continuation
/// word are absorbed even when the following line starts a new item.
pub fn collect_continuation_lines(lines: &[&str], start_idx: usize, max_lines: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut j = start_idx;

    while j < lines.len() && parts.len() < max_lines {
        let cont = lines[j].trim();

        if cont.is_empty() {
            break;
        }
        if cont.chars().count() < 4 {
            j += 1;
            continue;
        }
        if looks_like_reversed_footer_line(cont) {
            j += 1;
            continue;
        }

        let has_af = patterns::AF_CODE_ANYWHERE.is_match(cont);
        if !has_af {
            // Vowel-starved short junk.
            let lower = cont.to_lowercase();
            let vowels = lower
                .chars()
                .filter(|c| "aeiouáéíóúàâêô".contains(*c))
                .count();
            let total = cont.chars().count();
            if total > 3 && (vowels as f64) < total as f64 * 0.15 {
                j += 1;
                continue;
            }

            if total < 25 {
                // Closing a parenthesis opened on the previous line is
                // always absorbed.
                if cont.contains(')') && j > 0 {
                    let prev = lines[j - 1].trim();
                    let opens = prev.matches('(').count();
                    let closes = prev.matches(')').count();
                    if opens > closes {
                        parts.push(cont);
                        break;
                    }
                }

                let first = cont.split_whitespace().next().unwrap_or("");
                let first_lower = first.to_lowercase();
                if cont.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) {
                    const CONTINUATION_STARTERS: &[&str] = &[
                        "inclusive", "incluindo", "conforme", "segundo", "tipo", "como", "sendo",
                        "sem", "ref", "exceto", "excetuando", "exclusive", "exclusivo",
                    ];
                    const VALID_STARTERS: &[&str] = &[
                        "de", "da", "do", "das", "dos", "e", "ou", "a", "o", "para", "com", "em",
                        "no", "na", "nos", "nas", "por", "pelo", "pela", "ao", "aos", "as",
                    ];
                    let words: Vec<&str> = cont.split_whitespace().collect();
                    if CONTINUATION_STARTERS.contains(&first_lower.as_str()) {
                        // Absorb.
                    } else if VALID_STARTERS.contains(&first_lower.as_str()) && words.len() > 1 {
                        let has_substantive = words[1..].iter().any(|w| {
                            let len = w.chars().count();
                            (len >= 4 && w.chars().next().unwrap().is_uppercase())
                                || (len >= 5 && w.chars().all(|c| c.is_alphabetic()))
                        });
                        if !has_substantive {
                            j += 1;
                            continue;
                        }
                    } else {
                        j += 1;
                        continue;
                    }
                } else if !cont.contains(' ')
                    && !cont.chars().all(|c| c.is_uppercase() || !c.is_alphabetic())
                    && !cont.chars().all(|c| c.is_ascii_digit())
                    && !cont.chars().next().unwrap().is_uppercase()
                {
                    j += 1;
                    continue;
                }
            }

            if cont.starts_with([',', ':', ';', '.', '!', '?', '-']) {
                j += 1;
                continue;
            }
        }

        if patterns::ITEM_LINE.is_match(cont) {
            break;
        }
        if patterns::ITEM_CODE_MID.is_match(cont) {
            break;
        }

        // When the next line starts a new item, this line is the last
        // chance to absorb a trailing fragment; be conservative.
        if j + 1 < lines.len() {
            let next = lines[j + 1].trim();
            if patterns::ITEM_LINE.is_match(next) {
                let prev = if j > 0 { lines[j - 1].trim() } else { "" };
                let prev_promises_more = prev.ends_with(['-', '–', '—'])
                    || patterns::CONTINUATION_WORDS_END.is_match(prev);
                if prev_promises_more {
                    parts.push(cont);
                    break;
                }

                let cont_upper = word_upper(cont);
                let prev_has_dash_unit_qty = DASH_UNIT_QTY_END_RE.is_match(prev);
                const TAIL_STARTERS: &[&str] =
                    &["FORNECIMENTO", "EXECUCAO", "INSTALACAO", "ASSENTAMENTO"];
                if prev_has_dash_unit_qty
                    && TAIL_STARTERS.iter().any(|t| cont_upper.starts_with(t))
                {
                    parts.push(cont);
                    break;
                }

                let prev_has_unit_qty = patterns::UNIT_QTY_END.is_match(prev);
                const CONNECTIVE_STARTERS: &[&str] =
                    &["E ", "OU ", "COM ", "SEM ", "INCLUSIVE", "INCLUINDO"];
                if prev_has_unit_qty
                    && CONNECTIVE_STARTERS.iter().any(|t| cont_upper.starts_with(t))
                {
                    parts.push(cont);
                    break;
                }

                if patterns::UNIT_FIRST.is_match(next) {
                    break;
                }
                let first = cont.split_whitespace().next().unwrap_or("");
                if is_technical_noun(first) {
                    break;
                }
                if patterns::is_section_header(cont) {
                    break;
                }
                if patterns::CONTINUATION_WORDS_END.is_match(cont) {
                    parts.push(cont);
                    break;
                }

                let first_chars: Vec<char> = first.chars().collect();
                let starts_new_desc = (first_chars.len() >= 4
                    && first_chars[0].is_uppercase()
                    && !first.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()))
                    || (cont.ends_with('.') && cont.chars().count() > 20);
                if !starts_new_desc {
                    parts.push(cont);
                }
                break;
            }
        }

        if patterns::is_section_header(cont) {
            break;
        }
        let cont_upper = word_upper(cont);
        if STOP_PREFIXES.iter().any(|p| cont_upper.starts_with(&word_upper(p))) {
            break;
        }
        if patterns::FOOTER_DATE.is_match(cont) {
            break;
        }
        if patterns::PAGE_BARE.is_match(cont) || patterns::PAGE_MARKER.is_match(cont) {
            break;
        }

        parts.push(cont);
        j += 1;

        if patterns::AF_CODE_ANYWHERE.is_match(cont) {
            break;
        }
    }

    parts.join(" ")
}

/// Collect lines before an item line, in document order.
pub fn collect_previous_lines(lines: &[&str], start_idx: usize, max_lines: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut j = start_idx;

    while j > 0 && parts.len() < max_lines {
        j -= 1;
        let prev = lines[j].trim();

        if prev.is_empty() {
            break;
        }
        if patterns::ITEM_LINE.is_match(prev) {
            break;
        }
        if patterns::is_section_header(prev) {
            break;
        }
        let prev_upper = word_upper(prev);
        if STOP_PREFIXES.iter().any(|p| prev_upper.starts_with(&word_upper(p))) {
            break;
        }
        if patterns::AF_CODE_ANYWHERE.is_match(prev) {
            break;
        }
        if patterns::ITEM_CODE_MID.is_match(prev) {
            break;
        }

        parts.insert(0, prev);

        // A line opening with a capitalized word is the start of the
        // description; stop extending backwards.
        let first = prev.split_whitespace().next().unwrap_or("");
        if first.chars().count() >= 4 && first.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
        {
            break;
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_collect_simple_continuation() {
        let text = "1.3 Forro em\nplacas de gesso M2 216,41\n\n1.4 Outro item M2 10,00";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "placas de gesso M2 216,41");
    }

    #[test]
    fn test_collect_stops_at_next_item() {
        let text = "1.1 Alvenaria de vedação M2 10,00\n1.2 Pintura látex M2 20,00";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "");
    }

    #[test]
    fn test_collect_stops_at_footer() {
        let text = "1.1 Alvenaria de\nvedação em blocos cerâmicos\nCNPJ 12.345.678/0001-99\nmais texto";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "vedação em blocos cerâmicos");
    }

    #[test]
    fn test_collect_skips_reversed_footer() {
        let text = "1.1 Forro em\nohlesnoC lanoigeR ed airahnegnE\nplacas de gesso acartonado\n";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "placas de gesso acartonado");
    }

    #[test]
    fn test_collect_stops_after_af_code() {
        let text = "1.1 Chapisco aplicado\nem alvenaria. AF_06/2014\nlinha seguinte qualquer";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "em alvenaria. AF_06/2014");
    }

    #[test]
    fn test_collect_absorbs_inclusive_before_next_item() {
        let text = "1.1 Estrutura metálica para cobertura M2 100,00\ninclusive içamento\n1.2 Outro serviço M2 5,00";
        let ls = lines(text);
        let cont = collect_continuation_lines(&ls, 1, 5);
        assert_eq!(cont, "inclusive içamento");
    }

    #[test]
    fn test_previous_lines_collected_in_order() {
        let text = "Fornecimento e assentamento\nde piso cerâmico\n2.1 M2 88,00";
        let ls = lines(text);
        let prev = collect_previous_lines(&ls, 2, 3);
        assert_eq!(prev, "Fornecimento e assentamento de piso cerâmico");
    }

    #[test]
    fn test_previous_lines_stop_at_item() {
        let text = "1.9 Outro item M2 5,00\nde piso cerâmico\n2.1 M2 88,00";
        let ls = lines(text);
        let prev = collect_previous_lines(&ls, 2, 3);
        assert_eq!(prev, "de piso cerâmico");
    }

    #[test]
    fn test_fragment_detection() {
        assert!(is_description_fragment("", ""));
        assert!(is_description_fragment("de gesso acartonado", ""));
        assert!(is_description_fragment("(com reforço)", ""));
        assert!(is_description_fragment("1:2:8 preparo manual", ""));
        assert!(!is_description_fragment("Forro em placas de gesso", ""));
        // Previous line ends with a connective.
        assert!(is_description_fragment(
            "Placas cimentícias",
            "Fornecimento e instalação de"
        ));
    }

    #[test]
    fn test_technical_noun_not_adjective() {
        // PINTURA is a noun; it should not be glued as an adjective.
        assert!(!is_description_fragment("Pintura acrílica em paredes", "Alvenaria de vedacao"));
    }
}

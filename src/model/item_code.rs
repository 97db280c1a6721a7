//! Hierarchical item codes: parsing, normalization and canonical ordering.
//!
//! Grammar (see the crate docs for the full interface contract):
//!
//! ```text
//! code           := (restart_prefix '-')? number ('.' number){1,3} ('-' suffix)?
//! restart_prefix := 'S' [1-9][0-9]*      ; segment prefix
//!                |  'AD' [0-9]*          ; legacy addendum prefix
//! number         := [0-9]{1,3}
//! suffix         := [A-Z]                ; duplicate disambiguator
//! ```
//!
//! Codes sort lexicographically on `(segment_index, components, suffix_index)`;
//! unprefixed codes come first, `Sk-` segments at index `k`, legacy `ADn-`
//! codes at `100 + n`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref CODE_RE: Regex = Regex::new(
        r"(?i)^(?:(S[1-9][0-9]*)-|(AD[0-9]*)-)?([0-9]{1,3}(?:\.[0-9]{1,3}){1,3})(?:-([A-Za-z]))?$"
    )
    .unwrap();
    static ref RESTART_START_RE: Regex =
        Regex::new(r"(?i)^(S[1-9][0-9]*-\d{1,3}(?:\.\d{1,3}){1,3}(?:-[A-Z])?)\b").unwrap();
    static ref ADDENDUM_START_RE: Regex =
        Regex::new(r"(?i)^(AD[0-9]*-\d{1,3}(?:\.\d{1,3}){1,3}(?:-[A-Z])?)\b").unwrap();
    static ref NUMERIC_START_RE: Regex =
        Regex::new(r"^(\d{1,3}(?:\s*\.\s*\d{1,3}){1,3}(?:-[A-Z])?)\b").unwrap();
    static ref SPACED_START_RE: Regex = Regex::new(r"^(\d{1,3}(?:\s+\d{1,2}){1,3})\b").unwrap();
    static ref STRIP_PREFIX_RE: Regex = Regex::new(r"(?i)^(AD[0-9]*-|S[0-9]+-)").unwrap();
    static ref STRIP_SUFFIX_RE: Regex = Regex::new(r"(?i)-[A-Z]$").unwrap();
    static ref LEAD_CODE_RE: Regex = Regex::new(
        r"(?i)^(S\d+-)?(\d{1,3}(?:\s*\.\s*\d{1,3}){1,4}|\d{1,3}(?:\s+\d{1,2}){1,3})\s*[-.]?\s*"
    )
    .unwrap();
}

/// Restart marker carried by a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestartPrefix {
    /// `Sk-` with `k >= 1`.
    Segment(u32),
    /// Legacy `ADn-`; bare `AD-` is `Addendum(0)`.
    Addendum(u32),
}

/// A parsed hierarchical item code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemCode {
    prefix: Option<RestartPrefix>,
    components: Vec<u16>,
    suffix: Option<char>,
}

impl ItemCode {
    /// Parse a string strictly against the code grammar.
    ///
    /// Returns `None` for anything that is not a well-formed code
    /// (including single-component values such as `"7"`, which are section
    /// numbers, not item codes).
    pub fn parse(value: &str) -> Option<ItemCode> {
        let text = value.trim();
        if text.is_empty() {
            return None;
        }
        let caps = CODE_RE.captures(text)?;

        let prefix = if let Some(seg) = caps.get(1) {
            let k: u32 = seg.as_str()[1..].parse().ok()?;
            Some(RestartPrefix::Segment(k))
        } else if let Some(ad) = caps.get(2) {
            let digits = &ad.as_str()[2..];
            let n: u32 = if digits.is_empty() { 0 } else { digits.parse().ok()? };
            Some(RestartPrefix::Addendum(n))
        } else {
            None
        };

        let components: Vec<u16> = caps
            .get(3)
            .unwrap()
            .as_str()
            .split('.')
            .map(|p| p.parse().unwrap())
            .collect();

        let suffix = caps
            .get(4)
            .map(|m| m.as_str().chars().next().unwrap().to_ascii_uppercase());

        Some(ItemCode {
            prefix,
            components,
            suffix,
        })
    }

    /// Build a code from components, without prefix or suffix.
    ///
    /// Returns `None` unless there are 2 to 4 components, each below 1000.
    pub fn from_components(components: &[u16]) -> Option<ItemCode> {
        if !(2..=4).contains(&components.len()) || components.iter().any(|&c| c > 999) {
            return None;
        }
        Some(ItemCode {
            prefix: None,
            components: components.to_vec(),
            suffix: None,
        })
    }

    /// The numeric components.
    pub fn components(&self) -> &[u16] {
        &self.components
    }

    /// The restart prefix, if any.
    pub fn prefix(&self) -> Option<RestartPrefix> {
        self.prefix
    }

    /// The duplicate-disambiguation suffix, if any.
    pub fn suffix(&self) -> Option<char> {
        self.suffix
    }

    /// Segment index for ordering: 0 unprefixed, `k` for `Sk-`,
    /// `100 + n` for `ADn-`.
    pub fn segment_index(&self) -> u32 {
        match self.prefix {
            None => 0,
            Some(RestartPrefix::Segment(k)) => k,
            Some(RestartPrefix::Addendum(n)) => 100 + n,
        }
    }

    /// Suffix index for ordering: 0 without suffix, 1 for `-A`, 2 for `-B`.
    pub fn suffix_index(&self) -> u8 {
        match self.suffix {
            None => 0,
            Some(c) => (c as u8) - b'A' + 1,
        }
    }

    /// The canonical sort key `(segment_index, components, suffix_index)`.
    pub fn sort_key(&self) -> (u32, Vec<u16>, u8) {
        (self.segment_index(), self.components.clone(), self.suffix_index())
    }

    /// The same code without prefix and suffix.
    pub fn base(&self) -> ItemCode {
        ItemCode {
            prefix: None,
            components: self.components.clone(),
            suffix: None,
        }
    }

    /// Dotted form of the components only (`"1.2.3"`), prefix and suffix
    /// stripped.
    pub fn base_str(&self) -> String {
        self.components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Replace the restart prefix.
    pub fn with_prefix(&self, prefix: Option<RestartPrefix>) -> ItemCode {
        ItemCode {
            prefix,
            components: self.components.clone(),
            suffix: self.suffix,
        }
    }

    /// Replace the duplicate suffix.
    pub fn with_suffix(&self, suffix: Option<char>) -> ItemCode {
        ItemCode {
            prefix: self.prefix,
            components: self.components.clone(),
            suffix,
        }
    }

    /// Whether `other` is a strict hierarchical descendant (`1.2` ⊃ `1.2.3`).
    pub fn is_parent_of(&self, other: &ItemCode) -> bool {
        other.components.len() > self.components.len()
            && other.components.starts_with(&self.components)
            && self.segment_index() == other.segment_index()
    }

    /// Concatenated digits of the components; used by the column-leak check
    /// (`"1.2"` → `"12"`).
    pub fn digits(&self) -> String {
        self.components.iter().map(|c| c.to_string()).collect()
    }
}

impl std::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix {
            Some(RestartPrefix::Segment(k)) => write!(f, "S{}-", k)?,
            Some(RestartPrefix::Addendum(0)) => write!(f, "AD-")?,
            Some(RestartPrefix::Addendum(n)) => write!(f, "AD{}-", n)?,
            None => {}
        }
        write!(f, "{}", self.base_str())?;
        if let Some(c) = self.suffix {
            write!(f, "-{}", c)?;
        }
        Ok(())
    }
}

impl Serialize for ItemCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ItemCode::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid item code: {}", s)))
    }
}

/// Parse a loose item tuple from arbitrary cell text.
///
/// More permissive than the code grammar: tolerates OCR noise characters,
/// spaces as separators, and a single component. Used by the column
/// classifiers and prefix filters, where `"7"` is a meaningful section
/// number even though it is not a full code.
pub fn parse_item_tuple(value: &str) -> Option<Vec<u16>> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ' ')
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    let parts: Vec<&str> = cleaned
        .split(|c| c == '.' || c == ' ')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    if parts.iter().any(|p| p.len() > 3) {
        return None;
    }

    parts.iter().map(|p| p.parse::<u16>().ok()).collect()
}

/// Render a tuple back to its dotted string form.
pub fn tuple_to_str(tuple: &[u16]) -> String {
    tuple
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Normalize an arbitrary code-ish string to its dotted base form.
///
/// Strips restart prefixes (and suffixes when `strip_suffix` is set), then
/// reparses through the loose tuple grammar: `"AD-1.2.3"` → `"1.2.3"`,
/// `"1 2 3"` → `"1.2.3"`. Returns `None` when nothing parseable remains.
pub fn normalize_item_code(value: &str, strip_suffix: bool) -> Option<String> {
    let mut text = value.trim().to_string();
    if text.is_empty() {
        return None;
    }
    text = STRIP_PREFIX_RE.replace(&text, "").trim().to_string();
    if strip_suffix {
        text = STRIP_SUFFIX_RE.replace(&text, "").trim().to_string();
    }
    parse_item_tuple(&text).map(|t| tuple_to_str(&t))
}

/// Extract an item code from the start of a description.
///
/// Recognizes the strict grammar plus spaced separators (`"1 2 3"`).
/// Returns the matched code text, or an empty string.
pub fn extract_item_code(desc: &str) -> String {
    let text = desc.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = RESTART_START_RE.captures(text) {
        return caps[1].to_uppercase();
    }
    if let Some(caps) = ADDENDUM_START_RE.captures(text) {
        return caps[1].to_uppercase();
    }
    if let Some(caps) = NUMERIC_START_RE.captures(text) {
        let code: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
        return code;
    }
    if let Some(caps) = SPACED_START_RE.captures(text) {
        let parts: Vec<&str> = caps[1].split_whitespace().collect();
        return parts.join(".");
    }
    String::new()
}

/// Split a leading item code off a description.
///
/// Returns `(code, remainder)`; the code is empty when none was found, and
/// the remainder falls back to the full trimmed text when stripping would
/// leave nothing.
pub fn split_item_description(desc: &str) -> (String, String) {
    let trimmed = desc.trim();
    if trimmed.is_empty() {
        return (String::new(), String::new());
    }
    let code = extract_item_code(trimmed);
    if code.is_empty() {
        return (String::new(), trimmed.to_string());
    }
    let cleaned = LEAD_CODE_RE.replace(trimmed, "").trim().to_string();
    if cleaned.is_empty() {
        (code, trimmed.to_string())
    } else {
        (code, cleaned)
    }
}

/// Whether a normalized code appears in the text, tolerating flexible
/// spacing around the dots and rejecting matches inside longer numbers.
pub fn item_code_in_text(item_code: &str, texto: &str) -> bool {
    if item_code.is_empty() || texto.is_empty() {
        return false;
    }
    let escaped = regex::escape(item_code).replace(r"\.", r"\s*\.\s*");
    let pattern = format!(r"(^|[^\d]){}([^\d]|$)", escaped);
    Regex::new(&pattern)
        .map(|re| re.is_match(texto))
        .unwrap_or(false)
}

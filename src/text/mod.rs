//! Language-neutral text primitives the higher layers depend on:
//! normalization, unit vocabulary, similarity, corruption heuristics and
//! the shared pattern set.

pub mod corruption;
pub mod normalize;
pub mod patterns;
pub mod similarity;
pub mod units;

pub use corruption::{is_corrupted_text, is_garbage_text, looks_like_reversed_footer_line};
pub use normalize::{
    extract_keywords, normalize_desc_for_match, normalize_description, normalize_for_display,
    normalize_header, parse_quantity, sanitize_description, similarity, STOPWORDS,
};
pub use units::{canonical_unit, is_valid_unit, normalize_unit, UNIT_VOCABULARY};

//! Deduplication of overlapping extractions.
//!
//! Four strategies applied in order (pair, restart-prefix, within-planilha,
//! description+unit), an orphan-suffix cleanup, restart-segment detection,
//! and the cross-source merge used by the cascade.

pub mod index;
pub mod restart;
pub mod strategies;

pub use index::KeywordIndex;
pub use restart::apply_restart_prefixes;
pub use strategies::{
    merge_prefer_primary, orphan_suffix_cleanup, remove_codeless_duplicates, DedupReport,
    Deduplicator,
};

//! Core data model: item codes, service items and the document-level
//! extraction result.

pub mod attestation;
pub mod item_code;
pub mod service;

pub use attestation::AttestationExtraction;
pub use item_code::{
    extract_item_code, item_code_in_text, normalize_item_code, parse_item_tuple,
    split_item_description, tuple_to_str, ItemCode, RestartPrefix,
};
pub use service::{sort_services, DescSource, ServiceItem, ServiceSource};

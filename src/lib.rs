#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::regex_creation_in_loops)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # Atesta
//!
//! Extraction core for construction-industry technical-capacity
//! attestations: turns an opaque document (digital or scanned PDF, or page
//! images) into a canonical, ordered list of service line items with
//! hierarchical codes, quantities and units.
//!
//! ## Architecture
//!
//! - **Cascade**: native PDF text → hosted document intelligence → local
//!   OCR → grid OCR → vision model, with quality-driven gating between
//!   stages. Cheap sources run first; a stage is accepted as soon as its
//!   quantity coverage clears the configured threshold.
//! - **Table recovery**: schema-free header detection, column-role
//!   inference by header and by content, hidden-item recovery and
//!   column-leak cleanup.
//! - **Description reconstruction**: the raw extracted text is the ground
//!   truth; descriptions that span lines or pages are reassembled from it.
//! - **Filters and deduplication**: classification-path rejection,
//!   summary-row rejection, unit enforcement, code-coherence filters, and
//!   pair/restart/planilha/description dedupe over an inverted keyword
//!   index.
//!
//! External services (OCR engines, document intelligence, vision and text
//! models) are injected by the host as capability traits; the core owns no
//! credentials, no scheduling and no persistence.
//!
//! ## Quick start
//!
//! ```ignore
//! use atesta::config::ExtractionConfig;
//! use atesta::host::HostHooks;
//! use atesta::pipeline::{Pipeline, PipelineClients};
//!
//! # fn main() -> atesta::error::Result<()> {
//! let pipeline = Pipeline::new(ExtractionConfig::new(), PipelineClients::default())?;
//! let doc = my_host::open_pdf("atestado.pdf")?; // implements PageAccess
//! let extraction = pipeline.process(&doc, &HostHooks::none())?;
//! println!("{}", serde_json::to_string_pretty(&extraction)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration and host capabilities
pub mod config;
pub mod host;
pub mod input;

// Data model
pub mod model;

// Text primitives
pub mod text;

// Table recovery
pub mod table;

// Description reconstruction
pub mod reconstruct;

// Filters and deduplication
pub mod dedup;
pub mod filters;

// Quality assessment
pub mod quality;

// Extraction strategies and cascade
pub mod cascade;
pub mod extract;

// End-to-end driver
pub mod pipeline;

pub use config::ExtractionConfig;
pub use error::{Error, Result};
pub use host::HostHooks;
pub use input::{detect_signature, DocumentInput, FileKind};
pub use model::{AttestationExtraction, ItemCode, ServiceItem, ServiceSource};
pub use pipeline::{Pipeline, PipelineClients};

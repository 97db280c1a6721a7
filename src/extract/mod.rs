//! Extraction strategies.
//!
//! Five swappable backends share one contract: [`Extractor`] produces an
//! [`ExtractionResult`] and never raises recoverable errors; failures are
//! folded into the result so the cascade can read them and move on.

pub mod clients;
pub mod cloud_ocr;
pub mod grid_ocr;
pub mod local_ocr;
pub mod native_text;
pub mod text_items;
pub mod vision_ai;

use crate::host::HostHooks;
use crate::model::ServiceItem;
use crate::table::RawTable;

pub use clients::{
    DocAiOutcome, DocumentFields, DocumentIntelligenceClient, OcrEngine, OcrPage, PageAccess,
    TextModelClient, VisionModelClient, VisionOutcome, PAGE_LIMIT_EXCEEDED,
};
pub use cloud_ocr::CloudOcrExtractor;
pub use grid_ocr::GridOcrExtractor;
pub use local_ocr::LocalOcrExtractor;
pub use native_text::NativeTextExtractor;
pub use vision_ai::VisionAiExtractor;

/// Extraction backends, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMethod {
    /// Embedded PDF text layer.
    NativeText,
    /// Local OCR over rasterized pages.
    LocalOcr,
    /// Hosted document-intelligence service.
    CloudOcr,
    /// Morphological grid detection plus per-cell OCR.
    GridOcr,
    /// Multimodal vision model.
    VisionAi,
}

impl ExtractionMethod {
    /// Stable identifier used in audit trails.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::NativeText => "native_text",
            ExtractionMethod::LocalOcr => "local_ocr",
            ExtractionMethod::CloudOcr => "cloud_ocr",
            ExtractionMethod::GridOcr => "grid_ocr",
            ExtractionMethod::VisionAi => "vision_ai",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Recognized/parsed text, with `--- Página N ---` markers.
    pub text: String,
    /// Services produced directly by the strategy (vision only, normally).
    pub servicos: Vec<ServiceItem>,
    /// Structured tables for the recovery layer.
    pub tables: Vec<RawTable>,
    /// Strategy confidence in `[0, 1]`.
    pub confidence: f64,
    /// Which backend ran.
    pub method: Option<ExtractionMethod>,
    /// The attempt produced a usable outcome.
    pub success: bool,
    /// Pages processed.
    pub pages_processed: usize,
    /// Estimated cost in currency units.
    pub cost_estimate: f64,
    /// Errors folded into the result (never raised).
    pub errors: Vec<String>,
}

impl ExtractionResult {
    /// A failed attempt carrying an error message.
    pub fn failure(method: ExtractionMethod, error: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    /// The dedicated cancelled result: prompt, empty, unmistakable.
    pub fn cancelled(method: ExtractionMethod) -> Self {
        Self {
            method: Some(method),
            success: false,
            errors: vec!["cancelled".into()],
            ..Default::default()
        }
    }

    /// Whether the host requested cancellation during this attempt.
    pub fn was_cancelled(&self) -> bool {
        self.errors.iter().any(|e| e == "cancelled")
    }

    /// Whether the text is substantial enough to feed later stages.
    pub fn is_usable(&self) -> bool {
        self.success && self.text.trim().len() > 100 && self.confidence > 0.5
    }
}

/// The shared strategy contract.
pub trait Extractor {
    /// Which backend this is.
    fn method(&self) -> ExtractionMethod;

    /// Whether the backend can run (credentials, engine presence).
    fn is_available(&self) -> bool;

    /// Estimated cost per page in currency units.
    fn cost_per_page(&self) -> f64 {
        0.0
    }

    /// Run the extraction. Must poll cancellation and emit progress at
    /// page granularity.
    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult;
}

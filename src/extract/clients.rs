//! Host-injected capabilities: document access, OCR engines, hosted
//! document intelligence, vision and text models.
//!
//! The core never talks to a rasterizer, an OCR runtime or a model
//! provider directly. The host passes client objects implementing these
//! traits; all of them are expected to be safe to share across documents.

use std::time::Duration;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::ServiceItem;
use crate::table::RawTable;

/// Marker embedded in errors when the hosted document service rejects the
/// document for its page count. The cascade retries in imageless mode.
pub const PAGE_LIMIT_EXCEEDED: &str = "PAGE_LIMIT_EXCEEDED";

/// Access to the document's pages.
pub trait PageAccess: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Embedded text layer of a 0-based page; empty for scanned pages.
    fn native_text(&self, page: usize) -> Result<String>;

    /// Render a 0-based page to an image at the given DPI (PNG bytes).
    fn rasterize(&self, page: usize, dpi: u32) -> Result<Vec<u8>>;

    /// Structured tables found in the text layer, document order.
    fn tables(&self) -> Result<Vec<RawTable>> {
        Ok(Vec::new())
    }

    /// Fraction of a 0-based page's area covered by images.
    fn image_coverage(&self, _page: usize) -> f64 {
        0.0
    }

    /// The document's raw bytes, for clients that take whole files.
    fn raw_bytes(&self) -> Result<Vec<u8>>;
}

/// One OCR-recognized page.
#[derive(Debug, Clone, Default)]
pub struct OcrPage {
    /// Recognized text.
    pub text: String,
    /// Mean recognition confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A local OCR engine.
///
/// Recognition runs synchronously; engines are expected to bound their own
/// per-page runtime (the host configures them with the page budget from
/// [`TimeoutConfig`](crate::config::TimeoutConfig)).
pub trait OcrEngine: Send + Sync {
    /// Whether the engine is ready to run.
    fn is_available(&self) -> bool {
        true
    }

    /// Optional preprocessing (deskew, denoise, contrast). The default
    /// passes the image through.
    fn preprocess(&self, image: &[u8]) -> Result<Vec<u8>> {
        Ok(image.to_vec())
    }

    /// Recognize a page image.
    fn recognize(&self, image: &[u8]) -> Result<OcrPage>;

    /// Morphological grid detection plus per-cell recognition. Engines
    /// without grid support report themselves unavailable for it.
    fn recognize_grid(&self, _image: &[u8]) -> Result<Vec<RawTable>> {
        Err(crate::error::Error::StageFatal {
            stage: "grid_ocr".into(),
            reason: "engine has no grid support".into(),
        })
    }

    /// Whether [`OcrEngine::recognize_grid`] is implemented.
    fn supports_grid(&self) -> bool {
        false
    }
}

/// Output of the hosted document-intelligence service.
#[derive(Debug, Clone, Default)]
pub struct DocAiOutcome {
    /// Full recognized text.
    pub text: String,
    /// Structured tables, document order.
    pub tables: Vec<RawTable>,
    /// Service-reported confidence in `[0, 1]`.
    pub confidence: f64,
    /// Pages the service billed for.
    pub pages: usize,
}

/// Hosted document-intelligence client.
pub trait DocumentIntelligenceClient: Send + Sync {
    /// Whether credentials are configured.
    fn is_configured(&self) -> bool;

    /// Analyze a document. `imageless` requests native-PDF parsing (no
    /// page rendering), the fallback for documents over the page limit.
    /// Errors mentioning [`PAGE_LIMIT_EXCEEDED`] trigger that retry.
    fn analyze(&self, document: &[u8], imageless: bool, timeout: Duration) -> Result<DocAiOutcome>;
}

/// Structured result of a vision-model read.
#[derive(Debug, Clone, Default)]
pub struct VisionOutcome {
    /// Services parsed straight from the model's JSON.
    pub servicos: Vec<ServiceItem>,
    /// Contracting body, when the model found it.
    pub contratante: Option<String>,
    /// Issue date, when the model found it.
    pub data_emissao: Option<NaiveDate>,
    /// Document-level service summary.
    pub descricao_servico: Option<String>,
    /// Free text transcription, when provided.
    pub text: String,
}

/// Multimodal vision-model client.
pub trait VisionModelClient: Send + Sync {
    /// Whether credentials are configured.
    fn is_configured(&self) -> bool;

    /// Read page images and return structured services.
    fn extract_from_pages(&self, pages: &[Vec<u8>], timeout: Duration) -> Result<VisionOutcome>;
}

/// Document-level fields extracted by a text model.
#[derive(Debug, Clone, Default)]
pub struct DocumentFields {
    /// Contracting body.
    pub contratante: Option<String>,
    /// Issue date.
    pub data_emissao: Option<NaiveDate>,
    /// Document-level service summary.
    pub descricao_servico: Option<String>,
    /// Services, when the model chose to return them.
    pub servicos: Vec<ServiceItem>,
}

/// Text-model client for document-level analysis.
pub trait TextModelClient: Send + Sync {
    /// Whether credentials are configured.
    fn is_configured(&self) -> bool;

    /// Analyze the raw text and return structured document fields.
    fn analyze_attestation(&self, texto: &str, timeout: Duration) -> Result<DocumentFields>;
}

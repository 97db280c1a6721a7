//! Vision-model extraction.
//!
//! The most expensive stage, roughly 0.10 per page. The model reads page
//! images and returns structured services directly, so this is the only
//! strategy that bypasses table recovery.

use std::sync::Arc;
use std::time::Duration;

use crate::extract::clients::{PageAccess, VisionModelClient, VisionOutcome};
use crate::extract::{ExtractionMethod, ExtractionResult, Extractor};
use crate::host::HostHooks;
use crate::model::{ServiceItem, ServiceSource};

/// Confidence reported for a successful vision read.
const VISION_CONFIDENCE: f64 = 0.95;
/// Lower render DPI; model token budgets punish large images.
const VISION_DPI: u32 = 200;

/// Vision-model extraction.
pub struct VisionAiExtractor {
    client: Arc<dyn VisionModelClient>,
    timeout: Duration,
}

impl VisionAiExtractor {
    /// Build from an injected client and the per-call timeout.
    pub fn new(client: Arc<dyn VisionModelClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Document fields from the last outcome are folded into the service
    /// list's provenance by the pipeline; expose the raw outcome too.
    pub fn extract_outcome(
        &self,
        doc: &dyn PageAccess,
        hooks: &HostHooks,
    ) -> (ExtractionResult, Option<VisionOutcome>) {
        if !self.is_available() {
            return (
                ExtractionResult::failure(self.method(), "vision model is not configured"),
                None,
            );
        }

        let total_pages = doc.page_count();
        let mut pages: Vec<Vec<u8>> = Vec::with_capacity(total_pages);

        for page in 0..total_pages {
            if hooks.is_cancelled() {
                return (ExtractionResult::cancelled(self.method()), None);
            }
            hooks.progress(
                (page + 1) as u32,
                total_pages as u32,
                self.method().as_str(),
                &format!("renderizando página {}/{}", page + 1, total_pages),
            );
            match doc.rasterize(page, VISION_DPI) {
                Ok(img) => pages.push(img),
                Err(e) => {
                    log::warn!("rasterization failed on page {}: {}", page + 1, e);
                }
            }
        }

        if pages.is_empty() {
            return (
                ExtractionResult::failure(self.method(), "no pages could be rendered"),
                None,
            );
        }

        let outcome = match self.client.extract_from_pages(&pages, self.timeout) {
            Ok(o) => o,
            Err(e) => {
                log::warn!("vision extraction failed: {}", e);
                return (ExtractionResult::failure(self.method(), e.to_string()), None);
            }
        };
        if hooks.is_cancelled() {
            return (ExtractionResult::cancelled(self.method()), None);
        }

        let mut servicos: Vec<ServiceItem> = outcome.servicos.clone();
        for servico in &mut servicos {
            servico.source = ServiceSource::Vision;
        }

        let result = ExtractionResult {
            success: !servicos.is_empty() || !outcome.text.trim().is_empty(),
            text: outcome.text.clone(),
            servicos,
            confidence: VISION_CONFIDENCE,
            method: Some(self.method()),
            pages_processed: pages.len(),
            cost_estimate: pages.len() as f64 * self.cost_per_page(),
            ..Default::default()
        };
        (result, Some(outcome))
    }
}

impl Extractor for VisionAiExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::VisionAi
    }

    fn is_available(&self) -> bool {
        self.client.is_configured()
    }

    fn cost_per_page(&self) -> f64 {
        0.10
    }

    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult {
        self.extract_outcome(doc, hooks).0
    }
}

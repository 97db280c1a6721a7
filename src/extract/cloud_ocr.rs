//! Hosted document-intelligence extraction.
//!
//! High recognition quality with structured tables, at roughly 0.01 per
//! page. Documents over the service's page limit are retried in imageless
//! (native PDF parsing) mode by the cascade runner.

use std::sync::Arc;
use std::time::Duration;

use crate::extract::clients::{DocumentIntelligenceClient, PageAccess};
use crate::extract::{ExtractionMethod, ExtractionResult, Extractor};
use crate::host::HostHooks;

/// Document-intelligence extraction.
pub struct CloudOcrExtractor {
    client: Arc<dyn DocumentIntelligenceClient>,
    timeout: Duration,
}

impl CloudOcrExtractor {
    /// Build from an injected client and the per-call timeout.
    pub fn new(client: Arc<dyn DocumentIntelligenceClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Run the analysis, optionally in imageless mode.
    pub fn extract_with_mode(
        &self,
        doc: &dyn PageAccess,
        hooks: &HostHooks,
        imageless: bool,
    ) -> ExtractionResult {
        if !self.is_available() {
            return ExtractionResult::failure(
                self.method(),
                "document-intelligence service is not configured",
            );
        }
        if hooks.is_cancelled() {
            return ExtractionResult::cancelled(self.method());
        }

        hooks.progress(1, 3, self.method().as_str(), "enviando documento");

        let bytes = match doc.raw_bytes() {
            Ok(b) => b,
            Err(e) => return ExtractionResult::failure(self.method(), e.to_string()),
        };

        let outcome = match self.client.analyze(&bytes, imageless, self.timeout) {
            Ok(o) => o,
            Err(e) => {
                log::warn!("document-intelligence analysis failed: {}", e);
                return ExtractionResult::failure(self.method(), e.to_string());
            }
        };

        if hooks.is_cancelled() {
            return ExtractionResult::cancelled(self.method());
        }
        hooks.progress(3, 3, self.method().as_str(), "processamento concluído");

        let pages = if outcome.pages > 0 {
            outcome.pages
        } else {
            doc.page_count().max(1)
        };

        ExtractionResult {
            success: true,
            text: outcome.text,
            tables: outcome.tables,
            confidence: outcome.confidence,
            method: Some(self.method()),
            pages_processed: pages,
            cost_estimate: pages as f64 * self.cost_per_page(),
            ..Default::default()
        }
    }
}

impl Extractor for CloudOcrExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::CloudOcr
    }

    fn is_available(&self) -> bool {
        self.client.is_configured()
    }

    fn cost_per_page(&self) -> f64 {
        0.01
    }

    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult {
        self.extract_with_mode(doc, hooks, false)
    }
}

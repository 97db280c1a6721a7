//! Local OCR over rasterized pages.
//!
//! Free but slow. Pages are rendered at the configured DPI, optionally
//! preprocessed by the engine, and recognized one by one; a poor first
//! pass is retried at the higher retry DPI.

use std::sync::Arc;

use crate::config::OcrConfig;
use crate::extract::clients::{OcrEngine, PageAccess};
use crate::extract::{ExtractionMethod, ExtractionResult, Extractor};
use crate::host::HostHooks;

/// OCR extraction with DPI retry.
pub struct LocalOcrExtractor {
    engine: Arc<dyn OcrEngine>,
    config: OcrConfig,
    preprocessing: bool,
}

impl LocalOcrExtractor {
    /// Build from an injected engine and the OCR settings.
    pub fn new(engine: Arc<dyn OcrEngine>, config: &OcrConfig) -> Self {
        Self {
            engine,
            config: config.clone(),
            preprocessing: true,
        }
    }

    /// Disable image preprocessing.
    pub fn without_preprocessing(mut self) -> Self {
        self.preprocessing = false;
        self
    }

    fn run_pass(
        &self,
        doc: &dyn PageAccess,
        hooks: &HostHooks,
        dpi: u32,
        stage: &str,
    ) -> ExtractionResult {
        let total_pages = doc.page_count();
        let mut parts: Vec<String> = Vec::new();
        let mut confidence_sum = 0.0;
        let mut pages_with_text = 0usize;

        for page in 0..total_pages {
            if hooks.is_cancelled() {
                return ExtractionResult::cancelled(self.method());
            }
            hooks.progress(
                (page + 1) as u32,
                total_pages as u32,
                stage,
                &format!("OCR página {}/{} ({} dpi)", page + 1, total_pages, dpi),
            );

            let image = match doc.rasterize(page, dpi) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("rasterization failed on page {}: {}", page + 1, e);
                    continue;
                }
            };
            let image = if self.preprocessing {
                match self.engine.preprocess(&image) {
                    Ok(processed) => processed,
                    Err(e) => {
                        log::warn!("preprocessing failed on page {}: {}", page + 1, e);
                        image
                    }
                }
            } else {
                image
            };

            match self.engine.recognize(&image) {
                Ok(ocr_page) => {
                    if !ocr_page.text.trim().is_empty() {
                        parts.push(format!("--- Página {} ---\n{}", page + 1, ocr_page.text));
                        confidence_sum += ocr_page.confidence;
                        pages_with_text += 1;
                    }
                }
                Err(e) => {
                    log::warn!("OCR failed on page {}: {}", page + 1, e);
                }
            }
        }

        let text = parts.join("\n\n");
        let confidence = if pages_with_text > 0 {
            confidence_sum / pages_with_text as f64
        } else {
            0.0
        };
        let success = text.trim().len() > self.config.min_text_length;

        ExtractionResult {
            success,
            text,
            confidence,
            method: Some(self.method()),
            pages_processed: total_pages,
            ..Default::default()
        }
    }
}

impl Extractor for LocalOcrExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::LocalOcr
    }

    fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult {
        let first = self.run_pass(doc, hooks, self.config.dpi, self.method().as_str());
        if first.was_cancelled() {
            return first;
        }

        let words = first.text.split_whitespace().count();
        if words >= self.config.retry_min_words || self.config.retry_dpi <= self.config.dpi {
            return first;
        }

        log::info!(
            "OCR pass at {} dpi produced only {} words, retrying at {} dpi",
            self.config.dpi,
            words,
            self.config.retry_dpi
        );
        // The retry reports under its own stage label so progress stays
        // monotonic within each stage.
        let retry = self.run_pass(doc, hooks, self.config.retry_dpi, "local_ocr_retry");
        if retry.was_cancelled() {
            return retry;
        }

        let retry_words = retry.text.split_whitespace().count();
        let mut best = if retry_words > words { retry } else { first };

        // Aggressive pass, disabled by default (retry_dpi_hard = 0).
        let best_words = best.text.split_whitespace().count();
        if best_words < self.config.retry_min_words
            && self.config.retry_dpi_hard > self.config.retry_dpi
        {
            let hard = self.run_pass(doc, hooks, self.config.retry_dpi_hard, "local_ocr_retry_hard");
            if hard.was_cancelled() {
                return hard;
            }
            if hard.text.split_whitespace().count() > best_words {
                best = hard;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::extract::clients::OcrPage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDoc {
        pages: usize,
    }

    impl PageAccess for FakeDoc {
        fn page_count(&self) -> usize {
            self.pages
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok(String::new())
        }
        fn rasterize(&self, page: usize, dpi: u32) -> Result<Vec<u8>> {
            Ok(format!("page-{}-dpi-{}", page, dpi).into_bytes())
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Engine whose output quality depends on the requested DPI.
    struct DpiSensitiveEngine {
        calls: AtomicUsize,
    }

    impl OcrEngine for DpiSensitiveEngine {
        fn recognize(&self, image: &[u8]) -> Result<OcrPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let request = String::from_utf8_lossy(image);
            let text = if request.contains("dpi-450") {
                "1.1 Alvenaria de vedação com blocos cerâmicos furados M2 416,65 \
                 e mais uma longa linha de texto reconhecido pelo retry em alta resolução"
                    .to_string()
            } else {
                "pouco texto".to_string()
            };
            Ok(OcrPage {
                text,
                confidence: 0.8,
            })
        }
    }

    #[test]
    fn test_retry_at_higher_dpi() {
        let engine = Arc::new(DpiSensitiveEngine {
            calls: AtomicUsize::new(0),
        });
        let extractor = LocalOcrExtractor::new(engine.clone(), &OcrConfig::default());
        let result = extractor.extract(&FakeDoc { pages: 1 }, &HostHooks::none());
        // Base pass was poor, the retry at 450 dpi won.
        assert!(result.text.contains("alta resolução"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(result.success);
    }

    #[test]
    fn test_no_retry_when_first_pass_rich() {
        struct RichEngine;
        impl OcrEngine for RichEngine {
            fn recognize(&self, _image: &[u8]) -> Result<OcrPage> {
                Ok(OcrPage {
                    text: "palavra ".repeat(200),
                    confidence: 0.9,
                })
            }
        }
        let extractor = LocalOcrExtractor::new(Arc::new(RichEngine), &OcrConfig::default());
        let result = extractor.extract(&FakeDoc { pages: 2 }, &HostHooks::none());
        assert!(result.success);
        assert_eq!(result.pages_processed, 2);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }
}

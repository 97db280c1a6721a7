//! Native text-layer extraction.
//!
//! The fastest and cheapest source: PDFs with an embedded text layer.
//! Fails cleanly on scanned documents (too little text) and on text-layer
//! artifacts (glyph soup), so the cascade can escalate.

use crate::extract::clients::PageAccess;
use crate::extract::{ExtractionMethod, ExtractionResult, Extractor};
use crate::host::HostHooks;
use crate::text::corruption::is_garbage_text;

/// Extracts the embedded text layer page by page.
#[derive(Debug, Clone)]
pub struct NativeTextExtractor {
    min_text_length: usize,
}

impl NativeTextExtractor {
    /// Build with the minimum usable text length.
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }
}

impl Default for NativeTextExtractor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Extractor for NativeTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::NativeText
    }

    /// The text layer needs no external service.
    fn is_available(&self) -> bool {
        true
    }

    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult {
        let total_pages = doc.page_count();
        let mut parts: Vec<String> = Vec::new();
        let mut pages_with_text = 0usize;

        for page in 0..total_pages {
            if hooks.is_cancelled() {
                return ExtractionResult::cancelled(self.method());
            }
            hooks.progress(
                (page + 1) as u32,
                total_pages as u32,
                self.method().as_str(),
                &format!("extraindo texto da página {}/{}", page + 1, total_pages),
            );

            let page_text = match doc.native_text(page) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("native text failed on page {}: {}", page + 1, e);
                    continue;
                }
            };
            if !page_text.trim().is_empty() {
                parts.push(format!("--- Página {} ---\n{}", page + 1, page_text));
                pages_with_text += 1;
            }
        }

        let text = parts.join("\n\n");
        let tables = doc.tables().unwrap_or_default();

        if text.len() < self.min_text_length {
            return ExtractionResult {
                text,
                tables,
                confidence: 0.2,
                method: Some(self.method()),
                success: false,
                pages_processed: total_pages,
                errors: vec!["texto extraído muito curto".into()],
                ..Default::default()
            };
        }

        if is_garbage_text(&text) {
            return ExtractionResult {
                text,
                tables,
                confidence: 0.1,
                method: Some(self.method()),
                success: false,
                pages_processed: total_pages,
                errors: vec!["texto extraído parece ser ruído".into()],
                ..Default::default()
            };
        }

        let confidence = if total_pages > 0 {
            pages_with_text as f64 / total_pages as f64
        } else {
            0.0
        };

        ExtractionResult {
            text,
            tables,
            confidence,
            method: Some(self.method()),
            success: true,
            pages_processed: total_pages,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeDoc {
        pages: Vec<String>,
    }

    impl PageAccess for FakeDoc {
        fn page_count(&self) -> usize {
            self.pages.len()
        }
        fn native_text(&self, page: usize) -> Result<String> {
            Ok(self.pages[page].clone())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            unimplemented!("not rasterized in this test")
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn long_page() -> String {
        "1.1 Alvenaria de vedação com blocos cerâmicos furados M2 416,65\n\
         1.2 Pintura látex acrílica sobre massa corrida M2 502,18\n\
         2.1 Escavação mecânica de valas em solo de primeira categoria M3 88,00"
            .to_string()
    }

    #[test]
    fn test_success_with_page_markers() {
        let doc = FakeDoc {
            pages: vec![long_page(), long_page()],
        };
        let result = NativeTextExtractor::default().extract(&doc, &HostHooks::none());
        assert!(result.success);
        assert_eq!(result.pages_processed, 2);
        assert!(result.text.contains("--- Página 1 ---"));
        assert!(result.text.contains("--- Página 2 ---"));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_short_text_fails_low_confidence() {
        let doc = FakeDoc {
            pages: vec!["abc".into()],
        };
        let result = NativeTextExtractor::default().extract(&doc, &HostHooks::none());
        assert!(!result.success);
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn test_garbage_text_rejected() {
        let doc = FakeDoc {
            pages: vec!["0101 1010 0011 1100 ".repeat(12)],
        };
        let result = NativeTextExtractor::default().extract(&doc, &HostHooks::none());
        assert!(!result.success);
        assert_eq!(result.confidence, 0.1);
    }

    #[test]
    fn test_cancellation_returns_promptly() {
        let flag = Arc::new(AtomicBool::new(true));
        let flag_clone = flag.clone();
        let hooks = HostHooks::none().with_cancel(move || flag_clone.load(Ordering::SeqCst));
        let doc = FakeDoc {
            pages: vec![long_page()],
        };
        let result = NativeTextExtractor::default().extract(&doc, &hooks);
        assert!(result.was_cancelled());
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_progress_per_page() {
        use std::sync::atomic::AtomicU32;
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let hooks = HostHooks::none().with_progress(move |_, _, _, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let doc = FakeDoc {
            pages: vec![long_page(), long_page(), long_page()],
        };
        NativeTextExtractor::default().extract(&doc, &hooks);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

//! Grid OCR: morphological table detection plus per-cell recognition.
//!
//! Last free resort for image-heavy pages where layout OCR lost the table
//! structure: line segments are detected, intersected into a grid, and
//! every cell is recognized on its own.

use std::sync::Arc;

use crate::config::OcrConfig;
use crate::extract::clients::{OcrEngine, PageAccess};
use crate::extract::{ExtractionMethod, ExtractionResult, Extractor};
use crate::host::HostHooks;
use crate::table::RawTable;

/// Per-cell OCR over a detected grid.
pub struct GridOcrExtractor {
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
}

impl GridOcrExtractor {
    /// Build from an injected engine with grid support.
    pub fn new(engine: Arc<dyn OcrEngine>, config: &OcrConfig) -> Self {
        Self {
            engine,
            dpi: config.dpi,
        }
    }
}

impl Extractor for GridOcrExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::GridOcr
    }

    fn is_available(&self) -> bool {
        self.engine.is_available() && self.engine.supports_grid()
    }

    fn extract(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> ExtractionResult {
        if !self.is_available() {
            return ExtractionResult::failure(self.method(), "no grid-capable OCR engine");
        }

        let total_pages = doc.page_count();
        let mut tables: Vec<RawTable> = Vec::new();

        for page in 0..total_pages {
            if hooks.is_cancelled() {
                return ExtractionResult::cancelled(self.method());
            }
            hooks.progress(
                (page + 1) as u32,
                total_pages as u32,
                self.method().as_str(),
                &format!("grade OCR página {}/{}", page + 1, total_pages),
            );

            let image = match doc.rasterize(page, self.dpi) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("rasterization failed on page {}: {}", page + 1, e);
                    continue;
                }
            };

            match self.engine.recognize_grid(&image) {
                Ok(mut page_tables) => {
                    for table in &mut page_tables {
                        table.page = Some((page + 1) as u32);
                    }
                    tables.extend(page_tables);
                }
                Err(e) => {
                    log::warn!("grid detection failed on page {}: {}", page + 1, e);
                }
            }
        }

        let cells: usize = tables
            .iter()
            .map(|t| t.rows.iter().map(|r| r.len()).sum::<usize>())
            .sum();
        let text: String = tables
            .iter()
            .flat_map(|t| t.rows.iter())
            .map(|r| r.join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        ExtractionResult {
            success: !tables.is_empty() && cells >= 8,
            text,
            tables,
            confidence: 0.5,
            method: Some(self.method()),
            pages_processed: total_pages,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::extract::clients::OcrPage;

    struct FakeDoc;
    impl PageAccess for FakeDoc {
        fn page_count(&self) -> usize {
            1
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok(String::new())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(vec![0u8; 16])
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    struct GridEngine;
    impl OcrEngine for GridEngine {
        fn recognize(&self, _image: &[u8]) -> Result<OcrPage> {
            Ok(OcrPage::default())
        }
        fn supports_grid(&self) -> bool {
            true
        }
        fn recognize_grid(&self, _image: &[u8]) -> Result<Vec<RawTable>> {
            Ok(vec![RawTable {
                rows: vec![
                    vec!["ITEM".into(), "DESCRIÇÃO".into(), "UNID".into(), "QTD".into()],
                    vec!["1.1".into(), "Alvenaria".into(), "M2".into(), "416,65".into()],
                    vec!["1.2".into(), "Pintura".into(), "M2".into(), "502,18".into()],
                ],
                page: None,
            }])
        }
    }

    struct GridlessEngine;
    impl OcrEngine for GridlessEngine {
        fn recognize(&self, _image: &[u8]) -> Result<OcrPage> {
            Ok(OcrPage::default())
        }
    }

    #[test]
    fn test_grid_tables_tagged_with_page() {
        let extractor = GridOcrExtractor::new(Arc::new(GridEngine), &OcrConfig::default());
        let result = extractor.extract(&FakeDoc, &HostHooks::none());
        assert!(result.success);
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].page, Some(1));
        assert!(result.text.contains("Alvenaria"));
    }

    #[test]
    fn test_gridless_engine_unavailable() {
        let extractor = GridOcrExtractor::new(Arc::new(GridlessEngine), &OcrConfig::default());
        assert!(!extractor.is_available());
        let result = extractor.extract(&FakeDoc, &HostHooks::none());
        assert!(!result.success);
    }
}

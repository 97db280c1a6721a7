//! Configuration for the extraction pipeline.
//!
//! One validated, immutable record passed into the [`Pipeline`] constructor.
//! Caller-supplied values always win over the defaults listed here; the core
//! performs no environment lookups.
//!
//! [`Pipeline`]: crate::pipeline::Pipeline

use std::time::Duration;

use crate::error::{Error, Result};

/// OCR rasterization and retry settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Base DPI for page rasterization.
    pub dpi: u32,
    /// Higher DPI used when the first pass produces a poor result.
    pub retry_dpi: u32,
    /// Aggressive retry DPI; 0 disables the hard retry.
    pub retry_dpi_hard: u32,
    /// Minimum words for a page result to count as usable.
    pub retry_min_words: usize,
    /// Minimum parsed items before a retry is skipped.
    pub retry_min_items: usize,
    /// Minimum quantity ratio before a retry is skipped.
    pub retry_min_qty_ratio: f64,
    /// Minimum total text length for any OCR extraction to succeed.
    pub min_text_length: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            retry_dpi: 450,
            retry_dpi_hard: 0,
            retry_min_words: 120,
            retry_min_items: 5,
            retry_min_qty_ratio: 0.35,
            min_text_length: 100,
        }
    }
}

/// Quantity-ratio thresholds that gate cascade progression.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// Ratio needed to accept the native-text stage.
    pub stage1_qty_threshold: f64,
    /// Ratio needed to accept the cloud-OCR stage.
    pub stage2_qty_threshold: f64,
    /// Ratio needed to accept the vision stage.
    pub stage3_qty_threshold: f64,
    /// Minimum items for a stage result to carry confidence at all.
    pub min_items_for_confidence: usize,
    /// Master switch for cost-bearing stages (cloud OCR, vision).
    pub paid_services_enabled: bool,
    /// Run cloud OCR only after the free stages have failed.
    pub cloud_ocr_fallback_only: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            stage1_qty_threshold: 0.70,
            stage2_qty_threshold: 0.60,
            stage3_qty_threshold: 0.40,
            min_items_for_confidence: 25,
            paid_services_enabled: true,
            cloud_ocr_fallback_only: false,
        }
    }
}

/// Table-recovery thresholds.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Minimum confidence to accept a recovered table.
    pub confidence_threshold: f64,
    /// Rows scanned when looking for a header.
    pub header_rows_limit: usize,
    /// Header keyword matches required for a row to qualify.
    pub header_min_keywords: usize,
    /// Minimum unit ratio for a column to keep the unit role.
    pub min_unit_ratio: f64,
    /// Minimum numeric ratio for a column to keep the quantity role.
    pub min_qty_ratio: f64,
    /// Minimum average length for a description column.
    pub min_desc_len: f64,
    /// Maximum numeric ratio tolerated in a description column.
    pub max_desc_numeric: f64,
    /// Minimum score for content-based item-column detection.
    pub item_col_min_score: f64,
    /// Rightmost column index still eligible as an item column.
    pub item_col_max_index: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            header_rows_limit: 5,
            header_min_keywords: 2,
            min_unit_ratio: 0.2,
            min_qty_ratio: 0.35,
            min_desc_len: 10.0,
            max_desc_numeric: 0.6,
            item_col_min_score: 0.5,
            item_col_max_index: 2,
        }
    }
}

/// Deduplication and item-filter thresholds.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Jaccard threshold for near-duplicate descriptions.
    pub similarity_threshold: f64,
    /// Normalized-description prefix length used as a dedupe key.
    pub max_desc_chars: usize,
    /// Dominant code-depth ratio that activates the item-length filter.
    pub item_length_ratio: f64,
    /// Minimum description length for keeping an off-depth item.
    pub item_length_keep_min_desc: usize,
    /// Dominant first-component ratio that activates the prefix filter.
    pub item_prefix_ratio: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            max_desc_chars: 50,
            item_length_ratio: 0.6,
            item_length_keep_min_desc: 20,
            item_prefix_ratio: 0.7,
        }
    }
}

/// Restart-segment detection thresholds (`Sk-` prefixes).
#[derive(Debug, Clone)]
pub struct RestartConfig {
    /// Minimum repeated codes before restart detection applies.
    pub min_codes: usize,
    /// Minimum overlapping codes between segments.
    pub min_overlap: usize,
    /// Ratio of repeated codes needed to confirm a restart.
    pub min_overlap_ratio: f64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            min_codes: 8,
            min_overlap: 2,
            min_overlap_ratio: 0.25,
        }
    }
}

/// Thresholds for the OCR-noise detector.
///
/// A service list is noisy when at least `min_failures` of the five checks
/// fail.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Minimum ratio of items carrying a unit.
    pub min_unit_ratio: f64,
    /// Minimum ratio of items carrying a quantity.
    pub min_qty_ratio: f64,
    /// Minimum average description length.
    pub min_avg_desc_len: f64,
    /// Maximum ratio of short descriptions.
    pub max_short_desc_ratio: f64,
    /// Length below which a description counts as short.
    pub short_desc_len: usize,
    /// Minimum ratio of alphabetic to alphanumeric characters.
    pub min_alpha_ratio: f64,
    /// Failing checks needed to flag the list as noisy.
    pub min_failures: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            min_unit_ratio: 0.5,
            min_qty_ratio: 0.35,
            min_avg_desc_len: 14.0,
            max_short_desc_ratio: 0.45,
            short_desc_len: 12,
            min_alpha_ratio: 0.45,
            min_failures: 2,
        }
    }
}

/// Scanned-document detection thresholds.
#[derive(Debug, Clone)]
pub struct ScannedConfig {
    /// Pages with fewer characters than this are treated as scanned.
    pub min_chars_per_page: usize,
    /// Ratio of image-dominant pages that classifies the document as scanned.
    pub image_page_ratio: f64,
    /// Page-area coverage for an image to count as dominant.
    pub dominant_image_ratio: f64,
    /// Image-dominant pages needed to unlock the vision stage.
    pub dominant_image_min_pages: usize,
}

impl Default for ScannedConfig {
    fn default() -> Self {
        Self {
            min_chars_per_page: 200,
            image_page_ratio: 0.5,
            dominant_image_ratio: 0.6,
            dominant_image_min_pages: 2,
        }
    }
}

/// Text-section enrichment thresholds.
#[derive(Debug, Clone)]
pub struct TextSectionConfig {
    /// Maximum description length harvested from raw text.
    pub max_desc_len: usize,
    /// Table confidence above which text enrichment is skipped.
    pub table_confidence_min: f64,
    /// Quantity ratio above which text enrichment is skipped.
    pub qty_ratio_min: f64,
    /// Duplicate ratio above which text enrichment is forced on.
    pub dup_ratio_max: f64,
}

impl Default for TextSectionConfig {
    fn default() -> Self {
        Self {
            max_desc_len: 500,
            table_confidence_min: 0.85,
            qty_ratio_min: 0.90,
            dup_ratio_max: 0.35,
        }
    }
}

/// Timeouts applied by the runner and forwarded to external clients.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Budget for a single page.
    pub page: Duration,
    /// Budget for the whole document; exceeding it is fatal.
    pub document: Duration,
    /// Shorter budget used on retries.
    pub retry: Duration,
    /// Budget for a table-extraction pass.
    pub table_extraction: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page: Duration::from_secs(60),
            document: Duration::from_secs(600),
            retry: Duration::from_secs(30),
            table_extraction: Duration::from_secs(120),
        }
    }
}

/// Top-level extraction configuration.
///
/// Construct with [`ExtractionConfig::new`] and the `with_*` builders, then
/// pass to the pipeline. The record is validated once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    /// OCR rasterization settings.
    pub ocr: OcrConfig,
    /// Cascade gating thresholds.
    pub cascade: CascadeConfig,
    /// Table-recovery thresholds.
    pub table: TableConfig,
    /// Deduplication thresholds.
    pub dedup: DedupConfig,
    /// Restart-segment thresholds.
    pub restart: RestartConfig,
    /// OCR-noise thresholds.
    pub noise: NoiseConfig,
    /// Scanned-document thresholds.
    pub scanned: ScannedConfig,
    /// Text-section enrichment thresholds.
    pub text_section: TextSectionConfig,
    /// Timeout budgets.
    pub timeouts: TimeoutConfig,
}

impl ExtractionConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base OCR DPI.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.ocr.dpi = dpi;
        self
    }

    /// Set the retry OCR DPI.
    pub fn with_retry_dpi(mut self, dpi: u32) -> Self {
        self.ocr.retry_dpi = dpi;
        self
    }

    /// Set the three cascade quantity thresholds at once.
    pub fn with_cascade_thresholds(mut self, s1: f64, s2: f64, s3: f64) -> Self {
        self.cascade.stage1_qty_threshold = s1;
        self.cascade.stage2_qty_threshold = s2;
        self.cascade.stage3_qty_threshold = s3;
        self
    }

    /// Set the table confidence threshold.
    pub fn with_table_confidence(mut self, threshold: f64) -> Self {
        self.table.confidence_threshold = threshold;
        self
    }

    /// Set the dedupe similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.dedup.similarity_threshold = threshold;
        self
    }

    /// Set the restart overlap ratio.
    pub fn with_restart_overlap_ratio(mut self, ratio: f64) -> Self {
        self.restart.min_overlap_ratio = ratio;
        self
    }

    /// Enable or disable cost-bearing stages.
    pub fn with_paid_services(mut self, enabled: bool) -> Self {
        self.cascade.paid_services_enabled = enabled;
        self
    }

    /// Validate threshold ranges. Called by the pipeline constructor.
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("cascade.stage1_qty_threshold", self.cascade.stage1_qty_threshold),
            ("cascade.stage2_qty_threshold", self.cascade.stage2_qty_threshold),
            ("cascade.stage3_qty_threshold", self.cascade.stage3_qty_threshold),
            ("table.confidence_threshold", self.table.confidence_threshold),
            ("dedup.similarity_threshold", self.dedup.similarity_threshold),
            ("restart.min_overlap_ratio", self.restart.min_overlap_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.ocr.dpi == 0 {
            return Err(Error::InvalidInput("ocr.dpi must be positive".into()));
        }
        Ok(())
    }
}

//! The extraction cascade: cheap sources first, expensive ones only when
//! quality demands it.
//!
//! A state machine over {QualityCheck, NativeText, CloudOcr, LocalOcr,
//! GridOcr, VisionAi, Done, Failed}. Each state either runs its strategy
//! (honoring cancellation and progress) or skips based on the gating
//! rules; the first stage whose quantity ratio clears its threshold wins.

use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::dedup::merge_prefer_primary;
use crate::extract::clients::{
    DocumentIntelligenceClient, OcrEngine, PageAccess, VisionModelClient, PAGE_LIMIT_EXCEEDED,
};
use crate::extract::text_items::harvest_text_items;
use crate::extract::{
    CloudOcrExtractor, ExtractionResult, Extractor, GridOcrExtractor, LocalOcrExtractor,
    NativeTextExtractor, VisionAiExtractor,
};
use crate::host::HostHooks;
use crate::model::{ServiceItem, ServiceSource};
use crate::quality;
use crate::table::TableRecovery;

/// Cascade states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    QualityCheck,
    NativeText,
    CloudOcr,
    LocalOcr,
    GridOcr,
    CloudOcrFallback,
    VisionAi,
    Done,
    Failed,
}

/// Final cascade outcome, before pipeline post-processing.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    /// Services from the accepted (or best partial) stage.
    pub servicos: Vec<ServiceItem>,
    /// Raw text from the accepted stage chain.
    pub text: String,
    /// Confidence of the chosen result.
    pub confidence: f64,
    /// Quantity ratio of the chosen result.
    pub qty_ratio: f64,
    /// Identifier of the accepted source.
    pub pipeline_used: String,
    /// Every stage that actually executed, in order.
    pub stages_executed: Vec<String>,
    /// Accumulated cost of paid stages.
    pub cost_estimate: f64,
    /// A stage met its threshold, or the best partial cleared 0.5.
    pub success: bool,
    /// The host cancelled mid-run; no partial result survives.
    pub cancelled: bool,
}

struct Partial {
    servicos: Vec<ServiceItem>,
    text: String,
    qty_ratio: f64,
    confidence: f64,
    source: String,
}

/// Injected model/OCR clients for the cascade.
#[derive(Default, Clone)]
pub struct CascadeClients {
    /// Local OCR engine (layout and optionally grid).
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,
    /// Hosted document-intelligence client.
    pub doc_ai: Option<Arc<dyn DocumentIntelligenceClient>>,
    /// Vision-model client.
    pub vision: Option<Arc<dyn VisionModelClient>>,
}

/// Runs the extraction cascade over one document.
pub struct CascadeRunner {
    config: ExtractionConfig,
    clients: CascadeClients,
}

impl CascadeRunner {
    /// Build a runner from configuration and injected clients.
    pub fn new(config: ExtractionConfig, clients: CascadeClients) -> Self {
        Self { config, clients }
    }

    /// Run the cascade.
    pub fn run(&self, doc: &dyn PageAccess, hooks: &HostHooks) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();
        let mut state = State::QualityCheck;

        let recovery = TableRecovery::new(&self.config.table, &self.config.cascade);

        let mut is_scanned = false;
        let mut large_images = 0usize;
        let mut text_useful = false;
        let mut accumulated_text = String::new();
        let mut pdf_servicos: Vec<ServiceItem> = Vec::new();
        let mut best: Option<Partial> = None;
        let mut best_ocr_count = 0usize;
        let mut grid_low_quality = false;

        let paid = self.config.cascade.paid_services_enabled;
        let fallback_only = self.config.cascade.cloud_ocr_fallback_only;
        let started = std::time::Instant::now();

        macro_rules! check_cancel {
            ($result:expr) => {
                if $result.was_cancelled() {
                    outcome.cancelled = true;
                    outcome.success = false;
                    outcome.servicos.clear();
                    outcome.text.clear();
                    return outcome;
                }
            };
        }

        loop {
            // The per-document budget is fatal: no further stages run.
            if started.elapsed() > self.config.timeouts.document
                && !matches!(state, State::Done | State::Failed)
            {
                log::warn!(
                    "document budget of {:?} exhausted, stopping the cascade",
                    self.config.timeouts.document
                );
                state = State::Failed;
            }

            match state {
                State::QualityCheck => {
                    let total = doc.page_count();
                    if total == 0 {
                        state = State::Failed;
                        continue;
                    }
                    let mut sparse_pages = 0usize;
                    for page in 0..total {
                        let chars = doc.native_text(page).map(|t| t.len()).unwrap_or(0);
                        if chars < self.config.scanned.min_chars_per_page {
                            sparse_pages += 1;
                        }
                        if doc.image_coverage(page) >= self.config.scanned.dominant_image_ratio {
                            large_images += 1;
                        }
                    }
                    is_scanned =
                        sparse_pages as f64 / total as f64 >= self.config.scanned.image_page_ratio;
                    log::debug!(
                        "quality check: {} pages, scanned={}, image-dominant={}",
                        total,
                        is_scanned,
                        large_images
                    );
                    state = State::NativeText;
                }

                State::NativeText => {
                    if is_scanned {
                        log::debug!("cascade: skipping native text (scanned document)");
                        state = State::CloudOcr;
                        continue;
                    }
                    let extractor = NativeTextExtractor::new(self.config.ocr.min_text_length);
                    let result = extractor.extract(doc, hooks);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));
                    text_useful = result.is_usable();
                    if !result.text.is_empty() {
                        accumulated_text = result.text.clone();
                    }

                    if result.success {
                        let table_outcome = recovery.recover(&result.tables);
                        pdf_servicos = table_outcome.servicos;
                        let qty_ratio = quality::qty_ratio(&pdf_servicos);
                        update_best(
                            &mut best,
                            &pdf_servicos,
                            &accumulated_text,
                            qty_ratio,
                            table_outcome.confidence,
                            "native_text",
                        );
                        if !pdf_servicos.is_empty()
                            && qty_ratio >= self.config.cascade.stage1_qty_threshold
                            && table_outcome.confidence >= self.config.table.confidence_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    }
                    state = State::CloudOcr;
                }

                State::CloudOcr => {
                    let client = match (&self.clients.doc_ai, paid, fallback_only) {
                        (Some(c), true, false) if c.is_configured() => c.clone(),
                        _ => {
                            state = State::LocalOcr;
                            continue;
                        }
                    };
                    let extractor =
                        CloudOcrExtractor::new(client, self.config.timeouts.table_extraction);
                    let result = self.run_cloud(&extractor, doc, hooks, text_useful);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));
                    outcome.cost_estimate += result.cost_estimate;

                    if result.success {
                        if !result.text.is_empty() {
                            accumulated_text = result.text.clone();
                        }
                        let table_outcome = recovery.recover(&result.tables);
                        let mut servicos = table_outcome.servicos;
                        for s in &mut servicos {
                            s.source = ServiceSource::DocAi;
                        }
                        let servicos = self.merge_with_pdf(servicos, &pdf_servicos);
                        let qty_ratio = quality::qty_ratio(&servicos);
                        update_best(
                            &mut best,
                            &servicos,
                            &accumulated_text,
                            qty_ratio,
                            table_outcome.confidence.max(result.confidence),
                            "cloud_ocr",
                        );
                        if !servicos.is_empty()
                            && qty_ratio >= self.config.cascade.stage2_qty_threshold
                            && table_outcome.confidence.max(result.confidence)
                                >= self.config.table.confidence_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    }
                    state = State::LocalOcr;
                }

                State::LocalOcr => {
                    let prior_low = best
                        .as_ref()
                        .map(|b| b.qty_ratio < self.config.cascade.stage2_qty_threshold)
                        .unwrap_or(true);
                    let should_run = (is_scanned || large_images > 0)
                        && pdf_servicos.is_empty()
                        && prior_low;
                    let engine = match (&self.clients.ocr_engine, should_run) {
                        (Some(e), true) if e.is_available() => e.clone(),
                        _ => {
                            state = State::GridOcr;
                            continue;
                        }
                    };
                    let extractor = LocalOcrExtractor::new(engine, &self.config.ocr);
                    let result = extractor.extract(doc, hooks);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));

                    if result.success {
                        if accumulated_text.is_empty() {
                            accumulated_text = result.text.clone();
                        }
                        let servicos =
                            harvest_text_items(&result.text, self.config.text_section.max_desc_len);
                        best_ocr_count = servicos.len();
                        let qty_ratio = quality::qty_ratio(&servicos);
                        let noise = quality::is_noisy(&servicos, &self.config.noise);
                        update_best(
                            &mut best,
                            &servicos,
                            &result.text,
                            qty_ratio,
                            result.confidence,
                            "local_ocr",
                        );
                        if !noise.noisy
                            && !servicos.is_empty()
                            && qty_ratio >= self.config.cascade.stage2_qty_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    }
                    state = State::GridOcr;
                }

                State::GridOcr => {
                    let should_run = (is_scanned || large_images > 0)
                        && best_ocr_count < self.config.ocr.retry_min_items;
                    let engine = match (&self.clients.ocr_engine, should_run) {
                        (Some(e), true) if e.supports_grid() => e.clone(),
                        _ => {
                            state = State::CloudOcrFallback;
                            continue;
                        }
                    };
                    let extractor = GridOcrExtractor::new(engine, &self.config.ocr);
                    let result = extractor.extract(doc, hooks);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));

                    if result.success {
                        let table_outcome = recovery.recover(&result.tables);
                        let mut servicos = table_outcome.servicos;
                        for s in &mut servicos {
                            s.source = ServiceSource::GridOcr;
                        }
                        let qty_ratio = quality::qty_ratio(&servicos);
                        let noise = quality::is_noisy(&servicos, &self.config.noise);
                        grid_low_quality = noise.noisy
                            || servicos.len() < self.config.ocr.retry_min_items;
                        update_best(
                            &mut best,
                            &servicos,
                            &accumulated_text,
                            qty_ratio,
                            table_outcome.confidence,
                            "grid_ocr",
                        );
                        if !grid_low_quality
                            && qty_ratio >= self.config.cascade.stage2_qty_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    } else {
                        grid_low_quality = true;
                    }
                    state = State::CloudOcrFallback;
                }

                State::CloudOcrFallback => {
                    let few_items = best
                        .as_ref()
                        .map(|b| b.servicos.len() < self.config.ocr.retry_min_items)
                        .unwrap_or(true);
                    let should_run = fallback_only && (grid_low_quality || few_items);
                    let client = match (&self.clients.doc_ai, paid, should_run) {
                        (Some(c), true, true) if c.is_configured() => c.clone(),
                        _ => {
                            state = State::VisionAi;
                            continue;
                        }
                    };
                    log::info!("cascade: retrying document intelligence as final fallback");
                    let extractor =
                        CloudOcrExtractor::new(client, self.config.timeouts.table_extraction);
                    let result = self.run_cloud(&extractor, doc, hooks, text_useful);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));
                    outcome.cost_estimate += result.cost_estimate;

                    if result.success {
                        if accumulated_text.is_empty() {
                            accumulated_text = result.text.clone();
                        }
                        let table_outcome = recovery.recover(&result.tables);
                        let mut servicos = table_outcome.servicos;
                        for s in &mut servicos {
                            s.source = ServiceSource::DocAi;
                        }
                        let servicos = self.merge_with_pdf(servicos, &pdf_servicos);
                        let qty_ratio = quality::qty_ratio(&servicos);
                        update_best(
                            &mut best,
                            &servicos,
                            &accumulated_text,
                            qty_ratio,
                            table_outcome.confidence.max(result.confidence),
                            "cloud_ocr",
                        );
                        if !servicos.is_empty()
                            && qty_ratio >= self.config.cascade.stage2_qty_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    }
                    state = State::VisionAi;
                }

                State::VisionAi => {
                    let client = match (&self.clients.vision, paid) {
                        (Some(c), true) if c.is_configured() => c.clone(),
                        _ => {
                            state = State::Failed;
                            continue;
                        }
                    };
                    let extractor = VisionAiExtractor::new(client, self.config.timeouts.page);
                    let result = extractor.extract(doc, hooks);
                    check_cancel!(result);
                    outcome.stages_executed.push(result_label(&result));
                    outcome.cost_estimate += result.cost_estimate;

                    if result.success {
                        if accumulated_text.is_empty() && !result.text.is_empty() {
                            accumulated_text = result.text.clone();
                        }
                        let qty_ratio = quality::qty_ratio(&result.servicos);
                        update_best(
                            &mut best,
                            &result.servicos,
                            &accumulated_text,
                            qty_ratio,
                            result.confidence,
                            "vision_ai",
                        );
                        if !result.servicos.is_empty()
                            && qty_ratio >= self.config.cascade.stage3_qty_threshold
                        {
                            accept(&mut outcome, best.take().unwrap());
                            state = State::Done;
                            continue;
                        }
                    }
                    state = State::Failed;
                }

                State::Done => {
                    outcome.success = true;
                    return outcome;
                }

                State::Failed => {
                    // No stage met its threshold: emit the best partial.
                    if let Some(partial) = best.take() {
                        let confidence = partial.confidence;
                        accept(&mut outcome, partial);
                        outcome.success = confidence >= 0.5;
                    } else {
                        outcome.text = accumulated_text.clone();
                        outcome.success = false;
                    }
                    return outcome;
                }
            }
        }
    }

    fn run_cloud(
        &self,
        extractor: &CloudOcrExtractor,
        doc: &dyn PageAccess,
        hooks: &HostHooks,
        text_useful: bool,
    ) -> ExtractionResult {
        let result = extractor.extract(doc, hooks);
        let page_limited = result
            .errors
            .iter()
            .any(|e| e.contains(PAGE_LIMIT_EXCEEDED));
        if !result.success && page_limited && !text_useful {
            log::info!("cascade: page limit exceeded, retrying in imageless mode");
            return extractor.extract_with_mode(doc, hooks, true);
        }
        result
    }

    /// Merge a new source with the native-text services. The list with the
    /// better quantity coverage leads; ties go to native text.
    fn merge_with_pdf(
        &self,
        new: Vec<ServiceItem>,
        pdf_servicos: &[ServiceItem],
    ) -> Vec<ServiceItem> {
        if new.is_empty() {
            return pdf_servicos.to_vec();
        }
        if pdf_servicos.is_empty() {
            return new;
        }
        let new_ratio = quality::qty_ratio(&new);
        let pdf_ratio = quality::qty_ratio(pdf_servicos);
        if new_ratio > pdf_ratio {
            merge_prefer_primary(new, pdf_servicos.to_vec())
        } else {
            merge_prefer_primary(pdf_servicos.to_vec(), new)
        }
    }
}

fn result_label(result: &ExtractionResult) -> String {
    result
        .method
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".into())
}

fn update_best(
    best: &mut Option<Partial>,
    servicos: &[ServiceItem],
    text: &str,
    qty_ratio: f64,
    confidence: f64,
    source: &str,
) {
    let candidate_score = (servicos.len().min(1), (qty_ratio * 1000.0) as u64, servicos.len());
    let current_score = best
        .as_ref()
        .map(|b| (b.servicos.len().min(1), (b.qty_ratio * 1000.0) as u64, b.servicos.len()))
        .unwrap_or((0, 0, 0));
    if best.is_none() || candidate_score > current_score {
        *best = Some(Partial {
            servicos: servicos.to_vec(),
            text: text.to_string(),
            qty_ratio,
            confidence,
            source: source.to_string(),
        });
    }
}

fn accept(outcome: &mut CascadeOutcome, partial: Partial) {
    outcome.servicos = partial.servicos;
    outcome.text = partial.text;
    outcome.qty_ratio = partial.qty_ratio;
    outcome.confidence = partial.confidence;
    outcome.pipeline_used = partial.source;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::extract::clients::{DocAiOutcome, OcrPage};
    use crate::table::RawTable;
    use std::time::Duration;

    fn clean_table() -> RawTable {
        RawTable {
            rows: vec![
                vec!["ITEM".into(), "DESCRIÇÃO".into(), "UNIDADE".into(), "QUANTIDADE".into()],
                vec!["1.1".into(), "Alvenaria de vedação".into(), "M2".into(), "416,65".into()],
                vec!["1.2".into(), "Pintura látex acrílica".into(), "M2".into(), "502,18".into()],
            ],
            page: Some(1),
        }
    }

    /// Digital document with a clean embedded table.
    struct DigitalDoc;
    impl PageAccess for DigitalDoc {
        fn page_count(&self) -> usize {
            1
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok("ATESTADO DE CAPACIDADE TÉCNICA\n\
                Atestamos para os devidos fins que a empresa contratada executou\n\
                integralmente os serviços abaixo discriminados, conforme contrato\n\
                firmado com esta municipalidade e medições aprovadas pela fiscalização.\n\
                ITEM DISCRIMINAÇÃO UNID QTD\n\
                1.1 Alvenaria de vedação M2 416,65\n\
                1.2 Pintura látex acrílica M2 502,18\n"
                .into())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(vec![0u8; 8])
        }
        fn tables(&self) -> Result<Vec<RawTable>> {
            Ok(vec![clean_table()])
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    /// Scanned document: no text layer at all.
    struct ScannedDoc {
        pages: usize,
    }
    impl PageAccess for ScannedDoc {
        fn page_count(&self) -> usize {
            self.pages
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok(String::new())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(vec![0u8; 8])
        }
        fn image_coverage(&self, _page: usize) -> f64 {
            0.9
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    struct GoodCloud;
    impl DocumentIntelligenceClient for GoodCloud {
        fn is_configured(&self) -> bool {
            true
        }
        fn analyze(&self, _d: &[u8], _imageless: bool, _t: Duration) -> Result<DocAiOutcome> {
            Ok(DocAiOutcome {
                text: "texto reconhecido pela nuvem com comprimento suficiente para ser útil \
                       em estágios posteriores do processamento"
                    .into(),
                tables: vec![clean_table()],
                confidence: 0.9,
                pages: 2,
            })
        }
    }

    #[test]
    fn test_stage1_accepts_clean_digital_pdf() {
        let runner = CascadeRunner::new(ExtractionConfig::default(), CascadeClients::default());
        let outcome = runner.run(&DigitalDoc, &HostHooks::none());
        assert!(outcome.success);
        assert_eq!(outcome.pipeline_used, "native_text");
        assert_eq!(outcome.stages_executed, vec!["native_text"]);
        assert_eq!(outcome.servicos.len(), 2);
        assert_eq!(outcome.cost_estimate, 0.0);
    }

    #[test]
    fn test_scanned_doc_escalates_to_cloud() {
        let clients = CascadeClients {
            doc_ai: Some(Arc::new(GoodCloud)),
            ..Default::default()
        };
        let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
        let outcome = runner.run(&ScannedDoc { pages: 2 }, &HostHooks::none());
        assert!(outcome.success);
        assert_eq!(outcome.pipeline_used, "cloud_ocr");
        // pages × 0.01
        assert!((outcome.cost_estimate - 0.02).abs() < 1e-9);
        assert!(!outcome.stages_executed.contains(&"native_text".to_string()));
    }

    #[test]
    fn test_no_clients_no_result() {
        let runner = CascadeRunner::new(ExtractionConfig::default(), CascadeClients::default());
        let outcome = runner.run(&ScannedDoc { pages: 1 }, &HostHooks::none());
        assert!(!outcome.success);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_cancellation_discards_partials() {
        let hooks = HostHooks::none().with_cancel(|| true);
        let runner = CascadeRunner::new(ExtractionConfig::default(), CascadeClients::default());
        let outcome = runner.run(&DigitalDoc, &hooks);
        assert!(outcome.cancelled);
        assert!(outcome.servicos.is_empty());
        assert!(outcome.text.is_empty());
    }

    #[test]
    fn test_paid_services_disabled_blocks_cloud() {
        let clients = CascadeClients {
            doc_ai: Some(Arc::new(GoodCloud)),
            ..Default::default()
        };
        let config = ExtractionConfig::default().with_paid_services(false);
        let runner = CascadeRunner::new(config, clients);
        let outcome = runner.run(&ScannedDoc { pages: 1 }, &HostHooks::none());
        assert!(!outcome
            .stages_executed
            .contains(&"cloud_ocr".to_string()));
        assert_eq!(outcome.cost_estimate, 0.0);
    }

    #[test]
    fn test_local_ocr_path_on_scanned_doc() {
        struct LayoutEngine;
        impl OcrEngine for LayoutEngine {
            fn recognize(&self, _image: &[u8]) -> Result<OcrPage> {
                Ok(OcrPage {
                    text: "1.1 Alvenaria de vedação com blocos cerâmicos M2 416,65\n\
                           1.2 Pintura látex acrílica sobre massa corrida M2 502,18\n\
                           1.3 Forro em placas de gesso acartonado liso M2 216,41"
                        .into(),
                    confidence: 0.85,
                })
            }
        }
        let clients = CascadeClients {
            ocr_engine: Some(Arc::new(LayoutEngine)),
            ..Default::default()
        };
        let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
        let outcome = runner.run(&ScannedDoc { pages: 1 }, &HostHooks::none());
        assert!(outcome.success);
        assert_eq!(outcome.pipeline_used, "local_ocr");
        assert_eq!(outcome.servicos.len(), 3);
        assert!(outcome.qty_ratio >= 0.99);
    }
}

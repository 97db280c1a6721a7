//! Cascade integration tests: escalation, gating thresholds, monotonicity
//! of progress, cancellation and the paid-services switch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use atesta::cascade::{CascadeClients, CascadeRunner};
use atesta::config::ExtractionConfig;
use atesta::error::Result;
use atesta::extract::clients::{DocAiOutcome, DocumentIntelligenceClient, OcrEngine, OcrPage, PageAccess};
use atesta::host::HostHooks;
use atesta::table::RawTable;

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

/// A scanned document: empty text layer, image-dominant pages.
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
        Ok(vec![0u8; 4])
    }
    fn image_coverage(&self, _page: usize) -> f64 {
        0.85
    }
    fn raw_bytes(&self) -> Result<Vec<u8>> {
        Ok(b"%PDF-1.5".to_vec())
    }
}

/// Local OCR whose harvest lands at a poor quantity ratio; cloud OCR
/// returns a strong structured table.
struct WeakOcr;
impl OcrEngine for WeakOcr {
    fn recognize(&self, _image: &[u8]) -> Result<OcrPage> {
        // Items without usable quantities: qty_ratio stays low.
        Ok(OcrPage {
            text: "1.1 Alvenaria de vedação com blocos cerâmicos M2\n\
                   1.2 Pintura látex acrílica sobre massa corrida\n\
                   1.3 Forro em placas de gesso acartonado M2 216,41"
                .into(),
            confidence: 0.4,
        })
    }
}

struct StrongCloud {
    calls: AtomicUsize,
}
impl DocumentIntelligenceClient for StrongCloud {
    fn is_configured(&self) -> bool {
        true
    }
    fn analyze(&self, _doc: &[u8], _imageless: bool, _timeout: Duration) -> Result<DocAiOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DocAiOutcome {
            text: "texto reconhecido pelo serviço hospedado, longo o bastante para os \
                   estágios seguintes do processamento do documento"
                .into(),
            tables: vec![clean_table()],
            confidence: 0.9,
            pages: 3,
        })
    }
}

// =============================================================================
// SCENARIO: SCANNED DOCUMENT, ESCALATION TO CLOUD OCR
// =============================================================================

#[test]
fn test_scanned_document_escalates_and_accepts_cloud() {
    let cloud = Arc::new(StrongCloud {
        calls: AtomicUsize::new(0),
    });
    let clients = CascadeClients {
        ocr_engine: Some(Arc::new(WeakOcr)),
        doc_ai: Some(cloud.clone()),
        ..Default::default()
    };
    let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
    let outcome = runner.run(&ScannedDoc { pages: 3 }, &HostHooks::none());

    assert!(outcome.success);
    assert_eq!(outcome.pipeline_used, "cloud_ocr");
    assert!(outcome.qty_ratio >= 0.60);
    // cost ≈ pages × 0.01
    assert!((outcome.cost_estimate - 0.03).abs() < 1e-9);
    assert_eq!(cloud.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// MONOTONICITY
// =============================================================================

#[test]
fn test_accepted_stage_stops_cascade() {
    // Cloud accepts; the vision stage must never run.
    struct PanickingVision;
    impl atesta::extract::clients::VisionModelClient for PanickingVision {
        fn is_configured(&self) -> bool {
            true
        }
        fn extract_from_pages(
            &self,
            _pages: &[Vec<u8>],
            _timeout: Duration,
        ) -> Result<atesta::extract::clients::VisionOutcome> {
            panic!("vision stage ran after an earlier stage accepted");
        }
    }

    let clients = CascadeClients {
        doc_ai: Some(Arc::new(StrongCloud {
            calls: AtomicUsize::new(0),
        })),
        vision: Some(Arc::new(PanickingVision)),
        ..Default::default()
    };
    let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
    let outcome = runner.run(&ScannedDoc { pages: 2 }, &HostHooks::none());
    assert!(outcome.success);
    assert!(!outcome.stages_executed.contains(&"vision_ai".to_string()));
}

#[test]
fn test_progress_is_monotonic_within_stage() {
    let events: Arc<Mutex<Vec<(String, u32)>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let hooks = HostHooks::none().with_progress(move |current, _total, stage, _msg| {
        events_clone.lock().unwrap().push((stage.to_string(), current));
    });

    let clients = CascadeClients {
        ocr_engine: Some(Arc::new(WeakOcr)),
        ..Default::default()
    };
    let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
    runner.run(&ScannedDoc { pages: 3 }, &hooks);

    let events = events.lock().unwrap();
    assert!(!events.is_empty());
    // Within every stage, `current` never decreases.
    let mut last: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    for (stage, current) in events.iter() {
        if let Some(prev) = last.get(stage) {
            assert!(current >= prev, "progress regressed in stage {}", stage);
        }
        last.insert(stage.clone(), *current);
    }
}

// =============================================================================
// CANCELLATION AND COST SWITCHES
// =============================================================================

#[test]
fn test_cancellation_yields_no_partial_result() {
    let clients = CascadeClients {
        ocr_engine: Some(Arc::new(WeakOcr)),
        ..Default::default()
    };
    let hooks = HostHooks::none().with_cancel(|| true);
    let runner = CascadeRunner::new(ExtractionConfig::default(), clients);
    let outcome = runner.run(&ScannedDoc { pages: 2 }, &hooks);
    assert!(outcome.cancelled);
    assert!(outcome.servicos.is_empty());
    assert!(outcome.text.is_empty());
}

#[test]
fn test_paid_services_switch_disables_cloud() {
    let cloud = Arc::new(StrongCloud {
        calls: AtomicUsize::new(0),
    });
    let clients = CascadeClients {
        doc_ai: Some(cloud.clone()),
        ..Default::default()
    };
    let config = ExtractionConfig::default().with_paid_services(false);
    let runner = CascadeRunner::new(config, clients);
    let outcome = runner.run(&ScannedDoc { pages: 2 }, &HostHooks::none());
    assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.cost_estimate, 0.0);
}

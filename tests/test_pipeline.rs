//! End-to-end pipeline tests over fake host capabilities.

use std::sync::Arc;
use std::time::Duration;

use atesta::error::{Error, Result};
use atesta::extract::clients::{DocumentFields, PageAccess, TextModelClient};
use atesta::model::DescSource;
use atesta::table::RawTable;
use atesta::{
    DocumentInput, ExtractionConfig, HostHooks, Pipeline, PipelineClients,
};
use chrono::NaiveDate;

/// Digital one-page document with a clean table and matching text layer.
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
        Ok(vec![0u8; 4])
    }
    fn tables(&self) -> Result<Vec<RawTable>> {
        Ok(vec![RawTable {
            rows: vec![
                vec!["ITEM".into(), "DESCRIÇÃO".into(), "UNIDADE".into(), "QUANTIDADE".into()],
                vec!["1.1".into(), "Alvenaria de vedação".into(), "M2".into(), "416,65".into()],
                vec!["1.2".into(), "Pintura látex acrílica".into(), "M2".into(), "502,18".into()],
            ],
            page: Some(1),
        }])
    }
    fn raw_bytes(&self) -> Result<Vec<u8>> {
        Ok(b"%PDF-1.7 fake".to_vec())
    }
}

struct FieldsModel;
impl TextModelClient for FieldsModel {
    fn is_configured(&self) -> bool {
        true
    }
    fn analyze_attestation(&self, _texto: &str, _timeout: Duration) -> Result<DocumentFields> {
        Ok(DocumentFields {
            contratante: Some("Prefeitura Municipal de Exemplo".into()),
            data_emissao: NaiveDate::from_ymd_opt(2023, 7, 14),
            descricao_servico: Some("Construção de unidade escolar".into()),
            servicos: Vec::new(),
        })
    }
}

fn pipeline_with_model() -> Pipeline {
    let clients = PipelineClients {
        text_model: Some(Arc::new(FieldsModel)),
        ..Default::default()
    };
    Pipeline::new(ExtractionConfig::new(), clients).unwrap()
}

// =============================================================================
// SCENARIO: DIGITAL PDF, CLEAN TABLE
// =============================================================================

#[test]
fn test_digital_pdf_end_to_end() {
    let extraction = pipeline_with_model()
        .process(&DigitalDoc, &HostHooks::none())
        .unwrap();

    assert_eq!(extraction.servicos.len(), 2);
    assert_eq!(extraction.pipeline_used, "native_text");
    assert_eq!(extraction.stages_executed, vec!["native_text"]);
    assert_eq!(extraction.cost_estimate, 0.0);

    let first = &extraction.servicos[0];
    assert_eq!(first.item.as_ref().unwrap().to_string(), "1.1");
    assert_eq!(first.unidade.as_deref(), Some("M2"));
    assert_eq!(first.quantidade, Some(416.65));
    let second = &extraction.servicos[1];
    assert_eq!(second.quantidade, Some(502.18));

    // Document-level fields from the text model.
    assert_eq!(extraction.contratante, "Prefeitura Municipal de Exemplo");
    assert_eq!(
        extraction.data_emissao,
        NaiveDate::from_ymd_opt(2023, 7, 14)
    );
}

#[test]
fn test_output_serialization_contract() {
    let extraction = pipeline_with_model()
        .process(&DigitalDoc, &HostHooks::none())
        .unwrap();
    let json = serde_json::to_value(&extraction).unwrap();

    assert_eq!(json["data_emissao"], "2023-07-14");
    assert_eq!(json["servicos"][0]["item"], "1.1");
    assert_eq!(json["servicos"][0]["unidade"], "M2");
    // Quantities are JSON numbers, not strings.
    assert!(json["servicos"][0]["quantidade"].is_number());
    assert_eq!(json["pipeline_used"], "native_text");
}

// =============================================================================
// INVARIANTS ON EMISSION
// =============================================================================

#[test]
fn test_emitted_invariants() {
    let extraction = pipeline_with_model()
        .process(&DigitalDoc, &HostHooks::none())
        .unwrap();

    // Unique codes.
    let mut keys: Vec<_> = extraction
        .servicos
        .iter()
        .filter_map(|s| s.item.as_ref().map(|c| c.sort_key()))
        .collect();
    let before = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), before);

    // Canonical order.
    let sort_keys: Vec<_> = extraction.servicos.iter().map(|s| s.sort_key()).collect();
    assert!(sort_keys.windows(2).all(|w| w[0] <= w[1]));

    // Reconstructed descriptions covered by the raw text.
    let normalized = atesta::text::normalize_description(&extraction.texto_extraido);
    for servico in &extraction.servicos {
        if servico.desc_source == Some(DescSource::TextoOriginal) {
            let desc = atesta::text::normalize_description(&servico.descricao);
            assert!(normalized.contains(&desc));
        }
    }
}

// =============================================================================
// VALIDATION AND ERRORS
// =============================================================================

#[test]
fn test_input_signature_validation() {
    let good = DocumentInput::Bytes {
        data: b"%PDF-1.4 content".to_vec(),
        extension: "pdf".into(),
    };
    assert!(Pipeline::validate_input(&good).is_ok());

    let mismatched = DocumentInput::Bytes {
        data: b"\x89PNG\r\n\x1a\n....".to_vec(),
        extension: "pdf".into(),
    };
    assert!(matches!(
        Pipeline::validate_input(&mismatched),
        Err(Error::SignatureMismatch { .. })
    ));

    let junk = DocumentInput::Bytes {
        data: b"not a document at all".to_vec(),
        extension: "pdf".into(),
    };
    assert!(matches!(
        Pipeline::validate_input(&junk),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_path_input_validation() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("atestado.pdf");
    std::fs::File::create(&pdf_path)
        .unwrap()
        .write_all(b"%PDF-1.4 minimal")
        .unwrap();
    assert!(Pipeline::validate_input(&DocumentInput::path(&pdf_path)).is_ok());

    // PNG bytes behind a .pdf extension.
    let fake_path = dir.path().join("scan.pdf");
    std::fs::File::create(&fake_path)
        .unwrap()
        .write_all(b"\x89PNG\r\n\x1a\n....")
        .unwrap();
    assert!(matches!(
        Pipeline::validate_input(&DocumentInput::path(&fake_path)),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn test_bad_signature_rejected_by_process() {
    struct JunkDoc;
    impl PageAccess for JunkDoc {
        fn page_count(&self) -> usize {
            1
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok(String::new())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(b"garbage content".to_vec())
        }
    }
    let result = pipeline_with_model().process(&JunkDoc, &HostHooks::none());
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_quality_rejection_carries_partial() {
    struct EmptyScan;
    impl PageAccess for EmptyScan {
        fn page_count(&self) -> usize {
            1
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok(String::new())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(vec![0u8; 4])
        }
        fn image_coverage(&self, _page: usize) -> f64 {
            0.9
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    // No OCR, no cloud, no vision: nothing can extract anything.
    let pipeline = Pipeline::new(ExtractionConfig::new(), PipelineClients::default()).unwrap();
    match pipeline.process(&EmptyScan, &HostHooks::none()) {
        Err(Error::QualityRejected { confidence, partial }) => {
            assert!(confidence < 0.5);
            assert!(partial.servicos.is_empty());
        }
        other => panic!("expected quality rejection, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_cancellation_surfaces_as_error() {
    let hooks = HostHooks::none().with_cancel(|| true);
    let result = pipeline_with_model().process(&DigitalDoc, &hooks);
    assert!(matches!(result, Err(Error::Cancelled(_))));
}

// =============================================================================
// SALVAGED ITEM RECOVERS ITS DESCRIPTION END TO END
// =============================================================================

#[test]
fn test_classification_salvage_recovers_description() {
    struct SalvageDoc;
    impl PageAccess for SalvageDoc {
        fn page_count(&self) -> usize {
            1
        }
        fn native_text(&self, _page: usize) -> Result<String> {
            Ok("ATESTADO DE CAPACIDADE TÉCNICA\n\
                Atestamos para os devidos fins que a empresa contratada executou\n\
                integralmente os serviços abaixo discriminados, conforme contrato\n\
                firmado com esta municipalidade e medições aprovadas pela fiscalização.\n\
                ITEM DISCRIMINAÇÃO UNID QTD\n\
                7.4 Execução de fundação profunda em estacas escavadas M3 120,00\n"
                .into())
        }
        fn rasterize(&self, _page: usize, _dpi: u32) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn tables(&self) -> Result<Vec<RawTable>> {
            Ok(vec![RawTable {
                rows: vec![
                    vec!["ITEM".into(), "DESCRIÇÃO".into(), "UNID".into(), "QTD".into()],
                    // The table read captured a classification path.
                    vec!["7.4".into(), "EXECUÇÃO > OBRAS > FUNDAÇÃO".into(), "M3".into(), "120,00".into()],
                ],
                page: Some(1),
            }])
        }
        fn raw_bytes(&self) -> Result<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    let pipeline = Pipeline::new(ExtractionConfig::new(), PipelineClients::default()).unwrap();
    let extraction = pipeline.process(&SalvageDoc, &HostHooks::none()).unwrap();

    let item = extraction
        .servicos
        .iter()
        .find(|s| s.item.as_ref().map(|c| c.to_string()) == Some("7.4".into()))
        .expect("salvaged item present");
    assert_eq!(item.quantidade, Some(120.0));
    // The reconstructor replaced the taxonomy path with the real wording.
    assert!(item.descricao.contains("fundação profunda"));
    assert_eq!(item.desc_source, Some(DescSource::TextoOriginal));
}

//! The whole-document extraction result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::service::ServiceItem;

/// Canonical representation of one processed attestation.
///
/// Owned exclusively by the pipeline while in flight; immutable once
/// emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttestationExtraction {
    /// Contracting body that issued the attestation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contratante: String,
    /// Issue date (`YYYY-MM-DD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_emissao: Option<NaiveDate>,
    /// Document-level service summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub descricao_servico: String,
    /// Document-level quantity, when a single service dominates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantidade: Option<f64>,
    /// Document-level unit, when a single service dominates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidade: Option<String>,
    /// Ordered service line items.
    pub servicos: Vec<ServiceItem>,
    /// Authoritative raw text; ground truth for the reconstructor.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub texto_extraido: String,
    /// Extraction path that produced the accepted result.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pipeline_used: String,
    /// Audit trail of every stage that ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages_executed: Vec<String>,
    /// Overall confidence in `[0, 1]`.
    pub confidence: f64,
    /// Estimated cost of paid stages, in currency units.
    pub cost_estimate: f64,
}

impl AttestationExtraction {
    /// An empty result tagged with the pipeline that produced it.
    pub fn empty(pipeline_used: impl Into<String>) -> Self {
        Self {
            pipeline_used: pipeline_used.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemCode, ServiceSource};

    #[test]
    fn test_date_serializes_iso() {
        let extraction = AttestationExtraction {
            contratante: "Prefeitura Municipal".into(),
            data_emissao: NaiveDate::from_ymd_opt(2023, 7, 14),
            confidence: 0.9,
            ..Default::default()
        };
        let json = serde_json::to_value(&extraction).unwrap();
        assert_eq!(json["data_emissao"], "2023-07-14");
        assert_eq!(json["contratante"], "Prefeitura Municipal");
    }

    #[test]
    fn test_quantities_serialize_as_numbers() {
        let extraction = AttestationExtraction {
            servicos: vec![ServiceItem::new("Alvenaria", ServiceSource::Table)
                .with_item(ItemCode::parse("1.1").unwrap())
                .with_quantity(416.65)],
            ..Default::default()
        };
        let json = serde_json::to_string(&extraction).unwrap();
        assert!(json.contains("\"quantidade\":416.65"));
        assert!(!json.contains("\"416.65\""));
    }

    #[test]
    fn test_empty_fields_omitted() {
        let json = serde_json::to_value(AttestationExtraction::default()).unwrap();
        assert!(json.get("contratante").is_none());
        assert!(json.get("data_emissao").is_none());
        assert!(json.get("stages_executed").is_none());
        assert!(json.get("servicos").is_some());
    }
}

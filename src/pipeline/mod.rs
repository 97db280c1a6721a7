//! The end-to-end pipeline driver.
//!
//! Six ordered stages over a shared context, none of which may skip back:
//!
//! 1. TextExtraction and 2. TableExtraction — the cascade runner.
//! 3. AIAnalysis — document-level fields from the text model.
//! 4. TextEnrichment — items harvested from the raw text when the table
//!    result is weak.
//! 5. PostProcess — filters, restart detection, deduplication.
//! 6. Finalization — description reconstruction, canonical ordering,
//!    invariant assertions.
//!
//! The pipeline exclusively owns the in-flight result; stages receive the
//! context one at a time.

use std::sync::Arc;

use crate::cascade::{CascadeClients, CascadeOutcome, CascadeRunner};
use crate::config::ExtractionConfig;
use crate::dedup::{
    apply_restart_prefixes, merge_prefer_primary, remove_codeless_duplicates, Deduplicator,
};
use crate::error::{Error, Result};
use crate::extract::clients::{PageAccess, TextModelClient};
use crate::extract::text_items::harvest_text_items;
use crate::filters;
use crate::host::HostHooks;
use crate::input::{detect_signature, DocumentInput};
use crate::model::{sort_services, AttestationExtraction, DescSource, ServiceItem, ServiceSource};
use crate::quality;
use crate::reconstruct::DescriptionReconstructor;
use crate::text::normalize::{normalize_description, normalize_for_display, sanitize_description};
use crate::text::units::{canonical_unit, is_valid_unit, normalize_unit};

/// All injected clients for one pipeline.
#[derive(Default, Clone)]
pub struct PipelineClients {
    /// Clients consumed by the cascade.
    pub cascade: CascadeClients,
    /// Text model for document-level analysis.
    pub text_model: Option<Arc<dyn TextModelClient>>,
}

/// The end-to-end extraction pipeline.
pub struct Pipeline {
    config: ExtractionConfig,
    clients: PipelineClients,
}

impl Pipeline {
    /// Build a pipeline. The configuration is validated once, here.
    pub fn new(config: ExtractionConfig, clients: PipelineClients) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, clients })
    }

    /// Validate an input's file signature before any extraction.
    pub fn validate_input(input: &DocumentInput) -> Result<crate::input::FileKind> {
        input.validate()
    }

    /// Process one document end to end.
    pub fn process(
        &self,
        doc: &dyn PageAccess,
        hooks: &HostHooks,
    ) -> Result<AttestationExtraction> {
        // Signature check on the raw bytes, when the document has them
        // (page-image inputs are validated up front by the host through
        // `validate_input`).
        let raw = doc.raw_bytes()?;
        if !raw.is_empty() && detect_signature(&raw).is_none() {
            return Err(Error::InvalidInput(
                "unrecognized file signature (not PDF or a supported image)".into(),
            ));
        }

        // Stages 1-2: text extraction and table extraction.
        hooks.progress(0, 6, "pipeline", "extração de texto e tabelas");
        let runner = CascadeRunner::new(self.config.clone(), self.clients.cascade.clone());
        let cascade = runner.run(doc, hooks);
        if cascade.cancelled {
            return Err(Error::Cancelled("extraction".into()));
        }

        let mut extraction = AttestationExtraction {
            servicos: cascade.servicos.clone(),
            texto_extraido: cascade.text.clone(),
            pipeline_used: cascade.pipeline_used.clone(),
            stages_executed: cascade.stages_executed.clone(),
            confidence: cascade.confidence,
            cost_estimate: cascade.cost_estimate,
            ..Default::default()
        };

        // Stage 3: AI analysis of document-level fields.
        hooks.progress(2, 6, "pipeline", "análise de campos do documento");
        if hooks.is_cancelled() {
            return Err(Error::Cancelled("ai_analysis".into()));
        }
        self.ai_analysis(&mut extraction, hooks);

        // Stage 4: text enrichment.
        hooks.progress(3, 6, "pipeline", "enriquecimento via texto");
        if hooks.is_cancelled() {
            return Err(Error::Cancelled("text_enrichment".into()));
        }
        self.text_enrichment(&mut extraction, &cascade);

        // Stage 5: post-processing.
        hooks.progress(4, 6, "pipeline", "filtros e deduplicação");
        if hooks.is_cancelled() {
            return Err(Error::Cancelled("post_process".into()));
        }
        self.post_process(&mut extraction);

        // Stage 6: finalization.
        hooks.progress(5, 6, "pipeline", "finalização");
        if hooks.is_cancelled() {
            return Err(Error::Cancelled("finalization".into()));
        }
        self.finalize(&mut extraction)?;
        hooks.progress(6, 6, "pipeline", "concluído");

        if !cascade.success && extraction.confidence < 0.5 {
            let confidence = extraction.confidence;
            return Err(Error::QualityRejected {
                confidence,
                partial: Box::new(extraction),
            });
        }

        Ok(extraction)
    }

    fn ai_analysis(&self, extraction: &mut AttestationExtraction, _hooks: &HostHooks) {
        let model = match &self.clients.text_model {
            Some(m) if m.is_configured() => m,
            _ => return,
        };
        if extraction.texto_extraido.trim().is_empty() {
            return;
        }

        match model.analyze_attestation(&extraction.texto_extraido, self.config.timeouts.retry) {
            Ok(fields) => {
                if let Some(contratante) = fields.contratante {
                    extraction.contratante = contratante;
                }
                if fields.data_emissao.is_some() {
                    extraction.data_emissao = fields.data_emissao;
                }
                if let Some(descricao) = fields.descricao_servico {
                    extraction.descricao_servico = descricao;
                }
                if extraction.servicos.is_empty() && !fields.servicos.is_empty() {
                    let mut servicos = fields.servicos;
                    for s in &mut servicos {
                        s.source = ServiceSource::Ai;
                    }
                    extraction.servicos = servicos;
                }
            }
            Err(e) => {
                // Transient by definition; the document fields stay empty.
                log::warn!("document-level analysis failed: {}", e);
            }
        }
    }

    fn text_enrichment(&self, extraction: &mut AttestationExtraction, cascade: &CascadeOutcome) {
        if extraction.texto_extraido.trim().is_empty() {
            return;
        }
        let ts = &self.config.text_section;
        let stats = quality::compute_stats(&extraction.servicos);
        let enabled = cascade.confidence < ts.table_confidence_min
            || stats.qty_ratio() < ts.qty_ratio_min
            || stats.duplicate_ratio > ts.dup_ratio_max;
        if !enabled {
            log::debug!("text enrichment skipped: table result is strong");
            return;
        }

        let text_items = harvest_text_items(&extraction.texto_extraido, ts.max_desc_len);
        if text_items.is_empty() {
            return;
        }
        let merged = merge_prefer_primary(std::mem::take(&mut extraction.servicos), text_items);
        extraction.servicos = merged;
    }

    fn post_process(&self, extraction: &mut AttestationExtraction) {
        let servicos = std::mem::take(&mut extraction.servicos);

        let (servicos, _report) = filters::apply_all(servicos, &self.config.dedup);

        let mut servicos = servicos;
        apply_restart_prefixes(&mut servicos, &self.config.restart);

        let deduper = Deduplicator::new(&self.config.dedup);
        let (servicos, _dedup_report) = deduper.dedupe(servicos);

        extraction.servicos =
            remove_codeless_duplicates(servicos, self.config.dedup.similarity_threshold);
    }

    fn finalize(&self, extraction: &mut AttestationExtraction) -> Result<()> {
        // Reconstruct descriptions against the raw text.
        if !extraction.texto_extraido.is_empty() {
            DescriptionReconstructor::new()
                .fix_descriptions(&mut extraction.servicos, &extraction.texto_extraido);
        }

        // Clean descriptions and canonicalize units.
        for servico in &mut extraction.servicos {
            servico.descricao = normalize_for_display(&sanitize_description(&servico.descricao));
            if let Some(unit) = &servico.unidade {
                let canonical =
                    canonical_unit(unit).unwrap_or_else(|| normalize_unit(unit));
                servico.unidade = Some(canonical).filter(|u| !u.is_empty());
            }
        }

        assign_duplicate_suffixes(&mut extraction.servicos);
        sort_services(&mut extraction.servicos);

        // Document-level fields when a single service dominates.
        if extraction.servicos.len() == 1 {
            extraction.quantidade = extraction.servicos[0].quantidade;
            extraction.unidade = extraction.servicos[0].unidade.clone();
        }
        if extraction.descricao_servico.is_empty() {
            if let Some(first) = extraction.servicos.first() {
                extraction.descricao_servico =
                    first.descricao.chars().take(200).collect::<String>();
            }
        }

        self.assert_invariants(extraction)
    }

    /// Emission invariants. A violation here is a bug, not a data condition.
    fn assert_invariants(&self, extraction: &AttestationExtraction) -> Result<()> {
        // No two items share (segment, tuple, suffix).
        let mut seen = std::collections::HashSet::new();
        for servico in &extraction.servicos {
            if let Some(code) = &servico.item {
                if !seen.insert(code.sort_key()) {
                    return Err(Error::InternalInvariant(format!(
                        "duplicate item code after finalization: {}",
                        code
                    )));
                }
            }
        }

        // Units come from the recognized set.
        for servico in &extraction.servicos {
            if let Some(unit) = &servico.unidade {
                if !is_valid_unit(unit) {
                    return Err(Error::InternalInvariant(format!(
                        "unrecognized unit after finalization: {}",
                        unit
                    )));
                }
            }
        }

        // Code well-formedness holds by construction: `ItemCode` cannot
        // represent a malformed code.

        // Canonical order.
        let keys: Vec<_> = extraction.servicos.iter().map(|s| s.sort_key()).collect();
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InternalInvariant(
                "services are not in canonical order".into(),
            ));
        }

        // The raw text covers every reconstructed description.
        if !extraction.texto_extraido.is_empty() {
            let normalized_text = normalize_description(&extraction.texto_extraido);
            for servico in &extraction.servicos {
                if servico.desc_source != Some(DescSource::TextoOriginal) {
                    continue;
                }
                if !text_covers_description(&normalized_text, &servico.descricao) {
                    return Err(Error::InternalInvariant(format!(
                        "reconstructed description not covered by source text: {}",
                        servico.descricao
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Whether the normalized raw text covers a description: a contiguous
/// substring match, or (for descriptions spliced around an embedded code)
/// every word present.
fn text_covers_description(normalized_text: &str, descricao: &str) -> bool {
    let desc = normalize_description(descricao);
    if desc.is_empty() || normalized_text.contains(&desc) {
        return true;
    }
    let words: std::collections::HashSet<&str> = normalized_text.split_whitespace().collect();
    desc.split_whitespace().all(|w| words.contains(w))
}

/// Disambiguate items that still share a full code with `-A`, `-B`, …
/// suffixes, in document order. Letters already taken by a legitimate
/// suffixed sibling are skipped.
fn assign_duplicate_suffixes(servicos: &mut [ServiceItem]) {
    use std::collections::{HashMap, HashSet};

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    for servico in servicos.iter() {
        if let Some(code) = &servico.item {
            *counts.entry(code.to_string()).or_insert(0) += 1;
            taken.insert(code.to_string());
        }
    }

    let mut first_seen: HashSet<String> = HashSet::new();
    for servico in servicos.iter_mut() {
        let code = match &servico.item {
            Some(c) if c.suffix().is_none() => c.clone(),
            _ => continue,
        };
        let key = code.to_string();
        if counts.get(&key).copied().unwrap_or(0) < 2 {
            continue;
        }
        if first_seen.insert(key.clone()) {
            continue;
        }
        for letter in b'A'..=b'Z' {
            let candidate = code.with_suffix(Some(letter as char));
            let rendered = candidate.to_string();
            if !taken.contains(&rendered) {
                taken.insert(rendered);
                servico.item = Some(candidate);
                break;
            }
        }
    }
}

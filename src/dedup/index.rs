//! Inverted keyword index over service descriptions.
//!
//! Lets the pairwise dedupe strategies find candidate partners through
//! shared keywords instead of scanning every pair.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::ServiceItem;
use crate::text::normalize::extract_keywords;

/// keyword → indices of the services containing it.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    map: HashMap<String, Vec<usize>>,
    keywords: Vec<BTreeSet<String>>,
}

impl KeywordIndex {
    /// Build the index over a service list.
    pub fn build(servicos: &[ServiceItem]) -> Self {
        let mut map: HashMap<String, Vec<usize>> = HashMap::new();
        let mut keywords = Vec::with_capacity(servicos.len());

        for (i, servico) in servicos.iter().enumerate() {
            let kw = extract_keywords(servico.descricao.trim());
            for word in &kw {
                map.entry(word.clone()).or_default().push(i);
            }
            keywords.push(kw);
        }

        Self { map, keywords }
    }

    /// Keyword set of the i-th service.
    pub fn keywords_of(&self, i: usize) -> &BTreeSet<String> {
        &self.keywords[i]
    }

    /// Indices of services sharing at least one keyword with the given set.
    pub fn candidates(&self, keywords: &BTreeSet<String>) -> HashSet<usize> {
        let mut out = HashSet::new();
        for kw in keywords {
            if let Some(indices) = self.map.get(kw) {
                out.extend(indices.iter().copied());
            }
        }
        out
    }

    /// Jaccard similarity between a keyword set and the i-th service.
    pub fn similarity_with(&self, keywords: &BTreeSet<String>, i: usize) -> f64 {
        let other = &self.keywords[i];
        if keywords.is_empty() || other.is_empty() {
            return 0.0;
        }
        let intersection = keywords.intersection(other).count();
        let union = keywords.union(other).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceSource;

    #[test]
    fn test_candidates_through_shared_keywords() {
        let servicos = vec![
            ServiceItem::new("Pintura látex acrílica", ServiceSource::Table),
            ServiceItem::new("Escavação mecânica", ServiceSource::Table),
            ServiceItem::new("Pintura esmalte sintético", ServiceSource::Table),
        ];
        let index = KeywordIndex::build(&servicos);
        let kw = extract_keywords("Pintura de paredes");
        let candidates = index.candidates(&kw);
        assert!(candidates.contains(&0));
        assert!(candidates.contains(&2));
        assert!(!candidates.contains(&1));
    }

    #[test]
    fn test_similarity_with() {
        let servicos = vec![ServiceItem::new(
            "Pintura látex acrílica",
            ServiceSource::Table,
        )];
        let index = KeywordIndex::build(&servicos);
        let kw = extract_keywords("Pintura látex acrílica");
        assert!((index.similarity_with(&kw, 0) - 1.0).abs() < f64::EPSILON);
    }
}

//! In-process retrieval index over the knowledge store's documents.
//!
//! The hosted vector database stays external to this service; as in the
//! original system, retrieval here is a local candidate scan whose semantic
//! ranking is refined by the LLM filter stage. Scoring is deterministic
//! token overlap with name and culture boosts so exact-name queries rank
//! their item first with a positive score.

use kultura_core::{Document, KnowledgeStore, StoreError};

const STOP_WORDS: [&str; 24] = [
    "what", "is", "the", "a", "an", "tell", "me", "about", "share", "explain", "describe", "how",
    "why", "where", "when", "who", "and", "or", "in", "on", "at", "to", "for", "of",
];

/// Snapshot of the store's documents with keyword scoring.
pub struct SearchIndex {
    documents: Vec<Document>,
}

impl SearchIndex {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn from_store(store: &KnowledgeStore) -> Result<Self, StoreError> {
        Ok(Self::from_documents(store.all_documents()?))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Top `top_k` documents by descending score. Documents scoring at or
    /// below `score_threshold` are dropped; an empty index yields an empty
    /// list, never an error.
    pub fn search(&self, query: &str, top_k: usize, score_threshold: f32) -> Vec<Document> {
        if top_k == 0 || self.documents.is_empty() {
            return Vec::new();
        }
        let terms = significant_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<Document> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let score = score_document(doc, &terms);
                (score > 0.0 && score > score_threshold).then(|| {
                    let mut hit = doc.clone();
                    hit.score = score;
                    hit
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        scored
    }
}

/// Lowercased query terms with stop words and short tokens removed.
fn significant_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Fraction of query terms found in the document, boosted for name and
/// culture hits, capped at 1.0.
fn score_document(doc: &Document, terms: &[String]) -> f32 {
    let name = doc.metadata.name.to_lowercase();
    let culture = doc.metadata.culture.to_lowercase();
    let text = doc.text.to_lowercase();

    let mut matched = 0usize;
    let mut boost = 0.0f32;
    for term in terms {
        let in_name = name.contains(term.as_str());
        let in_culture = culture.contains(term.as_str());
        let in_text = text.contains(term.as_str());
        if in_name || in_culture || in_text {
            matched += 1;
        }
        if in_name {
            boost += 0.3;
        }
        if in_culture {
            boost += 0.15;
        }
    }
    if matched == 0 {
        return 0.0;
    }
    let base = matched as f32 / terms.len() as f32 * 0.5;
    (base + boost).min(1.0)
}

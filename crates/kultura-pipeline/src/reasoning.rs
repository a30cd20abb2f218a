//! Symbolic reasoning over the knowledge store.
//!
//! A small fixed rule set relates cultural items to their cultures and to
//! each other. Queries are matched on significant terms and the resulting
//! inferences are cached per normalized query.

use kultura_core::{Category, CulturalItem, KnowledgeStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

const STOP_WORDS: [&str; 16] = [
    "what", "is", "the", "a", "an", "tell", "me", "about", "share", "explain", "describe", "and",
    "or", "in", "of", "for",
];

const PROVERB_CONFIDENCE: f32 = 0.85;
const ITEM_CONFIDENCE: f32 = 0.9;
const RELATED_CONFIDENCE: f32 = 0.8;

/// One derived fact: `predicate(item, value)` with a confidence weight.
#[derive(Clone, Debug, Serialize)]
pub struct Inference {
    pub predicate: String,
    pub item: String,
    pub value: String,
    pub confidence: f32,
    pub explanation: String,
}

/// Rule-based reasoner over a snapshot of the store's items.
pub struct Reasoner {
    items: Vec<CulturalItem>,
    cache: RwLock<HashMap<String, Vec<Inference>>>,
}

impl Reasoner {
    pub fn from_items(items: Vec<CulturalItem>) -> Self {
        Self {
            items,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_store(store: &KnowledgeStore) -> Result<Self, StoreError> {
        let mut items = Vec::new();
        for category in Category::ALL {
            items.extend(store.items_in(category)?);
        }
        Ok(Self::from_items(items))
    }

    /// Inferences for the items a query touches, plus same-culture
    /// relationships among them. Results are cached per normalized query.
    pub fn infer(&self, query: &str) -> Vec<Inference> {
        let key = query.trim().to_lowercase();
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let terms = significant_terms(&key);
        let matched: Vec<&CulturalItem> = self
            .items
            .iter()
            .filter(|item| matches_query(item, &terms))
            .collect();

        let mut inferences: Vec<Inference> = matched.iter().map(|item| item_rule(item)).collect();
        inferences.extend(related_rules(&matched));

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, inferences.clone());
        }
        inferences
    }
}

/// Direct category rule, e.g. festival_to_culture(Eyo Festival, Yoruba).
fn item_rule(item: &CulturalItem) -> Inference {
    let (predicate, confidence) = match item.category {
        Category::Festival => ("festival_to_culture", ITEM_CONFIDENCE),
        Category::ArtForm => ("art_to_culture", ITEM_CONFIDENCE),
        Category::Tradition => ("tradition_to_culture", ITEM_CONFIDENCE),
        Category::Language => ("language_to_culture", ITEM_CONFIDENCE),
        Category::Proverb => ("proverb_to_culture", PROVERB_CONFIDENCE),
    };
    Inference {
        predicate: predicate.to_string(),
        item: item.name.clone(),
        value: item.culture.clone(),
        confidence,
        explanation: format!(
            "{} is a {} of the {} culture",
            item.name,
            item.category.as_str().replace('_', " "),
            item.culture
        ),
    }
}

/// Same-culture relationships among the matched items.
fn related_rules(matched: &[&CulturalItem]) -> Vec<Inference> {
    let mut related = Vec::new();
    for (i, a) in matched.iter().enumerate() {
        for b in matched.iter().skip(i + 1) {
            if a.culture.eq_ignore_ascii_case(&b.culture) && a.id != b.id {
                related.push(Inference {
                    predicate: "related_items".to_string(),
                    item: a.name.clone(),
                    value: b.name.clone(),
                    confidence: RELATED_CONFIDENCE,
                    explanation: format!(
                        "{} and {} both belong to the {} culture",
                        a.name, b.name, a.culture
                    ),
                });
            }
        }
    }
    related
}

/// Domain synonyms folded into the match terms, so "celebration" still
/// reaches festival items.
const EXPANSIONS: [(&str, &[&str]); 5] = [
    ("festival", &["celebration", "ceremony"]),
    ("celebration", &["festival"]),
    ("art", &["craft"]),
    ("language", &["tongue", "speak"]),
    ("proverb", &["saying", "wisdom"]),
];

fn significant_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect();
    let mut expanded = Vec::new();
    for term in &terms {
        if let Some((_, synonyms)) = EXPANSIONS.iter().find(|(k, _)| k == term) {
            expanded.extend(synonyms.iter().map(|s| s.to_string()));
        }
    }
    terms.extend(expanded);
    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
    terms
}

fn matches_query(item: &CulturalItem, terms: &[String]) -> bool {
    if terms.is_empty() {
        return false;
    }
    let haystack = format!(
        "{} {} {}",
        item.name.to_lowercase(),
        item.culture.to_lowercase(),
        item.description.to_lowercase()
    );
    terms.iter().any(|t| haystack.contains(t.as_str()))
}

//! The query pipeline: retrieve, filter, reason, enrich, generate.
//!
//! Every stage after retrieval degrades silently. A query against an empty
//! store still produces a well-formed answer.

use crate::llm::LlmClient;
use crate::reasoning::{Inference, Reasoner};
use crate::search::SearchIndex;
use crate::web::{WebAgent, WebContext};
use kultura_core::{Document, DocumentMeta};
use serde::{Deserialize, Serialize};

const DEFAULT_TOP_K: usize = 10;

/// Where a context document came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    KnowledgeBase,
    Web,
}

/// Per-query knobs, deserialized straight from the request body.
#[derive(Clone, Debug, Deserialize)]
pub struct QueryOptions {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub use_reasoning: bool,
    #[serde(default = "default_true")]
    pub use_llm: bool,
    #[serde(default)]
    pub score_threshold: f32,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            use_reasoning: true,
            use_llm: true,
            score_threshold: 0.0,
        }
    }
}

/// Citation-ready view of a context document.
#[derive(Clone, Debug, Serialize)]
pub struct SourceDoc {
    pub id: String,
    pub name: String,
    pub culture: String,
    pub category: String,
    pub score: f32,
    pub origin: ContextSource,
}

impl SourceDoc {
    fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.metadata.name.clone(),
            culture: doc.metadata.culture.clone(),
            category: doc.metadata.category.clone(),
            score: doc.score,
            origin: ContextSource::KnowledgeBase,
        }
    }

    fn from_web(ctx: &WebContext) -> Self {
        Self {
            id: ctx.url.clone(),
            name: ctx.title.clone(),
            culture: String::new(),
            category: "web".to_string(),
            score: 0.0,
            origin: ContextSource::Web,
        }
    }
}

/// Everything a query produces.
#[derive(Clone, Debug, Serialize)]
pub struct QueryOutcome {
    pub response: String,
    pub sources: Vec<SourceDoc>,
    pub reasoning: Vec<Inference>,
    pub web_enriched: bool,
}

/// Orchestrates one query end to end.
pub struct RagPipeline {
    index: SearchIndex,
    reasoner: Reasoner,
    llm: LlmClient,
    web: WebAgent,
}

impl RagPipeline {
    pub fn new(index: SearchIndex, reasoner: Reasoner, llm: LlmClient, web: WebAgent) -> Self {
        Self {
            index,
            reasoner,
            llm,
            web,
        }
    }

    pub fn document_count(&self) -> usize {
        self.index.len()
    }

    /// Retrieval only, for the search endpoint.
    pub fn search(&self, query: &str, top_k: usize, score_threshold: f32) -> Vec<Document> {
        self.index.search(query, top_k, score_threshold)
    }

    /// Runs the full pipeline for one query.
    pub async fn query(&self, query: &str, options: &QueryOptions) -> QueryOutcome {
        // With the LLM filter on, retrieve a wider candidate pool for it to
        // narrow back down to top_k.
        let pool = if options.use_llm {
            options.top_k.saturating_mul(2)
        } else {
            options.top_k
        };
        let retrieved = self.index.search(query, pool, options.score_threshold);

        let mut context = if options.use_llm && retrieved.len() > options.top_k {
            self.llm
                .filter_relevant(query, retrieved, options.top_k)
                .await
        } else {
            retrieved
        };

        let reasoning = if options.use_reasoning {
            self.reasoner.infer(query)
        } else {
            Vec::new()
        };

        let web_context = match context.first() {
            Some(top) => self.web.wikipedia_summary(&top.metadata.name).await,
            None => self.web.wikipedia_summary(query).await,
        };
        let web_enriched = web_context.is_some();

        let mut sources: Vec<SourceDoc> = context.iter().map(SourceDoc::from_document).collect();
        if let Some(ctx) = &web_context {
            sources.push(SourceDoc::from_web(ctx));
            context.push(web_document(ctx));
        }

        let response = if options.use_llm {
            self.llm.generate(query, &context).await
        } else {
            grounded_summary(&context)
        };

        QueryOutcome {
            response,
            sources,
            reasoning,
            web_enriched,
        }
    }
}

fn web_document(ctx: &WebContext) -> Document {
    Document {
        id: ctx.url.clone(),
        text: ctx.summary.clone(),
        doc_type: "web".to_string(),
        metadata: DocumentMeta {
            name: ctx.title.clone(),
            culture: String::new(),
            category: "web".to_string(),
        },
        score: 0.0,
    }
}

/// Deterministic answer used when LLM generation is disabled.
fn grounded_summary(context: &[Document]) -> String {
    let Some(primary) = context.first() else {
        return "I don't have information about that in the cultural knowledge base.".to_string();
    };
    let mut out = format!("**{}**\n\n{}", primary.metadata.name, primary.text);
    if !primary.metadata.culture.is_empty() {
        out.push_str(&format!("\n\nCulture: {}", primary.metadata.culture));
    }
    out
}

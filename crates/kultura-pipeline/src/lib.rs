//! kultura-pipeline: the retrieval-augmented generation pipeline behind the
//! KulturaMind gateway. Sequences retrieval, LLM relevance filtering,
//! fixed-predicate reasoning, and web enrichment into one grounded answer.

mod error;
mod llm;
mod pipeline;
mod reasoning;
mod search;
mod web;

pub use error::PipelineError;
pub use llm::{LlmClient, LlmMode};
pub use pipeline::{ContextSource, QueryOptions, QueryOutcome, RagPipeline, SourceDoc};
pub use reasoning::{Inference, Reasoner};
pub use search::SearchIndex;
pub use web::{WebAgent, WebContext};

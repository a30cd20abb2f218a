//! LLM client for the ASI Cloud chat-completions endpoint (OpenAI-compatible),
//! with a deterministic mock mode for tests and air-gapped deployments.

use crate::error::PipelineError;
use kultura_core::{Document, KulturaConfig};
use serde::Deserialize;
use std::time::Duration;

const LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "You are an expert in African cultural heritage with comprehensive \
knowledge of cultures across Africa including West Africa (Yoruba, Igbo, Hausa, Edo, Fulani, \
Ijaw, Kanuri, Tiv, Efik, Ibibio, Akan), East Africa (Maasai, Amhara), Southern Africa (Zulu, \
Xhosa), and North Africa (Berber).\n\n\
RESPONSE STYLE:\n\
- Start responses immediately with the actual information requested\n\
- Use a direct, encyclopedic tone similar to Wikipedia or academic sources\n\
- Do NOT use preambles, filler phrases, or meta-commentary about your knowledge\n\
- If information is limited, simply provide what is available without explaining the limitation\n\n\
CONTENT REQUIREMENTS:\n\
1. Ground responses in the provided context documents and knowledge base\n\
2. Explain cultural significance, historical context, and contemporary relevance\n\
3. Preserve and celebrate African cultural knowledge with respect and accuracy\n\
4. Cite specific cultural items from the context when answering questions";

/// Mode for LLM invocation: mock (deterministic, offline) or live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "live" => LlmMode::Live,
            _ => LlmMode::Mock,
        }
    }
}

/// Chat-completions client. Live mode posts to `{base_url}/chat/completions`
/// with bearer auth; every upstream failure degrades to a grounded fallback
/// built from the retrieval context, never an error surfaced to the caller.
pub struct LlmClient {
    mode: LlmMode,
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl LlmClient {
    pub fn from_config(cfg: &KulturaConfig) -> Self {
        Self {
            mode: LlmMode::parse(&cfg.llm_mode),
            http: reqwest::Client::builder()
                .timeout(LLM_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: cfg.llm_base_url.trim_end_matches('/').to_string(),
            model: cfg.llm_model.clone(),
            api_key: cfg.llm_api_key.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    /// Deterministic client for tests.
    pub fn mock() -> Self {
        Self {
            mode: LlmMode::Mock,
            http: reqwest::Client::new(),
            base_url: String::new(),
            model: "mock".into(),
            api_key: None,
            max_tokens: 800,
        }
    }

    /// Generates an answer grounded in `context`. Upstream failures fall back
    /// to a deterministic context-derived answer.
    pub async fn generate(&self, query: &str, context: &[Document]) -> String {
        match self.mode {
            LlmMode::Mock => fallback_response(query, context),
            LlmMode::Live => match self.complete(query, context).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "chat completion failed, using fallback");
                    fallback_response(query, context)
                }
            },
        }
    }

    async fn complete(&self, query: &str, context: &[Document]) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user",
                  "content": format!("Context:\n{}\n\nQuestion: {}", format_context(context), query) },
            ],
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": self.max_tokens,
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: CompletionResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::Payload("completion had no choices".into()))
    }

    /// Asks the LLM which documents are pertinent to the query and keeps
    /// those, bounded by `top_k`. Any failure (or mock mode) falls back to
    /// the first `top_k` documents unchanged.
    pub async fn filter_relevant(
        &self,
        query: &str,
        mut documents: Vec<Document>,
        top_k: usize,
    ) -> Vec<Document> {
        if self.mode == LlmMode::Mock || documents.len() <= top_k {
            documents.truncate(top_k);
            return documents;
        }

        let listing = documents
            .iter()
            .map(|d| {
                format!(
                    "- {}: {}",
                    d.metadata.name,
                    d.text.chars().take(100).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Given this query: \"{query}\"\n\nWhich of these cultural items are most relevant? \
             Return only the names of the top {top_k} most relevant items, one per line.\n\n\
             Items:\n{listing}"
        );
        let probe = Document {
            id: "relevance-filter".into(),
            text: prompt,
            doc_type: "instruction".into(),
            metadata: Default::default(),
            score: 0.0,
        };

        match self.complete(query, &[probe]).await {
            Ok(answer) => {
                let wanted: Vec<String> = answer
                    .lines()
                    .map(|l| l.trim().trim_start_matches('-').trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect();
                let mut kept: Vec<Document> = documents
                    .iter()
                    .filter(|d| wanted.contains(&d.metadata.name.to_lowercase()))
                    .cloned()
                    .collect();
                for doc in documents {
                    if kept.len() >= top_k {
                        break;
                    }
                    if !kept.iter().any(|k| k.id == doc.id) {
                        kept.push(doc);
                    }
                }
                kept.truncate(top_k);
                kept
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM relevance filter failed, keeping top_k");
                documents.truncate(top_k);
                documents
            }
        }
    }
}

/// Numbered context block for the user message.
fn format_context(context: &[Document]) -> String {
    if context.is_empty() {
        return "No context available.".to_string();
    }
    context
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "{}. [{}] {}\n   {}\n   Culture: {}",
                i + 1,
                doc.doc_type.to_uppercase(),
                if doc.metadata.name.is_empty() { "Unknown" } else { &doc.metadata.name },
                doc.text,
                if doc.metadata.culture.is_empty() { "Unknown" } else { &doc.metadata.culture },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic answer assembled from the top context document. Used by
/// mock mode and as the degraded path when the upstream API fails.
fn fallback_response(_query: &str, context: &[Document]) -> String {
    let Some(primary) = context.first() else {
        return "I don't have information about that in the cultural knowledge base.".to_string();
    };

    let name = if primary.metadata.name.is_empty() {
        "Cultural Item"
    } else {
        &primary.metadata.name
    };
    let culture = if primary.metadata.culture.is_empty() {
        "Unknown"
    } else {
        &primary.metadata.culture
    };
    let kind = primary.doc_type.replace('_', " ");

    let mut response = format!(
        "**{}**\n\nCulture: {}\nType: {}\n\n{}\n",
        name, culture, kind, primary.text
    );
    if context.len() > 1 {
        let related: Vec<&str> = context[1..]
            .iter()
            .take(3)
            .map(|c| c.metadata.name.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        if !related.is_empty() {
            response.push_str(&format!("\nRelated cultural items: {}", related.join(", ")));
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use kultura_core::DocumentMeta;

    fn doc(name: &str, culture: &str, text: &str) -> Document {
        Document {
            id: name.to_lowercase().replace(' ', "-"),
            text: text.into(),
            doc_type: "festival".into(),
            metadata: DocumentMeta {
                name: name.into(),
                culture: culture.into(),
                category: "festival".into(),
            },
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn mock_generate_grounds_in_top_context() {
        let llm = LlmClient::mock();
        let context = vec![
            doc("Eyo Festival", "Yoruba", "Masquerade procession in Lagos"),
            doc("Adire", "Yoruba", "Indigo resist-dyed cloth"),
        ];
        let answer = llm.generate("What is the Eyo festival?", &context).await;
        assert!(answer.contains("Eyo Festival"));
        assert!(answer.contains("Yoruba"));
        assert!(answer.contains("Adire"));
    }

    #[tokio::test]
    async fn mock_generate_degrades_for_empty_context() {
        let llm = LlmClient::mock();
        let answer = llm.generate("Anything", &[]).await;
        assert!(answer.contains("don't have information"));
    }

    #[tokio::test]
    async fn mock_filter_keeps_first_top_k() {
        let llm = LlmClient::mock();
        let docs = vec![
            doc("A", "Yoruba", "first"),
            doc("B", "Hausa", "second"),
            doc("C", "Zulu", "third"),
        ];
        let kept = llm.filter_relevant("query", docs, 2).await;
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].metadata.name, "A");
    }

    #[test]
    fn context_formatting_numbers_documents() {
        let block = format_context(&[doc("Eyo Festival", "Yoruba", "Procession")]);
        assert!(block.starts_with("1. [FESTIVAL] Eyo Festival"));
        assert!(block.contains("Culture: Yoruba"));
        assert_eq!(format_context(&[]), "No context available.");
    }
}

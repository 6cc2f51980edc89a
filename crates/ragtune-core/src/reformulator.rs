//! [`Reformulator`]: given a query, produces zero or more query variants.
//!
//! JSON extraction tolerates ```` ```json ```` / ```` ``` ```` code fences
//! wrapped around the model's actual answer, since LLMs reliably add them
//! even when told not to.

use crate::context::RagtuneContext;
use crate::error::CoreError;
use crate::util::jaccard_similarity;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Contract: fallible, but a well-behaved implementation never actually
/// raises past the Controller — parse failures and transport errors are
/// caught internally and reported as an empty sequence (see
/// [`JsonReformulator::generate`]). The `Result` exists for implementations
/// that can't make that guarantee.
#[async_trait::async_trait]
pub trait Reformulator: Send + Sync {
    async fn generate(&self, context: &RagtuneContext) -> Result<Vec<String>, CoreError>;
}

/// Minimal LLM text-completion boundary. A real binary wires this to a
/// concrete provider client; the core only needs a single `complete` call.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

/// Strips a leading ```` ```json ```` or ```` ``` ```` fence (and everything
/// after the matching closing fence) from LLM output, falling back to the
/// trimmed input untouched if no fence is present.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    trimmed
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops the original query (exact match, whitespace-normalized), empty
/// strings, and near-duplicates (case-folded Jaccard similarity > 0.8),
/// preserving first-occurrence order.
fn clean_variants(raw: Vec<String>, original_query: &str) -> Vec<String> {
    let normalized_original = normalize_whitespace(original_query);
    let mut kept: Vec<String> = Vec::new();
    for candidate in raw {
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() {
            continue;
        }
        if normalize_whitespace(&candidate) == normalized_original {
            continue;
        }
        let is_near_dup = kept
            .iter()
            .any(|existing| jaccard_similarity(existing, &candidate) > 0.8);
        if is_near_dup {
            continue;
        }
        kept.push(candidate);
    }
    kept
}

/// Size-bounded, LRU-evicting memo of `query -> variants`. Concurrency-safe
/// (guarded by an internal mutex); never participates in request budget
/// accounting — a cache hit costs nothing.
pub struct ReformulationMemo {
    capacity: usize,
    inner: Mutex<MemoInner>,
}

struct MemoInner {
    map: HashMap<String, Vec<String>>,
    order: VecDeque<String>,
}

impl ReformulationMemo {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(MemoInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, query: &str) -> Option<Vec<String>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(variants) = inner.map.get(query).cloned() {
            inner.order.retain(|k| k != query);
            inner.order.push_back(query.to_string());
            Some(variants)
        } else {
            None
        }
    }

    pub fn insert(&self, query: String, variants: Vec<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.map.contains_key(&query) && inner.map.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.map.remove(&oldest);
        }
        inner.order.retain(|k| k != &query);
        inner.order.push_back(query.clone());
        inner.map.insert(query, variants);
    }
}

/// LLM-backed Reformulator: prompts for a JSON array of query rewrites,
/// tolerates code-fenced/conversational output, memoizes identical queries.
pub struct JsonReformulator {
    client: std::sync::Arc<dyn LlmClient>,
    memo: Option<std::sync::Arc<ReformulationMemo>>,
}

impl JsonReformulator {
    pub fn new(client: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { client, memo: None }
    }

    pub fn with_memo(mut self, memo: std::sync::Arc<ReformulationMemo>) -> Self {
        self.memo = Some(memo);
        self
    }

    fn prompt_for(&self, query: &str) -> String {
        format!(
            "Rewrite the following search query into alternative phrasings. \
             Respond with a JSON array of strings only.\n\nQuery: {query}"
        )
    }
}

#[async_trait::async_trait]
impl Reformulator for JsonReformulator {
    async fn generate(&self, context: &RagtuneContext) -> Result<Vec<String>, CoreError> {
        if let Some(memo) = &self.memo
            && let Some(cached) = memo.get(context.query())
        {
            return Ok(cached);
        }

        let raw = match self.client.complete(&self.prompt_for(context.query())).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "reformulator transport error, returning empty sequence");
                return Ok(Vec::new());
            }
        };

        let json_slice = extract_json(&raw);
        let parsed: Vec<String> = match serde_json::from_str(json_slice) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "reformulator JSON parse error, returning empty sequence");
                return Ok(Vec::new());
            }
        };

        let variants = clean_variants(parsed, context.query());

        if let Some(memo) = &self.memo {
            memo.insert(context.query().to_string(), variants.clone());
        }

        Ok(variants)
    }
}

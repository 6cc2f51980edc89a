//! [`Assembler`]: adapter boundary; selects a final token-bounded
//! subsequence.
//!
//! A greedy water-filling admission loop with per-item trim and a total
//! token cap, driven by a pluggable [`TokenCounter`].

use crate::context::RagtuneContext;
use crate::doc::ScoredDocument;
use crate::pool::PoolItem;
use std::sync::Arc;

/// Token budget for one assembly pass.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_total: usize,
    pub per_doc_max: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_total: 4096,
            per_doc_max: 1024,
        }
    }
}

/// Pluggable token-counting strategy, so a real tokenizer can replace the
/// approximate default without changing the assembly algorithm.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Approximates token count as `ceil(chars / 4)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxCharTokenizer;

impl TokenCounter for ApproxCharTokenizer {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

fn trim_text_to_tokens(text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> String {
    if counter.count(text) <= max_tokens {
        return text.to_string();
    }
    let approx_chars = max_tokens * 4;
    let mut truncated: String = text.chars().take(approx_chars).collect();
    while counter.count(&truncated) > max_tokens && !truncated.is_empty() {
        truncated.pop();
    }
    truncated
}

/// Contract: no explicit fallibility — an Assembler always returns a (possibly
/// empty) ordered list, it never fails the request.
#[async_trait::async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(
        &self,
        items: Vec<PoolItem>,
        context: &RagtuneContext,
        remaining_tokens: f64,
    ) -> Vec<ScoredDocument>;
}

/// The core's reference Assembler. `items` is expected to already be sorted
/// (the Controller passes `CandidatePool::get_active_items()`, which is
/// sorted by the documented key); this assembler only trims and admits under
/// budget, it does not re-sort.
pub struct GreedyTokenAssembler {
    pub budget: TokenBudget,
    pub counter: Arc<dyn TokenCounter>,
}

impl GreedyTokenAssembler {
    pub fn new(budget: TokenBudget) -> Self {
        Self {
            budget,
            counter: Arc::new(ApproxCharTokenizer),
        }
    }
}

#[async_trait::async_trait]
impl Assembler for GreedyTokenAssembler {
    async fn assemble(
        &self,
        items: Vec<PoolItem>,
        _context: &RagtuneContext,
        remaining_tokens: f64,
    ) -> Vec<ScoredDocument> {
        let total_cap = (self.budget.max_total as f64).min(remaining_tokens.max(0.0)) as usize;
        let mut used = 0usize;
        let mut admitted = Vec::new();

        for item in items {
            if used >= total_cap {
                break;
            }
            let remaining_total = total_cap - used;
            let per_item_cap = self.budget.per_doc_max.min(remaining_total);
            let trimmed = trim_text_to_tokens(&item.content, per_item_cap, self.counter.as_ref());
            let cost = self.counter.count(&trimmed);
            if cost == 0 {
                continue;
            }
            used += cost;
            let mut doc = item.to_scored_document();
            doc.content = trimmed;
            admitted.push(doc);
        }

        admitted
    }
}

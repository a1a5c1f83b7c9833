//! Process-lifetime in-memory vector store.
//!
//! Readers take a lock-free snapshot of the item list; writers publish a new
//! list with `ArcSwap::rcu`, so a search never observes a half-applied write.
//! Nothing is persisted and nothing is evicted: the store grows until the
//! process exits.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Where an embedded item came from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum SourceType {
    Rule,
    Conversation,
}

/// An embedded piece of text, immutable once stored
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub source_type: SourceType,
    /// NPC the item belongs to; retrieval never crosses owners
    pub owner_key: String,
    /// Session the item was recorded in, if any
    pub group_key: Option<String>,
}

/// Search hit with its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: Arc<EmbeddedItem>,
    pub similarity: f32,
}

/// Cosine similarity with a small epsilon in the denominator so zero vectors
/// score 0 instead of NaN. Vectors of different length, or holding
/// non-finite values, score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let similarity = dot / (norm_a * norm_b + 1e-8);
    if similarity.is_nan() { 0.0 } else { similarity }
}

#[derive(Default)]
pub struct VectorStore {
    items: ArcSwap<Vec<Arc<EmbeddedItem>>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one item. No dedup, no dimension check.
    pub fn add(&self, item: EmbeddedItem) {
        let item = Arc::new(item);
        self.items.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&item));
            next
        });
        metrics::gauge!("vector_store_items").set(self.len() as f64);
    }

    /// Append a batch under a single snapshot swap
    pub fn extend(&self, items: impl IntoIterator<Item = EmbeddedItem>) {
        let batch: Vec<Arc<EmbeddedItem>> = items.into_iter().map(Arc::new).collect();
        if batch.is_empty() {
            return;
        }
        self.items.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + batch.len());
            next.extend(current.iter().cloned());
            next.extend(batch.iter().cloned());
            next
        });
        metrics::gauge!("vector_store_items").set(self.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `top_k` items by descending similarity; ties keep insertion order
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<Arc<EmbeddedItem>> {
        self.search_where(query, top_k, |_| true)
    }

    /// Like [`search`](Self::search), ranking only items accepted by `filter`
    pub fn search_where<F>(&self, query: &[f32], top_k: usize, filter: F) -> Vec<Arc<EmbeddedItem>>
    where
        F: Fn(&EmbeddedItem) -> bool,
    {
        self.search_scored_where(query, top_k, filter)
            .into_iter()
            .map(|scored| scored.item)
            .collect()
    }

    pub fn search_scored_where<F>(&self, query: &[f32], top_k: usize, filter: F) -> Vec<ScoredItem>
    where
        F: Fn(&EmbeddedItem) -> bool,
    {
        if top_k == 0 {
            return Vec::new();
        }

        let snapshot = self.items.load();
        let mut results: Vec<ScoredItem> = snapshot
            .iter()
            .filter(|item| filter(item))
            .map(|item| ScoredItem {
                similarity: cosine_similarity(query, &item.vector),
                item: Arc::clone(item),
            })
            .collect();

        // sort_by is stable, so equal scores stay in insertion order
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(top_k);
        results
    }
}

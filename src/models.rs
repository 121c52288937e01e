//! Core data models used throughout docchat.
//!
//! These types represent the pages, passages, answers, and evaluation
//! records that flow through the indexing and retrieval pipeline.

use serde::Serialize;

/// One page of extracted document text, as produced by the loader.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub text: String,
    /// 1-based page number within the source document.
    pub page_number: usize,
}

/// A contiguous slice of document text — the atomic retrieval unit.
///
/// Passages are immutable once created. `seq` is zero-based and strictly
/// increasing in document order; the evaluator's strided sampling relies
/// on that ordering.
#[derive(Debug, Clone)]
pub struct Passage {
    pub text: String,
    /// Page the passage originates from.
    pub page: usize,
    /// Zero-based position within the document's passage sequence.
    pub seq: usize,
}

/// A retrieved passage with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Provenance entry returned alongside a generated answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub content: String,
    pub page: usize,
}

/// A generated answer plus the passages it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Summary returned after a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub num_chunks: usize,
    pub strategy: String,
}

/// A synthetic query paired with the passage it was derived from.
#[derive(Debug, Clone)]
pub struct EvalSample {
    pub query_text: String,
    pub source: Passage,
}

/// Per-query evaluation record.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    /// Query text truncated to 80 chars (ellipsis when cut).
    pub question: String,
    pub hit: bool,
    pub first_relevant_rank: Option<usize>,
    pub num_chunks_retrieved: usize,
}

/// Aggregated retrieval-quality metrics. Recomputed fresh on every
/// evaluation call, never cached.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalResult {
    pub hit_rate: f64,
    pub mrr: f64,
    pub total_queries: usize,
    pub hits: usize,
    pub details: Vec<QueryRecord>,
}

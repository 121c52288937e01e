//! Self-supervised retrieval evaluation.
//!
//! Measures retrieval quality without external labels by generating
//! queries from the indexed passages themselves: sample passages evenly
//! through the document, use each one's opening text as a synthetic
//! query, and check whether retrieval brings back the source passage
//! (or one sharing enough vocabulary with it).
//!
//! Metrics:
//! - **Hit Rate** — fraction of queries with a relevant passage in the
//!   top-k results.
//! - **MRR** — mean of `1/rank` of the first relevant passage, `0` for
//!   misses.
//!
//! No language model is involved; only the vector index is exercised.

use std::collections::HashSet;

use crate::config::EvaluationConfig;
use crate::embedding::EmbeddingBackend;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{EvalResult, EvalSample, Passage, QueryRecord};

/// Characters of a passage's opening used as the synthetic query.
const QUERY_PREFIX_CHARS: usize = 100;
/// Detail records truncate the query text to this many characters.
const DETAIL_QUERY_CHARS: usize = 80;

/// Generate evaluation samples from the passage sequence.
///
/// Picks up to `num_samples` passages at an even stride
/// (`max(1, len / num_samples)`), then drops any whose trimmed text is
/// shorter than `min_chars`. Skipped passages are not replaced, so the
/// result may hold fewer than `num_samples` entries — deliberately so;
/// the caller reports however many queries actually ran. Sampling is
/// fully deterministic for a given passage sequence.
pub fn generate_samples(
    passages: &[Passage],
    num_samples: usize,
    min_chars: usize,
) -> Vec<EvalSample> {
    if passages.is_empty() || num_samples == 0 {
        return Vec::new();
    }

    let stride = std::cmp::max(1, passages.len() / num_samples);

    passages
        .iter()
        .step_by(stride)
        .take(num_samples)
        .filter_map(|passage| {
            let text = passage.text.trim();
            if text.chars().count() < min_chars {
                return None;
            }
            let query_text: String = text.chars().take(QUERY_PREFIX_CHARS).collect();
            Some(EvalSample {
                query_text: query_text.trim().to_string(),
                source: passage.clone(),
            })
        })
        .collect()
}

/// Word-overlap ratio between a source passage and a retrieved one:
/// `|words(source) ∩ words(retrieved)| / |words(source)|` over
/// lower-cased whitespace-tokenized word sets. Returns `0.0` when the
/// source has no words.
pub fn word_overlap(source_text: &str, retrieved_text: &str) -> f64 {
    let source_words: HashSet<String> = source_text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    if source_words.is_empty() {
        return 0.0;
    }

    let retrieved_words: HashSet<String> = retrieved_text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    let overlap = source_words.intersection(&retrieved_words).count();
    overlap as f64 / source_words.len() as f64
}

/// Run the evaluation against an already-built index.
///
/// For each synthetic query, retrieves the top-`k` passages and marks a
/// hit at the first rank whose word overlap with the *source* passage
/// meets the configured threshold; later qualifying ranks are ignored.
/// Zero samples (empty document, or every passage too short) yields an
/// [`EvalResult`] with `total_queries = 0` and zero metrics — a valid
/// terminal state, not an error.
pub async fn evaluate(
    index: &VectorIndex,
    backend: &dyn EmbeddingBackend,
    k: usize,
    config: &EvaluationConfig,
) -> Result<EvalResult> {
    let samples = generate_samples(index.passages(), config.num_samples, config.min_passage_chars);

    if samples.is_empty() {
        return Ok(EvalResult::default());
    }

    let mut result = EvalResult {
        total_queries: samples.len(),
        ..EvalResult::default()
    };
    let mut reciprocal_ranks = Vec::with_capacity(samples.len());

    for sample in &samples {
        let retrieved = index.retrieve(backend, &sample.query_text, k).await?;

        let mut first_relevant_rank = None;
        for (rank, scored) in retrieved.iter().enumerate() {
            let overlap = word_overlap(&sample.source.text, &scored.passage.text);
            if overlap >= config.overlap_threshold {
                first_relevant_rank = Some(rank + 1);
                break;
            }
        }

        match first_relevant_rank {
            Some(rank) => {
                result.hits += 1;
                reciprocal_ranks.push(1.0 / rank as f64);
            }
            None => reciprocal_ranks.push(0.0),
        }

        result.details.push(QueryRecord {
            question: truncate_query(&sample.query_text),
            hit: first_relevant_rank.is_some(),
            first_relevant_rank,
            num_chunks_retrieved: retrieved.len(),
        });
    }

    result.hit_rate = result.hits as f64 / result.total_queries as f64;
    result.mrr = reciprocal_ranks.iter().sum::<f64>() / result.total_queries as f64;

    Ok(result)
}

fn truncate_query(query: &str) -> String {
    if query.chars().count() <= DETAIL_QUERY_CHARS {
        return query.to_string();
    }
    let truncated: String = query.chars().take(DETAIL_QUERY_CHARS).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn passage(text: &str, seq: usize) -> Passage {
        Passage {
            text: text.to_string(),
            page: 1,
            seq,
        }
    }

    fn distinct_passages(n: usize) -> Vec<Passage> {
        // Distinct vocabulary per passage so retrieval is unambiguous
        let topics = [
            "astronomy telescopes planets orbits galaxies nebulae comets",
            "cooking recipes flavors seasoning braising roasting simmering",
            "economics inflation markets currencies tariffs deficits trade",
            "genetics chromosomes alleles mutation heredity genomes proteins",
            "mountaineering summits glaciers crampons altitude ascents ridges",
            "jazz improvisation saxophone trumpet harmony syncopation swing",
            "sailing rigging spinnaker tacking leeward regatta moorings",
            "ceramics glazing kilns porcelain earthenware firing slipware",
        ];
        (0..n)
            .map(|i| {
                passage(
                    &format!("Passage about {} number {}", topics[i % topics.len()], i),
                    i,
                )
            })
            .collect()
    }

    #[test]
    fn test_sampling_stride() {
        let passages = distinct_passages(10);
        let samples = generate_samples(&passages, 5, 20);
        // stride = 10 / 5 = 2 → seq 0, 2, 4, 6, 8
        assert_eq!(samples.len(), 5);
        let seqs: Vec<usize> = samples.iter().map(|s| s.source.seq).collect();
        assert_eq!(seqs, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_sampling_deterministic() {
        let passages = distinct_passages(17);
        let a = generate_samples(&passages, 5, 20);
        let b = generate_samples(&passages, 5, 20);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.query_text, y.query_text);
            assert_eq!(x.source.seq, y.source.seq);
        }
    }

    #[test]
    fn test_sampling_fewer_passages_than_samples() {
        let passages = distinct_passages(3);
        let samples = generate_samples(&passages, 5, 20);
        // stride = max(1, 3/5) = 1 → all three
        assert_eq!(samples.len(), 3);
    }

    #[test]
    fn test_sampling_skips_short_passages_without_replacement() {
        let passages = vec![
            passage("tiny", 0),
            passage("a long enough passage with plenty of characters", 1),
            passage("also", 2),
        ];
        let samples = generate_samples(&passages, 3, 20);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].source.seq, 1);
    }

    #[test]
    fn test_sampling_empty_input() {
        assert!(generate_samples(&[], 5, 20).is_empty());
    }

    #[test]
    fn test_query_is_passage_prefix() {
        let long_text = format!("leading words {}", "x".repeat(200));
        let passages = vec![passage(&long_text, 0)];
        let samples = generate_samples(&passages, 1, 20);
        assert_eq!(samples[0].query_text.chars().count(), 100);
        assert!(long_text.starts_with(&samples[0].query_text));
    }

    #[test]
    fn test_word_overlap_full() {
        let overlap = word_overlap("alpha beta gamma", "gamma beta alpha extra words");
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_partial() {
        let overlap = word_overlap("alpha beta gamma delta", "alpha beta unrelated");
        assert!((overlap - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_case_insensitive() {
        let overlap = word_overlap("Alpha BETA", "alpha beta");
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap_empty_source() {
        assert_eq!(word_overlap("", "anything"), 0.0);
    }

    #[test]
    fn test_truncate_query() {
        assert_eq!(truncate_query("short"), "short");
        let long = "q".repeat(100);
        let truncated = truncate_query(&long);
        assert_eq!(truncated.chars().count(), 83);
        assert!(truncated.ends_with("..."));
    }

    #[tokio::test]
    async fn test_evaluate_self_retrieval_scores_perfectly() {
        let backend = HashEmbedder::new(256);
        let passages = distinct_passages(10);
        let index = VectorIndex::build(passages, &backend).await.unwrap();

        let config = EvaluationConfig::default();
        let result = evaluate(&index, &backend, 4, &config).await.unwrap();

        assert_eq!(result.total_queries, 5);
        // Each query is its own source passage's full text (short passages),
        // so rank 1 hits across the board
        assert!((result.hit_rate - 1.0).abs() < 1e-9);
        assert!((result.mrr - 1.0).abs() < 1e-9);
        assert_eq!(result.hits, 5);
        assert_eq!(result.details.len(), 5);
        for record in &result.details {
            assert!(record.hit);
            assert_eq!(record.first_relevant_rank, Some(1));
            assert_eq!(record.num_chunks_retrieved, 4);
        }
    }

    #[tokio::test]
    async fn test_evaluate_all_passages_too_short() {
        let backend = HashEmbedder::new(64);
        let passages = vec![passage("tiny one", 0), passage("tiny two", 1)];
        let index = VectorIndex::build(passages, &backend).await.unwrap();

        let config = EvaluationConfig::default();
        let result = evaluate(&index, &backend, 4, &config).await.unwrap();

        assert_eq!(result.total_queries, 0);
        assert_eq!(result.hit_rate, 0.0);
        assert_eq!(result.mrr, 0.0);
        assert!(result.details.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_metrics_bounded() {
        let backend = HashEmbedder::new(128);
        let passages = distinct_passages(23);
        let index = VectorIndex::build(passages, &backend).await.unwrap();

        let config = EvaluationConfig::default();
        let result = evaluate(&index, &backend, 4, &config).await.unwrap();

        assert!(result.total_queries <= config.num_samples);
        assert!((0.0..=1.0).contains(&result.hit_rate));
        assert!((0.0..=1.0).contains(&result.mrr));
        assert!(result.mrr <= result.hit_rate + 1e-9);
    }
}

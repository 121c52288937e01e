//! Document segmentation strategies.
//!
//! Splits loaded pages into ordered [`Passage`]s under one of three
//! strategies:
//!
//! - `fixed` / `medium` — recursive boundary-aware splitting: break at
//!   paragraph boundaries first, then line breaks, then sentence-ending
//!   punctuation, then spaces, then an arbitrary character position,
//!   always choosing the largest separator that keeps chunks under the
//!   target size. Consecutive chunks share a configurable character
//!   overlap.
//! - `sentence` — split strictly at sentence boundaries, then pack
//!   consecutive sentences up to the target size without overlap.
//!
//! All sizes are measured in characters. Passages retain their source
//! page number and a zero-based sequence index in document order.

use std::fmt;
use std::str::FromStr;

use crate::config::ChunkingConfig;
use crate::error::Error;
use crate::models::{DocumentPage, Passage};

/// Separator hierarchy for the recursive splitter, largest first. Text
/// that exhausts the hierarchy is hard-split at character boundaries.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Chunking strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    Fixed,
    Medium,
    Sentence,
}

impl ChunkStrategy {
    /// Target chunk size in characters under the given configuration.
    pub fn target_size(&self, config: &ChunkingConfig) -> usize {
        match self {
            ChunkStrategy::Fixed | ChunkStrategy::Sentence => config.fixed_chunk_size,
            ChunkStrategy::Medium => config.medium_chunk_size,
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(ChunkStrategy::Fixed),
            "medium" => Ok(ChunkStrategy::Medium),
            "sentence" => Ok(ChunkStrategy::Sentence),
            other => Err(Error::InvalidArgument(format!(
                "Unknown chunking strategy: '{}'. Choose from: fixed, medium, sentence.",
                other
            ))),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkStrategy::Fixed => "fixed",
            ChunkStrategy::Medium => "medium",
            ChunkStrategy::Sentence => "sentence",
        };
        write!(f, "{}", name)
    }
}

/// Split document pages into an ordered passage sequence.
///
/// Sequence indices are contiguous and zero-based across the whole
/// document, not per page.
pub fn split_pages(
    pages: &[DocumentPage],
    strategy: ChunkStrategy,
    config: &ChunkingConfig,
) -> Vec<Passage> {
    let target = strategy.target_size(config);
    let mut passages = Vec::new();
    let mut seq = 0usize;

    for page in pages {
        let chunks = match strategy {
            ChunkStrategy::Fixed | ChunkStrategy::Medium => {
                split_recursive_with_overlap(&page.text, target, config.chunk_overlap)
            }
            ChunkStrategy::Sentence => split_sentences(&page.text, target),
        };

        for chunk in chunks {
            if chunk.trim().is_empty() {
                continue;
            }
            passages.push(Passage {
                text: chunk,
                page: page.page_number,
                seq,
            });
            seq += 1;
        }
    }

    passages
}

// ============ Recursive character splitting ============

/// Recursive split plus overlap: each chunk after the first is prefixed
/// with the trailing `overlap` characters of its predecessor.
fn split_recursive_with_overlap(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let base = split_by(text, target, &SEPARATORS);

    if overlap == 0 || base.len() < 2 {
        return base;
    }

    let mut out = Vec::with_capacity(base.len());
    for (i, chunk) in base.iter().enumerate() {
        if i == 0 {
            out.push(chunk.clone());
        } else {
            let tail = tail_chars(&base[i - 1], overlap);
            let mut with_overlap = String::with_capacity(tail.len() + chunk.len() + 1);
            with_overlap.push_str(tail);
            if !tail.ends_with(char::is_whitespace) {
                with_overlap.push(' ');
            }
            with_overlap.push_str(chunk);
            out.push(with_overlap);
        }
    }
    out
}

/// Split `text` into pieces of at most `target` characters, preferring
/// the earliest separator in `seps` that occurs in the text. Pieces that
/// still exceed the target recurse with the remaining, finer separators;
/// when none are left the text is hard-split at character boundaries.
fn split_by(text: &str, target: usize, seps: &[&str]) -> Vec<String> {
    if char_len(text) <= target {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let Some((sep, rest)) = seps.split_first() else {
        return hard_split(text, target);
    };

    if !text.contains(sep) {
        return split_by(text, target, rest);
    }

    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();

    for part in text.split(sep) {
        let pieces = if char_len(part) > target {
            // Flush before descending so order is preserved
            flush(&mut buf, &mut out);
            split_by(part, target, rest)
        } else {
            vec![part.to_string()]
        };

        for piece in pieces {
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                continue;
            }

            let joined_len = if buf.is_empty() {
                char_len(trimmed)
            } else {
                char_len(&buf) + char_len(sep) + char_len(trimmed)
            };

            if joined_len > target && !buf.is_empty() {
                flush(&mut buf, &mut out);
            }

            if !buf.is_empty() {
                buf.push_str(sep);
            }
            buf.push_str(trimmed);
        }
    }

    flush(&mut buf, &mut out);
    out
}

fn flush(buf: &mut String, out: &mut Vec<String>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

/// Last-resort split at character boundaries, preferring a space or
/// newline near the limit so words stay intact where possible.
fn hard_split(text: &str, target: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if char_len(remaining) <= target {
            let trimmed = remaining.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
            break;
        }

        let limit = byte_index_of_char(remaining, target);
        let split_at = remaining[..limit]
            .rfind('\n')
            .or_else(|| remaining[..limit].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }

    out
}

// ============ Sentence splitting ============

/// Split at sentence boundaries (`.`, `!`, `?` followed by whitespace),
/// then pack consecutive sentences into chunks of at most `target`
/// characters. No overlap. A single sentence over the target becomes its
/// own chunk rather than being broken mid-sentence.
fn split_sentences(text: &str, target: usize) -> Vec<String> {
    let sentences = sentence_boundaries(text);
    let mut out = Vec::new();
    let mut buf = String::new();

    for sentence in sentences {
        let joined_len = if buf.is_empty() {
            char_len(&sentence)
        } else {
            char_len(&buf) + 1 + char_len(&sentence)
        };

        if joined_len > target && !buf.is_empty() {
            out.push(std::mem::take(&mut buf));
        }

        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(&sentence);
    }

    if !buf.is_empty() {
        out.push(buf);
    }

    out
}

fn sentence_boundaries(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut prev: Option<char> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if matches!(prev, Some('.') | Some('!') | Some('?')) {
                let sentence = text[start..idx].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = idx;
            }
        }
        prev = Some(ch);
    }

    let last = text[start..].trim();
    if !last.is_empty() {
        sentences.push(last.to_string());
    }

    sentences
}

// ============ Char helpers ============

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `n`-th character, or the string length if shorter.
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// The last `n` characters of `s` as a subslice.
fn tail_chars(s: &str, n: usize) -> &str {
    let total = char_len(s);
    if total <= n {
        return s;
    }
    let (idx, _) = s
        .char_indices()
        .nth(total - n)
        .expect("index within char count");
    &s[idx..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> DocumentPage {
        DocumentPage {
            text: text.to_string(),
            page_number: 1,
        }
    }

    fn config() -> ChunkingConfig {
        ChunkingConfig::default()
    }

    #[test]
    fn test_unknown_strategy_names_valid_set() {
        let err = ChunkStrategy::from_str("banana").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("banana"));
        assert!(msg.contains("fixed"));
        assert!(msg.contains("medium"));
        assert!(msg.contains("sentence"));
    }

    #[test]
    fn test_strategy_roundtrip() {
        for name in ["fixed", "medium", "sentence"] {
            let strategy: ChunkStrategy = name.parse().unwrap();
            assert_eq!(strategy.to_string(), name);
        }
    }

    #[test]
    fn test_small_text_single_passage() {
        let passages = split_pages(&[page("Hello, world!")], ChunkStrategy::Fixed, &config());
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "Hello, world!");
        assert_eq!(passages[0].seq, 0);
        assert_eq!(passages[0].page, 1);
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        let passages = split_pages(&[page("   \n\n ")], ChunkStrategy::Fixed, &config());
        assert!(passages.is_empty());
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = "First paragraph with some words.\n\nSecond paragraph with more words.";
        let chunks = split_by(text, 40, &SEPARATORS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph with some words.");
        assert_eq!(chunks[1], "Second paragraph with more words.");
    }

    #[test]
    fn test_no_chunk_exceeds_target_plus_overlap() {
        let text = (0..60)
            .map(|i| format!("Sentence number {} padding padding padding.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let cfg = config();
        let chunks = split_recursive_with_overlap(&text, 100, cfg.chunk_overlap);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Overlap prefix plus joining space is the allowed tolerance
            assert!(
                char_len(chunk) <= 100 + cfg.chunk_overlap + 1,
                "chunk too long: {} chars",
                char_len(chunk)
            );
        }
    }

    #[test]
    fn test_reassembly_covers_original_words() {
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota kappa lambda.";
        let chunks = split_recursive_with_overlap(text, 25, 5);
        let rejoined = chunks.join(" ");
        for word in text.split_whitespace() {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
            assert!(rejoined.contains(bare), "missing word: {}", bare);
        }
    }

    #[test]
    fn test_chunk_count_monotonic_in_target_size() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} with a little padding.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut prev_count = 0;
        for target in [800, 400, 200, 100, 50] {
            let count = split_by(&text, target, &SEPARATORS).len();
            assert!(
                count >= prev_count,
                "count decreased from {} to {} at target {}",
                prev_count,
                count,
                target
            );
            prev_count = count;
        }
    }

    #[test]
    fn test_overlap_repeats_trailing_context() {
        let text = "one two three four five.\n\nsix seven eight nine ten.";
        let chunks = split_recursive_with_overlap(text, 26, 5);
        assert!(chunks.len() >= 2);
        // Second chunk starts with the tail of the first
        let tail = tail_chars("one two three four five.", 5);
        assert!(chunks[1].starts_with(tail.trim_start()));
    }

    #[test]
    fn test_hard_split_handles_unbroken_text() {
        let text = "x".repeat(1200);
        let chunks = split_by(&text, 500, &SEPARATORS);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 500);
        }
    }

    #[test]
    fn test_sentence_strategy_packs_sentences() {
        let text = "First sentence here. Second sentence here. Third sentence here. \
                    Fourth sentence here.";
        let chunks = split_sentences(text, 50);
        assert!(chunks.len() >= 2);
        // Every chunk ends on a sentence boundary
        for chunk in &chunks {
            assert!(chunk.ends_with('.'), "mid-sentence break: {:?}", chunk);
        }
    }

    #[test]
    fn test_sentence_strategy_keeps_long_sentence_whole() {
        let long = format!("{} end.", "word ".repeat(40));
        let chunks = split_sentences(&long, 50);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_seq_contiguous_across_pages() {
        let pages = vec![
            DocumentPage {
                text: "Page one text.\n\nMore page one.".to_string(),
                page_number: 1,
            },
            DocumentPage {
                text: "Page two text.".to_string(),
                page_number: 2,
            },
        ];
        let passages = split_pages(&pages, ChunkStrategy::Fixed, &config());
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.seq, i);
        }
        assert_eq!(passages.last().unwrap().page, 2);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta.";
        let a = split_pages(&[page(text)], ChunkStrategy::Fixed, &config());
        let b = split_pages(&[page(text)], ChunkStrategy::Fixed, &config());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.seq, y.seq);
        }
    }
}

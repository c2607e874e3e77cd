//! Recursive, overlap-aware text chunking.
//!
//! Text is cut at the coarsest boundary that yields pieces no longer than the
//! target size (paragraph, line, sentence, word, then a hard character cut).
//! Pieces are then packed greedily into chunks; after each emitted chunk the
//! window keeps a tail of at most `chunk_overlap` characters so that
//! neighbouring chunks share context. All sizes are in characters.

use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{Error, Result};

const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Split `text` into trimmed, non-empty chunk strings in document order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.spans(text).into_iter().map(|r| text[r].to_string()).collect()
    }

    /// Byte ranges of the chunks `split` would return.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.collect_pieces(text, 0..text.len(), 0, &mut pieces);
        self.merge(text, &pieces)
    }

    /// Cut `range` into contiguous pieces of at most `chunk_size` chars each.
    fn collect_pieces(&self, text: &str, range: Range<usize>, level: usize, out: &mut Vec<Range<usize>>) {
        if char_len(text, &range) <= self.chunk_size {
            out.push(range);
            return;
        }
        let Some(separators) = SEPARATORS.get(level) else {
            self.hard_cut(text, range, out);
            return;
        };
        let parts = split_keeping_separators(text, range.clone(), separators);
        if parts.len() == 1 {
            self.collect_pieces(text, range, level + 1, out);
            return;
        }
        for part in parts {
            self.collect_pieces(text, part, level + 1, out);
        }
    }

    /// Fixed-width cut for runs with no usable boundary. The width is chosen so
    /// an overlap-sized tail of whole pieces can be carried into the next chunk.
    fn hard_cut(&self, text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
        let width = if self.chunk_overlap == 0 {
            self.chunk_size
        } else {
            self.chunk_overlap.min(self.chunk_size - self.chunk_overlap).max(1)
        };
        let mut start = range.start;
        let mut count = 0;
        for (offset, _) in text[range.clone()].char_indices() {
            if count == width {
                out.push(start..range.start + offset);
                start = range.start + offset;
                count = 0;
            }
            count += 1;
        }
        if start < range.end {
            out.push(start..range.end);
        }
    }

    fn merge(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(text, piece);
            if !window.is_empty() && window_len + piece_len > self.chunk_size {
                push_trimmed(text, &window, &mut spans);
                while window_len > self.chunk_overlap
                    || (window_len > 0 && window_len + piece_len > self.chunk_size)
                {
                    let Some((_, len)) = window.pop_front() else { break };
                    window_len -= len;
                }
            }
            window.push_back((piece.clone(), piece_len));
            window_len += piece_len;
        }
        push_trimmed(text, &window, &mut spans);
        spans
    }
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

/// Split at every occurrence of any separator, keeping each separator on the
/// piece before it so the pieces tile `range` exactly.
fn split_keeping_separators(text: &str, range: Range<usize>, separators: &[&str]) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let mut parts = Vec::new();
    let mut start = 0;
    let mut cursor = 0;
    while cursor < slice.len() {
        let hit = separators
            .iter()
            .filter_map(|sep| slice[cursor..].find(sep).map(|pos| (cursor + pos, sep.len())))
            .min_by_key(|(pos, _)| *pos);
        let Some((pos, sep_len)) = hit else { break };
        let end = pos + sep_len;
        parts.push(range.start + start..range.start + end);
        start = end;
        cursor = end;
    }
    if start < slice.len() {
        parts.push(range.start + start..range.end);
    }
    parts
}

fn push_trimmed(text: &str, window: &VecDeque<(Range<usize>, usize)>, spans: &mut Vec<Range<usize>>) {
    let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
        return;
    };
    let raw = &text[first.start..last.end];
    let trimmed_start = raw.len() - raw.trim_start().len();
    let trimmed_end = raw.trim_end().len();
    if trimmed_start >= trimmed_end {
        return;
    }
    let span = first.start + trimmed_start..first.start + trimmed_end;
    // An overlap tail padded only by whitespace can trim down to text the
    // previous chunk already holds.
    if spans.last().is_some_and(|prev| prev.start <= span.start && span.end <= prev.end) {
        return;
    }
    spans.push(span);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split(" \n\n \t").is_empty());
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        assert_eq!(chunker.split("  Page 1 text\n"), vec!["Page 1 text"]);
    }

    #[test]
    fn paragraphs_are_preferred_over_sentences() {
        let chunker = RecursiveChunker::new(40, 0).unwrap();
        let text = "Rizal wrote novels. He was executed.\n\nBonifacio led the Katipunan.";
        let chunks = chunker.split(text);
        assert_eq!(chunks, vec!["Rizal wrote novels. He was executed.", "Bonifacio led the Katipunan."]);
    }

    #[test]
    fn long_sentence_falls_back_to_words() {
        let chunker = RecursiveChunker::new(12, 0).unwrap();
        let chunks = chunker.split("alpha bravo charlie delta echo");
        assert!(chunks.iter().all(|c| c.chars().count() <= 12), "{chunks:?}");
        assert_eq!(chunks.join(" "), "alpha bravo charlie delta echo");
    }

    #[test]
    fn unbroken_run_is_hard_cut_with_overlap() {
        let chunker = RecursiveChunker::new(10, 4).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(pair[1].starts_with(&tail), "{pair:?} should share a 4-char overlap");
        }
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn consecutive_word_chunks_overlap() {
        let chunker = RecursiveChunker::new(20, 8).unwrap();
        let chunks = chunker.split("one two three four five six seven eight nine ten");
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].starts_with(last_word), "{pair:?}");
        }
    }

    #[test]
    fn whitespace_padded_tail_does_not_repeat_previous_chunk() {
        let chunker = RecursiveChunker::new(10, 6).unwrap();
        let text = "aaaa bbbb   cccccccccc dd";
        let spans = chunker.spans(text);
        for pair in spans.windows(2) {
            assert!(pair[1].end > pair[0].end, "{:?} lies inside {:?}", &text[pair[1].clone()], &text[pair[0].clone()]);
        }
        let chunks = chunker.split(text);
        assert_eq!(chunks[0], "aaaa bbbb");
        assert!(!chunks.contains(&"bbbb".to_string()), "{chunks:?}");
    }

    #[test]
    fn sizes_count_characters_not_bytes() {
        let chunker = RecursiveChunker::new(5, 0).unwrap();
        let chunks = chunker.split("José Rizal");
        assert_eq!(chunks, vec!["José", "Rizal"]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(RecursiveChunker::new(0, 0).is_err());
        assert!(RecursiveChunker::new(10, 10).is_err());
    }
}

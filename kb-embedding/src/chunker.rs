//! Fixed-window text chunker, a deterministic port of `TextChunker` /
//! `_find_break_point`. Boundary search order is load-bearing: callers
//! (and the point assembly step) depend on identical chunk boundaries for
//! identical input.

pub const DEFAULT_CHUNK_SIZE: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
const BREAK_SEARCH_WINDOW: usize = 50;

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, chunk_overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        let chunk_overlap =
            if chunk_overlap >= chunk_size { DEFAULT_CHUNK_OVERLAP } else { chunk_overlap };
        Self { chunk_size, chunk_overlap }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into chunks by char offsets, preferring paragraph,
    /// then line, then sentence boundaries near each window edge.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let end = start + self.chunk_size;
            if end >= chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }

            let break_point = self.find_break_point(&chars, end);
            chunks.push(chars[start..break_point].iter().collect());

            start = break_point.saturating_sub(self.chunk_overlap);
        }

        chunks
    }

    fn find_break_point(&self, chars: &[char], position: usize) -> usize {
        let search_start = position.saturating_sub(BREAK_SEARCH_WINDOW);
        let window = &chars[search_start..position];

        if let Some(idx) = rfind_slice(window, &['\n', '\n']) {
            return search_start + idx + 2;
        }
        if let Some(idx) = rfind_char(window, '\n') {
            return search_start + idx + 1;
        }
        if let Some(idx) = rfind_slice(window, &['.', ' ']) {
            return search_start + idx + 2;
        }
        position
    }
}

fn rfind_char(window: &[char], needle: char) -> Option<usize> {
    window.iter().rposition(|&c| c == needle)
}

fn rfind_slice(window: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || window.len() < needle.len() {
        return None;
    }
    (0..=window.len() - needle.len()).rev().find(|&i| &window[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk_text("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(TextChunker::default().chunk_text("").is_empty());
    }

    #[test]
    fn prefers_paragraph_break_over_sentence_break() {
        let chunker = TextChunker::new(60, 10);
        let mut text = "a".repeat(40);
        text.push_str("\n\nsection two starts here and continues for a while longer than sixty.");
        let chunks = chunker.chunk_text(&text);
        assert!(chunks[0].ends_with("\n\n") || !chunks[0].contains("section two"));
    }

    #[test]
    fn falls_back_to_hard_cutoff_when_no_boundary_found() {
        let chunker = TextChunker::new(20, 5);
        let text = "x".repeat(100);
        let chunks = chunker.chunk_text(&text);
        assert_eq!(chunks[0].chars().count(), 20);
    }

    #[test]
    fn invalid_overlap_falls_back_to_default() {
        let chunker = TextChunker::new(100, 500);
        assert_eq!(chunker.chunk_overlap(), DEFAULT_CHUNK_OVERLAP);
    }

    #[test]
    fn chunks_cover_document_in_order_with_overlap() {
        let chunker = TextChunker::new(50, 10);
        let text = "Sentence one is here. Sentence two follows. Sentence three closes it out nicely.";
        let chunks = chunker.chunk_text(text);
        assert!(chunks.len() > 1);
        // Reassembling ignoring overlap should reproduce the original prefix order.
        assert!(text.starts_with(chunks[0].chars().take(10).collect::<String>().as_str()));
    }

    proptest! {
        /// Chunking the same text twice with the same chunker, or with two
        /// freshly constructed chunkers of identical parameters, always
        /// yields identical chunk boundaries (spec.md §4.4's "deterministic
        /// chunking" requirement).
        #[test]
        fn chunking_is_deterministic_for_any_text_and_parameters(
            text in ".{0,400}",
            chunk_size in 10usize..200,
            chunk_overlap in 0usize..9,
        ) {
            let chunker_a = TextChunker::new(chunk_size, chunk_overlap);
            let chunker_b = TextChunker::new(chunk_size, chunk_overlap);
            prop_assert_eq!(chunker_a.chunk_text(&text), chunker_b.chunk_text(&text));

            let chunker_a = TextChunker::new(chunk_size, chunk_overlap);
            prop_assert_eq!(chunker_a.chunk_text(&text).clone(), chunker_a.chunk_text(&text));
        }
    }
}

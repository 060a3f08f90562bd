//! Token-window text chunker.
//!
//! Cleans document text and splits it into [`Chunk`]s of at most
//! `chunk_size` tokens, where consecutive chunks share exactly
//! `chunk_overlap` tokens.
//!
//! # Algorithm
//!
//! 1. [`clean_text`]: normalise en/em dashes to `-`, drop everything outside
//!    printable ASCII, collapse every whitespace run (newlines included) into
//!    a single space, trim.
//! 2. Tokenize the cleaned text into contiguous byte spans with a
//!    [`Tokenizer`].
//! 3. Slide a window of `chunk_size` tokens over the spans, advancing by
//!    `chunk_size - chunk_overlap`, stopping once the window reaches the last
//!    token.
//! 4. Each window becomes the (trimmed) slice of cleaned text between its
//!    first and last token.
//!
//! # Example
//!
//! ```rust
//! use examprep::chunk::{Gpt2WordTokenizer, TextChunker};
//!
//! let tokenizer = Gpt2WordTokenizer::new().unwrap();
//! let chunker = TextChunker::new(Box::new(tokenizer), 512, 100).unwrap();
//! let chunks = chunker.split("Mitosis has four phases.\n\n\nProphase comes first.");
//! assert_eq!(chunks, vec!["Mitosis has four phases. Prophase comes first."]);
//! ```

use std::ops::Range;

use tracing::{debug, warn};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// GPT-2 pre-tokenization pattern: contractions, words, numbers and
/// punctuation runs each keep their leading space.
const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Normalise raw extracted text before chunking.
///
/// Idempotent: `clean_text(&clean_text(t)) == clean_text(t)`.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        let ch = match ch {
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        };
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(' '..='~').contains(&ch) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}

/// Splits text into ordered, contiguous token byte spans.
pub trait Tokenizer: Send + Sync {
    /// Identifier for logs and index manifests.
    fn name(&self) -> &str;

    /// Byte ranges of each token in `text`, in order.
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>>;

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.token_spans(text)?.len())
    }
}

/// Built-in tokenizer using GPT-2's pre-tokenization rules.
///
/// Each word, number or punctuation run (with its leading space) is one
/// token. This never undercounts relative to GPT-2 BPE by more than the
/// sub-word splits of long words, and needs no vocabulary file.
pub struct Gpt2WordTokenizer {
    pattern: fancy_regex::Regex,
}

impl Gpt2WordTokenizer {
    pub fn new() -> Result<Self> {
        let pattern = fancy_regex::Regex::new(GPT2_PATTERN)
            .map_err(|e| Error::Tokenizer(format!("invalid token pattern: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl Tokenizer for Gpt2WordTokenizer {
    fn name(&self) -> &str {
        "gpt2-words"
    }

    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let mut spans = Vec::new();
        for m in self.pattern.find_iter(text) {
            let m = m.map_err(|e| Error::Tokenizer(e.to_string()))?;
            spans.push(m.start()..m.end());
        }
        Ok(spans)
    }
}

/// Tokenizer backed by a Hugging Face `tokenizer.json` (e.g. GPT-2's).
#[cfg(feature = "hf-tokenizer")]
pub struct HuggingFaceTokenizer {
    inner: tokenizers::Tokenizer,
    name: String,
}

#[cfg(feature = "hf-tokenizer")]
impl HuggingFaceTokenizer {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(format!("failed to load {}: {}", path.display(), e))
        })?;
        Ok(Self {
            inner,
            name: format!("huggingface:{}", path.display()),
        })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HuggingFaceTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(encoding
            .get_offsets()
            .iter()
            .map(|&(start, end)| start..end)
            .collect())
    }
}

/// Build the tokenizer named by `chunking.tokenizer`.
pub fn create_tokenizer(config: &ChunkingConfig) -> Result<Box<dyn Tokenizer>> {
    match config.tokenizer.as_str() {
        "gpt2-words" => Ok(Box::new(Gpt2WordTokenizer::new()?)),
        #[cfg(feature = "hf-tokenizer")]
        "huggingface" => {
            let path = config.tokenizer_path.as_ref().ok_or_else(|| {
                Error::Config("chunking.tokenizer_path required for huggingface".to_string())
            })?;
            Ok(Box::new(HuggingFaceTokenizer::from_file(path)?))
        }
        #[cfg(not(feature = "hf-tokenizer"))]
        "huggingface" => Err(Error::Config(
            "huggingface tokenizer requires --features hf-tokenizer".to_string(),
        )),
        other => Err(Error::Config(format!("Unknown tokenizer: {}", other))),
    }
}

/// Cleans and splits text into overlapping token windows.
pub struct TextChunker {
    tokenizer: Box<dyn Tokenizer>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(
        tokenizer: Box<dyn Tokenizer>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        debug!(
            tokenizer = tokenizer.name(),
            chunk_size, chunk_overlap, "initialized text chunker"
        );
        Ok(Self {
            tokenizer,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(
            create_tokenizer(config)?,
            config.chunk_size,
            config.chunk_overlap,
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn clean(&self, text: &str) -> String {
        clean_text(text)
    }

    /// Clean and split `text`. Returns an empty list if tokenization fails.
    pub fn split(&self, text: &str) -> Vec<String> {
        match self.try_split(text) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "failed to split text, skipping");
                Vec::new()
            }
        }
    }

    /// Like [`split`](Self::split), but surfaces tokenizer failures.
    pub fn try_split(&self, text: &str) -> Result<Vec<String>> {
        let cleaned = clean_text(text);
        let spans = self.tokenizer.token_spans(&cleaned)?;

        let mut chunks = Vec::new();
        for window in self.token_windows(spans.len()) {
            let start = spans[window.start].start;
            let end = spans[window.end - 1].end;
            let piece = cleaned.get(start..end).ok_or_else(|| {
                Error::Tokenizer(format!("token span {}..{} is not a valid slice", start, end))
            })?;
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
        }

        debug!(chunks = chunks.len(), tokens = spans.len(), "split text");
        Ok(chunks)
    }

    /// Token index ranges covered by each chunk for a text of `n_tokens`.
    pub fn token_windows(&self, n_tokens: usize) -> Vec<Range<usize>> {
        let stride = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        while start < n_tokens {
            let end = (start + self.chunk_size).min(n_tokens);
            windows.push(start..end);
            if end == n_tokens {
                break;
            }
            start += stride;
        }
        windows
    }

    /// Split a document into [`Chunk`]s that remember their source.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.split(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                text,
                source: doc.source.clone(),
                chunk_index,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: [&str; 20] = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
        "juliet", "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo",
        "sierra", "tango",
    ];

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(Box::new(Gpt2WordTokenizer::new().unwrap()), size, overlap).unwrap()
    }

    #[test]
    fn test_clean_collapses_whitespace_and_newlines() {
        assert_eq!(
            clean_text("  Cell\n\n\nbiology\t\tis   fun \r\n"),
            "Cell biology is fun"
        );
    }

    #[test]
    fn test_clean_normalizes_dashes_and_strips_non_ascii() {
        assert_eq!(clean_text("G1 \u{2013} S \u{2014} G2"), "G1 - S - G2");
        assert_eq!(clean_text("na\u{00ef}ve caf\u{00e9}"), "nave caf");
        assert_eq!(clean_text("a \u{00e9} b"), "a b");
        assert_eq!(clean_text("bell\u{0007}ring"), "bellring");
    }

    #[test]
    fn test_clean_idempotent() {
        let samples = [
            "",
            "   ",
            "plain text",
            "Line one\n\n\nLine two\t\ttabbed",
            "Em\u{2014}dash and en\u{2013}dash",
            "\u{00e9}\u{00e9} leading non-ascii",
            "Mixed \u{4e2d}\u{6587} and  ASCII \u{2013}  text\n",
            "trailing space \u{00a0}",
        ];
        for s in samples {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_tokenizer_spans_cover_text() {
        let tokenizer = Gpt2WordTokenizer::new().unwrap();
        let text = "Mitosis has 4 phases: prophase, metaphase.";
        let spans = tokenizer.token_spans(text).unwrap();
        let mut pos = 0;
        for span in &spans {
            assert_eq!(span.start, pos);
            pos = span.end;
        }
        assert_eq!(pos, text.len());
        let tokens: Vec<&str> = spans.iter().map(|s| &text[s.clone()]).collect();
        assert_eq!(
            tokens,
            vec!["Mitosis", " has", " 4", " phases", ":", " prophase", ",", " metaphase", "."]
        );
    }

    #[test]
    fn test_empty_input_no_chunks() {
        assert!(chunker(8, 3).split("").is_empty());
        assert!(chunker(8, 3).split(" \n\t ").is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = chunker(512, 100).split("Photosynthesis occurs in chloroplasts.");
        assert_eq!(chunks, vec!["Photosynthesis occurs in chloroplasts."]);
    }

    #[test]
    fn test_windows_overlap_exactly() {
        let c = chunker(8, 3);
        let windows = c.token_windows(20);
        assert_eq!(windows, vec![0..8, 5..13, 10..18, 15..20]);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 3);
        }
        assert!(c.token_windows(0).is_empty());
        assert_eq!(c.token_windows(8), vec![0..8]);
    }

    #[test]
    fn test_split_overlap_and_bounds() {
        let c = chunker(8, 3);
        let text = WORDS.join(" ");
        let chunks = c.split(&text);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], WORDS[0..8].join(" "));
        assert_eq!(chunks[1], WORDS[5..13].join(" "));
        assert_eq!(chunks[2], WORDS[10..18].join(" "));
        assert_eq!(chunks[3], WORDS[15..20].join(" "));

        for chunk in &chunks {
            assert!(c.tokenizer().count_tokens(chunk).unwrap() <= 8);
        }
        for pair in chunks.windows(2) {
            let tail: Vec<&str> = pair[0].split(' ').rev().take(3).collect();
            let head: Vec<&str> = pair[1].split(' ').take(3).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_chunk_document_keeps_source() {
        let doc = Document::with_source("biology/ch10.pdf", WORDS.join(" "));
        let chunks = chunker(8, 3).chunk_document(&doc);
        assert_eq!(chunks.len(), 4);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.source.as_deref(), Some("biology/ch10.pdf"));
        }
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let tokenizer = Gpt2WordTokenizer::new().unwrap();
        assert!(TextChunker::new(Box::new(tokenizer), 10, 10).is_err());
    }

    #[test]
    fn test_deterministic() {
        let text = WORDS.join("\n\n");
        assert_eq!(chunker(6, 2).split(&text), chunker(6, 2).split(&text));
    }
}

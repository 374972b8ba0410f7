//! Paragraph-boundary text chunker with word overlap.
//!
//! Splits a document into segments sized for embedding. Splitting happens
//! only on blank-line paragraph boundaries (`\n\n`); a paragraph is never
//! cut, so a single paragraph longer than `chunk_size` becomes its own
//! oversized chunk.
//!
//! # Algorithm
//!
//! 1. Split on `\n\n`, trim each paragraph, drop empty ones.
//! 2. Append paragraphs to a buffer, joined by `\n\n`.
//! 3. When appending the next paragraph would push the buffer past
//!    `chunk_size` characters (separator included) and the buffer is
//!    non-empty, emit the buffer as a chunk.
//! 4. The next buffer starts with the trailing `overlap / 5` **words** of
//!    the emitted chunk, a single space, then the new paragraph. The
//!    overlap parameter is a character budget, converted to words at an
//!    assumed five characters per word. No words are carried when the
//!    emitted chunk has `overlap / 5` words or fewer, or when
//!    `overlap / 5` is zero.
//! 5. The final non-empty buffer is always emitted.
//!
//! Lengths are counted in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust
//! use sage_coach::chunk::chunk_document;
//!
//! let chunks = chunk_document("one two three four five six\n\nseven eight", 20, 10);
//! assert_eq!(chunks, vec!["one two three four five six", "five six seven eight"]);
//! ```

use crate::models::Chunk;

/// Characters per word assumed when turning the overlap budget into words.
const CHARS_PER_WORD: usize = 5;

/// Split `content` into overlapping chunk texts.
///
/// Returns an empty vector for empty or whitespace-only content.
pub fn chunk_document(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let carry_words = overlap / CHARS_PER_WORD;
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in content.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_len = trimmed.chars().count();

        let would_be = if current.is_empty() {
            para_len
        } else {
            current_len + 2 + para_len
        };

        if would_be > chunk_size && !current.is_empty() {
            let emitted = current.trim().to_string();
            let tail = trailing_words(&emitted, carry_words);
            chunks.push(emitted);

            current = if tail.is_empty() {
                trimmed.to_string()
            } else {
                format!("{} {}", tail, trimmed)
            };
            current_len = current.chars().count();
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
                current_len += 2;
            }
            current.push_str(trimmed);
            current_len += para_len;
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
}

/// The last `n` whitespace-separated words of `text`, or `""` when the
/// text has `n` words or fewer.
fn trailing_words(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= n {
        return String::new();
    }
    words[words.len() - n..].join(" ")
}

/// Chunk a named document into [`Chunk`]s with deterministic ids.
///
/// Ids are `<source>_<index>`, so re-chunking unchanged content with the
/// same parameters reproduces the same ids.
pub fn build_chunks(source: &str, content: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let texts = chunk_document(content, chunk_size, overlap);
    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("{}_{}", source, i),
            text,
            source: source.to_string(),
            chunk_index: i,
            total_chunks: total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(label: usize, words: usize) -> String {
        (0..words)
            .map(|w| format!("p{}w{}", label, w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_content() {
        assert!(chunk_document("", 500, 50).is_empty());
        assert!(chunk_document("  \n\n \n\n", 500, 50).is_empty());
        assert!(build_chunks("doc", "", 500, 50).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_document("Hello, world!", 500, 50);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_paragraphs_under_limit_join() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_document(text, 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "First paragraph.\n\nSecond paragraph.\n\nThird paragraph."
        );
    }

    #[test]
    fn test_overlap_carries_trailing_words() {
        let text = "one two three four five six\n\nseven eight";
        let chunks = chunk_document(text, 20, 10);
        assert_eq!(chunks, vec!["one two three four five six", "five six seven eight"]);
    }

    #[test]
    fn test_no_overlap_when_chunk_too_short() {
        // overlap 50 => 10 words, but the first chunk only has 3
        let text = "alpha beta gamma\n\ndelta epsilon zeta eta";
        let chunks = chunk_document(text, 20, 50);
        assert_eq!(chunks, vec!["alpha beta gamma", "delta epsilon zeta eta"]);
    }

    #[test]
    fn test_zero_word_overlap() {
        let text = "one two three four five six\n\nseven eight";
        let chunks = chunk_document(text, 20, 4);
        assert_eq!(chunks, vec!["one two three four five six", "seven eight"]);
    }

    #[test]
    fn test_oversized_paragraph_is_not_split() {
        let big = paragraph(0, 200);
        let text = format!("short intro\n\n{}\n\nshort outro", big);
        let chunks = chunk_document(&text, 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], big);
    }

    #[test]
    fn test_paragraphs_survive_in_order() {
        let paragraphs: Vec<String> = (0..40).map(|i| paragraph(i, 5 + (i * 7) % 30)).collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunk_document(&text, 500, 50);

        let mut chunk_pos = 0;
        for p in &paragraphs {
            while chunk_pos < chunks.len() && !chunks[chunk_pos].contains(p.as_str()) {
                chunk_pos += 1;
            }
            assert!(chunk_pos < chunks.len(), "paragraph lost or out of order: {}", p);
        }
    }

    #[test]
    fn test_size_bound_holds_for_multi_paragraph_chunks() {
        let paragraphs: Vec<String> = (0..60).map(|i| paragraph(i, 3 + (i * 13) % 120)).collect();
        let text = paragraphs.join("\n\n");
        for chunk in chunk_document(&text, 500, 50) {
            if chunk.chars().count() > 500 {
                assert!(
                    !chunk.contains("\n\n"),
                    "multi-paragraph chunk exceeds limit: {} chars",
                    chunk.chars().count()
                );
            }
        }
    }

    #[test]
    fn test_multibyte_lengths_count_chars() {
        // 10 four-byte chars = 40 bytes but only 10 characters
        let para = "🐙".repeat(10);
        let text = format!("{}\n\n{}", para, para);
        let chunks = chunk_document(&text, 22, 0);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_build_chunks_ids_and_totals() {
        let text = "one two three four five six\n\nseven eight\n\nnine ten eleven twelve";
        let chunks = build_chunks("octopus", text, 20, 0);
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, format!("octopus_{}", i));
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, 3);
            assert_eq!(c.source, "octopus");
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma\n\nDelta epsilon\n\nZeta eta theta\n\nIota kappa";
        let c1 = build_chunks("doc", text, 15, 10);
        let c2 = build_chunks("doc", text, 15, 10);
        assert_eq!(c1, c2);
    }
}

//! Chunker: splits an element's content into embedding-sized pieces.
//!
//! Grounded on the chunking module in `other_examples/` that prefers
//! line-break boundaries over hard character cuts; adapted here to work
//! on already-parsed `Element` content rather than raw files.

pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Splits `content` into chunks no longer than `chunk_size_chars`,
/// preferring to break at a line boundary near the limit. Content at or
/// under the limit yields exactly one chunk, index 0, unmodified.
pub fn chunk_content(content: &str, chunk_size_chars: usize) -> Vec<Chunk> {
    if content.chars().count() <= chunk_size_chars || chunk_size_chars == 0 {
        return vec![Chunk { index: 0, text: content.to_string() }];
    }

    let mut chunks = Vec::new();
    let mut remaining = content;
    let mut index = 0;

    while !remaining.is_empty() {
        let char_count = remaining.chars().count();
        if char_count <= chunk_size_chars {
            chunks.push(Chunk { index, text: remaining.to_string() });
            break;
        }

        let byte_cut = byte_offset_for_char_count(remaining, chunk_size_chars);
        let split_at = find_line_boundary(remaining, byte_cut).unwrap_or(byte_cut);
        let (piece, rest) = remaining.split_at(split_at);

        chunks.push(Chunk { index, text: piece.to_string() });
        remaining = rest.trim_start_matches('\n');
        index += 1;
    }

    chunks
}

/// Returns the chunk id for element `element_id`'s chunk `chunk_index`,
/// per spec's `element_id`/`element_id#0..n` identity rule: a single
/// chunk keeps the bare element id, multiple chunks get a `#n` suffix.
pub fn chunk_id(element_id: &str, chunk_index: usize, total_chunks: usize) -> String {
    if total_chunks <= 1 {
        element_id.to_string()
    } else {
        format!("{}#{}", element_id, chunk_index)
    }
}

fn byte_offset_for_char_count(s: &str, char_count: usize) -> usize {
    s.char_indices().nth(char_count).map(|(i, _)| i).unwrap_or(s.len())
}

/// Searches backward from `target` for the nearest preceding newline,
/// within a window of 20% of `target`, so chunk boundaries land on line
/// breaks rather than mid-token when one is nearby.
fn find_line_boundary(s: &str, target: usize) -> Option<usize> {
    let window_start = target.saturating_sub(target / 5);
    let slice = &s.as_bytes()[window_start..target.min(s.len())];
    slice.iter().rposition(|&b| b == b'\n').map(|pos| window_start + pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_yields_one_chunk() {
        let chunks = chunk_content("hello world", 2000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
    }

    #[test]
    fn long_content_splits_at_line_boundary() {
        let content = "a".repeat(50) + "\n" + &"b".repeat(50) + "\n" + &"c".repeat(50);
        let chunks = chunk_content(&content, 60);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 60 + 10);
        }
    }

    #[test]
    fn chunk_id_single_chunk_keeps_bare_element_id() {
        assert_eq!(chunk_id("abc123", 0, 1), "abc123");
    }

    #[test]
    fn chunk_id_multi_chunk_uses_hash_suffix() {
        assert_eq!(chunk_id("abc123", 2, 3), "abc123#2");
    }

    #[test]
    fn reassembling_chunks_preserves_all_nonwhitespace_content() {
        let content = "line one\nline two\nline three\nline four\n";
        let chunks = chunk_content(content, 15);
        let combined: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
        for word in ["line one", "line two", "line three", "line four"] {
            assert!(combined.contains(word));
        }
    }
}

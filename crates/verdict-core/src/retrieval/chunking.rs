//! Deterministic overlapping-chunk splitter (§4.4: "Chunking").

/// One chunk of a document's text, with its byte offset for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
}

/// Split `text` into overlapping chunks of `chunk_size` characters with `overlap` characters of
/// overlap between adjacent chunks, breaking at the nearest preceding word boundary when one
/// exists within the last half of the chunk. Purely a function of its inputs — deterministic.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        return vec![Chunk {
            text: text.to_string(),
            start: 0,
        }];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        if end < chars.len() {
            let search_floor = start + chunk_size / 2;
            if let Some(break_at) = (search_floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = break_at;
            }
        }

        let slice: String = chars[start..end].iter().collect();
        chunks.push(Chunk {
            text: slice.trim().to_string(),
            start,
        });

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_yields_a_single_chunk() {
        let chunks = chunk_text("short text", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
    }

    #[test]
    fn long_text_produces_overlapping_chunks() {
        let text = "word ".repeat(300);
        let chunks = chunk_text(&text, 500, 50);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "a ".repeat(1000);
        let a = chunk_text(&text, 500, 50);
        let b = chunk_text(&text, 500, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 500, 50).is_empty());
    }
}

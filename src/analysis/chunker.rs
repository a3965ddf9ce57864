//! Text chunking for the two retrieval paths.
//!
//! Document text is split on sentence boundaries into ~500-char chunks for
//! keyword retrieval. Curriculum reference material is split into fixed
//! character windows with overlap for embedding.

/// Target size for sentence-based chunks.
const TARGET_CHUNK_CHARS: usize = 500;

/// Chunks shorter than this carry too little signal to index.
const MIN_CHUNK_CHARS: usize = 50;

/// Window and overlap for character-based chunking of reference text.
const WINDOW_CHARS: usize = 512;
const WINDOW_OVERLAP: usize = 50;

/// Split document text into sentence-aligned chunks of roughly
/// `TARGET_CHUNK_CHARS` characters. Chunks under `MIN_CHUNK_CHARS` are
/// dropped.
pub fn sentence_chunks(text: &str) -> Vec<String> {
    let sentences = split_sentences(text);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if !current.is_empty() && current.len() + sentence.len() + 1 > TARGET_CHUNK_CHARS {
            push_chunk(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    push_chunk(&mut chunks, &mut current);

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = std::mem::take(current);
    let trimmed = chunk.trim();
    if trimmed.len() >= MIN_CHUNK_CHARS {
        chunks.push(trimmed.to_string());
    }
}

/// Split text into sentences on `.`, `!`, `?` terminators, keeping the
/// terminator with the sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Split reference text into fixed 512-char windows with 50-char overlap.
/// Operates on characters, not bytes, so multi-byte text never splits a
/// code point.
pub fn char_window_chunks(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = WINDOW_CHARS - WINDOW_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + WINDOW_CHARS).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
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
    fn test_sentence_chunks_accumulate_to_target() {
        let sentence = "This sentence is exactly long enough to matter for chunking tests. ";
        let text = sentence.repeat(20);
        let chunks = sentence_chunks(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() >= MIN_CHUNK_CHARS);
            // One sentence of slack past the target
            assert!(chunk.len() <= TARGET_CHUNK_CHARS + sentence.len());
        }
    }

    #[test]
    fn test_sentence_chunks_drop_tiny_fragments() {
        assert!(sentence_chunks("Short.").is_empty());
        assert!(sentence_chunks("").is_empty());
    }

    #[test]
    fn test_sentence_chunks_keep_terminators() {
        let text = "Photosynthesis converts light energy into chemical energy stored in glucose molecules!";
        let chunks = sentence_chunks(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].ends_with('!'));
    }

    #[test]
    fn test_sentence_chunks_unterminated_tail_kept() {
        let text = "A first full sentence that is long enough to pass the minimum size filter easily. \
                    and then an unterminated trailing clause that also needs enough length to survive the filter";
        let chunks = sentence_chunks(text);
        assert!(!chunks.is_empty());
        assert!(chunks.concat().contains("unterminated trailing clause"));
    }

    #[test]
    fn test_char_windows_overlap() {
        let text = "abcdefghij".repeat(120); // 1200 chars
        let chunks = char_window_chunks(&text);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].chars().count(), WINDOW_CHARS);
        // Consecutive windows share the 50-char overlap
        let first_tail: String = chunks[0].chars().skip(WINDOW_CHARS - WINDOW_OVERLAP).collect();
        assert!(chunks[1].starts_with(&first_tail));
    }

    #[test]
    fn test_char_windows_short_text_single_chunk() {
        let chunks = char_window_chunks("short reference text");
        assert_eq!(chunks, vec!["short reference text"]);
    }

    #[test]
    fn test_char_windows_empty() {
        assert!(char_window_chunks("").is_empty());
        assert!(char_window_chunks("   \n  ").is_empty());
    }

    #[test]
    fn test_char_windows_multibyte_safe() {
        let text = "héllo wörld ".repeat(100);
        let chunks = char_window_chunks(&text);
        assert!(!chunks.is_empty());
    }
}

//! Paragraph-boundary text chunker.
//!
//! Splits extracted document text into pieces that respect a configurable
//! character target. Splitting occurs on paragraph boundaries (`\n\n`) to
//! preserve semantic coherence within each chunk; oversized paragraphs are
//! hard-split at the nearest line or word boundary.
//!
//! Each piece carries the byte offset of its first paragraph within the
//! original text, so retrieval results can point back into the source.

/// A chunk of text plus its byte offset in the original document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub text: String,
    pub source_offset: usize,
}

/// Split text into chunks on paragraph boundaries, respecting
/// `target_chars`. Non-empty input always yields at least one chunk;
/// empty or whitespace-only input yields none.
pub fn split_text(text: &str, target_chars: usize) -> Vec<ChunkPiece> {
    let target = target_chars.max(1);
    let mut pieces = Vec::new();
    let mut buf = String::new();
    let mut buf_offset = 0usize;

    for (para_offset, para) in paragraphs(text) {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let trimmed_offset = para_offset + (para.len() - para.trim_start().len());

        // Flush the buffer when adding this paragraph would overflow.
        let would_be = if buf.is_empty() {
            trimmed.len()
        } else {
            buf.len() + 2 + trimmed.len()
        };
        if would_be > target && !buf.is_empty() {
            pieces.push(ChunkPiece {
                text: std::mem::take(&mut buf),
                source_offset: buf_offset,
            });
        }

        if trimmed.len() > target {
            if !buf.is_empty() {
                pieces.push(ChunkPiece {
                    text: std::mem::take(&mut buf),
                    source_offset: buf_offset,
                });
            }
            hard_split(trimmed, trimmed_offset, target, &mut pieces);
        } else {
            if buf.is_empty() {
                buf_offset = trimmed_offset;
            } else {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
        }
    }

    if !buf.is_empty() {
        pieces.push(ChunkPiece {
            text: buf,
            source_offset: buf_offset,
        });
    }

    if pieces.is_empty() && !text.trim().is_empty() {
        pieces.push(ChunkPiece {
            text: text.trim().to_string(),
            source_offset: 0,
        });
    }

    pieces
}

/// Iterate paragraphs with their byte offsets in the original text.
fn paragraphs(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0usize;
    text.split("\n\n").map(move |para| {
        let start = offset;
        offset += para.len() + 2;
        (start, para)
    })
}

/// Split an oversized paragraph at the nearest newline or space below the
/// target, falling back to a raw character-boundary cut.
fn hard_split(para: &str, para_offset: usize, target: usize, out: &mut Vec<ChunkPiece>) {
    let mut remaining = para;
    let mut offset = para_offset;
    while !remaining.is_empty() {
        let limit = floor_char_boundary(remaining, target.min(remaining.len()));
        let cut = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // A target smaller than the first character would otherwise cut
        // nothing; always consume at least one full character.
        let cut = cut.max(ceil_char_boundary(remaining, 1));
        let piece = &remaining[..cut];
        let lead = piece.len() - piece.trim_start().len();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            out.push(ChunkPiece {
                text: trimmed.to_string(),
                source_offset: offset + lead,
            });
        }
        offset += cut;
        remaining = &remaining[cut..];
    }
}

/// Largest index `<= limit` that lands on a UTF-8 character boundary.
fn floor_char_boundary(s: &str, limit: usize) -> usize {
    let mut i = limit.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest index `>= limit` that lands on a UTF-8 character boundary.
fn ceil_char_boundary(s: &str, limit: usize) -> usize {
    let mut i = limit.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let pieces = split_text("Hello, world!", 2000);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].text, "Hello, world!");
        assert_eq!(pieces[0].source_offset, 0);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split_text("", 2000).is_empty());
        assert!(split_text("  \n\n  ", 2000).is_empty());
    }

    #[test]
    fn multiple_paragraphs_under_limit_merge() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let pieces = split_text(text, 2000);
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].text.contains("First paragraph."));
        assert!(pieces[0].text.contains("Third paragraph."));
    }

    #[test]
    fn paragraphs_exceeding_limit_split() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let pieces = split_text(text, 25);
        assert!(pieces.len() > 1);
    }

    #[test]
    fn offsets_point_into_source() {
        let text = "Alpha paragraph here.\n\nBeta paragraph there.\n\nGamma closes it.";
        let pieces = split_text(text, 25);
        for piece in &pieces {
            let first_line = piece.text.split("\n\n").next().unwrap();
            assert_eq!(
                &text[piece.source_offset..piece.source_offset + first_line.len()],
                first_line,
                "offset must locate the chunk's first paragraph"
            );
        }
    }

    #[test]
    fn oversized_paragraph_hard_splits() {
        let text = "word ".repeat(100);
        let pieces = split_text(&text, 40);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.text.len() <= 40);
        }
    }

    #[test]
    fn hard_split_respects_utf8_boundaries() {
        let text = "é".repeat(100);
        let pieces = split_text(&text, 33);
        assert!(!pieces.is_empty());
        // Reconstructed content matches the original.
        let joined: String = pieces.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn target_smaller_than_one_char_still_terminates() {
        // Four-byte characters with a one-byte target: every cut must
        // still consume a whole character.
        let text = "🦀🦀🦀";
        let pieces = split_text(text, 1);
        assert_eq!(pieces.len(), 3);
        let joined: String = pieces.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let a = split_text(text, 12);
        let b = split_text(text, 12);
        assert_eq!(a, b);
    }
}

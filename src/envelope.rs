use crate::script::Chunk;
use std::collections::HashMap;

/// Marker bytes opening an inscription envelope.
pub const ORD_TAG: &[u8] = b"ord";

/// Header decoded from an inscription's opening envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub total_pieces: u64,
    pub mime_type: String,
    pub pieces: HashMap<u64, Vec<u8>>,
}

/// Pieces decoded from a follow-up transaction in the spender chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub total_pieces: u64,
    pub mime_type: String,
    pub pieces: HashMap<u64, Vec<u8>>,
}

impl Envelope {
    /// Envelope mode: the first chunk must push the literal bytes `"ord"`,
    /// followed by the piece count, the mime type, and interleaved
    /// `(index, data)` pairs. Any malformed input yields `None`; the caller
    /// scans many unrelated scripts and must never abort on one of them.
    pub fn decode(chunks: &[Chunk]) -> Option<Envelope> {
        if chunks.first()?.data()? != ORD_TAG {
            return None;
        }
        let total_pieces = chunks.get(1)?.small_int()?;
        let mime_type = String::from_utf8(chunks.get(2)?.data()?.to_vec()).ok()?;
        let pieces = read_pairs(&chunks[3..], total_pieces);

        Some(Envelope {
            total_pieces,
            mime_type,
            pieces,
        })
    }
}

/// Continuation mode: decode additional pieces from a spender transaction.
///
/// A repeated `"ord"` envelope at the head overrides the hints taken from the
/// genesis; otherwise pair ingestion starts at chunk 0 against the hints.
/// Returns `None` when no valid piece was extracted.
pub fn decode_continuation(
    chunks: &[Chunk],
    expected_total: u64,
    expected_mime: &str,
) -> Option<Continuation> {
    let continuation = match Envelope::decode(chunks) {
        Some(envelope) => Continuation {
            total_pieces: envelope.total_pieces,
            mime_type: envelope.mime_type,
            pieces: envelope.pieces,
        },
        None => Continuation {
            total_pieces: expected_total,
            mime_type: expected_mime.to_string(),
            pieces: read_pairs(chunks, expected_total),
        },
    };

    if continuation.pieces.is_empty() {
        None
    } else {
        Some(continuation)
    }
}

/// Ingest `(index, data)` pairs until either element is not of the expected
/// form or the chunks run out. Indices outside `[0, total)` are dropped
/// silently; a duplicate index keeps its first bytes.
fn read_pairs(chunks: &[Chunk], total: u64) -> HashMap<u64, Vec<u8>> {
    let mut pieces: HashMap<u64, Vec<u8>> = HashMap::new();
    let mut pos = 0;

    while pos + 1 < chunks.len() {
        let Some(index) = chunks[pos].small_int() else {
            break;
        };
        let Some(data) = chunks[pos + 1].data() else {
            break;
        };
        if index < total {
            pieces.entry(index).or_insert_with(|| data.to_vec());
        }
        pos += 2;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Chunk;

    fn envelope_chunks(total: u64, mime: &str, pieces: &[(u64, &[u8])]) -> Vec<Chunk> {
        let mut chunks = vec![
            Chunk::push(ORD_TAG.to_vec()),
            Chunk::push(vec![total as u8]),
            Chunk::push(mime.as_bytes().to_vec()),
        ];
        for (index, data) in pieces {
            chunks.push(Chunk::push(vec![*index as u8]));
            chunks.push(Chunk::push(data.to_vec()));
        }
        chunks
    }

    #[test]
    fn decodes_synthetic_envelope() {
        let chunks = envelope_chunks(3, "image/png", &[(0, b"aaa"), (2, b"ccc")]);
        let envelope = Envelope::decode(&chunks).unwrap();
        assert_eq!(envelope.total_pieces, 3);
        assert_eq!(envelope.mime_type, "image/png");
        assert_eq!(envelope.pieces.len(), 2);
        assert_eq!(envelope.pieces[&0], b"aaa");
        assert_eq!(envelope.pieces[&2], b"ccc");
    }

    #[test]
    fn rejects_non_ord_scripts() {
        // A plain signature-and-pubkey style script.
        let chunks = vec![Chunk::push(vec![0x30; 71]), Chunk::push(vec![0x02; 33])];
        assert!(Envelope::decode(&chunks).is_none());

        // "ord" in the wrong position.
        let chunks = vec![Chunk::Op(0x51), Chunk::push(ORD_TAG.to_vec())];
        assert!(Envelope::decode(&chunks).is_none());

        assert!(Envelope::decode(&[]).is_none());
    }

    #[test]
    fn rejects_envelope_without_piece_count() {
        let chunks = vec![
            Chunk::push(ORD_TAG.to_vec()),
            Chunk::push(b"not a number".to_vec()),
            Chunk::push(b"text/plain".to_vec()),
        ];
        assert!(Envelope::decode(&chunks).is_none());

        // Truncated after the tag.
        let chunks = vec![Chunk::push(ORD_TAG.to_vec())];
        assert!(Envelope::decode(&chunks).is_none());
    }

    #[test]
    fn pair_ingestion_stops_at_malformed_chunk() {
        let mut chunks = envelope_chunks(4, "text/plain", &[(0, b"zero")]);
        // An opcode where an index is expected halts ingestion; the pair after
        // it is never read.
        chunks.push(Chunk::Op(0xac));
        chunks.push(Chunk::push(vec![1]));
        chunks.push(Chunk::push(b"one".to_vec()));

        let envelope = Envelope::decode(&chunks).unwrap();
        assert_eq!(envelope.pieces.len(), 1);
        assert!(envelope.pieces.contains_key(&0));
    }

    #[test]
    fn out_of_range_indices_are_dropped() {
        let chunks = envelope_chunks(2, "text/plain", &[(0, b"in"), (7, b"out"), (1, b"also in")]);
        let envelope = Envelope::decode(&chunks).unwrap();
        assert_eq!(envelope.pieces.len(), 2);
        assert!(!envelope.pieces.contains_key(&7));
        // Ingestion continued past the dropped pair.
        assert_eq!(envelope.pieces[&1], b"also in");
    }

    #[test]
    fn duplicate_index_keeps_first_bytes() {
        let chunks = envelope_chunks(2, "text/plain", &[(0, b"first"), (0, b"second")]);
        let envelope = Envelope::decode(&chunks).unwrap();
        assert_eq!(envelope.pieces[&0], b"first");
    }

    #[test]
    fn continuation_reads_bare_pairs() {
        let chunks = vec![
            Chunk::push(vec![1]),
            Chunk::push(b"bbb".to_vec()),
            Chunk::push(vec![2]),
            Chunk::push(b"ccc".to_vec()),
        ];
        let continuation = decode_continuation(&chunks, 3, "image/png").unwrap();
        assert_eq!(continuation.total_pieces, 3);
        assert_eq!(continuation.mime_type, "image/png");
        assert_eq!(continuation.pieces.len(), 2);
    }

    #[test]
    fn continuation_envelope_overrides_hints() {
        let chunks = envelope_chunks(5, "text/html", &[(4, b"tail")]);
        let continuation = decode_continuation(&chunks, 2, "image/png").unwrap();
        assert_eq!(continuation.total_pieces, 5);
        assert_eq!(continuation.mime_type, "text/html");
        // Index 4 is valid against the overriding total even though the hint
        // total would have dropped it.
        assert_eq!(continuation.pieces[&4], b"tail");
    }

    #[test]
    fn continuation_with_no_valid_piece_is_null() {
        assert!(decode_continuation(&[], 3, "image/png").is_none());

        let chunks = vec![Chunk::push(vec![0x30; 71]), Chunk::Op(0xac)];
        assert!(decode_continuation(&chunks, 3, "image/png").is_none());

        // All pieces out of range.
        let chunks = vec![Chunk::push(vec![9]), Chunk::push(b"data".to_vec())];
        assert!(decode_continuation(&chunks, 3, "image/png").is_none());
    }
}

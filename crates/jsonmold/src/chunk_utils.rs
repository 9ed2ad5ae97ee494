//! Readers that deliver a document in controlled pieces, for exercising
//! refills in tests, benches and fuzzing.

use std::{collections::VecDeque, io};

/// Hands out at most `chunk` bytes per read.
#[derive(Debug, Clone)]
pub struct ChunkedReader {
    bytes: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    /// A `chunk` of zero is treated as one.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, chunk: usize) -> Self {
        Self {
            bytes: bytes.into(),
            pos: 0,
            chunk: chunk.max(1),
        }
    }
}

impl io::Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.chunk.min(buf.len()).min(self.bytes.len() - self.pos);
        buf[..len].copy_from_slice(&self.bytes[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

/// Hands out a fixed sequence of pieces, one per read. A piece larger than
/// the caller's buffer is split across reads.
#[derive(Debug, Clone, Default)]
pub struct PlannedReader {
    pieces: VecDeque<Vec<u8>>,
}

impl PlannedReader {
    pub fn new<'a>(pieces: impl IntoIterator<Item = &'a [u8]>) -> Self {
        Self {
            pieces: pieces
                .into_iter()
                .filter(|piece| !piece.is_empty())
                .map(<[u8]>::to_vec)
                .collect(),
        }
    }
}

impl io::Read for PlannedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(piece) = self.pieces.front_mut() else {
            return Ok(0);
        };
        let len = piece.len().min(buf.len());
        buf[..len].copy_from_slice(&piece[..len]);
        if len == piece.len() {
            self.pieces.pop_front();
        } else {
            piece.drain(..len);
        }
        Ok(len)
    }
}

/// Split `payload` into approximately equal-sized chunks. Multi-byte
/// characters may be cut, which is exactly what refills must cope with.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &[u8], parts: usize) -> Vec<&[u8]> {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts).max(1);
    payload.chunks(chunk_size).collect()
}

/// Split `payload` at positions derived from arbitrary `splits`, the way
/// property tests partition a document.
#[must_use]
pub fn split_by_plan<'a>(payload: &'a [u8], splits: &[usize]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut rest = payload;
    for split in splits {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(1 + split % rest.len());
        pieces.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::{ChunkedReader, PlannedReader, produce_chunks, split_by_plan};

    #[test]
    fn chunks_cover_payload() {
        let payload = "[\"f😊o\",\"bar\"]".as_bytes();
        let chunks = produce_chunks(payload, 5);
        assert!(chunks.len() <= 5);
        assert_eq!(chunks.concat(), payload);
    }

    #[test]
    fn plan_covers_payload() {
        let payload = b"abcdefghij";
        let pieces = split_by_plan(payload, &[0, 2, 5]);
        assert_eq!(pieces, [&b"a"[..], &b"bcd"[..], &b"efghij"[..]]);
        assert_eq!(split_by_plan(payload, &[]), [&payload[..]]);
    }

    #[test]
    fn readers_deliver_everything() {
        let mut out = Vec::new();
        ChunkedReader::new(b"hello world".to_vec(), 3)
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"hello world");

        let mut out = Vec::new();
        PlannedReader::new([&b"he"[..], &b""[..], &b"llo"[..]])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn planned_reader_splits_large_pieces() {
        let mut reader = PlannedReader::new([&b"abcdef"[..]]);
        let mut buf = [0; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}

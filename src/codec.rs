//! Fixed binary schema for archiving a document's chunk set.
//!
//! A [`ContentChunks`] record serializes to a versioned, little-endian
//! layout for cold storage:
//!
//! ```text
//! magic    4 bytes  b"RCLC"
//! version  u16      schema version (currently 1)
//! count    u32      number of chunks
//! chunk    repeated:
//!   id      u32 len + UTF-8 bytes
//!   url     u32 len + UTF-8 bytes
//!   kind    u32 len + UTF-8 bytes
//!   title   u32 len + UTF-8 bytes
//!   content u32 len + UTF-8 bytes
//!   vector  u32 count + f32 LE values
//! ```
//!
//! Field order and types are fixed. The decoder is strict: wrong magic,
//! unknown version, truncation, invalid UTF-8, or trailing bytes all fail
//! with [`CodecError`] — a partially populated record is never returned.
//! `decode(encode(x)) == x` for every valid record.

use crate::error::CodecError;

const MAGIC: [u8; 4] = *b"RCLC";
const VERSION: u16 = 1;

/// The archived form of one chunk: identity, provenance, text, and its
/// embedding vector, so a restore needs no re-embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    pub id: String,
    pub url: String,
    pub kind: String,
    pub title: String,
    pub content: String,
    pub vector: Vec<f32>,
}

/// A document's full chunk set, in sequence order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentChunks {
    pub chunks: Vec<ContentChunk>,
}

/// Serialize a record to its binary form.
pub fn encode(record: &ContentChunks) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(record.chunks.len() as u32).to_le_bytes());

    for chunk in &record.chunks {
        write_str(&mut out, &chunk.id);
        write_str(&mut out, &chunk.url);
        write_str(&mut out, &chunk.kind);
        write_str(&mut out, &chunk.title);
        write_str(&mut out, &chunk.content);
        out.extend_from_slice(&(chunk.vector.len() as u32).to_le_bytes());
        for &v in &chunk.vector {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    out
}

/// Deserialize a record, rejecting anything that does not match the schema
/// exactly.
pub fn decode(bytes: &[u8]) -> Result<ContentChunks, CodecError> {
    let mut reader = Reader::new(bytes);

    if reader.take(4)? != MAGIC.as_slice() {
        return Err(CodecError::BadMagic);
    }

    let version = reader.read_u16()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let count = reader.read_u32()? as usize;
    let mut chunks = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let id = reader.read_string("id")?;
        let url = reader.read_string("url")?;
        let kind = reader.read_string("kind")?;
        let title = reader.read_string("title")?;
        let content = reader.read_string("content")?;

        let vector_len = reader.read_u32()? as usize;
        let vector_bytes = reader.take(vector_len.checked_mul(4).ok_or_else(|| {
            CodecError::UnexpectedEof(reader.offset)
        })?)?;
        let vector = vector_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        chunks.push(ContentChunk {
            id,
            url,
            kind,
            title,
            content,
            vector,
        });
    }

    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }

    Ok(ContentChunks { chunks })
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Bounds-checked sequential reader over the input buffer.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof(self.offset));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8(field))
    }
}

//! Deterministic fact codec
//!
//! Facts travel between package analyses as opaque byte blobs, so the codec
//! has two hard requirements: the same fact must encode to byte-identical
//! output every time, and a blob must be rejected loudly when truncated or
//! corrupted rather than decoded into garbage.
//!
//! Envelope layout (little-endian):
//!
//! ```text
//! magic "NSFA" | version u16 | tag u8 | payload_len u32 | payload | sha256(payload)
//! ```
//!
//! The payload is msgpack. Determinism comes from the model side: struct
//! fields encode in declaration order, maps are `BTreeMap`s, and edge
//! vectors are normalized before encoding.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Read;

use crate::domain::{InferredFact, NolintFact};
use crate::error::{FactError, Result};

const MAGIC: &[u8; 4] = b"NSFA";
const VERSION: u16 = 1;
const DIGEST_LEN: usize = 32;

/// Fact type tag inside the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FactTag {
    Inferred = 1,
    Nolint = 2,
}

impl FactTag {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(FactTag::Inferred),
            2 => Ok(FactTag::Nolint),
            other => Err(FactError::framing(format!("unknown fact tag {}", other))),
        }
    }
}

fn encode_envelope<T: Serialize>(tag: FactTag, value: &T) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(value)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| FactError::encode("fact payload exceeds u32 length"))?;

    let mut out = Vec::with_capacity(4 + 2 + 1 + 4 + payload.len() + DIGEST_LEN);
    out.extend_from_slice(MAGIC);
    out.write_u16::<LittleEndian>(VERSION)?;
    out.write_u8(tag as u8)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(&payload);

    let digest = Sha256::digest(&payload);
    out.extend_from_slice(&digest);
    Ok(out)
}

fn decode_envelope<T: DeserializeOwned>(expected: FactTag, bytes: &[u8]) -> Result<T> {
    let mut r = bytes;

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|e| FactError::framing("envelope shorter than header").with_source(e))?;
    if &magic != MAGIC {
        return Err(FactError::framing("bad magic"));
    }

    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(FactError::framing(format!(
            "unsupported fact version {} (expected {})",
            version, VERSION
        )));
    }

    let tag = FactTag::from_u8(r.read_u8()?)?;
    if tag != expected {
        return Err(FactError::framing(format!(
            "fact tag mismatch: found {:?}, expected {:?}",
            tag, expected
        )));
    }

    let len = r.read_u32::<LittleEndian>()? as usize;
    if r.len() != len + DIGEST_LEN {
        return Err(FactError::framing(format!(
            "payload length mismatch: header says {}, {} bytes remain",
            len,
            r.len().saturating_sub(DIGEST_LEN)
        )));
    }
    let (payload, digest) = r.split_at(len);

    let computed = Sha256::digest(payload);
    if computed.as_slice() != digest {
        return Err(FactError::digest("payload digest mismatch"));
    }

    Ok(rmp_serde::from_slice(payload)?)
}

/// Encode an inferred map. The fact is normalized first, so any edge order
/// in the input yields the same bytes.
pub fn encode_inferred(fact: &InferredFact) -> Result<Vec<u8>> {
    let mut normalized = fact.clone();
    normalized.normalize();
    encode_envelope(FactTag::Inferred, &normalized)
}

pub fn decode_inferred(bytes: &[u8]) -> Result<InferredFact> {
    decode_envelope(FactTag::Inferred, bytes)
}

pub fn encode_nolint(fact: &NolintFact) -> Result<Vec<u8>> {
    encode_envelope(FactTag::Nolint, fact)
}

pub fn decode_nolint(bytes: &[u8]) -> Result<NolintFact> {
    decode_envelope(FactTag::Nolint, bytes)
}

//! Compressed data packet (tag 8): one algorithm octet, then the stream.

use crate::algorithm::Compression;
use crate::compression::Compressor;
use crate::error::{Error, Result};

pub fn encode(method: Compression, packets: &[u8]) -> Result<Vec<u8>> {
    let compressed = Compressor::new(method).compress(packets)?;
    let mut body = Vec::with_capacity(compressed.len() + 1);
    body.push(method.id());
    body.extend_from_slice(&compressed);
    Ok(body)
}

/// Returns the method and the inner packet stream.
pub fn decode(body: &[u8]) -> Result<(Compression, Vec<u8>)> {
    let (&id, stream) = body.split_first().ok_or_else(|| Error::corrupted("empty compressed packet"))?;
    let method = Compression::try_from(id)?;
    Ok((method, Compressor::new(method).decompress(stream)?))
}

//! Literal data packet (tag 11).
//!
//! Written in binary mode with an empty file name and a zero date, so the
//! container leaks nothing about the document beyond its length.

use crate::error::{Error, Result};

const BINARY: u8 = b'b';

/// Body of a literal packet carrying `data`.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 6);
    body.push(BINARY);
    body.push(0);
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(data);
    body
}

/// Document bytes of a literal packet body. Any data format is accepted
/// and returned unchanged.
pub fn decode(body: &[u8]) -> Result<&[u8]> {
    let name_len = usize::from(*body.get(1).ok_or_else(|| Error::corrupted("truncated literal packet"))?);
    let start = 2 + name_len + 4;
    body.get(start..).ok_or_else(|| Error::corrupted("truncated literal packet"))
}

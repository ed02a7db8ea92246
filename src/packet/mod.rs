//! # OpenPGP Packet Framing
//!
//! The standards container is a sequence of RFC 4880 packets. This module
//! frames and unframes them; the packet bodies live in the submodules:
//!
//! - [`literal`]: the document bytes
//! - [`compressed`]: ZIP/ZLIB wrapper around the literal packet
//! - [`session_key`]: S2K parameters and cipher of a passphrase-keyed message
//! - [`seipd`]: CFB-encrypted payload closed by the MDC
//! - [`armor`]: ASCII transport encoding
//!
//! ## Header Forms
//!
//! Packets are always written with new-format headers and definite lengths.
//! The reader also accepts old-format headers, indeterminate old-format
//! lengths and partial body lengths, which other implementations emit for
//! streamed data.

pub mod armor;
pub mod compressed;
pub mod literal;
pub mod seipd;
pub mod session_key;

use crate::error::{AlgorithmKind, Error, Result};

/// Packet tags the crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    SessionKey,
    /// Legacy encrypted data without integrity protection. Only recognised to be refused.
    LegacyEncrypted,
    Compressed,
    Marker,
    Literal,
    Seipd,
    Mdc,
    /// AEAD encrypted data. Recognised to be refused.
    Aead,
}

impl Tag {
    #[inline]
    pub const fn id(self) -> u8 {
        match self {
            Self::SessionKey => 3,
            Self::Compressed => 8,
            Self::LegacyEncrypted => 9,
            Self::Marker => 10,
            Self::Literal => 11,
            Self::Seipd => 18,
            Self::Mdc => 19,
            Self::Aead => 20,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            3 => Self::SessionKey,
            8 => Self::Compressed,
            9 => Self::LegacyEncrypted,
            10 => Self::Marker,
            11 => Self::Literal,
            18 => Self::Seipd,
            19 => Self::Mdc,
            20 => Self::Aead,
            other => return Err(Error::unsupported(AlgorithmKind::Packet, other)),
        })
    }
}

/// One unframed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub tag: Tag,
    pub body: Vec<u8>,
}

/// Appends a packet with a new-format header.
pub fn write_packet(out: &mut Vec<u8>, tag: Tag, body: &[u8]) {
    out.push(0xC0 | tag.id());
    write_length(out, body.len());
    out.extend_from_slice(body);
}

/// Frames a single packet into a fresh buffer.
pub fn packet(tag: Tag, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    write_packet(&mut out, tag, body);
    out
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    match len {
        0..=191 => out.push(len as u8),
        192..=8383 => {
            let value = len - 192;
            out.push(((value >> 8) as u8) + 192);
            out.push(value as u8);
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&(len as u32).to_be_bytes());
        }
    }
}

/// Whether `first` can open an OpenPGP message this crate understands.
pub fn looks_like_packet(first: u8) -> bool {
    if first & 0x80 == 0 {
        return false;
    }
    let id = if first & 0x40 == 0 { (first >> 2) & 0x0F } else { first & 0x3F };
    matches!(Tag::from_id(id), Ok(Tag::SessionKey | Tag::Compressed | Tag::Literal | Tag::Seipd | Tag::Marker | Tag::LegacyEncrypted | Tag::Aead))
}

/// Splits `data` into packets. Marker packets are dropped.
pub fn parse_packets(data: &[u8]) -> Result<Vec<Packet>> {
    let mut reader = PacketReader { data, pos: 0 };
    let mut packets = Vec::new();

    while reader.pos < data.len() {
        let packet = reader.next_packet()?;
        if packet.tag != Tag::Marker {
            packets.push(packet);
        }
    }

    Ok(packets)
}

struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl PacketReader<'_> {
    fn byte(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(|| Error::corrupted("truncated packet header"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len()).ok_or_else(|| Error::corrupted("truncated packet body"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn be_u32(&mut self) -> Result<usize> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    fn next_packet(&mut self) -> Result<Packet> {
        let header = self.byte()?;
        if header & 0x80 == 0 {
            return Err(Error::corrupted("packet header without the high bit"));
        }

        if header & 0x40 == 0 {
            let tag = Tag::from_id((header >> 2) & 0x0F)?;
            let len = match header & 0x03 {
                0 => usize::from(self.byte()?),
                1 => usize::from(u16::from_be_bytes([self.byte()?, self.byte()?])),
                2 => self.be_u32()?,
                _ => self.data.len() - self.pos,
            };
            return Ok(Packet { tag, body: self.take(len)?.to_vec() });
        }

        let tag = Tag::from_id(header & 0x3F)?;
        let mut body = Vec::new();
        loop {
            let first = self.byte()?;
            match first {
                0..=191 => {
                    body.extend_from_slice(self.take(usize::from(first))?);
                    break;
                }
                192..=223 => {
                    let len = ((usize::from(first) - 192) << 8) + usize::from(self.byte()?) + 192;
                    body.extend_from_slice(self.take(len)?);
                    break;
                }
                255 => {
                    let len = self.be_u32()?;
                    body.extend_from_slice(self.take(len)?);
                    break;
                }
                _ => {
                    let len = 1usize << (first & 0x1F);
                    body.extend_from_slice(self.take(len)?);
                }
            }
        }

        Ok(Packet { tag, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_forms() {
        for len in [0usize, 191, 192, 8383, 8384, 70_000] {
            let body = vec![0xAB; len];
            let framed = packet(Tag::Literal, &body);
            let parsed = parse_packets(&framed).unwrap();
            assert_eq!(parsed, vec![Packet { tag: Tag::Literal, body }], "length {len}");
        }

        assert_eq!(packet(Tag::Literal, &[0; 192])[1..3], [192, 0]);
        assert_eq!(packet(Tag::Literal, &[0; 8384])[1..6], [0xFF, 0, 0, 0x20, 0xC0]);
    }

    #[test]
    fn test_old_format_header() {
        // Old-format literal packet (tag 11), one-octet length.
        let data = [0x80 | (11 << 2), 3, b'a', b'b', b'c'];
        let parsed = parse_packets(&data).unwrap();
        assert_eq!(parsed[0].tag, Tag::Literal);
        assert_eq!(parsed[0].body, b"abc");

        // Indeterminate length runs to the end.
        let data = [0x80 | (8 << 2) | 3, 1, 2, 3, 4];
        assert_eq!(parse_packets(&data).unwrap()[0].body, [1, 2, 3, 4]);
    }

    #[test]
    fn test_partial_body_lengths() {
        // Partial chunk of 2^1 bytes, then a final chunk of 3 bytes.
        let data = [0xC0 | 18, 0xE1, 1, 2, 3, 4, 5, 6];
        let parsed = parse_packets(&data).unwrap();
        assert_eq!(parsed[0].tag, Tag::Seipd);
        assert_eq!(parsed[0].body, [1, 2, 4, 5, 6]);
    }

    #[test]
    fn test_marker_is_skipped() {
        let mut data = packet(Tag::Marker, b"PGP");
        data.extend(packet(Tag::Literal, b"x"));
        let parsed = parse_packets(&data).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tag, Tag::Literal);
    }

    #[test]
    fn test_truncated_and_unknown() {
        let mut framed = packet(Tag::Literal, b"hello");
        framed.pop();
        assert!(matches!(parse_packets(&framed), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(parse_packets(&[0x00]), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(parse_packets(&[0xC0 | 2, 0]), Err(Error::UnsupportedAlgorithm { kind: AlgorithmKind::Packet, id: 2 })));
    }

    #[test]
    fn test_looks_like_packet() {
        assert!(looks_like_packet(0xC3));
        assert!(looks_like_packet(0x8C));
        assert!(!looks_like_packet(b'H'));
        assert!(!looks_like_packet(0xC0 | 2));
    }
}

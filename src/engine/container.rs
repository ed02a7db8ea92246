//! Container detection and the native header.
//!
//! ## Native layout
//!
//! ```text
//! "EPDN" | version | flags | [u16 path length | path] | layers | SHA-256 of everything before
//! ```
//!
//! Each protection layer is `key check (8) || standards message`. The
//! trailing digest is unkeyed: it lets a damaged container be told apart
//! from a wrong passphrase before any key is derived.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::{MAX_KEY_PATH_LENGTH, NATIVE_MAGIC, NATIVE_VERSION};
use crate::error::{AlgorithmKind, Error, Result};
use crate::packet::session_key::SessionKeyPacket;
use crate::packet::{Tag, armor, looks_like_packet, parse_packets};
use crate::types::ContainerFormat;

const FLAG_PASSPHRASE: u8 = 0x01;
const FLAG_KEY_FILE: u8 = 0x02;
const FLAG_PERSISTENT_KEY_PATH: u8 = 0x04;
const KNOWN_FLAGS: u8 = FLAG_PASSPHRASE | FLAG_KEY_FILE | FLAG_PERSISTENT_KEY_PATH;

/// Size of the trailing container digest.
pub const DIGEST_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeHeader {
    pub passphrase: bool,
    pub key_file: bool,
    /// Present only when the key-file location is persisted.
    pub key_path: Option<String>,
}

impl NativeHeader {
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut flags = 0;
        if self.passphrase {
            flags |= FLAG_PASSPHRASE;
        }
        if self.key_file {
            flags |= FLAG_KEY_FILE;
        }
        if self.key_path.is_some() {
            flags |= FLAG_PERSISTENT_KEY_PATH;
        }

        out.extend_from_slice(&NATIVE_MAGIC);
        out.push(NATIVE_VERSION);
        out.push(flags);

        if let Some(path) = &self.key_path {
            if path.len() > MAX_KEY_PATH_LENGTH {
                return Err(Error::InvalidParameter("key file path too long".to_owned()));
            }
            out.extend_from_slice(&(path.len() as u16).to_be_bytes());
            out.extend_from_slice(path.as_bytes());
        }

        Ok(())
    }

    /// Parses the header, returning it with the offset of the first layer.
    pub fn read(data: &[u8]) -> Result<(Self, usize)> {
        let fixed = NATIVE_MAGIC.len() + 2;
        if data.len() < fixed || data[..NATIVE_MAGIC.len()] != NATIVE_MAGIC {
            return Err(Error::corrupted("missing native magic"));
        }

        let version = data[NATIVE_MAGIC.len()];
        if version != NATIVE_VERSION {
            return Err(Error::unsupported(AlgorithmKind::Packet, version));
        }

        let flags = data[NATIVE_MAGIC.len() + 1];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Error::corrupted("unknown native header flags"));
        }

        let mut header = Self { passphrase: flags & FLAG_PASSPHRASE != 0, key_file: flags & FLAG_KEY_FILE != 0, key_path: None };
        let mut offset = fixed;

        if flags & FLAG_PERSISTENT_KEY_PATH != 0 {
            let len_bytes = data.get(offset..offset + 2).ok_or_else(|| Error::corrupted("truncated key path length"))?;
            let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
            offset += 2;
            let path = data.get(offset..offset + len).ok_or_else(|| Error::corrupted("truncated key path"))?;
            header.key_path = Some(String::from_utf8(path.to_vec()).map_err(|_| Error::corrupted("key path is not UTF-8"))?);
            offset += len;

            if !header.key_file {
                return Err(Error::corrupted("persisted key path without key file protection"));
            }
        }

        Ok((header, offset))
    }
}

/// Appends the container digest.
pub fn seal_native(out: &mut Vec<u8>) {
    let digest = Sha256::digest(&out[..]);
    out.extend_from_slice(&digest);
}

/// Verifies and strips the container digest.
pub fn open_native(data: &[u8]) -> Result<&[u8]> {
    let split = data.len().checked_sub(DIGEST_SIZE).ok_or_else(|| Error::corrupted("native container too short"))?;
    let (content, digest) = data.split_at(split);
    if !bool::from(Sha256::digest(content).as_slice().ct_eq(digest)) {
        return Err(Error::corrupted("native container digest mismatch"));
    }
    Ok(content)
}

/// What a container needs before it can be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protection {
    None,

    Native(NativeHeader),

    /// A standards message keyed by one secret. Whether it is a passphrase
    /// or a key file is not recorded in the format.
    Standards,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub format: ContainerFormat,
    pub protection: Protection,
}

/// Picks the format from the content, falling back to the one implied by
/// the file name.
pub fn detect(data: &[u8], fallback: ContainerFormat) -> ContainerFormat {
    if data.starts_with(&NATIVE_MAGIC) {
        ContainerFormat::Native
    } else if armor::is_armored(data) {
        ContainerFormat::Standards { armor: true }
    } else if fallback.is_encrypted() && data.first().is_some_and(|&first| looks_like_packet(first)) {
        ContainerFormat::Standards { armor: false }
    } else {
        fallback
    }
}

/// Reports what protection the container carries without deriving keys.
pub fn probe(data: &[u8], fallback: ContainerFormat) -> Result<Probe> {
    if data.is_empty() {
        return Ok(Probe { format: fallback, protection: Protection::None });
    }

    let format = detect(data, fallback);
    let protection = match format {
        ContainerFormat::Plain => Protection::None,
        ContainerFormat::Native => {
            let content = open_native(data)?;
            let (header, _) = NativeHeader::read(content)?;
            if header.passphrase || header.key_file { Protection::Native(header) } else { Protection::None }
        }
        ContainerFormat::Standards { armor } => {
            let message = if armor { armor::decode(data)? } else { data.to_vec() };
            let packets = parse_packets(&message)?;
            match packets.first() {
                Some(first) if first.tag == Tag::SessionKey => {
                    SessionKeyPacket::decode(&first.body)?;
                    Protection::Standards
                }
                _ => Protection::None,
            }
        }
    };

    Ok(Probe { format, protection })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{CipherAlgo, Compression, HashAlgo};
    use crate::cipher::S2kParameters;
    use crate::engine::message::literal_stream;
    use crate::packet::packet;

    #[test]
    fn test_header_round_trip() {
        let header = NativeHeader { passphrase: true, key_file: true, key_path: Some("keys/doc.key".to_owned()) };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        assert_eq!(&out[..6], b"EPDN\x01\x07");

        let (parsed, offset) = NativeHeader::read(&out).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(offset, out.len());
    }

    #[test]
    fn test_header_rejects_damage() {
        assert!(matches!(NativeHeader::read(b"EPDX\x01\x01"), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(NativeHeader::read(b"EPDN\x09\x01"), Err(Error::UnsupportedAlgorithm { .. })));
        assert!(matches!(NativeHeader::read(b"EPDN\x01\x80"), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(NativeHeader::read(b"EPDN\x01\x04\x00\x01a"), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(NativeHeader::read(b"EPDN\x01\x06\x00\x05ab"), Err(Error::IntegrityCheckFailed)));
    }

    #[test]
    fn test_digest() {
        let mut out = b"EPDN\x01\x00payload".to_vec();
        seal_native(&mut out);
        assert_eq!(open_native(&out).unwrap(), b"EPDN\x01\x00payload");

        out[7] ^= 0x40;
        assert!(matches!(open_native(&out), Err(Error::IntegrityCheckFailed)));
        assert!(open_native(&[0; 10]).is_err());
    }

    #[test]
    fn test_detect() {
        let gpg = ContainerFormat::Standards { armor: false };
        assert_eq!(detect(b"EPDN\x01", ContainerFormat::Plain), ContainerFormat::Native);
        assert_eq!(detect(b"\n-----BEGIN PGP MESSAGE-----\n", ContainerFormat::Native), ContainerFormat::Standards { armor: true });
        assert_eq!(detect(&[0xC3, 0x0D], ContainerFormat::Native), gpg);
        assert_eq!(detect(&[0xC3, 0x0D], ContainerFormat::Plain), ContainerFormat::Plain);
        assert_eq!(detect(b"text", gpg), gpg);
    }

    #[test]
    fn test_probe_standards() {
        let session = SessionKeyPacket::new(CipherAlgo::Aes128, S2kParameters::new(HashAlgo::Sha256, [1; 8], 1024));
        let mut message = packet(Tag::SessionKey, &session.encode());
        message.extend(packet(Tag::Seipd, &[1; 40]));

        let gpg = ContainerFormat::Standards { armor: false };
        assert_eq!(probe(&message, gpg).unwrap().protection, Protection::Standards);

        let open = literal_stream(b"x", Compression::None).unwrap();
        assert_eq!(probe(&open, gpg).unwrap().protection, Protection::None);
        assert_eq!(probe(b"", gpg).unwrap(), Probe { format: gpg, protection: Protection::None });
    }
}

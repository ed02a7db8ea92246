//! ASCII armor for standards messages (RFC 4880 §6).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::config::{ARMOR_BEGIN, ARMOR_END, ARMOR_LINE_WIDTH};
use crate::error::{Error, Result};

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Whether `data` starts with an armor header, ignoring leading whitespace.
pub fn is_armored(data: &[u8]) -> bool {
    data.trim_ascii_start().starts_with(ARMOR_BEGIN.as_bytes())
}

pub fn encode(message: &[u8]) -> String {
    let body = STANDARD.encode(message);
    let crc = crc24(message).to_be_bytes();

    let mut out = String::with_capacity(body.len() + body.len() / ARMOR_LINE_WIDTH + 96);
    out.push_str(ARMOR_BEGIN);
    out.push_str("\n\n");
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    for line in body.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push('=');
    out.push_str(&STANDARD.encode(&crc[1..]));
    out.push('\n');
    out.push_str(ARMOR_END);
    out.push('\n');
    out
}

/// Strips the armor and verifies the checksum when present.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(data).map_err(|_| Error::corrupted("armor is not text"))?;
    let mut lines = text.lines().map(str::trim).skip_while(|line| line.is_empty());

    if lines.next() != Some(ARMOR_BEGIN) {
        return Err(Error::corrupted("missing armor header"));
    }

    // Armor headers ("Version: ...", "Comment: ...") end at the first blank line.
    let mut lines = lines.skip_while(|line| !line.is_empty()).skip(1);

    let mut body = String::new();
    let mut checksum = None;
    let mut closed = false;
    for line in lines.by_ref() {
        if line == ARMOR_END {
            closed = true;
            break;
        }
        if let Some(crc) = line.strip_prefix('=') {
            checksum = Some(crc.to_owned());
        } else {
            body.push_str(line);
        }
    }

    if !closed {
        return Err(Error::corrupted("missing armor footer"));
    }

    let message = STANDARD.decode(body.as_bytes()).map_err(|_| Error::corrupted("invalid base64 in armor"))?;

    if let Some(checksum) = checksum {
        let expected = STANDARD.decode(checksum.as_bytes()).map_err(|_| Error::corrupted("invalid armor checksum"))?;
        if expected.as_slice() != &crc24(&message).to_be_bytes()[1..] {
            return Err(Error::corrupted("armor checksum mismatch"));
        }
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc24_known_values() {
        assert_eq!(crc24(b""), 0x00B7_04CE);
        assert_eq!(crc24(b"123456789"), 0x0021_CF02);
    }

    #[test]
    fn test_layout_and_round_trip() {
        let message: Vec<u8> = (0..=255u8).collect();
        let armored = encode(&message);

        assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----\n\n"));
        assert!(armored.ends_with("-----END PGP MESSAGE-----\n"));
        assert!(armored.lines().all(|line| line.len() <= ARMOR_LINE_WIDTH || line.starts_with("-----")));
        assert!(is_armored(armored.as_bytes()));

        assert_eq!(decode(armored.as_bytes()).unwrap(), message);
    }

    #[test]
    fn test_headers_and_crlf_accepted() {
        let armored = encode(b"hello").replace("\n\n", "\nVersion: Other 1.0\nComment: x\n\n").replace('\n', "\r\n");
        assert_eq!(decode(armored.as_bytes()).unwrap(), b"hello");
    }

    #[test]
    fn test_checksum_mismatch() {
        let armored = encode(b"hello world");
        let damaged = armored.replacen("aGVsbG8", "aGVsbG9", 1);
        assert!(matches!(decode(damaged.as_bytes()), Err(Error::IntegrityCheckFailed)));
    }

    #[test]
    fn test_missing_footer() {
        let armored = encode(b"hello");
        let cut = armored.replace(ARMOR_END, "");
        assert!(decode(cut.as_bytes()).is_err());
        assert!(!is_armored(b"plain text"));
    }
}

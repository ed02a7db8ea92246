//! Standards message assembly: literal (optionally compressed) packet
//! streams, and the session key plus integrity protected data pair that
//! seals them.

use rand::{CryptoRng, RngCore};

use crate::algorithm::{CipherAlgo, Compression};
use crate::cipher::S2kParameters;
use crate::error::{AlgorithmKind, Error, Result};
use crate::packet::seipd::{self, Opened};
use crate::packet::session_key::SessionKeyPacket;
use crate::packet::{Tag, compressed, literal, packet, parse_packets, write_packet};
use crate::secret::SecretBytes;

/// A parsed message, before any key is applied.
pub enum Envelope {
    /// Passphrase- or key-keyed message.
    Sealed { session: SessionKeyPacket, data: Vec<u8> },

    /// Literal packet stream with no encryption layer.
    Open(Vec<u8>),
}

/// Literal packet for `data`, wrapped in a compressed packet unless
/// `compression` is none.
pub fn literal_stream(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let literal = packet(Tag::Literal, &literal::encode(data));
    if compression == Compression::None {
        return Ok(literal);
    }
    Ok(packet(Tag::Compressed, &compressed::encode(compression, &literal)?))
}

/// Document bytes and compression of a literal packet stream.
pub fn read_literal_stream(stream: &[u8]) -> Result<(Vec<u8>, Compression)> {
    let packets = parse_packets(stream)?;
    let [only] = packets.as_slice() else {
        return Err(Error::corrupted("expected exactly one packet in the literal stream"));
    };

    match only.tag {
        Tag::Literal => Ok((literal::decode(&only.body)?.to_vec(), Compression::None)),
        Tag::Compressed => {
            let (method, inner) = compressed::decode(&only.body)?;
            let inner_packets = parse_packets(&inner)?;
            match inner_packets.as_slice() {
                [packet] if packet.tag == Tag::Literal => Ok((literal::decode(&packet.body)?.to_vec(), method)),
                _ => Err(Error::corrupted("compressed packet does not hold a single literal packet")),
            }
        }
        other => Err(unexpected(other)),
    }
}

/// Session key packet followed by the integrity protected data packet.
pub fn seal<G: RngCore + CryptoRng>(inner: &[u8], cipher: CipherAlgo, params: &S2kParameters, key: &SecretBytes, rng: &mut G) -> Result<Vec<u8>> {
    let session = SessionKeyPacket::new(cipher, params.clone());
    let data = seipd::encrypt(cipher, key.expose_secret(), inner, rng)?;

    let mut out = Vec::with_capacity(data.len() + 32);
    write_packet(&mut out, Tag::SessionKey, &session.encode());
    write_packet(&mut out, Tag::Seipd, &data);
    Ok(out)
}

pub fn parse_envelope(message: &[u8]) -> Result<Envelope> {
    let packets = parse_packets(message)?;
    let Some(first) = packets.first() else {
        return Err(Error::corrupted("empty message"));
    };

    match first.tag {
        Tag::SessionKey => {
            let session = SessionKeyPacket::decode(&first.body)?;
            match packets.get(1..) {
                Some([data]) if data.tag == Tag::Seipd => Ok(Envelope::Sealed { session, data: data.body.clone() }),
                Some([data]) => Err(unexpected(data.tag)),
                // Messages for several passphrases repeat the session key packet; only the first is tried.
                Some([.., data]) if data.tag == Tag::Seipd => Ok(Envelope::Sealed { session, data: data.body.clone() }),
                _ => Err(Error::corrupted("session key packet without encrypted data")),
            }
        }
        Tag::Literal | Tag::Compressed => Ok(Envelope::Open(message.to_vec())),
        other => Err(unexpected(other)),
    }
}

/// Applies the S2K output (already cut to the session packet's key size).
/// An encrypted session key that does not decrypt to a usable key means the
/// wrong secret.
pub fn open(session: &SessionKeyPacket, data: &[u8], derived: &SecretBytes) -> Result<(CipherAlgo, Opened)> {
    let Some((cipher, key)) = session.session_key(derived)? else {
        return Ok((session.cipher, Opened::WrongKey));
    };
    Ok((cipher, seipd::decrypt(cipher, key.expose_secret(), data)?))
}

fn unexpected(tag: Tag) -> Error {
    match tag {
        Tag::LegacyEncrypted | Tag::Aead => Error::unsupported(AlgorithmKind::Packet, tag.id()),
        Tag::Seipd => Error::corrupted("encrypted data without a session key packet"),
        _ => Error::corrupted("unexpected packet"),
    }
}

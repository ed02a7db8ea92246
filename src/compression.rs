//! ZIP and ZLIB compression for the compressed data packet.

use std::io::{Read, Write};

use flate2::Compression as FlateCompression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};

use crate::algorithm::Compression;
use crate::error::{Error, Result};

/// Compressor/decompressor for one registered method.
pub struct Compressor {
    method: Compression,
    level: FlateCompression,
}

impl Compressor {
    pub fn new(method: Compression) -> Self {
        Self { method, level: FlateCompression::default() }
    }

    /// Compresses data. Empty documents are valid and produce a valid stream.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let compressed = match self.method {
            Compression::None => data.to_vec(),
            Compression::Zip => {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
                encoder.write_all(data).map_err(|e| Error::InvalidParameter(format!("compression failed: {e}")))?;
                encoder.finish().map_err(|e| Error::InvalidParameter(format!("compression finalization failed: {e}")))?
            }
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
                encoder.write_all(data).map_err(|e| Error::InvalidParameter(format!("compression failed: {e}")))?;
                encoder.finish().map_err(|e| Error::InvalidParameter(format!("compression finalization failed: {e}")))?
            }
        };

        Ok(compressed)
    }

    /// Decompresses data. A malformed stream means the container is damaged.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressed = Vec::new();

        let result = match self.method {
            Compression::None => {
                decompressed.extend_from_slice(data);
                Ok(data.len())
            }
            Compression::Zip => DeflateDecoder::new(data).read_to_end(&mut decompressed),
            Compression::Zlib => ZlibDecoder::new(data).read_to_end(&mut decompressed),
        };

        result.map_err(|_| Error::corrupted("decompression failed"))?;
        Ok(decompressed)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_compress_decompress() {
        let data = b"Hello, World! This is some test data for compression.";

        for method in Compression::iter() {
            let compressor = Compressor::new(method);
            let compressed = compressor.compress(data).unwrap();
            let decompressed = compressor.decompress(&compressed).unwrap();
            assert_eq!(decompressed, data, "{method}");
        }
    }

    #[test]
    fn test_compress_empty() {
        for method in Compression::iter() {
            let compressor = Compressor::new(method);
            let compressed = compressor.compress(b"").unwrap();
            assert!(compressor.decompress(&compressed).unwrap().is_empty());
        }
    }

    #[test]
    fn test_zlib_header_and_raw_deflate() {
        let data = vec![b'a'; 1000];
        let zlib = Compressor::new(Compression::Zlib).compress(&data).unwrap();
        let zip = Compressor::new(Compression::Zip).compress(&data).unwrap();

        assert_eq!(zlib[0], 0x78);
        assert_eq!(Compressor::new(Compression::Zip).decompress(&zip).unwrap(), data);
    }

    #[test]
    fn test_compression_actually_compresses() {
        let data: Vec<u8> = vec![b'a'; 10000];
        let compressed = Compressor::new(Compression::Zlib).compress(&data).unwrap();
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_decompress_garbage() {
        let result = Compressor::new(Compression::Zlib).decompress(b"definitely not zlib");
        assert!(matches!(result, Err(Error::IntegrityCheckFailed)));
    }
}

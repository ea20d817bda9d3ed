//! Frame decoder dispatch over the package's compression tag.

use std::io::{self, Read};

use crate::package::Compression;

/// Decode one compressed frame into `output`.
///
/// `output` must be exactly the decoded frame size; a codec that cannot fill
/// it completely reports a failure. Output contents are not validated.
pub fn decode_frame(algorithm: i32, input: &[u8], output: &mut [u8]) -> Result<(), DecodeError> {
    match Compression::from_tag(algorithm) {
        Some(Compression::Lz4) => decompress_lz4(input, output),
        Some(Compression::Zlib) => decompress_zlib(input, output),
        Some(Compression::None) | None => Err(DecodeError::UnsupportedAlgorithm(algorithm)),
    }
}

fn decompress_zlib(input: &[u8], output: &mut [u8]) -> Result<(), DecodeError> {
    flate2::read::ZlibDecoder::new(input)
        .read_exact(output)
        .map_err(|source| DecodeError::CodecFailure {
            algorithm: Compression::Zlib,
            source,
        })
}

#[cfg(feature = "lz4")]
fn decompress_lz4(input: &[u8], output: &mut [u8]) -> Result<(), DecodeError> {
    lz4_flex::frame::FrameDecoder::new(input)
        .read_exact(output)
        .map_err(|source| DecodeError::CodecFailure {
            algorithm: Compression::Lz4,
            source,
        })
}

/// Fallback when LZ4 is not available.
#[cfg(not(feature = "lz4"))]
fn decompress_lz4(_input: &[u8], _output: &mut [u8]) -> Result<(), DecodeError> {
    Err(DecodeError::UnsupportedAlgorithm(Compression::Lz4.tag()))
}

/// Frame decode errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported compression algorithm {0}")]
    UnsupportedAlgorithm(i32),
    #[error("{algorithm:?} decode failed: {source}")]
    CodecFailure {
        algorithm: Compression,
        #[source]
        source: io::Error,
    },
    #[error("Frame bytes {start}..{end} outside package of {len} bytes")]
    InputOutOfRange { start: usize, end: usize, len: usize },
    #[error("Package bytes are no longer available")]
    SourceUnavailable,
}

//! Texture packages: the binary container holding a compressed frame sequence.
//!
//! # File Format
//!
//! All integers are little-endian `i32`; offsets are bytes from file start.
//!
//! ```text
//! Header (28 bytes):
//!   Size table offset: i32
//!   Data offset: i32
//!   Frame count: i32
//!   Width: i32
//!   Height: i32
//!   Pixel format: i32 (>= 1)
//!   Compression: i32 (1 = LZ4 frame, 2 = zlib)
//!
//! Offset table (frame_count * 4 bytes, at size table offset):
//!   Exclusive end offset of each frame's compressed bytes
//!
//! Frame data (variable, starting at data offset):
//!   Compressed frames, back to back
//! ```
//!
//! Frame `i` occupies `[end[i - 1], end[i])`, and frame 0 starts at the data
//! offset. The table may sit before the data (as the packaging tool writes
//! it) or after it (as [`PackageWriter`] does).

mod format;
mod source;
mod writer;

pub use format::{
    Compression, FrameOffsetTable, HEADER_FIELDS, HEADER_SIZE, PackageHeader, ParseError,
    PixelFormat, RawHeader, parse,
};
pub use source::{ByteSource, FileSource, MemorySource};
pub use writer::{PackageLayout, PackageStats, PackageWriter, compress, encode_package};

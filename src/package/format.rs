//! Binary format definitions for texture packages.

use std::fmt;
use std::io::{self, Write};
use std::ops::Range;

/// Number of 4-byte fields in the package header.
pub const HEADER_FIELDS: usize = 7;

/// Size of the package header in bytes.
pub const HEADER_SIZE: usize = HEADER_FIELDS * 4;

/// Compression algorithm tag stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Compression {
    /// Raw frames. Never valid in a package header.
    #[default]
    None = 0,
    /// LZ4 frame format.
    Lz4 = 1,
    /// zlib (DEFLATE with zlib wrapper).
    Zlib = 2,
}

impl Compression {
    pub fn from_tag(v: i32) -> Option<Self> {
        match v {
            0 => Some(Compression::None),
            1 => Some(Compression::Lz4),
            2 => Some(Compression::Zlib),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        self as i32
    }
}

/// Pixel format of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PixelFormat {
    R8 = 1,
    R8G8 = 2,
    R8G8B8 = 3,
    R8G8B8A8 = 4,
    /// ETC2 RGB, 8 bytes per 4x4 block.
    Etc2Rgb8 = 33,
    /// ETC2 RGBA, 16 bytes per 4x4 block.
    Etc2Rgba8 = 34,
}

impl PixelFormat {
    pub fn from_tag(v: i32) -> Option<Self> {
        match v {
            1 => Some(PixelFormat::R8),
            2 => Some(PixelFormat::R8G8),
            3 => Some(PixelFormat::R8G8B8),
            4 => Some(PixelFormat::R8G8B8A8),
            33 => Some(PixelFormat::Etc2Rgb8),
            34 => Some(PixelFormat::Etc2Rgba8),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Size in bytes of one decoded frame, or `None` on overflow.
    pub fn frame_size(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::R8 => w.checked_mul(h),
            PixelFormat::R8G8 => w.checked_mul(h)?.checked_mul(2),
            PixelFormat::R8G8B8 => w.checked_mul(h)?.checked_mul(3),
            PixelFormat::R8G8B8A8 => w.checked_mul(h)?.checked_mul(4),
            PixelFormat::Etc2Rgb8 => w.div_ceil(4).checked_mul(h.div_ceil(4))?.checked_mul(8),
            PixelFormat::Etc2Rgba8 => w.div_ceil(4).checked_mul(h.div_ceil(4))?.checked_mul(16),
        }
    }
}

/// Header fields exactly as stored, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawHeader {
    pub size_table_offset: i32,
    pub data_offset: i32,
    pub frame_count: i32,
    pub width: i32,
    pub height: i32,
    pub pixel_format: i32,
    pub algorithm: i32,
}

impl RawHeader {
    /// Read the seven little-endian fields from the start of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ParseError::TruncatedSource {
                needed: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let field = |i: usize| read_i32(bytes, i * 4);
        Ok(Self {
            size_table_offset: field(0),
            data_offset: field(1),
            frame_count: field(2),
            width: field(3),
            height: field(4),
            pixel_format: field(5),
            algorithm: field(6),
        })
    }

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for v in [
            self.size_table_offset,
            self.data_offset,
            self.frame_count,
            self.width,
            self.height,
            self.pixel_format,
            self.algorithm,
        ] {
            w.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    /// True if every field satisfies its lower bound.
    pub fn is_valid(&self) -> bool {
        self.size_table_offset >= 0
            && self.data_offset >= 0
            && self.frame_count >= 0
            && self.width >= 0
            && self.height >= 0
            && self.pixel_format >= 1
            && self.algorithm >= 1
    }
}

impl fmt::Display for RawHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size_table_offset={} data_offset={} frame_count={} width={} height={} pixel_format={} algorithm={}",
            self.size_table_offset,
            self.data_offset,
            self.frame_count,
            self.width,
            self.height,
            self.pixel_format,
            self.algorithm
        )
    }
}

/// Validated package header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    pub size_table_offset: u32,
    pub data_offset: u32,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Raw algorithm tag; resolved by the decoder at dispatch time.
    pub algorithm: i32,
    /// Size of one decoded frame in bytes.
    pub frame_size: usize,
}

impl PackageHeader {
    /// Validate raw header fields.
    pub fn from_raw(raw: RawHeader) -> Result<Self, ParseError> {
        if !raw.is_valid() {
            log::warn!("Bad package header: {}", raw);
            return Err(ParseError::InvalidHeader(raw));
        }
        let pixel_format = PixelFormat::from_tag(raw.pixel_format)
            .ok_or(ParseError::UnsupportedPixelFormat(raw.pixel_format))?;
        let frame_size = pixel_format
            .frame_size(raw.width as u32, raw.height as u32)
            .ok_or(ParseError::FrameSizeOverflow)?;
        if Compression::from_tag(raw.algorithm).is_none() {
            log::warn!("Package uses unknown compression algorithm {}", raw.algorithm);
        }

        Ok(Self {
            size_table_offset: raw.size_table_offset as u32,
            data_offset: raw.data_offset as u32,
            frame_count: raw.frame_count as u32,
            width: raw.width as u32,
            height: raw.height as u32,
            pixel_format,
            algorithm: raw.algorithm,
            frame_size,
        })
    }

    pub fn compression(&self) -> Option<Compression> {
        Compression::from_tag(self.algorithm)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count as usize
    }
}

/// Cumulative end offsets of each frame's compressed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOffsetTable {
    data_offset: usize,
    ends: Vec<usize>,
}

impl FrameOffsetTable {
    /// Read `frame_count` entries at `size_table_offset`.
    pub fn read_from(bytes: &[u8], header: &PackageHeader) -> Result<Self, ParseError> {
        let count = header.frame_count();
        let start = header.size_table_offset as usize;
        let needed = start.saturating_add(count.saturating_mul(4));
        if bytes.len() < needed {
            return Err(ParseError::TruncatedSource {
                needed,
                actual: bytes.len(),
            });
        }

        let data_offset = header.data_offset as usize;
        let mut ends = Vec::with_capacity(count);
        let mut previous = data_offset;
        for index in 0..count {
            let end = read_u32(bytes, start + index * 4) as usize;
            if end < previous {
                return Err(ParseError::InvalidFrameSize {
                    index,
                    start: previous,
                    end,
                });
            }
            ends.push(end);
            previous = end;
        }

        // Ends are monotonic, so only the last one needs a bounds check.
        if let Some(&last) = ends.last()
            && last > bytes.len()
        {
            return Err(ParseError::TruncatedSource {
                needed: last,
                actual: bytes.len(),
            });
        }

        Ok(Self { data_offset, ends })
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Compressed byte range of frame `index`.
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        let end = *self.ends.get(index)?;
        let start = match index {
            0 => self.data_offset,
            _ => self.ends[index - 1],
        };
        Some(start..end)
    }

    /// Compressed sizes of all frames, in order.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter_map(|i| self.range(i).map(|r| r.len()))
    }
}

/// Parse header and offset table. The byte slice is not retained.
pub fn parse(bytes: &[u8]) -> Result<(PackageHeader, FrameOffsetTable), ParseError> {
    let raw = RawHeader::read_from(bytes)?;
    let header = PackageHeader::from_raw(raw)?;
    let table = FrameOffsetTable::read_from(bytes, &header)?;
    Ok((header, table))
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Package parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Package truncated: need {needed} bytes, have {actual}")]
    TruncatedSource { needed: usize, actual: usize },
    #[error("Invalid package header ({0})")]
    InvalidHeader(RawHeader),
    #[error("Frame {index} has negative size (start {start}, end {end})")]
    InvalidFrameSize {
        index: usize,
        start: usize,
        end: usize,
    },
    #[error("Unsupported pixel format {0}")]
    UnsupportedPixelFormat(i32),
    #[error("Decoded frame size overflows")]
    FrameSizeOverflow,
}

//! Package writer for building texture packages from decoded frames.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{Compression, HEADER_SIZE, PixelFormat, RawHeader};

/// Frame geometry and encoding of a package being written.
#[derive(Debug, Clone, Copy)]
pub struct PackageLayout {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Compression type to use. `Compression::None` is rejected.
    pub compression: Compression,
}

impl PackageLayout {
    /// Size of one decoded frame in bytes.
    pub fn frame_size(&self) -> Option<usize> {
        self.pixel_format.frame_size(self.width, self.height)
    }
}

/// Writes a package frame by frame.
///
/// Frame data starts right after the header; the offset table is appended
/// on finalize and the header rewritten to point at it.
///
/// Usage:
/// ```ignore
/// let mut writer = PackageWriter::create("intro.pkg", layout)?;
/// for frame in frames {
///     writer.push_frame(&frame)?;
/// }
/// let stats = writer.finalize()?;
/// ```
pub struct PackageWriter<W: Write + Seek> {
    writer: W,
    layout: PackageLayout,
    frame_size: usize,
    frame_ends: Vec<u32>,
}

impl PackageWriter<BufWriter<File>> {
    /// Create a package file.
    pub fn create<P: AsRef<Path>>(path: P, layout: PackageLayout) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), layout)
    }
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Start a package on `writer`, writing a placeholder header.
    pub fn new(mut writer: W, layout: PackageLayout) -> io::Result<Self> {
        if layout.compression == Compression::None {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Packages require LZ4 or zlib compression",
            ));
        }
        let frame_size = layout.frame_size().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Frame size overflows")
        })?;

        writer.seek(SeekFrom::Start(0))?;
        header_for(&layout, 0, 0)?.write_to(&mut writer)?;

        Ok(Self {
            writer,
            layout,
            frame_size,
            frame_ends: Vec::new(),
        })
    }

    /// Compress and append one decoded frame.
    pub fn push_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if frame.len() != self.frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame size mismatch: {} bytes, expected {}",
                    frame.len(),
                    self.frame_size
                ),
            ));
        }

        let compressed = compress(self.layout.compression, frame)?;
        self.writer.write_all(&compressed)?;
        let end = to_offset(self.writer.stream_position()?)?;
        self.frame_ends.push(end);
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> usize {
        self.frame_ends.len()
    }

    /// Write the offset table, rewrite the header and flush.
    pub fn finalize(mut self) -> io::Result<(W, PackageStats)> {
        let table_offset = to_offset(self.writer.stream_position()?)?;
        for end in &self.frame_ends {
            self.writer.write_all(&end.to_le_bytes())?;
        }
        let total_bytes = self.writer.stream_position()?;
        to_offset(total_bytes)?;

        let header = header_for(&self.layout, table_offset, self.frame_ends.len())?;
        self.writer.seek(SeekFrom::Start(0))?;
        header.write_to(&mut self.writer)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        let frame_count = self.frame_ends.len();
        let data_bytes = table_offset as u64 - HEADER_SIZE as u64;
        let stats = PackageStats {
            frame_count,
            total_bytes,
            average_frame_size: if frame_count > 0 {
                data_bytes / frame_count as u64
            } else {
                0
            },
            decoded_frame_size: self.frame_size,
            compression: self.layout.compression,
        };
        log::debug!("Finalized package: {}", stats);

        Ok((self.writer, stats))
    }
}

/// Build a complete package in memory.
pub fn encode_package<'a, I>(layout: PackageLayout, frames: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut writer = PackageWriter::new(Cursor::new(Vec::new()), layout)?;
    for frame in frames {
        writer.push_frame(frame)?;
    }
    let (cursor, _) = writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Compress one frame with the given algorithm.
pub fn compress(compression: Compression, data: &[u8]) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => compress_lz4(data),
        Compression::Zlib => {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

#[cfg(feature = "lz4")]
fn compress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
    encoder.write_all(data)?;
    encoder.finish().map_err(io::Error::other)
}

#[cfg(not(feature = "lz4"))]
fn compress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 support is disabled (enable the `lz4` feature)",
    ))
}

fn header_for(
    layout: &PackageLayout,
    table_offset: u32,
    frame_count: usize,
) -> io::Result<RawHeader> {
    let field = |v: u64| {
        i32::try_from(v)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Header field out of range"))
    };
    Ok(RawHeader {
        size_table_offset: field(table_offset as u64)?,
        data_offset: HEADER_SIZE as i32,
        frame_count: field(frame_count as u64)?,
        width: field(layout.width as u64)?,
        height: field(layout.height as u64)?,
        pixel_format: layout.pixel_format.tag(),
        algorithm: layout.compression.tag(),
    })
}

fn to_offset(position: u64) -> io::Result<u32> {
    i32::try_from(position)
        .map(|v| v as u32)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Package exceeds 2 GiB"))
}

/// Statistics from a finished package.
#[derive(Debug, Clone)]
pub struct PackageStats {
    /// Total frames written.
    pub frame_count: usize,
    /// Total package size in bytes.
    pub total_bytes: u64,
    /// Average compressed frame size.
    pub average_frame_size: u64,
    /// Decoded size of every frame.
    pub decoded_frame_size: usize,
    /// Compression used.
    pub compression: Compression,
}

impl std::fmt::Display for PackageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/frame avg ({} decoded, {:?} compression)",
            self.frame_count,
            self.total_bytes,
            self.average_frame_size,
            self.decoded_frame_size,
            self.compression
        )
    }
}

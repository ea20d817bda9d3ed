//! Byte sources exposing package bytes for the lifetime of a loaded package.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read-only, stable view of a package's bytes.
///
/// `bytes()` returning `None` means the buffer is unavailable and the
/// package cannot be loaded from this source.
pub trait ByteSource: Send + Sync {
    fn bytes(&self) -> Option<&[u8]>;
}

/// Package bytes held in memory, e.g. a bundled resource blob.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ByteSource for MemorySource {
    fn bytes(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

/// Package file read fully into memory when opened.
///
/// The whole file is read eagerly by [`FileSource::open`] and held until the
/// source is dropped, so memory use equals the package size for the lifetime
/// of the loaded package.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    data: Vec<u8>,
}

impl FileSource {
    /// Open a package file, reading all of its bytes into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        log::debug!("Opened package {:?} ({} bytes)", path, data.len());
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn bytes(&self) -> Option<&[u8]> {
        // An empty file has no buffer to hand out.
        if self.data.is_empty() {
            None
        } else {
            Some(&self.data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_memory_source() {
        let source = MemorySource::from(vec![1, 2, 3]);
        assert_eq!(source.bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(source.len(), 3);
    }

    #[test]
    fn test_file_source_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.pkg");
        fs::write(&path, [9u8; 40]).unwrap();

        let source = FileSource::open(&path).unwrap();
        assert_eq!(source.path(), path.as_path());
        assert_eq!(source.bytes().map(|b| b.len()), Some(40));
    }

    #[test]
    fn test_file_source_outlives_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.pkg");
        fs::write(&path, [7u8; 64]).unwrap();

        let source = FileSource::open(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(source.bytes(), Some(&[7u8; 64][..]));
    }

    #[test]
    fn test_empty_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pkg");
        fs::write(&path, b"").unwrap();

        let source = FileSource::open(&path).unwrap();
        assert!(source.bytes().is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(FileSource::open(dir.path().join("missing.pkg")).is_err());
    }
}

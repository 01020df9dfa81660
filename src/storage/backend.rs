//! Block media implementing the `embedded-storage` traits

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use embedded_storage::{ReadStorage, Storage};
use thiserror::Error;

/// Failure of the in-memory medium
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    #[error("access of {len} bytes at {offset:#x} is out of bounds")]
    OutOfBounds { offset: u32, len: usize },
    #[error("write rejected")]
    WriteRejected,
}

/// RAM-backed medium, the stand-in for EEPROM in tests and demos
#[derive(Debug, Clone)]
pub struct MemStorage {
    bytes: Vec<u8>,
    writes: usize,
    reject_writes: bool,
}

impl MemStorage {
    /// Zero-filled medium
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            writes: 0,
            reject_writes: false,
        }
    }

    /// Medium in the erased (all `0xFF`) state of fresh flash or EEPROM
    pub fn erased(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
            ..Self::new(0)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw access, for corrupting a stored blob on purpose
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Number of successful `write` calls
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Make every following write fail until switched off again
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    fn range(&self, offset: u32, len: usize) -> Result<std::ops::Range<usize>, MemError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(MemError::OutOfBounds { offset, len }),
        }
    }
}

impl ReadStorage for MemStorage {
    type Error = MemError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for MemStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.reject_writes {
            return Err(MemError::WriteRejected);
        }
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

/// A fixed-size image file used as the non-volatile block on a desktop host
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    path: PathBuf,
    capacity: usize,
}

impl FileStorage {
    /// Open or create the image, growing it to `capacity` bytes if shorter.
    ///
    /// Bytes added by growing read as zero, which never forms a valid blob.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if (file.metadata()?.len() as usize) < capacity {
            file.set_len(capacity as u64)?;
        }

        log::debug!("opened storage image {} ({capacity} bytes)", path.display());
        Ok(Self {
            file,
            path,
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(&self, offset: u32, len: usize) -> io::Result<()> {
        match (offset as usize).checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("access of {len} bytes at {offset:#x} past capacity {}", self.capacity),
            )),
        }
    }
}

impl ReadStorage for FileStorage {
    type Error = io::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len())?;
        self.file.seek(SeekFrom::Start(u64::from(offset)))?;
        self.file.read_exact(bytes)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Storage for FileStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len())?;
        self.file.seek(SeekFrom::Start(u64::from(offset)))?;
        self.file.write_all(bytes)?;
        self.file.flush()
    }
}

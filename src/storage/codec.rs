//! Field-by-field little-endian encoding of the persisted counter blob.
//!
//! Layout:
//!
//! ```text
//! magic u32 | version u16 | crc32 u32 | total_presses u32
//! [wpm-tracking]       max u16 | ema u16 | session_max u16
//! session_presses u32 | session_start_time u32 | left u32 | right u32
//! [advanced-analysis]  same_finger u32 | rolls u32 | alternations u32
//! positions ROWS*COLS x u16, row-major
//! modifiers 8 x u32 | layers 8 x u32
//! [layer-time]         layer_time_ms 8 x u32
//! [bigram-stats]       count u8 | 64 x (first u8, second u8, count u16)
//! ```
//!
//! The checksum covers the whole blob with its own field written as zero.
//! Nothing is buffered beyond one small chunk, so encoding and decoding work
//! straight against the storage medium without a blob-sized scratch buffer.

use core::fmt::Debug;

use embedded_storage::{ReadStorage, Storage};
use thiserror::Error;

use super::crc::Crc32;
use super::StorageError;
#[cfg(feature = "bigram-stats")]
use crate::stats::{Bigram, MAX_BIGRAMS};
use crate::stats::{Counters, MAX_LAYERS, MODIFIER_COUNT};

/// "TST2"
pub const MAGIC: u32 = 0x5453_5432;
pub const VERSION: u16 = 0x0004;

/// magic + version + crc
pub const HEADER_LEN: usize = 4 + 2 + 4;
/// Where the checksum sits inside the header
pub const CRC_OFFSET: usize = 6;
const CHUNK: usize = 32;

/// Byte offset of the first position counter inside the blob
pub const fn positions_offset() -> usize {
    let mut len = HEADER_LEN + 4;
    if cfg!(feature = "wpm-tracking") {
        len += 3 * 2;
    }
    len += 4 * 4;
    if cfg!(feature = "advanced-analysis") {
        len += 3 * 4;
    }
    len
}

/// Exact blob size for a `ROWS` x `COLS` matrix and the enabled features
pub const fn encoded_len<const ROWS: usize, const COLS: usize>() -> usize {
    let mut len = positions_offset() + ROWS * COLS * 2;
    len += MODIFIER_COUNT * 4 + MAX_LAYERS * 4;
    if cfg!(feature = "layer-time") {
        len += MAX_LAYERS * 4;
    }
    #[cfg(feature = "bigram-stats")]
    {
        len += 1 + MAX_BIGRAMS * 4;
    }
    len
}

/// Why a stored blob was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version {0:#06x}")]
    BadVersion(u16),
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    BadChecksum { stored: u32, computed: u32 },
    #[cfg(feature = "bigram-stats")]
    #[error("bigram count {0} exceeds table capacity")]
    BadBigramCount(u8),
}

/// A blob that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<const ROWS: usize, const COLS: usize> {
    pub counters: Counters<ROWS, COLS>,
    pub crc: u32,
}

// ---- Sinks ----

trait FieldSink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), StorageError>;
}

impl FieldSink for Crc32 {
    fn put(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.update(bytes);
        Ok(())
    }
}

/// Buffers fields into chunks and writes them at consecutive offsets
struct ChunkWriter<'a, S> {
    storage: &'a mut S,
    offset: u32,
    buf: [u8; CHUNK],
    len: usize,
}

impl<'a, S> ChunkWriter<'a, S>
where
    S: Storage,
    S::Error: Debug,
{
    fn new(storage: &'a mut S, offset: u32) -> Self {
        Self {
            storage,
            offset,
            buf: [0; CHUNK],
            len: 0,
        }
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.len == 0 {
            return Ok(());
        }
        let offset = self.offset;
        self.storage
            .write(offset, &self.buf[..self.len])
            .map_err(|e| {
                log::debug!("storage write error at {offset:#x}: {e:?}");
                StorageError::Write { offset }
            })?;
        self.offset += self.len as u32;
        self.len = 0;
        Ok(())
    }
}

impl<S> FieldSink for ChunkWriter<'_, S>
where
    S: Storage,
    S::Error: Debug,
{
    fn put(&mut self, mut bytes: &[u8]) -> Result<(), StorageError> {
        while !bytes.is_empty() {
            let n = (CHUNK - self.len).min(bytes.len());
            self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            bytes = &bytes[n..];
            if self.len == CHUNK {
                self.flush()?;
            }
        }
        Ok(())
    }
}

// ---- Reader ----

/// Reads the blob chunk by chunk, checksumming everything it hands out
struct ChunkReader<'a, S> {
    storage: &'a mut S,
    offset: u32,
    remaining: usize,
    buf: [u8; CHUNK],
    pos: usize,
    filled: usize,
    crc: Crc32,
}

impl<'a, S> ChunkReader<'a, S>
where
    S: ReadStorage,
    S::Error: Debug,
{
    fn new(storage: &'a mut S, offset: u32, len: usize) -> Self {
        Self {
            storage,
            offset,
            remaining: len,
            buf: [0; CHUNK],
            pos: 0,
            filled: 0,
            crc: Crc32::new(),
        }
    }

    fn refill(&mut self) -> Result<(), StorageError> {
        let n = CHUNK.min(self.remaining);
        let offset = self.offset;
        if n == 0 {
            return Err(StorageError::Read { offset });
        }
        self.storage
            .read(offset, &mut self.buf[..n])
            .map_err(|e| {
                log::debug!("storage read error at {offset:#x}: {e:?}");
                StorageError::Read { offset }
            })?;
        self.offset += n as u32;
        self.remaining -= n;
        self.pos = 0;
        self.filled = n;
        Ok(())
    }

    fn take_raw<const K: usize>(&mut self) -> Result<[u8; K], StorageError> {
        let mut out = [0u8; K];
        for byte in out.iter_mut() {
            if self.pos == self.filled {
                self.refill()?;
            }
            *byte = self.buf[self.pos];
            self.pos += 1;
        }
        Ok(out)
    }

    fn take<const K: usize>(&mut self) -> Result<[u8; K], StorageError> {
        let bytes = self.take_raw::<K>()?;
        self.crc.update(&bytes);
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, StorageError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, StorageError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, StorageError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// The stored checksum, fed to the running CRC as zeros
    fn crc_field(&mut self) -> Result<u32, StorageError> {
        let bytes = self.take_raw::<4>()?;
        self.crc.update(&[0; 4]);
        Ok(u32::from_le_bytes(bytes))
    }
}

// ---- Encoding ----

fn put_fields<W: FieldSink, const ROWS: usize, const COLS: usize>(
    out: &mut W,
    counters: &Counters<ROWS, COLS>,
    crc: u32,
) -> Result<(), StorageError> {
    out.put(&MAGIC.to_le_bytes())?;
    out.put(&VERSION.to_le_bytes())?;
    out.put(&crc.to_le_bytes())?;
    out.put(&counters.total_presses.to_le_bytes())?;

    #[cfg(feature = "wpm-tracking")]
    {
        out.put(&counters.wpm.max_wpm.to_le_bytes())?;
        out.put(&counters.wpm.avg_wpm_ema.to_le_bytes())?;
        out.put(&counters.wpm.session_max_wpm.to_le_bytes())?;
    }

    out.put(&counters.session_presses.to_le_bytes())?;
    out.put(&counters.session_start_time.to_le_bytes())?;
    out.put(&counters.left_hand_presses.to_le_bytes())?;
    out.put(&counters.right_hand_presses.to_le_bytes())?;

    #[cfg(feature = "advanced-analysis")]
    {
        out.put(&counters.same_finger_presses.to_le_bytes())?;
        out.put(&counters.finger_rolls.to_le_bytes())?;
        out.put(&counters.hand_alternations.to_le_bytes())?;
    }

    for count in counters.position_counts() {
        out.put(&count.to_le_bytes())?;
    }
    for count in counters.modifiers {
        out.put(&count.to_le_bytes())?;
    }
    for count in counters.layers {
        out.put(&count.to_le_bytes())?;
    }

    #[cfg(feature = "layer-time")]
    for ms in counters.layer_time_ms {
        out.put(&ms.to_le_bytes())?;
    }

    #[cfg(feature = "bigram-stats")]
    {
        let table = &counters.bigrams;
        out.put(&[table.len() as u8])?;
        for slot in 0..MAX_BIGRAMS {
            let entry = table.get(slot).copied().unwrap_or_default();
            out.put(&[entry.first, entry.second])?;
            out.put(&entry.count.to_le_bytes())?;
        }
    }

    Ok(())
}

/// Checksum of the blob these counters encode to
pub fn checksum<const ROWS: usize, const COLS: usize>(counters: &Counters<ROWS, COLS>) -> u32 {
    let mut crc = Crc32::new();
    // Crc32 never fails as a sink
    let _ = put_fields(&mut crc, counters, 0);
    crc.finish()
}

/// Fail early when the medium can't hold the blob at `offset`
pub fn ensure_fits<S: ReadStorage>(storage: &S, offset: u32, len: usize) -> Result<(), StorageError> {
    let capacity = storage.capacity();
    let end = (offset as usize).checked_add(len);
    match end {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::Capacity {
            offset,
            needed: len,
            capacity,
        }),
    }
}

/// Write the blob at `offset`. Returns the checksum that was stored.
pub fn encode<S, const ROWS: usize, const COLS: usize>(
    storage: &mut S,
    offset: u32,
    counters: &Counters<ROWS, COLS>,
) -> Result<u32, StorageError>
where
    S: Storage,
    S::Error: Debug,
{
    ensure_fits(storage, offset, encoded_len::<ROWS, COLS>())?;

    let crc = checksum(counters);
    let mut writer = ChunkWriter::new(storage, offset);
    put_fields(&mut writer, counters, crc)?;
    writer.flush()?;
    Ok(crc)
}

// ---- Decoding ----

/// Read and validate the blob at `offset`
pub fn decode<S, const ROWS: usize, const COLS: usize>(
    storage: &mut S,
    offset: u32,
) -> Result<Decoded<ROWS, COLS>, DecodeError>
where
    S: ReadStorage,
    S::Error: Debug,
{
    let len = encoded_len::<ROWS, COLS>();
    ensure_fits(storage, offset, len)?;

    let mut r = ChunkReader::new(storage, offset, len);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let version = r.u16()?;
    if version != VERSION {
        return Err(DecodeError::BadVersion(version));
    }
    let stored = r.crc_field()?;

    let mut c = Counters::<ROWS, COLS>::new();
    c.total_presses = r.u32()?;

    #[cfg(feature = "wpm-tracking")]
    {
        c.wpm.max_wpm = r.u16()?;
        c.wpm.avg_wpm_ema = r.u16()?;
        c.wpm.session_max_wpm = r.u16()?;
    }

    c.session_presses = r.u32()?;
    c.session_start_time = r.u32()?;
    c.left_hand_presses = r.u32()?;
    c.right_hand_presses = r.u32()?;

    #[cfg(feature = "advanced-analysis")]
    {
        c.same_finger_presses = r.u32()?;
        c.finger_rolls = r.u32()?;
        c.hand_alternations = r.u32()?;
    }

    for row in c.positions.iter_mut() {
        for count in row.iter_mut() {
            *count = r.u16()?;
        }
    }
    for count in c.modifiers.iter_mut() {
        *count = r.u32()?;
    }
    for count in c.layers.iter_mut() {
        *count = r.u32()?;
    }

    #[cfg(feature = "layer-time")]
    for ms in c.layer_time_ms.iter_mut() {
        *ms = r.u32()?;
    }

    #[cfg(feature = "bigram-stats")]
    {
        let used = r.u8()?;
        if used as usize > MAX_BIGRAMS {
            return Err(DecodeError::BadBigramCount(used));
        }
        for slot in 0..MAX_BIGRAMS {
            let [first, second] = r.take::<2>()?;
            let count = r.u16()?;
            if slot < used as usize {
                c.bigrams.push_raw(Bigram {
                    first,
                    second,
                    count,
                });
            }
        }
    }

    let computed = r.crc.finish();
    if computed != stored {
        return Err(DecodeError::BadChecksum { stored, computed });
    }

    Ok(Decoded {
        counters: c,
        crc: stored,
    })
}

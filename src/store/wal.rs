use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

const MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

/// WAL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOp {
    Insert,
    Replace,
    Delete,
}

/// One WAL record, bincode-encoded.
/// `body` holds the raw BSON bytes of the document after the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    pub op: WalOp,
    pub collection: String,
    pub id: String,
    pub body: Option<Vec<u8>>,
    pub ts_millis: i64,
}

/// Frame layout: `u32 LE length | u32 LE crc32(payload) | payload`.
///
/// # Errors
/// Encoding or I/O failures.
pub fn write_record<W: Write>(writer: &mut W, rec: &WalRecord) -> Result<(), StoreError> {
    let bytes = bincode::serde::encode_to_vec(rec, bincode::config::standard())?;
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|l| *l <= MAX_RECORD_LEN)
        .ok_or_else(|| StoreError::InvalidDocument("record too large for the log".into()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&crc32fast::hash(&bytes).to_le_bytes())?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Outcome of reading one frame.
#[derive(Debug)]
pub enum Frame {
    Record(WalRecord, u64),
    /// Clean end of log.
    End,
    /// The log ends mid-frame, e.g. after a crash during append.
    TornTail,
}

/// Reads the next frame; the returned size is the number of bytes consumed.
///
/// # Errors
/// `Corrupt` on a checksum mismatch or an undecodable payload.
pub fn read_record<R: Read>(reader: &mut R, offset: u64) -> Result<Frame, StoreError> {
    let mut header = [0u8; 8];
    match read_full(reader, &mut header)? {
        0 => return Ok(Frame::End),
        8 => {}
        _ => return Ok(Frame::TornTail),
    }
    let [l0, l1, l2, l3, c0, c1, c2, c3] = header;
    let len = u32::from_le_bytes([l0, l1, l2, l3]);
    let crc = u32::from_le_bytes([c0, c1, c2, c3]);
    if len > MAX_RECORD_LEN {
        return Err(StoreError::Corrupt { offset, reason: format!("record length {len} out of range") });
    }
    let mut buf = vec![0u8; len as usize];
    if read_full(reader, &mut buf)? < buf.len() {
        return Ok(Frame::TornTail);
    }
    if crc32fast::hash(&buf) != crc {
        return Err(StoreError::Corrupt { offset, reason: "checksum mismatch".into() });
    }
    let (rec, _): (WalRecord, usize) = bincode::serde::decode_from_slice(&buf, bincode::config::standard())
        .map_err(|e| StoreError::Corrupt { offset, reason: e.to_string() })?;
    Ok(Frame::Record(rec, 8 + u64::from(len)))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, StoreError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
    }
    Ok(filled)
}

/// Append-only log file backing a durable store.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
    /// End of the last fully written frame.
    len: u64,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl Wal {
    /// Opens (creating if needed) the log at `path` and replays it.
    ///
    /// A torn final frame is dropped and the file truncated to the last good record.
    ///
    /// # Errors
    /// I/O failures or `Corrupt` for damage before the tail.
    pub fn open(path: &Path) -> Result<(Self, Vec<WalRecord>), StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).append(true).create(true).open(path)?;
        let mut records = Vec::new();
        let mut offset = 0u64;
        {
            let mut reader = BufReader::new(&file);
            loop {
                match read_record(&mut reader, offset)? {
                    Frame::Record(rec, size) => {
                        records.push(rec);
                        offset += size;
                    }
                    Frame::End => break,
                    Frame::TornTail => {
                        log::warn!("WAL {} has a torn tail at offset {offset}; truncating", path.display());
                        file.set_len(offset)?;
                        file.sync_data()?;
                        break;
                    }
                }
            }
        }
        log::debug!("WAL {} replayed {} records", path.display(), records.len());
        Ok((Self { path: path.to_path_buf(), file, len: offset, poisoned: false }, records))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and syncs it to disk.
    ///
    /// On failure the file is cut back to the previous record, so a write the caller saw
    /// fail is never replayed.
    ///
    /// # Errors
    /// Encoding or I/O failures; on failure nothing should be applied in memory.
    pub fn append(&mut self, rec: &WalRecord) -> Result<(), StoreError> {
        let mut frame = Vec::new();
        write_record(&mut frame, rec)?;
        self.append_frame(&frame, |file, bytes| {
            file.write_all(bytes)?;
            file.sync_data()
        })
    }

    fn append_frame<F>(&mut self, frame: &[u8], write: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
    {
        if self.poisoned {
            return Err(StoreError::Corrupt {
                offset: self.len,
                reason: "log tail is unknown after a failed rollback".into(),
            });
        }
        match write(&mut self.file, frame) {
            Ok(()) => {
                self.len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                match self.file.set_len(self.len).and_then(|()| self.file.sync_data()) {
                    Ok(()) => log::warn!("WAL {} append failed, rolled back to {}: {e}", self.path.display(), self.len),
                    Err(t) => {
                        log::error!("WAL {} append failed and rollback failed: {e}; {t}", self.path.display());
                        self.poisoned = true;
                    }
                }
                Err(StoreError::Io(e))
            }
        }
    }
}

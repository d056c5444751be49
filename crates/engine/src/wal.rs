//! Segment-based write-ahead log (§4.2 ADD).
//!
//! Records are self-delimiting: `len:u32(LE) | crc32:u32(LE) | payload`,
//! where `payload` is a bincode-encoded `WriteBatchRecord`. Segments roll
//! over by size and are named `wal-NNNNNN.seg`; only the highest-numbered
//! segment is ever open for writing. A reader replays every segment in
//! order and stops at the first truncated or corrupt record it meets —
//! that can only be the tail of the last segment, since earlier segments
//! are immutable once rolled.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::batch::WriteBatchRecord;

const RECORD_HEADER_LEN: usize = 8; // len:u32 + crc32:u32

/// Durability guarantees for WAL writes, matching the engine's tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Bypass the WAL entirely; all data is lost on crash.
    InMemory,
    /// fsync after every commit.
    Strict,
    /// fsync every `batch_size` commits or every `interval_ms`, whichever first.
    Batched { interval_ms: u64, batch_size: usize },
    /// fsync every `interval_ms`; commits themselves never block on fsync.
    Async { interval_ms: u64 },
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Batched { interval_ms: 100, batch_size: 1000 }
    }
}

impl DurabilityMode {
    /// Whether this mode appends to the WAL at all.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::InMemory)
    }
}

/// Errors reading or writing the WAL.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("record checksum mismatch")]
    ChecksumMismatch,
    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

pub(crate) fn segment_path(dir: &Path, segment_no: u64) -> PathBuf {
    dir.join(format!("wal-{segment_no:06}.seg"))
}

pub(crate) fn list_segment_numbers(dir: &Path) -> io::Result<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut numbers = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(stem) = name.strip_prefix("wal-").and_then(|s| s.strip_suffix(".seg")) {
            if let Ok(n) = stem.parse::<u64>() {
                numbers.push(n);
            }
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

fn write_record(file: &mut File, record: &WriteBatchRecord) -> Result<(), WalError> {
    let payload = record.to_bytes()?;
    let crc = crc32fast::hash(&payload);
    let mut header = Vec::with_capacity(RECORD_HEADER_LEN);
    header.write_u32::<LittleEndian>(payload.len() as u32)?;
    header.write_u32::<LittleEndian>(crc)?;
    file.write_all(&header)?;
    file.write_all(&payload)?;
    Ok(())
}

/// Appends committed batches to the active segment, rolling over by size
/// and fsyncing per the configured [`DurabilityMode`].
pub struct WalWriter {
    dir: PathBuf,
    mode: DurabilityMode,
    max_segment_bytes: u64,
    active_segment_no: u64,
    active_file: Option<File>,
    active_size: u64,
    commits_since_fsync: usize,
    last_fsync: std::time::Instant,
}

impl WalWriter {
    /// Open (creating if absent) the WAL directory, resuming at the
    /// highest existing segment number.
    pub fn open(dir: impl Into<PathBuf>, mode: DurabilityMode, max_segment_bytes: u64) -> Result<Self, WalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let segments = list_segment_numbers(&dir)?;
        let active_segment_no = segments.last().copied().unwrap_or(1);

        let mut writer = WalWriter {
            dir,
            mode,
            max_segment_bytes,
            active_segment_no,
            active_file: None,
            active_size: 0,
            commits_since_fsync: 0,
            last_fsync: std::time::Instant::now(),
        };
        if mode.requires_wal() {
            writer.open_active()?;
        }
        Ok(writer)
    }

    fn open_active(&mut self) -> Result<(), WalError> {
        let path = segment_path(&self.dir, self.active_segment_no);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.active_size = file.metadata()?.len();
        self.active_file = Some(file);
        Ok(())
    }

    fn roll_if_needed(&mut self) -> Result<(), WalError> {
        if self.active_size >= self.max_segment_bytes {
            self.active_segment_no += 1;
            self.active_size = 0;
            self.open_active()?;
        }
        Ok(())
    }

    /// Append one batch, fsyncing according to [`DurabilityMode`].
    pub fn append(&mut self, record: &WriteBatchRecord) -> Result<(), WalError> {
        if !self.mode.requires_wal() {
            return Ok(());
        }
        self.roll_if_needed()?;
        let file = self.active_file.as_mut().expect("wal segment opened when durability requires it");
        let before = file.metadata()?.len();
        write_record(file, record)?;
        self.active_size += file.metadata()?.len() - before;

        self.commits_since_fsync += 1;
        let should_fsync = match self.mode {
            DurabilityMode::InMemory => false,
            DurabilityMode::Strict => true,
            DurabilityMode::Batched { interval_ms, batch_size } => {
                self.commits_since_fsync >= batch_size || self.last_fsync.elapsed().as_millis() as u64 >= interval_ms
            }
            DurabilityMode::Async { interval_ms } => self.last_fsync.elapsed().as_millis() as u64 >= interval_ms,
        };
        if should_fsync {
            file.sync_data()?;
            self.commits_since_fsync = 0;
            self.last_fsync = std::time::Instant::now();
        }
        Ok(())
    }

    /// Force an fsync regardless of mode, e.g. before a checkpoint.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if let Some(file) = self.active_file.as_mut() {
            file.sync_data()?;
            self.commits_since_fsync = 0;
            self.last_fsync = std::time::Instant::now();
        }
        Ok(())
    }

    /// The WAL directory, for checkpointing (hard-linking segment files).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rewrite the WAL to a single record capturing the full live state,
    /// dropping every segment the new one supersedes (§4.2 ADD background
    /// compaction). `entries` must be the complete current key/value set.
    pub fn compact_to(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>, seq_no: u64, leader_ms: i64) -> Result<(), WalError> {
        if !self.mode.requires_wal() {
            return Ok(());
        }
        let stale_segments = list_segment_numbers(&self.dir)?;
        let record = WriteBatchRecord {
            seq_no,
            leader_ms,
            ops: entries.into_iter().map(|(key, value)| crate::batch::EncodedOp::Put { key, value }).collect(),
        };

        self.active_segment_no = stale_segments.last().copied().unwrap_or(self.active_segment_no) + 1;
        self.active_file = None;
        self.active_size = 0;
        self.open_active()?;
        {
            let file = self.active_file.as_mut().expect("just opened");
            write_record(file, &record)?;
            file.sync_data()?;
        }
        self.active_size = fs::metadata(segment_path(&self.dir, self.active_segment_no))?.len();

        for segment_no in stale_segments {
            let _ = fs::remove_file(segment_path(&self.dir, segment_no));
        }
        Ok(())
    }
}

/// Replays every segment in a WAL directory in order.
pub struct WalReader;

impl WalReader {
    /// Read every well-formed record across all segments, in commit order.
    /// Stops at the first truncated/corrupt record, which can only occur
    /// at the tail of the last segment (a crash mid-write).
    pub fn read_all(dir: &Path) -> Result<Vec<WriteBatchRecord>, WalError> {
        let mut records = Vec::new();
        for segment_no in list_segment_numbers(dir)? {
            let path = segment_path(dir, segment_no);
            let mut reader = BufReader::new(File::open(&path)?);
            loop {
                let mut header = [0u8; RECORD_HEADER_LEN];
                match reader.read_exact(&mut header) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
                let len = (&header[0..4]).read_u32::<LittleEndian>()? as usize;
                let expected_crc = (&header[4..8]).read_u32::<LittleEndian>()?;
                let mut payload = vec![0u8; len];
                if reader.read_exact(&mut payload).is_err() {
                    warn!(path = %path.display(), "truncated wal record at segment tail, stopping replay");
                    break;
                }
                if crc32fast::hash(&payload) != expected_crc {
                    warn!(path = %path.display(), "wal record checksum mismatch, stopping replay");
                    break;
                }
                records.push(WriteBatchRecord::from_bytes(&payload)?);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::EncodedOp;
    use tempfile::tempdir;

    fn sample(seq_no: u64) -> WriteBatchRecord {
        WriteBatchRecord {
            seq_no,
            leader_ms: 42,
            ops: vec![EncodedOp::Put { key: vec![seq_no as u8], value: vec![1, 2, 3] }],
        }
    }

    #[test]
    fn writes_and_replays_in_order() {
        let dir = tempdir().unwrap();
        {
            let mut writer = WalWriter::open(dir.path(), DurabilityMode::Strict, 1 << 20).unwrap();
            for seq in 1..=5 {
                writer.append(&sample(seq)).unwrap();
            }
        }
        let records = WalReader::read_all(dir.path()).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records.iter().map(|r| r.seq_no).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rolls_segments_by_size() {
        let dir = tempdir().unwrap();
        {
            let mut writer = WalWriter::open(dir.path(), DurabilityMode::Strict, 64).unwrap();
            for seq in 1..=20 {
                writer.append(&sample(seq)).unwrap();
            }
        }
        assert!(list_segment_numbers(dir.path()).unwrap().len() > 1);
        let records = WalReader::read_all(dir.path()).unwrap();
        assert_eq!(records.len(), 20);
    }

    #[test]
    fn in_memory_mode_writes_nothing() {
        let dir = tempdir().unwrap();
        {
            let mut writer = WalWriter::open(dir.path(), DurabilityMode::InMemory, 1 << 20).unwrap();
            writer.append(&sample(1)).unwrap();
        }
        let records = WalReader::read_all(dir.path()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn compact_to_drops_superseded_segments() {
        let dir = tempdir().unwrap();
        let mut writer = WalWriter::open(dir.path(), DurabilityMode::Strict, 48).unwrap();
        for seq in 1..=10 {
            writer.append(&sample(seq)).unwrap();
        }
        assert!(list_segment_numbers(dir.path()).unwrap().len() > 1);

        writer.compact_to(vec![(vec![1], vec![9, 9])], 10, 99).unwrap();
        assert_eq!(list_segment_numbers(dir.path()).unwrap().len(), 1);

        let records = WalReader::read_all(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq_no, 10);
        assert_eq!(records[0].ops, vec![EncodedOp::Put { key: vec![1], value: vec![9, 9] }]);
    }

    #[test]
    fn truncated_tail_record_is_dropped_not_fatal() {
        let dir = tempdir().unwrap();
        {
            let mut writer = WalWriter::open(dir.path(), DurabilityMode::Strict, 1 << 20).unwrap();
            writer.append(&sample(1)).unwrap();
            writer.append(&sample(2)).unwrap();
        }
        let segments = list_segment_numbers(dir.path()).unwrap();
        let path = segment_path(dir.path(), *segments.last().unwrap());
        let full_len = fs::metadata(&path).unwrap().len();
        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(full_len - 2).unwrap(); // chop the last record's tail

        let records = WalReader::read_all(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq_no, 1);
    }
}

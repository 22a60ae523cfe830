//! The disk-backed modification queue
//!
//! One file per post-construction task, named
//! `post_construction_<uuid>` under the store's base path: an
//! append-only log of framed modification reports. Single producer (the
//! store's write path), single consumer (the post-construction task).
//! The file is deleted on successful finalize and left on disk after an
//! interrupt; the store reclaims leftovers at next open.
//!
//! Record framing: `[len: u32 LE][payload][crc32(payload): u32 LE]`,
//! payload = serialized report. Every append is followed by fsync so a
//! registered write is never acknowledged ahead of its queue entry.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crc32fast::Hasher;
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::report::ModReport;

/// The handle shared between the store (producer) and the
/// post-construction task (consumer).
pub type SharedModQueue = Arc<Mutex<ModQueue>>;

/// A disk-backed FIFO of modification reports.
#[derive(Debug)]
pub struct ModQueue {
    tag: Uuid,
    path: PathBuf,
    file: File,
    /// Byte offset of the next unread record.
    read_pos: u64,
    /// Records appended but not yet popped.
    len: usize,
}

impl ModQueue {
    /// Creates the queue file for a fresh post-construction task.
    pub fn create(base_path: &Path, tag: Uuid) -> QueueResult<Self> {
        let path = base_path.join(format!("post_construction_{tag}"));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                QueueError::append_failed(
                    format!("failed to create queue file: {}", path.display()),
                    e,
                )
            })?;
        Ok(ModQueue {
            tag,
            path,
            file,
            read_pos: 0,
            len: 0,
        })
    }

    /// The task tag this queue belongs to.
    pub fn tag(&self) -> Uuid {
        self.tag
    }

    /// The queue file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended but not yet popped.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one report and fsyncs.
    pub fn push(&mut self, report: &ModReport) -> QueueResult<()> {
        let payload = serde_json::to_vec(report).map_err(|e| {
            QueueError::append_failed(
                "failed to serialize modification report",
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let checksum = hasher.finalize();

        let mut record = Vec::with_capacity(payload.len() + 8);
        record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&checksum.to_le_bytes());

        self.file.write_all(&record).map_err(|e| {
            QueueError::append_failed(
                format!("failed to append to queue file: {}", self.path.display()),
                e,
            )
        })?;
        self.file.sync_all().map_err(|e| {
            QueueError::fsync_failed(
                format!("fsync failed after queue append: {}", self.path.display()),
                e,
            )
        })?;

        self.len += 1;
        Ok(())
    }

    /// Pops the oldest unread report, or `None` when the queue is empty.
    ///
    /// A record that fails length, checksum, or decode validation is a
    /// fatal corruption error.
    pub fn pop(&mut self) -> QueueResult<Option<ModReport>> {
        if self.len == 0 {
            return Ok(None);
        }
        let record_start = self.read_pos;

        self.file
            .seek(SeekFrom::Start(record_start))
            .map_err(|e| {
                QueueError::append_failed(
                    format!("failed to seek queue file: {}", self.path.display()),
                    e,
                )
            })?;

        let mut len_buf = [0u8; 4];
        self.read_exact(&mut len_buf, record_start)?;
        let payload_len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; payload_len];
        self.read_exact(&mut payload, record_start)?;

        let mut checksum_buf = [0u8; 4];
        self.read_exact(&mut checksum_buf, record_start)?;
        let expected = u32::from_le_bytes(checksum_buf);

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != expected {
            return Err(QueueError::corruption_at_offset(
                record_start,
                "checksum mismatch on modification report",
            ));
        }

        let report: ModReport = serde_json::from_slice(&payload).map_err(|e| {
            QueueError::corruption_at_offset(
                record_start,
                format!("undecodable modification report: {e}"),
            )
        })?;

        self.read_pos = record_start + 8 + payload_len as u64;
        self.len -= 1;
        Ok(Some(report))
    }

    fn read_exact(&mut self, buf: &mut [u8], record_start: u64) -> QueueResult<()> {
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                QueueError::corruption_at_offset(record_start, "truncated queue record")
            } else {
                QueueError::append_failed(
                    format!("failed to read queue file: {}", self.path.display()),
                    e,
                )
            }
        })
    }

    /// Removes the queue file. Called when the task ends without being
    /// interrupted; an interrupted task leaves the file for the store to
    /// reclaim at next open.
    pub fn remove_file(&self) -> QueueResult<()> {
        std::fs::remove_file(&self.path).map_err(|e| {
            QueueError::append_failed(
                format!("failed to remove queue file: {}", self.path.display()),
                e,
            )
        })
    }
}

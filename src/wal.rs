use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::limits::MAX_WAL_RECORD_LEN;
use crate::model::Change;

/// Bytes around each payload: length prefix + checksum.
const FRAME_OVERHEAD: u64 = 8;

fn write_frame(out: &mut impl Write, change: &Change) -> io::Result<()> {
    let payload =
        bincode::serialize(change).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    // Replay treats a longer frame as torn.
    if payload.len() > MAX_WAL_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("WAL record of {} bytes exceeds {MAX_WAL_RECORD_LEN}", payload.len()),
        ));
    }
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

enum Frame {
    Record { change: Change, len: u64 },
    End,
    /// Short read, oversized prefix, checksum mismatch or undecodable payload.
    Torn,
}

/// `Ok(false)` when the input ends before `buf` is full.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_frame(input: &mut impl BufRead) -> io::Result<Frame> {
    if input.fill_buf()?.is_empty() {
        return Ok(Frame::End);
    }
    let mut word = [0u8; 4];
    if !read_full(input, &mut word)? {
        return Ok(Frame::Torn);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_WAL_RECORD_LEN {
        return Ok(Frame::Torn);
    }
    let mut payload = vec![0u8; len];
    if !read_full(input, &mut payload)? || !read_full(input, &mut word)? {
        return Ok(Frame::Torn);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(Frame::Torn);
    }
    Ok(match bincode::deserialize(&payload) {
        Ok(change) => Frame::Record {
            change,
            len: len as u64 + FRAME_OVERHEAD,
        },
        Err(_) => Frame::Torn,
    })
}

/// Append-only log of [`Change`] records.
///
/// Each frame is `[u32 len][bincode payload][u32 crc32]`, little-endian.
/// A crash mid-write leaves at most one torn frame at the tail, which
/// [`Wal::replay`] drops.
pub struct Wal {
    out: BufWriter<File>,
    path: PathBuf,
    /// File length after the last successful `flush_sync`.
    synced_len: u64,
    /// Appends buffered since the last successful `flush_sync`.
    unsynced: u64,
    appends_since_compact: u64,
    /// Set while a rollback has not completed; refuses further appends.
    poisoned: bool,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = open_append(path)?;
        Ok(Self {
            synced_len: file.metadata()?.len(),
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            unsynced: 0,
            appends_since_compact: 0,
            poisoned: false,
        })
    }

    /// Append and fsync one change.
    #[cfg(test)]
    pub fn append(&mut self, change: &Change) -> io::Result<()> {
        self.append_buffered(change)?;
        self.flush_sync()
    }

    /// Buffer a change. Nothing is durable until [`Wal::flush_sync`].
    pub fn append_buffered(&mut self, change: &Change) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("WAL poisoned by a failed rollback"));
        }
        write_frame(&mut self.out, change)?;
        self.unsynced += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.out.flush()?;
        let file = self.out.get_ref();
        file.sync_all()?;
        self.synced_len = file.metadata()?.len();
        self.appends_since_compact += self.unsynced;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop everything since the last successful `flush_sync`, both still
    /// buffered and already written, so a failed group leaves no trace.
    pub fn rollback(&mut self) -> io::Result<()> {
        self.poisoned = true;
        let file = open_append(&self.path)?;
        let stale = std::mem::replace(&mut self.out, BufWriter::new(file));
        // Discards the buffer without writing it.
        let _ = stale.into_parts();
        self.out.get_ref().set_len(self.synced_len)?;
        self.out.get_ref().sync_all()?;
        self.unsynced = 0;
        self.poisoned = false;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// First compaction phase: write `changes` to a synced side file.
    pub fn write_compact_file(path: &Path, changes: &[Change]) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        for change in changes {
            write_frame(&mut out, change)?;
        }
        out.flush()?;
        out.get_ref().sync_all()
    }

    /// Second compaction phase: rename the side file over the log and reopen it.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        let file = open_append(&self.path)?;
        self.synced_len = file.metadata()?.len();
        self.out = BufWriter::new(file);
        self.unsynced = 0;
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, changes: &[Change]) -> io::Result<()> {
        Self::write_compact_file(&self.path, changes)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Read every intact change from `path`. A missing file is an empty log.
    ///
    /// A torn tail is logged and cut off the file, so later appends follow
    /// the last good record.
    pub fn replay(path: &Path) -> io::Result<Vec<Change>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut input = BufReader::new(file);
        let mut changes = Vec::new();
        let mut good_bytes = 0u64;

        loop {
            match read_frame(&mut input)? {
                Frame::Record { change, len } => {
                    changes.push(change);
                    good_bytes += len;
                }
                Frame::End => break,
                Frame::Torn => {
                    tracing::warn!(
                        "WAL {}: dropping torn tail after {} records ({good_bytes} bytes)",
                        path.display(),
                        changes.len()
                    );
                    OpenOptions::new().write(true).open(path)?.set_len(good_bytes)?;
                    break;
                }
            }
        }
        Ok(changes)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

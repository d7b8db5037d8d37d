use std::sync::Arc;

use tracing::debug;

use super::error::{LogError, LogResult};
use super::log_iterator::LogIterator;
use super::Lsn;
use crate::file::{BlockId, FileManager, Page};

/// Append-only write-ahead log over a single in-memory page.
///
/// Records grow backward from the end of the page toward its start. The
/// 4-byte header at offset 0 holds the boundary: the offset of the most
/// recently written record, which is also the first free byte counting
/// from the left. Free space on the page is therefore `boundary - 4`.
///
/// The manager is not synchronized; in the full system the transaction
/// layer owns the log lock. Within this core it is shared as
/// `Arc<Mutex<LogManager>>` and reached only by the buffer layer during
/// flush.
pub struct LogManager {
    fm: Arc<FileManager>,
    logfile: String,
    logpage: Page,
    current_blk: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

impl LogManager {
    /// Open the log file, creating its first block if the file is empty
    pub fn new(fm: Arc<FileManager>, logfile: &str) -> LogResult<Self> {
        let mut logpage = Page::new(fm.block_size());

        let logsize = fm.length(logfile)?;
        let current_blk = if logsize == 0 {
            Self::append_new_block(&fm, &mut logpage, logfile)?
        } else {
            let blk = BlockId::new(logfile, logsize - 1);
            fm.read(&blk, &mut logpage)?;
            blk
        };

        Ok(Self {
            fm,
            logfile: logfile.to_string(),
            logpage,
            current_blk,
            latest_lsn: 0,
            last_saved_lsn: 0,
        })
    }

    /// Append `logrec` to the log and return its LSN.
    ///
    /// The record is only guaranteed durable after a subsequent
    /// [`flush`](Self::flush) with an LSN at least as large, or after
    /// [`iterator`](Self::iterator).
    pub fn append(&mut self, logrec: &[u8]) -> LogResult<Lsn> {
        let bytes_needed = logrec.len() + 4;
        if bytes_needed + 4 > self.fm.block_size() {
            return Err(LogError::RecordTooLarge {
                size: logrec.len(),
                block_size: self.fm.block_size(),
            });
        }

        let mut boundary = self.logpage.get_int(0)? as usize;
        if boundary < bytes_needed + 4 {
            // The record would collide with the boundary header: move to a
            // fresh block
            self.flush_page()?;
            self.current_blk = Self::append_new_block(&self.fm, &mut self.logpage, &self.logfile)?;
            boundary = self.logpage.get_int(0)? as usize;
        }

        let recpos = boundary - bytes_needed;
        self.logpage.set_bytes(recpos, logrec)?;
        self.logpage.set_int(0, recpos as i32)?;

        self.latest_lsn += 1;
        Ok(self.latest_lsn)
    }

    /// Ensure the record with the given LSN is on disk.
    ///
    /// The guard is inclusive: `lsn >= last_saved_lsn` triggers a write, so
    /// flushing LSN 0 on a freshly created log is a harmless no-op once the
    /// page has been written once.
    pub fn flush(&mut self, lsn: Lsn) -> LogResult<()> {
        if lsn >= self.last_saved_lsn {
            self.flush_page()?;
        }
        Ok(())
    }

    /// Flush, then iterate over the log records in reverse chronological
    /// order
    pub fn iterator(&mut self) -> LogResult<LogIterator> {
        self.flush_page()?;
        LogIterator::new(Arc::clone(&self.fm), self.current_blk.clone())
    }

    fn append_new_block(fm: &FileManager, logpage: &mut Page, logfile: &str) -> LogResult<BlockId> {
        let blk = fm.append(logfile)?;
        logpage.set_int(0, fm.block_size() as i32)?;
        fm.write(&blk, logpage)?;
        debug!(block = blk.number(), "allocated new log block");
        Ok(blk)
    }

    fn flush_page(&mut self) -> LogResult<()> {
        self.fm.write(&self.current_blk, &self.logpage)?;
        self.last_saved_lsn = self.latest_lsn;
        Ok(())
    }
}

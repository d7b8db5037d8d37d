use std::sync::{Arc, Mutex};

use super::error::{BufferError, BufferResult};
use super::TxId;
use crate::file::{BlockId, FileManager, Page};
use crate::log::{LogManager, Lsn};

/// One frame of the buffer pool: a page plus its bookkeeping.
///
/// A frame with a positive pin count is ineligible for eviction. A recorded
/// modifying transaction means the page is dirty and must be flushed before
/// the frame is reassigned; a recorded LSN must be durable on the log
/// before the page itself is written (write-ahead rule).
pub struct Buffer {
    fm: Arc<FileManager>,
    lm: Arc<Mutex<LogManager>>,
    contents: Page,
    blk: Option<BlockId>,
    pins: usize,
    txnum: Option<TxId>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(fm: Arc<FileManager>, lm: Arc<Mutex<LogManager>>) -> Self {
        let contents = Page::new(fm.block_size());
        Self {
            fm,
            lm,
            contents,
            blk: None,
            pins: 0,
            txnum: None,
            lsn: None,
        }
    }

    /// The buffered page
    pub fn contents(&self) -> &Page {
        &self.contents
    }

    /// The buffered page, for modification.
    ///
    /// Callers must pair writes with [`set_modified`](Self::set_modified),
    /// or they are lost on eviction.
    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    /// The block this frame currently holds, if any
    pub fn block(&self) -> Option<&BlockId> {
        self.blk.as_ref()
    }

    /// Record that `txnum` modified the page, optionally with the LSN of
    /// the log record describing the change.
    ///
    /// Passing `None` never erases a previously recorded LSN, so the LSN
    /// tracks the most recent logged modification.
    pub fn set_modified(&mut self, txnum: TxId, lsn: Option<Lsn>) {
        self.txnum = Some(txnum);
        if lsn.is_some() {
            self.lsn = lsn;
        }
    }

    /// Whether the frame is pinned
    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    /// The transaction that dirtied the page, if any
    pub fn modifying_tx(&self) -> Option<TxId> {
        self.txnum
    }

    /// Flush the old block if dirty, then load `blk` into the frame.
    ///
    /// Only the buffer manager calls this, during eviction; the pin count
    /// restarts at zero.
    pub(crate) fn assign_to_block(&mut self, blk: BlockId) -> BufferResult<()> {
        self.flush()?;
        self.fm.read(&blk, &mut self.contents)?;
        self.blk = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Write the page to disk if it is dirty, honoring the write-ahead
    /// rule: the log is flushed through this page's LSN first.
    ///
    /// The LSN is kept after the flush so repeated flushes stay idempotent.
    pub(crate) fn flush(&mut self) -> BufferResult<()> {
        if self.txnum.is_some() {
            if let Some(lsn) = self.lsn {
                self.lm.lock().unwrap().flush(lsn)?;
            }
            if let Some(blk) = &self.blk {
                self.fm.write(blk, &self.contents)?;
            }
            self.txnum = None;
        }
        Ok(())
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) -> BufferResult<()> {
        if self.pins == 0 {
            return Err(BufferError::PinUnderflow);
        }
        self.pins -= 1;
        Ok(())
    }
}

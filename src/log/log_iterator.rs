use std::sync::Arc;

use super::error::{LogError, LogResult};
use crate::file::{BlockId, FileManager, Page};

/// Reader over the log in reverse chronological order.
///
/// Iteration starts at the most recent record of the given block and walks
/// forward through the page (records within a page sit newest-first, since
/// the boundary is on the left), then moves to the previous block, down to
/// block 0.
pub struct LogIterator {
    fm: Arc<FileManager>,
    blk: BlockId,
    page: Page,
    current_pos: usize,
}

impl LogIterator {
    /// Position the iterator at the most recent record of `blk`
    pub fn new(fm: Arc<FileManager>, blk: BlockId) -> LogResult<Self> {
        let page = Page::new(fm.block_size());
        let mut iter = Self {
            fm,
            blk,
            page,
            current_pos: 0,
        };
        iter.move_to_block()?;
        Ok(iter)
    }

    /// Whether another record is available, on this block or an earlier one
    pub fn has_next(&self) -> bool {
        self.current_pos < self.fm.block_size() || self.blk.number() > 0
    }

    /// Read the next record, moving to the previous block when the current
    /// page is exhausted
    pub fn next_record(&mut self) -> LogResult<Vec<u8>> {
        if self.current_pos >= self.fm.block_size() {
            if self.blk.number() == 0 {
                return Err(LogError::NoMoreRecords);
            }
            self.blk = BlockId::new(self.blk.file_name(), self.blk.number() - 1);
            self.move_to_block()?;
        }

        let record = self.page.get_bytes(self.current_pos)?.to_vec();
        self.current_pos += 4 + record.len();
        Ok(record)
    }

    fn move_to_block(&mut self) -> LogResult<()> {
        self.fm.read(&self.blk, &mut self.page)?;
        let boundary = self.page.get_int(0)?;
        if boundary < 4 || boundary as usize > self.fm.block_size() {
            return Err(LogError::File(crate::file::FileError::InvalidFormat(
                format!("log boundary {} out of range in {}", boundary, self.blk),
            )));
        }
        self.current_pos = boundary as usize;
        Ok(())
    }
}

impl Iterator for LogIterator {
    type Item = LogResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_record())
    }
}

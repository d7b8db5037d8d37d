use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use super::error::{BufferError, BufferResult};
use super::frame::Buffer;
use super::TxId;
use crate::file::{BlockId, FileManager};
use crate::log::LogManager;

/// Default ceiling on how long a pin call waits for a free frame
const MAX_TIME_MS: u64 = 10_000;

/// Polling interval while waiting for a frame to become available
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed pool of page frames with pin/unpin discipline.
///
/// Eviction picks the first unpinned frame, scanning from frame 0. When
/// every frame is pinned, `pin` polls until a frame frees up or the
/// configured wait ceiling passes; the polling sleep stands in for a
/// condition-variable wait in a multi-threaded implementation.
pub struct BufferManager {
    pool: Vec<Buffer>,
    num_available: usize,
    max_time_ms: u64,
    fm: Arc<FileManager>,
}

impl BufferManager {
    /// Create a pool of `numbuffs` frames
    pub fn new(fm: Arc<FileManager>, lm: Arc<Mutex<LogManager>>, numbuffs: usize) -> Self {
        let pool = (0..numbuffs)
            .map(|_| Buffer::new(Arc::clone(&fm), Arc::clone(&lm)))
            .collect();
        Self {
            pool,
            num_available: numbuffs,
            max_time_ms: MAX_TIME_MS,
            fm,
        }
    }

    /// Number of currently unpinned frames
    pub fn available(&self) -> usize {
        self.num_available
    }

    /// Flush every frame dirtied by transaction `txnum`
    pub fn flush_all(&mut self, txnum: TxId) -> BufferResult<()> {
        for buffer in &mut self.pool {
            if buffer.modifying_tx() == Some(txnum) {
                buffer.flush()?;
            }
        }
        Ok(())
    }

    /// Pin the frame holding `blk`, assigning a frame if necessary, and
    /// return its index.
    ///
    /// When the pool is exhausted the call polls until a frame frees up;
    /// past the wait ceiling it fails with [`BufferError::Abort`], the
    /// signal for the caller to abort its transaction.
    pub fn pin(&mut self, blk: &BlockId) -> BufferResult<usize> {
        let start = Instant::now();
        loop {
            if let Some(idx) = self.try_to_pin(blk)? {
                return Ok(idx);
            }
            if start.elapsed() >= Duration::from_millis(self.max_time_ms) {
                warn!(block = %blk, waited_ms = self.max_time_ms, "buffer pool exhausted");
                return Err(BufferError::Abort {
                    waited_ms: self.max_time_ms,
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// Release one pin on frame `idx`
    pub fn unpin(&mut self, idx: usize) -> BufferResult<()> {
        let buffer = self
            .pool
            .get_mut(idx)
            .ok_or(BufferError::InvalidBuffer(idx))?;
        buffer.unpin()?;
        if !buffer.is_pinned() {
            self.num_available += 1;
        }
        Ok(())
    }

    /// The frame at `idx`
    pub fn buffer(&self, idx: usize) -> Option<&Buffer> {
        self.pool.get(idx)
    }

    /// The frame at `idx`, for modification
    pub fn buffer_mut(&mut self, idx: usize) -> Option<&mut Buffer> {
        self.pool.get_mut(idx)
    }

    /// The file manager backing this pool
    pub fn file_mgr(&self) -> &Arc<FileManager> {
        &self.fm
    }

    /// Set the wait ceiling for `pin`, in milliseconds
    pub fn set_max_time(&mut self, max_time_ms: u64) {
        self.max_time_ms = max_time_ms;
    }

    fn try_to_pin(&mut self, blk: &BlockId) -> BufferResult<Option<usize>> {
        let idx = match self.find_existing_buffer(blk) {
            Some(idx) => idx,
            None => match self.choose_unpinned_buffer() {
                Some(idx) => {
                    self.pool[idx].assign_to_block(blk.clone())?;
                    idx
                }
                None => return Ok(None),
            },
        };

        if !self.pool[idx].is_pinned() {
            self.num_available -= 1;
        }
        self.pool[idx].pin();
        Ok(Some(idx))
    }

    fn find_existing_buffer(&self, blk: &BlockId) -> Option<usize> {
        self.pool.iter().position(|b| b.block() == Some(blk))
    }

    fn choose_unpinned_buffer(&self) -> Option<usize> {
        self.pool.iter().position(|b| !b.is_pinned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Page;
    use crate::log::LogIterator;
    use tempfile::TempDir;

    const BLOCK_SIZE: usize = 400;
    const LOG_FILE: &str = "minidb.log";

    fn setup(numbuffs: usize) -> (TempDir, Arc<FileManager>, BufferManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let fm = Arc::new(FileManager::new(temp_dir.path().join("db"), BLOCK_SIZE).unwrap());
        let lm = Arc::new(Mutex::new(
            LogManager::new(Arc::clone(&fm), LOG_FILE).unwrap(),
        ));
        let bm = BufferManager::new(Arc::clone(&fm), lm, numbuffs);
        (temp_dir, fm, bm)
    }

    fn blocks(fm: &FileManager, n: usize) -> Vec<BlockId> {
        (0..n).map(|_| fm.append("data.tbl").unwrap()).collect()
    }

    #[test]
    fn test_initial_state() {
        let (_temp_dir, _fm, bm) = setup(3);
        assert_eq!(bm.available(), 3);
    }

    #[test]
    fn test_pin_conservation() {
        let (_temp_dir, fm, mut bm) = setup(3);
        let blks = blocks(&fm, 3);

        let idx0 = bm.pin(&blks[0]).unwrap();
        assert_eq!(bm.available(), 2);

        // A second pin on the same block hits the same frame and does not
        // change availability
        let again = bm.pin(&blks[0]).unwrap();
        assert_eq!(again, idx0);
        assert_eq!(bm.available(), 2);

        bm.pin(&blks[1]).unwrap();
        assert_eq!(bm.available(), 1);

        bm.unpin(idx0).unwrap();
        assert_eq!(bm.available(), 1);
        bm.unpin(idx0).unwrap();
        assert_eq!(bm.available(), 2);
    }

    #[test]
    fn test_unpin_underflow_is_error() {
        let (_temp_dir, fm, mut bm) = setup(2);
        let blks = blocks(&fm, 1);

        let idx = bm.pin(&blks[0]).unwrap();
        bm.unpin(idx).unwrap();
        assert!(matches!(bm.unpin(idx), Err(BufferError::PinUnderflow)));
    }

    #[test]
    fn test_unpin_invalid_index_is_error() {
        let (_temp_dir, _fm, mut bm) = setup(2);
        assert!(matches!(bm.unpin(7), Err(BufferError::InvalidBuffer(7))));
    }

    #[test]
    fn test_eviction_picks_first_unpinned_frame() {
        let (_temp_dir, fm, mut bm) = setup(3);
        let blks = blocks(&fm, 4);

        let idx0 = bm.pin(&blks[0]).unwrap();
        let idx1 = bm.pin(&blks[1]).unwrap();
        let idx2 = bm.pin(&blks[2]).unwrap();
        bm.unpin(idx1).unwrap();

        // Frame idx1 is the only unpinned frame, so the new block lands there
        let idx3 = bm.pin(&blks[3]).unwrap();
        assert_eq!(idx3, idx1);
        assert_eq!(bm.buffer(idx0).unwrap().block(), Some(&blks[0]));
        assert_eq!(bm.buffer(idx2).unwrap().block(), Some(&blks[2]));
    }

    #[test]
    fn test_pinned_frames_never_evicted() {
        let (_temp_dir, fm, mut bm) = setup(2);
        bm.set_max_time(100);
        let blks = blocks(&fm, 3);

        bm.pin(&blks[0]).unwrap();
        bm.pin(&blks[1]).unwrap();

        assert!(matches!(bm.pin(&blks[2]), Err(BufferError::Abort { .. })));
        assert_eq!(bm.buffer(0).unwrap().block(), Some(&blks[0]));
        assert_eq!(bm.buffer(1).unwrap().block(), Some(&blks[1]));
    }

    #[test]
    fn test_pool_exhaustion_aborts_after_max_time() {
        let (_temp_dir, fm, mut bm) = setup(2);
        bm.set_max_time(100);
        let blks = blocks(&fm, 3);

        bm.pin(&blks[0]).unwrap();
        bm.pin(&blks[1]).unwrap();

        let start = Instant::now();
        let result = bm.pin(&blks[2]);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(matches!(result, Err(BufferError::Abort { waited_ms: 100 })));
    }

    #[test]
    fn test_eviction_flushes_dirty_page() {
        let (_temp_dir, fm, mut bm) = setup(2);
        let blks = blocks(&fm, 3);

        // Dirty block 0, then release it so it becomes an eviction victim
        let idx = bm.pin(&blks[0]).unwrap();
        let buffer = bm.buffer_mut(idx).unwrap();
        buffer.contents_mut().set_int(80, 4242).unwrap();
        buffer.set_modified(1, None);
        bm.unpin(idx).unwrap();

        // Cycle the remaining frames so block 0's frame is reassigned
        let idx = bm.pin(&blks[1]).unwrap();
        bm.unpin(idx).unwrap();
        bm.pin(&blks[2]).unwrap();

        // The eviction must have written block 0 back
        let mut page = Page::new(BLOCK_SIZE);
        fm.read(&blks[0], &mut page).unwrap();
        assert_eq!(page.get_int(80).unwrap(), 4242);
    }

    #[test]
    fn test_wal_record_durable_before_eviction_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fm = Arc::new(FileManager::new(temp_dir.path().join("db"), BLOCK_SIZE).unwrap());
        let lm = Arc::new(Mutex::new(
            LogManager::new(Arc::clone(&fm), LOG_FILE).unwrap(),
        ));
        let mut bm = BufferManager::new(Arc::clone(&fm), Arc::clone(&lm), 2);
        let blks = blocks(&fm, 3);

        // Modify block 0 under an unflushed log record
        let lsn = lm.lock().unwrap().append(b"set age to 26").unwrap();
        let idx = bm.pin(&blks[0]).unwrap();
        let buffer = bm.buffer_mut(idx).unwrap();
        buffer.contents_mut().set_int(0, 26).unwrap();
        buffer.set_modified(1, Some(lsn));
        bm.unpin(idx).unwrap();

        let idx = bm.pin(&blks[1]).unwrap();
        bm.unpin(idx).unwrap();
        bm.pin(&blks[2]).unwrap();

        // Both the log record and the page are on disk after the eviction
        let mut iter = LogIterator::new(Arc::clone(&fm), BlockId::new(LOG_FILE, 0)).unwrap();
        assert_eq!(iter.next_record().unwrap(), b"set age to 26");
        let mut page = Page::new(BLOCK_SIZE);
        fm.read(&blks[0], &mut page).unwrap();
        assert_eq!(page.get_int(0).unwrap(), 26);
    }

    #[test]
    fn test_flush_all_targets_one_transaction() {
        let (_temp_dir, fm, mut bm) = setup(3);
        let blks = blocks(&fm, 2);

        let idx0 = bm.pin(&blks[0]).unwrap();
        let buffer = bm.buffer_mut(idx0).unwrap();
        buffer.contents_mut().set_int(0, 10).unwrap();
        buffer.set_modified(1, None);

        let idx1 = bm.pin(&blks[1]).unwrap();
        let buffer = bm.buffer_mut(idx1).unwrap();
        buffer.contents_mut().set_int(0, 20).unwrap();
        buffer.set_modified(2, None);

        bm.flush_all(1).unwrap();

        assert!(bm.buffer(idx0).unwrap().modifying_tx().is_none());
        assert_eq!(bm.buffer(idx1).unwrap().modifying_tx(), Some(2));

        let mut page = Page::new(BLOCK_SIZE);
        fm.read(&blks[0], &mut page).unwrap();
        assert_eq!(page.get_int(0).unwrap(), 10);
    }
}

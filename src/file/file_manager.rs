use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::error::{FileError, FileResult};
use super::{BlockId, Page};

/// Block-level I/O on the files of one database directory.
///
/// Every file is a whole number of `block_size`-byte blocks, and all I/O is
/// aligned on block boundaries. All methods take `&self`: a single internal
/// mutex serializes disk access and guards the open-file and cached-length
/// maps, so the manager is shared as `Arc<FileManager>` by the log and
/// buffer layers.
pub struct FileManager {
    db_directory: PathBuf,
    block_size: usize,
    is_new: bool,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Open file handles, keyed by file name
    open_files: HashMap<String, File>,
    /// Cached file lengths in blocks, refreshed on append and write
    lengths: HashMap<String, usize>,
}

impl FileManager {
    /// Open the database directory, creating it if necessary.
    ///
    /// Leftover files whose names start with `temp` are deleted.
    pub fn new(db_directory: impl AsRef<Path>, block_size: usize) -> FileResult<Self> {
        let db_directory = db_directory.as_ref().to_path_buf();

        let is_new = !db_directory.exists();
        if is_new {
            fs::create_dir_all(&db_directory)?;
            debug!(dir = %db_directory.display(), "created database directory");
        }

        // Purge temporary files left over from a previous run
        for entry in fs::read_dir(&db_directory)? {
            let entry = entry?;
            let name = entry.file_name();
            if entry.file_type()?.is_file() && name.to_string_lossy().starts_with("temp") {
                fs::remove_file(entry.path())?;
                debug!(file = %name.to_string_lossy(), "removed temporary file");
            }
        }

        Ok(Self {
            db_directory,
            block_size,
            is_new,
            inner: Mutex::new(Inner {
                open_files: HashMap::new(),
                lengths: HashMap::new(),
            }),
        })
    }

    /// Read block `blk` into `page`.
    ///
    /// If the file does not exist, or the block lies past the end of the
    /// file, the page is left untouched: callers rely on `append` having
    /// zero-filled new blocks on disk.
    pub fn read(&self, blk: &BlockId, page: &mut Page) -> FileResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let len = self
            .length_locked(&mut inner, blk.file_name())
            .map_err(|e| block_io(blk, e))?;
        if blk.number() >= len {
            return Ok(());
        }

        let pos = (blk.number() * self.block_size) as u64;
        let file = inner
            .file(&self.db_directory, blk.file_name())
            .map_err(|e| block_io(blk, e))?;
        file.seek(SeekFrom::Start(pos)).map_err(|e| block_io(blk, e))?;
        file.read_exact(page.contents_mut())
            .map_err(|e| block_io(blk, e))?;

        Ok(())
    }

    /// Write `page` to block `blk`, flushing the write to the OS
    pub fn write(&self, blk: &BlockId, page: &Page) -> FileResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let pos = (blk.number() * self.block_size) as u64;
        let file = inner
            .file(&self.db_directory, blk.file_name())
            .map_err(|e| block_io(blk, e))?;
        file.seek(SeekFrom::Start(pos)).map_err(|e| block_io(blk, e))?;
        file.write_all(page.contents()).map_err(|e| block_io(blk, e))?;
        file.sync_data().map_err(|e| block_io(blk, e))?;

        // Refresh the cached length from the handle we just wrote through
        let file_size = file.metadata().map_err(|e| block_io(blk, e))?.len() as usize;
        inner
            .lengths
            .insert(blk.file_name().to_string(), file_size / self.block_size);

        Ok(())
    }

    /// Extend `filename` by one zero-filled block and return its id.
    ///
    /// The returned block number equals the pre-append length in blocks.
    pub fn append(&self, filename: &str) -> FileResult<BlockId> {
        let mut inner = self.inner.lock().unwrap();

        let new_blknum = self
            .length_locked(&mut inner, filename)
            .map_err(FileError::Io)?;
        let blk = BlockId::new(filename, new_blknum);

        let zeros = vec![0u8; self.block_size];
        let pos = (new_blknum * self.block_size) as u64;
        let file = inner
            .file(&self.db_directory, filename)
            .map_err(|e| block_io(&blk, e))?;
        file.seek(SeekFrom::Start(pos)).map_err(|e| block_io(&blk, e))?;
        file.write_all(&zeros).map_err(|e| block_io(&blk, e))?;
        file.sync_data().map_err(|e| block_io(&blk, e))?;

        inner.lengths.insert(filename.to_string(), new_blknum + 1);

        Ok(blk)
    }

    /// Length of `filename` in blocks
    pub fn length(&self, filename: &str) -> FileResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        self.length_locked(&mut inner, filename).map_err(FileError::Io)
    }

    /// Block size all files are divided into
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the database directory was created by this manager
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    fn length_locked(&self, inner: &mut Inner, filename: &str) -> io::Result<usize> {
        if let Some(&len) = inner.lengths.get(filename) {
            return Ok(len);
        }

        let blocks = match fs::metadata(self.db_directory.join(filename)) {
            Ok(meta) => meta.len() as usize / self.block_size,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        inner.lengths.insert(filename.to_string(), blocks);
        Ok(blocks)
    }
}

impl Inner {
    /// Open `filename` for read/write, creating it on first use, and cache
    /// the handle
    fn file(&mut self, dir: &Path, filename: &str) -> io::Result<&mut File> {
        match self.open_files.entry(filename.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(dir.join(filename))?;
                Ok(entry.insert(file))
            }
        }
    }
}

fn block_io(blk: &BlockId, source: io::Error) -> FileError {
    FileError::BlockIo {
        file: blk.file_name().to_string(),
        block: blk.number(),
        source,
    }
}

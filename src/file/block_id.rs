use std::fmt;

use super::BlockNum;

/// Reference to one block of one file.
///
/// Ordered by file name first, then block number, so block ids sort in
/// on-disk order within a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    file_name: String,
    blknum: BlockNum,
}

impl BlockId {
    /// Create a reference to block `blknum` of `file_name`
    pub fn new(file_name: impl Into<String>, blknum: BlockNum) -> Self {
        Self {
            file_name: file_name.into(),
            blknum,
        }
    }

    /// Name of the containing file
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Block number within the file
    pub fn number(&self) -> BlockNum {
        self.blknum
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.blknum)
    }
}

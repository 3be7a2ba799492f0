//! Read/write driver for the FATX filesystem used by original Xbox hard disks.

mod block_dev;
mod dir;
mod error;
mod fat;
mod fs;
mod layout;

pub use block_dev::BlockDevice;
pub use error::{FatxError, Result};
pub use fat::{Fat, FatWidth};
pub use fs::{FatxFs, ROOT_CLUSTER};
pub use layout::{
  Attributes, DirEntry, PartitionHeader, DIRENT_SZ, FAT_OFFSET, NAME_LENGTH_LIMIT, PARTITION_TABLE,
};

/// device sector size in bytes
pub const SECTOR_SZ: usize = 512;

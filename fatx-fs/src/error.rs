use std::io;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, FatxError>;

#[derive(Debug, Error)]
pub enum FatxError {
  #[error("no FATX signature at partition start")]
  InvalidSignature,
  #[error("partition index {0} out of range")]
  InvalidPartitionIndex(usize),
  #[error("no such entry: {0}")]
  NotFound(String),
  #[error("more than one directory entry matches {0}")]
  Ambiguous(String),
  #[error("already exists: {0}")]
  AlreadyExists(String),
  #[error("no contiguous run of {0} free clusters")]
  OutOfSpace(usize),
  #[error("corrupt cluster chain at cluster {0}")]
  CorruptChain(u32),
  #[error("cluster chain ends {0} bytes short of the data")]
  ShortChain(usize),
  #[error("name not representable in a FATX record: {0:?}")]
  InvalidName(String),
  #[error("device I/O failed: {0}")]
  Device(#[from] io::Error),
}

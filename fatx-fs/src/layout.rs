//! On-disk layout of a FATX partition

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::{
  error::{FatxError, Result},
  SECTOR_SZ,
};

/// partition signature
pub const FATX_MAGIC: [u8; 4] = *b"FATX";
/// size of the decoded header fields
pub const HEADER_SZ: usize = 16;
/// partition-relative byte offset of the allocation table
pub const FAT_OFFSET: u64 = 0x1000;
/// size of one directory record
pub const DIRENT_SZ: usize = 64;
/// longest representable name
pub const NAME_LENGTH_LIMIT: usize = 42;

/// name_length marker of a deleted record
pub const NAME_DELETED: u8 = 0xE5;
/// name_length marker terminating a directory
pub const NAME_END: u8 = 0xFF;

/// Retail Xbox hard-disk layout: (byte offset, byte size) per partition
pub const PARTITION_TABLE: [(u64, u64); 5] = [
  (0x0008_0000, 0x2EE0_0000),
  (0x2EE8_0000, 0x2EE0_0000),
  (0x5DC8_0000, 0x2EE0_0000),
  (0x8CA8_0000, 0x1F40_0000),
  (0xABE8_0000, 0x1_3200_0000),
];

/// Decoded FATX partition header
pub struct PartitionHeader {
  pub volume_id: u32,
  pub sectors_per_cluster: u32,
  pub root_cluster: u32,
}

impl PartitionHeader {
  /// Decode the 16 bytes at the start of a partition
  pub fn decode(raw: &[u8; HEADER_SZ]) -> Result<Self> {
    if raw[0..4] != FATX_MAGIC {
      return Err(FatxError::InvalidSignature);
    }
    let header = Self {
      volume_id: LittleEndian::read_u32(&raw[4..8]),
      sectors_per_cluster: LittleEndian::read_u32(&raw[8..12]),
      root_cluster: LittleEndian::read_u32(&raw[12..16]),
    };
    // the console never writes a zero here
    if header.sectors_per_cluster == 0 {
      return Err(FatxError::InvalidSignature);
    }
    Ok(header)
  }

  pub fn encode(&self, raw: &mut [u8; HEADER_SZ]) {
    raw[0..4].copy_from_slice(&FATX_MAGIC);
    LittleEndian::write_u32(&mut raw[4..8], self.volume_id);
    LittleEndian::write_u32(&mut raw[8..12], self.sectors_per_cluster);
    LittleEndian::write_u32(&mut raw[12..16], self.root_cluster);
  }

  pub fn cluster_size(&self) -> usize {
    self.sectors_per_cluster as usize * SECTOR_SZ
  }
}

bitflags! {
  /// attribute byte of a directory record
  pub struct Attributes: u8 {
    const READ_ONLY = 0x01;
    const HIDDEN    = 0x02;
    const SYSTEM    = 0x04;
    const VOLUME    = 0x08;
    const DIRECTORY = 0x10;
    const ARCHIVE   = 0x20;
  }
}

/// One 64-byte directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
  pub name_length: u8,
  pub attributes: u8,
  pub raw_name: [u8; NAME_LENGTH_LIMIT],
  pub first_cluster: u32,
  pub file_size: u32,
  pub mod_time: u16,
  pub mod_date: u16,
  pub create_time: u16,
  pub create_date: u16,
  pub access_time: u16,
  pub access_date: u16,
}

impl DirEntry {
  pub fn new_file(name: &str, first_cluster: u32, file_size: u32) -> Result<Self> {
    Self::new(name, Attributes::empty(), first_cluster, file_size)
  }

  pub fn new_directory(name: &str, first_cluster: u32) -> Result<Self> {
    Self::new(name, Attributes::DIRECTORY, first_cluster, 0)
  }

  fn new(name: &str, attributes: Attributes, first_cluster: u32, file_size: u32) -> Result<Self> {
    if name.is_empty() || name.len() > NAME_LENGTH_LIMIT {
      return Err(FatxError::InvalidName(name.into()));
    }
    // unused name bytes stay 0xFF, as the console writes them
    let mut raw_name = [NAME_END; NAME_LENGTH_LIMIT];
    raw_name[..name.len()].copy_from_slice(name.as_bytes());
    Ok(Self {
      name_length: name.len() as u8,
      attributes: attributes.bits(),
      raw_name,
      first_cluster,
      file_size,
      mod_time: 0,
      mod_date: 0,
      create_time: 0,
      create_date: 0,
      access_time: 0,
      access_date: 0,
    })
  }

  /// Decode one record from 64 raw bytes
  pub fn decode(raw: &[u8]) -> Self {
    let mut raw_name = [0u8; NAME_LENGTH_LIMIT];
    raw_name.copy_from_slice(&raw[2..44]);
    Self {
      name_length: raw[0],
      attributes: raw[1],
      raw_name,
      first_cluster: LittleEndian::read_u32(&raw[44..48]),
      file_size: LittleEndian::read_u32(&raw[48..52]),
      mod_time: LittleEndian::read_u16(&raw[52..54]),
      mod_date: LittleEndian::read_u16(&raw[54..56]),
      create_time: LittleEndian::read_u16(&raw[56..58]),
      create_date: LittleEndian::read_u16(&raw[58..60]),
      access_time: LittleEndian::read_u16(&raw[60..62]),
      access_date: LittleEndian::read_u16(&raw[62..64]),
    }
  }

  /// Serialize into 64 raw bytes
  pub fn encode(&self, raw: &mut [u8]) {
    raw[0] = self.name_length;
    raw[1] = self.attributes;
    raw[2..44].copy_from_slice(&self.raw_name);
    LittleEndian::write_u32(&mut raw[44..48], self.first_cluster);
    LittleEndian::write_u32(&mut raw[48..52], self.file_size);
    LittleEndian::write_u16(&mut raw[52..54], self.mod_time);
    LittleEndian::write_u16(&mut raw[54..56], self.mod_date);
    LittleEndian::write_u16(&mut raw[56..58], self.create_time);
    LittleEndian::write_u16(&mut raw[58..60], self.create_date);
    LittleEndian::write_u16(&mut raw[60..62], self.access_time);
    LittleEndian::write_u16(&mut raw[62..64], self.access_date);
  }

  /// live record with a representable name
  pub fn is_valid(&self) -> bool {
    self.name_length >= 1 && self.name_length as usize <= NAME_LENGTH_LIMIT
  }

  pub fn is_deleted(&self) -> bool {
    self.name_length == NAME_DELETED
  }

  pub fn is_end_marker(&self) -> bool {
    self.name_length == NAME_END
  }

  pub fn is_directory(&self) -> bool {
    Attributes::from_bits_truncate(self.attributes).contains(Attributes::DIRECTORY)
  }

  /// Record name; empty for non-valid records
  pub fn name(&self) -> String {
    let len = if self.is_valid() { self.name_length as usize } else { 0 };
    String::from_utf8_lossy(&self.raw_name[..len]).into_owned()
  }

  /// ASCII case-insensitive name match over valid records
  pub fn matches(&self, name: &str) -> bool {
    self.is_valid() && self.name().eq_ignore_ascii_case(name)
  }
}

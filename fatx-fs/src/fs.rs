//! A mounted FATX volume: geometry, cluster I/O and namespace operations

use std::sync::Arc;

use log::{debug, info};

use crate::{
  block_dev::BlockDevice,
  dir,
  error::{FatxError, Result},
  fat::{Fat, FatWidth},
  layout::{
    DirEntry, PartitionHeader, DIRENT_SZ, FAT_OFFSET, HEADER_SZ, NAME_DELETED, NAME_END,
    PARTITION_TABLE,
  },
};

/// conventional first cluster of the root directory, written by `format`
pub const ROOT_CLUSTER: u32 = 1;

/// the FAT region and the data region both start 0x1000-aligned
const REGION_ALIGN: u64 = 0x1000;

fn round_up(value: u64, align: u64) -> u64 {
  (value + align - 1) / align * align
}

/// Exclusive owner of a mounted partition: the device handle, the
/// in-memory FAT and the current-directory state.
pub struct FatxFs {
  block_dev: Arc<dyn BlockDevice>,
  partition_offset: u64,
  partition_size: u64,
  cluster_size: usize,
  total_clusters: u32,
  /// partition-relative start of the cluster area
  data_offset: u64,
  fat: Fat,
  /// first cluster of the root directory, from the header
  root_cluster: u32,
  cur_cluster: u32,
  cur_dir: Vec<DirEntry>,
  dir_stack: Vec<u32>,
}

impl FatxFs {
  /// Mount the whole device as a single partition
  pub fn mount_default(block_dev: Arc<dyn BlockDevice>) -> Result<Self> {
    let size = block_dev.len()?;
    Self::mount_range(block_dev, 0, size)
  }

  /// Mount an entry of the fixed retail partition table
  pub fn mount_index(block_dev: Arc<dyn BlockDevice>, index: usize) -> Result<Self> {
    let (offset, size) = *PARTITION_TABLE
      .get(index)
      .ok_or(FatxError::InvalidPartitionIndex(index))?;
    Self::mount_range(block_dev, offset, size)
  }

  /// Mount the partition at an explicit byte range
  pub fn mount_range(block_dev: Arc<dyn BlockDevice>, offset: u64, size: u64) -> Result<Self> {
    let mut raw = [0u8; HEADER_SZ];
    block_dev.read_at(offset, &mut raw)?;
    let header = PartitionHeader::decode(&raw)?;

    let cluster_size = header.cluster_size();
    let total_clusters = (size / cluster_size as u64) as u32;
    let width = FatWidth::for_clusters(total_clusters as u64);
    let fat_bytes = total_clusters as u64 * width.entry_size() as u64;
    let data_offset = round_up(FAT_OFFSET + fat_bytes, REGION_ALIGN);

    let fat = Fat::load(&block_dev, offset + FAT_OFFSET, total_clusters, width)?;
    info!(
      "mounted FATX at {:#x}: {} clusters of {:#x} bytes, {:?}, data region at {:#x}, root at cluster {}",
      offset, total_clusters, cluster_size, width, data_offset, header.root_cluster
    );

    let mut fs = Self {
      block_dev,
      partition_offset: offset,
      partition_size: size,
      cluster_size,
      total_clusters,
      data_offset,
      fat,
      root_cluster: header.root_cluster,
      cur_cluster: header.root_cluster,
      cur_dir: Vec::new(),
      dir_stack: Vec::new(),
    };
    fs.cur_dir = fs.load_directory(fs.root_cluster)?;
    Ok(fs)
  }

  /// Write a blank FATX filesystem over the given partition range
  pub fn format(
    block_dev: &Arc<dyn BlockDevice>,
    offset: u64,
    size: u64,
    sectors_per_cluster: u32,
  ) -> Result<()> {
    let header = PartitionHeader {
      volume_id: 0,
      sectors_per_cluster,
      root_cluster: ROOT_CLUSTER,
    };
    let cluster_size = header.cluster_size();
    let total_clusters = (size / cluster_size as u64) as u32;
    let width = FatWidth::for_clusters(total_clusters as u64);

    let mut raw = [0u8; HEADER_SZ];
    header.encode(&mut raw);
    block_dev.write_at(offset, &raw)?;

    let mut fat = Fat::new(total_clusters, width);
    fat.set(0, width.media_mark());
    fat.set(ROOT_CLUSTER, width.end_sentinel());
    fat.flush(block_dev, offset + FAT_OFFSET)?;

    // empty root: one cluster of terminator bytes
    let fat_bytes = total_clusters as u64 * width.entry_size() as u64;
    let data_offset = round_up(FAT_OFFSET + fat_bytes, REGION_ALIGN);
    block_dev.write_at(offset + data_offset, &vec![NAME_END; cluster_size])?;
    Ok(())
  }

  pub fn cluster_size(&self) -> usize {
    self.cluster_size
  }

  pub fn total_clusters(&self) -> u32 {
    self.total_clusters
  }

  pub fn fat_width(&self) -> FatWidth {
    self.fat.width()
  }

  /// partition-relative start of the cluster area
  pub fn data_offset(&self) -> u64 {
    self.data_offset
  }

  pub fn partition_size(&self) -> u64 {
    self.partition_size
  }

  pub fn fat(&self) -> &Fat {
    &self.fat
  }

  /// first cluster of the root directory
  pub fn root_cluster(&self) -> u32 {
    self.root_cluster
  }

  /// first cluster of the current directory
  pub fn cur_cluster(&self) -> u32 {
    self.cur_cluster
  }

  /// parent first-clusters above the current directory, root end first
  pub fn dir_stack(&self) -> &[u32] {
    &self.dir_stack
  }

  /// Absolute byte offset of a cluster; cluster numbers start at 1
  fn cluster_offset(&self, cluster: u32) -> u64 {
    debug_assert!(cluster >= 1);
    self.partition_offset + self.data_offset + (cluster as u64 - 1) * self.cluster_size as u64
  }

  fn read_cluster(&self, cluster: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; self.cluster_size];
    self.block_dev.read_at(self.cluster_offset(cluster), &mut buf)?;
    Ok(buf)
  }

  /// Write up to one cluster of data at the cluster's offset
  fn write_cluster(&self, cluster: u32, data: &[u8]) -> Result<()> {
    let len = data.len().min(self.cluster_size);
    self.block_dev.write_at(self.cluster_offset(cluster), &data[..len])?;
    Ok(())
  }

  /// Whole chain contents, an exact multiple of the cluster size
  fn read_chain(&self, start: u32) -> Result<Vec<u8>> {
    let clusters = self.fat.chain(start)?;
    let mut data = Vec::with_capacity(clusters.len() * self.cluster_size);
    for cluster in clusters {
      data.extend_from_slice(&self.read_cluster(cluster)?);
    }
    Ok(data)
  }

  /// Write `data` over an existing chain, one cluster-sized slice at a time
  fn write_chain(&self, start: u32, data: &[u8]) -> Result<()> {
    let clusters = self.fat.chain(start)?;
    if data.len() > clusters.len() * self.cluster_size {
      return Err(FatxError::ShortChain(
        data.len() - clusters.len() * self.cluster_size,
      ));
    }
    for (slice, cluster) in data.chunks(self.cluster_size).zip(clusters) {
      self.write_cluster(cluster, slice)?;
    }
    Ok(())
  }

  fn load_directory(&self, cluster: u32) -> Result<Vec<DirEntry>> {
    Ok(dir::decode(&self.read_chain(cluster)?))
  }

  fn flush_fat(&self) -> Result<()> {
    self.fat.flush(&self.block_dev, self.partition_offset + FAT_OFFSET)
  }

  /// Borrow the single valid entry matching `name`
  fn lookup(&self, name: &str) -> Result<&DirEntry> {
    let idx = dir::find(&self.cur_dir, name)?;
    Ok(&self.cur_dir[idx])
  }

  pub fn stat(&self, name: &str) -> Result<DirEntry> {
    self.lookup(name).map(Clone::clone)
  }

  /// Existence check; only `NotFound` is mapped to `false`
  pub fn file_exists(&self, name: &str) -> Result<bool> {
    match dir::find(&self.cur_dir, name) {
      Ok(_) => Ok(true),
      Err(FatxError::NotFound(_)) => Ok(false),
      Err(e) => Err(e),
    }
  }

  /// Valid entries of the current directory, in directory order
  pub fn list(&self) -> Vec<DirEntry> {
    self.cur_dir.iter().filter(|e| e.is_valid()).cloned().collect()
  }

  /// Append an entry to the in-memory directory; callers save explicitly
  pub fn insert(&mut self, entry: DirEntry) {
    self.cur_dir.push(entry);
  }

  /// Drop tombstones and unknown records from the in-memory directory
  pub fn prune(&mut self) {
    dir::prune(&mut self.cur_dir);
  }

  /// Follow a slash-delimited path from the current directory.
  /// A leading slash restarts at the root; `..` above the root stays
  /// at the root.
  pub fn change_directory(&mut self, path: &str) -> Result<()> {
    if path.starts_with('/') {
      self.reset_to_root()?;
    }
    for segment in path.split('/').filter(|s| !s.is_empty()) {
      match segment {
        "." => {}
        ".." => match self.dir_stack.pop() {
          Some(parent) => self.enter(parent, None)?,
          None => self.reset_to_root()?,
        },
        name => {
          let entry = self.lookup(name)?;
          if !entry.is_directory() {
            return Err(FatxError::NotFound(name.into()));
          }
          let target = entry.first_cluster;
          let parent = self.cur_cluster;
          self.enter(target, Some(parent))?;
        }
      }
    }
    Ok(())
  }

  fn reset_to_root(&mut self) -> Result<()> {
    self.cur_dir = self.load_directory(self.root_cluster)?;
    self.cur_cluster = self.root_cluster;
    self.dir_stack.clear();
    Ok(())
  }

  fn enter(&mut self, cluster: u32, push_parent: Option<u32>) -> Result<()> {
    self.cur_dir = self.load_directory(cluster)?;
    self.cur_cluster = cluster;
    if let Some(parent) = push_parent {
      self.dir_stack.push(parent);
    }
    Ok(())
  }

  /// File contents, truncated to the size recorded in the directory
  pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
    let entry = self.lookup(name)?;
    let mut data = self.read_chain(entry.first_cluster)?;
    data.truncate(entry.file_size as usize);
    Ok(data)
  }

  /// Create `name` from `data`; the name must not exist yet.
  /// An empty file still occupies one cluster.
  pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
    if self.file_exists(name)? {
      return Err(FatxError::AlreadyExists(name.into()));
    }
    // the name must validate before the FAT is touched
    let mut entry = DirEntry::new_file(name, 0, data.len() as u32)?;
    let count = usize::max(1, (data.len() + self.cluster_size - 1) / self.cluster_size);
    entry.first_cluster = self.fat.allocate(count)?;
    if let Err(e) = self.reserve_records(self.cur_dir.len() + 1) {
      // hand the data clusters back; the failed call leaves no trace
      self.fat.free_chain(entry.first_cluster);
      return Err(e);
    }
    self.write_chain(entry.first_cluster, data)?;
    debug!("wrote {} ({} bytes) at cluster {}", name, data.len(), entry.first_cluster);
    self.insert(entry);
    self.save_directory()?;
    self.flush_fat()
  }

  /// Delete `name`: tombstone its record in place and free its chain
  pub fn remove(&mut self, name: &str) -> Result<()> {
    let idx = dir::find(&self.cur_dir, name)?;
    // the rewrite must have room before the chain comes down
    self.reserve_records(self.cur_dir.len())?;
    let first = self.cur_dir[idx].first_cluster;
    self.cur_dir[idx].name_length = NAME_DELETED;
    self.fat.free_chain(first);
    debug!("removed {} (chain at {})", name, first);
    self.save_directory()?;
    self.flush_fat()
  }

  /// Create a subdirectory; creating an existing directory succeeds,
  /// colliding with a file does not
  pub fn make_directory(&mut self, name: &str) -> Result<()> {
    match self.lookup(name) {
      Ok(entry) if entry.is_directory() => return Ok(()),
      Ok(_) => return Err(FatxError::AlreadyExists(name.into())),
      Err(FatxError::NotFound(_)) => {}
      Err(e) => return Err(e),
    }
    let mut entry = DirEntry::new_directory(name, 0)?;
    entry.first_cluster = self.fat.allocate(1)?;
    if let Err(e) = self.reserve_records(self.cur_dir.len() + 1) {
      self.fat.free_chain(entry.first_cluster);
      return Err(e);
    }
    self.write_cluster(entry.first_cluster, &vec![NAME_END; self.cluster_size])?;
    self.insert(entry);
    self.save_directory()?;
    self.flush_fat()
  }

  /// Grow the current directory's chain until it holds `records` entries
  /// plus the terminator. Mutating operations reserve ahead of their
  /// other FAT and directory changes, so an out-of-space growth failure
  /// surfaces while there is still nothing to undo.
  fn reserve_records(&mut self, records: usize) -> Result<()> {
    let bytes = (records + 1) * DIRENT_SZ;
    let clusters = self.fat.chain(self.cur_cluster)?;
    let needed = (bytes + self.cluster_size - 1) / self.cluster_size;
    if needed > clusters.len() {
      let grown = self.fat.allocate(needed - clusters.len())?;
      let last = clusters[clusters.len() - 1];
      self.fat.set(last, grown);
      debug!(
        "directory at cluster {} grew to {} clusters",
        self.cur_cluster, needed
      );
    }
    Ok(())
  }

  /// Rewrite the current directory over its cluster chain.
  /// The whole chain extent is blanked to 0xFF first so a shortened
  /// directory cannot leave stale records past the new terminator.
  pub fn save_directory(&mut self) -> Result<()> {
    self.reserve_records(self.cur_dir.len())?;
    let bytes = dir::encode(&self.cur_dir);
    let clusters = self.fat.chain(self.cur_cluster)?;
    let blank = vec![NAME_END; self.cluster_size];
    for cluster in &clusters {
      self.write_cluster(*cluster, &blank)?;
    }
    self.write_chain(self.cur_cluster, &bytes)
  }

  /// Persist the current directory and the allocation table
  pub fn flush(&mut self) -> Result<()> {
    self.save_directory()?;
    self.flush_fat()
  }
}

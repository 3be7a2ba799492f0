//! Recursive host-folder transfer into a mounted volume.
//! Host-path handling stays here; the driver only ever sees names and bytes.

use std::error::Error;
use std::fs;
use std::path::Path;

use fatx_fs::FatxFs;
use log::info;

/// Copy a host directory tree into the current directory.
/// A name that already exists on the volume fails the copy.
pub fn clone_tree(vol: &mut FatxFs, host: &Path) -> Result<(), Box<dyn Error>> {
  copy_tree(vol, host, false)
}

/// Copy a host directory tree, replacing files that already exist
pub fn overwrite_tree(vol: &mut FatxFs, host: &Path) -> Result<(), Box<dyn Error>> {
  copy_tree(vol, host, true)
}

fn copy_tree(vol: &mut FatxFs, host: &Path, overwrite: bool) -> Result<(), Box<dyn Error>> {
  for dirent in fs::read_dir(host)? {
    let dirent = dirent?;
    let name = dirent
      .file_name()
      .into_string()
      .map_err(|name| format!("non-unicode host name: {:?}", name))?;
    if dirent.file_type()?.is_dir() {
      vol.make_directory(&name)?;
      vol.change_directory(&name)?;
      copy_tree(vol, &dirent.path(), overwrite)?;
      vol.change_directory("..")?;
    } else {
      let data = fs::read(dirent.path())?;
      if overwrite && vol.file_exists(&name)? {
        vol.remove(&name)?;
      }
      info!("copying {} ({} bytes)", name, data.len());
      vol.write_file(&name, &data)?;
    }
  }
  Ok(())
}

//! Directory region codec: packed 64-byte records up to a 0xFF terminator

use crate::{
  error::{FatxError, Result},
  layout::{DirEntry, DIRENT_SZ, NAME_END},
};

/// Decode a directory's cluster data, stopping at the terminator record.
/// Tombstones and unknown records are kept in place so write-back does
/// not reorder the directory.
pub fn decode(bytes: &[u8]) -> Vec<DirEntry> {
  let mut entries = Vec::new();
  for raw in bytes.chunks_exact(DIRENT_SZ) {
    let entry = DirEntry::decode(raw);
    if entry.is_end_marker() {
      break;
    }
    entries.push(entry);
  }
  entries
}

/// Serialize entries followed by one fresh all-0xFF terminator record
pub fn encode(entries: &[DirEntry]) -> Vec<u8> {
  let mut bytes = vec![NAME_END; (entries.len() + 1) * DIRENT_SZ];
  for (i, entry) in entries.iter().enumerate() {
    entry.encode(&mut bytes[i * DIRENT_SZ..(i + 1) * DIRENT_SZ]);
  }
  bytes
}

/// Index of the single valid entry matching `name`, ASCII case-insensitive
pub fn find(entries: &[DirEntry], name: &str) -> Result<usize> {
  let mut matches = entries
    .iter()
    .enumerate()
    .filter(|(_, entry)| entry.matches(name));
  match (matches.next(), matches.next()) {
    (Some((idx, _)), None) => Ok(idx),
    (Some(_), Some(_)) => Err(FatxError::Ambiguous(name.into())),
    (None, _) => Err(FatxError::NotFound(name.into())),
  }
}

/// Keep only valid entries; used when exporting, never by normal file ops
pub fn prune(entries: &mut Vec<DirEntry>) {
  entries.retain(|entry| entry.is_valid());
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::NAME_DELETED;

  fn sample() -> Vec<DirEntry> {
    vec![
      DirEntry::new_file("first.bin", 2, 100).unwrap(),
      DirEntry::new_directory("sub", 3).unwrap(),
      DirEntry::new_file("second.bin", 4, 200).unwrap(),
    ]
  }

  #[test]
  fn round_trip_preserves_records() {
    let entries = sample();
    assert_eq!(decode(&encode(&entries)), entries);
  }

  #[test]
  fn encode_appends_fresh_terminator() {
    let entries = sample();
    let bytes = encode(&entries);
    assert_eq!(bytes.len(), (entries.len() + 1) * DIRENT_SZ);
    assert!(bytes[entries.len() * DIRENT_SZ..].iter().all(|b| *b == NAME_END));
  }

  #[test]
  fn decode_stops_at_terminator() {
    let mut bytes = encode(&sample());
    // a record past the terminator must be invisible
    let ghost = DirEntry::new_file("ghost", 9, 9).unwrap();
    let mut raw = [0u8; DIRENT_SZ];
    ghost.encode(&mut raw);
    bytes.extend_from_slice(&raw);
    assert_eq!(decode(&bytes).len(), 3);
  }

  #[test]
  fn decode_keeps_tombstones_in_place() {
    let mut entries = sample();
    entries[1].name_length = NAME_DELETED;
    let back = decode(&encode(&entries));
    assert_eq!(back.len(), 3);
    assert!(back[1].is_deleted());
    assert_eq!(back[2].name(), "second.bin");
  }

  #[test]
  fn find_is_case_insensitive() {
    let entries = sample();
    assert_eq!(find(&entries, "FIRST.BIN").unwrap(), 0);
    assert_eq!(find(&entries, "Sub").unwrap(), 1);
  }

  #[test]
  fn find_ignores_tombstones() {
    let mut entries = sample();
    entries[0].name_length = NAME_DELETED;
    assert!(matches!(
      find(&entries, "first.bin"),
      Err(FatxError::NotFound(_))
    ));
  }

  #[test]
  fn find_reports_duplicates() {
    let mut entries = sample();
    entries.push(DirEntry::new_file("FIRST.bin", 7, 1).unwrap());
    assert!(matches!(
      find(&entries, "first.bin"),
      Err(FatxError::Ambiguous(_))
    ));
  }

  #[test]
  fn prune_drops_dead_records() {
    let mut entries = sample();
    entries[1].name_length = NAME_DELETED;
    entries.push({
      let mut odd = DirEntry::new_file("odd", 8, 0).unwrap();
      odd.name_length = 0; // unknown marker
      odd
    });
    prune(&mut entries);
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.is_valid()));
  }
}

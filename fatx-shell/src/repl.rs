//! Interactive browser over a mounted volume

use std::io::{self, BufRead, Write};

use fatx_fs::FatxFs;

pub fn run(mut fs: FatxFs) -> io::Result<()> {
  let stdin = io::stdin();
  let mut out = io::stdout();
  write!(out, "fatx> ")?;
  out.flush()?;
  for line in stdin.lock().lines() {
    let line = line?;
    let mut words = line.split_whitespace();
    match words.next() {
      None => {}
      Some("cd") => match words.next() {
        Some(path) => {
          if let Err(e) = fs.change_directory(path) {
            println!("cd: {}", e);
          }
        }
        None => println!("cd: missing path"),
      },
      Some("ls") | Some("dir") => {
        for entry in fs.list() {
          let marker = if entry.is_directory() { "<DIR>" } else { "     " };
          println!("{} {:>10} {}", marker, entry.file_size, entry.name());
        }
      }
      Some("exit") | Some("quit") => break,
      Some(other) => println!("unknown command: {}", other),
    }
    write!(out, "fatx> ")?;
    out.flush()?;
  }
  Ok(())
}

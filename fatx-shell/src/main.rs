use clap::{App, AppSettings, Arg, SubCommand};
use fatx_fs::{BlockDevice, FatxFs};
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

mod mirror;
mod repl;

/// table index of the large data partition (E:)
const DATA_PARTITION: usize = 4;

/// Disk-image backing store
struct BlockFile(Mutex<std::fs::File>);

impl BlockFile {
  fn open(path: &str) -> io::Result<Arc<Self>> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(Arc::new(Self(Mutex::new(file))))
  }
}

impl BlockDevice for BlockFile {
  fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let mut file = self.0.lock().unwrap();
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
  }

  fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
    let mut file = self.0.lock().unwrap();
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)
  }

  fn len(&self) -> io::Result<u64> {
    Ok(self.0.lock().unwrap().metadata()?.len())
  }
}

fn main() {
  env_logger::init();
  if let Err(e) = run() {
    eprintln!("error: {}", e);
    std::process::exit(1);
  }
}

fn run() -> Result<(), Box<dyn Error>> {
  let matches = App::new("fatx")
    .about("FATX disk image tool")
    .setting(AppSettings::SubcommandRequiredElseHelp)
    .subcommand(
      SubCommand::with_name("browse")
        .about("mount a partition and explore it interactively")
        .arg(Arg::with_name("image").required(true).help("disk image path"))
        .arg(Arg::with_name("partition").help("table index, or byte offset when SIZE follows"))
        .arg(Arg::with_name("size").help("partition size in bytes")),
    )
    .subcommand(
      SubCommand::with_name("ndure")
        .about("install a folder onto the data partition")
        .arg(Arg::with_name("image").required(true).help("disk image path"))
        .arg(Arg::with_name("folder").required(true).help("host folder to install")),
    )
    .get_matches();

  match matches.subcommand() {
    ("browse", Some(sub)) => {
      let dev = BlockFile::open(sub.value_of("image").unwrap())?;
      let fs = match (sub.value_of("partition"), sub.value_of("size")) {
        (Some(offset), Some(size)) => {
          FatxFs::mount_range(dev, parse_number(offset)?, parse_number(size)?)?
        }
        (Some(index), None) => FatxFs::mount_index(dev, parse_number(index)? as usize)?,
        _ => FatxFs::mount_default(dev)?,
      };
      repl::run(fs)?;
    }
    ("ndure", Some(sub)) => {
      let folder = sub.value_of("folder").unwrap();
      let dev = BlockFile::open(sub.value_of("image").unwrap())?;
      let mut fs = FatxFs::mount_index(dev, DATA_PARTITION)?;
      mirror::overwrite_tree(&mut fs, Path::new(folder))?;
      fs.flush()?;
      println!("installed {}", folder);
    }
    _ => unreachable!(),
  }
  Ok(())
}

/// Accept decimal or 0x-prefixed hex
fn parse_number(text: &str) -> Result<u64, std::num::ParseIntError> {
  match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16),
    None => text.parse(),
  }
}

//! Reproducible archive writers.
//!
//! Both writers take a fully planned [`ArchivePlan`] and emit entries in plan
//! order with fixed metadata: modification time, owner ids and permission bits
//! never depend on the machine doing the packaging.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::{Compression, GzBuilder};
use tar::{EntryType, Header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::plan::{ArchivePlan, EntrySource, ensure_strictly_ordered};
use crate::consts::SOURCE_DATE_EPOCH;

/// Gzip OS byte for "unknown", so the header does not reveal the packaging host.
const GZIP_OS_UNKNOWN: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
  Tgz,
  Zip,
}

impl ArchiveFormat {
  pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Tgz, ArchiveFormat::Zip];

  pub fn extension(&self) -> &'static str {
    match self {
      ArchiveFormat::Tgz => "tgz",
      ArchiveFormat::Zip => "zip",
    }
  }
}

/// Write `plan` to `out` in the given format.
pub fn write_archive(plan: &ArchivePlan, format: ArchiveFormat, out: &Path) -> io::Result<()> {
  ensure_strictly_ordered(plan.entries()).map_err(io::Error::other)?;
  match format {
    ArchiveFormat::Tgz => write_tgz(plan, out),
    ArchiveFormat::Zip => write_zip(plan, out),
  }
}

fn write_tgz(plan: &ArchivePlan, out: &Path) -> io::Result<()> {
  let file = BufWriter::new(File::create(out)?);
  let encoder = GzBuilder::new()
    .mtime(0)
    .operating_system(GZIP_OS_UNKNOWN)
    .write(file, Compression::best());
  let mut builder = tar::Builder::new(encoder);

  for entry in plan.entries() {
    let mut header = Header::new_gnu();
    header.set_mode(entry.mode);
    header.set_mtime(SOURCE_DATE_EPOCH);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("")?;
    header.set_groupname("")?;

    match &entry.source {
      EntrySource::Directory => {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder.append_data(&mut header, format!("{}/", entry.path), io::empty())?;
      }
      EntrySource::File(source) => {
        let content = File::open(source)?;
        header.set_entry_type(EntryType::Regular);
        header.set_size(content.metadata()?.len());
        builder.append_data(&mut header, &entry.path, content)?;
      }
    }
  }

  let encoder = builder.into_inner()?;
  let mut file = encoder.finish()?;
  file.flush()
}

fn write_zip(plan: &ArchivePlan, out: &Path) -> io::Result<()> {
  let file = File::create(out)?;
  let mut zip = ZipWriter::new(file);

  for entry in plan.entries() {
    let options = zip_options(entry.mode);
    match &entry.source {
      EntrySource::Directory => {
        zip.add_directory(format!("{}/", entry.path), options).map_err(io::Error::other)?;
      }
      EntrySource::File(source) => {
        zip.start_file(entry.path.as_str(), options).map_err(io::Error::other)?;
        let mut content = File::open(source)?;
        io::copy(&mut content, &mut zip)?;
      }
    }
  }

  zip.finish().map_err(io::Error::other)?;
  Ok(())
}

/// Deflated, dated at the zip epoch, with explicit permissions.
fn zip_options(mode: u32) -> SimpleFileOptions {
  SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default())
    .unix_permissions(mode)
}

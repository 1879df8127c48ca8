//! Archive extraction and packaging.
//!
//! Extraction supports:
//! - `.zip`
//! - `.tar.gz` / `.tgz`
//! - `.tar`
//!
//! The format is sniffed from the file contents because downloaded objects keep
//! whatever key the producer chose. Packaging always produces a zip whose entries
//! are relative to the packaged directory.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("failed to walk directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("unsupported archive format: {0}")]
  UnsupportedFormat(PathBuf),

  #[error("archive entry '{0}' escapes the target directory")]
  UnsafeEntry(String),

  #[error("directory does not exist: {0}")]
  MissingDirectory(PathBuf),

  #[error("archive task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
  Zip,
  TarGz,
  Tar,
}

/// Unpack `archive_path` into `target_dir`, creating the directory if needed.
///
/// Returns the target directory on success.
pub async fn extract(archive_path: &Path, target_dir: &Path) -> Result<PathBuf, ArchiveError> {
  let archive_path = archive_path.to_path_buf();
  let target_dir = target_dir.to_path_buf();

  tokio::task::spawn_blocking(move || {
    extract_blocking(&archive_path, &target_dir)?;
    Ok::<_, ArchiveError>(target_dir)
  })
  .await?
}

/// Package the contents of `dir` into an in-memory zip archive.
pub async fn pack_directory(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
  let dir = dir.to_path_buf();
  tokio::task::spawn_blocking(move || pack_blocking(&dir)).await?
}

fn extract_blocking(archive_path: &Path, target_dir: &Path) -> Result<(), ArchiveError> {
  fs::create_dir_all(target_dir)?;

  let mut file = File::open(archive_path)?;
  let format = detect_format(&mut file)?.ok_or_else(|| ArchiveError::UnsupportedFormat(archive_path.to_path_buf()))?;
  debug!(archive = %archive_path.display(), ?format, "detected archive format");

  let reader = BufReader::new(file);
  match format {
    ArchiveFormat::Zip => unpack_zip(reader, target_dir)?,
    ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), target_dir)?,
    ArchiveFormat::Tar => unpack_tar(reader, target_dir)?,
  }

  info!(archive = %archive_path.display(), dest = %target_dir.display(), "unpacked archive");
  Ok(())
}

/// Sniff the archive format from its leading bytes, rewinding afterwards.
fn detect_format(file: &mut File) -> Result<Option<ArchiveFormat>, ArchiveError> {
  let mut header = [0u8; 512];
  let mut read = 0;
  while read < header.len() {
    let n = file.read(&mut header[read..])?;
    if n == 0 {
      break;
    }
    read += n;
  }
  file.seek(SeekFrom::Start(0))?;

  let header = &header[..read];
  let format = if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
    Some(ArchiveFormat::Zip)
  } else if header.starts_with(&[0x1f, 0x8b]) {
    Some(ArchiveFormat::TarGz)
  } else if header.len() >= 262 && &header[257..262] == b"ustar" {
    Some(ArchiveFormat::Tar)
  } else {
    None
  };

  Ok(format)
}

fn unpack_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<(), ArchiveError> {
  let mut archive = ZipArchive::new(reader)?;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i)?;

    let relative = entry
      .enclosed_name()
      .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
    let dest_path = dest.join(&relative);

    if entry.is_dir() {
      fs::create_dir_all(&dest_path)?;
      continue;
    }

    if entry.is_symlink() {
      let mut target = String::new();
      entry.read_to_string(&mut target)?;
      unpack_zip_symlink(dest, &dest_path, &target, entry.name())?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut outfile = File::create(&dest_path)?;
    io::copy(&mut entry, &mut outfile)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = entry.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o7777))?;
      }
    }
  }

  Ok(())
}

/// Recreate a symlink entry, refusing targets that resolve outside `dest`.
///
/// The link's parent is canonicalized so earlier links are accounted for, and
/// `..` is only allowed before the first normal component of the target.
#[cfg(unix)]
fn unpack_zip_symlink(dest: &Path, link_path: &Path, target: &str, name: &str) -> Result<(), ArchiveError> {
  use std::path::Component;

  let unsafe_entry = || ArchiveError::UnsafeEntry(name.to_string());

  let parent = link_path.parent().ok_or_else(unsafe_entry)?;
  fs::create_dir_all(parent)?;
  let root = dest.canonicalize()?;
  let mut resolved = parent.canonicalize()?;
  if !resolved.starts_with(&root) {
    return Err(unsafe_entry());
  }

  let mut descended = false;
  for component in Path::new(target).components() {
    match component {
      Component::Normal(part) => {
        descended = true;
        resolved.push(part);
      }
      Component::CurDir => {}
      Component::ParentDir if !descended => {
        resolved.pop();
      }
      _ => return Err(unsafe_entry()),
    }
  }
  if !resolved.starts_with(&root) {
    return Err(unsafe_entry());
  }

  if fs::symlink_metadata(link_path).is_ok() {
    fs::remove_file(link_path)?;
  }
  std::os::unix::fs::symlink(target, link_path)?;
  Ok(())
}

#[cfg(not(unix))]
fn unpack_zip_symlink(_dest: &Path, _link_path: &Path, _target: &str, name: &str) -> Result<(), ArchiveError> {
  Err(ArchiveError::UnsafeEntry(name.to_string()))
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<(), ArchiveError> {
  let mut archive = tar::Archive::new(reader);

  for entry in archive.entries()? {
    let mut entry = entry?;
    let name = entry.path()?.to_string_lossy().to_string();

    // unpack_in refuses entries that would land outside `dest`.
    if !entry.unpack_in(dest)? {
      return Err(ArchiveError::UnsafeEntry(name));
    }
  }

  Ok(())
}

fn pack_blocking(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
  if !dir.is_dir() {
    return Err(ArchiveError::MissingDirectory(dir.to_path_buf()));
  }

  let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
  let mut entries = 0usize;

  for entry in WalkDir::new(dir)
    .min_depth(1)
    .follow_links(true)
    .sort_by_file_name()
  {
    let entry = entry?;
    let relative = entry
      .path()
      .strip_prefix(dir)
      .map_err(|_| ArchiveError::UnsafeEntry(entry.path().display().to_string()))?;
    let name = zip_entry_name(relative);

    let options = entry_options(file_mode(entry.path())?);

    if entry.file_type().is_dir() {
      writer.add_directory(format!("{name}/"), options)?;
    } else {
      writer.start_file(name, options)?;
      let mut file = File::open(entry.path())?;
      io::copy(&mut file, &mut writer)?;
    }
    entries += 1;
  }

  let bytes = writer.finish()?.into_inner();
  info!(dir = %dir.display(), entries, size = bytes.len(), "packaged directory");
  Ok(bytes)
}

fn entry_options(mode: Option<u32>) -> SimpleFileOptions {
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  match mode {
    Some(mode) => options.unix_permissions(mode),
    None => options,
  }
}

/// Zip entry names always use `/`, whatever the host separator is.
fn zip_entry_name(relative: &Path) -> String {
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<Option<u32>> {
  use std::os::unix::fs::PermissionsExt;
  Ok(Some(fs::metadata(path)?.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<Option<u32>> {
  Ok(None)
}

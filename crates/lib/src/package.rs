//! Packaging the installed interpreter into a distributable tarball.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

/// Compress `folder` into `tarball` (`.tar.gz`), entries are rooted at the folder's name.
///
/// Symlinks are stored as symlinks.
pub fn compress_folder(folder: &Path, tarball: &Path) -> io::Result<()> {
  let root_name = folder
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("cannot package {}", folder.display())))?;

  if let Some(parent) = tarball.parent() {
    fs::create_dir_all(parent)?;
  }
  let encoder = GzEncoder::new(File::create(tarball)?, Compression::default());
  let mut builder = tar::Builder::new(encoder);
  builder.follow_symlinks(false);
  builder.append_dir_all(root_name, folder)?;
  builder.into_inner()?.finish()?;

  info!(folder = ?folder, tarball = ?tarball, "packaged");
  Ok(())
}

//! Filesystem helpers shared by module builders.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

#[cfg(test)]
pub mod testutil;

/// Normalize permissions of installed libraries: files 0644, executables and folders 0755.
///
/// Libtool `.la` files are left alone, and a missing folder is not an error.
pub fn fix_lib_permissions(folder: &Path) -> io::Result<()> {
  if !folder.is_dir() {
    return Ok(());
  }

  for entry in WalkDir::new(folder) {
    let entry = entry.map_err(io::Error::other)?;
    let file_type = entry.file_type();
    if file_type.is_symlink() || entry.path().extension().is_some_and(|ext| ext == "la") {
      continue;
    }
    set_normalized_mode(entry.path())?;
  }
  Ok(())
}

#[cfg(unix)]
fn set_normalized_mode(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = fs::metadata(path)?;
  let current_mode = metadata.permissions().mode() & 0o777;
  let new_mode = if metadata.is_dir() || (current_mode & 0o111 != 0) {
    0o755
  } else {
    0o644
  };

  if current_mode != new_mode {
    debug!(path = ?path, from = format!("{:o}", current_mode), to = format!("{:o}", new_mode), "fixing permissions");
    let mut perms = metadata.permissions();
    perms.set_mode(new_mode);
    fs::set_permissions(path, perms)?;
  }
  Ok(())
}

#[cfg(not(unix))]
fn set_normalized_mode(_path: &Path) -> io::Result<()> {
  Ok(())
}

/// Delete a file, symlink or folder; missing paths are fine
pub fn remove_path(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Entries of `folder`, sorted by name; empty if the folder does not exist
pub fn ls_dir(folder: &Path) -> io::Result<Vec<fs::DirEntry>> {
  if !folder.is_dir() {
    return Ok(Vec::new());
  }
  let mut entries = fs::read_dir(folder)?.collect::<io::Result<Vec<_>>>()?;
  entries.sort_by_key(|e| e.file_name());
  Ok(entries)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  #[cfg(unix)]
  fn lib_permissions_are_normalized() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let lib = temp.path().join("lib");
    fs::create_dir_all(lib.join("pkgconfig")).unwrap();
    let archive = lib.join("libz.a");
    let libtool = lib.join("libz.la");
    let shared = lib.join("libz.so");
    for (path, mode) in [(&archive, 0o600), (&libtool, 0o600), (&shared, 0o700)] {
      fs::write(path, b"x").unwrap();
      fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fix_lib_permissions(&lib).unwrap();

    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(&archive), 0o644);
    assert_eq!(mode(&libtool), 0o600);
    assert_eq!(mode(&shared), 0o755);
    assert_eq!(mode(&lib.join("pkgconfig")), 0o755);
  }

  #[test]
  fn missing_folder_is_fine() {
    let temp = TempDir::new().unwrap();
    fix_lib_permissions(&temp.path().join("nope")).unwrap();
    remove_path(&temp.path().join("nope")).unwrap();
    assert!(ls_dir(&temp.path().join("nope")).unwrap().is_empty());
  }

  #[test]
  fn remove_path_handles_files_and_folders() {
    let temp = TempDir::new().unwrap();
    let folder = temp.path().join("pkgs/sqlite3.30");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("x.c"), b"").unwrap();
    let file = temp.path().join("pkgs/README");
    fs::write(&file, b"").unwrap();

    remove_path(&folder).unwrap();
    remove_path(&file).unwrap();
    assert!(!folder.exists());
    assert!(!file.exists());
    assert!(ls_dir(&temp.path().join("pkgs")).unwrap().is_empty());
  }
}

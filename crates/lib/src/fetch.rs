//! Source tarball downloads and archive extraction.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tar::Archive;
use tracing::{debug, info};
use xz2::read::XzDecoder;

use crate::module::BuildError;

/// Downloads a URL to a local file, swapped out in tests
pub trait Fetcher {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildError>;
}

/// Downloads over HTTP(S) with a blocking reqwest client
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildError> {
    info!(url = %url, "fetching URL");
    let failed = |message: String| BuildError::FetchFailed {
      url: url.to_string(),
      message,
    };

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut response = reqwest::blocking::get(url).map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
      return Err(failed(format!("HTTP {}", response.status())));
    }

    // Write next to the destination first, an interrupted download never looks complete
    let partial = dest.with_extension("part");
    let mut file = File::create(&partial)?;
    let size = response.copy_to(&mut file).map_err(|e| failed(e.to_string()))?;
    drop(file);
    fs::rename(&partial, dest)?;

    info!(path = ?dest, size, "download complete");
    Ok(())
  }
}

/// Local file name for a download: last URL path segment, without query or fragment.
///
/// Falls back to a hash of the URL if no usable name can be extracted.
pub fn url_to_filename(url: &str) -> String {
  let trimmed = url.split(['?', '#']).next().unwrap_or(url);
  if let Some(filename) = trimmed.rsplit('/').next() {
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
  None,
  Gzip,
  Xz,
}

impl Compression {
  fn from_path(path: &Path) -> Option<Self> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Some(Self::Gzip)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
      Some(Self::Xz)
    } else if name.ends_with(".tar") {
      Some(Self::None)
    } else {
      None
    }
  }
}

/// Unpack a source archive into `dest`, stripping its top-level folder
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), BuildError> {
  let compression =
    Compression::from_path(archive_path).ok_or_else(|| BuildError::UnsupportedArchive(archive_path.to_path_buf()))?;

  fs::create_dir_all(dest)?;
  let file = BufReader::new(File::open(archive_path)?);
  let reader: Box<dyn Read> = match compression {
    Compression::None => Box::new(file),
    Compression::Gzip => Box::new(GzDecoder::new(file)),
    Compression::Xz => Box::new(XzDecoder::new(file)),
  };

  let count = unpack_stripped(Archive::new(reader), archive_path, dest)?;
  info!(archive = ?archive_path, dest = ?dest, entries = count, "unpacked");
  Ok(())
}

fn unpack_stripped<R: Read>(mut archive: Archive<R>, archive_path: &Path, dest: &Path) -> Result<usize, BuildError> {
  let mut count = 0;
  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?;

    // e.g. zlib-1.2.11/configure -> configure
    let stripped: PathBuf = path.components().skip(1).filter(|c| *c != Component::CurDir).collect();
    if stripped.as_os_str().is_empty() {
      continue;
    }
    if !stripped.components().all(|c| matches!(c, Component::Normal(_))) {
      return Err(BuildError::UnsafeArchiveEntry {
        archive: archive_path.to_path_buf(),
        entry: path.display().to_string(),
      });
    }

    let dest_path = dest.join(&stripped);
    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }
    debug!(path = ?stripped, "extracting");
    entry.unpack(&dest_path)?;
    count += 1;
  }
  Ok(count)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_tarball;
  use tempfile::TempDir;

  #[test]
  fn url_to_filename_simple() {
    assert_eq!(
      url_to_filename("https://zlib.net/fossils/zlib-1.2.11.tar.gz"),
      "zlib-1.2.11.tar.gz"
    );
  }

  #[test]
  fn url_to_filename_strips_query_and_fragment() {
    assert_eq!(
      url_to_filename("https://example.com/file.tar.gz?token=abc"),
      "file.tar.gz"
    );
    assert_eq!(url_to_filename("https://example.com/file.tar.xz#sha256"), "file.tar.xz");
    assert_eq!(
      url_to_filename("https://sourceforge.net/projects/tix/files/Tix8.4.3-src.tar.gz/download?use_mirror=x"),
      "download"
    );
  }

  #[test]
  fn url_to_filename_fallback_for_empty() {
    assert!(url_to_filename("https://example.com/").starts_with("download_"));
  }

  #[test]
  fn unpack_strips_top_level_folder() {
    let temp = TempDir::new().unwrap();
    for name in ["zlib-1.2.11.tar.gz", "zlib-1.2.11.tar.xz", "zlib-1.2.11.tar"] {
      let archive = temp.path().join(name);
      write_tarball(&archive, "zlib-1.2.11", &[("configure", "#!/bin/sh\n"), ("src/zlib.c", "int x;\n")]);

      let dest = temp.path().join(format!("out-{name}"));
      unpack_archive(&archive, &dest).unwrap();
      assert_eq!(fs::read_to_string(dest.join("configure")).unwrap(), "#!/bin/sh\n");
      assert!(dest.join("src/zlib.c").is_file());
      assert!(!dest.join("zlib-1.2.11").exists());
    }
  }

  #[test]
  fn unpack_refuses_entries_escaping_destination() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("evil-1.0.tar");

    // tar::Builder refuses ".." paths, so write the raw name ourselves
    let mut builder = tar::Builder::new(File::create(&archive).unwrap());
    for (name, content) in [("evil-1.0/configure", "ok"), ("evil-1.0/../../escape", "gotcha")] {
      let mut header = tar::Header::new_gnu();
      header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name.as_bytes());
      header.set_size(content.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      builder.append(&header, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap();

    let dest = temp.path().join("build/evil");
    let err = unpack_archive(&archive, &dest).unwrap_err();
    assert!(matches!(err, BuildError::UnsafeArchiveEntry { ref entry, .. } if entry.contains("escape")));
    assert!(!temp.path().join("escape").exists());
    assert!(!temp.path().join("build/escape").exists());
  }

  #[test]
  fn unpack_rejects_unknown_formats() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("sources.zip");
    fs::write(&archive, b"PK").unwrap();
    let err = unpack_archive(&archive, &temp.path().join("out")).unwrap_err();
    assert!(matches!(err, BuildError::UnsupportedArchive(_)));
  }
}

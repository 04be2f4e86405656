//! End-to-end compile runs through the public API, with fake build tools.
//!
//! The fake runner pretends `make install` installed something, so later
//! steps (environment of the next module, python finalization, packaging)
//! see a realistic tree.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use portable_python_lib::cmd::{Invocation, Runner};
use portable_python_lib::fetch::{Fetcher, unpack_archive};
use portable_python_lib::logs::LogCapture;
use portable_python_lib::module::BuildError;
use portable_python_lib::{BuildSetup, SetupOptions};
use tempfile::TempDir;

struct Seen {
  cwd: PathBuf,
  cmd: String,
  cpath: Option<String>,
}

/// Creates files on `make install` as the real tools would
struct FakeTools {
  deps: PathBuf,
  python_install: PathBuf,
  seen: RefCell<Vec<Seen>>,
}

impl Runner for FakeTools {
  fn run(&self, invocation: &Invocation<'_>, log: &LogCapture) -> Result<(), BuildError> {
    let cmd = invocation.command_line();
    log.append(format!("fake: {cmd}\n").as_bytes())?;
    self.seen.borrow_mut().push(Seen {
      cwd: invocation.cwd.to_path_buf(),
      cmd: cmd.clone(),
      cpath: invocation.env.get("CPATH").cloned(),
    });

    if cmd.starts_with("make install") {
      if invocation.cwd.ends_with("build/zlib") {
        fs::create_dir_all(self.deps.join("include")).unwrap();
        fs::create_dir_all(self.deps.join("lib")).unwrap();
        fs::write(self.deps.join("include/zlib.h"), b"").unwrap();
        fs::write(self.deps.join("lib/libz.a"), b"").unwrap();
      } else if invocation.cwd.ends_with("build/cpython") {
        let bin = self.python_install.join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(self.python_install.join("lib/python3.9/test")).unwrap();
        fs::write(bin.join("python3.9"), b"\x7fELF").unwrap();
        fs::write(bin.join("pip3.9"), b"#!/somewhere/bin/python3.9\n").unwrap();
        let lib_dynload = self.lib_dynload();
        fs::create_dir_all(&lib_dynload).unwrap();
        fs::write(lib_dynload.join("_bz2.cpython-39-x86_64-linux-gnu.so"), b"").unwrap();
        fs::write(lib_dynload.join("_ctypes.cpython-39-x86_64-linux-gnu_failed.so"), b"").unwrap();
      }
    }
    Ok(())
  }

  /// Answers like the installed python and `ldd` would
  fn capture(&self, invocation: &Invocation<'_>) -> Result<String, BuildError> {
    let cmd = invocation.command_line();
    self.seen.borrow_mut().push(Seen {
      cwd: invocation.cwd.to_path_buf(),
      cmd: cmd.clone(),
      cpath: None,
    });
    if invocation.program.ends_with("bin/python") {
      let payload = serde_json::json!({
        "version": "3.9.6",
        "lib_dynload": self.lib_dynload(),
        "report": {"zlib": {"version": "1.2.11", "version_field": "ZLIB_VERSION"}},
      });
      return Ok(payload.to_string());
    }
    if invocation.program == "ldd" {
      return Ok("\tlinux-vdso.so.1 (0x1)\n\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x2)\n".to_string());
    }
    Err(BuildError::CmdFailed { cmd, code: Some(127) })
  }
}

impl FakeTools {
  fn lib_dynload(&self) -> PathBuf {
    self.python_install.join("lib/python3.9/lib-dynload")
  }
}

/// Serves a minimal source tarball for any URL, compressed as its file name says
struct FakeMirror;

impl Fetcher for FakeMirror {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildError> {
    let mut builder = tar::Builder::new(Vec::new());
    let content = format!("# from {url}\n");
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    builder.append_data(&mut header, "sources/configure", content.as_bytes())?;
    let data = builder.into_inner()?;

    fs::create_dir_all(dest.parent().unwrap())?;
    let file = fs::File::create(dest)?;
    if dest.to_string_lossy().ends_with(".tar.xz") {
      let mut encoder = xz2::write::XzEncoder::new(file, 6);
      encoder.write_all(&data)?;
      encoder.finish()?;
    } else {
      let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
      encoder.write_all(&data)?;
      encoder.finish()?;
    }
    Ok(())
  }
}

fn setup(temp: &TempDir, modules: &str) -> BuildSetup {
  let options = SetupOptions {
    build_root: temp.path().join("build"),
    dist_root: temp.path().join("dist"),
    modules: Some(modules.to_string()),
    target: Some("linux-x86_64".to_string()),
    ..SetupOptions::default()
  };
  BuildSetup::new("cpython:3.9.6", options).unwrap()
}

#[test]
fn later_modules_see_earlier_installs() {
  let temp = TempDir::new().unwrap();
  let setup = setup(&temp, "zlib,xz");
  let tools = FakeTools {
    deps: setup.folders().deps.clone(),
    python_install: setup.python().install_folder(),
    seen: RefCell::new(Vec::new()),
  };
  setup.compile_with(false, &tools, &FakeMirror).unwrap();

  let seen = tools.seen.borrow();
  let zlib_configure = seen.iter().find(|s| s.cwd.ends_with("build/zlib")).unwrap();
  assert_eq!(zlib_configure.cpath, None);

  let xz_configure = seen.iter().find(|s| s.cwd.ends_with("build/xz")).unwrap();
  assert!(xz_configure.cmd.starts_with("./configure --prefix=/deps --disable-xz"));
  assert_eq!(
    xz_configure.cpath.as_deref(),
    Some(setup.folders().deps.join("include").display().to_string().as_str())
  );

  // Python got finalized: pip dropped, bin/python symlinked, tests removed
  let bin = setup.python().bin_folder();
  assert!(!bin.join("pip3.9").exists());
  assert!(bin.join("python").symlink_metadata().is_ok());
  assert!(!setup.python().install_folder().join("lib/python3.9/test").exists());
  assert!(seen.last().unwrap().cmd.ends_with("python3.9 -mcompileall"));
  drop(seen);

  // Extensions python failed to build were dropped, the rest only use base libraries
  let report = setup.verify_with(&tools).unwrap();
  assert_eq!(report.so_files.len(), 1);
  assert_eq!(report.modules["zlib"].version.as_deref(), Some("1.2.11"));
  let seen = tools.seen.borrow();
  assert!(seen.last().unwrap().cmd.starts_with("ldd "));

  let logs = setup.folders().logs.clone();
  let content = fs::read_to_string(logs.join("02-xz.log")).unwrap();
  assert!(content.contains("fake: make install DESTDIR="));
  assert!(logs.join("03-cpython.log").is_file());

  // Package the result and check it unpacks to the install tree
  let tarball = setup.package().unwrap().to_path_buf();
  assert!(tarball.ends_with("cpython-3.9.6-linux-x86_64.tar.gz"));
  let out = temp.path().join("unpacked");
  unpack_archive(&tarball, &out).unwrap();
  assert!(out.join("bin/python3.9").is_file());
}

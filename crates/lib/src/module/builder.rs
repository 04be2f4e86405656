//! The per-module compile pipeline: download, unpack, environment, build, finalize.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cmd::Invocation;
use crate::context::BuildContext;
use crate::fetch::{unpack_archive, url_to_filename};
use crate::module::env::exported_vars;
use crate::module::{BuildError, CompileSession, Module, ModuleDescriptor, Source};
use crate::platform::{Os, TargetSystem};
use crate::util::remove_path;

/// A module attached to a build: knows its build folder and resolved source
pub struct ModuleBuilder {
  name: String,
  module: Box<dyn Module>,
  build_folder: PathBuf,
  source: Source,
}

impl ModuleBuilder {
  pub fn attach(name: &str, module: Box<dyn Module>, ctx: &BuildContext) -> Self {
    let source = module.source(ctx);
    Self {
      name: name.to_string(),
      build_folder: ctx.folders.module_build(name),
      module,
      source,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn version(&self) -> &str {
    &self.source.version
  }

  pub fn build_folder(&self) -> &Path {
    &self.build_folder
  }

  pub fn descriptor(&self) -> ModuleDescriptor {
    self.module.descriptor()
  }

  /// Why this module won't be compiled for `target`, if it won't
  pub fn skip_reason(&self, target: &TargetSystem) -> Option<String> {
    self.descriptor().skip_reason(target)
  }

  /// Where the source tarball is stored, shared by all builds under the same root
  pub fn download_path(&self, ctx: &BuildContext) -> PathBuf {
    ctx.folders.downloads.join(url_to_filename(&self.source.url))
  }

  pub fn download(&self, session: &CompileSession<'_>) -> Result<PathBuf, BuildError> {
    let path = self.download_path(session.ctx);
    if path.exists() {
      info!(url = %self.source.url, "already downloaded");
    } else {
      session.fetcher.fetch(&self.source.url, &path)?;
    }
    Ok(path)
  }

  pub fn unpack(&self, session: &CompileSession<'_>) -> Result<(), BuildError> {
    let archive = self.download(session)?;
    remove_path(&self.build_folder)?;
    unpack_archive(&archive, &self.build_folder)
  }

  /// Run the whole pipeline, with output captured to this module's log file.
  ///
  /// In debug mode a module whose build folder already exists is only finalized again.
  pub fn compile(&self, session: &mut CompileSession<'_>) -> Result<(), BuildError> {
    let started = Instant::now();
    let log_path = session.next_log_path(&self.name);
    let _guard = session.logs.attach(&log_path)?;
    info!(module = %self.name, version = %self.source.version, log = ?log_path, "compiling");

    let resume = session.debug && self.build_folder.is_dir();
    if resume {
      info!(module = %self.name, "build folder exists, finalizing only");
    } else {
      self.unpack(session)?;
      let exported = exported_vars(self.module.exporters(), session.ctx);
      let extra = session.ctx.extra_env()?;
      session.env.apply(&exported, &extra);
    }

    let mut step = BuildStep::new(session, self.build_folder.clone());
    if !resume {
      self.module.prepare(&mut step)?;
      let target = &step.context().target;
      debug!(module = %self.name, platform = %target.platform(), "building");
      match target.os {
        Os::Linux => self.module.build_linux(&mut step)?,
        Os::MacOs => self.module.build_darwin(&mut step)?,
        _ => return Err(BuildError::UnsupportedPlatform(target.platform().to_string())),
      }
    }
    self.module.finalize(&mut step)?;

    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
    info!(
      "compiled {} {} in {}",
      self.name,
      self.source.version,
      humantime::format_duration(elapsed)
    );
    Ok(())
  }
}

impl fmt::Display for ModuleBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.name, self.source.version)
  }
}

impl fmt::Debug for ModuleBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModuleBuilder")
      .field("name", &self.name)
      .field("build_folder", &self.build_folder)
      .field("source", &self.source)
      .finish_non_exhaustive()
  }
}

/// Handle given to module hooks: runs programs in the right folder with the accumulated environment
pub struct BuildStep<'a, 's> {
  session: &'s mut CompileSession<'a>,
  build_folder: PathBuf,
  cwd: PathBuf,
}

impl<'a, 's> BuildStep<'a, 's> {
  pub fn new(session: &'s mut CompileSession<'a>, build_folder: PathBuf) -> Self {
    Self {
      session,
      cwd: build_folder.clone(),
      build_folder,
    }
  }

  pub fn context(&self) -> &'a BuildContext {
    self.session.ctx
  }

  pub fn build_folder(&self) -> &Path {
    &self.build_folder
  }

  /// Run subsequent commands from `relative` (to the unpacked sources)
  pub fn enter(&mut self, relative: &str) {
    self.cwd = self.build_folder.join(relative);
  }

  /// Run `program` from the current folder, empty arguments are dropped
  pub fn run<I, S>(&self, program: &str, args: I) -> Result<(), BuildError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let args: Vec<String> = args.into_iter().map(Into::into).filter(|a| !a.is_empty()).collect();
    let invocation = Invocation {
      program,
      args: &args,
      cwd: &self.cwd,
      env: self.session.env.vars(),
    };
    self.session.runner.run(&invocation, self.session.logs)
  }

  /// Run a program given by absolute path (e.g. the freshly built python)
  pub fn run_path<I, S>(&self, program: &Path, args: I) -> Result<(), BuildError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.run(&program.display().to_string(), args)
  }
}

/// The default build step: `configure`, `make`, `make install`.
///
/// Configure is skipped when the module has no configure program, make and make install always run.
pub fn configure_make_install<M: Module + ?Sized>(module: &M, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
  let ctx = step.context();
  if let Some(cwd) = module.configure_cwd() {
    step.enter(cwd);
  }

  if let Some(program) = module.configure_program() {
    let mut parts = program.split_whitespace();
    if let Some(executable) = parts.next() {
      let mut args: Vec<String> = parts.map(String::from).collect();
      if let Some(prefix) = module.configure_prefix(ctx) {
        args.push(format!("--prefix=/{}", prefix.trim_matches('/')));
      }
      args.extend(module.configure_args(ctx));
      step.run(executable, args)?;
    }
  }

  step.run("make", module.make_args(ctx))?;
  step.run("make", std::iter::once("install".to_string()).chain(module.make_install_args(ctx)))
}

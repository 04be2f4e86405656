//! portable-python-lib: build orchestration for portable python distributions
//!
//! This crate compiles CPython and the external C libraries it can use from
//! source tarballs, following the `configure && make && make install` protocol:
//! - `BuildSetup`: resolves which modules to build and drives the compilation
//! - `BuilderRegistry`: named module factories, see `recipes` for the concrete modules
//! - `ModuleBuilder`: per-module pipeline (download, unpack, environment, build, finalize)
//! - `PythonBuilder`: the interpreter build and its packaged tarball
//! - `PythonInspector`: checks that a built python only links against base system libraries

pub mod cmd;
pub mod config;
pub mod context;
pub mod fetch;
pub mod inspect;
pub mod logs;
pub mod module;
pub mod package;
pub mod platform;
pub mod python;
pub mod recipes;
pub mod registry;
pub mod setup;
pub mod util;
pub mod version;

pub use setup::{BuildSetup, ModuleSelection, SetupError, SetupOptions};

//! Resolve and stage the MinGW runtime DLLs an executable needs
//!
//! A binary built with MinGW imports DLLs from the toolchain's `bin`
//! directory (libgcc, libstdc++, Qt, ...). This crate reads the binary's PE
//! import table, walks the dependency graph restricted to DLLs present in
//! that directory, and copies the resulting closure next to the binary so it
//! runs on machines without the toolchain. Imports with no file in the
//! toolchain directory are taken to be system DLLs and left alone.

pub mod closure;
pub mod common;
pub mod deploy;
pub mod pe;
pub mod qt;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testutil;

pub use closure::{resolve_closure, Closure, DependencySet};
pub use common::StageError;
pub use deploy::{deploy_binary, DeployOptions, DeployReport};
pub use qt::QtMajor;
pub use toolchain::ToolchainDir;

//! The MinGW `bin` directory whose DLLs we are willing to stage
//!
//! Only files sitting directly in this directory count as managed
//! dependencies; anything else is assumed to be provided by the host system
//! and left alone.

use crate::common::StageError;
use std::path::{Path, PathBuf};

/// Root directory of the toolchain's redistributable DLLs
///
/// A single value of this type is threaded through the whole run; it is never
/// written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainDir {
    root: PathBuf,
}

impl ToolchainDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    /// Fall back to the directory the running program itself was started from
    ///
    /// The deploy tool is meant to be dropped into the MinGW `bin` directory,
    /// so its own location is the natural default.
    pub fn from_current_exe() -> Result<Self, StageError> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| {
            StageError::ContextDeductionError(format!(
                "the running executable {exe:?} has no parent directory"
            ))
        })?;
        Ok(Self::new(dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path a managed DLL with this name would have
    pub fn expand(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether `name` is a DLL we manage
    ///
    /// True iff a file with exactly that name exists directly inside the
    /// toolchain directory; case sensitivity is whatever the host filesystem
    /// does. No recursive search, no PATH search, no extension substitution.
    pub fn is_managed(&self, name: &str) -> bool {
        self.expand(name).is_file()
    }
}

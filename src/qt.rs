//! Detection of a Qt runtime among the staged DLLs
//!
//! Qt applications need more than the DLLs referenced from the import table
//! (platform plugins, image formats, translations). Staging those is
//! delegated wholesale to Qt's own `windeployqt`; this module only decides
//! whether, and with which tool, that step is needed.

use crate::closure::DependencySet;
use crate::common::{path_to_string, StageError};
use crate::toolchain::ToolchainDir;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Qt major versions with a known core DLL signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QtMajor {
    Qt5,
    Qt6,
}

// newest major first: when several core DLLs coexist in one closure the
// newer toolchain's deploy tool is the one to run
const CORE_SIGNATURES: [(QtMajor, &str); 2] =
    [(QtMajor::Qt6, "Qt6Core.dll"), (QtMajor::Qt5, "Qt5Core.dll")];

impl std::fmt::Display for QtMajor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QtMajor::Qt5 => write!(f, "Qt5"),
            QtMajor::Qt6 => write!(f, "Qt6"),
        }
    }
}

/// Classify the closure: does it pull in a Qt core DLL, and which major?
///
/// Signatures are tried newest-major first, independent of the order the
/// DLLs were discovered in; the set itself is never modified.
pub fn detect_qt(dependencies: &DependencySet) -> Option<QtMajor> {
    CORE_SIGNATURES
        .iter()
        .find(|(_, signature)| {
            dependencies
                .names()
                .iter()
                .any(|name| name.eq_ignore_ascii_case(signature))
        })
        .map(|&(major, _)| major)
}

/// Path of the deploy tool to run for the given Qt major
///
/// Distributions that package Qt 6 alongside Qt 5 suffix the newer tool, so
/// the version-specific name is checked first.
pub fn deploy_tool_path(toolchain: &ToolchainDir, major: QtMajor) -> PathBuf {
    if major == QtMajor::Qt6 {
        let versioned = toolchain.expand("windeployqt-qt6.exe");
        if versioned.is_file() {
            return versioned;
        }
    }
    toolchain.expand("windeployqt.exe")
}

/// PATH value for the deploy tool's process, toolchain directory first
///
/// `windeployqt` dynamically loads Qt DLLs of its own; prepending the
/// toolchain directory makes that resolution succeed without touching our
/// own environment.
fn deploy_environment(toolchain: &ToolchainDir) -> Result<OsString, StageError> {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let entries =
        std::iter::once(toolchain.root().to_owned()).chain(std::env::split_paths(&inherited));
    std::env::join_paths(entries).map_err(|e| {
        StageError::ContextDeductionError(format!("could not build deploy tool PATH: {e}"))
    })
}

/// Run `windeployqt` on `target`, with a scoped, merged environment
///
/// Only the child process sees the amended PATH. The exit status is returned
/// to the caller, which reports a failure without aborting other targets.
pub fn run_windeployqt(
    toolchain: &ToolchainDir,
    major: QtMajor,
    target: &Path,
) -> Result<ExitStatus, StageError> {
    let tool = deploy_tool_path(toolchain, major);
    let path_var = deploy_environment(toolchain)?;
    Command::new(&tool)
        .arg(target)
        .env("PATH", path_var)
        .status()
        .map_err(|source| StageError::DeployToolLaunch {
            tool: path_to_string(&tool),
            source,
        })
}

//! Staging of resolved dependencies next to the target binary

use crate::closure::resolve_closure;
use crate::common::path_to_string;
use crate::qt::{self, QtMajor};
use crate::toolchain::ToolchainDir;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Resolve and report only; do not copy or run the Qt deploy tool
    pub dry_run: bool,
    /// Do not run the Qt deploy tool even if a Qt core DLL was found
    pub skip_qt_deploy: bool,
}

/// Outcome of copying one managed DLL next to the target
#[derive(Debug, Clone, Serialize)]
pub struct StagedDll {
    pub name: String,
    /// Destination path, if the copy succeeded
    pub staged_to: Option<PathBuf>,
    pub error: Option<String>,
}

/// Everything that happened while deploying one target binary
#[derive(Debug, Serialize)]
pub struct DeployReport {
    pub target: PathBuf,
    /// The dependency closure, in discovery order
    pub dependencies: Vec<String>,
    pub staged: Vec<StagedDll>,
    /// Import tables that could not be read along the way
    pub scan_failures: Vec<String>,
    pub qt: Option<QtMajor>,
    pub qt_deploy_error: Option<String>,
}

/// Resolve, stage and (if Qt is involved) deploy one target binary
///
/// Per-file copy failures and unreadable import tables end up in the report;
/// none of them aborts the remaining work for this or any other target.
pub fn deploy_binary(
    target: &Path,
    toolchain: &ToolchainDir,
    options: DeployOptions,
) -> DeployReport {
    let closure = resolve_closure(target, toolchain);
    let dependencies: Vec<String> = closure.dependencies.names().to_vec();
    let scan_failures = closure
        .failures
        .iter()
        .map(|f| format!("{}: {}", path_to_string(&f.path), f.error))
        .collect();

    let destination_dir = target.parent().unwrap_or_else(|| Path::new("."));
    let staged = if options.dry_run {
        Vec::new()
    } else {
        dependencies
            .iter()
            .map(|name| stage_one(name, toolchain, destination_dir))
            .collect()
    };

    let detected_qt = qt::detect_qt(&closure.dependencies);
    let qt_deploy_error = match detected_qt {
        Some(major) if !options.dry_run && !options.skip_qt_deploy => {
            match qt::run_windeployqt(toolchain, major, target) {
                Ok(status) if status.success() => None,
                Ok(status) => Some(format!("deploy tool exited with {status}")),
                Err(e) => Some(e.to_string()),
            }
        }
        _ => None,
    };

    DeployReport {
        target: target.to_owned(),
        dependencies,
        staged,
        scan_failures,
        qt: detected_qt,
        qt_deploy_error,
    }
}

/// Copy one DLL from the toolchain directory, overwriting any existing copy
fn stage_one(name: &str, toolchain: &ToolchainDir, destination_dir: &Path) -> StagedDll {
    let destination = destination_dir.join(name);
    match fs_err::copy(toolchain.expand(name), &destination) {
        Ok(_) => StagedDll {
            name: name.to_owned(),
            staged_to: Some(destination),
            error: None,
        },
        Err(e) => StagedDll {
            name: name.to_owned(),
            staged_to: None,
            error: Some(e.to_string()),
        },
    }
}

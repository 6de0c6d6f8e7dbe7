use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("file changed while reading: expected {expected} bytes, read {read}")]
    ShortRead { expected: u64, read: u64 },

    #[error("not a valid PE image: {0}")]
    MalformedImage(String),

    #[error("no section contains the import directory")]
    NoImportSection,

    #[error("toolchain directory deduction error: {0}")]
    ContextDeductionError(String),

    #[error("could not launch deploy tool {tool}")]
    DeployToolLaunch {
        tool: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Best-effort conversion for display purposes
pub fn path_to_string<P: AsRef<Path>>(p: P) -> String {
    p.as_ref().to_string_lossy().into_owned()
}

/// Remove the extended-length prefix that canonicalization adds on Windows
pub fn decanonicalize(s: &str) -> String {
    s.replacen("\\\\?\\", "", 1)
}

/// Canonical path, made presentable for the user
pub fn readable_canonical_path<P: AsRef<Path>>(p: P) -> Result<String, StageError> {
    Ok(decanonicalize(&path_to_string(fs_err::canonicalize(
        p.as_ref(),
    )?)))
}

//! Transitive closure of managed DLL dependencies

use crate::common::StageError;
use crate::pe;
use crate::toolchain::ToolchainDir;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Ordered set of DLL names, unique up to case
///
/// Names keep the casing they were first discovered with, in depth-first
/// pre-order discovery order. Once added, an entry is never removed.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    names: Vec<String>,
    seen: HashSet<String>, // lowercased index over `names`
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(&name.to_lowercase())
    }

    pub(crate) fn insert(&mut self, name: String) {
        debug_assert!(!self.contains(&name));
        self.seen.insert(name.to_lowercase());
        self.names.push(name);
    }

    /// Names in discovery order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A node whose import table could not be read during the walk
///
/// Not fatal to the closure: the node simply contributed zero imports.
#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: StageError,
}

/// Result of one closure computation for one root binary
#[derive(Debug)]
pub struct Closure {
    pub dependencies: DependencySet,
    pub failures: Vec<ScanFailure>,
}

fn read_node(path: &Path, failures: &mut Vec<ScanFailure>) -> std::vec::IntoIter<String> {
    match pe::read_imports(path) {
        Ok(names) => names.into_iter(),
        Err(error) => {
            failures.push(ScanFailure {
                path: path.to_owned(),
                error,
            });
            Vec::new().into_iter()
        }
    }
}

/// Compute the set of managed DLLs reachable from `root`
///
/// Depth-first, pre-order: a dependency is recorded and then fully explored
/// before its next sibling. Imported names with no file in the toolchain
/// directory are assumed to be system DLLs and skipped; names already present
/// (case-insensitively) are skipped, which also terminates circular imports.
///
/// The walk is driven by an explicit stack of pending-import iterators rather
/// than call-stack recursion, so an adversarially deep dependency chain
/// cannot exhaust the thread stack. The discovery sequence is the same.
///
/// The root binary itself is not an element of the returned set.
pub fn resolve_closure(root: &Path, toolchain: &ToolchainDir) -> Closure {
    let mut dependencies = DependencySet::new();
    let mut failures = Vec::new();

    let mut stack = vec![read_node(root, &mut failures)];
    while let Some(pending) = stack.last_mut() {
        match pending.next() {
            None => {
                stack.pop();
            }
            Some(name) => {
                if !toolchain.is_managed(&name) || dependencies.contains(&name) {
                    continue;
                }
                let path = toolchain.expand(&name);
                dependencies.insert(name);
                stack.push(read_node(&path, &mut failures));
            }
        }
    }

    Closure {
        dependencies,
        failures,
    }
}

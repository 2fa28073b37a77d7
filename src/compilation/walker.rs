//! Discovery of the compilation units a root unit depends on.
//!
//! Two kinds of edges are followed:
//! - references to other live compilation units;
//! - the previous-submission chain of interactive sessions.
//!
//! Binary references are leaves here; they are unpacked later by the emission engine.
//!
//! Units are de-duplicated by object identity. Two distinct compilation objects with the
//! same assembly name are both returned. The closure assembler is the one that rejects such
//! duplicates.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::compilation::{same_compilation, CompilationRef, Reference};

/// Units reachable from `root` through one edge, previous submission first.
#[must_use]
pub fn direct_references(unit: &CompilationRef) -> Vec<CompilationRef> {
    let mut direct = Vec::new();
    if let Some(previous) = unit.previous_submission() {
        direct.push(previous);
    }
    for reference in unit.references() {
        if let Reference::Compilation(compilation) = reference {
            direct.push(compilation);
        }
    }
    direct
}

/// Every unit transitively referenced by `root`, excluding `root` itself.
///
/// Breadth-first from the direct references. A unit is returned once, at the position it
/// was first dequeued, however many paths lead to it.
#[must_use]
pub fn referenced_compilations(root: &CompilationRef) -> Vec<CompilationRef> {
    let mut discovered: Vec<CompilationRef> = Vec::new();
    let mut visited: HashSet<*const ()> = HashSet::new();
    let mut queue: VecDeque<CompilationRef> = direct_references(root).into();

    visited.insert(address(root));

    while let Some(current) = queue.pop_front() {
        if !visited.insert(address(&current)) {
            continue;
        }

        for next in direct_references(&current) {
            if !visited.contains(&address(&next)) {
                queue.push_back(next);
            }
        }
        discovered.push(current);
    }

    debug!(
        root = %root.identity().simple_name(),
        count = discovered.len(),
        "discovered referenced compilations"
    );
    debug_assert!(discovered
        .iter()
        .all(|unit| !same_compilation(unit, root)));

    discovered
}

fn address(unit: &CompilationRef) -> *const () {
    std::sync::Arc::as_ptr(unit).cast::<()>()
}

//! Dependency closures and their assembly.
//!
//! A [`DependencyClosure`] is everything needed to run or verify one root module. It
//! contains, in this order:
//! 1. the root itself;
//! 2. the dependencies emitted or unpacked in this run;
//! 3. any fixtures the caller supplied.
//!
//! The [`ClosureAssembler`] builds one and rejects duplicate identities unless told to defer
//! them to verification.

use tracing::{debug, warn};

use crate::{
    module::{AssemblyIdentity, IdentityTracker, ModuleRecord, OutputKind},
    Result,
};

/// What the assembler does with a duplicate module identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with a configuration error
    #[default]
    Reject,
    /// Keep the duplicate so the verification engine's tolerant path can report it
    DeferToVerification,
}

/// An ordered set of module records with the root at position zero.
#[derive(Debug, Clone)]
pub struct DependencyClosure {
    records: Vec<ModuleRecord>,
}

impl DependencyClosure {
    /// The root module
    #[must_use]
    pub fn root(&self) -> &ModuleRecord {
        &self.records[0]
    }

    /// Every record, root first
    #[must_use]
    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    /// Every record except the root
    #[must_use]
    pub fn dependencies(&self) -> &[ModuleRecord] {
        &self.records[1..]
    }

    /// Records flagged as the core library
    pub fn core_libraries(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter().filter(|record| record.is_core_library())
    }

    /// Number of records, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; a closure holds at least its root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all records, root first
    pub fn iter(&self) -> std::slice::Iter<'_, ModuleRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a DependencyClosure {
    type Item = &'a ModuleRecord;
    type IntoIter = std::slice::Iter<'a, ModuleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Builds a [`DependencyClosure`] from its three sources.
///
/// # Usage Examples
///
/// ```rust,no_run
/// use emitscope::{ClosureAssembler, DuplicatePolicy};
/// # fn run(root: emitscope::ModuleRecord, emitted: Vec<emitscope::ModuleRecord>) -> emitscope::Result<()> {
/// let closure = ClosureAssembler::new()
///     .policy(DuplicatePolicy::Reject)
///     .assemble(root, emitted, &[])?;
/// assert_eq!(closure.root().simple_name(), "App");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct ClosureAssembler {
    policy: DuplicatePolicy,
    core_library: Option<AssemblyIdentity>,
}

impl ClosureAssembler {
    /// Create an assembler that rejects duplicates
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duplicate policy
    #[must_use]
    pub fn policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flag supplied records whose identity equals `identity` as the core library
    #[must_use]
    pub fn core_library(mut self, identity: Option<AssemblyIdentity>) -> Self {
        self.core_library = identity;
        self
    }

    /// Combine the root, the emitted dependencies and the supplied records.
    ///
    /// Supplied records are cloned; their images are shared, not copied.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if two records share an identity
    /// (case-insensitively) and the policy is [`DuplicatePolicy::Reject`].
    pub fn assemble(
        &self,
        root: ModuleRecord,
        emitted: Vec<ModuleRecord>,
        supplied: &[ModuleRecord],
    ) -> Result<DependencyClosure> {
        let mut tracker = IdentityTracker::new();
        let mut records = Vec::with_capacity(1 + emitted.len() + supplied.len());

        let supplied = supplied.iter().map(|record| {
            let is_core = record.is_core_library() || self.is_core_library(record);
            record.clone().with_core_library(is_core)
        });

        for record in std::iter::once(root).chain(emitted).chain(supplied) {
            if !tracker.insert(record.identity()) {
                match self.policy {
                    DuplicatePolicy::Reject => {
                        return Err(config_error!(
                            "Module '{}' appears more than once in the dependency closure",
                            record.identity()
                        ));
                    }
                    DuplicatePolicy::DeferToVerification => {
                        warn!(
                            identity = record.identity(),
                            "keeping duplicate module for verification"
                        );
                    }
                }
            }
            records.push(record);
        }

        debug!(
            root = records[0].simple_name(),
            modules = records.len(),
            "assembled dependency closure"
        );

        Ok(DependencyClosure { records })
    }

    fn is_core_library(&self, record: &ModuleRecord) -> bool {
        let Some(core) = &self.core_library else {
            return false;
        };
        record.kind() != OutputKind::NetModule
            && AssemblyIdentity::parse(record.identity()).is_ok_and(|identity| &identity == core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::record, Error};

    #[test]
    fn root_first_then_emitted_then_supplied() {
        let closure = ClosureAssembler::new()
            .assemble(
                record("App"),
                vec![record("B"), record("C")],
                &[record("Fixture")],
            )
            .unwrap();

        let names: Vec<_> = closure.iter().map(ModuleRecord::simple_name).collect();
        assert_eq!(names, vec!["App", "B", "C", "Fixture"]);
        assert_eq!(closure.root().simple_name(), "App");
        assert_eq!(closure.dependencies().len(), 3);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let result =
            ClosureAssembler::new().assemble(record("App"), vec![record("Foo")], &[record("FOO")]);
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn duplicate_identity_can_be_deferred() {
        let closure = ClosureAssembler::new()
            .policy(DuplicatePolicy::DeferToVerification)
            .assemble(record("App"), vec![record("Foo")], &[record("foo")])
            .unwrap();
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn supplied_core_library_is_flagged() {
        let corlib = AssemblyIdentity::parse("mscorlib").unwrap();
        let closure = ClosureAssembler::new()
            .core_library(Some(corlib))
            .assemble(record("App"), Vec::new(), &[record("mscorlib"), record("Other")])
            .unwrap();

        let cores: Vec<_> = closure.core_libraries().map(ModuleRecord::simple_name).collect();
        assert_eq!(cores, vec!["mscorlib"]);
    }
}

use std::collections::HashMap;

use crate::{
    closure::DependencyClosure,
    module::{ModuleRecord, OutputKind},
};

/// A read-only view of one module's image handed to verifiers.
#[derive(Debug, Clone, Copy)]
pub struct ModuleReader<'a> {
    record: &'a ModuleRecord,
}

impl<'a> ModuleReader<'a> {
    /// Wrap a module record
    #[must_use]
    pub fn new(record: &'a ModuleRecord) -> Self {
        Self { record }
    }

    /// Simple name of the module
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.record.simple_name()
    }

    /// Container kind
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        self.record.kind()
    }

    /// The module's image bytes
    #[must_use]
    pub fn image(&self) -> &'a [u8] {
        self.record.image()
    }

    /// The underlying record
    #[must_use]
    pub fn record(&self) -> &'a ModuleRecord {
        self.record
    }
}

/// Maps simple module names to readers, ignoring case.
///
/// Built fresh for every verification from an immutable closure and never modified after
/// construction.
#[derive(Debug, Clone)]
pub struct ModuleResolver<'a> {
    modules: HashMap<String, ModuleReader<'a>>,
}

impl<'a> ModuleResolver<'a> {
    /// Build a resolver over every module of `closure`.
    ///
    /// # Errors
    /// Returns the first simple name that occurs more than once.
    pub fn build(closure: &'a DependencyClosure) -> std::result::Result<Self, String> {
        let mut modules = HashMap::with_capacity(closure.len());
        for record in closure {
            let key = record.simple_name().to_lowercase();
            if modules.insert(key, ModuleReader::new(record)).is_some() {
                return Err(record.simple_name().to_string());
            }
        }
        Ok(Self { modules })
    }

    /// Resolve a simple name
    #[must_use]
    pub fn resolve(&self, simple_name: &str) -> Option<ModuleReader<'a>> {
        self.modules.get(&simple_name.to_lowercase()).copied()
    }

    /// Number of resolvable modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if nothing can be resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

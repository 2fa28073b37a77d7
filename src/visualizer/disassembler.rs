use crate::{module::ModuleRecord, module::Token, Result};

/// A member of an emitted module, as listed by a disassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// Qualified name without signature, e.g. `N.C.M`
    pub name: String,
    /// Definition token
    pub token: Token,
}

/// Renders listings of emitted modules with real metadata tokens.
pub trait Disassembler: Send + Sync {
    /// List the methods defined in `module`.
    ///
    /// # Errors
    /// Returns an error if the disassembler cannot read the module.
    fn enumerate_members(&self, module: &ModuleRecord) -> Result<Vec<MemberEntry>>;

    /// Render the body of the method with definition token `token`.
    ///
    /// # Errors
    /// Returns an error if the disassembler cannot read the module or the method does not
    /// exist.
    fn disassemble_method(&self, module: &ModuleRecord, token: Token) -> Result<String>;

    /// Render the declaration of `type_name` with all of its members.
    ///
    /// # Errors
    /// Returns an error if the disassembler cannot read the module or the type does not
    /// exist.
    fn disassemble_type(&self, module: &ModuleRecord, type_name: &str) -> Result<String>;
}

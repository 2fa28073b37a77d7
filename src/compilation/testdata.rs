//! Compiler test hooks captured during emission of the root unit.
//!
//! These are the in-memory method bodies the front end produced, before serialization.
//! The pseudo-token IL visualizer renders them directly, so a baseline never depends on
//! the metadata tokens the writer happened to assign.

use std::collections::BTreeMap;

use crate::{module::Token, Error, Result};

/// One instruction of an in-memory method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset from the start of the body
    pub offset: u32,
    /// Encoded size in bytes, opcode and operand together
    pub size: u32,
    /// Opcode mnemonic, e.g. `ldc.i4.s`
    pub mnemonic: String,
    /// Operand rendered with pseudo tokens, e.g. `"void C.M()"` or `IL_0010`
    pub operand: Option<String>,
}

impl Instruction {
    /// Create an instruction without an operand
    pub fn new(offset: u32, size: u32, mnemonic: impl Into<String>) -> Self {
        Self {
            offset,
            size,
            mnemonic: mnemonic.into(),
            operand: None,
        }
    }

    /// Attach a rendered operand
    #[must_use]
    pub fn with_operand(mut self, operand: impl Into<String>) -> Self {
        self.operand = Some(operand.into());
        self
    }
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    /// Rendered type, e.g. `bool` or `System.Collections.Generic.List<int>`
    pub ty: String,
    /// Source name for user-declared locals, `None` for synthesized temporaries
    pub name: Option<String>,
}

impl LocalSlot {
    /// A compiler-synthesized temporary
    pub fn temp(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: None,
        }
    }

    /// A user-declared local
    pub fn named(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: Some(name.into()),
        }
    }
}

/// An in-memory method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Whether locals are zero-initialized
    pub locals_init: bool,
    /// Local variable slots in declaration order
    pub locals: Vec<LocalSlot>,
    /// Instructions in offset order
    pub instructions: Vec<Instruction>,
}

impl Default for MethodBody {
    fn default() -> Self {
        Self {
            max_stack: 8,
            locals_init: true,
            locals: Vec::new(),
            instructions: Vec::new(),
        }
    }
}

impl MethodBody {
    /// Size of the encoded body in bytes
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.instructions
            .iter()
            .map(|instruction| instruction.offset + instruction.size)
            .max()
            .unwrap_or(0)
    }
}

/// A method captured by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodData {
    /// Qualified name with signature, e.g. `C.M(int)`
    pub name: String,
    /// Definition token assigned in the emitted module
    pub token: Token,
    /// The in-memory body
    pub body: MethodBody,
}

impl MethodData {
    /// The qualified name without its parameter list
    #[must_use]
    pub fn name_without_signature(&self) -> &str {
        strip_signature(&self.name)
    }
}

/// Compiler test hooks for one emitted root unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationTestData {
    /// Methods keyed by qualified name with signature
    pub methods: BTreeMap<String, MethodData>,
    /// Synthesized members keyed by containing type
    pub synthesized_members: BTreeMap<String, Vec<String>>,
}

impl CompilationTestData {
    /// Register a method under its qualified name
    pub fn add_method(&mut self, method: MethodData) {
        self.methods.insert(method.name.clone(), method);
    }

    /// Look up a method by qualified name.
    ///
    /// An exact match wins. Otherwise a key without a parameter list matches the single
    /// method whose name before `(` is equal to it.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] if nothing matches and [`Error::AmbiguousMethod`]
    /// if several overloads match a key given without a signature.
    pub fn find_method(&self, key: &str) -> Result<&MethodData> {
        if let Some(method) = self.methods.get(key) {
            return Ok(method);
        }

        if key.contains('(') {
            return Err(Error::MethodNotFound(key.to_string()));
        }

        let mut candidates = self
            .methods
            .values()
            .filter(|method| method.name_without_signature() == key);

        match (candidates.next(), candidates.next()) {
            (Some(method), None) => Ok(method),
            (Some(_), Some(_)) => Err(Error::AmbiguousMethod(format!(
                "'{}' matches: {}",
                key,
                self.methods
                    .values()
                    .filter(|method| method.name_without_signature() == key)
                    .map(|method| method.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            (None, _) => Err(Error::MethodNotFound(key.to_string())),
        }
    }
}

fn strip_signature(name: &str) -> &str {
    name.split_once('(').map_or(name, |(head, _)| head)
}

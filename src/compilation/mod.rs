//! The front-end boundary.
//!
//! The harness never compiles anything itself. A compilation unit is anything that
//! implements [`Compilation`]: it knows its identity, its references and its sources, and it
//! can [`emit`](Compilation::emit) itself into an image. References come in two kinds:
//! - live compilation units, which are emitted in the same run;
//! - frozen binary metadata, whose modules are copied into the closure as they are.
//!
//! # Key Components
//!
//! - [`Compilation`] / [`CompilationRef`] - A unit of compilation
//! - [`Reference`] / [`MetadataReference`] - Edges of the reference graph
//! - [`EmitRequest`] / [`EmitOutput`] - Arguments and results of one emission
//! - [`CompilationTestData`] - In-memory method bodies for the pseudo-token visualizer
//! - [`walker`] - Breadth-first discovery of referenced units

mod diagnostic;
mod emit;
mod testdata;
pub mod walker;

use std::{fmt, sync::Arc};

pub use diagnostic::{Diagnostic, Severity};
pub use emit::{
    CancellationFlag, DebugFormat, EmbeddedText, EmitOutput, EmitRequest, ManifestResource,
};
pub use testdata::{CompilationTestData, Instruction, LocalSlot, MethodBody, MethodData};

use crate::module::{AssemblyIdentity, OutputKind};

/// A compilation unit as seen by the harness.
///
/// Implementations wrap a front end's compilation object. `emit` is the only operation with
/// side effects, and the harness calls it at most once per unit per emission.
pub trait Compilation: Send + Sync + fmt::Debug {
    /// Identity of the assembly this unit produces
    fn identity(&self) -> AssemblyIdentity;

    /// Container kind of the produced module
    fn output_kind(&self) -> OutputKind;

    /// Direct references of this unit, in declaration order
    fn references(&self) -> Vec<Reference>;

    /// The previous submission of an interactive session, if this unit is a script
    fn previous_submission(&self) -> Option<CompilationRef> {
        None
    }

    /// Identity of the assembly defining the root object type, if it resolves
    fn core_library(&self) -> Option<AssemblyIdentity>;

    /// Source texts in compilation order
    fn sources(&self) -> Vec<SourceText>;

    /// Emit this unit into an image.
    ///
    /// Failure is reported through [`EmitOutput::diagnostics`], never by panicking.
    fn emit(&self, request: &EmitRequest<'_>) -> EmitOutput;
}

/// A shared handle to a compilation unit.
pub type CompilationRef = Arc<dyn Compilation>;

/// True if `a` and `b` are the same compilation object.
///
/// Compares data addresses only, ignoring vtables.
#[must_use]
pub fn same_compilation(a: &CompilationRef, b: &CompilationRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

/// One edge of the reference graph.
#[derive(Debug, Clone)]
pub enum Reference {
    /// A live compilation unit, emitted as part of the same run
    Compilation(CompilationRef),
    /// A pre-built binary
    Metadata(MetadataReference),
}

/// A pre-built binary reference.
#[derive(Debug, Clone)]
pub enum MetadataReference {
    /// An assembly. The first module carries the manifest, any others are secondary modules.
    Assembly {
        /// Identity declared by the manifest
        identity: AssemblyIdentity,
        /// Constituent modules, manifest module first
        modules: Vec<ModuleImage>,
    },
    /// A single module without a manifest
    Module(ModuleImage),
}

impl MetadataReference {
    /// A single-module assembly
    #[must_use]
    pub fn assembly(identity: AssemblyIdentity, image: Arc<[u8]>) -> Self {
        let name = format!("{}.dll", identity.simple_name());
        MetadataReference::Assembly {
            identity,
            modules: vec![ModuleImage { name, image }],
        }
    }
}

/// The raw bytes of one module inside a binary reference.
#[derive(Clone)]
pub struct ModuleImage {
    /// Module file name as recorded in the manifest's file table
    pub name: String,
    /// Image bytes
    pub image: Arc<[u8]>,
}

impl fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleImage")
            .field("name", &self.name)
            .field("image_len", &self.image.len())
            .finish()
    }
}

/// A source text of a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Declared file path, if any
    pub path: Option<String>,
    /// Content
    pub text: String,
    /// Whether the text may be embedded into debug information
    pub can_be_embedded: bool,
}

impl SourceText {
    /// An embeddable source without a path
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
            can_be_embedded: true,
        }
    }

    /// Set the declared path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Forbid embedding this source
    #[must_use]
    pub fn not_embeddable(mut self) -> Self {
        self.can_be_embedded = false;
        self
    }
}

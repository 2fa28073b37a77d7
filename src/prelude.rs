//! # emitscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the harness. Import this module to get quick access to everything a compiler test
//! needs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all emitscope operations
pub use crate::Error;

/// The result type used throughout emitscope
pub use crate::Result;

/// Harness configuration
pub use crate::HarnessConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Session facade for one root compilation
pub use crate::{CompilationVerifier, CompilationVerifierBuilder};

/// Fail-fast escalation
pub use crate::{AbortProcess, FailFastHandler};

// ================================================================================================
// Front End Boundary
// ================================================================================================

/// Compilation units and their references
pub use crate::compilation::{
    CancellationFlag, Compilation, CompilationRef, CompilationTestData, DebugFormat, Diagnostic,
    EmitOutput, EmitRequest, ManifestResource, MetadataReference, MethodData, Reference,
    Severity, SourceText,
};

/// Module identities and records
pub use crate::module::{AssemblyIdentity, AssemblyVersion, ModuleRecord, OutputKind, Token};

// ================================================================================================
// Pipeline Stages
// ================================================================================================

/// Emission and closures
pub use crate::{
    closure::{DependencyClosure, DuplicatePolicy},
    emission::{EmissionResult, EmitOptions},
};

/// Verification
pub use crate::verification::{
    BinaryVerifier, ModuleReader, ModuleResolver, StructuralVerifier,
    StructuralVerifierProvider, Verification, VerificationOutcome, VerifierError,
};

/// Execution
pub use crate::execution::{
    ExecutionEnvironment, ExecutionExpectation, ExecutionOutput, ProcessRuntime,
};

/// Visualization
pub use crate::visualizer::{
    DebugInfoDecoder, Disassembler, IlMode, ProcessDisassembler, SequencePointDetail,
};

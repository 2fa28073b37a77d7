// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # emitscope
//!
//! A test harness for .NET compilers. `emitscope` takes a root compilation from a front end,
//! emits it together with everything it references, and checks the result: the emitted
//! closure is verified structurally, optionally run, and its methods can be rendered as IL
//! listings and compared against baselines.
//!
//! ## Features
//!
//! - **📦 Dependency closures** - Emits every referenced compilation unit once, unpacks binary
//!   references and supplied fixtures into one de-duplicated module set
//! - **🔍 Verification** - Reconciles structural and binary verifier results with declarative
//!   expectations, including literal messages with volatile tokens stripped
//! - **⚡ Execution** - Runs the closure in an external runtime and compares exit code and
//!   output streams
//! - **🔧 IL baselines** - Pseudo-token listings from in-memory method bodies, real-token
//!   listings through a disassembler, both with optional sequence point markers
//! - **🛡️ Postmortem dumps** - Failing closures are written to numbered directories for
//!   inspection with external tools
//!
//! ## Quick Start
//!
//! Add `emitscope` to your `Cargo.toml` as a development dependency:
//!
//! ```toml
//! [dev-dependencies]
//! emitscope = "0.1.0"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use emitscope::prelude::*;
//!
//! fn check(root: CompilationRef) -> emitscope::Result<()> {
//!     let session = CompilationVerifier::builder(root)
//!         .runtime(ProcessRuntime::new())
//!         .build();
//!
//!     session.compile_and_verify(
//!         &Verification::passes(),
//!         &ExecutionExpectation::default().output("Hello"),
//!     )?;
//!     println!("{}", session.visualize_il("Program.Main", IlMode::Pseudo, SequencePointDetail::None)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in four stages, each in its own module:
//!
//! - **Emission** ([`emission`]) - Walks the reference graph breadth-first, emits dependencies
//!   before the root and assembles the [`DependencyClosure`]
//! - **Verification** ([`verification`]) - Runs the configured verifiers and compares their
//!   outcome with a [`Verification`] expectation
//! - **Execution** ([`execution`]) - Runs the root through an [`execution::ExecutionEnvironment`]
//! - **Visualization** ([`visualizer`]) - Renders IL listings of emitted methods
//!
//! [`CompilationVerifier`] ties the stages together for one root compilation. The front end,
//! verifiers, runtime, disassembler and debug information decoder are all supplied through
//! traits; the harness compiles and executes nothing by itself.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Configuration errors signal a broken
//! test setup and are never masked, with one exception: an expectation that declares a
//! structural verification failure without a literal message turns a misconfigured closure
//! into a logged skip.
//!
//! ## Logging
//!
//! Pipeline stages emit [`tracing`](https://docs.rs/tracing) spans (`emit`, `verify`,
//! `execute`) and events. No subscriber is installed by the library.
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use emitscope::prelude::*;
///
/// let config = HarnessConfig::from_env();
/// let expectation = Verification::fails_structural().structural_message("[M]: Bad call.");
/// # let _ = (config, expectation);
/// ```
pub mod prelude;

/// Assembly identities, metadata tokens and module records
pub mod module;

/// The front-end boundary: compilation units, references and emit requests
pub mod compilation;

/// Combination of emitted, referenced and supplied modules into one closure
pub mod closure;

/// Harness configuration and environment presets
pub mod config;

/// Numbered postmortem dumps of failing closures
pub mod dump;

/// Emission of a root compilation and its dependencies
pub mod emission;

/// Verification of emitted closures against expectations
pub mod verification;

/// Execution of emitted programs
pub mod execution;

/// IL listings of emitted methods
pub mod visualizer;

mod harness;

/// `emitscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `emitscope` Error type
///
/// The single error type of every harness operation. Pipeline stages never retry or
/// swallow an error.
///
/// # Examples
///
/// ```rust,no_run
/// use emitscope::{CompilationVerifier, Error};
/// # fn run(session: &CompilationVerifier) {
/// match session.emit() {
///     Ok(emission) => println!("{} modules", emission.closure().len()),
///     Err(Error::EmitFailure { diagnostics, .. }) => {
///         for diagnostic in diagnostics {
///             eprintln!("{diagnostic}");
///         }
///     }
///     Err(e) => println!("Error: {}", e),
/// }
/// # }
/// ```
pub use error::Error;

/// Detail records carried by mismatch errors
pub use error::{ExecutionField, ExecutionMismatch, VerificationMismatch, VerifierKind};

/// The session facade and its collaborators.
///
/// # Example
///
/// ```rust,no_run
/// use emitscope::{CompilationVerifier, Verification};
/// # fn run(root: emitscope::compilation::CompilationRef) -> emitscope::Result<()> {
/// let session = CompilationVerifier::builder(root).build();
/// session.verify(&Verification::skipped())?;
/// # Ok(())
/// # }
/// ```
pub use harness::{AbortProcess, CompilationVerifier, CompilationVerifierBuilder, FailFastHandler};

pub use closure::{ClosureAssembler, DependencyClosure, DuplicatePolicy};
pub use config::HarnessConfig;
pub use dump::DumpService;
pub use module::{AssemblyIdentity, ModuleRecord, OutputKind, Provenance, Token};
pub use verification::{Verification, VerificationOutcome, VerificationStatus};

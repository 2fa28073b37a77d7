//! The compilation session facade.
//!
//! A [`CompilationVerifier`] wraps one root compilation with every collaborator a test
//! needs and drives the pipeline stages on demand. Emission happens once per session, on
//! first use, and every later stage works on the cached result.
//!
//! # Examples
//!
//! ```rust,no_run
//! use emitscope::prelude::*;
//! # fn run(root: CompilationRef, runtime: ProcessRuntime) -> emitscope::Result<()> {
//! let session = CompilationVerifier::builder(root)
//!     .runtime(runtime)
//!     .build();
//!
//! session.compile_and_verify(
//!     &Verification::skipped(),
//!     &ExecutionExpectation::default().exit_code(0).output("Hello"),
//! )?;
//! session.verify_il(
//!     "Program.Main",
//!     r#"
//! {
//!   // Code size       11 (0xb)
//!   .maxstack  8
//!   IL_0000:  ldstr      "Hello"
//!   IL_0005:  call       "void System.Console.WriteLine(string)"
//!   IL_000a:  ret
//! }"#,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock};

use tracing::{error, warn};

use crate::{
    closure::DuplicatePolicy,
    compilation::{CancellationFlag, CompilationRef, CompilationTestData},
    config::HarnessConfig,
    dump::DumpService,
    emission::{EmissionEngine, EmissionResult, EmitOptions},
    execution::{execute_and_compare, ExecutionEnvironment, ExecutionExpectation, ExecutionOutput},
    module::ModuleRecord,
    verification::{
        message::{equal_tolerating_whitespace, normalize_whitespace},
        BinaryVerifier, StructuralVerifierProvider, Verification, VerificationEngine,
        VerificationOutcome,
    },
    visualizer::{
        pseudo, DebugInfoDecoder, Disassembler, IlMode, IlVisualizer, ModuleSymbols,
        SequencePointDetail,
    },
    Error, Result,
};

/// Receives the report of a `PassesOrFailFast` verification mismatch.
pub trait FailFastHandler: Send + Sync {
    /// Handle the report. The default handler never returns.
    fn fail_fast(&self, report: &str);
}

/// Writes the report to stderr and aborts the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortProcess;

impl FailFastHandler for AbortProcess {
    fn fail_fast(&self, report: &str) {
        eprintln!("{report}");
        std::process::abort();
    }
}

/// Builder for [`CompilationVerifier`].
pub struct CompilationVerifierBuilder {
    root: CompilationRef,
    config: HarnessConfig,
    dumps: Option<Arc<DumpService>>,
    options: EmitOptions,
    supplied: Vec<ModuleRecord>,
    cancellation: CancellationFlag,
    structural: Option<Arc<dyn StructuralVerifierProvider>>,
    binary: Option<Arc<dyn BinaryVerifier>>,
    runtime: Option<Arc<dyn ExecutionEnvironment>>,
    disassembler: Option<Arc<dyn Disassembler>>,
    decoder: Option<Arc<dyn DebugInfoDecoder>>,
    fail_fast: Arc<dyn FailFastHandler>,
}

impl CompilationVerifierBuilder {
    /// Use this configuration
    #[must_use]
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this dump service instead of the process-wide one
    #[must_use]
    pub fn dumps(mut self, dumps: Arc<DumpService>) -> Self {
        self.dumps = Some(dumps);
        self
    }

    /// Use these emit options
    #[must_use]
    pub fn options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    /// Add externally supplied dependencies, appended to the closure after emitted ones
    #[must_use]
    pub fn dependencies(mut self, records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        self.supplied.extend(records);
        self
    }

    /// Share this cancellation flag with the front end
    #[must_use]
    pub fn cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Use this structural verifier
    #[must_use]
    pub fn structural_verifier(mut self, provider: impl StructuralVerifierProvider + 'static) -> Self {
        self.structural = Some(Arc::new(provider));
        self
    }

    /// Use this binary verifier
    #[must_use]
    pub fn binary_verifier(mut self, verifier: impl BinaryVerifier + 'static) -> Self {
        self.binary = Some(Arc::new(verifier));
        self
    }

    /// Use this execution environment
    #[must_use]
    pub fn runtime(mut self, runtime: impl ExecutionEnvironment + 'static) -> Self {
        self.runtime = Some(Arc::new(runtime));
        self
    }

    /// Use this disassembler for real-token listings
    #[must_use]
    pub fn disassembler(mut self, disassembler: impl Disassembler + 'static) -> Self {
        self.disassembler = Some(Arc::new(disassembler));
        self
    }

    /// Use this decoder for sequence point markers
    #[must_use]
    pub fn debug_decoder(mut self, decoder: impl DebugInfoDecoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Replace the fail-fast handler
    #[must_use]
    pub fn fail_fast(mut self, handler: impl FailFastHandler + 'static) -> Self {
        self.fail_fast = Arc::new(handler);
        self
    }

    /// Create the session
    #[must_use]
    pub fn build(self) -> CompilationVerifier {
        CompilationVerifier {
            root: self.root,
            dumps: self.dumps.unwrap_or_else(DumpService::global),
            config: self.config,
            options: self.options,
            supplied: self.supplied,
            cancellation: self.cancellation,
            structural: self.structural,
            binary: self.binary,
            runtime: self.runtime,
            disassembler: self.disassembler,
            decoder: self.decoder,
            fail_fast: self.fail_fast,
            emission: OnceLock::new(),
            symbols: OnceLock::new(),
        }
    }
}

/// One root compilation under test, with its collaborators.
pub struct CompilationVerifier {
    root: CompilationRef,
    config: HarnessConfig,
    dumps: Arc<DumpService>,
    options: EmitOptions,
    supplied: Vec<ModuleRecord>,
    cancellation: CancellationFlag,
    structural: Option<Arc<dyn StructuralVerifierProvider>>,
    binary: Option<Arc<dyn BinaryVerifier>>,
    runtime: Option<Arc<dyn ExecutionEnvironment>>,
    disassembler: Option<Arc<dyn Disassembler>>,
    decoder: Option<Arc<dyn DebugInfoDecoder>>,
    fail_fast: Arc<dyn FailFastHandler>,
    emission: OnceLock<EmissionResult>,
    symbols: OnceLock<ModuleSymbols>,
}

impl CompilationVerifier {
    /// Start building a session for `root`.
    ///
    /// Defaults: [`HarnessConfig::default`], the process-wide dump service, no verifiers,
    /// no runtime, no disassembler and the [`AbortProcess`] fail-fast handler.
    #[must_use]
    pub fn builder(root: CompilationRef) -> CompilationVerifierBuilder {
        CompilationVerifierBuilder {
            root,
            config: HarnessConfig::default(),
            dumps: None,
            options: EmitOptions::default(),
            supplied: Vec::new(),
            cancellation: CancellationFlag::new(),
            structural: None,
            binary: None,
            runtime: None,
            disassembler: None,
            decoder: None,
            fail_fast: Arc::new(AbortProcess),
        }
    }

    /// The root compilation
    #[must_use]
    pub fn root(&self) -> &CompilationRef {
        &self.root
    }

    /// The session's configuration
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Emit the root and its dependencies, once per session.
    ///
    /// # Errors
    /// See [`EmissionEngine::emit`].
    pub fn emit(&self) -> Result<&EmissionResult> {
        self.emit_with(self.options.duplicate_policy)
    }

    /// The cached emission, if [`CompilationVerifier::emit`] succeeded before
    #[must_use]
    pub fn emission(&self) -> Option<&EmissionResult> {
        self.emission.get()
    }

    /// The root's compiler test hooks.
    ///
    /// # Errors
    /// Returns the emission error if the session has not emitted yet and emission fails.
    pub fn test_data(&self) -> Result<&CompilationTestData> {
        Ok(self.emit()?.test_data())
    }

    fn emit_with(&self, policy: DuplicatePolicy) -> Result<&EmissionResult> {
        if let Some(emission) = self.emission.get() {
            return Ok(emission);
        }

        let options = self.options.clone().duplicate_policy(policy);
        let emission = EmissionEngine::new(&self.config, &self.dumps, &self.cancellation).emit(
            &self.root,
            &options,
            &self.supplied,
        )?;
        Ok(self.emission.get_or_init(|| emission))
    }

    /// Verify the emitted closure.
    ///
    /// Under [`Verification::passes_or_fail_fast`] a mismatch renders the pseudo IL of every
    /// method and hands it to the fail-fast handler before the error is returned.
    ///
    /// # Errors
    /// See [`VerificationEngine::verify`].
    pub fn verify(&self, expectation: &Verification) -> Result<VerificationOutcome> {
        let policy = if expectation.tolerates_misconfiguration() {
            DuplicatePolicy::DeferToVerification
        } else {
            self.options.duplicate_policy
        };
        let emission = self.emit_with(policy)?;

        let result = VerificationEngine::new(&self.config, &self.dumps)
            .structural(self.structural.as_deref())
            .binary(self.binary.as_deref())
            .verify(emission.closure(), expectation);

        match result {
            Err(Error::VerificationMismatch(mismatch)) if expectation.is_fail_fast() => {
                let report = fail_fast_report(&mismatch.to_string(), emission.test_data());
                error!(root = emission.root().simple_name(), "verification failed, failing fast");
                self.fail_fast.fail_fast(&report);
                Err(Error::VerificationMismatch(mismatch))
            }
            other => other,
        }
    }

    /// Run the root and compare its behavior.
    ///
    /// The closure is dumped when the program behaves differently.
    ///
    /// # Errors
    /// - [`Error::Configuration`] if no runtime is configured or the root is not executable
    /// - [`Error::ExecutionMismatch`] if exit code or output differ
    pub fn execute(&self, expectation: &ExecutionExpectation) -> Result<ExecutionOutput> {
        let Some(runtime) = self.runtime.as_deref() else {
            return Err(config_error!("Execution requested, but no runtime is configured"));
        };

        let emission = self.emit()?;
        if !emission.root().kind().is_executable() {
            return Err(config_error!(
                "'{}' is a {} and cannot be executed",
                emission.root().simple_name(),
                emission.root().kind()
            ));
        }

        match execute_and_compare(runtime, emission.closure(), expectation) {
            Err(error @ Error::ExecutionMismatch(_)) => {
                if let Some(directory) = self.dumps.dump_or_warn(emission.closure().records()) {
                    warn!(dump = %directory.display(), "program behaved unexpectedly");
                }
                Err(error)
            }
            other => other,
        }
    }

    /// Emit, verify and, if anything is expected of the program, execute.
    ///
    /// Duplicate identities are deferred to verification when the expectation tolerates a
    /// misconfigured closure.
    ///
    /// # Errors
    /// The first error of any stage.
    pub fn compile_and_verify(
        &self,
        verification: &Verification,
        execution: &ExecutionExpectation,
    ) -> Result<VerificationOutcome> {
        let outcome = self.verify(verification)?;
        if !execution.is_empty() {
            self.execute(execution)?;
        }
        Ok(outcome)
    }

    /// Render the IL of `method`.
    ///
    /// `method` is a qualified name, with or without signature.
    ///
    /// # Errors
    /// - [`Error::MethodNotFound`] / [`Error::AmbiguousMethod`] for a bad lookup key
    /// - [`Error::Configuration`] if [`IlMode::Real`] is requested without a disassembler, or
    ///   markers without a debug information decoder
    pub fn visualize_il(
        &self,
        method: &str,
        mode: IlMode,
        detail: SequencePointDetail,
    ) -> Result<String> {
        let emission = self.emit()?;
        let method = emission.test_data().find_method(method)?;
        let sources = self.root.sources();

        IlVisualizer::new(emission.root(), &sources, &self.symbols)
            .disassembler(self.disassembler.as_deref())
            .decoder(self.decoder.as_deref())
            .visualize(method, mode, detail)
    }

    /// Assert the pseudo-token IL of `method`, tolerating whitespace differences.
    ///
    /// # Errors
    /// Returns [`Error::IlMismatch`] if the listing differs.
    pub fn verify_il(&self, method: &str, expected: &str) -> Result<()> {
        self.verify_il_with(method, expected, IlMode::Pseudo, SequencePointDetail::None)
    }

    /// Assert the IL of `method` rendered in `mode` with `detail` markers.
    ///
    /// # Errors
    /// Returns [`Error::IlMismatch`] if the listing differs, or the rendering error.
    pub fn verify_il_with(
        &self,
        method: &str,
        expected: &str,
        mode: IlMode,
        detail: SequencePointDetail,
    ) -> Result<()> {
        let actual = self.visualize_il(method, mode, detail)?;
        compare_listing(method, expected, &actual)
    }

    /// Assert the disassembled declaration of `type_name`.
    ///
    /// # Errors
    /// - [`Error::Configuration`] if no disassembler is configured
    /// - [`Error::IlMismatch`] if the listing differs
    pub fn verify_type_il(&self, type_name: &str, expected: &str) -> Result<()> {
        let Some(disassembler) = self.disassembler.as_deref() else {
            return Err(config_error!(
                "Type IL of '{}' requested, but no disassembler is configured",
                type_name
            ));
        };

        let emission = self.emit()?;
        let actual = disassembler.disassemble_type(emission.root(), type_name)?;
        compare_listing(type_name, expected, &actual)
    }

    /// Assert the members the front end synthesized into `type_name`, in any order.
    ///
    /// # Errors
    /// Returns [`Error::IlMismatch`] if the member sets differ.
    pub fn verify_synthesized_members(&self, type_name: &str, expected: &[&str]) -> Result<()> {
        let data = self.test_data()?;
        let mut actual: Vec<&str> = data
            .synthesized_members
            .get(type_name)
            .map(|members| members.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut expected = expected.to_vec();
        actual.sort_unstable();
        expected.sort_unstable();

        if actual == expected {
            Ok(())
        } else {
            Err(Error::IlMismatch {
                method: type_name.to_string(),
                expected: expected.join("\n"),
                actual: actual.join("\n"),
            })
        }
    }
}

fn compare_listing(name: &str, expected: &str, actual: &str) -> Result<()> {
    if equal_tolerating_whitespace(expected, actual) {
        Ok(())
    } else {
        Err(Error::IlMismatch {
            method: name.to_string(),
            expected: normalize_whitespace(expected),
            actual: normalize_whitespace(actual),
        })
    }
}

fn fail_fast_report(mismatch: &str, data: &CompilationTestData) -> String {
    let mut report = format!("{mismatch}\n");
    for method in data.methods.values() {
        report.push('\n');
        report.push_str(&method.name);
        report.push('\n');
        report.push_str(&pseudo::render(&method.body, None, SequencePointDetail::None));
    }
    report
}

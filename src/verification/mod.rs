//! Verification of an emitted closure against a declarative expectation.
//!
//! Two independent verifiers can run:
//! - a structural verifier over the root module, resolving references through the closure;
//! - an optional binary verifier over the whole closure.
//!
//! Each result is reconciled with a [`Verification`] expectation. When an expectation
//! declares a failure without prescribing a message, it is tolerant: a misconfigured closure
//! (duplicate module names, no core library) is reported as a skip instead of an error.
//!
//! # Key Components
//!
//! - [`Verification`] / [`VerificationStatus`] - The expectation
//! - [`VerificationEngine`] - Runs the verifiers and compares outcomes
//! - [`ModuleResolver`] - Simple name to module reader map
//! - [`StructuralVerifierProvider`] / [`BinaryVerifier`] - External verifier boundaries

pub mod message;
mod resolver;
mod structural;

use bitflags::bitflags;
use tracing::{debug, info, info_span, warn};

pub use resolver::{ModuleReader, ModuleResolver};
pub use structural::{
    render_errors, StructuralVerifier, StructuralVerifierProvider, VerifierArgument,
    VerifierError,
};

use crate::{
    closure::DependencyClosure,
    config::HarnessConfig,
    dump::DumpService,
    error::{VerificationMismatch, VerifierKind},
    module::ModuleRecord,
    Error, Result,
};

bitflags! {
    /// Expected verification behavior. The empty set means the closure passes both
    /// verifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VerificationStatus: u32 {
        /// Do not verify at all
        const SKIPPED = 0x0001;
        /// The structural verifier reports errors
        const FAILS_STRUCTURAL = 0x0002;
        /// The binary verifier reports errors
        const FAILS_BINARY = 0x0004;
        /// Both verifiers report errors
        const FAILS = Self::FAILS_STRUCTURAL.bits() | Self::FAILS_BINARY.bits();
        /// Verification passes; an unexpected failure dumps IL and terminates the process
        const PASSES_OR_FAIL_FAST = 0x0008;
    }
}

/// A verification expectation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Expected outcome
    pub status: VerificationStatus,
    /// Literal structural verifier message, compared when the verifier fails
    pub structural_message: Option<String>,
    /// Literal binary verifier message, compared when the verifier fails
    pub binary_message: Option<String>,
    /// Compare messages including metadata tokens and module version ids
    pub include_tokens_and_module_ids: bool,
}

impl Verification {
    /// Both verifiers pass
    #[must_use]
    pub fn passes() -> Self {
        Self::default()
    }

    /// Verification is not run
    #[must_use]
    pub fn skipped() -> Self {
        Self::with_status(VerificationStatus::SKIPPED)
    }

    /// The structural verifier fails; any message is accepted
    #[must_use]
    pub fn fails_structural() -> Self {
        Self::with_status(VerificationStatus::FAILS_STRUCTURAL)
    }

    /// The binary verifier fails; any message is accepted
    #[must_use]
    pub fn fails_binary() -> Self {
        Self::with_status(VerificationStatus::FAILS_BINARY)
    }

    /// Both verifiers fail
    #[must_use]
    pub fn fails() -> Self {
        Self::with_status(VerificationStatus::FAILS)
    }

    /// Verification passes, or the process is terminated
    #[must_use]
    pub fn passes_or_fail_fast() -> Self {
        Self::with_status(VerificationStatus::PASSES_OR_FAIL_FAST)
    }

    /// An expectation with the given status and no messages
    #[must_use]
    pub fn with_status(status: VerificationStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Expect this literal structural verifier message
    #[must_use]
    pub fn structural_message(mut self, message: impl Into<String>) -> Self {
        self.structural_message = Some(message.into());
        self
    }

    /// Expect this literal binary verifier message
    #[must_use]
    pub fn binary_message(mut self, message: impl Into<String>) -> Self {
        self.binary_message = Some(message.into());
        self
    }

    /// Keep metadata tokens and module version ids when comparing messages
    #[must_use]
    pub fn including_tokens_and_module_ids(mut self) -> Self {
        self.include_tokens_and_module_ids = true;
        self
    }

    /// True if the structural verifier is expected to pass
    #[must_use]
    pub fn expects_structural_success(&self) -> bool {
        !self.status.contains(VerificationStatus::FAILS_STRUCTURAL)
    }

    /// True if the binary verifier is expected to pass
    #[must_use]
    pub fn expects_binary_success(&self) -> bool {
        !self.status.contains(VerificationStatus::FAILS_BINARY)
    }

    /// True if an unexpected failure must terminate the process
    #[must_use]
    pub fn is_fail_fast(&self) -> bool {
        self.status.contains(VerificationStatus::PASSES_OR_FAIL_FAST)
    }

    /// True if a misconfigured closure should be reported as a skip.
    ///
    /// This holds when the structural verifier is expected to fail and no literal message
    /// is prescribed.
    #[must_use]
    pub fn tolerates_misconfiguration(&self) -> bool {
        !self.expects_structural_success() && self.structural_message.is_none()
    }
}

/// Why verification did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The expectation declared [`VerificationStatus::SKIPPED`]
    Declared,
    /// Several modules share this simple name
    DuplicateModule(String),
    /// No module of the closure is flagged as the core library
    MissingCoreLibrary,
    /// No structural verifier is configured
    VerifierUnavailable,
}

/// The result of a verification that met its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Every configured verifier passed as expected
    Passed,
    /// The structural verifier failed as expected, with this message
    FailedAsExpected {
        /// Rendered verifier errors
        message: String,
    },
    /// Verification did not run
    Skipped(SkipReason),
}

/// Verifies a closure with the whole image, outside of the structural verifier.
pub trait BinaryVerifier: Send + Sync {
    /// Verify every module of `closure`, returning one message per problem
    ///
    /// # Errors
    /// Returns an error if the verifier itself could not run.
    fn verify(&self, closure: &DependencyClosure) -> Result<Vec<String>>;
}

/// Runs the configured verifiers over a closure.
pub struct VerificationEngine<'a> {
    config: &'a HarnessConfig,
    dumps: &'a DumpService,
    structural: Option<&'a dyn StructuralVerifierProvider>,
    binary: Option<&'a dyn BinaryVerifier>,
}

impl<'a> VerificationEngine<'a> {
    /// Create an engine
    #[must_use]
    pub fn new(config: &'a HarnessConfig, dumps: &'a DumpService) -> Self {
        Self {
            config,
            dumps,
            structural: None,
            binary: None,
        }
    }

    /// Use this structural verifier
    #[must_use]
    pub fn structural(mut self, provider: Option<&'a dyn StructuralVerifierProvider>) -> Self {
        self.structural = provider;
        self
    }

    /// Use this binary verifier
    #[must_use]
    pub fn binary(mut self, verifier: Option<&'a dyn BinaryVerifier>) -> Self {
        self.binary = verifier;
        self
    }

    /// Verify `closure` against `expectation`.
    ///
    /// The closure is checked for duplicate simple names and for its core library before
    /// any verifier runs, whether or not verifiers are configured.
    ///
    /// # Errors
    /// - [`Error::Configuration`] for duplicate simple names or a missing core library,
    ///   unless the expectation tolerates misconfiguration
    /// - [`Error::VerificationMismatch`] if an outcome or message differs; the closure is
    ///   dumped first
    pub fn verify(
        &self,
        closure: &DependencyClosure,
        expectation: &Verification,
    ) -> Result<VerificationOutcome> {
        let span = info_span!("verify", root = closure.root().simple_name());
        let _guard = span.enter();

        if expectation.status.contains(VerificationStatus::SKIPPED) {
            debug!("verification skipped by expectation");
            return Ok(VerificationOutcome::Skipped(SkipReason::Declared));
        }

        let (resolver, core) = match check_closure(closure, expectation)? {
            Checked::Ready(resolver, core) => (resolver, core),
            Checked::Skip(reason) => return Ok(VerificationOutcome::Skipped(reason)),
        };

        self.verify_binary(closure, expectation)?;

        let Some(provider) = self.structural else {
            warn!("no structural verifier configured, skipping structural verification");
            return Ok(VerificationOutcome::Skipped(SkipReason::VerifierUnavailable));
        };
        self.verify_structural(provider, &resolver, core, closure, expectation)
    }

    fn verify_binary(&self, closure: &DependencyClosure, expectation: &Verification) -> Result<()> {
        let Some(verifier) = self.binary else {
            debug!("no binary verifier configured");
            return Ok(());
        };

        let problems = verifier.verify(closure)?;
        let message = problems.join("\n");
        self.reconcile(
            closure,
            VerifierKind::Binary,
            expectation.expects_binary_success(),
            problems.is_empty(),
            expectation.binary_message.as_deref(),
            &message,
            expectation.include_tokens_and_module_ids,
        )
    }

    fn verify_structural(
        &self,
        provider: &dyn StructuralVerifierProvider,
        resolver: &ModuleResolver<'_>,
        core: &ModuleRecord,
        closure: &DependencyClosure,
        expectation: &Verification,
    ) -> Result<VerificationOutcome> {
        let mut verifier = provider.create(resolver);
        verifier.set_core_library(core.simple_name());
        let errors = verifier.verify(ModuleReader::new(closure.root()));
        let message = render_errors(&errors);

        self.reconcile(
            closure,
            VerifierKind::Structural,
            expectation.expects_structural_success(),
            errors.is_empty(),
            expectation.structural_message.as_deref(),
            &message,
            expectation.include_tokens_and_module_ids,
        )?;

        info!(errors = errors.len(), "structural verification matched expectation");
        if errors.is_empty() {
            Ok(VerificationOutcome::Passed)
        } else {
            Ok(VerificationOutcome::FailedAsExpected { message })
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn reconcile(
        &self,
        closure: &DependencyClosure,
        verifier: VerifierKind,
        expected_success: bool,
        actual_success: bool,
        expected_message: Option<&str>,
        actual_message: &str,
        include_tokens: bool,
    ) -> Result<()> {
        if expected_success != actual_success {
            return Err(self.mismatch(
                closure,
                verifier,
                expected_success,
                actual_success,
                None,
                actual_message,
            ));
        }

        let Some(expected) = expected_message else {
            return Ok(());
        };
        if actual_success || !self.config.compare_messages {
            return Ok(());
        }

        let actual = if include_tokens {
            actual_message.to_string()
        } else {
            message::strip_tokens_and_module_ids(actual_message)?
        };

        if message::equal_tolerating_whitespace(expected, &actual) {
            Ok(())
        } else {
            Err(self.mismatch(
                closure,
                verifier,
                expected_success,
                actual_success,
                Some(expected),
                &actual,
            ))
        }
    }

    fn mismatch(
        &self,
        closure: &DependencyClosure,
        verifier: VerifierKind,
        expected_success: bool,
        actual_success: bool,
        expected_message: Option<&str>,
        actual_message: &str,
    ) -> Error {
        let dump_dir = self.dumps.dump_or_warn(closure.records());
        Error::VerificationMismatch(Box::new(VerificationMismatch {
            verifier,
            expected_success,
            actual_success,
            expected_message: expected_message.map(str::to_string),
            actual_message: actual_message.to_string(),
            dump_dir,
        }))
    }
}

/// A closure that passed the configuration checks, or the reason to skip it.
enum Checked<'c> {
    Ready(ModuleResolver<'c>, &'c ModuleRecord),
    Skip(SkipReason),
}

fn check_closure<'c>(
    closure: &'c DependencyClosure,
    expectation: &Verification,
) -> Result<Checked<'c>> {
    let resolver = match ModuleResolver::build(closure) {
        Ok(resolver) => resolver,
        Err(name) => {
            return tolerate(
                expectation,
                SkipReason::DuplicateModule(name.clone()),
                config_error!("Multiple modules named '{}' were found", name),
            );
        }
    };

    let mut cores = closure.core_libraries();
    match (cores.next(), cores.next()) {
        (Some(core), None) => Ok(Checked::Ready(resolver, core)),
        (None, _) => tolerate(
            expectation,
            SkipReason::MissingCoreLibrary,
            config_error!("No core library found in the dependency closure"),
        ),
        (Some(first), Some(second)) => Err(config_error!(
            "More than one core library in the dependency closure: '{}' and '{}'",
            first.simple_name(),
            second.simple_name()
        )),
    }
}

fn tolerate<'c>(expectation: &Verification, reason: SkipReason, error: Error) -> Result<Checked<'c>> {
    if expectation.tolerates_misconfiguration() {
        warn!(?reason, "verification expected to fail, skipping misconfigured closure");
        Ok(Checked::Skip(reason))
    } else {
        Err(error)
    }
}

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::compilation::Diagnostic;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! config_error {
    ($msg:expr) => {
        crate::Error::Configuration {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Configuration {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure the harness can report.
///
/// Each variant belongs to one of four families. None of them is retried or swallowed by the
/// pipeline; they always end the test that raised them.
///
/// # Error Categories
///
/// ## Test-authoring errors
/// - [`Error::Configuration`] - Duplicate module identities, missing core library, missing
///   collaborators
/// - [`Error::MethodNotFound`] / [`Error::AmbiguousMethod`] - Bad method lookup keys
///
/// ## Pipeline failures
/// - [`Error::EmitFailure`] - The front end reported error diagnostics
/// - [`Error::VerificationMismatch`] - Verifier outcome or message differs from expectation
/// - [`Error::ExecutionMismatch`] - Exit code, stdout or stderr differs from expectation
/// - [`Error::IlMismatch`] - An IL baseline does not match the rendered listing
/// - [`Error::Cancelled`] - The cancellation flag was raised before emission finished
///
/// ## Input errors
/// - [`Error::Malformed`] - A debug document could not be interpreted
/// - [`Error::Xml`] - The debug document is not well-formed XML
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Error`] - Failures reported by external tools
///
/// # Examples
///
/// ```rust,no_run
/// use emitscope::{Error, Verification};
/// # fn run(session: &emitscope::CompilationVerifier) -> emitscope::Result<()> {
/// match session.verify(&Verification::passes()) {
///     Ok(outcome) => println!("verified: {outcome:?}"),
///     Err(Error::Configuration { message, .. }) => eprintln!("bad test setup: {message}"),
///     Err(Error::VerificationMismatch(mismatch)) => eprintln!("{mismatch}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The test itself is set up incorrectly.
    ///
    /// Raised for duplicate module identities and a missing core library when the expectation
    /// does not tolerate them. Also raised when an operation needs a collaborator that was
    /// never configured, such as a real-token IL renderer.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the misconfiguration
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Configuration - {file}:{line}: {message}")]
    Configuration {
        /// The message to be printed for the Configuration error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The front end failed to emit one of the compilation units.
    ///
    /// Diagnostics are surfaced verbatim. When dumps are enabled, the modules emitted before
    /// the failure have been written to `dump_dir`.
    #[error("Emit failed with {} error(s){}:\n{}", count_errors(.diagnostics), render_dump_dir(.dump_dir), render_diagnostics(.diagnostics))]
    EmitFailure {
        /// Every diagnostic reported while emitting the closure
        diagnostics: Vec<Diagnostic>,
        /// Directory holding the postmortem dump, if one was written
        dump_dir: Option<PathBuf>,
    },

    /// A verifier outcome or message differs from the declared expectation.
    #[error("{0}")]
    VerificationMismatch(Box<VerificationMismatch>),

    /// The executed program behaved differently than expected.
    #[error("{0}")]
    ExecutionMismatch(Box<ExecutionMismatch>),

    /// A rendered IL listing differs from the expected baseline.
    #[error("IL for '{method}' does not match the expected baseline.\nExpected:\n{expected}\nActual:\n{actual}")]
    IlMismatch {
        /// The method whose IL was compared
        method: String,
        /// Expected listing after whitespace normalization
        expected: String,
        /// Actual listing after whitespace normalization
        actual: String,
    },

    /// No method matched the lookup key.
    #[error("Method not found - {0}")]
    MethodNotFound(String),

    /// More than one method matched a lookup key given without a signature.
    #[error("Method name is ambiguous - {0}")]
    AmbiguousMethod(String),

    /// The cancellation flag was raised before emission completed.
    #[error("Emission was cancelled")]
    Cancelled,

    /// A debug document or external tool output could not be interpreted.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The debug document is not well-formed XML.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors from dump writing and temporary directories.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for failures reported by external tools.
    #[error("{0}")]
    Error(String),
}

/// The verifier whose outcome disagreed with the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VerifierKind {
    /// Metadata and IL checks run against the root module and its resolver
    #[strum(to_string = "structural verifier")]
    Structural,
    /// Whole-image checks run against the complete closure
    #[strum(to_string = "binary verifier")]
    Binary,
}

/// Details of a failed verification expectation.
#[derive(Debug, Clone)]
pub struct VerificationMismatch {
    /// Which verifier produced the unexpected result
    pub verifier: VerifierKind,
    /// Whether the expectation declared success
    pub expected_success: bool,
    /// Whether the verifier reported success
    pub actual_success: bool,
    /// Expected message after normalization, when the message was compared
    pub expected_message: Option<String>,
    /// Message produced by the verifier
    pub actual_message: String,
    /// Directory holding the postmortem dump, if one was written
    pub dump_dir: Option<PathBuf>,
}

impl fmt::Display for VerificationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = |success: bool| if success { "pass" } else { "fail" };
        if self.expected_success == self.actual_success {
            write!(f, "The {} message does not match the expectation", self.verifier)?;
        } else {
            write!(
                f,
                "The {} was expected to {} but did {}",
                self.verifier,
                outcome(self.expected_success),
                outcome(self.actual_success)
            )?;
        }
        f.write_str(&render_dump_dir(&self.dump_dir))?;
        if let Some(expected) = &self.expected_message {
            write!(f, "\nExpected:\n{expected}")?;
        }
        if !self.actual_message.is_empty() {
            write!(f, "\nActual:\n{}", self.actual_message)?;
        }
        Ok(())
    }
}

/// The part of the program's behavior that differed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ExecutionField {
    /// Process exit code
    #[strum(to_string = "exit code")]
    ExitCode,
    /// Standard output
    #[strum(to_string = "stdout")]
    Stdout,
    /// Standard error, which must stay empty when output is compared
    #[strum(to_string = "stderr")]
    Stderr,
}

/// Details of a failed execution expectation.
#[derive(Debug, Clone)]
pub struct ExecutionMismatch {
    /// The field that differed
    pub field: ExecutionField,
    /// Expected value
    pub expected: String,
    /// Value produced by the program
    pub actual: String,
}

impl fmt::Display for ExecutionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected {}.\nExpected: {:?}\nActual:   {:?}",
            self.field, self.expected, self.actual
        )
    }
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_dump_dir(dump_dir: &Option<PathBuf>) -> String {
    match dump_dir {
        Some(dir) => format!(" (modules dumped to '{}')", dir.display()),
        None => String::new(),
    }
}

//! Execution of an emitted closure and comparison of its behavior.
//!
//! The harness does not load modules itself. An [`ExecutionEnvironment`] receives the whole
//! closure and an argument vector, runs the root's entry point and reports exit code and
//! output streams. This module only compares the result against an
//! [`ExecutionExpectation`]. Execution is attempted once and never retried.

mod process;

use tracing::{info, info_span};

pub use process::{ProcessRuntime, RuntimeType};

use crate::{
    closure::DependencyClosure,
    error::{ExecutionField, ExecutionMismatch},
    Error, Result,
};

/// Runs the entry point of a closure's root module.
pub trait ExecutionEnvironment: Send + Sync {
    /// Execute `closure` with `args`.
    ///
    /// # Errors
    /// Returns an error if the environment could not run the program at all. A program
    /// that runs and fails reports that through its exit code.
    fn execute(&self, closure: &DependencyClosure, args: &[String]) -> Result<ExecutionOutput>;
}

/// What a program did when it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Process exit code
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

/// Expected program behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionExpectation {
    /// Command line arguments
    pub args: Vec<String>,
    /// Expected exit code, unchecked when `None`
    pub exit_code: Option<i32>,
    /// Expected standard output, unchecked when `None`
    pub output: Option<String>,
    /// Trim surrounding whitespace from both sides before comparing output
    pub trim_output: bool,
}

impl Default for ExecutionExpectation {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            exit_code: None,
            output: None,
            trim_output: true,
        }
    }
}

impl ExecutionExpectation {
    /// Expect this standard output
    #[must_use]
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Expect this exit code
    #[must_use]
    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    /// Pass these arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Compare output exactly, without trimming
    #[must_use]
    pub fn untrimmed(mut self) -> Self {
        self.trim_output = false;
        self
    }

    /// True if nothing would be compared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exit_code.is_none() && self.output.is_none()
    }

    /// Compare `actual` against this expectation.
    ///
    /// Checks run in a fixed order:
    /// 1. The exit code is compared first.
    /// 2. If output is expected, stdout is compared next.
    /// 3. Then stderr must be empty.
    ///
    /// # Errors
    /// Returns [`Error::ExecutionMismatch`] for the first field that differs.
    pub fn check(&self, actual: &ExecutionOutput) -> Result<()> {
        if let Some(expected) = self.exit_code {
            if expected != actual.exit_code {
                return Err(mismatch(
                    ExecutionField::ExitCode,
                    expected.to_string(),
                    actual.exit_code.to_string(),
                ));
            }
        }

        if let Some(expected) = &self.output {
            let (expected, stdout) = if self.trim_output {
                (expected.trim(), actual.stdout.trim())
            } else {
                (expected.as_str(), actual.stdout.as_str())
            };
            if expected != stdout {
                return Err(mismatch(ExecutionField::Stdout, expected, stdout));
            }
            if !actual.stderr.is_empty() {
                return Err(mismatch(ExecutionField::Stderr, "", actual.stderr.as_str()));
            }
        }

        Ok(())
    }
}

/// Execute `closure` in `environment` and check the result.
///
/// # Errors
/// Returns the environment's error if the program could not run and
/// [`Error::ExecutionMismatch`] if its behavior differs.
pub fn execute_and_compare(
    environment: &dyn ExecutionEnvironment,
    closure: &DependencyClosure,
    expectation: &ExecutionExpectation,
) -> Result<ExecutionOutput> {
    let span = info_span!("execute", root = closure.root().simple_name());
    let _guard = span.enter();

    let output = environment.execute(closure, &expectation.args)?;
    info!(exit_code = output.exit_code, "program finished");

    expectation.check(&output)?;
    Ok(output)
}

fn mismatch(field: ExecutionField, expected: impl Into<String>, actual: impl Into<String>) -> Error {
    Error::ExecutionMismatch(Box::new(ExecutionMismatch {
        field,
        expected: expected.into(),
        actual: actual.into(),
    }))
}

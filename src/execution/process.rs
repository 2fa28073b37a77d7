//! Execution through an installed .NET runtime
//!
//! Writes the closure into a temporary directory and runs the root module with `mono` or
//! `dotnet`. The directory lives as long as one execution and is removed on every exit
//! path, including errors.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use tempfile::TempDir;
use tracing::debug;

use crate::{
    closure::DependencyClosure,
    execution::{ExecutionEnvironment, ExecutionOutput},
    Error, Result,
};

/// Runtime used to execute a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Mono runtime (for .NET Framework assemblies)
    Mono,
    /// Modern .NET runtime (for .NET 8.0+ assemblies)
    DotNet,
}

impl RuntimeType {
    fn command(self) -> &'static str {
        match self {
            RuntimeType::Mono => "mono",
            RuntimeType::DotNet => "dotnet",
        }
    }
}

/// Runs closures with an installed `mono` or `dotnet` executable.
#[derive(Debug, Clone, Default)]
pub struct ProcessRuntime {
    /// Override runtime type (if None, will auto-detect based on availability)
    runtime_override: Option<RuntimeType>,
    /// Content of `<root>.runtimeconfig.json`, written for the modern runtime
    runtime_config: Option<String>,
}

impl ProcessRuntime {
    /// Create a runtime that picks mono first, then dotnet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime configured for a specific runtime type
    #[must_use]
    pub fn with_runtime(runtime_type: RuntimeType) -> Self {
        Self {
            runtime_override: Some(runtime_type),
            runtime_config: None,
        }
    }

    /// Set the runtimeconfig written next to the root for the modern runtime
    #[must_use]
    pub fn runtime_config(mut self, json: impl Into<String>) -> Self {
        self.runtime_config = Some(json.into());
        self
    }

    /// Check if Mono runtime is available
    #[must_use]
    pub fn is_mono_available(&self) -> bool {
        Command::new("mono").arg("--version").output().is_ok()
    }

    /// Check if modern .NET runtime is available
    #[must_use]
    pub fn is_dotnet_available(&self) -> bool {
        Command::new("dotnet").arg("--version").output().is_ok()
    }

    /// Get the runtime type that will be used for execution
    #[must_use]
    pub fn active_runtime(&self) -> Option<RuntimeType> {
        if let Some(runtime) = self.runtime_override {
            return Some(runtime);
        }
        if self.is_mono_available() {
            Some(RuntimeType::Mono)
        } else if self.is_dotnet_available() {
            Some(RuntimeType::DotNet)
        } else {
            None
        }
    }

    fn write_closure(&self, closure: &DependencyClosure, directory: &Path) -> Result<PathBuf> {
        for record in closure {
            fs::write(directory.join(record.file_name()), record.image())?;
            if let Some(debug_image) = record.debug_image() {
                fs::write(directory.join(record.debug_file_name()), debug_image)?;
            }
        }

        if let Some(config) = &self.runtime_config {
            let root = closure.root().simple_name();
            fs::write(directory.join(format!("{root}.runtimeconfig.json")), config)?;
        }

        Ok(directory.join(closure.root().file_name()))
    }
}

impl ExecutionEnvironment for ProcessRuntime {
    fn execute(&self, closure: &DependencyClosure, args: &[String]) -> Result<ExecutionOutput> {
        let runtime = self
            .active_runtime()
            .ok_or_else(|| Error::Error("No .NET runtime available (neither mono nor dotnet)".to_string()))?;

        let directory = TempDir::new()?;
        let root_path = self.write_closure(closure, directory.path())?;
        let root_file = root_path
            .file_name()
            .ok_or_else(|| Error::Error(format!("Invalid module path '{}'", root_path.display())))?;

        debug!(runtime = runtime.command(), root = %root_path.display(), "starting program");

        // Resolve dependencies relative to the closure directory
        let output = Command::new(runtime.command())
            .current_dir(directory.path())
            .arg(root_file)
            .args(args)
            .output()
            .map_err(|e| Error::Error(format!("Failed to execute {}: {}", runtime.command(), e)))?;

        let exit_code = output.status.code().ok_or_else(|| {
            Error::Error(format!("{} was terminated by a signal", runtime.command()))
        })?;

        Ok(ExecutionOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

use std::sync::{Arc, Mutex};

use crate::{
    closure::DependencyClosure,
    execution::{ExecutionEnvironment, ExecutionOutput},
    harness::FailFastHandler,
    verification::{
        ModuleReader, ModuleResolver, StructuralVerifier, StructuralVerifierProvider,
        VerifierError,
    },
    Result,
};

#[derive(Debug, Default)]
struct VerifierState {
    core_library: Option<String>,
    verified_roots: Vec<String>,
}

/// Structural verifier reporting a fixed list of errors and recording what it saw
#[derive(Debug, Clone, Default)]
pub struct RecordingVerifier {
    errors: Vec<VerifierError>,
    state: Arc<Mutex<VerifierState>>,
}

impl RecordingVerifier {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing(errors: Vec<VerifierError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn core_library(&self) -> Option<String> {
        self.state.lock().unwrap().core_library.clone()
    }

    pub fn verified_roots(&self) -> Vec<String> {
        self.state.lock().unwrap().verified_roots.clone()
    }
}

struct RecordingRun<'r> {
    resolver: &'r ModuleResolver<'r>,
    errors: Vec<VerifierError>,
    state: Arc<Mutex<VerifierState>>,
}

impl StructuralVerifier for RecordingRun<'_> {
    fn set_core_library(&mut self, simple_name: &str) {
        assert!(self.resolver.resolve(simple_name).is_some());
        self.state.lock().unwrap().core_library = Some(simple_name.to_string());
    }

    fn verify(&mut self, root: ModuleReader<'_>) -> Vec<VerifierError> {
        self.state
            .lock()
            .unwrap()
            .verified_roots
            .push(root.name().to_string());
        self.errors.clone()
    }
}

impl StructuralVerifierProvider for RecordingVerifier {
    fn create<'r>(&self, resolver: &'r ModuleResolver<'r>) -> Box<dyn StructuralVerifier + 'r> {
        Box::new(RecordingRun {
            resolver,
            errors: self.errors.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Execution environment replaying a fixed output
#[derive(Debug, Clone)]
pub struct ScriptedRuntime {
    output: ExecutionOutput,
    executed: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl ScriptedRuntime {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            output: ExecutionOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
            executed: Arc::default(),
        }
    }

    pub fn executed_roots(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(root, _)| root.clone())
            .collect()
    }

    pub fn arguments(&self) -> Vec<Vec<String>> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl ExecutionEnvironment for ScriptedRuntime {
    fn execute(&self, closure: &DependencyClosure, args: &[String]) -> Result<ExecutionOutput> {
        self.executed
            .lock()
            .unwrap()
            .push((closure.root().simple_name().to_string(), args.to_vec()));
        Ok(self.output.clone())
    }
}

/// Fail-fast handler that records reports instead of aborting
#[derive(Debug, Clone, Default)]
pub struct RecordingFailFast {
    reports: Arc<Mutex<Vec<String>>>,
}

impl RecordingFailFast {
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl FailFastHandler for RecordingFailFast {
    fn fail_fast(&self, report: &str) {
        self.reports.lock().unwrap().push(report.to_string());
    }
}

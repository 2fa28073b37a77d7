//! Front-end and collaborator stand-ins shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use emitscope::{
    compilation::{
        Compilation, CompilationRef, CompilationTestData, Diagnostic, EmitOutput, EmitRequest,
        MetadataReference, MethodData, Reference, SourceText,
    },
    execution::{ExecutionEnvironment, ExecutionOutput},
    module::{AssemblyIdentity, AssemblyVersion},
    verification::{
        ModuleReader, ModuleResolver, StructuralVerifier, StructuralVerifierProvider,
        VerifierError,
    },
    DependencyClosure, FailFastHandler, OutputKind, Result,
};

/// Install a test subscriber once per test binary, filtered by `RUST_LOG`
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn corlib() -> MetadataReference {
    MetadataReference::assembly(
        AssemblyIdentity::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0)),
        Arc::from(&b"mscorlib"[..]),
    )
}

/// A compilation whose image is the bytes of its name
#[derive(Debug)]
pub struct Fixture {
    identity: AssemblyIdentity,
    kind: OutputKind,
    references: Vec<Reference>,
    core_library: Option<AssemblyIdentity>,
    sources: Vec<SourceText>,
    diagnostics: Vec<Diagnostic>,
    test_data: CompilationTestData,
    emits: Arc<Mutex<usize>>,
}

impl Fixture {
    pub fn new(name: &str, kind: OutputKind) -> Self {
        Self {
            identity: AssemblyIdentity::parse(name).unwrap(),
            kind,
            references: Vec::new(),
            core_library: Some(AssemblyIdentity::new(
                "mscorlib",
                AssemblyVersion::new(4, 0, 0, 0),
            )),
            sources: Vec::new(),
            diagnostics: Vec::new(),
            test_data: CompilationTestData::default(),
            emits: Arc::default(),
        }
    }

    pub fn library(name: &str) -> Self {
        Self::new(name, OutputKind::Library)
    }

    pub fn console(name: &str) -> Self {
        Self::new(name, OutputKind::ConsoleApplication)
    }

    pub fn reference(mut self, unit: &CompilationRef) -> Self {
        self.references.push(Reference::Compilation(Arc::clone(unit)));
        self
    }

    pub fn metadata(mut self, reference: MetadataReference) -> Self {
        self.references.push(Reference::Metadata(reference));
        self
    }

    pub fn without_core_library(mut self) -> Self {
        self.core_library = None;
        self
    }

    pub fn source(mut self, path: &str, text: &str) -> Self {
        self.sources.push(SourceText::new(text).with_path(path));
        self
    }

    pub fn diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn method(mut self, method: MethodData) -> Self {
        self.test_data.add_method(method);
        self
    }

    pub fn build(self) -> CompilationRef {
        Arc::new(self)
    }

    pub fn build_counted(self) -> (CompilationRef, Arc<Mutex<usize>>) {
        let emits = Arc::clone(&self.emits);
        (Arc::new(self), emits)
    }
}

impl Compilation for Fixture {
    fn identity(&self) -> AssemblyIdentity {
        self.identity.clone()
    }

    fn output_kind(&self) -> OutputKind {
        self.kind
    }

    fn references(&self) -> Vec<Reference> {
        self.references.clone()
    }

    fn core_library(&self) -> Option<AssemblyIdentity> {
        self.core_library.clone()
    }

    fn sources(&self) -> Vec<SourceText> {
        self.sources.clone()
    }

    fn emit(&self, request: &EmitRequest<'_>) -> EmitOutput {
        *self.emits.lock().unwrap() += 1;
        if self.diagnostics.iter().any(Diagnostic::is_error) {
            return EmitOutput {
                diagnostics: self.diagnostics.clone(),
                ..EmitOutput::default()
            };
        }

        EmitOutput {
            image: Some(Arc::from(self.identity.simple_name().as_bytes())),
            debug_image: request
                .debug_format
                .is_side_by_side()
                .then(|| Arc::from(&b"BSJB"[..])),
            diagnostics: self.diagnostics.clone(),
            test_data: request.collect_test_data.then(|| self.test_data.clone()),
        }
    }
}

/// Structural verifier returning canned errors
#[derive(Debug, Clone, Default)]
pub struct CannedVerifier {
    errors: Vec<VerifierError>,
    runs: Arc<Mutex<Vec<String>>>,
}

impl CannedVerifier {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing(errors: Vec<VerifierError>) -> Self {
        Self {
            errors,
            runs: Arc::default(),
        }
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

struct CannedRun {
    errors: Vec<VerifierError>,
    runs: Arc<Mutex<Vec<String>>>,
}

impl StructuralVerifier for CannedRun {
    fn set_core_library(&mut self, _simple_name: &str) {}

    fn verify(&mut self, root: ModuleReader<'_>) -> Vec<VerifierError> {
        self.runs.lock().unwrap().push(root.name().to_string());
        self.errors.clone()
    }
}

impl StructuralVerifierProvider for CannedVerifier {
    fn create<'r>(&self, _resolver: &'r ModuleResolver<'r>) -> Box<dyn StructuralVerifier + 'r> {
        Box::new(CannedRun {
            errors: self.errors.clone(),
            runs: Arc::clone(&self.runs),
        })
    }
}

/// Runtime replaying a fixed result
#[derive(Debug, Clone)]
pub struct Replay(pub ExecutionOutput);

impl Replay {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self(ExecutionOutput {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        })
    }
}

impl ExecutionEnvironment for Replay {
    fn execute(&self, _closure: &DependencyClosure, _args: &[String]) -> Result<ExecutionOutput> {
        Ok(self.0.clone())
    }
}

/// Fail-fast handler collecting reports
#[derive(Debug, Clone, Default)]
pub struct CollectReports(pub Arc<Mutex<Vec<String>>>);

impl FailFastHandler for CollectReports {
    fn fail_fast(&self, report: &str) {
        self.0.lock().unwrap().push(report.to_string());
    }
}

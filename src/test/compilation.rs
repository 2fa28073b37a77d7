use std::sync::{Arc, Mutex};

use crate::{
    compilation::{
        Compilation, CompilationRef, CompilationTestData, DebugFormat, Diagnostic, EmitOutput,
        EmitRequest, MetadataReference, MethodData, Reference, SourceText,
    },
    module::{AssemblyIdentity, OutputKind},
    test::{corlib_identity, image},
};

/// One call of [`Compilation::emit`] as seen by a [`TestCompilation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitCall {
    pub debug_format: DebugFormat,
    pub resources: Vec<String>,
    pub embedded: Vec<String>,
    pub collect_test_data: bool,
}

/// Shared log of emit calls
#[derive(Debug, Default)]
pub struct EmitLog {
    calls: Mutex<Vec<EmitCall>>,
}

impl EmitLog {
    pub fn calls(&self) -> Vec<EmitCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

/// A front-end stand-in. Emits the bytes of its simple name as image, or fails if any
/// error diagnostic was attached.
#[derive(Debug)]
pub struct TestCompilation {
    identity: AssemblyIdentity,
    kind: OutputKind,
    references: Vec<Reference>,
    previous: Option<CompilationRef>,
    core_library: Option<AssemblyIdentity>,
    sources: Vec<SourceText>,
    diagnostics: Vec<Diagnostic>,
    test_data: CompilationTestData,
    log: Arc<EmitLog>,
}

impl TestCompilation {
    pub fn new(name: &str, kind: OutputKind) -> Self {
        Self {
            identity: AssemblyIdentity::parse(name).unwrap(),
            kind,
            references: Vec::new(),
            previous: None,
            core_library: Some(corlib_identity()),
            sources: Vec::new(),
            diagnostics: Vec::new(),
            test_data: CompilationTestData::default(),
            log: Arc::new(EmitLog::default()),
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

    pub fn metadata_reference(mut self, reference: MetadataReference) -> Self {
        self.references.push(Reference::Metadata(reference));
        self
    }

    pub fn previous_submission(mut self, unit: &CompilationRef) -> Self {
        self.previous = Some(Arc::clone(unit));
        self
    }

    pub fn core_library(mut self, identity: Option<AssemblyIdentity>) -> Self {
        self.core_library = identity;
        self
    }

    pub fn source(mut self, source: SourceText) -> Self {
        self.sources.push(source);
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

    pub fn synthesized(mut self, type_name: &str, members: &[&str]) -> Self {
        self.test_data.synthesized_members.insert(
            type_name.to_string(),
            members.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn build(self) -> CompilationRef {
        Arc::new(self)
    }

    pub fn build_tracked(self) -> (CompilationRef, Arc<EmitLog>) {
        let log = Arc::clone(&self.log);
        (Arc::new(self), log)
    }
}

impl Compilation for TestCompilation {
    fn identity(&self) -> AssemblyIdentity {
        self.identity.clone()
    }

    fn output_kind(&self) -> OutputKind {
        self.kind
    }

    fn references(&self) -> Vec<Reference> {
        self.references.clone()
    }

    fn previous_submission(&self) -> Option<CompilationRef> {
        self.previous.clone()
    }

    fn core_library(&self) -> Option<AssemblyIdentity> {
        self.core_library.clone()
    }

    fn sources(&self) -> Vec<SourceText> {
        self.sources.clone()
    }

    fn emit(&self, request: &EmitRequest<'_>) -> EmitOutput {
        if let Ok(mut calls) = self.log.calls.lock() {
            calls.push(EmitCall {
                debug_format: request.debug_format,
                resources: request
                    .manifest_resources
                    .iter()
                    .map(|resource| resource.name.clone())
                    .collect(),
                embedded: request
                    .embedded_texts
                    .iter()
                    .map(|text| text.path.clone())
                    .collect(),
                collect_test_data: request.collect_test_data,
            });
        }

        if self.diagnostics.iter().any(Diagnostic::is_error) {
            return EmitOutput {
                diagnostics: self.diagnostics.clone(),
                ..EmitOutput::default()
            };
        }

        let name = self.identity.simple_name();
        EmitOutput {
            image: Some(image(name)),
            debug_image: request
                .debug_format
                .is_side_by_side()
                .then(|| image(&format!("pdb:{name}"))),
            diagnostics: self.diagnostics.clone(),
            test_data: request.collect_test_data.then(|| self.test_data.clone()),
        }
    }
}

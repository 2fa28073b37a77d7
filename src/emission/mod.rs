//! Emission of a root compilation and everything it depends on.
//!
//! Emission proceeds in a fixed order:
//! 1. Every compilation unit reachable from the root is emitted, dependencies first, and
//!    registered in an [`IdentityTracker`].
//! 2. The binary references of the root and of every dependency are unpacked into module
//!    records, skipping identities already registered.
//! 3. The root is emitted last, with manifest resources and test hooks.
//! 4. The three sources are combined into a [`DependencyClosure`].
//!
//! Because dependencies are registered before references are unpacked, a binary image of a
//! unit that was also compiled in this run never appears twice in the closure.

mod references;

use tracing::{debug, info, info_span};

use crate::{
    closure::{ClosureAssembler, DependencyClosure, DuplicatePolicy},
    compilation::{
        walker, CancellationFlag, CompilationRef, CompilationTestData, DebugFormat, Diagnostic,
        EmbeddedText, EmitOutput, EmitRequest, ManifestResource,
    },
    config::HarnessConfig,
    dump::DumpService,
    module::{AssemblyIdentity, IdentityTracker, ModuleRecord, OutputKind, Provenance},
    Error, Result,
};

/// Per-emission options.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Debug format override; the harness default applies when `None`
    pub debug_format: Option<DebugFormat>,
    /// Manifest resources embedded into the root module
    pub manifest_resources: Vec<ManifestResource>,
    /// How the closure assembler treats duplicate identities
    pub duplicate_policy: DuplicatePolicy,
}

impl EmitOptions {
    /// Request a specific debug format
    #[must_use]
    pub fn debug_format(mut self, format: DebugFormat) -> Self {
        self.debug_format = Some(format);
        self
    }

    /// Embed a manifest resource into the root module
    #[must_use]
    pub fn resource(mut self, resource: ManifestResource) -> Self {
        self.manifest_resources.push(resource);
        self
    }

    /// Set the duplicate policy
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// The outcome of a successful emission.
#[derive(Debug, Clone)]
pub struct EmissionResult {
    closure: DependencyClosure,
    diagnostics: Vec<Diagnostic>,
    test_data: CompilationTestData,
}

impl EmissionResult {
    /// The emitted root module
    #[must_use]
    pub fn root(&self) -> &ModuleRecord {
        self.closure.root()
    }

    /// The full dependency closure, root first
    #[must_use]
    pub fn closure(&self) -> &DependencyClosure {
        &self.closure
    }

    /// Warnings and informational diagnostics of every unit
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The root unit's compiler test hooks
    #[must_use]
    pub fn test_data(&self) -> &CompilationTestData {
        &self.test_data
    }
}

/// Drives the front end over a root compilation and its dependencies.
pub struct EmissionEngine<'a> {
    config: &'a HarnessConfig,
    dumps: &'a DumpService,
    cancellation: &'a CancellationFlag,
}

impl<'a> EmissionEngine<'a> {
    /// Create an engine
    #[must_use]
    pub fn new(
        config: &'a HarnessConfig,
        dumps: &'a DumpService,
        cancellation: &'a CancellationFlag,
    ) -> Self {
        Self {
            config,
            dumps,
            cancellation,
        }
    }

    /// Emit `root` and its dependencies and assemble the closure.
    ///
    /// `supplied` records are appended after the emitted dependencies.
    ///
    /// # Errors
    /// - [`Error::EmitFailure`] if any unit fails to emit; the modules emitted so far are
    ///   dumped first
    /// - [`Error::Cancelled`] if the cancellation flag is raised
    /// - [`Error::Configuration`] if the closure contains duplicate identities and the policy
    ///   rejects them
    pub fn emit(
        &self,
        root: &CompilationRef,
        options: &EmitOptions,
        supplied: &[ModuleRecord],
    ) -> Result<EmissionResult> {
        let root_identity = root.identity();
        let span = info_span!("emit", root = %root_identity.simple_name());
        let _guard = span.enter();

        let debug_format = options.debug_format.unwrap_or(self.config.debug_format);
        let core_library = root.core_library();

        let mut tracker = IdentityTracker::new();
        let mut dependencies = Vec::new();
        let mut diagnostics = Vec::new();
        let mut failed = false;

        let referenced = walker::referenced_compilations(root);
        for unit in &referenced {
            let output = self.emit_unit(unit, debug_format, &[], false)?;
            let succeeded = output.succeeded();
            diagnostics.extend(output.diagnostics);

            match output.image {
                Some(image) if succeeded => {
                    let identity = unit.identity();
                    let record = unit_record(&identity, unit.output_kind(), image)
                        .with_debug_image(output.debug_image)
                        .with_core_library(core_library.as_ref() == Some(&identity));
                    tracker.insert(record.identity());
                    dependencies.push(record);
                }
                _ => failed = true,
            }
        }

        if failed {
            return Err(self.failure(diagnostics, &dependencies));
        }

        for unit in std::iter::once(root).chain(referenced.iter()) {
            references::unpack(unit, core_library.as_ref(), &mut tracker, &mut dependencies);
        }

        let output = self.emit_unit(root, debug_format, &options.manifest_resources, true)?;
        let succeeded = output.succeeded();
        diagnostics.extend(output.diagnostics);

        let image = match output.image {
            Some(image) if succeeded => image,
            _ => return Err(self.failure(diagnostics, &dependencies)),
        };

        let root_record = unit_record(&root_identity, root.output_kind(), image)
            .with_debug_image(output.debug_image)
            .with_core_library(core_library.as_ref() == Some(&root_identity));

        let closure = ClosureAssembler::new()
            .policy(options.duplicate_policy)
            .core_library(core_library)
            .assemble(root_record, dependencies, supplied)?;

        info!(modules = closure.len(), "emitted closure");

        Ok(EmissionResult {
            closure,
            diagnostics,
            test_data: output.test_data.unwrap_or_default(),
        })
    }

    fn emit_unit(
        &self,
        unit: &CompilationRef,
        debug_format: DebugFormat,
        manifest_resources: &[ManifestResource],
        collect_test_data: bool,
    ) -> Result<EmitOutput> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let embedded_texts = EmbeddedText::select(&unit.sources());
        let request = EmitRequest {
            debug_format,
            manifest_resources,
            embedded_texts: &embedded_texts,
            cancellation: self.cancellation,
            collect_test_data,
        };

        debug!(
            unit = %unit.identity().simple_name(),
            %debug_format,
            embedded = embedded_texts.len(),
            "emitting compilation unit"
        );

        let output = unit.emit(&request);
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if !debug_format.is_side_by_side() && output.debug_image.is_some() {
            debug!("front end returned a side-by-side debug image for embedded debug info");
        }
        Ok(output)
    }

    fn failure(&self, diagnostics: Vec<Diagnostic>, emitted: &[ModuleRecord]) -> Error {
        let dump_dir = self.dumps.dump_or_warn(emitted);
        Error::EmitFailure {
            diagnostics,
            dump_dir,
        }
    }
}

fn unit_record(
    identity: &AssemblyIdentity,
    kind: OutputKind,
    image: std::sync::Arc<[u8]>,
) -> ModuleRecord {
    match kind {
        OutputKind::NetModule => ModuleRecord::net_module(
            &format!("{}{}", identity.simple_name(), kind.extension()),
            image,
            Provenance::Compiled,
        ),
        kind => ModuleRecord::assembly(identity, kind, image, Provenance::Compiled),
    }
}

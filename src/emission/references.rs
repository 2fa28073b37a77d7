use tracing::debug;

use crate::{
    compilation::{CompilationRef, MetadataReference, ModuleImage, Reference},
    module::{AssemblyIdentity, IdentityTracker, ModuleRecord, OutputKind, Provenance},
};

/// Unpack the binary references of `unit` into module records.
///
/// Compilation references are skipped; they are emitted as units of their own. Each
/// constituent module is registered with `tracker` and skipped if its identity was already
/// registered, which is how a frozen image of a unit emitted in this run stays out of the
/// closure. A manifest module whose identity equals `core_library` is flagged as the core
/// library.
pub(crate) fn unpack(
    unit: &CompilationRef,
    core_library: Option<&AssemblyIdentity>,
    tracker: &mut IdentityTracker,
    records: &mut Vec<ModuleRecord>,
) {
    for reference in unit.references() {
        match reference {
            Reference::Compilation(_) => {}
            Reference::Metadata(MetadataReference::Assembly { identity, modules }) => {
                let is_core = core_library.is_some_and(|core| core == &identity);
                let mut modules = modules.into_iter();

                if let Some(manifest) = modules.next() {
                    let record = ModuleRecord::assembly(
                        &identity,
                        OutputKind::Library,
                        manifest.image,
                        Provenance::Referenced,
                    )
                    .with_core_library(is_core);
                    register(record, tracker, records);
                }

                for module in modules {
                    register(secondary(module), tracker, records);
                }
            }
            Reference::Metadata(MetadataReference::Module(module)) => {
                register(secondary(module), tracker, records);
            }
        }
    }
}

fn secondary(module: ModuleImage) -> ModuleRecord {
    ModuleRecord::net_module(&module.name, module.image, Provenance::Referenced)
}

fn register(record: ModuleRecord, tracker: &mut IdentityTracker, records: &mut Vec<ModuleRecord>) {
    if tracker.insert(record.identity()) {
        debug!(identity = record.identity(), "unpacked referenced module");
        records.push(record);
    }
}

mod compilation;
mod doubles;
use std::sync::Arc;

pub use compilation::*;
pub use doubles::*;

use crate::{
    compilation::MetadataReference,
    module::{AssemblyIdentity, AssemblyVersion, ModuleRecord, OutputKind, Provenance},
};

// Helper function to create an image holding the given text
pub fn image(name: &str) -> Arc<[u8]> {
    Arc::from(name.as_bytes())
}

// Helper function to create the identity of the test core library
pub fn corlib_identity() -> AssemblyIdentity {
    AssemblyIdentity::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0))
        .with_public_key_token([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89])
}

// Helper function to create a reference to the test core library
pub fn corlib_reference() -> MetadataReference {
    MetadataReference::assembly(corlib_identity(), image("mscorlib"))
}

// Helper function to create a supplied library record
pub fn record(name: &str) -> ModuleRecord {
    ModuleRecord::assembly(
        &AssemblyIdentity::parse(name).unwrap(),
        OutputKind::Library,
        image(name),
        Provenance::Supplied,
    )
}

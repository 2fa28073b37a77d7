//! Module records and their container kinds.

use std::{fmt, sync::Arc};

use strum::{Display, EnumIter};

use crate::module::identity::AssemblyIdentity;

/// The container kind of a binary module.
///
/// Determines the file extension used when the module is written to disk, and whether the
/// module can serve as an execution entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum OutputKind {
    /// A class library (`.dll`)
    #[strum(to_string = "DynamicallyLinkedLibrary")]
    Library,
    /// A console executable (`.exe`)
    #[strum(to_string = "ConsoleApplication")]
    ConsoleApplication,
    /// A windowed executable (`.exe`)
    #[strum(to_string = "WindowsApplication")]
    WindowsApplication,
    /// A module without an assembly manifest (`.netmodule`)
    #[strum(to_string = "NetModule")]
    NetModule,
}

impl OutputKind {
    /// The file extension implied by this kind, including the leading dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Library => ".dll",
            OutputKind::ConsoleApplication | OutputKind::WindowsApplication => ".exe",
            OutputKind::NetModule => ".netmodule",
        }
    }

    /// True for kinds that carry an entry point
    #[must_use]
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            OutputKind::ConsoleApplication | OutputKind::WindowsApplication
        )
    }
}

/// Where a [`ModuleRecord`] came from.
///
/// The tag is informational. Identity tracking and closure assembly treat all provenances
/// the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Provenance {
    /// Emitted by the front end during this run
    Compiled,
    /// Unpacked from a binary metadata reference of a compiled unit
    Referenced,
    /// Handed to the pipeline by the caller as a pre-built fixture
    Supplied,
}

/// An immutable description of one binary module in a dependency closure.
///
/// Images are reference counted and never copied once produced; cloning a record only
/// bumps the counts.
#[derive(Clone)]
pub struct ModuleRecord {
    identity: String,
    simple_name: String,
    kind: OutputKind,
    image: Arc<[u8]>,
    debug_image: Option<Arc<[u8]>>,
    provenance: Provenance,
    is_core_library: bool,
}

impl ModuleRecord {
    /// Create a record for the manifest module of an assembly
    #[must_use]
    pub fn assembly(
        identity: &AssemblyIdentity,
        kind: OutputKind,
        image: Arc<[u8]>,
        provenance: Provenance,
    ) -> Self {
        Self {
            identity: identity.display_name(),
            simple_name: identity.simple_name().to_string(),
            kind,
            image,
            debug_image: None,
            provenance,
            is_core_library: false,
        }
    }

    /// Create a record for a secondary module, identified by its file name.
    ///
    /// The simple name is the file name without a `.netmodule` extension.
    #[must_use]
    pub fn net_module(name: &str, image: Arc<[u8]>, provenance: Provenance) -> Self {
        let simple_name = strip_extension(name, OutputKind::NetModule.extension());
        Self {
            identity: name.to_string(),
            simple_name: simple_name.to_string(),
            kind: OutputKind::NetModule,
            image,
            debug_image: None,
            provenance,
            is_core_library: false,
        }
    }

    /// Attach a side-by-side debug image
    #[must_use]
    pub fn with_debug_image(mut self, debug_image: Option<Arc<[u8]>>) -> Self {
        self.debug_image = debug_image;
        self
    }

    /// Mark or unmark this record as the core library
    #[must_use]
    pub fn with_core_library(mut self, is_core_library: bool) -> Self {
        self.is_core_library = is_core_library;
        self
    }

    /// Display name (assemblies) or module file name (net-modules)
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The simple name used by resolvers and dump file names
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    /// Container kind
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    /// The binary image
    #[must_use]
    pub fn image(&self) -> &Arc<[u8]> {
        &self.image
    }

    /// The debug image, absent when debug info is embedded or unavailable
    #[must_use]
    pub fn debug_image(&self) -> Option<&Arc<[u8]>> {
        self.debug_image.as_ref()
    }

    /// Provenance tag
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// True for modules produced by this run
    #[must_use]
    pub fn in_memory(&self) -> bool {
        self.provenance == Provenance::Compiled
    }

    /// True if this record defines the root object type of the closure
    #[must_use]
    pub fn is_core_library(&self) -> bool {
        self.is_core_library
    }

    /// The file name used when writing the image to disk.
    ///
    /// Net-modules keep their full module name so that the manifest's file table still
    /// resolves them.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self.kind {
            OutputKind::NetModule => self.identity.clone(),
            kind => format!("{}{}", self.simple_name, kind.extension()),
        }
    }

    /// The file name of the side-by-side debug image
    #[must_use]
    pub fn debug_file_name(&self) -> String {
        format!("{}.pdb", self.simple_name)
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("image_len", &self.image.len())
            .field(
                "debug_image_len",
                &self.debug_image.as_ref().map(|image| image.len()),
            )
            .field("provenance", &self.provenance)
            .field("is_core_library", &self.is_core_library)
            .finish()
    }
}

fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    let split = name.len().saturating_sub(extension.len());
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(tail)) if !stem.is_empty() && tail.eq_ignore_ascii_case(extension) => {
            stem
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn image() -> Arc<[u8]> {
        Arc::from(&b"MZ"[..])
    }

    #[test]
    fn extensions_follow_kind() {
        let extensions: Vec<_> = OutputKind::iter().map(OutputKind::extension).collect();
        assert_eq!(extensions, vec![".dll", ".exe", ".exe", ".netmodule"]);
        assert!(OutputKind::ConsoleApplication.is_executable());
        assert!(!OutputKind::NetModule.is_executable());
    }

    #[test]
    fn assembly_record_file_names() {
        let identity = AssemblyIdentity::parse("App, Version=1.0.0.0").unwrap();
        let record = ModuleRecord::assembly(
            &identity,
            OutputKind::ConsoleApplication,
            image(),
            Provenance::Compiled,
        );

        assert_eq!(
            record.identity(),
            "App, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"
        );
        assert_eq!(record.simple_name(), "App");
        assert_eq!(record.file_name(), "App.exe");
        assert_eq!(record.debug_file_name(), "App.pdb");
        assert!(record.in_memory());
        assert!(record.debug_image().is_none());
    }

    #[test]
    fn net_module_keeps_module_name() {
        let record = ModuleRecord::net_module("Part.netmodule", image(), Provenance::Referenced);
        assert_eq!(record.simple_name(), "Part");
        assert_eq!(record.file_name(), "Part.netmodule");
        assert!(!record.in_memory());

        let bare = ModuleRecord::net_module("Other", image(), Provenance::Referenced);
        assert_eq!(bare.simple_name(), "Other");
    }

    #[test]
    fn clones_share_images() {
        let identity = AssemblyIdentity::parse("Lib").unwrap();
        let record = ModuleRecord::assembly(&identity, OutputKind::Library, image(), Provenance::Supplied)
            .with_core_library(true);
        let copy = record.clone();

        assert!(Arc::ptr_eq(record.image(), copy.image()));
        assert!(copy.is_core_library());
    }
}

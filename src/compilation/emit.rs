use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use strum::{Display, EnumString};

use crate::compilation::{CompilationTestData, Diagnostic, SourceText};

/// Format of the debug information produced alongside an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DebugFormat {
    /// Portable PDB embedded in the image; no side-by-side debug image
    #[default]
    #[strum(serialize = "embedded")]
    Embedded,
    /// Side-by-side portable PDB
    #[strum(serialize = "portable")]
    PortablePdb,
    /// Side-by-side Windows PDB
    #[strum(serialize = "pdb")]
    WindowsPdb,
}

impl DebugFormat {
    /// True if the front end writes debug information into a separate image
    #[must_use]
    pub fn is_side_by_side(self) -> bool {
        !matches!(self, DebugFormat::Embedded)
    }
}

/// A resource embedded in the manifest of the root module.
#[derive(Debug, Clone)]
pub struct ManifestResource {
    /// Resource name
    pub name: String,
    /// Resource content
    pub data: Arc<[u8]>,
    /// Public or assembly-private visibility
    pub is_public: bool,
}

/// A source text embedded into the debug information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedText {
    /// The path the source declares
    pub path: String,
    /// The source content
    pub text: String,
}

impl EmbeddedText {
    /// Select the sources eligible for embedding.
    ///
    /// A source qualifies when it declares a non-empty path and allows embedding. Order
    /// follows the compilation's source order.
    #[must_use]
    pub fn select(sources: &[SourceText]) -> Vec<EmbeddedText> {
        sources
            .iter()
            .filter(|source| source.can_be_embedded)
            .filter_map(|source| match source.path.as_deref() {
                Some(path) if !path.is_empty() => Some(EmbeddedText {
                    path: path.to_string(),
                    text: source.text.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A cooperative cancellation signal shared with the front end.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Arguments to [`crate::Compilation::emit`].
#[derive(Debug)]
pub struct EmitRequest<'a> {
    /// Requested debug information format
    pub debug_format: DebugFormat,
    /// Manifest resources, only non-empty for the root unit
    pub manifest_resources: &'a [ManifestResource],
    /// Sources to embed into the debug information
    pub embedded_texts: &'a [EmbeddedText],
    /// Cancellation signal
    pub cancellation: &'a CancellationFlag,
    /// Whether the front end should hand back its test hooks
    pub collect_test_data: bool,
}

/// The result of emitting one compilation unit.
#[derive(Debug, Default)]
pub struct EmitOutput {
    /// The image, `None` if emission failed
    pub image: Option<Arc<[u8]>>,
    /// The side-by-side debug image, if one was requested and produced
    pub debug_image: Option<Arc<[u8]>>,
    /// Every diagnostic reported for this unit
    pub diagnostics: Vec<Diagnostic>,
    /// Compiler test hooks, if requested
    pub test_data: Option<CompilationTestData>,
}

impl EmitOutput {
    /// True if an image was produced and no error was reported
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.image.is_some() && !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::Severity;

    #[test]
    fn embedded_texts_require_path_and_permission() {
        let sources = vec![
            SourceText::new("class A {}").with_path("a.cs"),
            SourceText::new("class B {}"),
            SourceText::new("class C {}").with_path(""),
            SourceText::new("class D {}").with_path("d.cs").not_embeddable(),
            SourceText::new("class E {}").with_path("e.cs"),
        ];

        let selected = EmbeddedText::select(&sources);
        let paths: Vec<_> = selected.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["a.cs", "e.cs"]);
        assert_eq!(selected[0].text, "class A {}");
    }

    #[test]
    fn debug_format_from_str() {
        assert_eq!("EMBEDDED".parse::<DebugFormat>().unwrap(), DebugFormat::Embedded);
        assert_eq!("portable".parse::<DebugFormat>().unwrap(), DebugFormat::PortablePdb);
        assert!(DebugFormat::WindowsPdb.is_side_by_side());
        assert!("zip".parse::<DebugFormat>().is_err());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn output_success_requires_image_and_no_errors() {
        let mut output = EmitOutput {
            image: Some(Arc::from(&b"MZ"[..])),
            ..EmitOutput::default()
        };
        assert!(output.succeeded());

        output
            .diagnostics
            .push(Diagnostic::new("CS0001", Severity::Error, "boom"));
        assert!(!output.succeeded());
        assert!(!EmitOutput::default().succeeded());
    }
}

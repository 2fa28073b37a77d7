//! IL and metadata visualization of emitted methods.
//!
//! Two renderings exist, selected with [`IlMode`]:
//!
//! - **Pseudo tokens** render the in-memory method body captured by the front end. The
//!   listing is independent of metadata token assignment and needs no external tool.
//! - **Real tokens** disassemble the emitted root image through a configured
//!   [`Disassembler`]. The method's token is looked up in a symbol view of the root module,
//!   materialized once per session.
//!
//! Both renderings can carry sequence point markers ([`SequencePointDetail`]). Markers come
//! from the debug information of the root, decoded by a [`DebugInfoDecoder`] and resolved
//! against the compilation's in-memory sources.
//!
//! # Key Components
//!
//! - [`IlVisualizer`] - Renders one method in either mode
//! - [`ModuleSymbols`] - Cached method table of the emitted root
//! - [`DebugDocument`] / [`SequencePoints`] - Parsed debug information
//! - [`ProcessDisassembler`] - `monodis` backed [`Disassembler`]

pub mod debuginfo;
mod disassembler;
mod markers;
mod monodis;
pub mod pseudo;

use std::sync::OnceLock;

use strum::{Display, EnumIter};
use tracing::debug;

pub use debuginfo::{DebugDocument, DebugInfoDecoder, SequencePoint, SequencePoints};
pub use disassembler::{Disassembler, MemberEntry};
pub use markers::{annotate_listing, Marker, SequencePointMarkers};
pub use monodis::ProcessDisassembler;

use crate::{
    compilation::{MethodData, SourceText},
    module::{ModuleRecord, Token},
    Error, Result,
};

/// How metadata tokens appear in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum IlMode {
    /// Operands rendered by the front end, independent of token assignment
    #[default]
    Pseudo,
    /// Tokens of the emitted image, rendered by an external disassembler
    Real,
}

/// How sequence points appear in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum SequencePointDetail {
    /// No markers
    #[default]
    None,
    /// `-` before visible points and `~` before hidden ones
    Basic,
    /// A `// sequence point:` comment with the covered source text
    Enhanced,
}

/// The method table of an emitted module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSymbols {
    members: Vec<MemberEntry>,
}

impl ModuleSymbols {
    /// Wrap a member listing
    #[must_use]
    pub fn new(members: Vec<MemberEntry>) -> Self {
        Self { members }
    }

    /// Materialize the symbols of `module` through `disassembler`.
    ///
    /// # Errors
    /// Returns the disassembler's error.
    pub fn load(disassembler: &dyn Disassembler, module: &ModuleRecord) -> Result<Self> {
        let members = disassembler.enumerate_members(module)?;
        debug!(module = module.simple_name(), members = members.len(), "loaded module symbols");
        Ok(Self::new(members))
    }

    /// All members in table order
    #[must_use]
    pub fn members(&self) -> &[MemberEntry] {
        &self.members
    }

    /// Resolve the real token of `method`.
    ///
    /// Members are matched by name without signature. Among overloads, the one carrying
    /// the token captured at emission is chosen.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] if no member has the method's name and
    /// [`Error::AmbiguousMethod`] if overloads cannot be told apart.
    pub fn resolve(&self, method: &MethodData) -> Result<Token> {
        let name = method.name_without_signature();
        let candidates: Vec<&MemberEntry> = self
            .members
            .iter()
            .filter(|member| member.name == name)
            .collect();

        match candidates.as_slice() {
            [] => Err(Error::MethodNotFound(method.name.clone())),
            [single] => Ok(single.token),
            several => several
                .iter()
                .find(|member| member.token == method.token)
                .map(|member| member.token)
                .ok_or_else(|| Error::AmbiguousMethod(method.name.clone())),
        }
    }
}

/// Renders methods of one emitted root.
pub struct IlVisualizer<'a> {
    root: &'a ModuleRecord,
    sources: &'a [SourceText],
    symbols: &'a OnceLock<ModuleSymbols>,
    disassembler: Option<&'a dyn Disassembler>,
    decoder: Option<&'a dyn DebugInfoDecoder>,
}

impl<'a> IlVisualizer<'a> {
    /// Create a visualizer for `root`.
    ///
    /// `symbols` is the session's cache of the root's method table.
    #[must_use]
    pub fn new(
        root: &'a ModuleRecord,
        sources: &'a [SourceText],
        symbols: &'a OnceLock<ModuleSymbols>,
    ) -> Self {
        Self {
            root,
            sources,
            symbols,
            disassembler: None,
            decoder: None,
        }
    }

    /// Use this disassembler for real-token listings
    #[must_use]
    pub fn disassembler(mut self, disassembler: Option<&'a dyn Disassembler>) -> Self {
        self.disassembler = disassembler;
        self
    }

    /// Use this decoder for sequence point markers
    #[must_use]
    pub fn decoder(mut self, decoder: Option<&'a dyn DebugInfoDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Render `method`.
    ///
    /// # Errors
    /// - [`Error::Configuration`] if real tokens are requested without a disassembler, or
    ///   markers without a debug information decoder
    /// - the disassembler's or decoder's errors
    pub fn visualize(
        &self,
        method: &MethodData,
        mode: IlMode,
        detail: SequencePointDetail,
    ) -> Result<String> {
        match mode {
            IlMode::Pseudo => {
                let markers = self.markers(method.token, detail)?;
                Ok(pseudo::render(&method.body, markers.as_ref(), detail))
            }
            IlMode::Real => {
                let Some(disassembler) = self.disassembler else {
                    return Err(config_error!(
                        "Real-token IL of '{}' requested, but no disassembler is configured",
                        method.name
                    ));
                };

                let token = self.symbols(disassembler)?.resolve(method)?;
                let listing = disassembler.disassemble_method(self.root, token)?;
                match self.markers(token, detail)? {
                    Some(markers) => Ok(annotate_listing(&listing, &markers, detail)),
                    None => Ok(listing),
                }
            }
        }
    }

    fn symbols(&self, disassembler: &dyn Disassembler) -> Result<&'a ModuleSymbols> {
        if let Some(symbols) = self.symbols.get() {
            return Ok(symbols);
        }
        let symbols = ModuleSymbols::load(disassembler, self.root)?;
        Ok(self.symbols.get_or_init(|| symbols))
    }

    fn markers(
        &self,
        token: Token,
        detail: SequencePointDetail,
    ) -> Result<Option<SequencePointMarkers>> {
        if detail == SequencePointDetail::None {
            return Ok(None);
        }
        let Some(decoder) = self.decoder else {
            return Err(config_error!(
                "Sequence point markers requested, but no debug information decoder is configured"
            ));
        };

        let xml = decoder.decode(
            self.root.image(),
            self.root.debug_image().map(|image| &image[..]),
        )?;
        let document = DebugDocument::parse(&xml)?;
        let markers = SequencePointMarkers::for_method(&document, token, self.sources);
        if markers.is_none() {
            debug!(%token, "no debug information for method");
        }
        Ok(markers)
    }
}

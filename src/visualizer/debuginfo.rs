//! Debug information documents and sequence points.
//!
//! Debug images are not decoded by this crate. A [`DebugInfoDecoder`] turns the image and its
//! debug image into a PdbToXml-style document, which is parsed here:
//!
//! ```xml
//! <symbols>
//!   <files>
//!     <file id="1" name="a.cs" />
//!   </files>
//!   <methods>
//!     <method token="0x6000001">
//!       <sequencePoints>
//!         <entry offset="0x0" startLine="3" startColumn="5" endLine="3" endColumn="6" document="1" />
//!         <entry offset="0x1" hidden="true" document="1" />
//!       </sequencePoints>
//!     </method>
//!   </methods>
//! </symbols>
//! ```
//!
//! Lines and columns are 1-based, end columns are exclusive. Hidden points carry the
//! reserved line number `0xFEEFEE`.

use std::collections::{BTreeMap, HashMap};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{module::Token, Result};

/// Line number marking a hidden sequence point
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// Turns an emitted image and its debug information into an XML document.
pub trait DebugInfoDecoder: Send + Sync {
    /// Decode the debug information of `image`.
    ///
    /// `debug_image` is the side-by-side debug image, `None` when the debug information is
    /// embedded in `image`.
    ///
    /// # Errors
    /// Returns an error if the debug information cannot be read.
    fn decode(&self, image: &[u8], debug_image: Option<&[u8]>) -> Result<String>;
}

/// Represents a single sequence point mapping IL offset to source code location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint {
    /// Offset in the method's IL stream.
    pub il_offset: u32,
    /// Starting line in the source file.
    pub start_line: u32,
    /// Starting column in the source file.
    pub start_col: u16,
    /// Ending line in the source file.
    pub end_line: u32,
    /// Ending column in the source file, exclusive.
    pub end_col: u16,
    /// Id of the source document, see [`DebugDocument::file_name`].
    pub document: Option<u32>,
    /// True if this is a hidden sequence point (start_line == 0xFEEFEE).
    pub is_hidden: bool,
}

/// Collection of sequence points for a method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequencePoints(pub Vec<SequencePoint>);

impl SequencePoints {
    /// Returns the sequence point for a given IL offset, if any.
    pub fn find_by_il_offset(&self, il_offset: u32) -> Option<&SequencePoint> {
        self.0.iter().find(|sp| sp.il_offset == il_offset)
    }

    /// Iterate over the points in document order
    pub fn iter(&self) -> std::slice::Iter<'_, SequencePoint> {
        self.0.iter()
    }

    /// True if the method has no sequence points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed debug information document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugDocument {
    files: BTreeMap<u32, String>,
    methods: HashMap<Token, SequencePoints>,
}

impl DebugDocument {
    /// Parse a PdbToXml-style document.
    ///
    /// Unknown elements are ignored. Entries outside of a `<method>` element are dropped.
    ///
    /// # Errors
    /// - [`crate::Error::Xml`] if the document is not well-formed
    /// - [`crate::Error::Malformed`] if a token, offset or position is not a number
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut document = DebugDocument::default();
        let mut current: Option<Token> = None;

        loop {
            match reader.read_event()? {
                Event::Start(element) | Event::Empty(element) => {
                    match element.name().as_ref() {
                        b"file" => {
                            let id = parse_number(&required(&element, "id")?)?;
                            let name = required(&element, "name")?;
                            document.files.insert(id, name);
                        }
                        b"method" => {
                            let token = Token(parse_number(&required(&element, "token")?)?);
                            document.methods.entry(token).or_default();
                            current = Some(token);
                        }
                        b"entry" => {
                            if let Some(token) = current {
                                let point = parse_entry(&element)?;
                                document.methods.entry(token).or_default().0.push(point);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(element) if element.name().as_ref() == b"method" => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(document)
    }

    /// Sequence points of the method with definition token `token`
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&SequencePoints> {
        self.methods.get(&token)
    }

    /// Path of the source document with id `id`
    #[must_use]
    pub fn file_name(&self, id: u32) -> Option<&str> {
        self.files.get(&id).map(String::as_str)
    }

    /// The document id to path map
    #[must_use]
    pub fn files(&self) -> &BTreeMap<u32, String> {
        &self.files
    }
}

fn parse_entry(element: &BytesStart<'_>) -> Result<SequencePoint> {
    let il_offset = parse_number(&required(element, "offset")?)?;
    let document = attribute(element, "document")?
        .map(|id| parse_number(&id))
        .transpose()?;

    let hidden = attribute(element, "hidden")?.is_some_and(|value| value == "true");
    let start_line = optional_number(element, "startLine")?.unwrap_or(HIDDEN_LINE);

    if hidden || start_line == HIDDEN_LINE {
        return Ok(SequencePoint {
            il_offset,
            start_line: HIDDEN_LINE,
            start_col: 0,
            end_line: HIDDEN_LINE,
            end_col: 0,
            document,
            is_hidden: true,
        });
    }

    let start_col = column(optional_number(element, "startColumn")?.unwrap_or(0))?;
    let end_line = optional_number(element, "endLine")?.unwrap_or(start_line);
    let end_col = column(optional_number(element, "endColumn")?.unwrap_or(0))?;

    Ok(SequencePoint {
        il_offset,
        start_line,
        start_col,
        end_line,
        end_col,
        document,
        is_hidden: false,
    })
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required(element: &BytesStart<'_>, name: &str) -> Result<String> {
    attribute(element, name)?.ok_or_else(|| {
        malformed_error!(
            "Element <{}> lacks the '{}' attribute",
            String::from_utf8_lossy(element.name().as_ref()),
            name
        )
    })
}

fn optional_number(element: &BytesStart<'_>, name: &str) -> Result<Option<u32>> {
    attribute(element, name)?
        .map(|value| parse_number(&value))
        .transpose()
}

fn column(value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| malformed_error!("Column {} is out of range", value))
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
fn parse_number(value: &str) -> Result<u32> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| malformed_error!("Invalid number '{}'", value))
}

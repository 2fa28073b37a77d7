use std::collections::BTreeMap;

use crate::{
    compilation::SourceText,
    module::Token,
    visualizer::{
        debuginfo::{DebugDocument, SequencePoint},
        SequencePointDetail,
    },
};

/// What is shown next to one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// The point is hidden
    pub hidden: bool,
    /// Source text covered by the point, resolved against the compilation's sources
    pub snippet: String,
}

impl Marker {
    /// The one-character marker of basic mode
    #[must_use]
    pub fn symbol(&self) -> char {
        if self.hidden {
            '~'
        } else {
            '-'
        }
    }

    /// The comment line of enhanced mode, without indentation
    #[must_use]
    pub fn comment(&self) -> String {
        if self.hidden {
            "// sequence point: <hidden>".to_string()
        } else {
            format!("// sequence point: {}", self.snippet)
        }
    }
}

/// Sequence point markers of one method, keyed by IL offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencePointMarkers {
    markers: BTreeMap<u32, Marker>,
}

impl SequencePointMarkers {
    /// Resolve the points of `token`'s method in `document` against `sources`.
    ///
    /// Returns `None` if the document has no entry for the method.
    #[must_use]
    pub fn for_method(
        document: &DebugDocument,
        token: Token,
        sources: &[SourceText],
    ) -> Option<Self> {
        let points = document.method(token)?;
        let markers = points
            .iter()
            .map(|point| {
                let path = point.document.and_then(|id| document.file_name(id));
                let text = path.and_then(|path| {
                    sources
                        .iter()
                        .find(|source| source.path.as_deref() == Some(path))
                        .map(|source| source.text.as_str())
                });
                (
                    point.il_offset,
                    Marker {
                        hidden: point.is_hidden,
                        snippet: snippet(point, text),
                    },
                )
            })
            .collect();
        Some(Self { markers })
    }

    /// The marker at `il_offset`
    #[must_use]
    pub fn at(&self, il_offset: u32) -> Option<&Marker> {
        self.markers.get(&il_offset)
    }

    /// Number of markers
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// True if there are no markers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Insert markers into an external listing.
///
/// Every line whose first token is an `IL_xxxx:` label gets the marker of that offset. Basic
/// markers take the last two columns of the line's indentation. Enhanced markers are
/// inserted as a comment line with the same indentation.
#[must_use]
pub fn annotate_listing(
    listing: &str,
    markers: &SequencePointMarkers,
    detail: SequencePointDetail,
) -> String {
    let mut output = String::with_capacity(listing.len());
    for line in listing.lines() {
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];

        match label_offset(trimmed).and_then(|offset| markers.at(offset)) {
            Some(marker) if detail == SequencePointDetail::Basic => {
                let keep = indent.len().saturating_sub(2);
                output.push_str(&indent[..keep]);
                output.push_str(&format!("{:>2}", marker.symbol()));
                output.push_str(trimmed);
            }
            Some(marker) if detail == SequencePointDetail::Enhanced => {
                output.push_str(indent);
                output.push_str(&marker.comment());
                output.push('\n');
                output.push_str(line);
            }
            _ => output.push_str(line),
        }
        output.push('\n');
    }
    output
}

fn label_offset(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("IL_")?;
    let (hex, _) = rest.split_once(':')?;
    if hex.len() < 4 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Source text covered by `point`.
///
/// Lines and columns are 1-based and the end column is exclusive. A span over several lines
/// is collapsed onto one, each line trimmed and joined with a single space. Without the
/// source text the span is rendered as `(line,col)-(line,col)`.
fn snippet(point: &SequencePoint, text: Option<&str>) -> String {
    let span = || {
        format!(
            "({},{})-({},{})",
            point.start_line, point.start_col, point.end_line, point.end_col
        )
    };
    if point.is_hidden {
        return String::new();
    }
    let Some(text) = text else {
        return span();
    };

    let first = point.start_line as usize;
    let last = point.end_line as usize;
    if first == 0 || last < first {
        return span();
    }

    let lines: Vec<&str> = text.lines().skip(first - 1).take(last - first + 1).collect();
    if lines.len() != last - first + 1 {
        return span();
    }

    let mut parts = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let chars: Vec<char> = line.chars().collect();
        let start = if index == 0 {
            usize::from(point.start_col).saturating_sub(1)
        } else {
            0
        };
        let end = if index == lines.len() - 1 {
            usize::from(point.end_col).saturating_sub(1).min(chars.len())
        } else {
            chars.len()
        };
        if start <= end {
            parts.push(chars[start..end].iter().collect::<String>().trim().to_string());
        }
    }

    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

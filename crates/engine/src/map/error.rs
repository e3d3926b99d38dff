use std::fmt;
use std::str::FromStr;

use roxmltree::{Document, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    MissingAttribute,
    InvalidValue,
    UnsupportedEncoding,
    TileCountMismatch,
    InvalidAssetKey,
    TilesetOverlap,
}

#[derive(Debug, Clone)]
pub struct MapParseError {
    pub code: MapErrorCode,
    pub message: String,
    pub file: String,
    pub location: Option<SourceLocation>,
}

impl MapParseError {
    pub(crate) fn without_location(code: MapErrorCode, message: String, file: &str) -> Self {
        Self {
            code,
            message,
            file: file.to_string(),
            location: None,
        }
    }
}

impl fmt::Display for MapParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code, self.message, self.file, loc.line, loc.column
            ),
            None => write!(f, "{:?}: {} (file={})", self.code, self.message, self.file),
        }
    }
}

impl std::error::Error for MapParseError {}

/// Attribute access for one parsed XML document, producing located errors.
pub(crate) struct XmlContext<'a, 'input> {
    pub(crate) file: &'a str,
    pub(crate) doc: &'a Document<'input>,
}

impl<'a, 'input> XmlContext<'a, 'input> {
    pub(crate) fn parse(file: &'a str, raw: &'input str) -> Result<Document<'input>, MapParseError> {
        Document::parse(raw).map_err(|error| MapParseError {
            code: MapErrorCode::XmlMalformed,
            message: format!("malformed XML: {error}"),
            file: file.to_string(),
            location: Some(SourceLocation {
                line: error.pos().row as usize,
                column: error.pos().col as usize,
            }),
        })
    }

    pub(crate) fn error_at(
        &self,
        code: MapErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> MapParseError {
        let pos = self.doc.text_pos_at(node.range().start);
        MapParseError {
            code,
            message,
            file: self.file.to_string(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    pub(crate) fn required<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<T, MapParseError> {
        match self.optional(node, name)? {
            Some(value) => Ok(value),
            None => Err(self.error_at(
                MapErrorCode::MissingAttribute,
                format!("<{}> is missing attribute '{}'", node.tag_name().name(), name),
                node,
            )),
        }
    }

    pub(crate) fn optional<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<Option<T>, MapParseError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        raw.trim().parse::<T>().map(Some).map_err(|_| {
            self.error_at(
                MapErrorCode::InvalidValue,
                format!(
                    "attribute '{}' on <{}> has invalid value '{}'",
                    name,
                    node.tag_name().name(),
                    raw
                ),
                node,
            )
        })
    }
}

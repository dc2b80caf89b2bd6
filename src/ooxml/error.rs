/// Error types for template rendering.
use crate::ooxml::opc::error::OpcError;
use thiserror::Error;

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Error types for rendering operations.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// The template is not a readable ZIP container
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// A renderable part is not well-formed XML
    #[error("Malformed XML in {part}: {message}")]
    MalformedXml { part: String, message: String },

    /// A declared repeating key matched no placeholder in any part
    #[error("No placeholder answers to repeating key '{0}'")]
    MissingAnchor(String),

    /// A structural unit cannot be repeated or removed
    #[error("Structural integrity violated in {part}: {message}")]
    StructuralIntegrity { part: String, message: String },

    /// An image payload could not be embedded
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Render options could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Package-level error
    #[error("OPC error: {0}")]
    Opc(OpcError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<OpcError> for OoxmlError {
    fn from(err: OpcError) -> Self {
        match err {
            OpcError::MalformedArchive(message) => OoxmlError::MalformedArchive(message),
            OpcError::IoError(e) => OoxmlError::Io(e),
            other => OoxmlError::Opc(other),
        }
    }
}

impl OoxmlError {
    /// Build a [`OoxmlError::MalformedXml`] for a part.
    pub(crate) fn malformed_xml(part: &str, err: impl std::fmt::Display) -> Self {
        OoxmlError::MalformedXml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opc_errors_are_layered() {
        let err: OoxmlError = OpcError::MalformedArchive("bad header".to_string()).into();
        assert!(matches!(err, OoxmlError::MalformedArchive(ref m) if m == "bad header"));

        let err: OoxmlError = OpcError::PartNotFound("word/x.xml".to_string()).into();
        assert!(matches!(err, OoxmlError::Opc(OpcError::PartNotFound(_))));
    }

    #[test]
    fn test_messages() {
        let err = OoxmlError::malformed_xml("word/document.xml", "unclosed element <w:p>");
        assert_eq!(
            err.to_string(),
            "Malformed XML in word/document.xml: unclosed element <w:p>"
        );
        assert_eq!(
            OoxmlError::MissingAnchor("h.version".to_string()).to_string(),
            "No placeholder answers to repeating key 'h.version'"
        );
    }
}

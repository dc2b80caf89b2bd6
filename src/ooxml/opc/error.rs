/// Error types for OPC package operations
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    /// The input is not a readable ZIP container
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Part already exists: {0}")]
    DuplicatePart(String),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    ZipError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::XmlError(err.to_string())
    }
}

impl From<crate::ooxml::xml::XmlError> for OpcError {
    fn from(err: crate::ooxml::xml::XmlError) -> Self {
        OpcError::XmlError(err.to_string())
    }
}

impl From<zip::result::ZipError> for OpcError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => OpcError::IoError(e),
            other => OpcError::ZipError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;

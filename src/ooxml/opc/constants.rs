/// Constant values related to the Open Packaging Convention.
///
/// This module contains the content types, namespaces, relationship types and
/// part-name conventions the renderer relies on.

/// Content type URIs (like MIME-types) that specify a part's format
pub mod content_type {
    // Image content types
    pub const BMP: &str = "image/bmp";
    pub const GIF: &str = "image/gif";
    pub const JPEG: &str = "image/jpeg";
    pub const PNG: &str = "image/png";
    pub const TIFF: &str = "image/tiff";
    pub const X_EMF: &str = "image/x-emf";
    pub const X_WMF: &str = "image/x-wmf";

}

/// XML namespace URIs used in OPC packages
pub mod namespace {
    /// DrawingML main namespace
    pub const DML_MAIN: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

    /// DrawingML picture namespace
    pub const DML_PICTURE: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

    /// DrawingML wordprocessing drawing namespace
    pub const DML_WORDPROCESSING_DRAWING: &str =
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";

    /// Office relationships namespace
    pub const OFC_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// OPC relationships namespace
    pub const OPC_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships";

    /// OPC content types namespace
    pub const OPC_CONTENT_TYPES: &str =
        "http://schemas.openxmlformats.org/package/2006/content-types";

    /// WordprocessingML main namespace
    pub const WML_MAIN: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// The namespace permanently bound to the `xml` prefix
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

    /// The namespace of `xmlns` declarations themselves
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Open XML relationship target modes
pub mod target_mode {
    /// External relationship target mode (e.g., hyperlinks to external URLs)
    pub const EXTERNAL: &str = "External";
}

/// Relationship type URIs used in OPC packages
pub mod relationship_type {
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// Part-name prefixes of the WordprocessingML parts that carry document flow.
pub mod part_prefix {
    /// Main document body (`word/document.xml`)
    pub const MAIN_DOCUMENT: &str = "word/document";

    /// Headers (`word/header1.xml`, `word/header2.xml`, ...)
    pub const HEADER: &str = "word/header";

    /// Footers (`word/footer1.xml`, ...)
    pub const FOOTER: &str = "word/footer";

    /// Directory new media parts are stored in
    pub const MEDIA_DIR: &str = "word/media";
}

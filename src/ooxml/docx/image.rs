/// Image support for picture placeholders.
///
/// Images in DOCX are embedded as `<w:drawing>` elements inside runs; the
/// binary data lives in a separate media part bound through a relationship
/// (`a:blip/@r:embed`). This module detects the image format, works out the
/// displayed extent and builds the inline drawing markup.
use phf::phf_map;
use quick_xml::escape::escape;
use std::fmt::Write as FmtWrite;

use crate::ooxml::docx::options::Namespaces;
use crate::ooxml::docx::record::ImagePayload;
use crate::ooxml::opc::constants::content_type;

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// EMUs per pixel at 96 DPI.
pub const EMU_PER_PIXEL: i64 = EMU_PER_INCH / 96;

/// Extent used when neither the caller nor the image header provides one.
pub const DEFAULT_EXTENT_EMU: i64 = EMU_PER_INCH;

/// Content types of the media extensions the renderer writes.
static CONTENT_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "png" => content_type::PNG,
    "jpeg" => content_type::JPEG,
    "jpg" => content_type::JPEG,
    "gif" => content_type::GIF,
    "bmp" => content_type::BMP,
    "tiff" => content_type::TIFF,
    "tif" => content_type::TIFF,
    "emf" => content_type::X_EMF,
    "wmf" => content_type::X_WMF,
};

/// Look up the content type of a media extension, case-insensitively.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    CONTENT_TYPES.get(ext.to_ascii_lowercase().as_str()).copied()
}

/// Image format detection and properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Emf,
    Wmf,
}

impl ImageFormat {
    /// Detect image format from byte signature.
    pub fn detect_from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if data.starts_with(b"BM") {
            return Some(Self::Bmp);
        }
        // Little-endian and big-endian byte orders
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some(Self::Tiff);
        }
        if data.len() >= 44 && data[40..44] == [0x20, 0x45, 0x4D, 0x46] {
            return Some(Self::Emf);
        }
        // Placeable and standard metafile headers
        if data[0..4] == [0xD7, 0xCD, 0xC6, 0x9A] || data[0..4] == [0x01, 0x00, 0x09, 0x00] {
            return Some(Self::Wmf);
        }

        None
    }

    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Emf => "emf",
            Self::Wmf => "wmf",
        }
    }

    /// Get the content type registered for this format.
    pub fn content_type(&self) -> &'static str {
        content_type_for_extension(self.extension()).unwrap_or(content_type::PNG)
    }

    /// Pixel dimensions read from the image header, for formats with a fixed header.
    pub fn pixel_size(&self, data: &[u8]) -> Option<(u32, u32)> {
        let size = match self {
            Self::Png if data.len() >= 24 => Some((
                u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
                u32::from_be_bytes([data[20], data[21], data[22], data[23]]),
            )),
            Self::Gif if data.len() >= 10 => Some((
                u32::from(u16::from_le_bytes([data[6], data[7]])),
                u32::from(u16::from_le_bytes([data[8], data[9]])),
            )),
            Self::Bmp if data.len() >= 26 => Some((
                i32::from_le_bytes([data[18], data[19], data[20], data[21]]).unsigned_abs(),
                // Negative heights mark top-down bitmaps
                i32::from_le_bytes([data[22], data[23], data[24], data[25]]).unsigned_abs(),
            )),
            _ => None,
        };
        size.filter(|&(w, h)| w > 0 && h > 0)
    }
}

/// Displayed extent of an image in EMUs.
///
/// An explicit extent wins; a single explicit side keeps the header's aspect
/// ratio; otherwise the header size at 96 DPI, else one inch square.
pub fn extent_emu(image: &ImagePayload, format: ImageFormat) -> (i64, i64) {
    let pixels = format
        .pixel_size(&image.data)
        .map(|(w, h)| (i64::from(w), i64::from(h)));

    match (image.width_emu, image.height_emu, pixels) {
        (Some(cx), Some(cy), _) => (cx, cy),
        (Some(cx), None, Some((w, h))) => (cx, scale(cx, h, w)),
        (None, Some(cy), Some((w, h))) => (scale(cy, w, h), cy),
        (Some(cx), None, None) => (cx, cx),
        (None, Some(cy), None) => (cy, cy),
        (None, None, Some((w, h))) => (w * EMU_PER_PIXEL, h * EMU_PER_PIXEL),
        (None, None, None) => (DEFAULT_EXTENT_EMU, DEFAULT_EXTENT_EMU),
    }
}

/// `side * num / den`, saturating at the bounds of `i64`.
fn scale(side: i64, num: i64, den: i64) -> i64 {
    let scaled = i128::from(side) * i128::from(num) / i128::from(den);
    i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX })
}

/// Everything the drawing markup refers to.
#[derive(Debug, Clone)]
pub struct InlinePicture<'a> {
    /// Relationship id of the media part
    pub r_id: &'a str,
    /// Drawing object id, unique within the document
    pub doc_pr_id: u32,
    pub cx: i64,
    pub cy: i64,
    pub description: &'a str,
}

impl InlinePicture<'_> {
    /// Serialize to a standalone `w:drawing` fragment declaring every prefix it uses.
    pub fn to_xml(&self, ns: &Namespaces) -> String {
        let w = &ns.wordprocessing.prefix;
        let wp = &ns.drawing.prefix;
        let a = &ns.drawingml.prefix;
        let pic = &ns.picture.prefix;
        let r = &ns.relationships.prefix;
        let desc = escape(self.description);
        let name = format!("Picture {}", self.doc_pr_id);

        let mut xml = String::with_capacity(1536);
        // Writing into a String cannot fail
        let _ = write!(
            xml,
            r#"<{w}:drawing xmlns:{w}="{w_uri}" xmlns:{wp}="{wp_uri}" xmlns:{a}="{a_uri}" xmlns:{pic}="{pic_uri}" xmlns:{r}="{r_uri}"><{wp}:inline distT="0" distB="0" distL="0" distR="0"><{wp}:extent cx="{cx}" cy="{cy}"/><{wp}:effectExtent l="0" t="0" r="0" b="0"/><{wp}:docPr id="{id}" name="{name}" descr="{desc}"/><{wp}:cNvGraphicFramePr><{a}:graphicFrameLocks noChangeAspect="1"/></{wp}:cNvGraphicFramePr><{a}:graphic><{a}:graphicData uri="{pic_uri}"><{pic}:pic><{pic}:nvPicPr><{pic}:cNvPr id="0" name="{name}" descr="{desc}"/><{pic}:cNvPicPr/></{pic}:nvPicPr><{pic}:blipFill><{a}:blip {r}:embed="{r_id}"/><{a}:stretch><{a}:fillRect/></{a}:stretch></{pic}:blipFill><{pic}:spPr><{a}:xfrm><{a}:off x="0" y="0"/><{a}:ext cx="{cx}" cy="{cy}"/></{a}:xfrm><{a}:prstGeom prst="rect"><{a}:avLst/></{a}:prstGeom></{pic}:spPr></{pic}:pic></{a}:graphicData></{a}:graphic></{wp}:inline></{w}:drawing>"#,
            w_uri = escape(ns.wordprocessing.uri.as_str()),
            wp_uri = escape(ns.drawing.uri.as_str()),
            a_uri = escape(ns.drawingml.uri.as_str()),
            pic_uri = escape(ns.picture.uri.as_str()),
            r_uri = escape(ns.relationships.uri.as_str()),
            cx = self.cx,
            cy = self.cy,
            id = self.doc_pr_id,
            r_id = escape(self.r_id),
        );
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::XmlTree;

    /// A 1x1 PNG.
    pub(crate) const PIXEL_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_detect_and_content_type() {
        let format = ImageFormat::detect_from_bytes(PIXEL_PNG).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(format.content_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(content_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for_extension("svg"), None);
        assert_eq!(ImageFormat::detect_from_bytes(b"plain text here"), None);
    }

    #[test]
    fn test_extent() {
        let from_header = ImagePayload::new(PIXEL_PNG.to_vec());
        assert_eq!(extent_emu(&from_header, ImageFormat::Png), (9525, 9525));

        let explicit = ImagePayload::new(PIXEL_PNG.to_vec()).with_extent(100, 200);
        assert_eq!(extent_emu(&explicit, ImageFormat::Png), (100, 200));

        let mut one_side = ImagePayload::new(PIXEL_PNG.to_vec());
        one_side.width_emu = Some(EMU_PER_INCH);
        assert_eq!(extent_emu(&one_side, ImageFormat::Png), (EMU_PER_INCH, EMU_PER_INCH));

        let unknown = ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]);
        assert_eq!(
            extent_emu(&unknown, ImageFormat::Jpeg),
            (DEFAULT_EXTENT_EMU, DEFAULT_EXTENT_EMU)
        );
    }

    #[test]
    fn test_extent_with_huge_side_does_not_overflow() {
        let mut wide = PIXEL_PNG.to_vec();
        wide[19] = 2;

        let mut fixed_width = ImagePayload::new(wide.clone());
        fixed_width.width_emu = Some(i64::MAX);
        assert_eq!(extent_emu(&fixed_width, ImageFormat::Png), (i64::MAX, i64::MAX / 2));

        let mut saturated = ImagePayload::new(wide);
        saturated.height_emu = Some(i64::MAX);
        assert_eq!(extent_emu(&saturated, ImageFormat::Png), (i64::MAX, i64::MAX));
    }

    #[test]
    fn test_drawing_fragment_is_well_formed() {
        let ns = Namespaces::default();
        let picture = InlinePicture {
            r_id: "rId9",
            doc_pr_id: 3,
            cx: 9525,
            cy: 19050,
            description: "Site photo <north> & \"east\"",
        };
        let fragment = XmlTree::parse(picture.to_xml(&ns).as_bytes()).unwrap();
        let root = fragment.root().unwrap();
        assert!(fragment.is_element(root, ns.w(), "drawing"));

        let blip = fragment
            .descendants(root)
            .find(|&id| fragment.is_element(id, &ns.drawingml.uri, "blip"))
            .unwrap();
        assert_eq!(
            fragment.attribute(blip, Some(&ns.relationships.uri), "embed").as_deref(),
            Some("rId9")
        );

        let doc_pr = fragment
            .descendants(root)
            .find(|&id| fragment.is_element(id, &ns.drawing.uri, "docPr"))
            .unwrap();
        assert_eq!(fragment.attribute(doc_pr, None, "id").as_deref(), Some("3"));
        assert_eq!(
            fragment.attribute(doc_pr, None, "descr").as_deref(),
            Some("Site photo <north> & \"east\"")
        );
    }
}

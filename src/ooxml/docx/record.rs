//! Data supplied to a render: field records and record sequences.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Binary image to place into a picture placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Encoded image bytes (PNG, JPEG, GIF, BMP, TIFF, EMF or WMF)
    pub data: Vec<u8>,
    /// Width in EMUs; read from the image header or defaulted when absent
    #[serde(default)]
    pub width_emu: Option<i64>,
    /// Height in EMUs
    #[serde(default)]
    pub height_emu: Option<i64>,
    /// Alternative text
    #[serde(default)]
    pub description: Option<String>,
}

impl ImagePayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            width_emu: None,
            height_emu: None,
            description: None,
        }
    }

    /// Set an explicit extent in EMUs (914400 per inch).
    pub fn with_extent(mut self, width_emu: i64, height_emu: i64) -> Self {
        self.width_emu = Some(width_emu);
        self.height_emu = Some(height_emu);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Display text, inserted verbatim
    Text(String),
    /// Picture for a picture placeholder
    Image(ImagePayload),
}

impl FieldValue {
    /// The text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Image(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<ImagePayload> for FieldValue {
    fn from(value: ImagePayload) -> Self {
        FieldValue::Image(value)
    }
}

/// Mapping from placeholder key to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRecord {
    values: HashMap<String, FieldValue>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.values.insert(key.into(), value.into())
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>, const N: usize> From<[(K, V); N]> for FieldRecord {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Ordered records repeated under one key.
pub type RecordSequence = Vec<FieldRecord>;

/// Everything a render consumes besides the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateData {
    /// Scalar fields filled across the whole document
    pub fields: FieldRecord,
    /// Repeating key to its records; expanded in key order
    pub sequences: BTreeMap<String, RecordSequence>,
}

impl TemplateData {
    pub fn new(fields: FieldRecord) -> Self {
        Self {
            fields,
            sequences: BTreeMap::new(),
        }
    }

    /// Add a sequence under a repeating key.
    pub fn with_sequence(mut self, key: impl Into<String>, records: RecordSequence) -> Self {
        self.sequences.insert(key.into(), records);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_pairs() {
        let record = FieldRecord::from([("h.version", "V00"), ("h.estado", "Aprobado")]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("h.version").and_then(FieldValue::as_text), Some("V00"));
        assert!(!record.contains_key("h.fecha"));
    }

    #[test]
    fn test_yaml_data_with_text_and_images() {
        let yaml = "fields:\n  project: Loquat\n  logo:\n    data: [137, 80, 78, 71]\n    width_emu: 914400\nsequences:\n  h.version:\n    - h.version: V00\n    - h.version: V01\n";
        let data: TemplateData = serde_saphyr::from_str(yaml).unwrap();

        assert_eq!(data.fields.get("project"), Some(&FieldValue::from("Loquat")));
        match data.fields.get("logo") {
            Some(FieldValue::Image(image)) => {
                assert_eq!(image.data, [137, 80, 78, 71]);
                assert_eq!(image.width_emu, Some(914400));
                assert_eq!(image.height_emu, None);
            },
            other => panic!("expected image, got {:?}", other),
        }

        let versions = &data.sequences["h.version"];
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].get("h.version").and_then(FieldValue::as_text), Some("V01"));
    }
}

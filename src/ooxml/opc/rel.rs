/// Relationship-related objects for OPC packages.
///
/// A `.rels` part lists the relationships from one source part to its targets.
/// The renderer only appends to these lists (new image relationships); existing
/// relationships are carried through in their original order.
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a relative part reference or an external URL
    target_ref: String,

    /// Whether this is an external relationship
    is_external: bool,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(r_id: String, reltype: String, target_ref: String, is_external: bool) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            is_external,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }
}

/// Collection of relationships from a single source, in document order.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the content of a `.rels` part.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut rels = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = String::new();
                    let mut target_ref = String::new();
                    let mut is_external = false;

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = std::str::from_utf8(&attr.value)?;
                        let value = unescape(value)
                            .map_err(|e| OpcError::XmlError(e.to_string()))?
                            .into_owned();
                        match attr.key.local_name().as_ref() {
                            b"Id" => r_id = Some(value),
                            b"Type" => reltype = value,
                            b"Target" => target_ref = value,
                            b"TargetMode" => is_external = value == target_mode::EXTERNAL,
                            _ => {},
                        }
                    }

                    let r_id = r_id.ok_or_else(|| {
                        OpcError::XmlError("Relationship element without Id".to_string())
                    })?;
                    rels.push(Relationship::new(r_id, reltype, target_ref, is_external));
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(e.to_string())),
                _ => {},
            }
        }

        Ok(Self { rels })
    }

    /// Add a relationship to the collection.
    pub fn add_relationship(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        is_external: bool,
    ) -> &Relationship {
        self.rels
            .push(Relationship::new(r_id, reltype, target_ref, is_external));
        &self.rels[self.rels.len() - 1]
    }

    /// Add an internal relationship under the next free rId and return that id.
    pub fn add_internal(&mut self, reltype: &str, target_ref: &str) -> String {
        let r_id = self.next_r_id();
        self.add_relationship(
            reltype.to_string(),
            target_ref.to_string(),
            r_id.clone(),
            false,
        );
        r_id
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id() == r_id)
    }

    /// Get the next available relationship ID.
    ///
    /// Generates IDs in the format "rId1", "rId2", etc., filling in gaps
    /// if any exist. Ids that do not follow the `rIdN` pattern are never reused
    /// because they cannot collide with generated ones.
    pub fn next_r_id(&self) -> String {
        let mut used_numbers: Vec<u32> = self
            .rels
            .iter()
            .filter_map(|rel| {
                rel.r_id()
                    .strip_prefix("rId")
                    .and_then(|digits| atoi_simd::parse::<u32, false, false>(digits.as_bytes()).ok())
            })
            .collect();

        used_numbers.sort_unstable();

        let mut next_num = 1u32;
        for &num in &used_numbers {
            match num.cmp(&next_num) {
                std::cmp::Ordering::Equal => next_num += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {},
            }
        }

        let mut buf = itoa::Buffer::new();
        format!("rId{}", buf.format(next_num))
    }

    /// Get an iterator over all relationships.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Serialize relationships to the XML of a `.rels` part.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str("\r\n");
        xml.push_str(r#"<Relationships xmlns=""#);
        xml.push_str(namespace::OPC_RELATIONSHIPS);
        xml.push_str(r#"">"#);

        for rel in &self.rels {
            xml.push_str(r#"<Relationship Id=""#);
            xml.push_str(&escape(rel.r_id()));
            xml.push_str(r#"" Type=""#);
            xml.push_str(&escape(rel.reltype()));
            xml.push_str(r#"" Target=""#);
            xml.push_str(&escape(rel.target_ref()));
            xml.push('"');
            if rel.is_external() {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }
}

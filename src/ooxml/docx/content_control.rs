/// Content-control index for template parts.
///
/// Content controls (`w:sdt`) are the placeholders of a template. Each one
/// declares its key in `w:sdtPr`, either as an alias (the name shown in Word)
/// or as a tag (used to mark membership of a repeating block):
///
/// ```xml
/// <w:sdt>
///   <w:sdtPr><w:alias w:val="h.version"/><w:tag w:val="h.version"/><w:id w:val="-1204"/><w:text/></w:sdtPr>
///   <w:sdtContent><w:r><w:t>Version</w:t></w:r></w:sdtContent>
/// </w:sdt>
/// ```
///
/// The index is a snapshot: node ids stay valid across edits, but controls
/// added by cloning are only seen by a fresh scan.
use std::collections::{BTreeSet, HashSet};

use crate::ooxml::docx::options::Namespaces;
use crate::ooxml::xml::{NodeId, XmlTree};

/// The kind of content a control is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    /// Plain text (`w:text`)
    Text,
    /// Unrestricted content; the absence of a type element
    RichText,
    /// Date picker (`w:date`)
    Date,
    /// Editable list (`w:comboBox`)
    ComboBox,
    /// Fixed list (`w:dropDownList`)
    DropDownList,
    /// Picture (`w:picture`)
    Picture,
    /// Any other typed control (building blocks, groups, citations, ...)
    Other,
}

impl ControlType {
    fn from_local_name(local: &str) -> Option<Self> {
        match local {
            "text" => Some(Self::Text),
            "richText" => Some(Self::RichText),
            "date" => Some(Self::Date),
            "comboBox" => Some(Self::ComboBox),
            "dropDownList" => Some(Self::DropDownList),
            "picture" => Some(Self::Picture),
            "docPartObj" | "docPartList" | "group" | "citation" | "bibliography"
            | "equation" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::RichText => "richText",
            Self::Date => "date",
            Self::ComboBox => "comboBox",
            Self::DropDownList => "dropDownList",
            Self::Picture => "picture",
            Self::Other => "other",
        }
    }
}

/// A qualifying content control.
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// The `w:sdt` element
    node: NodeId,
    /// `w:sdtPr/w:id`, which Word writes as a signed 32-bit value
    id: Option<i64>,
    alias: Option<String>,
    tag: Option<String>,
    control_type: ControlType,
    showing_placeholder: bool,
    /// No other qualifying control nested inside
    leaf: bool,
}

impl Placeholder {
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    #[inline]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    #[inline]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    #[inline]
    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    /// Whether Word currently shows the control's placeholder text.
    #[inline]
    pub fn is_showing_placeholder(&self) -> bool {
        self.showing_placeholder
    }

    /// Whether the control wraps no other placeholder.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// The declared key: the alias, else the tag.
    pub fn key(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or_default()
    }

    /// Whether either the alias or the tag equals `key`.
    pub fn answers_to(&self, key: &str) -> bool {
        self.alias.as_deref() == Some(key) || self.tag.as_deref() == Some(key)
    }
}

/// Placeholders of a tree (or subtree) in document order.
#[derive(Debug, Clone, Default)]
pub struct ContentControlIndex {
    placeholders: Vec<Placeholder>,
}

impl ContentControlIndex {
    /// Index every placeholder of a tree.
    pub fn scan(tree: &XmlTree, ns: &Namespaces) -> Self {
        Self::scan_subtree(tree, tree.document(), ns)
    }

    /// Index the placeholders at or below `root`.
    pub fn scan_subtree(tree: &XmlTree, root: NodeId, ns: &Namespaces) -> Self {
        let w = ns.w();
        let mut placeholders: Vec<Placeholder> = tree
            .descendants(root)
            .filter(|&id| tree.is_element(id, w, "sdt"))
            .filter_map(|sdt| read_placeholder(tree, sdt, w))
            .collect();

        // A control nested in another qualifying control makes the outer one a container
        let qualifying: HashSet<NodeId> = placeholders.iter().map(|p| p.node).collect();
        let qualifying = &qualifying;
        let containers: HashSet<NodeId> = placeholders
            .iter()
            .flat_map(|p| tree.ancestors(p.node).filter(move |a| qualifying.contains(a)))
            .collect();
        for placeholder in &mut placeholders {
            placeholder.leaf = !containers.contains(&placeholder.node);
        }

        Self { placeholders }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders.iter()
    }

    /// Leaf placeholders only.
    pub fn leaves(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders.iter().filter(|p| p.leaf)
    }

    /// The first placeholder in document order answering to `key`.
    pub fn find(&self, key: &str) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.answers_to(key))
    }

    /// Declared keys of all placeholders.
    pub fn keys(&self) -> BTreeSet<&str> {
        self.placeholders.iter().map(Placeholder::key).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}

fn read_placeholder(tree: &XmlTree, sdt: NodeId, w: &str) -> Option<Placeholder> {
    let properties = tree.first_child_element(sdt, w, "sdtPr")?;

    let mut alias = None;
    let mut tag = None;
    let mut id = None;
    let mut control_type = ControlType::RichText;
    let mut showing_placeholder = false;

    for &child in tree.children(properties) {
        let Some(name) = tree.name(child) else {
            continue;
        };
        if tree.namespace_uri(child) != Some(w) {
            // w14:checkbox
            if name.local() == "checkbox" {
                control_type = ControlType::Other;
            }
            continue;
        }

        let value = || {
            tree.attribute(child, Some(w), "val")
                .map(|v| v.into_owned())
                .filter(|v| !v.is_empty())
        };
        match name.local() {
            "alias" => alias = value(),
            "tag" => tag = value(),
            "id" => {
                id = tree
                    .attribute(child, Some(w), "val")
                    .and_then(|v| atoi_simd::parse::<i64, false, false>(v.as_bytes()).ok())
            },
            "showingPlcHdr" => showing_placeholder = true,
            local => {
                if let Some(kind) = ControlType::from_local_name(local) {
                    control_type = kind;
                }
            },
        }
    }

    if alias.is_none() && tag.is_none() {
        return None;
    }

    Some(Placeholder {
        node: sdt,
        id,
        alias,
        tag,
        control_type,
        showing_placeholder,
        leaf: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_PART: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml"><w:body>
<w:sdt><w:sdtPr><w:alias w:val="project"/><w:id w:val="-1204"/><w:showingPlcHdr/><w:text/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Project</w:t></w:r></w:p></w:sdtContent></w:sdt>
<w:sdt><w:sdtPr><w:tag w:val="history"/><w:id w:val="7"/></w:sdtPr><w:sdtContent>
<w:tbl><w:tr><w:tc><w:sdt><w:sdtPr><w:alias w:val="h.version"/><w:tag w:val="h.version"/><w:id w:val="8"/><w:date/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>V</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc></w:tr></w:tbl>
</w:sdtContent></w:sdt>
<w:sdt><w:sdtPr><w:id w:val="9"/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>
<w:sdt><w:sdtPr><w:alias w:val="done"/><w14:checkbox><w14:checked w14:val="0"/></w14:checkbox></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>
</w:body></w:document>"#;

    fn index() -> (XmlTree, ContentControlIndex) {
        let tree = XmlTree::parse(TABLE_PART.as_bytes()).unwrap();
        let index = ContentControlIndex::scan(&tree, &Namespaces::default());
        (tree, index)
    }

    #[test]
    fn test_scan_in_document_order() {
        let (_, index) = index();
        let keys: Vec<&str> = index.iter().map(Placeholder::key).collect();
        // The control without alias or tag does not qualify
        assert_eq!(keys, ["project", "history", "h.version", "done"]);
    }

    #[test]
    fn test_properties() {
        let (_, index) = index();
        let project = index.find("project").unwrap();
        assert_eq!(project.id(), Some(-1204));
        assert_eq!(project.control_type(), ControlType::Text);
        assert!(project.is_showing_placeholder());

        let version = index.find("h.version").unwrap();
        assert_eq!(version.control_type(), ControlType::Date);
        assert_eq!(version.alias(), Some("h.version"));

        assert_eq!(index.find("history").unwrap().control_type(), ControlType::RichText);
        assert_eq!(index.find("done").unwrap().control_type(), ControlType::Other);
    }

    #[test]
    fn test_leaf_detection() {
        let (_, index) = index();
        assert!(!index.find("history").unwrap().is_leaf());
        let leaves: Vec<&str> = index.leaves().map(Placeholder::key).collect();
        assert_eq!(leaves, ["project", "h.version", "done"]);
    }

    #[test]
    fn test_answers_to_alias_or_tag() {
        let (tree, index) = index();
        let version = index.find("h.version").unwrap();
        assert!(version.answers_to("h.version"));
        assert!(!version.answers_to("history"));

        let history = index.find("history").unwrap().node();
        let inner = ContentControlIndex::scan_subtree(&tree, history, &Namespaces::default());
        assert_eq!(inner.len(), 2);
        assert_eq!(inner.keys().into_iter().collect::<Vec<_>>(), ["h.version", "history"]);
    }
}

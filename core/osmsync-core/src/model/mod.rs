//! In-memory OSM objects with OSM XML 0.6 serialization
//!
//! [`Node`], [`Way`] and [`Relation`] are created either from a parsed change
//! document or from SPARQL endpoint responses (dummy objects). Their only
//! consumer is the OSM→RDF converter, which reads the XML fragments emitted
//! by `to_osm_xml`.

mod node;
mod relation;
mod way;

pub use node::Node;
pub use relation::{Relation, RelationMember};
pub use way::Way;

use std::borrow::Cow;
use std::fmt;

/// OSM object identifier. Positive for valid objects; the type tag is carried
/// separately as [`OsmKind`].
pub type OsmId = i64;

/// The three OSM object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OsmKind {
    Node,
    Way,
    Relation,
}

impl OsmKind {
    /// The XML element / `member type=` name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            OsmKind::Node => "node",
            OsmKind::Way => "way",
            OsmKind::Relation => "relation",
        }
    }

    /// Parse an XML element or `member type=` name
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "node" => Some(OsmKind::Node),
            "way" => Some(OsmKind::Way),
            "relation" => Some(OsmKind::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for OsmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape a string for use inside a double-quoted XML attribute value.
pub(crate) fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Render the optional ` timestamp="…Z"` attribute. Timestamps are stored
/// without the trailing `Z`; it is appended here.
pub(crate) fn timestamp_attr(timestamp: &Option<String>) -> String {
    match timestamp {
        Some(ts) => format!(" timestamp=\"{}Z\"", escape_attr(ts)),
        None => String::new(),
    }
}

/// Render `<tag k="…" v="…"/>` children.
pub(crate) fn tags_xml(tags: &[(String, String)]) -> String {
    let mut xml = String::new();
    for (key, value) in tags {
        xml.push_str("<tag k=\"");
        xml.push_str(&escape_attr(key));
        xml.push_str("\" v=\"");
        xml.push_str(&escape_attr(value));
        xml.push_str("\"/>");
    }
    xml
}

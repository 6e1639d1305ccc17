//! OSM relation value type

use crate::model::{escape_attr, tags_xml, timestamp_attr, OsmId, OsmKind};

/// A single relation member: target kind, target id and role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMember {
    pub kind: OsmKind,
    pub id: OsmId,
    pub role: String,
}

impl RelationMember {
    pub fn new(kind: OsmKind, id: OsmId, role: &str) -> Self {
        Self {
            kind,
            id,
            role: role.to_string(),
        }
    }
}

/// An OSM relation: an ordered list of members with roles, plus tags. Member
/// order and roles are significant. The `type` tag decides whether the
/// relation has a derived geometry (`type=multipolygon`).
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    id: OsmId,
    timestamp: Option<String>,
    rel_type: Option<String>,
    members: Vec<RelationMember>,
    tags: Vec<(String, String)>,
}

impl Relation {
    pub fn new(id: OsmId) -> Self {
        Self {
            id,
            timestamp: None,
            rel_type: None,
            members: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn id(&self) -> OsmId {
        self.id
    }

    /// The value of the `type` tag, if any.
    pub fn rel_type(&self) -> Option<&str> {
        self.rel_type.as_deref()
    }

    pub fn set_type(&mut self, rel_type: &str) {
        self.rel_type = Some(rel_type.to_string());
    }

    pub fn is_multipolygon(&self) -> bool {
        self.rel_type.as_deref() == Some("multipolygon")
    }

    /// Stores the timestamp without a trailing `Z`; serialization re-appends it.
    pub fn set_timestamp(&mut self, timestamp: &str) {
        self.timestamp = Some(timestamp.trim_end_matches('Z').to_string());
    }

    /// Append a member. Member order is significant.
    pub fn add_member(&mut self, member: RelationMember) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[RelationMember] {
        &self.members
    }

    /// Adding a `type` tag also records the relation type.
    pub fn add_tag(&mut self, key: &str, value: &str) {
        if key == "type" {
            self.rel_type = Some(value.to_string());
        }
        self.tags.push((key.to_string(), value.to_string()));
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// OSM XML 0.6 fragment:
    /// `<relation id="…" [timestamp="…Z"]><member type="…" ref="…" role="…"/>…<tag …/>…</relation>`
    ///
    /// A relation type set via `set_type` but absent from the tag list (dummy
    /// relations assembled from endpoint responses) is emitted as a trailing
    /// `type` tag so the converter classifies the relation correctly.
    pub fn to_osm_xml(&self) -> String {
        let mut xml = format!(
            "<relation id=\"{}\"{}>",
            self.id,
            timestamp_attr(&self.timestamp)
        );
        for member in &self.members {
            xml.push_str(&format!(
                "<member type=\"{}\" ref=\"{}\" role=\"{}\"/>",
                member.kind,
                member.id,
                escape_attr(&member.role)
            ));
        }
        xml.push_str(&tags_xml(&self.tags));
        if let Some(rel_type) = &self.rel_type {
            if !self.tags.iter().any(|(k, _)| k == "type") {
                xml.push_str(&format!(
                    "<tag k=\"type\" v=\"{}\"/>",
                    escape_attr(rel_type)
                ));
            }
        }
        xml.push_str("</relation>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_xml() {
        let mut rel = Relation::new(1);
        rel.add_member(RelationMember::new(OsmKind::Node, 1, "admin_centre"));
        rel.add_member(RelationMember::new(OsmKind::Way, 1, "outer"));
        rel.add_member(RelationMember::new(OsmKind::Relation, 1, "inner"));
        rel.set_type("boundary");
        assert_eq!(
            rel.to_osm_xml(),
            r#"<relation id="1"><member type="node" ref="1" role="admin_centre"/><member type="way" ref="1" role="outer"/><member type="relation" ref="1" role="inner"/><tag k="type" v="boundary"/></relation>"#
        );
    }

    #[test]
    fn test_type_tag_not_duplicated() {
        let mut rel = Relation::new(7);
        rel.add_member(RelationMember::new(OsmKind::Way, 99, "outer"));
        rel.add_tag("type", "multipolygon");
        assert!(rel.is_multipolygon());
        let xml = rel.to_osm_xml();
        assert_eq!(xml.matches("k=\"type\"").count(), 1);
    }

    #[test]
    fn test_member_order_preserved() {
        let mut rel = Relation::new(3);
        rel.add_member(RelationMember::new(OsmKind::Way, 20, "outer"));
        rel.add_member(RelationMember::new(OsmKind::Node, 5, ""));
        let kinds: Vec<OsmKind> = rel.members().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![OsmKind::Way, OsmKind::Node]);
    }
}

//! OSM way value type

use crate::model::{tags_xml, timestamp_attr, OsmId};

/// An OSM way: an ordered list of node references plus tags. Ways referenced
/// from the change set but not themselves changed are materialized as dummies
/// whose node references come from the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    id: OsmId,
    timestamp: Option<String>,
    members: Vec<OsmId>,
    tags: Vec<(String, String)>,
}

impl Way {
    pub fn new(id: OsmId) -> Self {
        Self {
            id,
            timestamp: None,
            members: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn id(&self) -> OsmId {
        self.id
    }

    /// Append a node reference. Reference order is significant.
    pub fn add_member(&mut self, node_id: OsmId) {
        self.members.push(node_id);
    }

    pub fn members(&self) -> &[OsmId] {
        &self.members
    }

    /// Stores the timestamp without a trailing `Z`; serialization re-appends it.
    pub fn set_timestamp(&mut self, timestamp: &str) {
        self.timestamp = Some(timestamp.trim_end_matches('Z').to_string());
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.push((key.to_string(), value.to_string()));
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// OSM XML 0.6 fragment:
    /// `<way id="…" [timestamp="…Z"]><nd ref="…"/>…<tag …/>…</way>`
    pub fn to_osm_xml(&self) -> String {
        let mut xml = format!("<way id=\"{}\"{}>", self.id, timestamp_attr(&self.timestamp));
        for node_id in &self.members {
            xml.push_str(&format!("<nd ref=\"{node_id}\"/>"));
        }
        xml.push_str(&tags_xml(&self.tags));
        xml.push_str("</way>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_way_xml() {
        let mut way = Way::new(1);
        way.add_member(1);
        way.add_member(2);
        way.add_member(3);
        assert_eq!(
            way.to_osm_xml(),
            r#"<way id="1"><nd ref="1"/><nd ref="2"/><nd ref="3"/></way>"#
        );
    }

    #[test]
    fn test_way_preserves_member_order() {
        let mut way = Way::new(5);
        for id in [9, 2, 7] {
            way.add_member(id);
        }
        assert_eq!(way.members(), &[9, 2, 7]);
    }

    #[test]
    fn test_way_with_tags_and_timestamp() {
        let mut way = Way::new(50);
        way.set_timestamp("2024-01-01T00:00:00");
        way.add_member(10);
        way.add_tag("highway", "residential");
        assert_eq!(
            way.to_osm_xml(),
            r#"<way id="50" timestamp="2024-01-01T00:00:00Z"><nd ref="10"/><tag k="highway" v="residential"/></way>"#
        );
    }
}

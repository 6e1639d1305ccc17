//! OSM node value type

use crate::error::{CoreError, CoreResult};
use crate::model::{escape_attr, tags_xml, timestamp_attr, OsmId};

/// An OSM node. A node carrying only an id and a position is a *dummy node*
/// materialized to give the converter positional input.
///
/// Latitude and longitude are kept as the lexical forms they arrived in
/// (change-file attributes or WKT coordinates) so the converter sees them
/// byte-identical to the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: OsmId,
    lat: Option<String>,
    lon: Option<String>,
    timestamp: Option<String>,
    tags: Vec<(String, String)>,
}

impl Node {
    pub fn new(id: OsmId) -> Self {
        Self {
            id,
            lat: None,
            lon: None,
            timestamp: None,
            tags: Vec::new(),
        }
    }

    /// Build a dummy node from a `POINT(lon lat)` WKT literal returned by the
    /// endpoint's `geo:asWKT` lookup.
    pub fn from_wkt_point(id: OsmId, wkt: &str) -> CoreResult<Self> {
        let start = wkt
            .find("POINT(")
            .ok_or_else(|| CoreError::InvalidWkt(wkt.to_string()))?;
        let rest = &wkt[start + "POINT(".len()..];
        let end = rest
            .find(')')
            .ok_or_else(|| CoreError::InvalidWkt(wkt.to_string()))?;
        let mut coords = rest[..end].split_whitespace();
        let (lon, lat) = match (coords.next(), coords.next(), coords.next()) {
            (Some(lon), Some(lat), None) => (lon, lat),
            _ => return Err(CoreError::InvalidWkt(wkt.to_string())),
        };

        let mut node = Node::new(id);
        node.set_position(lat, lon);
        Ok(node)
    }

    pub fn id(&self) -> OsmId {
        self.id
    }

    pub fn set_position(&mut self, lat: &str, lon: &str) {
        self.lat = Some(lat.to_string());
        self.lon = Some(lon.to_string());
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
    /// `<node id="…" [timestamp="…Z"] lat="…" lon="…"><tag …/>…</node>`,
    /// self-closing when there are no tags.
    pub fn to_osm_xml(&self) -> String {
        let mut xml = format!("<node id=\"{}\"{}", self.id, timestamp_attr(&self.timestamp));
        if let (Some(lat), Some(lon)) = (&self.lat, &self.lon) {
            xml.push_str(&format!(
                " lat=\"{}\" lon=\"{}\"",
                escape_attr(lat),
                escape_attr(lon)
            ));
        }
        if self.tags.is_empty() {
            xml.push_str("/>");
        } else {
            xml.push('>');
            xml.push_str(&tags_xml(&self.tags));
            xml.push_str("</node>");
        }
        xml
    }
}

//! Line-oriented turtle handling for converter output
//!
//! The OSM→RDF converter emits one triple per line with prefixed names
//! (`osmnode:42 geo:hasGeometry osm2rdfgeom:osm_node_42 .`). This module
//! splits those lines into [`Triple`]s and classifies subjects by the
//! namespaces the engine cares about. Identifier extraction is a prefix match
//! plus integer parse; anything else is a [`CoreError::BadIdentifier`].

use crate::error::{CoreError, CoreResult};
use crate::model::{OsmId, OsmKind};
use crate::vocab;

/// A triple of already-prefixed lexical forms. The object may be an IRI, a
/// literal, or a blank-node identifier beginning with `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }

    /// Whether the object is a blank-node identifier.
    pub fn has_blank_object(&self) -> bool {
        self.object.starts_with('_')
    }
}

/// Parse one line of converter output. Prefix declarations (`@prefix …`) and
/// blank lines yield `None`. The trailing ` .` terminator is removed from the
/// object; interior whitespace (literals) is preserved.
pub fn parse_line(line: &str) -> CoreResult<Option<Triple>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('@') {
        return Ok(None);
    }

    let (subject, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| CoreError::MalformedTriple(line.to_string()))?;
    let (predicate, object) = rest
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or_else(|| CoreError::MalformedTriple(line.to_string()))?;

    let object = object.trim();
    let object = object.strip_suffix('.').unwrap_or(object).trim_end();
    if object.is_empty() {
        return Err(CoreError::MalformedTriple(line.to_string()));
    }

    Ok(Some(Triple::new(subject, predicate, object)))
}

/// Namespace of a triple subject, as far as the update filter cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectNamespace {
    /// `osmnode:<id>`
    Node,
    /// `osmway:<id>`
    Way,
    /// `osmrel:<id>`
    Relation,
    /// `osm2rdfgeom:osm_node_<id>`
    GeomNode,
    /// `osm2rdfgeom:osm_wayarea_<id>`
    WayArea,
    /// `osm2rdfgeom:osm_relarea_<id>`
    RelArea,
    /// Anything else, including blank nodes
    Other,
}

/// Classify a prefixed subject.
pub fn namespace_of(subject: &str) -> SubjectNamespace {
    if let Some(rest) = subject.strip_prefix("osm2rdfgeom:") {
        if rest.starts_with("osm_node_") {
            return SubjectNamespace::GeomNode;
        }
        if rest.starts_with("osm_wayarea_") {
            return SubjectNamespace::WayArea;
        }
        if rest.starts_with("osm_relarea_") {
            return SubjectNamespace::RelArea;
        }
        return SubjectNamespace::Other;
    }
    if subject.starts_with("osmnode:") {
        SubjectNamespace::Node
    } else if subject.starts_with("osmway:") {
        SubjectNamespace::Way
    } else if subject.starts_with("osmrel:") {
        SubjectNamespace::Relation
    } else {
        SubjectNamespace::Other
    }
}

/// Strip `prefix` from `value` and parse the remainder as a positive OSM id.
pub fn parse_id_suffix(value: &str, prefix: &str) -> CoreResult<OsmId> {
    let suffix = value
        .strip_prefix(prefix)
        .ok_or_else(|| CoreError::BadIdentifier(value.to_string()))?;
    match suffix.parse::<OsmId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CoreError::BadIdentifier(value.to_string())),
    }
}

/// Extract the OSM id from a subject in one of the six known namespaces.
pub fn subject_id(subject: &str) -> CoreResult<OsmId> {
    let prefix = match namespace_of(subject) {
        SubjectNamespace::Node => "osmnode:",
        SubjectNamespace::Way => "osmway:",
        SubjectNamespace::Relation => "osmrel:",
        SubjectNamespace::GeomNode => vocab::GEOM_NODE_PREFIX,
        SubjectNamespace::WayArea => vocab::GEOM_WAYAREA_PREFIX,
        SubjectNamespace::RelArea => vocab::GEOM_RELAREA_PREFIX,
        SubjectNamespace::Other => {
            return Err(CoreError::BadIdentifier(subject.to_string()));
        }
    };
    parse_id_suffix(subject, prefix)
}

/// Whether `predicate` links a kept subject of kind `kind` to a sub-object
/// (reified member, geometry) whose triples must be kept as well.
pub fn links_relevant_object(predicate: &str, kind: OsmKind) -> bool {
    match predicate {
        "geo:hasGeometry" | "geo:hasCentroid" => true,
        "osmway:node" => kind == OsmKind::Way,
        "osmrel:member" => kind == OsmKind::Relation,
        _ => false,
    }
}

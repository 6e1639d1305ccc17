//! osm2rdf vocabulary: namespaces and prefix declarations
//!
//! The subjects and objects handled by the engine are already-prefixed
//! lexical forms (`osmnode:42`, `osm2rdfgeom:osm_wayarea_7`). This module is
//! the single source of truth for those prefixes and for the `PREFIX` header
//! injected into every SPARQL request.

/// OSM root namespace
pub mod osm {
    /// Prefix label used in queries and converter output
    pub const PREFIX: &str = "osm";
    /// The namespace IRI
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/";
}

/// OSM node namespace
pub mod osmnode {
    pub const PREFIX: &str = "osmnode";
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/node/";
}

/// OSM way namespace
pub mod osmway {
    pub const PREFIX: &str = "osmway";
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/way/";
}

/// OSM relation namespace
pub mod osmrel {
    pub const PREFIX: &str = "osmrel";
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/relation/";
}

/// OSM tag-key namespace (`osmkey:highway`)
pub mod osmkey {
    pub const PREFIX: &str = "osmkey";
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/wiki/Key:";
}

/// OSM object metadata namespace (`osmmeta:timestamp`)
pub mod osmmeta {
    pub const PREFIX: &str = "osmmeta";
    pub const NAMESPACE: &str = "https://www.openstreetmap.org/meta/";
}

/// osm2rdf general namespace
pub mod osm2rdf {
    pub const PREFIX: &str = "osm2rdf";
    pub const NAMESPACE: &str = "https://osm2rdf.cs.uni-freiburg.de/rdf#";
}

/// osm2rdf derived-geometry namespace (`osm2rdfgeom:osm_node_42`)
pub mod osm2rdfgeom {
    pub const PREFIX: &str = "osm2rdfgeom";
    pub const NAMESPACE: &str = "https://osm2rdf.cs.uni-freiburg.de/rdf/geom#";
}

/// osm2rdf reified-member namespace (`osm2rdfmember:pos`)
pub mod osm2rdfmember {
    pub const PREFIX: &str = "osm2rdfmember";
    pub const NAMESPACE: &str = "https://osm2rdf.cs.uni-freiburg.de/rdf/member#";
}

/// OGC GeoSPARQL namespace
pub mod geo {
    pub const PREFIX: &str = "geo";
    pub const NAMESPACE: &str = "http://www.opengis.net/ont/geosparql#";
}

/// RDF vocabulary namespace
pub mod rdf {
    pub const PREFIX: &str = "rdf";
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
}

/// Prefixed geometry subject for a node (`osm2rdfgeom:osm_node_<id>`)
pub const GEOM_NODE_PREFIX: &str = "osm2rdfgeom:osm_node_";
/// Prefixed geometry subject for a way area (`osm2rdfgeom:osm_wayarea_<id>`)
pub const GEOM_WAYAREA_PREFIX: &str = "osm2rdfgeom:osm_wayarea_";
/// Prefixed geometry subject for a relation area (`osm2rdfgeom:osm_relarea_<id>`)
pub const GEOM_RELAREA_PREFIX: &str = "osm2rdfgeom:osm_relarea_";

/// All `(prefix, namespace)` pairs known to the engine, in header order.
pub const ALL: &[(&str, &str)] = &[
    (osm::PREFIX, osm::NAMESPACE),
    (osmnode::PREFIX, osmnode::NAMESPACE),
    (osmway::PREFIX, osmway::NAMESPACE),
    (osmrel::PREFIX, osmrel::NAMESPACE),
    (osmkey::PREFIX, osmkey::NAMESPACE),
    (osmmeta::PREFIX, osmmeta::NAMESPACE),
    (osm2rdf::PREFIX, osm2rdf::NAMESPACE),
    (osm2rdfgeom::PREFIX, osm2rdfgeom::NAMESPACE),
    (osm2rdfmember::PREFIX, osm2rdfmember::NAMESPACE),
    (geo::PREFIX, geo::NAMESPACE),
    (rdf::PREFIX, rdf::NAMESPACE),
];

/// SPARQL `PREFIX` declarations for every known namespace.
pub fn prefix_declarations() -> Vec<String> {
    ALL.iter()
        .map(|(prefix, ns)| format!("PREFIX {prefix}: <{ns}>"))
        .collect()
}

/// Prefixed node IRI (`osmnode:42`)
pub fn node_iri(id: i64) -> String {
    format!("{}:{id}", osmnode::PREFIX)
}

/// Prefixed way IRI (`osmway:42`)
pub fn way_iri(id: i64) -> String {
    format!("{}:{id}", osmway::PREFIX)
}

/// Prefixed relation IRI (`osmrel:42`)
pub fn relation_iri(id: i64) -> String {
    format!("{}:{id}", osmrel::PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_iris() {
        assert_eq!(node_iri(42), "osmnode:42");
        assert_eq!(way_iri(7), "osmway:7");
        assert_eq!(relation_iri(1), "osmrel:1");
    }

    #[test]
    fn test_prefix_declarations_cover_all_namespaces() {
        let decls = prefix_declarations();
        assert_eq!(decls.len(), ALL.len());
        assert!(decls
            .iter()
            .any(|d| d == "PREFIX geo: <http://www.opengis.net/ont/geosparql#>"));
        assert!(decls
            .iter()
            .any(|d| d == "PREFIX osmnode: <https://www.openstreetmap.org/node/>"));
    }
}

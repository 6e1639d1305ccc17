//! The fixed catalogue of SPARQL query strings
//!
//! Pure string emitters. Every lookup takes a batch of ids and materializes a
//! `VALUES` clause of prefixed IRIs followed by a fixed graph pattern. Member
//! order is recovered from `osm2rdfmember:pos` values; grouping uses
//! `GROUP_CONCAT` with `;` separators.

use osmsync_core::model::OsmId;

/// Maximum number of `VALUES` terms the endpoint accepts per query.
pub const MAX_VALUES_PER_QUERY: usize = 1024;

/// Separator used in `GROUP_CONCAT` aggregates.
pub const GROUP_CONCAT_SEPARATOR: char = ';';

fn values_clause(prefix: &str, ids: &[OsmId]) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(prefix);
        out.push(':');
        out.push_str(&id.to_string());
        out.push(' ');
    }
    out
}

/// `INSERT DATA { t1 . t2 . … }` over already-formatted triple strings.
pub fn insert_data(triples: &[String]) -> String {
    let mut query = String::from("INSERT DATA { ");
    for triple in triples {
        query.push_str(triple);
        query.push_str(" . ");
    }
    query.push('}');
    query
}

/// Delete the subject star of each id plus one hop into reified members and
/// geometries.
pub fn delete_subject_star(prefix: &str, ids: &[OsmId]) -> String {
    format!(
        "DELETE {{ ?s ?p1 ?o1 . ?o1 ?p2 ?o2 . }} WHERE {{ VALUES ?s {{ {}}} \
         ?s ?p1 ?o1 . OPTIONAL {{ ?o1 ?p2 ?o2 . }} }}",
        values_clause(prefix, ids)
    )
}

/// WKT locations for a batch of node ids.
pub fn node_locations(ids: &[OsmId]) -> String {
    let mut values = String::new();
    for id in ids {
        values.push_str("osm2rdfgeom:osm_node_");
        values.push_str(&id.to_string());
        values.push(' ');
    }
    format!(
        "SELECT ?nodeGeo ?location WHERE {{ VALUES ?nodeGeo {{ {values}}} \
         ?nodeGeo geo:asWKT ?location . }}"
    )
}

/// Member node lists of a batch of ways, with positions for ordering.
pub fn ways_members(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?way \
         (GROUP_CONCAT(?nodeUri; separator=\";\") AS ?nodeUris) \
         (GROUP_CONCAT(?nodePos; separator=\";\") AS ?nodePositions) \
         WHERE {{ VALUES ?way {{ {}}} \
         ?way osmway:node ?member . \
         ?member osmway:node ?nodeUri . \
         ?member osm2rdfmember:pos ?nodePos . \
         }} GROUP BY ?way",
        values_clause("osmway", ids)
    )
}

/// Distinct node ids referenced by a batch of ways.
pub fn ways_referenced_nodes(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?node WHERE {{ VALUES ?way {{ {}}} \
         ?way osmway:node ?member . ?member osmway:node ?node . }} GROUP BY ?node",
        values_clause("osmway", ids)
    )
}

/// Type tag and member list (ids, roles, positions) of a batch of relations.
pub fn relations_with_members(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?rel ?type \
         (GROUP_CONCAT(?memberUri; separator=\";\") AS ?memberUris) \
         (GROUP_CONCAT(?memberRole; separator=\";\") AS ?memberRoles) \
         (GROUP_CONCAT(?memberPos; separator=\";\") AS ?memberPositions) \
         WHERE {{ VALUES ?rel {{ {}}} \
         ?rel osmkey:type ?type . \
         ?rel osmrel:member ?o . \
         ?o osm2rdfmember:id ?memberUri . \
         ?o osm2rdfmember:role ?memberRole . \
         ?o osm2rdfmember:pos ?memberPos . \
         }} GROUP BY ?rel ?type",
        values_clause("osmrel", ids)
    )
}

/// Distinct member ids (any kind) of a batch of relations.
pub fn relations_member_ids(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?p WHERE {{ VALUES ?rel {{ {}}} \
         ?rel osmrel:member ?o . ?o osm2rdfmember:id ?p . }} GROUP BY ?p",
        values_clause("osmrel", ids)
    )
}

/// Ways whose member list references any node of the batch.
pub fn ways_referencing_nodes(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?way WHERE {{ VALUES ?node {{ {}}} \
         ?identifier osmway:node ?node . ?way osmway:node ?identifier . }} GROUP BY ?way",
        values_clause("osmnode", ids)
    )
}

/// Relations with a member in the node batch.
pub fn relations_referencing_nodes(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?s WHERE {{ VALUES ?node {{ {}}} \
         ?s osmrel:member ?o . ?o osm2rdfmember:id ?node . }} GROUP BY ?s",
        values_clause("osmnode", ids)
    )
}

/// Relations with a member in the way batch.
pub fn relations_referencing_ways(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?s WHERE {{ VALUES ?way {{ {}}} \
         ?s osmrel:member ?o . ?o osm2rdfmember:id ?way . }} GROUP BY ?s",
        values_clause("osmway", ids)
    )
}

/// Relations with a member in the relation batch.
pub fn relations_referencing_relations(ids: &[OsmId]) -> String {
    format!(
        "SELECT ?s WHERE {{ VALUES ?rel {{ {}}} \
         ?s osmrel:member ?o . ?o osm2rdfmember:id ?rel . }} GROUP BY ?s",
        values_clause("osmrel", ids)
    )
}

/// Tag key/value pairs and timestamp of a single subject (`osmway:50`,
/// `osmrel:7`). Keys are constrained to the OSM wiki `Key:` namespace.
pub fn tags_and_timestamp(subject: &str) -> String {
    format!(
        "SELECT ?key ?value ?time WHERE {{ \
         {{ {subject} ?key ?value . \
         FILTER regex(str(?key), \"https://www.openstreetmap.org/wiki/Key:\") }} \
         UNION {{ {subject} osmmeta:timestamp ?time }} }}"
    )
}

/// Timestamp of the most recently edited node in the store.
pub fn latest_node_timestamp() -> String {
    "SELECT ?p WHERE { ?s rdf:type osm:node . ?s osmmeta:timestamp ?p . } \
     ORDER BY DESC(?p) LIMIT 1"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_data() {
        let triples = vec![
            "osmnode:10 geo:hasGeometry osm2rdfgeom:osm_node_10".to_string(),
            "osmnode:10 osmkey:amenity \"bench\"".to_string(),
        ];
        assert_eq!(
            insert_data(&triples),
            "INSERT DATA { osmnode:10 geo:hasGeometry osm2rdfgeom:osm_node_10 . \
             osmnode:10 osmkey:amenity \"bench\" . }"
        );
    }

    #[test]
    fn test_delete_subject_star() {
        let query = delete_subject_star("osmnode", &[3, 10]);
        assert_eq!(
            query,
            "DELETE { ?s ?p1 ?o1 . ?o1 ?p2 ?o2 . } WHERE { VALUES ?s { osmnode:3 osmnode:10 } \
             ?s ?p1 ?o1 . OPTIONAL { ?o1 ?p2 ?o2 . } }"
        );
    }

    #[test]
    fn test_node_locations() {
        let query = node_locations(&[42]);
        assert!(query.contains("VALUES ?nodeGeo { osm2rdfgeom:osm_node_42 }"));
        assert!(query.contains("?nodeGeo geo:asWKT ?location"));
    }

    #[test]
    fn test_ways_referencing_nodes() {
        let query = ways_referencing_nodes(&[10]);
        assert!(query.contains("VALUES ?node { osmnode:10 }"));
        assert!(query.ends_with("GROUP BY ?way"));
    }

    #[test]
    fn test_relations_with_members_groups_by_rel_and_type() {
        let query = relations_with_members(&[7]);
        assert!(query.contains("VALUES ?rel { osmrel:7 }"));
        assert!(query.contains("?rel osmkey:type ?type"));
        assert!(query.ends_with("GROUP BY ?rel ?type"));
    }

    #[test]
    fn test_tags_and_timestamp_subject_inlined() {
        let query = tags_and_timestamp("osmway:50");
        assert!(query.contains("{ osmway:50 ?key ?value ."));
        assert!(query.contains("UNION { osmway:50 osmmeta:timestamp ?time }"));
    }
}

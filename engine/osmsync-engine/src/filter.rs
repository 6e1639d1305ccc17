//! Triple filtering for converter output
//!
//! The converter re-emits triples for everything in its input, including the
//! dummy objects that only exist to give it context. This filter keeps the
//! triples semantically belonging to affected subjects: subjects in the
//! insert sets, plus the member/geometry sub-objects they link to via the
//! relevant-object predicates.

use crate::changeset::ChangeSet;
use crate::error::EngineResult;
use osmsync_core::model::{OsmId, OsmKind};
use osmsync_core::ttl::{self, SubjectNamespace, Triple};
use std::collections::BTreeSet;

/// Streaming filter with the one-subject link state of the update phase.
pub struct TripleFilter {
    nodes_to_insert: BTreeSet<OsmId>,
    ways_to_insert: BTreeSet<OsmId>,
    relations_to_insert: BTreeSet<OsmId>,
    current_link: Option<String>,
}

impl TripleFilter {
    pub fn new(changes: &ChangeSet) -> Self {
        Self {
            nodes_to_insert: changes.nodes_to_insert(),
            ways_to_insert: changes.ways_to_insert(),
            relations_to_insert: changes.relations_to_insert(),
            current_link: None,
        }
    }

    /// Decide whether to keep `triple`. Must be fed the converter output in
    /// stream order: the link state absorbs the sub-object triples that
    /// directly follow a kept subject.
    pub fn keep(&mut self, triple: &Triple) -> EngineResult<bool> {
        if self
            .current_link
            .as_deref()
            .is_some_and(|link| link == triple.subject)
        {
            // sub-object triples never move the link; a member object that
            // points at another OSM object must not absorb that object's
            // block
            return Ok(true);
        }

        let kind = match ttl::namespace_of(&triple.subject) {
            SubjectNamespace::Node | SubjectNamespace::GeomNode => OsmKind::Node,
            SubjectNamespace::Way | SubjectNamespace::WayArea => OsmKind::Way,
            SubjectNamespace::Relation | SubjectNamespace::RelArea => OsmKind::Relation,
            SubjectNamespace::Other => return Ok(false),
        };

        let id = ttl::subject_id(&triple.subject)?;
        let keep = match kind {
            OsmKind::Node => self.nodes_to_insert.contains(&id),
            OsmKind::Way => self.ways_to_insert.contains(&id),
            OsmKind::Relation => self.relations_to_insert.contains(&id),
        };

        if keep {
            if ttl::links_relevant_object(&triple.predicate, kind) {
                self.current_link = Some(triple.object.clone());
            }
        } else {
            // a dropped top-level subject ends any absorption run
            self.current_link = None;
        }
        Ok(keep)
    }
}

/// Collapse kept triples whose object is a blank node into the bracketed
/// inline form `s p [ p1 o1 ; p2 o2 ]`, consuming the consecutive triples
/// whose subject is that blank node. Returns triple strings ready for
/// `INSERT DATA`.
pub fn group_blank_objects(triples: &[Triple]) -> Vec<String> {
    let mut out = Vec::with_capacity(triples.len());
    let mut index = 0;
    while index < triples.len() {
        let triple = &triples[index];
        if triple.has_blank_object() {
            let blank = &triple.object;
            let mut inner = Vec::new();
            let mut next = index + 1;
            while next < triples.len() && triples[next].subject == *blank {
                inner.push(format!("{} {}", triples[next].predicate, triples[next].object));
                next += 1;
            }
            out.push(format!(
                "{} {} [ {} ]",
                triple.subject,
                triple.predicate,
                inner.join(" ; ")
            ));
            index = next;
        } else {
            out.push(format!(
                "{} {} {}",
                triple.subject, triple.predicate, triple.object
            ));
            index += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{ChangeAction, ChangeSet};
    use osmsync_core::model::OsmKind;

    fn triple(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(s, p, o)
    }

    fn changes_with_modified_node_10() -> ChangeSet {
        let mut cs = ChangeSet::default();
        cs.record(ChangeAction::Modify, OsmKind::Node, 10);
        cs
    }

    #[test]
    fn test_keeps_modified_node_and_its_geometry() {
        let cs = changes_with_modified_node_10();
        let mut filter = TripleFilter::new(&cs);
        assert!(filter
            .keep(&triple("osmnode:10", "geo:hasGeometry", "osm2rdfgeom:osm_node_10"))
            .unwrap());
        assert!(filter
            .keep(&triple(
                "osm2rdfgeom:osm_node_10",
                "geo:asWKT",
                "\"POINT(2.0 1.0)\"^^geo:wktLiteral"
            ))
            .unwrap());
    }

    #[test]
    fn test_drops_dummy_subjects() {
        let cs = changes_with_modified_node_10();
        let mut filter = TripleFilter::new(&cs);
        // node 11 was only materialized as a dummy
        assert!(!filter
            .keep(&triple("osmnode:11", "osmkey:amenity", "\"bench\""))
            .unwrap());
        assert!(!filter
            .keep(&triple("osm2rdfgeom:osm_node_11", "geo:asWKT", "\"POINT(0 0)\""))
            .unwrap());
    }

    #[test]
    fn test_link_absorbs_member_sub_object() {
        let mut cs = ChangeSet::default();
        cs.record(ChangeAction::Create, OsmKind::Relation, 7);
        let mut filter = TripleFilter::new(&cs);

        assert!(filter.keep(&triple("osmrel:7", "osmrel:member", "_:m0")).unwrap());
        assert!(filter
            .keep(&triple("_:m0", "osm2rdfmember:id", "osmway:99"))
            .unwrap());
        assert!(filter
            .keep(&triple("_:m0", "osm2rdfmember:role", "\"outer\""))
            .unwrap());
        // way 99 itself is a dummy and stays out
        assert!(!filter
            .keep(&triple("osmway:99", "osmkey:building", "\"yes\""))
            .unwrap());
    }

    #[test]
    fn test_sub_object_does_not_chain_links() {
        let mut cs = ChangeSet::default();
        cs.record(ChangeAction::Modify, OsmKind::Way, 50);
        let mut filter = TripleFilter::new(&cs);

        assert!(filter.keep(&triple("osmway:50", "osmway:node", "_:w0")).unwrap());
        // the member points at a node, but that node's block is not absorbed
        assert!(filter.keep(&triple("_:w0", "osmway:node", "osmnode:1")).unwrap());
        assert!(!filter
            .keep(&triple("osmnode:1", "osmkey:amenity", "\"bench\""))
            .unwrap());
    }

    #[test]
    fn test_dropped_subject_clears_link() {
        let mut cs = ChangeSet::default();
        cs.record(ChangeAction::Modify, OsmKind::Way, 50);
        let mut filter = TripleFilter::new(&cs);

        assert!(filter.keep(&triple("osmway:50", "osmway:node", "_:w0")).unwrap());
        assert!(!filter
            .keep(&triple("osmway:60", "osmway:node", "_:x0"))
            .unwrap());
        // _:x0 belongs to the dropped way 60, not to the stale link
        assert!(!filter.keep(&triple("_:x0", "osmway:node", "osmnode:2")).unwrap());
    }

    #[test]
    fn test_filter_is_idempotent_over_stream() {
        let cs = changes_with_modified_node_10();
        let stream = vec![
            triple("osmnode:10", "geo:hasGeometry", "osm2rdfgeom:osm_node_10"),
            triple("osm2rdfgeom:osm_node_10", "geo:asWKT", "\"POINT(2.0 1.0)\""),
            triple("osmnode:11", "osmkey:amenity", "\"bench\""),
        ];

        let run = |input: &[Triple]| -> Vec<Triple> {
            let mut filter = TripleFilter::new(&cs);
            input
                .iter()
                .filter(|t| filter.keep(t).unwrap())
                .cloned()
                .collect()
        };

        let once = run(&stream);
        let twice = run(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_group_blank_objects() {
        let triples = vec![
            triple("osmrel:7", "osmrel:member", "_:m0"),
            triple("_:m0", "osm2rdfmember:id", "osmway:99"),
            triple("_:m0", "osm2rdfmember:role", "\"outer\""),
            triple("osmrel:7", "osmkey:type", "\"multipolygon\""),
        ];
        let grouped = group_blank_objects(&triples);
        assert_eq!(
            grouped,
            vec![
                "osmrel:7 osmrel:member [ osm2rdfmember:id osmway:99 ; osm2rdfmember:role \"outer\" ]"
                    .to_string(),
                "osmrel:7 osmkey:type \"multipolygon\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_group_without_blank_objects_is_verbatim() {
        let triples = vec![triple("osmnode:10", "osmkey:amenity", "\"bench\"")];
        assert_eq!(
            group_blank_objects(&triples),
            vec!["osmnode:10 osmkey:amenity \"bench\"".to_string()]
        );
    }
}

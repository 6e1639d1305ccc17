//! End-to-end filtering of converter output against classified change sets

use osmsync_core::ttl::{parse_line, Triple};
use osmsync_engine::changeset::ChangeSet;
use osmsync_engine::filter::{group_blank_objects, TripleFilter};
use osmsync_engine::osc::parse_change_document;
use osmsync_engine::processor::classify;
use osmsync_engine::sparql::queries;

fn changes_for(xml: &str) -> ChangeSet {
    let entries = parse_change_document(xml).unwrap();
    let mut changes = ChangeSet::default();
    classify(&entries, &mut changes);
    changes
}

fn filtered(changes: &ChangeSet, turtle: &str) -> Vec<Triple> {
    let mut filter = TripleFilter::new(changes);
    turtle
        .lines()
        .filter_map(|line| parse_line(line).unwrap())
        .filter(|triple| filter.keep(triple).unwrap())
        .collect()
}

/// Converter output for a moved node, alongside the dummy context the
/// converter was fed (node 11 belongs to an unrelated way).
const NODE_MOVE_TURTLE: &str = "\
@prefix osmnode: <https://www.openstreetmap.org/node/> .
osmnode:10 rdf:type osm:node .
osmnode:10 geo:hasGeometry osm2rdfgeom:osm_node_10 .
osm2rdfgeom:osm_node_10 geo:asWKT \"POINT(2.0 1.0)\"^^geo:wktLiteral .
osmnode:11 rdf:type osm:node .
osm2rdfgeom:osm_node_11 geo:asWKT \"POINT(9.0 9.0)\"^^geo:wktLiteral .
";

#[test]
fn node_move_keeps_only_the_moved_node() {
    let changes = changes_for(
        r#"<osmChange><modify><node id="10" lat="1.0" lon="2.0" version="2"/></modify></osmChange>"#,
    );
    let kept = filtered(&changes, NODE_MOVE_TURTLE);

    let subjects: Vec<&str> = kept.iter().map(|t| t.subject.as_str()).collect();
    assert_eq!(
        subjects,
        vec!["osmnode:10", "osmnode:10", "osm2rdfgeom:osm_node_10"]
    );
    assert!(kept
        .iter()
        .any(|t| t.predicate == "geo:hasGeometry" && t.object == "osm2rdfgeom:osm_node_10"));
    assert!(kept
        .iter()
        .any(|t| t.object == "\"POINT(2.0 1.0)\"^^geo:wktLiteral"));
}

#[test]
fn filter_is_idempotent() {
    let changes = changes_for(
        r#"<osmChange><modify><node id="10" lat="1.0" lon="2.0"/></modify></osmChange>"#,
    );
    let once = filtered(&changes, NODE_MOVE_TURTLE);
    let again: Vec<Triple> = {
        let mut filter = TripleFilter::new(&changes);
        once.iter()
            .filter(|t| filter.keep(t).unwrap())
            .cloned()
            .collect()
    };
    assert_eq!(once, again);
}

#[test]
fn way_geometry_update_keeps_way_and_wayarea() {
    // node 10 moved; the endpoint reported way 50 as referencing it
    let mut changes = changes_for(
        r#"<osmChange><modify><node id="10" lat="1.0" lon="2.0"/></modify></osmChange>"#,
    );
    changes.mark_way_geometry_update(50);

    let turtle = "\
osmway:50 rdf:type osm:way .
osmway:50 osmway:node _:w0 .
_:w0 osmway:node osmnode:10 .
_:w0 osm2rdfmember:pos \"0\"^^xsd:integer .
osm2rdfgeom:osm_wayarea_50 geo:asWKT \"POLYGON((0 0,1 0,1 1,0 0))\"^^geo:wktLiteral .
osmway:51 rdf:type osm:way .
";
    let kept = filtered(&changes, turtle);
    let subjects: Vec<&str> = kept.iter().map(|t| t.subject.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "osmway:50",
            "osmway:50",
            "_:w0",
            "_:w0",
            "osm2rdfgeom:osm_wayarea_50"
        ]
    );
}

#[test]
fn created_relation_keeps_member_sub_objects_but_not_dummies() {
    let changes = changes_for(
        r#"<osmChange><create>
            <relation id="7">
                <member type="way" ref="99" role="outer"/>
                <tag k="type" v="multipolygon"/>
            </relation>
        </create></osmChange>"#,
    );

    let turtle = "\
osmrel:7 rdf:type osm:relation .
osmrel:7 osmrel:member _:m0 .
_:m0 osm2rdfmember:id osmway:99 .
_:m0 osm2rdfmember:role \"outer\" .
osm2rdfgeom:osm_relarea_7 geo:asWKT \"POLYGON((0 0,1 0,1 1,0 0))\"^^geo:wktLiteral .
osmway:99 rdf:type osm:way .
osm2rdfgeom:osm_wayarea_99 geo:asWKT \"POLYGON((0 0,1 0,1 1,0 0))\"^^geo:wktLiteral .
";
    let kept = filtered(&changes, turtle);
    let subjects: Vec<&str> = kept.iter().map(|t| t.subject.as_str()).collect();
    // way 99 is a dummy: its triples and its area stay out
    assert_eq!(
        subjects,
        vec![
            "osmrel:7",
            "osmrel:7",
            "_:m0",
            "_:m0",
            "osm2rdfgeom:osm_relarea_7"
        ]
    );
}

#[test]
fn grouped_inserts_stay_within_batch_limit() {
    let changes = changes_for(
        r#"<osmChange><modify><node id="10" lat="1.0" lon="2.0"/></modify></osmChange>"#,
    );
    // synthesize more kept triples than one INSERT batch holds
    let mut triples = Vec::new();
    for i in 0..(queries::MAX_VALUES_PER_QUERY + 100) {
        triples.push(Triple::new(
            "osmnode:10",
            "osmkey:note",
            &format!("\"{i}\""),
        ));
    }
    let mut filter = TripleFilter::new(&changes);
    let kept: Vec<Triple> = triples
        .into_iter()
        .filter(|t| filter.keep(t).unwrap())
        .collect();
    let grouped = group_blank_objects(&kept);

    let batches: Vec<&[String]> = grouped.chunks(queries::MAX_VALUES_PER_QUERY).collect();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.len() <= queries::MAX_VALUES_PER_QUERY));
    let query = queries::insert_data(batches[1]);
    assert!(query.starts_with("INSERT DATA {"));
    assert!(query.ends_with("}"));
}

#[test]
fn blank_node_members_collapse_into_inline_form() {
    let triples = vec![
        Triple::new("osmrel:7", "osmrel:member", "_:m0"),
        Triple::new("_:m0", "osm2rdfmember:id", "osmway:99"),
        Triple::new("_:m0", "osm2rdfmember:role", "\"outer\""),
        Triple::new("_:m0", "osm2rdfmember:pos", "\"0\"^^xsd:integer"),
    ];
    let grouped = group_blank_objects(&triples);
    assert_eq!(grouped.len(), 1);
    assert_eq!(
        grouped[0],
        "osmrel:7 osmrel:member [ osm2rdfmember:id osmway:99 ; \
         osm2rdfmember:role \"outer\" ; osm2rdfmember:pos \"0\"^^xsd:integer ]"
    );
}

//! Classification and materialization over fixture change documents

use osmsync_engine::changeset::ChangeSet;
use osmsync_engine::osc::parse_change_document;
use osmsync_engine::processor::{classify, materialize};
use osmsync_engine::scratch::ScratchDir;
use osmsync_engine::{ChangeProcessor, Config, EngineResult, OsmToRdfConverter, UpdateStats};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn classified(xml: &str) -> ChangeSet {
    let entries = parse_change_document(xml).unwrap();
    let mut changes = ChangeSet::default();
    classify(&entries, &mut changes);
    changes.assert_disjoint().unwrap();
    changes
}

#[test]
fn node_move_is_classified_as_modify() {
    // a single moved node: one modified node, nothing else
    let changes = classified(
        r#"<osmChange version="0.6">
            <modify><node id="10" lat="1.0" lon="2.0" version="2"/></modify>
        </osmChange>"#,
    );
    assert_eq!(changes.modified_nodes, BTreeSet::from([10]));
    assert!(changes.created_nodes.is_empty());
    assert!(changes.deleted_nodes.is_empty());
    assert!(changes.needs_conversion());
}

#[test]
fn delete_only_change_file() {
    let changes = classified(
        r#"<osmChange><delete><node id="3" version="4"/></delete></osmChange>"#,
    );
    assert_eq!(changes.deleted_nodes, BTreeSet::from([3]));
    assert_eq!(changes.nodes_to_delete(), BTreeSet::from([3]));
    // no subject needs re-insertion, so the converter never runs
    assert!(!changes.needs_conversion());
}

#[test]
fn sets_are_pairwise_disjoint_per_kind() {
    let changes = classified(
        r#"<osmChange>
            <create><node id="1" lat="0" lon="0"/><way id="4"><nd ref="1"/></way></create>
            <modify><node id="2" lat="0" lon="0"/></modify>
            <delete><node id="3"/><way id="5"/><relation id="6"/></delete>
        </osmChange>"#,
    );
    for (left, right) in [
        (&changes.created_nodes, &changes.modified_nodes),
        (&changes.created_nodes, &changes.deleted_nodes),
        (&changes.modified_nodes, &changes.deleted_nodes),
        (&changes.created_ways, &changes.deleted_ways),
    ] {
        assert_eq!(left.intersection(right).count(), 0);
    }
}

#[test]
fn modified_multipolygon_is_recorded_as_area() {
    let changes = classified(
        r#"<osmChange><modify>
            <relation id="8">
                <member type="way" ref="99" role="outer"/>
                <tag k="type" v="multipolygon"/>
            </relation>
            <relation id="9">
                <member type="node" ref="5" role=""/>
                <tag k="type" v="route"/>
            </relation>
        </modify></osmChange>"#,
    );
    assert_eq!(changes.modified_areas, BTreeSet::from([8]));
    assert_eq!(
        changes.modified_relations,
        BTreeSet::from([8, 9]),
        "both relations are still modified"
    );
}

#[test]
fn new_relation_references_existing_way() {
    // a created relation pointing at way 99, which is not in the change file
    let entries = parse_change_document(
        r#"<osmChange><create>
            <relation id="7">
                <member type="way" ref="99" role="outer"/>
                <tag k="type" v="multipolygon"/>
            </relation>
        </create></osmChange>"#,
    )
    .unwrap();
    let mut changes = ChangeSet::default();
    classify(&entries, &mut changes);
    let mut scratch = ScratchDir::create(None).unwrap();
    materialize(&entries, &mut changes, &mut scratch).unwrap();

    assert_eq!(changes.created_relations, BTreeSet::from([7]));
    assert_eq!(changes.referenced_ways, BTreeSet::from([99]));
    changes.assert_disjoint().unwrap();

    scratch.finalize_osm_documents().unwrap();
    let relations = std::fs::read_to_string(scratch.relations_path()).unwrap();
    assert!(relations.contains(r#"<relation id="7">"#));
    assert!(relations.contains(r#"<member type="way" ref="99" role="outer"/>"#));
}

#[test]
fn way_references_skip_change_file_nodes() {
    let entries = parse_change_document(
        r#"<osmChange>
            <create><node id="1" lat="0" lon="0"/></create>
            <modify><way id="50"><nd ref="1"/><nd ref="2"/><nd ref="3"/></way></modify>
        </osmChange>"#,
    )
    .unwrap();
    let mut changes = ChangeSet::default();
    classify(&entries, &mut changes);
    let mut scratch = ScratchDir::create(None).unwrap();
    materialize(&entries, &mut changes, &mut scratch).unwrap();

    // node 1 travels with the change file; only 2 and 3 need dummies
    assert_eq!(changes.referenced_nodes, BTreeSet::from([2, 3]));
    changes.assert_disjoint().unwrap();
}

#[test]
fn deletes_contribute_no_xml() {
    let entries = parse_change_document(
        r#"<osmChange><delete><way id="5"><nd ref="1"/></way></delete></osmChange>"#,
    )
    .unwrap();
    let mut changes = ChangeSet::default();
    classify(&entries, &mut changes);
    let mut scratch = ScratchDir::create(None).unwrap();
    materialize(&entries, &mut changes, &mut scratch).unwrap();
    scratch.finalize_osm_documents().unwrap();

    let ways = std::fs::read_to_string(scratch.ways_path()).unwrap();
    assert_eq!(ways, "<osm version=\"0.6\">\n</osm>\n");
    assert!(changes.referenced_nodes.is_empty());
}

#[test]
fn empty_change_file_means_no_work() {
    let changes = classified(r#"<osmChange version="0.6"></osmChange>"#);
    assert!(changes.is_empty());
    assert!(!changes.needs_conversion());
    assert!(changes.nodes_to_delete().is_empty());
}

struct NeverConverter;

impl OsmToRdfConverter for NeverConverter {
    fn convert(&self, _scratch: &ScratchDir) -> EngineResult<PathBuf> {
        unreachable!("converter must not run for an empty change file")
    }
}

#[tokio::test]
async fn empty_change_file_issues_no_updates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.osc");
    std::fs::write(&path, r#"<osmChange version="0.6"></osmChange>"#).unwrap();

    // no SPARQL request, no conversion, no cache clear
    let config = Config::default();
    let mut processor = ChangeProcessor::new(&config, NeverConverter).unwrap();
    let stats = processor.apply_change_file(&path).await.unwrap();
    assert_eq!(stats, UpdateStats::default());
}

//! The change application engine
//!
//! Applies one OSM change document to the SPARQL endpoint in seven strictly
//! sequential phases: classify, materialize changed objects, compute the
//! geometry-update closure, expand the reference closure, create dummy
//! objects, convert, and emit batched DELETE/INSERT updates. The endpoint
//! cache is cleared strictly after the last update of a successful run.

use crate::changeset::{delete_batch_size, ChangeAction, ChangeSet};
use crate::config::Config;
use crate::convert::{self, OsmToRdfConverter};
use crate::error::EngineResult;
use crate::fetch::{batches, DataFetcher};
use crate::filter::{group_blank_objects, TripleFilter};
use crate::osc::{self, ChangeEntry, Element};
use crate::scratch::ScratchDir;
use crate::sparql::queries::{self, MAX_VALUES_PER_QUERY};
use crate::sparql::SparqlClient;
use osmsync_core::model::{OsmId, OsmKind};
use osmsync_core::ttl::{self, Triple};
use osmsync_core::vocab;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error, info};

/// What a run did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    pub delete_queries: usize,
    pub insert_queries: usize,
    pub triples_kept: usize,
}

/// The engine. Owns one fetch client, one update client and the converter
/// seam; everything else is per-run state.
pub struct ChangeProcessor<C> {
    config: Config,
    fetcher: DataFetcher,
    updater: SparqlClient,
    converter: C,
}

impl<C: OsmToRdfConverter> ChangeProcessor<C> {
    pub fn new(config: &Config, converter: C) -> EngineResult<Self> {
        Ok(Self {
            config: config.clone(),
            fetcher: DataFetcher::new(config)?,
            updater: SparqlClient::new(config)?,
            converter,
        })
    }

    /// Apply one change file. On success the scratch directory is released;
    /// on any fatal error it is kept on disk for post-mortem.
    pub async fn apply_change_file(&mut self, path: &Path) -> EngineResult<UpdateStats> {
        info!(file = %path.display(), "applying change file");
        let entries = osc::parse_change_file(path)?;
        let mut scratch = ScratchDir::create(self.config.build_dir.as_deref())?;

        match self.run_phases(&entries, &mut scratch).await {
            Ok(stats) => {
                info!(
                    deletes = stats.delete_queries,
                    inserts = stats.insert_queries,
                    triples = stats.triples_kept,
                    "change file applied"
                );
                Ok(stats)
            }
            Err(e) => {
                let kept = scratch.persist();
                error!(scratch = %kept.display(), "run aborted, scratch files kept");
                Err(e)
            }
        }
    }

    async fn run_phases(
        &mut self,
        entries: &[ChangeEntry],
        scratch: &mut ScratchDir,
    ) -> EngineResult<UpdateStats> {
        // phase 1: classify
        let mut changes = ChangeSet::default();
        classify(entries, &mut changes);
        changes.assert_disjoint()?;
        if changes.is_empty() {
            info!("change file contains no elements, nothing to do");
            return Ok(UpdateStats::default());
        }

        // phase 2: materialize changed objects
        materialize(entries, &mut changes, scratch)?;

        // phase 3: geometry-update closure
        self.compute_geometry_closure(&mut changes).await?;

        // phase 4: reference closure
        self.expand_references(&mut changes).await?;
        changes.assert_disjoint()?;

        // phase 5: dummy objects
        self.create_dummies(&changes, scratch).await?;

        // phase 6: convert
        let triples_path = if changes.needs_conversion() {
            scratch.finalize_osm_documents()?;
            let output = self.converter.convert(scratch)?;
            convert::decompress_turtle(&output, &scratch.triples_path())?;
            Some(scratch.triples_path())
        } else {
            debug!("no subjects to insert, skipping conversion");
            None
        };

        // phase 7: emit updates, deletes first
        let mut stats = UpdateStats::default();
        stats.delete_queries = self.emit_deletes(&changes).await?;
        if let Some(path) = triples_path {
            let (insert_queries, triples_kept) = self.emit_inserts(&changes, &path).await?;
            stats.insert_queries = insert_queries;
            stats.triples_kept = triples_kept;
        }

        if stats.delete_queries + stats.insert_queries > 0 {
            self.updater.clear_cache().await?;
        }
        Ok(stats)
    }

    /// Phase 3. Unchanged ways referencing a modified node, and unchanged
    /// relations referencing a modified node or a changed way, need their
    /// geometry triples recomputed. Modified multipolygons do not cascade to
    /// referencing relations: the converter derives no geometry from
    /// relation-of-relation membership.
    async fn compute_geometry_closure(&mut self, changes: &mut ChangeSet) -> EngineResult<()> {
        if !changes.modified_nodes.is_empty() {
            let ways = self
                .fetcher
                .ways_referencing_nodes(&changes.modified_nodes)
                .await?;
            for id in ways {
                changes.mark_way_geometry_update(id);
            }
            let relations = self
                .fetcher
                .relations_referencing_nodes(&changes.modified_nodes)
                .await?;
            for id in relations {
                changes.mark_relation_geometry_update(id);
            }
        }

        let changed_ways: BTreeSet<OsmId> = changes
            .modified_ways
            .union(&changes.ways_to_update_geometry)
            .copied()
            .collect();
        if !changed_ways.is_empty() {
            let relations = self.fetcher.relations_referencing_ways(&changed_ways).await?;
            for id in relations {
                changes.mark_relation_geometry_update(id);
            }
        }

        debug!(
            ways = changes.ways_to_update_geometry.len(),
            relations = changes.relations_to_update_geometry.len(),
            "geometry-update closure computed"
        );
        Ok(())
    }

    /// Phase 4. Everything the dummies will reference must itself exist in
    /// the converter input: member nodes and ways of affected relations,
    /// then member nodes of affected ways.
    async fn expand_references(&mut self, changes: &mut ChangeSet) -> EngineResult<()> {
        let relations: BTreeSet<OsmId> = changes
            .referenced_relations
            .union(&changes.relations_to_update_geometry)
            .copied()
            .collect();
        if !relations.is_empty() {
            let (member_nodes, member_ways, _member_relations) =
                self.fetcher.relations_member_ids(&relations).await?;
            for id in member_nodes {
                changes.add_referenced(OsmKind::Node, id);
            }
            for id in member_ways {
                changes.add_referenced(OsmKind::Way, id);
            }
        }

        let ways: BTreeSet<OsmId> = changes
            .referenced_ways
            .union(&changes.ways_to_update_geometry)
            .copied()
            .collect();
        if !ways.is_empty() {
            let member_nodes = self.fetcher.ways_referenced_nodes(&ways).await?;
            for id in member_nodes {
                changes.add_referenced(OsmKind::Node, id);
            }
        }

        debug!(
            nodes = changes.referenced_nodes.len(),
            ways = changes.referenced_ways.len(),
            relations = changes.referenced_relations.len(),
            "reference closure expanded"
        );
        Ok(())
    }

    /// Phase 5. Fetch dummy copies of referenced-but-unchanged objects from
    /// the endpoint. Geometry-update ways and relations additionally get
    /// their tags and timestamp so the converter regenerates their area
    /// triples identically to the bulk load.
    async fn create_dummies(
        &mut self,
        changes: &ChangeSet,
        scratch: &mut ScratchDir,
    ) -> EngineResult<()> {
        if !changes.referenced_nodes.is_empty() {
            for node in self.fetcher.node_locations(&changes.referenced_nodes).await? {
                scratch.append_node_xml(&node.to_osm_xml())?;
            }
        }

        let way_ids: BTreeSet<OsmId> = changes
            .referenced_ways
            .union(&changes.ways_to_update_geometry)
            .copied()
            .collect();
        if !way_ids.is_empty() {
            for mut way in self.fetcher.ways_members(&way_ids).await? {
                if changes.ways_to_update_geometry.contains(&way.id()) {
                    let (tags, timestamp) = self
                        .fetcher
                        .tags_and_timestamp(&vocab::way_iri(way.id()))
                        .await?;
                    for (key, value) in tags {
                        way.add_tag(&key, &value);
                    }
                    if let Some(ts) = timestamp {
                        way.set_timestamp(&ts);
                    }
                } else {
                    // untagged ways are invisible to the converter
                    way.add_tag("type", "tmp");
                }
                scratch.append_way_xml(&way.to_osm_xml())?;
            }
        }

        let relation_ids: BTreeSet<OsmId> = changes
            .referenced_relations
            .union(&changes.relations_to_update_geometry)
            .copied()
            .collect();
        if !relation_ids.is_empty() {
            for mut relation in self.fetcher.relations_with_members(&relation_ids).await? {
                if changes.relations_to_update_geometry.contains(&relation.id()) {
                    let (tags, timestamp) = self
                        .fetcher
                        .tags_and_timestamp(&vocab::relation_iri(relation.id()))
                        .await?;
                    for (key, value) in tags {
                        relation.add_tag(&key, &value);
                    }
                    if let Some(ts) = timestamp {
                        relation.set_timestamp(&ts);
                    }
                }
                scratch.append_relation_xml(&relation.to_osm_xml())?;
            }
        }
        Ok(())
    }

    /// Phase 7a. Star-plus-one-hop deletes over deleted ∪ modified
    /// (∪ geometry-update) ids, nodes before ways before relations.
    async fn emit_deletes(&mut self, changes: &ChangeSet) -> EngineResult<usize> {
        let per_kind: [(OsmKind, &str, BTreeSet<OsmId>); 3] = [
            (OsmKind::Node, vocab::osmnode::PREFIX, changes.nodes_to_delete()),
            (OsmKind::Way, vocab::osmway::PREFIX, changes.ways_to_delete()),
            (
                OsmKind::Relation,
                vocab::osmrel::PREFIX,
                changes.relations_to_delete(),
            ),
        ];

        let mut issued = 0;
        for (kind, prefix, ids) in per_kind {
            for batch in batches(&ids, delete_batch_size(kind)) {
                debug!(kind = %kind, ids = batch.len(), "deleting subjects");
                self.updater.set_default_prefixes();
                self.updater
                    .set_query(&queries::delete_subject_star(prefix, &batch));
                self.updater.run_update().await?;
                issued += 1;
            }
        }
        Ok(issued)
    }

    /// Phases 7b–7d. Stream the converter output through the filter, group
    /// blank-node sub-objects, and flush `INSERT DATA` batches.
    async fn emit_inserts(
        &mut self,
        changes: &ChangeSet,
        triples_path: &Path,
    ) -> EngineResult<(usize, usize)> {
        let mut filter = TripleFilter::new(changes);
        let mut kept: Vec<Triple> = Vec::new();
        for line in BufReader::new(File::open(triples_path)?).lines() {
            let line = line?;
            if let Some(triple) = ttl::parse_line(&line)? {
                if filter.keep(&triple)? {
                    kept.push(triple);
                }
            }
        }

        let grouped = group_blank_objects(&kept);
        let mut issued = 0;
        for chunk in grouped.chunks(MAX_VALUES_PER_QUERY) {
            debug!(triples = chunk.len(), "inserting triples");
            self.updater.set_default_prefixes();
            self.updater.set_query(&queries::insert_data(chunk));
            self.updater.run_update().await?;
            issued += 1;
        }
        Ok((issued, kept.len()))
    }

    /// Timestamp of the newest node in the store, used by the sync driver to
    /// pick the first replication sequence to apply.
    pub async fn latest_node_timestamp(&mut self) -> EngineResult<String> {
        self.fetcher.latest_node_timestamp().await
    }
}

/// Phase 1. Record every element id in its created/modified/deleted set and
/// detect modified multipolygons.
pub fn classify(entries: &[ChangeEntry], changes: &mut ChangeSet) {
    for entry in entries {
        changes.record(entry.action, entry.element.kind(), entry.element.id());
        if entry.action == ChangeAction::Modify {
            if let Element::Relation(relation) = &entry.element {
                if relation.is_multipolygon() {
                    changes.modified_areas.insert(relation.id());
                }
            }
        }
    }
}

/// Phase 2. Serialize created and modified elements into the scratch
/// documents and collect their references to unchanged objects. Deletes
/// contribute no XML.
pub fn materialize(
    entries: &[ChangeEntry],
    changes: &mut ChangeSet,
    scratch: &mut ScratchDir,
) -> EngineResult<()> {
    for entry in entries {
        if entry.action == ChangeAction::Delete {
            continue;
        }
        match &entry.element {
            Element::Node(node) => scratch.append_node_xml(&node.to_osm_xml())?,
            Element::Way(way) => {
                for &node_id in way.members() {
                    changes.add_referenced(OsmKind::Node, node_id);
                }
                scratch.append_way_xml(&way.to_osm_xml())?;
            }
            Element::Relation(relation) => {
                for member in relation.members() {
                    changes.add_referenced(member.kind, member.id);
                }
                scratch.append_relation_xml(&relation.to_osm_xml())?;
            }
        }
    }
    Ok(())
}

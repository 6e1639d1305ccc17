//! Change-set bookkeeping
//!
//! Partition of the change file's ids into disjoint created/modified/deleted
//! sets per kind, plus the derived geometry-update and referenced sets built
//! by the closure phases. The sets stay pairwise disjoint within a kind, and
//! a referenced id never coexists with a change-file or geometry-update entry
//! of the same kind; [`ChangeSet::assert_disjoint`] turns a violation into a
//! fatal [`EngineError::InvariantViolated`].

use crate::error::{EngineError, EngineResult};
use crate::sparql::queries::MAX_VALUES_PER_QUERY;
use osmsync_core::model::{OsmId, OsmKind};
use std::collections::BTreeSet;

/// What a change-file section does with its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Modify,
    Delete,
}

/// Delete queries match multiple subjects per id, so per-kind batches stay
/// below the endpoint's value limit: `N/2` for nodes and relations, `N/3`
/// for ways.
pub fn delete_batch_size(kind: OsmKind) -> usize {
    match kind {
        OsmKind::Node => MAX_VALUES_PER_QUERY / 2,
        OsmKind::Way => MAX_VALUES_PER_QUERY / 3,
        OsmKind::Relation => MAX_VALUES_PER_QUERY / 2,
    }
}

/// Mutable id bookkeeping for one change-file application.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub created_nodes: BTreeSet<OsmId>,
    pub modified_nodes: BTreeSet<OsmId>,
    pub deleted_nodes: BTreeSet<OsmId>,

    pub created_ways: BTreeSet<OsmId>,
    pub modified_ways: BTreeSet<OsmId>,
    pub deleted_ways: BTreeSet<OsmId>,

    pub created_relations: BTreeSet<OsmId>,
    pub modified_relations: BTreeSet<OsmId>,
    pub deleted_relations: BTreeSet<OsmId>,

    /// Unchanged ways whose geometry must be recomputed because a member
    /// node moved
    pub ways_to_update_geometry: BTreeSet<OsmId>,
    /// Unchanged relations whose geometry must be recomputed because a
    /// member node or way changed
    pub relations_to_update_geometry: BTreeSet<OsmId>,

    /// Unchanged objects referenced from the change set, materialized as
    /// dummies for the converter
    pub referenced_nodes: BTreeSet<OsmId>,
    pub referenced_ways: BTreeSet<OsmId>,
    pub referenced_relations: BTreeSet<OsmId>,

    /// Modified relations carrying `type=multipolygon`
    pub modified_areas: BTreeSet<OsmId>,
}

impl ChangeSet {
    /// Record one change-file element (phase 1).
    pub fn record(&mut self, action: ChangeAction, kind: OsmKind, id: OsmId) {
        let set = match (kind, action) {
            (OsmKind::Node, ChangeAction::Create) => &mut self.created_nodes,
            (OsmKind::Node, ChangeAction::Modify) => &mut self.modified_nodes,
            (OsmKind::Node, ChangeAction::Delete) => &mut self.deleted_nodes,
            (OsmKind::Way, ChangeAction::Create) => &mut self.created_ways,
            (OsmKind::Way, ChangeAction::Modify) => &mut self.modified_ways,
            (OsmKind::Way, ChangeAction::Delete) => &mut self.deleted_ways,
            (OsmKind::Relation, ChangeAction::Create) => &mut self.created_relations,
            (OsmKind::Relation, ChangeAction::Modify) => &mut self.modified_relations,
            (OsmKind::Relation, ChangeAction::Delete) => &mut self.deleted_relations,
        };
        set.insert(id);
    }

    /// Whether `id` appears anywhere in the change file for `kind`.
    pub fn in_change_file(&self, kind: OsmKind, id: OsmId) -> bool {
        let (created, modified, deleted) = self.change_file_sets(kind);
        created.contains(&id) || modified.contains(&id) || deleted.contains(&id)
    }

    fn change_file_sets(
        &self,
        kind: OsmKind,
    ) -> (&BTreeSet<OsmId>, &BTreeSet<OsmId>, &BTreeSet<OsmId>) {
        match kind {
            OsmKind::Node => (&self.created_nodes, &self.modified_nodes, &self.deleted_nodes),
            OsmKind::Way => (&self.created_ways, &self.modified_ways, &self.deleted_ways),
            OsmKind::Relation => (
                &self.created_relations,
                &self.modified_relations,
                &self.deleted_relations,
            ),
        }
    }

    fn geometry_update_set(&self, kind: OsmKind) -> Option<&BTreeSet<OsmId>> {
        match kind {
            OsmKind::Node => None,
            OsmKind::Way => Some(&self.ways_to_update_geometry),
            OsmKind::Relation => Some(&self.relations_to_update_geometry),
        }
    }

    /// Record a reference to an unchanged object (phases 2 and 4). Ids
    /// already covered by the change file or a geometry-update set are not
    /// dummies and are skipped.
    pub fn add_referenced(&mut self, kind: OsmKind, id: OsmId) {
        if self.in_change_file(kind, id)
            || self
                .geometry_update_set(kind)
                .is_some_and(|set| set.contains(&id))
        {
            return;
        }
        match kind {
            OsmKind::Node => self.referenced_nodes.insert(id),
            OsmKind::Way => self.referenced_ways.insert(id),
            OsmKind::Relation => self.referenced_relations.insert(id),
        };
    }

    /// Promote an unchanged way into the geometry-update set (phase 3). The
    /// id leaves the referenced set: geometry updates get the full dummy
    /// treatment including tags and timestamp.
    pub fn mark_way_geometry_update(&mut self, id: OsmId) {
        if self.in_change_file(OsmKind::Way, id) {
            return;
        }
        self.referenced_ways.remove(&id);
        self.ways_to_update_geometry.insert(id);
    }

    /// Promote an unchanged relation into the geometry-update set (phase 3).
    pub fn mark_relation_geometry_update(&mut self, id: OsmId) {
        if self.in_change_file(OsmKind::Relation, id) {
            return;
        }
        self.referenced_relations.remove(&id);
        self.relations_to_update_geometry.insert(id);
    }

    /// Subjects whose triples the filter keeps: created ∪ modified
    /// (∪ geometry-update for ways and relations).
    pub fn nodes_to_insert(&self) -> BTreeSet<OsmId> {
        union(&[&self.created_nodes, &self.modified_nodes])
    }

    pub fn ways_to_insert(&self) -> BTreeSet<OsmId> {
        union(&[
            &self.created_ways,
            &self.modified_ways,
            &self.ways_to_update_geometry,
        ])
    }

    pub fn relations_to_insert(&self) -> BTreeSet<OsmId> {
        union(&[
            &self.created_relations,
            &self.modified_relations,
            &self.relations_to_update_geometry,
        ])
    }

    /// Subjects whose old triples are deleted before insertion:
    /// deleted ∪ modified (∪ geometry-update).
    pub fn nodes_to_delete(&self) -> BTreeSet<OsmId> {
        union(&[&self.deleted_nodes, &self.modified_nodes])
    }

    pub fn ways_to_delete(&self) -> BTreeSet<OsmId> {
        union(&[
            &self.deleted_ways,
            &self.modified_ways,
            &self.ways_to_update_geometry,
        ])
    }

    pub fn relations_to_delete(&self) -> BTreeSet<OsmId> {
        union(&[
            &self.deleted_relations,
            &self.modified_relations,
            &self.relations_to_update_geometry,
        ])
    }

    /// Whether the change file contained no elements at all.
    pub fn is_empty(&self) -> bool {
        self.created_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.deleted_nodes.is_empty()
            && self.created_ways.is_empty()
            && self.modified_ways.is_empty()
            && self.deleted_ways.is_empty()
            && self.created_relations.is_empty()
            && self.modified_relations.is_empty()
            && self.deleted_relations.is_empty()
    }

    /// Whether any subject needs (re)insertion, i.e. whether the converter
    /// must run.
    pub fn needs_conversion(&self) -> bool {
        !(self.nodes_to_insert().is_empty()
            && self.ways_to_insert().is_empty()
            && self.relations_to_insert().is_empty())
    }

    /// Check all set-disjointness invariants; a violation is a bug.
    pub fn assert_disjoint(&self) -> EngineResult<()> {
        for kind in [OsmKind::Node, OsmKind::Way, OsmKind::Relation] {
            let (created, modified, deleted) = self.change_file_sets(kind);
            check_disjoint(kind, "created", created, "modified", modified)?;
            check_disjoint(kind, "created", created, "deleted", deleted)?;
            check_disjoint(kind, "modified", modified, "deleted", deleted)?;

            let referenced = match kind {
                OsmKind::Node => &self.referenced_nodes,
                OsmKind::Way => &self.referenced_ways,
                OsmKind::Relation => &self.referenced_relations,
            };
            check_disjoint(kind, "referenced", referenced, "created", created)?;
            check_disjoint(kind, "referenced", referenced, "modified", modified)?;
            check_disjoint(kind, "referenced", referenced, "deleted", deleted)?;
            if let Some(geometry) = self.geometry_update_set(kind) {
                check_disjoint(kind, "referenced", referenced, "geometry-update", geometry)?;
                check_disjoint(kind, "geometry-update", geometry, "created", created)?;
                check_disjoint(kind, "geometry-update", geometry, "modified", modified)?;
                check_disjoint(kind, "geometry-update", geometry, "deleted", deleted)?;
            }
        }
        Ok(())
    }
}

fn union(sets: &[&BTreeSet<OsmId>]) -> BTreeSet<OsmId> {
    let mut out = BTreeSet::new();
    for set in sets {
        out.extend(set.iter().copied());
    }
    out
}

fn check_disjoint(
    kind: OsmKind,
    left_name: &str,
    left: &BTreeSet<OsmId>,
    right_name: &str,
    right: &BTreeSet<OsmId>,
) -> EngineResult<()> {
    if let Some(id) = left.intersection(right).next() {
        return Err(EngineError::InvariantViolated(format!(
            "{kind} {id} is in both the {left_name} and {right_name} sets"
        )));
    }
    Ok(())
}

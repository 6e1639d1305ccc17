//! Typed accessors over the SPARQL client and query catalogue
//!
//! Every id-set argument is batched into groups of at most
//! [`MAX_VALUES_PER_QUERY`](crate::sparql::queries::MAX_VALUES_PER_QUERY)
//! values per outgoing query. Result bindings carry full IRIs; ids are
//! recovered by namespace-prefix strip plus integer parse.

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::sparql::queries::{self, MAX_VALUES_PER_QUERY};
use crate::sparql::results::{self, required, Row};
use crate::sparql::SparqlClient;
use osmsync_core::model::{Node, OsmId, OsmKind, Relation, RelationMember, Way};
use osmsync_core::ttl::parse_id_suffix;
use osmsync_core::vocab;
use std::collections::BTreeSet;
use tracing::debug;

/// Split a sorted id set into insertion-order chunks of at most `size` ids.
pub fn batches(ids: &BTreeSet<OsmId>, size: usize) -> Vec<Vec<OsmId>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(size.min(ids.len()));
    for &id in ids {
        current.push(id);
        if current.len() == size {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Typed fetch layer. Owns its own client; the change processor keeps a
/// second client for updates.
pub struct DataFetcher {
    client: SparqlClient,
    geom_node_iri: String,
}

impl DataFetcher {
    pub fn new(config: &Config) -> EngineResult<Self> {
        Ok(Self {
            client: SparqlClient::new(config)?,
            geom_node_iri: format!("{}osm_node_", vocab::osm2rdfgeom::NAMESPACE),
        })
    }

    async fn run_select(&mut self, query: String) -> EngineResult<Vec<Row>> {
        self.client.set_default_prefixes();
        self.client.set_query(&query);
        let xml = self.client.run_query().await?;
        results::parse_select(&xml)
    }

    /// Dummy nodes (id + position) for the given ids. Fatal
    /// [`EngineError::SizeMismatch`] if the endpoint returns more geometries
    /// than ids were requested.
    pub async fn node_locations(&mut self, ids: &BTreeSet<OsmId>) -> EngineResult<Vec<Node>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            let rows = self.run_select(queries::node_locations(&batch)).await?;
            if rows.len() > batch.len() {
                return Err(EngineError::SizeMismatch {
                    expected: batch.len(),
                    actual: rows.len(),
                });
            }
            for row in &rows {
                let id = parse_id_suffix(required(row, "nodeGeo")?, &self.geom_node_iri)?;
                nodes.push(Node::from_wkt_point(id, required(row, "location")?)?);
            }
        }
        debug!(requested = ids.len(), fetched = nodes.len(), "node locations");
        Ok(nodes)
    }

    /// Dummy ways (id + ordered node references) for the given ids.
    pub async fn ways_members(&mut self, ids: &BTreeSet<OsmId>) -> EngineResult<Vec<Way>> {
        let mut ways = Vec::with_capacity(ids.len());
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self.run_select(queries::ways_members(&batch)).await? {
                let id = parse_id_suffix(required(&row, "way")?, vocab::osmway::NAMESPACE)?;
                let mut way = Way::new(id);
                let members = split_concat(required(&row, "nodeUris")?);
                let positions = split_concat(required(&row, "nodePositions")?);
                for (_, uri) in ordered(&members, &positions)? {
                    way.add_member(parse_id_suffix(uri, vocab::osmnode::NAMESPACE)?);
                }
                ways.push(way);
            }
        }
        Ok(ways)
    }

    /// Distinct node ids referenced by the given ways.
    pub async fn ways_referenced_nodes(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<BTreeSet<OsmId>> {
        let mut nodes = BTreeSet::new();
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self
                .run_select(queries::ways_referenced_nodes(&batch))
                .await?
            {
                nodes.insert(parse_id_suffix(
                    required(&row, "node")?,
                    vocab::osmnode::NAMESPACE,
                )?);
            }
        }
        Ok(nodes)
    }

    /// Dummy relations (id, type, ordered members with roles) for the ids.
    pub async fn relations_with_members(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<Vec<Relation>> {
        let mut relations = Vec::with_capacity(ids.len());
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self
                .run_select(queries::relations_with_members(&batch))
                .await?
            {
                let id = parse_id_suffix(required(&row, "rel")?, vocab::osmrel::NAMESPACE)?;
                let mut relation = Relation::new(id);
                relation.set_type(required(&row, "type")?);
                let uris = split_concat(required(&row, "memberUris")?);
                let roles = split_concat(required(&row, "memberRoles")?);
                let positions = split_concat(required(&row, "memberPositions")?);
                if uris.len() != roles.len() || uris.len() != positions.len() {
                    return Err(EngineError::MalformedResponse(format!(
                        "relation {id}: {} member ids, {} roles, {} positions",
                        uris.len(),
                        roles.len(),
                        positions.len()
                    )));
                }
                let mut members: Vec<(usize, RelationMember)> = Vec::with_capacity(uris.len());
                for ((uri, role), pos) in uris.iter().zip(&roles).zip(&positions) {
                    let pos: usize = pos.parse().map_err(|_| {
                        EngineError::MalformedResponse(format!(
                            "member position '{pos}' is not an integer"
                        ))
                    })?;
                    let (kind, member_id) = classify_member_iri(uri)?;
                    members.push((pos, RelationMember::new(kind, member_id, role)));
                }
                members.sort_by_key(|(pos, _)| *pos);
                for (_, member) in members {
                    relation.add_member(member);
                }
                relations.push(relation);
            }
        }
        Ok(relations)
    }

    /// Distinct member ids of the given relations, partitioned by kind.
    pub async fn relations_member_ids(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<(BTreeSet<OsmId>, BTreeSet<OsmId>, BTreeSet<OsmId>)> {
        let mut nodes = BTreeSet::new();
        let mut ways = BTreeSet::new();
        let mut relations = BTreeSet::new();
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self.run_select(queries::relations_member_ids(&batch)).await? {
                let (kind, id) = classify_member_iri(required(&row, "p")?)?;
                match kind {
                    OsmKind::Node => nodes.insert(id),
                    OsmKind::Way => ways.insert(id),
                    OsmKind::Relation => relations.insert(id),
                };
            }
        }
        Ok((nodes, ways, relations))
    }

    /// Ways whose member list references any of the given nodes.
    pub async fn ways_referencing_nodes(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<BTreeSet<OsmId>> {
        let mut ways = BTreeSet::new();
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self
                .run_select(queries::ways_referencing_nodes(&batch))
                .await?
            {
                ways.insert(parse_id_suffix(
                    required(&row, "way")?,
                    vocab::osmway::NAMESPACE,
                )?);
            }
        }
        Ok(ways)
    }

    /// Relations with a member among the given nodes.
    pub async fn relations_referencing_nodes(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<BTreeSet<OsmId>> {
        self.relations_referencing(ids, queries::relations_referencing_nodes)
            .await
    }

    /// Relations with a member among the given ways.
    pub async fn relations_referencing_ways(
        &mut self,
        ids: &BTreeSet<OsmId>,
    ) -> EngineResult<BTreeSet<OsmId>> {
        self.relations_referencing(ids, queries::relations_referencing_ways)
            .await
    }

    async fn relations_referencing(
        &mut self,
        ids: &BTreeSet<OsmId>,
        query: fn(&[OsmId]) -> String,
    ) -> EngineResult<BTreeSet<OsmId>> {
        let mut relations = BTreeSet::new();
        for batch in batches(ids, MAX_VALUES_PER_QUERY) {
            for row in self.run_select(query(&batch)).await? {
                relations.insert(parse_id_suffix(
                    required(&row, "s")?,
                    vocab::osmrel::NAMESPACE,
                )?);
            }
        }
        Ok(relations)
    }

    /// Tags and timestamp of a single way or relation, needed so the
    /// converter regenerates area triples identically to the bulk load.
    pub async fn tags_and_timestamp(
        &mut self,
        subject: &str,
    ) -> EngineResult<(Vec<(String, String)>, Option<String>)> {
        let rows = self.run_select(queries::tags_and_timestamp(subject)).await?;
        let mut tags = Vec::new();
        let mut timestamp = None;
        for row in &rows {
            if let Some(time) = row.get("time") {
                timestamp = Some(time.clone());
            } else if let (Some(key), Some(value)) = (row.get("key"), row.get("value")) {
                let key = key
                    .strip_prefix(vocab::osmkey::NAMESPACE)
                    .ok_or_else(|| {
                        EngineError::MalformedResponse(format!("unexpected tag key IRI '{key}'"))
                    })?;
                tags.push((key.to_string(), value.clone()));
            }
        }
        Ok((tags, timestamp))
    }

    /// Timestamp of the most recently edited node in the store.
    pub async fn latest_node_timestamp(&mut self) -> EngineResult<String> {
        let rows = self.run_select(queries::latest_node_timestamp()).await?;
        let row = rows.first().ok_or_else(|| {
            EngineError::MalformedResponse("no node timestamps in store".to_string())
        })?;
        Ok(required(row, "p")?.to_string())
    }
}

/// Split a `GROUP_CONCAT` aggregate on its separator. Empty aggregates yield
/// no elements.
fn split_concat(value: &str) -> Vec<&str> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(queries::GROUP_CONCAT_SEPARATOR).collect()
    }
}

/// Pair concatenated values with their `pos` markers and sort by position.
fn ordered<'a>(values: &[&'a str], positions: &[&str]) -> EngineResult<Vec<(usize, &'a str)>> {
    if values.len() != positions.len() {
        return Err(EngineError::MalformedResponse(format!(
            "{} values but {} positions in aggregate",
            values.len(),
            positions.len()
        )));
    }
    let mut paired: Vec<(usize, &str)> = Vec::with_capacity(values.len());
    for (value, pos) in values.iter().zip(positions) {
        let pos: usize = pos.parse().map_err(|_| {
            EngineError::MalformedResponse(format!("member position '{pos}' is not an integer"))
        })?;
        paired.push((pos, *value));
    }
    paired.sort_by_key(|(pos, _)| *pos);
    Ok(paired)
}

/// Classify a member IRI by its namespace and extract the id.
fn classify_member_iri(iri: &str) -> EngineResult<(OsmKind, OsmId)> {
    if iri.starts_with(vocab::osmnode::NAMESPACE) {
        Ok((OsmKind::Node, parse_id_suffix(iri, vocab::osmnode::NAMESPACE)?))
    } else if iri.starts_with(vocab::osmway::NAMESPACE) {
        Ok((OsmKind::Way, parse_id_suffix(iri, vocab::osmway::NAMESPACE)?))
    } else if iri.starts_with(vocab::osmrel::NAMESPACE) {
        Ok((
            OsmKind::Relation,
            parse_id_suffix(iri, vocab::osmrel::NAMESPACE)?,
        ))
    } else {
        Err(EngineError::MalformedResponse(format!(
            "member IRI '{iri}' is in no known namespace"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_chunking() {
        let ids: BTreeSet<OsmId> = (1..=10).collect();
        let chunks = batches(&ids, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec![1, 2, 3, 4]);
        assert_eq!(chunks[2], vec![9, 10]);
    }

    #[test]
    fn test_batches_empty() {
        assert!(batches(&BTreeSet::new(), 4).is_empty());
    }

    #[test]
    fn test_split_concat() {
        assert_eq!(split_concat("a;b;c"), vec!["a", "b", "c"]);
        assert!(split_concat("").is_empty());
    }

    #[test]
    fn test_ordered_sorts_by_position() {
        let values = vec!["n9", "n2", "n7"];
        let positions = vec!["2", "0", "1"];
        let sorted = ordered(&values, &positions).unwrap();
        let in_order: Vec<&str> = sorted.into_iter().map(|(_, v)| v).collect();
        assert_eq!(in_order, vec!["n2", "n7", "n9"]);
    }

    #[test]
    fn test_ordered_length_mismatch() {
        assert!(ordered(&["a"], &["0", "1"]).is_err());
    }

    #[test]
    fn test_classify_member_iri() {
        let (kind, id) =
            classify_member_iri("https://www.openstreetmap.org/way/99").unwrap();
        assert_eq!(kind, OsmKind::Way);
        assert_eq!(id, 99);
        assert!(classify_member_iri("https://example.org/thing/1").is_err());
    }
}

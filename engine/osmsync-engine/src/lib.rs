//! # osmsync-engine
//!
//! The change application engine: applies OSM change files as incremental
//! updates to an osm2rdf knowledge graph behind a SPARQL 1.1 Query/Update
//! endpoint (QLever), leaving the endpoint equivalent to a fresh bulk load
//! of the full snapshot.
//!
//! The pipeline is strictly sequential: a change document is classified into
//! per-kind created/modified/deleted sets, the transitive geometry and
//! reference closures are computed against the endpoint, dummy copies of
//! referenced-but-unchanged objects are fetched, the external OSM→RDF
//! converter is run over the reconstructed partial snapshot, and the
//! resulting triples are filtered down to affected subjects and emitted as
//! batched DELETE/INSERT updates.

pub mod changeset;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod osc;
pub mod processor;
pub mod replication;
pub mod scratch;
pub mod sparql;

pub use changeset::{ChangeAction, ChangeSet};
pub use config::Config;
pub use convert::{Osm2RdfCommand, OsmToRdfConverter};
pub use error::{EngineError, EngineResult};
pub use processor::{ChangeProcessor, UpdateStats};
pub use replication::{ReplicationClient, ReplicationState};

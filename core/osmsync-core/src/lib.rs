//! # osmsync-core
//!
//! Value types shared by the osmsync engine: the in-memory OSM object model
//! with OSM XML 0.6 serialization, the osm2rdf vocabulary, and the
//! line-oriented turtle parser for converter output.
//!
//! Everything here is plain data; network and filesystem concerns live in
//! `osmsync-engine`.

pub mod error;
pub mod model;
pub mod ttl;
pub mod vocab;

pub use error::{CoreError, CoreResult};
pub use model::{Node, OsmId, OsmKind, Relation, RelationMember, Way};
pub use ttl::Triple;

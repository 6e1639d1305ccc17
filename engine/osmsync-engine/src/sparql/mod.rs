//! SPARQL endpoint communication: client, query catalogue, results parsing

mod client;
pub mod queries;
pub mod results;

pub use client::SparqlClient;

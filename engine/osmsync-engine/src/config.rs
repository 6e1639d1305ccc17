//! Engine configuration
//!
//! Layered from defaults, an optional TOML file, and `OSMSYNC_`-prefixed
//! environment variables (`OSMSYNC_CONVERTER__COMMAND=…` for nested keys).

use crate::error::{EngineError, EngineResult};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SPARQL 1.1 Query/Update endpoint (QLever)
    pub sparql_endpoint_uri: String,

    /// Replication directory serving `state.txt` and `AAA/BBB/CCC.osc.gz`
    pub osm_change_file_directory_uri: String,

    /// When on, every (prefixes, query) pair is appended to
    /// `path_to_sparql_query_output` before dispatch
    pub write_sparql_queries_to_file: bool,

    /// Target file for the query log
    pub path_to_sparql_query_output: PathBuf,

    /// Parent directory for the engine's scratch files. `None` uses a
    /// temporary directory released on success.
    pub build_dir: Option<PathBuf>,

    pub converter: ConverterConfig,
}

/// External OSM→RDF converter invocation.
///
/// `args` may contain the placeholders `{input}` and `{output}`, replaced
/// with the reconstructed OSM document and the turtle output path inside the
/// scratch directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Output file name inside the scratch directory; a `.bz2` suffix makes
    /// the driver stream-decompress it
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sparql_endpoint_uri: "http://localhost:7001/".to_string(),
            osm_change_file_directory_uri:
                "https://planet.openstreetmap.org/replication/minute/".to_string(),
            write_sparql_queries_to_file: false,
            path_to_sparql_query_output: PathBuf::from("sparql-queries.txt"),
            build_dir: None,
            converter: ConverterConfig::default(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            command: "osm2rdf".to_string(),
            args: vec![
                "{input}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
            ],
            output_file: "osm.ttl.bz2".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, then `file` (if given), then
    /// environment variables.
    pub fn load(file: Option<&Path>) -> EngineResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("OSMSYNC_").split("__"))
            .extract()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that URIs parse and the converter command is set.
    pub fn validate(&self) -> EngineResult<()> {
        Url::parse(&self.sparql_endpoint_uri).map_err(|e| {
            EngineError::Config(format!(
                "sparql_endpoint_uri '{}': {e}",
                self.sparql_endpoint_uri
            ))
        })?;
        Url::parse(&self.osm_change_file_directory_uri).map_err(|e| {
            EngineError::Config(format!(
                "osm_change_file_directory_uri '{}': {e}",
                self.osm_change_file_directory_uri
            ))
        })?;
        if self.converter.command.is_empty() {
            return Err(EngineError::Config("converter.command is empty".to_string()));
        }
        Ok(())
    }
}

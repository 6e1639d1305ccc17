//! Engine-scoped scratch directory
//!
//! One directory per change-file application holds the three reconstructed
//! OSM documents plus the decompressed triples buffer. The directory is
//! created (and its files truncated) at engine start, released on success,
//! and kept on fatal error for post-mortem inspection.

use crate::error::EngineResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Scratch file names inside the build directory.
pub const NODES_FILE: &str = "nodes.osm";
pub const WAYS_FILE: &str = "ways.osm";
pub const RELATIONS_FILE: &str = "relations.osm";
pub const TRIPLES_FILE: &str = "triples.txt";

/// Opening and closing lines of each reconstructed OSM document.
pub const OSM_XML_HEADER: &str = "<osm version=\"0.6\">";
pub const OSM_XML_FOOTER: &str = "</osm>";

/// Scoped build directory owning the four scratch files.
pub struct ScratchDir {
    root: PathBuf,
    temp: Option<TempDir>,
    nodes: Option<BufWriter<File>>,
    ways: Option<BufWriter<File>>,
    relations: Option<BufWriter<File>>,
}

impl ScratchDir {
    /// Create the scratch directory. With `base` set, the fixed directory is
    /// created (or reused) and its files truncated; otherwise a temporary
    /// directory is used and removed when the scratch is dropped on success.
    pub fn create(base: Option<&Path>) -> EngineResult<Self> {
        let (root, temp) = match base {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.to_path_buf(), None)
            }
            None => {
                let temp = TempDir::with_prefix("osmsync-")?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        debug!(dir = %root.display(), "scratch directory ready");

        let open = |name: &str| -> EngineResult<BufWriter<File>> {
            let mut writer = BufWriter::new(File::create(root.join(name))?);
            writeln!(writer, "{OSM_XML_HEADER}")?;
            Ok(writer)
        };
        let nodes = open(NODES_FILE)?;
        let ways = open(WAYS_FILE)?;
        let relations = open(RELATIONS_FILE)?;
        File::create(root.join(TRIPLES_FILE))?;

        Ok(Self {
            root,
            temp,
            nodes: Some(nodes),
            ways: Some(ways),
            relations: Some(relations),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.root.join(NODES_FILE)
    }

    pub fn ways_path(&self) -> PathBuf {
        self.root.join(WAYS_FILE)
    }

    pub fn relations_path(&self) -> PathBuf {
        self.root.join(RELATIONS_FILE)
    }

    pub fn triples_path(&self) -> PathBuf {
        self.root.join(TRIPLES_FILE)
    }

    pub fn append_node_xml(&mut self, xml: &str) -> EngineResult<()> {
        Self::append(&mut self.nodes, xml)
    }

    pub fn append_way_xml(&mut self, xml: &str) -> EngineResult<()> {
        Self::append(&mut self.ways, xml)
    }

    pub fn append_relation_xml(&mut self, xml: &str) -> EngineResult<()> {
        Self::append(&mut self.relations, xml)
    }

    fn append(writer: &mut Option<BufWriter<File>>, xml: &str) -> EngineResult<()> {
        let writer = writer.as_mut().ok_or_else(|| {
            crate::error::EngineError::InvariantViolated(
                "append to a finalized scratch document".to_string(),
            )
        })?;
        writeln!(writer, "{xml}")?;
        Ok(())
    }

    /// Close the three `<osm>` wrappers and flush. After this the documents
    /// are read-only input for the converter.
    pub fn finalize_osm_documents(&mut self) -> EngineResult<()> {
        for writer in [&mut self.nodes, &mut self.ways, &mut self.relations] {
            if let Some(mut w) = writer.take() {
                writeln!(w, "{OSM_XML_FOOTER}")?;
                w.flush()?;
            }
        }
        Ok(())
    }

    /// Keep the scratch files on disk for post-mortem and return their
    /// location. Used on the fatal-error path.
    pub fn persist(self) -> PathBuf {
        match self.temp {
            Some(temp) => temp.into_path(),
            None => self.root,
        }
    }
}

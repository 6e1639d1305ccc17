//! External OSM→RDF converter invocation
//!
//! The converter is a pure function `osm-xml → turtle-stream` from the
//! engine's point of view, behind the [`OsmToRdfConverter`] seam. The
//! production implementation merges the reconstructed documents (nodes before
//! ways and relations) into one input file and spawns the configured
//! `osm2rdf` command; its bzip2-compressed output is decompressed into the
//! scratch triples buffer.

use crate::config::{Config, ConverterConfig};
use crate::error::{EngineError, EngineResult};
use crate::scratch::{ScratchDir, OSM_XML_FOOTER, OSM_XML_HEADER};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Seam for the external converter.
pub trait OsmToRdfConverter {
    /// Run the conversion over the scratch documents and return the path of
    /// the turtle output (decompressed transparently by
    /// [`decompress_turtle`] when it carries a `.bz2` suffix).
    fn convert(&self, scratch: &ScratchDir) -> EngineResult<PathBuf>;
}

/// Production converter: the `osm2rdf` command configured in
/// [`ConverterConfig`].
pub struct Osm2RdfCommand {
    config: ConverterConfig,
}

impl Osm2RdfCommand {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.converter.clone(),
        }
    }
}

impl OsmToRdfConverter for Osm2RdfCommand {
    fn convert(&self, scratch: &ScratchDir) -> EngineResult<PathBuf> {
        let input = scratch.root().join("input.osm");
        merge_osm_documents(
            &[
                scratch.nodes_path(),
                scratch.ways_path(),
                scratch.relations_path(),
            ],
            &input,
        )?;

        let output = scratch.root().join(&self.config.output_file);
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();

        info!(command = %self.config.command, "running OSM→RDF converter");
        let result = Command::new(&self.config.command)
            .args(&args)
            .output()
            .map_err(|e| {
                EngineError::ConverterFailed(format!(
                    "could not spawn '{}': {e}",
                    self.config.command
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(EngineError::ConverterFailed(format!(
                "'{}' exited with {}: {}",
                self.config.command,
                result.status,
                stderr.trim_end()
            )));
        }
        debug!(output = %output.display(), "converter finished");
        Ok(output)
    }
}

/// Concatenate the payload of several single-rooted OSM documents into one.
/// Nodes must come first so the converter sees them before the ways and
/// relations that reference them.
fn merge_osm_documents(inputs: &[PathBuf], dest: &Path) -> EngineResult<()> {
    let mut writer = BufWriter::new(File::create(dest)?);
    writeln!(writer, "{OSM_XML_HEADER}")?;
    for input in inputs {
        for line in BufReader::new(File::open(input)?).lines() {
            let line = line?;
            if line == OSM_XML_HEADER || line == OSM_XML_FOOTER {
                continue;
            }
            writeln!(writer, "{line}")?;
        }
    }
    writeln!(writer, "{OSM_XML_FOOTER}")?;
    writer.flush()?;
    Ok(())
}

/// Stream the converter output into the triples buffer, decompressing bzip2
/// when the source carries a `.bz2` suffix.
pub fn decompress_turtle(src: &Path, dest: &Path) -> EngineResult<()> {
    let mut writer = BufWriter::new(File::create(dest)?);
    let file = File::open(src)?;
    if src.extension().is_some_and(|ext| ext == "bz2") {
        let mut decoder = bzip2::read::MultiBzDecoder::new(file);
        std::io::copy(&mut decoder, &mut writer)
            .map_err(|e| EngineError::Decompression(format!("{}: {e}", src.display())))?;
    } else {
        let mut reader = BufReader::new(file);
        std::io::copy(&mut reader, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

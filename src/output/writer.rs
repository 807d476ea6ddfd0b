//! Snapshot file writer

use super::snapshot_dir;
use crate::config::OutputConfig;
use crate::error::{GraphError, Result, ResultExt};
use crate::expr::{Filter, Modifiers};
use crate::graph::{NodeId, NodeList};
use crate::types::SampleRow;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Placeholder edge type written to `link.dat`
const LINK_TYPE: u32 = 0;

/// Placeholder edge weight written to `link.dat`
const LINK_WEIGHT: u32 = 1;

/// Numeric ids for node type names, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    ids: HashMap<String, usize>,
    /// `(type name, attribute labels, node count)` by type id
    types: Vec<(String, Vec<String>, usize)>,
}

impl TypeIndex {
    pub fn from_nodes(nodes: &NodeList) -> Self {
        let mut index = Self::default();
        for node in nodes.iter() {
            match index.ids.get(node.type_name()) {
                Some(&id) => index.types[id].2 += 1,
                None => {
                    index.ids.insert(node.type_name().to_string(), index.types.len());
                    index
                        .types
                        .push((node.type_name().to_string(), node.attribute_names(), 1));
                }
            }
        }
        index
    }

    pub fn id(&self, type_name: &str) -> Option<usize> {
        self.ids.get(type_name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `(id, name, labels, count)` in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &[String], usize)> {
        self.types
            .iter()
            .enumerate()
            .map(|(id, (name, labels, count))| (id, name.as_str(), labels.as_slice(), *count))
    }
}

/// Outcome of writing all snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub written: usize,
    /// Timestamps the filter rejected
    pub filtered: usize,
    /// Timestamps skipped because the filter failed to evaluate
    pub errors: usize,
    /// Timestamps skipped because an earlier one already took their directory
    pub duplicates: usize,
}

/// Writes one graph snapshot per retained timestamp
#[derive(Debug)]
pub struct SnapshotWriter<'a> {
    root: PathBuf,
    output: OutputConfig,
    nodes: &'a NodeList,
    modifiers: &'a Modifiers,
    types: TypeIndex,
    edges: Vec<(NodeId, NodeId)>,
}

impl<'a> SnapshotWriter<'a> {
    /// Prepare a writer; edges are computed once at `connectivity` hops
    pub fn new(
        root: impl Into<PathBuf>,
        output: &OutputConfig,
        connectivity: usize,
        nodes: &'a NodeList,
        modifiers: &'a Modifiers,
    ) -> Self {
        Self {
            root: root.into(),
            output: output.clone(),
            nodes,
            modifiers,
            types: TypeIndex::from_nodes(nodes),
            edges: nodes.edges(connectivity),
        }
    }

    pub fn types(&self) -> &TypeIndex {
        &self.types
    }

    /// Write a snapshot for every global row that passes `filter`.
    ///
    /// Row `i` of the global data pairs with sample row `i` of every node.
    /// Nothing is written for an empty node list. A timestamp whose
    /// directory was already written in this call is skipped.
    pub fn write_all(
        &self,
        globals: &[SampleRow],
        filter: Option<&Filter>,
    ) -> Result<SnapshotStats> {
        let mut stats = SnapshotStats::default();
        if self.nodes.is_empty() {
            tracing::warn!("No nodes; skipping {} snapshots", globals.len());
            return Ok(stats);
        }

        let mut written_dirs = HashSet::new();
        for (index, global) in globals.iter().enumerate() {
            if let Some(filter) = filter {
                match filter.passes(global) {
                    Ok(true) => {}
                    Ok(false) => {
                        stats.filtered += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", global.timestamp, e);
                        stats.errors += 1;
                        continue;
                    }
                }
            }
            let dir = snapshot_dir(&self.root, global.timestamp, &self.output);
            if !written_dirs.insert(dir.clone()) {
                tracing::warn!(
                    "Skipping {}: {:?} already holds an earlier snapshot",
                    global.timestamp,
                    dir
                );
                stats.duplicates += 1;
                continue;
            }
            self.write_to(&dir, index, global)?;
            stats.written += 1;
        }
        tracing::info!(
            "Wrote {} snapshots ({} filtered out, {} filter errors, {} duplicate directories)",
            stats.written,
            stats.filtered,
            stats.errors,
            stats.duplicates
        );
        Ok(stats)
    }

    /// Write the snapshot for sample row `index`, returning its directory
    pub fn write_snapshot(&self, index: usize, global: &SampleRow) -> Result<PathBuf> {
        let dir = snapshot_dir(&self.root, global.timestamp, &self.output);
        self.write_to(&dir, index, global)?;
        Ok(dir)
    }

    fn write_to(&self, dir: &Path, index: usize, global: &SampleRow) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(GraphError::from)
            .with_context(|| format!("Creating {:?}", dir))?;
        tracing::trace!("Writing snapshot {} to {:?}", global.timestamp, dir);

        self.write_meta(dir)?;
        self.write_node_dat(dir, index)?;
        self.write_link_dat(dir)?;
        self.write_label_file(&dir.join("info.dat"))?;
        self.write_label_file(&dir.join("label.dat"))?;
        self.write_globals(dir, global)?;
        Ok(())
    }

    fn create(path: &Path) -> Result<BufWriter<File>> {
        let file = File::create(path)
            .map_err(GraphError::from)
            .with_context(|| format!("Creating {:?}", path))?;
        Ok(BufWriter::new(file))
    }

    fn write_meta(&self, dir: &Path) -> Result<()> {
        let mut out = Self::create(&dir.join("meta.dat"))?;
        writeln!(out, "Node Total\t{}", self.nodes.len())?;
        for (id, _, _, count) in self.types.iter() {
            writeln!(out, "Node Type_{}\t{}", id, count)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_node_dat(&self, dir: &Path, index: usize) -> Result<()> {
        let mut out = Self::create(&dir.join("node.dat"))?;
        writeln!(out, "NODE\tNAME\tTYPE\tVALUES")?;
        for node in self.nodes.iter() {
            let id = node.node_id().map(|id| id.to_string()).unwrap_or_default();
            let type_id = self.types.id(node.type_name()).unwrap_or_default();
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                id,
                node.name(),
                type_id,
                node.attribute_values(index, self.modifiers).join(",")
            )?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_link_dat(&self, dir: &Path) -> Result<()> {
        let mut out = Self::create(&dir.join("link.dat"))?;
        writeln!(out, "START\tEND\tLINK_TYPE\tLINK_WEIGHT")?;
        for (start, end) in &self.edges {
            writeln!(out, "{}\t{}\t{}\t{}", start, end, LINK_TYPE, LINK_WEIGHT)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_label_file(&self, path: &Path) -> Result<()> {
        let mut out = Self::create(path)?;
        writeln!(out, "TYPE\tNAME\tLABELS")?;
        for (id, name, labels, _) in self.types.iter() {
            writeln!(out, "{}\t{}\t{}", id, name, labels.join(","))?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_globals(&self, dir: &Path, global: &SampleRow) -> Result<()> {
        let mut out = Self::create(&dir.join("globals.json"))?;
        serde_json::to_writer_pretty(&mut out, &global.values)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        out.flush()?;
        Ok(())
    }
}

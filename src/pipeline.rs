//! Run orchestration
//!
//! A run goes through these stages:
//!
//! 1. Collect: query inventory elements, classify them against the type
//!    hierarchy, and sample node and global channels. With `--read-json`
//!    this stage is replaced by loading the replay files.
//! 2. Optionally save the collected data as replay files.
//! 3. Link the nodes and write one snapshot per timestamp that passes
//!    the filter.

use crate::config::RunConfig;
use crate::error::{GraphError, Result, ResultExt};
use crate::expr::{Filter, Modifiers};
use crate::graph::{read_nodes, write_nodes, ChannelNaming, Classifier, GraphNode, NodeList};
use crate::hierarchy::{TypeHierarchy, TypeTree};
use crate::output::{SnapshotStats, SnapshotWriter};
use crate::sampler::{Sampler, SamplerSettings};
use crate::service::{
    CedClient, ChannelDataSource, InventoryQuery, InventorySource, MyaClient, TypeTreeSource,
};
use crate::types::SampleRow;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Replay file holding the type hierarchy
pub const TREE_FILE: &str = "tree.json";

/// Replay file holding nodes and their samples
pub const NODES_FILE: &str = "nodes.json";

/// Replay file holding global channel samples
pub const GLOBALS_FILE: &str = "global.json";

/// The upstream services a live run talks to
pub struct Services {
    pub inventory: Box<dyn InventorySource>,
    pub types: Box<dyn TypeTreeSource>,
    pub data: Box<dyn ChannelDataSource>,
}

impl Services {
    /// HTTP clients for the URLs in `config`
    pub fn http(config: &RunConfig) -> Result<Self> {
        let ced = CedClient::new(config.ced.url.clone())?;
        Ok(Self {
            inventory: Box::new(ced.clone()),
            types: Box::new(ced),
            data: Box::new(MyaClient::new(config.mya.url.clone())?),
        })
    }
}

/// Where the run gets its data and where it writes
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Load data from replay files instead of the services
    pub read_json: bool,
    /// Save collected data as replay files
    pub save_json: bool,
    /// Directory of the replay files
    pub json_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            read_json: false,
            save_json: false,
            json_dir: PathBuf::from("."),
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub elements: usize,
    pub nodes: usize,
    /// Elements no configured type matched
    pub dropped: usize,
    pub snapshots: SnapshotStats,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} elements, {} nodes ({} dropped), {} snapshots written, {} filtered out, \
             {} skipped on filter errors, {} skipped as duplicate directories",
            self.elements,
            self.nodes,
            self.dropped,
            self.snapshots.written,
            self.snapshots.filtered,
            self.snapshots.errors,
            self.snapshots.duplicates
        )
    }
}

/// Everything a run needs to write snapshots
#[derive(Debug)]
pub struct GraphData {
    /// Type tree, when it was loaded
    pub tree: Option<TypeTree>,
    pub nodes: NodeList,
    pub globals: Vec<SampleRow>,
    pub elements: usize,
    pub dropped: usize,
}

/// Fail early if snapshots cannot be written under `dir`
pub fn check_output_dir(dir: &Path) -> Result<()> {
    let metadata = fs::metadata(dir)
        .map_err(|e| GraphError::Config(format!("Output directory {:?}: {}", dir, e)))?;
    if !metadata.is_dir() {
        return Err(GraphError::Config(format!("{:?} is not a directory", dir)));
    }
    let marker = dir.join(".cebaf-graph-write-check");
    File::create(&marker)
        .and_then(|_| fs::remove_file(&marker))
        .map_err(|e| {
            GraphError::Config(format!("Unable to write to output directory {:?}: {}", dir, e))
        })
}

/// Fetch elements, classify them and sample their channels
pub fn collect(config: &RunConfig, services: Services) -> Result<GraphData> {
    let hierarchy = TypeHierarchy::new(services.types);
    let classifier = Classifier::from_config(&config.nodes);

    let query = InventoryQuery::from_config(&config.ced);
    let elements = services
        .inventory
        .query_elements(&query)
        .context("Fetching inventory elements")?;

    let mut nodes: Vec<GraphNode> = Vec::new();
    if let Some(ref master) = config.nodes.master {
        nodes.push(classifier.master_node(master));
    }
    let mut dropped = 0;
    for element in &elements {
        match classifier.classify(element, &hierarchy)? {
            Some(node) => nodes.push(node),
            None => {
                tracing::warn!(
                    "Dropping {} (type {}): no configured type matches",
                    element.name,
                    element.type_name
                );
                dropped += 1;
            }
        }
    }
    tracing::info!("Classified {} of {} elements", elements.len() - dropped, elements.len());

    let mut nodes = NodeList::new(nodes);
    let globals = sample(config, services.data, &mut nodes)?;

    Ok(GraphData {
        tree: hierarchy.cached().cloned(),
        nodes,
        globals,
        elements: elements.len(),
        dropped,
    })
}

/// Sample node and global channels in one batch so their rows align
fn sample(
    config: &RunConfig,
    source: Box<dyn ChannelDataSource>,
    nodes: &mut NodeList,
) -> Result<Vec<SampleRow>> {
    let channels: BTreeSet<String> = nodes
        .iter()
        .flat_map(|n| n.channels().iter().cloned())
        .chain(config.mya.global.iter().cloned())
        .collect();
    if channels.is_empty() {
        tracing::warn!("No channels to sample; no snapshots will be written");
        return Ok(Vec::new());
    }

    let sampler = Sampler::new(source, SamplerSettings::from_config(&config.mya)?);
    let channels: Vec<String> = channels.into_iter().collect();
    let batch = sampler.fetch(&channels, &config.spans()?)?;

    for node in nodes.iter_mut() {
        node.attach_samples(&batch);
    }
    Ok(batch.project(&config.mya.global))
}

/// Load data saved by an earlier run with `--save-json`
pub fn load_replay(config: &RunConfig, dir: &Path) -> Result<GraphData> {
    let tree_path = dir.join(TREE_FILE);
    let tree = if tree_path.exists() {
        Some(read_json::<TypeTree>(&tree_path)?)
    } else {
        None
    };
    let nodes = read_nodes(&dir.join(NODES_FILE), &ChannelNaming::from_config(&config.nodes))?;
    let globals: Vec<SampleRow> = read_json(&dir.join(GLOBALS_FILE))?;
    tracing::info!(
        "Loaded {} nodes and {} global rows from {:?}",
        nodes.len(),
        globals.len(),
        dir
    );

    Ok(GraphData {
        tree,
        elements: nodes.len(),
        dropped: 0,
        nodes,
        globals,
    })
}

/// Save collected data as replay files
pub fn save_replay(data: &GraphData, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    if let Some(ref tree) = data.tree {
        write_json(&dir.join(TREE_FILE), tree)?;
    }
    write_nodes(&dir.join(NODES_FILE), &data.nodes)?;
    write_json(&dir.join(GLOBALS_FILE), &data.globals)?;
    tracing::info!("Saved replay files to {:?}", dir);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(GraphError::from)
        .with_context(|| format!("Opening {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(GraphError::from)
        .with_context(|| format!("Reading {:?}", path))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Link nodes and write every snapshot that passes the filter
pub fn write_snapshots(
    config: &RunConfig,
    data: &mut GraphData,
    output_dir: &Path,
) -> Result<SnapshotStats> {
    data.nodes.link();
    let modifiers = Modifiers::new(config.modifiers.clone());
    let filter = config.filter.as_deref().map(Filter::new);
    let writer = SnapshotWriter::new(
        output_dir,
        &config.output,
        config.edges.connectivity,
        &data.nodes,
        &modifiers,
    );
    writer.write_all(&data.globals, filter.as_ref())
}

/// Run every stage. `services` is only used when not replaying.
pub fn run(
    config: &RunConfig,
    options: &RunOptions,
    services: Option<Services>,
) -> Result<RunSummary> {
    check_output_dir(&options.output_dir)?;

    let mut data = if options.read_json {
        load_replay(config, &options.json_dir)?
    } else {
        let services = match services {
            Some(services) => services,
            None => Services::http(config)?,
        };
        collect(config, services)?
    };

    if options.save_json {
        save_replay(&data, &options.json_dir)?;
    }

    let snapshots = write_snapshots(config, &mut data, &options.output_dir)?;
    Ok(RunSummary {
        elements: data.elements,
        nodes: data.nodes.len(),
        dropped: data.dropped,
        snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_must_exist() {
        let err = check_output_dir(Path::new("/nonexistent/output")).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn test_output_dir_writable() {
        let dir = tempfile::tempdir().unwrap();
        check_output_dir(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_dir_not_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(check_output_dir(file.path()).is_err());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            elements: 10,
            nodes: 8,
            dropped: 2,
            snapshots: SnapshotStats {
                written: 20,
                filtered: 4,
                errors: 1,
                duplicates: 0,
            },
        };
        let text = summary.to_string();
        assert!(text.starts_with("10 elements, 8 nodes (2 dropped)"));
        assert!(text.contains("1 skipped on filter errors, 0 skipped"));
    }
}

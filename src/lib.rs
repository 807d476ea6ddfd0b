//! # cebaf-graph: accelerator graph snapshots from archived channel data
//!
//! Builds a directed graph of beamline elements (setpoints and readbacks)
//! from the CED inventory, samples their EPICS channels from the MYA
//! archiver over configured date spans, and writes one labeled graph per
//! timestamp for downstream graph learning.
//!
//! ## Architecture
//!
//! - **Service**: blocking HTTP clients for the inventory and the archiver,
//!   behind traits so runs can be driven from in-memory sources
//! - **Hierarchy**: lazily fetched type tree answering descendant queries
//! - **Graph**: element classification, channel naming, link building and
//!   the replay codec
//! - **Sampler**: throttled, chunked archiver requests merged into one batch
//! - **Expr**: Rhai-based filter rules and per-channel value modifiers
//! - **Output**: per-timestamp snapshot directories of tab-separated files
//! - **Pipeline**: collect, replay and write stages tied together
//!
//! ## Example
//!
//! ```no_run
//! use cebaf_graph::{pipeline, RunConfig, RunOptions};
//!
//! fn main() -> cebaf_graph::Result<()> {
//!     let config = RunConfig::load("config.yaml")?;
//!     let summary = pipeline::run(&config, &RunOptions::default(), None)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
pub mod hierarchy;
pub mod output;
pub mod pipeline;
pub mod sampler;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{GraphError, Result, ResultExt};
pub use graph::{GraphNode, NodeId, NodeKind, NodeList};
pub use pipeline::{RunOptions, RunSummary, Services};
pub use types::{DateSpan, Element, SampleRow, UNDEFINED};

//! Configuration module for cebaf-graph
//!
//! A run is described by one config file, YAML (`.yaml`/`.yml`) or TOML
//! (`.toml`), with these sections:
//!
//! - `ced` - which inventory elements to fetch
//! - `mya` - which dates to sample, throttles, and global channels
//! - `nodes` - which element types become setpoint/readback nodes and
//!   which channel fields each one samples
//! - `edges` - link hop distance
//! - `filter` / `modifiers` - snapshot gating rule and value formulas
//! - `output` - directory addressing scheme
//!
//! # Example
//!
//! ```yaml
//! ced:
//!   zone: Injector
//!   types: [Magnet, BPM]
//! mya:
//!   begin: 2021-11-01
//!   end: 2021-11-02
//!   interval: 1h
//!   global: [IBC0L02Current]
//! nodes:
//!   setpoints:
//!     Quad: [.BDL]
//!   readbacks:
//!     BPM: [.XPOS, .YPOS]
//! filter: "$(IBC0L02Current) > 0.1"
//! ```

mod dates;

pub use dates::date_spans_from_file;

use crate::error::{GraphError, Result};
use crate::graph::ExceptionTable;
use crate::output::OutputLayout;
use crate::types::DateSpan;
use chrono_tz::Tz;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default inventory service base URL
pub const DEFAULT_CED_URL: &str = "https://ced.acc.jlab.org";

/// Default archiver sampling endpoint
pub const DEFAULT_MYA_URL: &str = "https://myaweb.acc.jlab.org/mySampler/data";

/// Default archiver deployment
pub const DEFAULT_DEPLOYMENT: &str = "history";

/// Default limit on data points (steps x channels) per archiver request
pub const DEFAULT_THROTTLE: usize = 10_000;

/// Default limit on channels per archiver request
pub const DEFAULT_CHANNEL_LIMIT: usize = 100;

/// Timezone the archiver reports wall-clock times in
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Complete configuration for one graph generation run
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub ced: CedConfig,

    pub mya: MyaConfig,

    pub nodes: NodesConfig,

    #[serde(default)]
    pub edges: EdgesConfig,

    /// Gating rule evaluated against global channel values
    #[serde(default)]
    pub filter: Option<String>,

    /// Per-channel value formulas, keyed by channel name
    #[serde(default)]
    pub modifiers: BTreeMap<String, String>,

    #[serde(default)]
    pub output: OutputConfig,

    /// Directory relative paths (such as `mya.dates_file`) resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

impl RunConfig {
    /// Load a config file, picking the parser from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_yaml(&content)?,
        };
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GraphError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Parse a TOML config
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GraphError::Config(format!("Failed to parse TOML config: {}", e)))
    }

    /// Check the parts of the config that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.nodes.setpoints.is_empty() && self.nodes.readbacks.is_empty() {
            return Err(GraphError::Config(
                "nodes.setpoints and nodes.readbacks are both empty".to_string(),
            ));
        }
        if self.mya.throttle == 0 || self.mya.channel_limit == 0 {
            return Err(GraphError::Config(
                "mya.throttle and mya.channel_limit must be positive".to_string(),
            ));
        }
        self.mya.timezone()?;
        let resolution = self.output.resolution();
        for span in self.spans()? {
            if !span.is_instant() && span.interval().duration() < resolution {
                return Err(GraphError::Config(format!(
                    "Interval {} is finer than the {}s output directory resolution; \
                     enable output.minute or output.second, or use the flat layout",
                    span.interval(),
                    resolution.as_secs()
                )));
            }
        }
        Ok(())
    }

    /// All sampling spans in declaration order
    pub fn spans(&self) -> Result<Vec<DateSpan>> {
        self.mya.spans(&self.base_dir)
    }
}

// ==================== CED ====================

/// Inventory query settings
#[derive(Debug, Clone, Deserialize)]
pub struct CedConfig {
    /// Zone to query (e.g. `Injector`)
    pub zone: String,

    /// Element types to fetch
    pub types: Vec<String>,

    /// Properties wanted beyond the built-in `S` and `EPICSName`
    #[serde(default)]
    pub properties: Vec<String>,

    /// Property filter expressions (e.g. `S > 0.5`)
    #[serde(default)]
    pub expressions: Vec<String>,

    #[serde(default = "default_ced_url")]
    pub url: String,
}

fn default_ced_url() -> String {
    DEFAULT_CED_URL.to_string()
}

// ==================== Mya ====================

/// Archiver sampling settings
#[derive(Debug, Clone, Deserialize)]
pub struct MyaConfig {
    #[serde(default)]
    pub begin: Option<String>,

    #[serde(default)]
    pub end: Option<String>,

    #[serde(default)]
    pub interval: Option<String>,

    /// Additional spans
    #[serde(default)]
    pub dates: Vec<DateSpan>,

    /// CSV file of instants or spans
    #[serde(default)]
    pub dates_file: Option<PathBuf>,

    #[serde(default = "default_deployment")]
    pub deployment: String,

    /// Maximum data points (steps x channels) per request
    #[serde(default = "default_throttle")]
    pub throttle: usize,

    /// Maximum channels per request
    #[serde(default = "default_channel_limit")]
    pub channel_limit: usize,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Channels sampled for the filter and `globals.json`
    #[serde(default)]
    pub global: Vec<String>,

    #[serde(default = "default_mya_url")]
    pub url: String,
}

fn default_deployment() -> String {
    DEFAULT_DEPLOYMENT.to_string()
}

fn default_throttle() -> usize {
    DEFAULT_THROTTLE
}

fn default_channel_limit() -> usize {
    DEFAULT_CHANNEL_LIMIT
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_mya_url() -> String {
    DEFAULT_MYA_URL.to_string()
}

impl MyaConfig {
    /// Resolve the configured timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| GraphError::Config(format!("Unknown timezone '{}': {}", self.timezone, e)))
    }

    /// Collect spans from `begin`/`end`, `dates` and `dates_file`, in that order
    pub fn spans(&self, base_dir: &Path) -> Result<Vec<DateSpan>> {
        let mut spans = Vec::new();

        match (&self.begin, &self.end) {
            (Some(begin), Some(end)) => {
                let interval = self.interval.as_deref().unwrap_or("1h");
                spans.push(DateSpan::parse(begin, end, interval)?);
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(GraphError::DateSpan(
                    "mya.begin and mya.end must be given together".to_string(),
                ));
            }
            (None, None) => {}
        }

        spans.extend(self.dates.iter().cloned());

        if let Some(ref file) = self.dates_file {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            spans.extend(date_spans_from_file(path)?);
        }

        if spans.is_empty() {
            return Err(GraphError::DateSpan(
                "No sampling dates configured (mya.begin/end, mya.dates or mya.dates_file)"
                    .to_string(),
            ));
        }
        Ok(spans)
    }
}

// ==================== Nodes ====================

/// Fields to sample for one configured type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFields {
    pub type_name: String,
    pub fields: Vec<String>,
}

/// Ordered mapping of type name to field list.
///
/// Declaration order decides which rule wins when an element matches
/// several configured types, so this cannot be a hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFieldTable(Vec<TypeFields>);

impl TypeFieldTable {
    pub fn new(entries: Vec<TypeFields>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeFields> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for TypeFieldTable {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = TypeFieldTable;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a mapping of type name to a list of fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((type_name, fields)) =
                    map.next_entry::<String, Option<Vec<String>>>()?
                {
                    entries.push(TypeFields {
                        type_name,
                        fields: fields.unwrap_or_default(),
                    });
                }
                Ok(TypeFieldTable(entries))
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(TypeFieldTable::default())
            }
        }

        d.deserialize_any(TableVisitor)
    }
}

/// Synthetic node linking to every setpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    #[serde(default = "default_master_name")]
    pub name: String,

    /// Full channel names sampled as the master node's attributes
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_master_name() -> String {
    "MASTER".to_string()
}

/// Node classification settings
#[derive(Debug, Clone, Deserialize)]
pub struct NodesConfig {
    #[serde(default)]
    pub setpoints: TypeFieldTable,

    #[serde(default)]
    pub readbacks: TypeFieldTable,

    #[serde(default)]
    pub master: Option<MasterConfig>,

    /// Attribute label used for the bare-name (`""`) field
    #[serde(default = "default_label")]
    pub default_label: String,

    #[serde(default)]
    pub exceptions: ExceptionTable,
}

fn default_label() -> String {
    "value".to_string()
}

// ==================== Edges / Output ====================

/// Link settings
#[derive(Debug, Clone, Deserialize)]
pub struct EdgesConfig {
    /// Setpoint hops spanned by each written edge list
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,
}

fn default_connectivity() -> usize {
    1
}

impl Default for EdgesConfig {
    fn default() -> Self {
        Self {
            connectivity: default_connectivity(),
        }
    }
}

/// Output directory settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub layout: OutputLayout,

    /// Add a minute level to hierarchical paths
    #[serde(default)]
    pub minute: bool,

    /// Add a second level to hierarchical paths (implies minute)
    #[serde(default)]
    pub second: bool,
}

impl OutputConfig {
    /// Smallest time step that gets its own snapshot directory
    pub fn resolution(&self) -> Duration {
        match self.layout {
            OutputLayout::Flat => Duration::from_secs(1),
            OutputLayout::Hierarchical if self.second => Duration::from_secs(1),
            OutputLayout::Hierarchical if self.minute => Duration::from_secs(60),
            OutputLayout::Hierarchical => Duration::from_secs(3600),
        }
    }
}

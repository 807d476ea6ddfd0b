//! Snapshot output
//!
//! Each retained timestamp gets its own directory holding one graph in
//! tab-separated text:
//!
//! - `meta.dat` - node total and per-type node counts
//! - `node.dat` - `NODE, NAME, TYPE, VALUES` per node
//! - `link.dat` - `START, END, LINK_TYPE, LINK_WEIGHT` per edge
//! - `info.dat` / `label.dat` - `TYPE, NAME, LABELS` per node type
//! - `globals.json` - global channel values at the timestamp
//!
//! Directories are addressed either hierarchically
//! (`2021/11/01/23[/MM[/SS]]`) or flat (`20211101_230000`).

mod writer;

pub use writer::{SnapshotStats, SnapshotWriter, TypeIndex};

use crate::config::OutputConfig;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory addressing scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// `year/month/day/hour`, optionally `/minute[/second]`
    #[default]
    Hierarchical,
    /// `YYYYMMDD_HHMMSS`
    Flat,
}

/// Directory for the snapshot taken at `timestamp`
pub fn snapshot_dir(root: &Path, timestamp: NaiveDateTime, config: &OutputConfig) -> PathBuf {
    match config.layout {
        OutputLayout::Flat => root.join(timestamp.format("%Y%m%d_%H%M%S").to_string()),
        OutputLayout::Hierarchical => {
            let mut dir = root
                .join(format!("{:04}", timestamp.year()))
                .join(format!("{:02}", timestamp.month()))
                .join(format!("{:02}", timestamp.day()))
                .join(format!("{:02}", timestamp.hour()));
            if config.minute || config.second {
                dir = dir.join(format!("{:02}", timestamp.minute()));
            }
            if config.second {
                dir = dir.join(format!("{:02}", timestamp.second()));
            }
            dir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;

    fn config(layout: OutputLayout, minute: bool, second: bool) -> OutputConfig {
        OutputConfig {
            layout,
            minute,
            second,
        }
    }

    #[test]
    fn test_hierarchical_paths() {
        let root = Path::new(".");
        let hourly = config(OutputLayout::Hierarchical, false, false);
        for (ts, expected) in [
            ("2001-11-01", "./2001/11/01/00"),
            ("2001-11-1", "./2001/11/01/00"),
            ("2001-11-01 23:00", "./2001/11/01/23"),
        ] {
            let dir = snapshot_dir(root, parse_timestamp(ts).unwrap(), &hourly);
            assert_eq!(dir, PathBuf::from(expected));
        }
    }

    #[test]
    fn test_minute_and_second_levels() {
        let root = Path::new("out");
        let ts = parse_timestamp("2022-01-09 18:43:45").unwrap();
        assert_eq!(
            snapshot_dir(root, ts, &config(OutputLayout::Hierarchical, true, false)),
            PathBuf::from("out/2022/01/09/18/43")
        );
        assert_eq!(
            snapshot_dir(root, ts, &config(OutputLayout::Hierarchical, false, true)),
            PathBuf::from("out/2022/01/09/18/43/45")
        );
    }

    #[test]
    fn test_flat_path() {
        let ts = parse_timestamp("2022-01-09 18:43:45").unwrap();
        let dir = snapshot_dir(Path::new("out"), ts, &config(OutputLayout::Flat, false, false));
        assert_eq!(dir, PathBuf::from("out/20220109_184345"));
    }
}

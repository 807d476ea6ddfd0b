//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod sources;

use cebaf_graph::types::parse_timestamp;
use chrono::NaiveDateTime;
use std::path::Path;

/// Parse a timestamp literal, panicking on bad input
pub fn ts(text: &str) -> NaiveDateTime {
    parse_timestamp(text).unwrap()
}

/// Read a snapshot file as lines
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", path, e))
        .lines()
        .map(str::to_string)
        .collect()
}

/// Sorted names of the entries directly under `dir`
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

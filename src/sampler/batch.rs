//! Merged sample rows for a set of channels

use crate::types::{SampleRow, UNDEFINED};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Sample rows keyed by timestamp, one value per requested channel.
///
/// Rows from separate requests are merged by timestamp. A wall-clock
/// timestamp that repeats within one request (the DST fall-back hour) is
/// kept as separate rows: the n-th occurrence of a timestamp merges with
/// the n-th occurrence already recorded.
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    rows: Vec<SampleRow>,
    index: HashMap<(NaiveDateTime, usize), usize>,
}

impl SampleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge rows fetched for one channel group.
    ///
    /// Channels in `channels` that a row lacks are recorded as [`UNDEFINED`].
    pub fn merge(&mut self, rows: Vec<SampleRow>, channels: &[String]) {
        let mut occurrences: HashMap<NaiveDateTime, usize> = HashMap::new();

        for mut row in rows {
            for channel in channels {
                row.values
                    .entry(channel.clone())
                    .or_insert_with(|| UNDEFINED.to_string());
            }

            let occurrence = occurrences.entry(row.timestamp).or_insert(0);
            let key = (row.timestamp, *occurrence);
            *occurrence += 1;

            match self.index.get(&key) {
                Some(&i) => self.rows[i].values.extend(row.values),
                None => {
                    self.index.insert(key, self.rows.len());
                    self.rows.push(row);
                }
            }
        }
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    /// Rows restricted to `channels`, in batch order
    pub fn project(&self, channels: &[String]) -> Vec<SampleRow> {
        self.rows
            .iter()
            .map(|row| SampleRow {
                timestamp: row.timestamp,
                values: channels
                    .iter()
                    .map(|ch| (ch.clone(), row.value(ch).to_string()))
                    .collect(),
            })
            .collect()
    }

    pub fn into_rows(self) -> Vec<SampleRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

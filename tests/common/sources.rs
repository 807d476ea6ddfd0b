//! In-memory stand-ins for the upstream services

use cebaf_graph::hierarchy::TypeTree;
use cebaf_graph::service::{
    ChannelDataSource, InventoryQuery, InventorySource, SampleRequest, TypeTreeSource,
};
use cebaf_graph::types::Interval;
use cebaf_graph::{Element, Result, SampleRow, Services};
use chrono::{Duration, NaiveDateTime};
use std::sync::{Arc, Mutex};

/// Returns a fixed element list
pub struct FixedInventory(pub Vec<Element>);

impl InventorySource for FixedInventory {
    fn query_elements(&self, _query: &InventoryQuery) -> Result<Vec<Element>> {
        Ok(self.0.clone())
    }
}

/// Returns a fixed type tree
pub struct FixedTypeTree(pub TypeTree);

impl TypeTreeSource for FixedTypeTree {
    fn fetch_type_tree(&self) -> Result<TypeTree> {
        Ok(self.0.clone())
    }
}

type ValueFn = dyn Fn(&str, NaiveDateTime) -> Option<String>;

/// Archiver computing each value from channel name and timestamp,
/// recording every request it serves
pub struct ScriptedArchiver {
    value: Box<ValueFn>,
    requests: Arc<Mutex<Vec<SampleRequest>>>,
}

impl ScriptedArchiver {
    pub fn new(value: impl Fn(&str, NaiveDateTime) -> Option<String> + 'static) -> Self {
        Self {
            value: Box::new(value),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the requests served so far
    pub fn requests(&self) -> Arc<Mutex<Vec<SampleRequest>>> {
        self.requests.clone()
    }
}

impl ChannelDataSource for ScriptedArchiver {
    fn fetch_channel_data(&self, request: &SampleRequest) -> Result<Vec<SampleRow>> {
        self.requests.lock().unwrap().push(request.clone());
        let interval = Interval::parse(&request.interval)?;
        let step = Duration::from_std(interval.duration()).unwrap();
        Ok((0..request.steps)
            .map(|i| {
                let timestamp = request.begin + step * i as i32;
                let mut row = SampleRow::new(timestamp);
                for channel in &request.channels {
                    if let Some(value) = (self.value)(channel, timestamp) {
                        row.values.insert(channel.clone(), value);
                    }
                }
                row
            })
            .collect())
    }
}

/// Services over the given inventory, tree and archiver
pub fn services(elements: Vec<Element>, tree: TypeTree, archiver: ScriptedArchiver) -> Services {
    Services {
        inventory: Box::new(FixedInventory(elements)),
        types: Box::new(FixedTypeTree(tree)),
        data: Box::new(archiver),
    }
}

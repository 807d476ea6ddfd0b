//! Upstream services
//!
//! Three remote collaborators feed a run:
//!
//! - the inventory service, listing elements of a zone ([`InventorySource`])
//! - the catalog, providing the type hierarchy ([`TypeTreeSource`])
//! - the archiver sampler, providing channel values ([`ChannelDataSource`])
//!
//! Each is reached through a trait so runs can be replayed from saved files
//! and tested without the network. [`CedClient`] and [`MyaClient`] are the
//! HTTP implementations.

mod ced;
mod mya;

pub use ced::CedClient;
pub use mya::MyaClient;

use crate::config::CedConfig;
use crate::error::Result;
use crate::hierarchy::TypeTree;
use crate::types::{Element, SampleRow};
use chrono::NaiveDateTime;
use std::time::Duration;

/// Timeout applied to every upstream request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Properties always requested from the inventory service.
///
/// `S` orders elements along the beamline; `EPICSName` is needed to build
/// channel names.
pub const BASE_PROPERTIES: [&str; 2] = ["S", "EPICSName"];

/// An inventory query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryQuery {
    pub zone: String,
    pub types: Vec<String>,
    /// Base properties followed by extra ones, without duplicates
    pub properties: Vec<String>,
    pub expressions: Vec<String>,
}

impl InventoryQuery {
    pub fn new(
        zone: impl Into<String>,
        types: Vec<String>,
        extra_properties: &[String],
        expressions: Vec<String>,
    ) -> Self {
        let mut properties: Vec<String> = BASE_PROPERTIES.iter().map(|p| p.to_string()).collect();
        for extra in extra_properties {
            if !properties.contains(extra) {
                properties.push(extra.clone());
            }
        }
        Self {
            zone: zone.into(),
            types,
            properties,
            expressions,
        }
    }

    pub fn from_config(config: &CedConfig) -> Self {
        Self::new(
            config.zone.clone(),
            config.types.clone(),
            &config.properties,
            config.expressions.clone(),
        )
    }
}

/// One archiver request: `steps` samples spaced by `interval` from `begin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    pub channels: Vec<String>,
    /// Wall-clock begin time in the archiver's timezone
    pub begin: NaiveDateTime,
    /// Interval as the archiver spells it (e.g. `1h`)
    pub interval: String,
    pub steps: usize,
    pub deployment: String,
}

/// Source of inventory elements
pub trait InventorySource {
    /// Fetch elements, in beamline order
    fn query_elements(&self, query: &InventoryQuery) -> Result<Vec<Element>>;
}

/// Source of the type hierarchy
pub trait TypeTreeSource {
    fn fetch_type_tree(&self) -> Result<TypeTree>;
}

/// Source of sampled channel values
#[cfg_attr(test, mockall::automock)]
pub trait ChannelDataSource {
    /// Fetch one chunk of samples.
    ///
    /// Rows come back in time order; a channel the archiver had nothing for
    /// may be absent from a row.
    fn fetch_channel_data(&self, request: &SampleRequest) -> Result<Vec<SampleRow>>;
}

//! Time-series sampling
//!
//! [`Sampler::fetch`] turns a channel set and a list of spans into a
//! [`SampleBatch`]:
//!
//! 1. Channels are deduplicated, sorted, and split into groups of at most
//!    `channel_limit`.
//! 2. Each span is split into request windows so that
//!    `steps x group size` never exceeds the data throttle
//!    (see [`plan_chunks`]).
//! 3. Responses are merged by timestamp; channels absent from a response
//!    are recorded as [`UNDEFINED`](crate::types::UNDEFINED).
//!
//! Requests are issued sequentially in group, span, window order.

mod batch;
mod steps;

pub use batch::SampleBatch;
pub use steps::{
    localize, max_steps_per_request, plan_chunks, steps_between, steps_between_instants,
    steps_per_chunk, Chunk,
};

use crate::config::MyaConfig;
use crate::error::{GraphError, Result, ResultExt};
use crate::service::{ChannelDataSource, SampleRequest};
use crate::types::DateSpan;
use chrono_tz::Tz;
use std::collections::BTreeSet;

/// Request limits and archiver settings
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    /// Maximum data points (steps x channels) per request
    pub throttle: usize,
    /// Maximum channels per request
    pub channel_limit: usize,
    pub deployment: String,
    pub timezone: Tz,
}

impl SamplerSettings {
    pub fn from_config(config: &MyaConfig) -> Result<Self> {
        Ok(Self {
            throttle: config.throttle,
            channel_limit: config.channel_limit,
            deployment: config.deployment.clone(),
            timezone: config.timezone()?,
        })
    }
}

/// Fetches channel values from a [`ChannelDataSource`] within request limits
pub struct Sampler {
    source: Box<dyn ChannelDataSource>,
    settings: SamplerSettings,
}

impl Sampler {
    pub fn new(source: Box<dyn ChannelDataSource>, settings: SamplerSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Split channels into request groups, deduplicated and sorted
    fn channel_groups(&self, channels: &[String]) -> Result<Vec<Vec<String>>> {
        let unique: BTreeSet<&String> = channels.iter().collect();
        if unique.is_empty() {
            return Err(GraphError::NoChannels);
        }
        let limit = self.settings.channel_limit.max(1);
        let sorted: Vec<String> = unique.into_iter().cloned().collect();
        Ok(sorted.chunks(limit).map(<[String]>::to_vec).collect())
    }

    /// Fetch every channel over every span
    pub fn fetch(&self, channels: &[String], spans: &[DateSpan]) -> Result<SampleBatch> {
        let groups = self.channel_groups(channels)?;
        for group in &groups {
            max_steps_per_request(self.settings.throttle, group.len())?;
        }

        let mut batch = SampleBatch::new();
        for (index, group) in groups.iter().enumerate() {
            tracing::debug!(
                "Fetching channel group {}/{} ({} channels)",
                index + 1,
                groups.len(),
                group.len()
            );

            let mut rows = Vec::new();
            for span in spans {
                let chunks = plan_chunks(
                    span,
                    self.settings.throttle,
                    group.len(),
                    self.settings.timezone,
                )?;
                for chunk in chunks {
                    let request = SampleRequest {
                        channels: group.clone(),
                        begin: chunk.begin,
                        interval: span.interval().as_str().to_string(),
                        steps: chunk.steps,
                        deployment: self.settings.deployment.clone(),
                    };
                    let fetched = self
                        .source
                        .fetch_channel_data(&request)
                        .with_context(|| format!("Sampling from {}", chunk.begin))?;
                    tracing::trace!("Received {} rows from {}", fetched.len(), chunk.begin);
                    rows.extend(fetched);
                }
            }
            batch.merge(rows, group);
        }

        tracing::info!(
            "Sampled {} channels at {} timestamps",
            groups.iter().map(Vec::len).sum::<usize>(),
            batch.len()
        );
        Ok(batch)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("settings", &self.settings)
            .finish()
    }
}

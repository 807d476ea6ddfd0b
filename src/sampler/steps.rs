//! Calendar arithmetic for sampling windows
//!
//! Step counts are computed between timezone-aware instants so that a
//! calendar day holds 23, 24 or 25 one-hour steps depending on daylight
//! saving transitions.

use crate::error::{GraphError, Result};
use crate::types::{DateSpan, Interval};
use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// A planned archiver request window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Wall-clock begin time
    pub begin: NaiveDateTime,
    pub steps: usize,
}

/// Attach `tz` to a wall-clock time.
///
/// Ambiguous times (fall-back) resolve to the earlier instant. Times inside
/// a spring-forward gap are shifted forward by one hour, so 02:30 on the
/// transition day becomes 03:30.
pub fn localize(tz: Tz, wall: NaiveDateTime) -> Result<DateTime<Tz>> {
    match tz.from_local_datetime(&wall) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(wall + ChronoDuration::hours(1)))
            .earliest()
            .ok_or_else(|| {
                GraphError::DateSpan(format!("{} does not exist in timezone {}", wall, tz))
            }),
    }
}

fn chrono_interval(interval: &Interval) -> Result<ChronoDuration> {
    ChronoDuration::from_std(interval.duration())
        .map_err(|e| GraphError::DateSpan(format!("Interval {} out of range: {}", interval, e)))
}

/// Whole interval-sized steps between two instants.
///
/// Equal instants always yield exactly one step.
pub fn steps_between_instants(
    begin: DateTime<Tz>,
    end: DateTime<Tz>,
    interval: &Interval,
) -> Result<usize> {
    if begin == end {
        return Ok(1);
    }
    let elapsed = (end - begin).abs();
    let step = chrono_interval(interval)?;
    let step_ms = step.num_milliseconds().max(1);
    Ok((elapsed.num_milliseconds() / step_ms) as usize)
}

/// Whole interval-sized steps between two wall-clock times in `tz`
pub fn steps_between(
    begin: NaiveDateTime,
    end: NaiveDateTime,
    interval: &Interval,
    tz: Tz,
) -> Result<usize> {
    if begin == end {
        return Ok(1);
    }
    steps_between_instants(localize(tz, begin)?, localize(tz, end)?, interval)
}

/// Steps per request allowed by the data throttle
pub fn max_steps_per_request(throttle: usize, channel_count: usize) -> Result<usize> {
    if channel_count == 0 {
        return Err(GraphError::NoChannels);
    }
    let max_steps = throttle / channel_count;
    if max_steps == 0 {
        return Err(GraphError::Throttle(format!(
            "{} channels exceed the throttle of {} data points per request",
            channel_count, throttle
        )));
    }
    Ok(max_steps)
}

/// The lesser of the throttle allowance and the steps remaining until `end`
pub fn steps_per_chunk(
    from: DateTime<Tz>,
    end: DateTime<Tz>,
    interval: &Interval,
    throttle: usize,
    channel_count: usize,
) -> Result<usize> {
    let max_steps = max_steps_per_request(throttle, channel_count)?;
    let remaining = steps_between_instants(from, end, interval)?;
    Ok(remaining.min(max_steps))
}

/// Split a span into sequential request windows that respect the throttle.
///
/// The window ending at the span's end instant is always included, so a
/// one-day span at `1h` plans 25 samples (both midnights).
pub fn plan_chunks(
    span: &DateSpan,
    throttle: usize,
    channel_count: usize,
    tz: Tz,
) -> Result<Vec<Chunk>> {
    let step = chrono_interval(span.interval())?;
    let end = localize(tz, span.end())?;
    let mut cursor = localize(tz, span.begin())?;
    let mut chunks = Vec::new();

    while cursor <= end {
        // Never plan an empty window; a partial step still yields one sample.
        let steps = steps_per_chunk(cursor, end, span.interval(), throttle, channel_count)?.max(1);
        chunks.push(Chunk {
            begin: cursor.naive_local(),
            steps,
        });
        cursor = cursor + step * steps as i32;
    }
    Ok(chunks)
}

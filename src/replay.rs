//! Producer side: turns a CSV export of the smoker controller into queue messages.

use crate::engine::ShutdownHandle;
use crate::error::ReplayError;
use crate::ingress::Envelope;
use crate::queue::StreamQueues;
use crate::sensor::SensorStream;
use spdlog::{debug, error, info, warn};
use std::io::BufRead;
use std::time::Duration;

/// One CSV row: a timestamp and up to one temperature per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub timestamp: String,
    pub smoker: Option<f64>,
    pub food_a: Option<f64>,
    pub food_b: Option<f64>,
}

impl SensorRow {
    pub fn value(&self, stream: SensorStream) -> Option<f64> {
        match stream {
            SensorStream::Smoker => self.smoker,
            SensorStream::FoodA => self.food_a,
            SensorStream::FoodB => self.food_b,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub rows: usize,
    pub published: usize,
    pub skipped: usize,
}

/// Splits a `timestamp,smoker,foodA,foodB` line.
///
/// Returns `None` for lines without a timestamp. Blank cells become `None`;
/// cells that are not numbers are counted in `skipped`.
pub fn parse_row(line: &str, skipped: &mut usize) -> Option<SensorRow> {
    let mut cells = line.trim_end_matches(['\r', '\n']).split(',').map(str::trim);
    let timestamp = cells.next().filter(|t| !t.is_empty())?.to_string();

    let mut parse_cell = |cell: Option<&str>| -> Option<f64> {
        let cell = cell.filter(|c| !c.is_empty())?;
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                warn!("[Replay] Skipping non-numeric cell `{}` at {}", cell, timestamp);
                *skipped += 1;
                None
            }
        }
    };

    let smoker = parse_cell(cells.next());
    let food_a = parse_cell(cells.next());
    let food_b = parse_cell(cells.next());
    Some(SensorRow {
        timestamp,
        smoker,
        food_a,
        food_b,
    })
}

/// Publishes every row of `input` to the stream queues, pausing `interval`
/// between rows. The first line is a header and is skipped.
///
/// Stops early, without error, when `shutdown` is requested. Queues are
/// flushed on every exit path, so rows published before a failure are kept.
pub fn replay_csv<R: BufRead>(
    input: R,
    queues: &mut StreamQueues,
    interval: Duration,
    shutdown: &ShutdownHandle,
) -> Result<ReplayStats, ReplayError> {
    let mut stats = ReplayStats::default();
    let replayed = replay_rows(input, queues, interval, shutdown, &mut stats);
    let flushed = queues.flush();
    match (replayed, flushed) {
        (Err(e), Err(flush_err)) => {
            error!("[Replay] Failed to flush queues after error: {}", flush_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), flushed) => {
            flushed?;
            info!(
                "[Replay] Finished: {} rows, {} messages published, {} cells skipped",
                stats.rows, stats.published, stats.skipped
            );
            Ok(stats)
        }
    }
}

fn replay_rows<R: BufRead>(
    input: R,
    queues: &mut StreamQueues,
    interval: Duration,
    shutdown: &ShutdownHandle,
    stats: &mut ReplayStats,
) -> Result<(), ReplayError> {
    let mut lines = input.lines();
    if lines.next().transpose()?.is_none() {
        info!("[Replay] Input is empty");
        return Ok(());
    }

    for line in lines {
        let line = line?;
        if shutdown.is_requested() {
            info!("[Replay] Shutdown requested, stopping after {} rows", stats.rows);
            break;
        }
        let Some(row) = parse_row(&line, &mut stats.skipped) else {
            debug!("[Replay] Skipping row without timestamp: {:?}", line);
            continue;
        };
        if stats.rows > 0 && !interval.is_zero() && !shutdown.sleep(interval) {
            info!("[Replay] Shutdown requested, stopping after {} rows", stats.rows);
            break;
        }

        stats.published += publish_row(&row, queues)?;
        stats.rows += 1;
    }
    Ok(())
}

/// Publishes all of a row's cells or none of them.
fn publish_row(row: &SensorRow, queues: &mut StreamQueues) -> Result<usize, ReplayError> {
    let mut messages = Vec::with_capacity(SensorStream::ALL.len());
    for stream in SensorStream::ALL {
        let Some(value) = row.value(stream) else {
            continue;
        };
        let payload = Envelope::new(row.timestamp.as_str(), value).encode()?;
        queues.get(stream).check_publish(&payload)?;
        messages.push((stream, payload));
    }

    for (stream, payload) in &messages {
        queues.publish(*stream, payload)?;
        info!("[Replay] [x] Sent {} to {}", String::from_utf8_lossy(payload), stream);
    }
    Ok(messages.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_row() {
        let mut skipped = 0;
        let row = parse_row("03/07/24 14:30:00,212.5,150.1,149.8", &mut skipped).unwrap();
        assert_eq!(row.timestamp, "03/07/24 14:30:00");
        assert_eq!(row.smoker, Some(212.5));
        assert_eq!(row.food_a, Some(150.1));
        assert_eq!(row.food_b, Some(149.8));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_parse_blank_and_missing_cells() {
        let mut skipped = 0;
        let row = parse_row("03/07/24 14:30:30,211,,\r\n", &mut skipped).unwrap();
        assert_eq!(row.smoker, Some(211.0));
        assert_eq!(row.food_a, None);
        assert_eq!(row.food_b, None);

        let short = parse_row("03/07/24 14:31:00,210", &mut skipped).unwrap();
        assert_eq!(short.food_b, None);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_parse_counts_bad_cells() {
        let mut skipped = 0;
        let row = parse_row("t,abc,NaN,150", &mut skipped).unwrap();
        assert_eq!(row.smoker, None);
        assert_eq!(row.food_a, None);
        assert_eq!(row.food_b, Some(150.0));
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_parse_requires_timestamp() {
        let mut skipped = 0;
        assert_eq!(parse_row(",1,2,3", &mut skipped), None);
        assert_eq!(parse_row("", &mut skipped), None);
    }
}

// src/location/replay.rs
//! Replay of recorded samples from a JSON-lines file

use super::{sample::PositionSample, LocationSubscription, SAMPLE_CHANNEL_CAPACITY};
use crate::error::{Result, TrackerError};
use std::{path::Path, time::Duration};
use tokio::{sync::mpsc, time::sleep};
use tracing::{info, warn};

/// Parse replay file contents. Blank lines and `#` comments are skipped.
pub fn parse_samples(contents: &str) -> Result<Vec<PositionSample>> {
    contents
        .lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| TrackerError::Parse(format!("replay line {}: {}", n + 1, e)))
        })
        .collect()
}

/// Wait before emitting a sample recorded `gap` seconds after the previous
/// one. `None` when pacing is off, the gap is not positive, or the scaled
/// gap does not fit in a `Duration`.
fn pacing_delay(gap: f64, speed: f64) -> Option<Duration> {
    if speed <= 0.0 || gap <= 0.0 {
        return None;
    }
    match Duration::try_from_secs_f64(gap / speed) {
        Ok(delay) => Some(delay),
        Err(e) => {
            warn!(gap, speed, "replay gap not paced: {}", e);
            None
        }
    }
}

/// Stream the file's samples, sleeping for the recorded gap divided by
/// `speed` between consecutive samples. `speed <= 0` disables pacing.
pub async fn subscribe(path: &Path, speed: f64) -> Result<LocationSubscription> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TrackerError::from_source_io(&format!("replay file {}", path.display()), e))?;
    let samples = parse_samples(&contents)?;
    info!("Replaying {} samples from {}", samples.len(), path.display());

    let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut previous: Option<PositionSample> = None;
        for sample in samples {
            if let Some(prev) = previous {
                if let Some(delay) = pacing_delay(sample.seconds_since(&prev), speed) {
                    sleep(delay).await;
                }
            }
            if tx.send(sample).await.is_err() {
                warn!("replay receiver dropped");
                break;
            }
            previous = Some(sample);
        }
    });

    Ok(LocationSubscription::new(rx, task))
}

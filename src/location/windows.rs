// src/location/windows.rs
//! Windows Location Services integration

use super::{sample::PositionSample, LocationSubscription, SAMPLE_CHANNEL_CAPACITY};
use crate::error::{Result, TrackerError};
use chrono::Utc;
use std::time::Duration;
use tokio::{sync::mpsc, time::sleep};
use tracing::{info, warn};
use windows::{Devices::Geolocation::*, Foundation::*};

/// Ask the user for location access
pub async fn request_location_access() -> Result<()> {
    let access_status = Geolocator::RequestAccessAsync()?.await?;

    match access_status {
        GeolocationAccessStatus::Allowed => {
            info!("Location access granted");
            Ok(())
        }
        GeolocationAccessStatus::Denied => Err(TrackerError::PermissionDenied(
            "Location access denied by user".to_string(),
        )),
        GeolocationAccessStatus::Unspecified => Err(TrackerError::PermissionDenied(
            "Location access unspecified".to_string(),
        )),
        _ => Err(TrackerError::Other("Unknown location access status".to_string())),
    }
}

/// Create and configure a Windows Geolocator
pub fn create_geolocator(accuracy: u32) -> Result<Geolocator> {
    let geolocator = Geolocator::new()?;

    let desired_accuracy = match accuracy {
        0..=100 => PositionAccuracy::High,
        _ => PositionAccuracy::Default,
    };
    geolocator.SetDesiredAccuracy(desired_accuracy)?;

    // Report after one meter of movement
    geolocator.SetMovementThreshold(1.0)?;

    Ok(geolocator)
}

/// Get current position from Windows Location Services
pub async fn get_position(geolocator: &Geolocator) -> Result<Geoposition> {
    // 10 seconds in 100ns units
    let timeout = TimeSpan {
        Duration: 10_000_000 * 10,
    };

    let position = geolocator
        .GetGeopositionAsyncWithAgeAndTimeout(timeout, timeout)?
        .await?;

    Ok(position)
}

/// Convert a Windows Geoposition into a sample
pub fn sample_from_position(position: &Geoposition) -> Result<PositionSample> {
    let coordinate = position.Coordinate()?;
    let pos = coordinate.Point()?.Position()?;

    let mut sample = PositionSample::new(pos.Latitude, pos.Longitude, Utc::now());
    if let Ok(acc) = coordinate.Accuracy() {
        sample = sample.with_accuracy(acc);
    }
    Ok(sample)
}

/// Poll the geolocator every `interval` seconds
pub async fn subscribe(accuracy: u32, interval: u64) -> Result<LocationSubscription> {
    info!("Connecting to Windows Location Service...");

    request_location_access().await?;
    let geolocator = create_geolocator(accuracy)?;

    let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        loop {
            match get_position(&geolocator).await.and_then(|p| sample_from_position(&p)) {
                Ok(sample) => {
                    if tx.send(sample).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Error getting Windows location: {}", e),
            }

            sleep(Duration::from_secs(interval.max(1))).await;
        }
    });

    Ok(LocationSubscription::new(rx, task))
}

// src/location/mod.rs
//! Location sources that feed position samples into a session

pub mod gpsd;
pub mod nmea;
pub mod replay;
pub mod sample;

#[cfg(windows)]
pub mod windows;

pub use sample::PositionSample;

use crate::{
    config::TrackerConfig,
    error::{Result, TrackerError},
};
use std::{path::PathBuf, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Buffered samples between a source task and the recorder
pub const SAMPLE_CHANNEL_CAPACITY: usize = 64;

/// Location source configuration
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSource {
    Serial { port: String, baudrate: u32 },
    Gpsd { host: String, port: u16 },
    /// JSON-lines file of samples; `speed` divides the recorded gaps, 0 replays instantly
    Replay { path: PathBuf, speed: f64 },
    #[cfg(windows)]
    Windows { accuracy: u32, interval: u64 },
}

impl LocationSource {
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        match config.source_type.as_str() {
            "serial" => {
                let port = config
                    .serial_port
                    .clone()
                    .ok_or_else(|| TrackerError::Config("serial source needs a serial_port".to_string()))?;
                Ok(LocationSource::Serial {
                    port,
                    baudrate: config.serial_baudrate.unwrap_or(9600),
                })
            }
            "gpsd" => Ok(LocationSource::Gpsd {
                host: config.gpsd_host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: config.gpsd_port.unwrap_or(2947),
            }),
            "replay" => {
                let path = config
                    .replay_path
                    .clone()
                    .ok_or_else(|| TrackerError::Config("replay source needs a replay_path".to_string()))?;
                Ok(LocationSource::Replay {
                    path,
                    speed: config.replay_speed.unwrap_or(1.0),
                })
            }
            #[cfg(windows)]
            "windows" => Ok(LocationSource::Windows {
                accuracy: config.windows_accuracy.unwrap_or(10),
                interval: config.windows_interval.unwrap_or(1),
            }),
            other => Err(TrackerError::Config(format!("unsupported source type '{}'", other))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LocationSource::Serial { port, baudrate } => format!("serial {} @ {} baud", port, baudrate),
            LocationSource::Gpsd { host, port } => format!("gpsd {}:{}", host, port),
            LocationSource::Replay { path, .. } => format!("replay {}", path.display()),
            #[cfg(windows)]
            LocationSource::Windows { .. } => "Windows Location Service".to_string(),
        }
    }

    /// Open the source and start streaming samples.
    ///
    /// Fails with `PermissionDenied` when access to the device is refused.
    pub async fn subscribe(&self) -> Result<LocationSubscription> {
        match self {
            LocationSource::Serial { port, baudrate } => subscribe_serial(port, *baudrate).await,
            LocationSource::Gpsd { host, port } => subscribe_gpsd(host, *port).await,
            LocationSource::Replay { path, speed } => replay::subscribe(path, *speed).await,
            #[cfg(windows)]
            LocationSource::Windows { accuracy, interval } => {
                windows::subscribe(*accuracy, *interval).await
            }
        }
    }
}

/// Live stream of samples from one source.
///
/// Owns the reader task: closing or dropping the subscription stops it.
#[derive(Debug)]
pub struct LocationSubscription {
    rx: mpsc::Receiver<PositionSample>,
    task: Option<JoinHandle<()>>,
}

impl LocationSubscription {
    pub fn new(rx: mpsc::Receiver<PositionSample>, task: JoinHandle<()>) -> Self {
        Self { rx, task: Some(task) }
    }

    /// Wrap a bare channel, for callers that produce samples themselves
    pub fn from_receiver(rx: mpsc::Receiver<PositionSample>) -> Self {
        Self { rx, task: None }
    }

    /// Next sample, or `None` once the source has finished
    pub async fn next(&mut self) -> Option<PositionSample> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("location subscription closed");
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to a GPS device via serial port
async fn subscribe_serial(port: &str, baudrate: u32) -> Result<LocationSubscription> {
    info!("Connecting to GPS on {} at {} baud...", port, baudrate);

    let serial = tokio_serial::new(port, baudrate)
        .timeout(Duration::from_millis(1000))
        .open_native_async()
        .map_err(|e| match e.kind {
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TrackerError::PermissionDenied(format!("serial port {}: {}", port, e))
            }
            _ => TrackerError::Connection(format!("Failed to open serial port {}: {}", port, e)),
        })?;

    info!("Connected to {}", port);

    let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut reader = BufReader::new(serial);
        let mut decoder = nmea::NmeaDecoder::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let Some(sample) = decoder.decode(line.trim()) else {
                        continue;
                    };
                    if tx.send(sample).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading from serial port: {}", e);
                    break;
                }
            }
        }
    });

    Ok(LocationSubscription::new(rx, task))
}

/// Connect to gpsd daemon
async fn subscribe_gpsd(host: &str, port: u16) -> Result<LocationSubscription> {
    info!("Connecting to gpsd at {}:{}...", host, port);

    let mut reader = gpsd::connect_gpsd(host, port).await?;
    info!("Connected to gpsd");

    let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match gpsd::parse_gpsd_json(line) {
                        Ok(Some(sample)) => {
                            if tx.send(sample).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Error parsing gpsd JSON: {}", e),
                    }
                }
                Err(e) => {
                    warn!("Error reading from gpsd: {}", e);
                    break;
                }
            }
        }
    });

    Ok(LocationSubscription::new(rx, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_source_from_config() {
        let mut config = TrackerConfig::default();
        config.update_gpsd("example.org".to_string(), 3000);
        assert_eq!(
            LocationSource::from_config(&config).unwrap(),
            LocationSource::Gpsd {
                host: "example.org".to_string(),
                port: 3000
            }
        );

        config.update_serial("/dev/ttyUSB0".to_string(), 4800);
        assert_eq!(
            LocationSource::from_config(&config).unwrap().describe(),
            "serial /dev/ttyUSB0 @ 4800 baud"
        );

        config.source_type = "replay".to_string();
        config.replay_path = None;
        assert!(matches!(
            LocationSource::from_config(&config),
            Err(TrackerError::Config(_))
        ));

        config.source_type = "carrier-pigeon".to_string();
        assert!(LocationSource::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_subscription_from_receiver() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = LocationSubscription::from_receiver(rx);
        let sample = PositionSample::new(1.0, 2.0, Utc::now());
        tx.send(sample).await.unwrap();
        drop(tx);
        assert_eq!(sub.next().await, Some(sample));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_close_stops_reader_task() {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            loop {
                if tx.send(PositionSample::new(0.0, 0.0, Utc::now())).await.is_err() {
                    break;
                }
            }
        });
        let mut sub = LocationSubscription::new(rx, task);
        assert!(sub.next().await.is_some());
        sub.close();
        assert!(sub.task.is_none());
        // Closed channel drains whatever was buffered, then ends
        while sub.next().await.is_some() {}
    }
}

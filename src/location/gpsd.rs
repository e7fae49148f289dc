// src/location/gpsd.rs
//! GPSD client implementation

use super::sample::PositionSample;
use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::info;

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TrackerError::from_source_io(&format!("gpsd at {}:{}", host, port), e))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON data. Only TPV reports with a 2D or 3D
/// fix yield a sample.
pub fn parse_gpsd_json(line: &str) -> Result<Option<PositionSample>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => Ok(parse_tpv_message(&msg.data)),
        "VERSION" => {
            parse_version_message(&msg.data);
            Ok(None)
        }
        "DEVICES" => {
            parse_devices_message(&msg.data);
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>) -> Option<PositionSample> {
    // mode 0/1 means no fix
    if let Some(mode) = msg_data.get("mode").and_then(|v| v.as_u64()) {
        if mode < 2 {
            return None;
        }
    }

    let lat = msg_data.get("lat").and_then(|v| v.as_f64())?;
    let lon = msg_data.get("lon").and_then(|v| v.as_f64())?;

    let timestamp = msg_data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut sample = PositionSample::new(lat, lon, timestamp);

    // Prefer the horizontal estimate, fall back to the larger axis error
    let eph = msg_data.get("eph").and_then(|v| v.as_f64());
    let epx = msg_data.get("epx").and_then(|v| v.as_f64());
    let epy = msg_data.get("epy").and_then(|v| v.as_f64());
    let accuracy = eph.or(match (epx, epy) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });
    if let Some(acc) = accuracy {
        sample = sample.with_accuracy(acc);
    }

    Some(sample)
}

/// Parse VERSION message (informational)
fn parse_version_message(msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(version) = msg_data.get("release").and_then(|v| v.as_str()) {
        info!("Connected to gpsd version: {}", version);
    }
}

/// Parse DEVICES message (informational)
fn parse_devices_message(msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(devices) = msg_data.get("devices").and_then(|v| v.as_array()) {
        info!("gpsd managing {} device(s)", devices.len());
        for device in devices {
            if let Some(path) = device.get("path").and_then(|v| v.as_str()) {
                info!("  Device: {}", path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tpv_parsing() {
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2023-01-01T12:00:00.000Z","ept":0.005,"lat":48.117,"lon":11.517,"alt":545.4,"epx":15.319,"epy":17.054,"epv":124.484,"track":10.3797,"speed":0.091,"climb":10.7,"eps":34.11,"epc":248.97}"#;

        let sample = parse_gpsd_json(json).unwrap().unwrap();

        assert_eq!(sample.latitude, 48.117);
        assert_eq!(sample.longitude, 11.517);
        assert_eq!(sample.timestamp, Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(sample.accuracy, Some(17.054));
    }

    #[test]
    fn test_tpv_prefers_eph() {
        let json = r#"{"class":"TPV","mode":2,"time":"2023-01-01T12:00:01Z","lat":1.0,"lon":2.0,"eph":4.5,"epx":9.0}"#;
        let sample = parse_gpsd_json(json).unwrap().unwrap();
        assert_eq!(sample.accuracy, Some(4.5));
    }

    #[test]
    fn test_tpv_without_fix_is_skipped() {
        let json = r#"{"class":"TPV","mode":1,"lat":48.117,"lon":11.517}"#;
        assert!(parse_gpsd_json(json).unwrap().is_none());

        let json = r#"{"class":"TPV","mode":3,"time":"2023-01-01T12:00:00.000Z"}"#;
        assert!(parse_gpsd_json(json).unwrap().is_none());
    }

    #[test]
    fn test_sky_yields_nothing() {
        let json = r#"{"class":"SKY","device":"/dev/ttyUSB0","hdop":1.2,"satellites":[{"PRN":1,"ss":42,"used":true}]}"#;
        assert!(parse_gpsd_json(json).unwrap().is_none());
    }

    #[test]
    fn test_invalid_json() {
        let invalid_json = r#"{"invalid": json"#;

        let result = parse_gpsd_json(invalid_json);
        assert!(matches!(result, Err(TrackerError::Parse(_))));
    }
}

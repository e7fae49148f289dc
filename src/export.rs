// src/export.rs
//! Export of a saved session's route to common track formats

use crate::{
    error::{Result, TrackerError},
    session::SessionRecord,
};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFormat {
    Gpx,
    GeoJson,
    Kml,
    Csv,
}

impl RouteFormat {
    pub fn extension(&self) -> &str {
        match self {
            RouteFormat::Gpx => "gpx",
            RouteFormat::GeoJson => "geojson",
            RouteFormat::Kml => "kml",
            RouteFormat::Csv => "csv",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            RouteFormat::Gpx => "GPX (GPS Exchange)",
            RouteFormat::GeoJson => "GeoJSON",
            RouteFormat::Kml => "KML (Keyhole)",
            RouteFormat::Csv => "CSV",
        }
    }
}

impl FromStr for RouteFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gpx" => Ok(RouteFormat::Gpx),
            "geojson" | "json" => Ok(RouteFormat::GeoJson),
            "kml" => Ok(RouteFormat::Kml),
            "csv" => Ok(RouteFormat::Csv),
            other => Err(TrackerError::Parse(format!("unknown export format: {}", other))),
        }
    }
}

/// Render a record's route in `format`. An empty route is an error.
pub fn render(record: &SessionRecord, format: RouteFormat) -> Result<String> {
    if record.route.is_empty() {
        return Err(TrackerError::Other(format!(
            "Session {} has no route to export",
            record.id
        )));
    }

    match format {
        RouteFormat::Gpx => Ok(to_gpx(record)),
        RouteFormat::GeoJson => to_geojson(record),
        RouteFormat::Kml => Ok(to_kml(record)),
        RouteFormat::Csv => Ok(to_csv(record)),
    }
}

pub fn export_to_file(record: &SessionRecord, path: &Path, format: RouteFormat) -> Result<()> {
    let content = render(record, format)?;

    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

fn track_name(record: &SessionRecord) -> String {
    format!("Exercise {}", record.started_at.format("%Y-%m-%d %H:%M"))
}

fn to_gpx(record: &SessionRecord) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Exercise Tracker" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
"#,
    );

    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(&track_name(record))));
    gpx.push_str(&format!(
        "    <desc>{:.2} km in {} s</desc>\n",
        record.distance_km, record.duration_seconds
    ));
    gpx.push_str("    <trkseg>\n");

    for point in &record.route {
        gpx.push_str(&format!(
            "      <trkpt lat=\"{}\" lon=\"{}\"/>\n",
            point.latitude, point.longitude
        ));
    }

    gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    gpx
}

fn to_geojson(record: &SessionRecord) -> Result<String> {
    let coordinates: Vec<[f64; 2]> = record
        .route
        .iter()
        .map(|p| [p.longitude, p.latitude])
        .collect();

    let feature = serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates
        },
        "properties": {
            "id": record.id,
            "date": record.started_at.to_rfc3339(),
            "distance": record.distance_km,
            "duration": record.duration_seconds
        }
    });

    Ok(serde_json::to_string_pretty(&feature)?)
}

fn to_kml(record: &SessionRecord) -> String {
    let mut kml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
"#,
    );

    kml.push_str(&format!("      <name>{}</name>\n", escape_xml(&track_name(record))));
    kml.push_str(&format!(
        "      <TimeStamp><when>{}</when></TimeStamp>\n",
        record.started_at.to_rfc3339()
    ));
    kml.push_str("      <LineString>\n        <coordinates>\n");

    for point in &record.route {
        kml.push_str(&format!(
            "          {},{},0\n",
            point.longitude, point.latitude
        ));
    }

    kml.push_str("        </coordinates>\n      </LineString>\n");
    kml.push_str("    </Placemark>\n  </Document>\n</kml>\n");
    kml
}

fn to_csv(record: &SessionRecord) -> String {
    let mut csv = String::from("index,latitude,longitude\n");

    for (i, point) in record.route.iter().enumerate() {
        csv.push_str(&format!("{},{},{}\n", i, point.latitude, point.longitude));
    }

    csv
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RoutePoint;
    use chrono::{TimeZone, Utc};

    fn record(route: Vec<RoutePoint>) -> SessionRecord {
        SessionRecord {
            id: "1714550404000".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            distance_km: 0.024,
            duration_seconds: 4,
            route,
        }
    }

    fn walk() -> SessionRecord {
        record(vec![
            RoutePoint { latitude: 31.2304, longitude: 121.4737 },
            RoutePoint { latitude: 31.2304, longitude: 121.4738 },
            RoutePoint { latitude: 31.2305, longitude: 121.4739 },
        ])
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("GPX".parse::<RouteFormat>().unwrap(), RouteFormat::Gpx);
        assert_eq!("geojson".parse::<RouteFormat>().unwrap(), RouteFormat::GeoJson);
        assert!("shp".parse::<RouteFormat>().is_err());
        assert_eq!(RouteFormat::Kml.extension(), "kml");
    }

    #[test]
    fn test_empty_route_is_error() {
        assert!(render(&record(Vec::new()), RouteFormat::Gpx).is_err());
    }

    #[test]
    fn test_gpx_export() {
        let gpx = render(&walk(), RouteFormat::Gpx).unwrap();
        assert!(gpx.contains("<trkseg>"));
        assert_eq!(gpx.matches("<trkpt").count(), 3);
        assert!(gpx.contains("lat=\"31.2305\" lon=\"121.4739\""));
    }

    #[test]
    fn test_geojson_is_lon_lat_linestring() {
        let json = render(&walk(), RouteFormat::GeoJson).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["geometry"]["type"], "LineString");
        assert_eq!(value["geometry"]["coordinates"][0][0], 121.4737);
        assert_eq!(value["geometry"]["coordinates"][0][1], 31.2304);
        assert_eq!(value["properties"]["duration"], 4);
    }

    #[test]
    fn test_kml_and_csv() {
        let kml = render(&walk(), RouteFormat::Kml).unwrap();
        assert!(kml.contains("<LineString>"));
        assert!(kml.contains("121.4738,31.2304,0"));

        let csv = render(&walk(), RouteFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "index,latitude,longitude");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("walk.{}", RouteFormat::Csv.extension()));
        export_to_file(&walk(), &path, RouteFormat::Csv).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("index,"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}

// src/location/nmea.rs
//! NMEA sentence decoding into position samples

use super::sample::PositionSample;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Stateful decoder for a serial NMEA stream.
///
/// GGA carries only a time of day, so the date and time of the most recent
/// RMC sentence are remembered and used to date it.
#[derive(Debug, Default)]
pub struct NmeaDecoder {
    last_rmc: Option<NaiveDateTime>,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one sentence. Returns a sample for GGA/RMC sentences that
    /// carry a valid fix, `None` for everything else.
    pub fn decode(&mut self, line: &str) -> Option<PositionSample> {
        if !checksum_ok(line) {
            return None;
        }
        let body = line.split('*').next().unwrap_or(line);
        let parts: Vec<&str> = body.split(',').collect();

        if line.starts_with("$GPGGA") || line.starts_with("$GNGGA") {
            self.parse_gga(&parts)
        } else if line.starts_with("$GPRMC") || line.starts_with("$GNRMC") {
            self.parse_rmc(&parts)
        } else {
            None
        }
    }

    /// Parse GGA (Global Positioning System Fix Data) sentence
    fn parse_gga(&mut self, parts: &[&str]) -> Option<PositionSample> {
        if parts.len() < 10 {
            return None;
        }

        // Fix quality (field 6), 0 = no fix
        let quality = parts[6].parse::<u8>().ok()?;
        if quality == 0 {
            return None;
        }

        let latitude = parse_coordinate(parts[2], parts[3], 'S')?;
        let longitude = parse_coordinate(parts[4], parts[5], 'W')?;
        let time = parse_time(parts[1])?;
        let date = match self.last_rmc {
            Some(rmc) => gga_date(rmc, time)?,
            None => Utc::now().date_naive(),
        };

        Some(PositionSample::new(
            latitude,
            longitude,
            DateTime::from_naive_utc_and_offset(date.and_time(time), Utc),
        ))
    }

    /// Parse RMC (Recommended Minimum Course) sentence
    fn parse_rmc(&mut self, parts: &[&str]) -> Option<PositionSample> {
        if parts.len() < 10 {
            return None;
        }

        let date = NaiveDate::parse_from_str(parts[9], "%d%m%y").ok();
        if let (Some(date), Some(time)) = (date, parse_time(parts[1])) {
            self.last_rmc = Some(date.and_time(time));
        }

        // Status (field 2), A = active, V = void
        if parts[2] != "A" {
            return None;
        }

        let latitude = parse_coordinate(parts[3], parts[4], 'S')?;
        let longitude = parse_coordinate(parts[5], parts[6], 'W')?;
        let time = parse_time(parts[1])?;

        Some(PositionSample::new(
            latitude,
            longitude,
            DateTime::from_naive_utc_and_offset(date?.and_time(time), Utc),
        ))
    }
}

/// Date for a GGA time of day following an RMC fix. A time more than
/// twelve hours behind the RMC time has crossed UTC midnight.
fn gga_date(rmc: NaiveDateTime, time: NaiveTime) -> Option<NaiveDate> {
    if rmc.time() - time > Duration::hours(12) {
        rmc.date().succ_opt()
    } else {
        Some(rmc.date())
    }
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed degrees
fn parse_coordinate(value: &str, hemisphere: &str, negative: char) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let raw = value.parse::<f64>().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let coord = degrees + minutes / 60.0;
    if hemisphere.starts_with(negative) {
        Some(-coord)
    } else {
        Some(coord)
    }
}

/// `hhmmss` or `hhmmss.sss`
fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H%M%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H%M%S"))
        .ok()
}

/// Verify the XOR checksum when one is present
pub fn checksum_ok(line: &str) -> bool {
    let Some(body) = line.strip_prefix('$') else {
        return false;
    };
    let Some((payload, checksum)) = body.split_once('*') else {
        // Sentences without a checksum are accepted as-is
        return true;
    };
    let Ok(expected) = u8::from_str_radix(checksum.trim(), 16) else {
        return false;
    };
    payload.bytes().fold(0u8, |acc, b| acc ^ b) == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    #[test]
    fn test_checksum() {
        assert!(checksum_ok(GGA));
        assert!(checksum_ok(RMC));
        assert!(!checksum_ok("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48"));
        assert!(checksum_ok("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,"));
        assert!(!checksum_ok("GPGGA,no,dollar"));
    }

    #[test]
    fn test_rmc_parsing() {
        let mut decoder = NmeaDecoder::new();
        let sample = decoder.decode(RMC).unwrap();

        assert!((sample.latitude - 48.1173).abs() < 1e-4);
        assert!((sample.longitude - 11.516_666).abs() < 1e-4);
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(1994, 3, 23, 12, 35, 19).unwrap()
        );
    }

    #[test]
    fn test_gga_uses_date_from_rmc() {
        let mut decoder = NmeaDecoder::new();
        decoder.decode(RMC);
        let sample = decoder.decode(GGA).unwrap();
        assert_eq!(sample.timestamp.year(), 1994);
        assert_eq!(sample.timestamp.hour(), 12);
        assert_eq!(sample.timestamp.second(), 19);
    }

    #[test]
    fn test_gga_without_fix() {
        let mut decoder = NmeaDecoder::new();
        let no_fix = "$GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,";
        assert!(decoder.decode(no_fix).is_none());
    }

    #[test]
    fn test_void_rmc_still_records_date() {
        let mut decoder = NmeaDecoder::new();
        let void = "$GPRMC,123519,V,,,,,,,230394,,";
        assert!(decoder.decode(void).is_none());
        assert_eq!(
            decoder.last_rmc.map(|t| t.date()),
            NaiveDate::from_ymd_opt(1994, 3, 23)
        );
    }

    #[test]
    fn test_gga_after_midnight_rolls_date() {
        let mut decoder = NmeaDecoder::new();
        decoder.decode("$GPRMC,235959,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        let sample = decoder
            .decode("$GPGGA,000005,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,")
            .unwrap();
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(1994, 3, 24, 0, 0, 5).unwrap()
        );
    }

    #[test]
    fn test_gga_slightly_behind_rmc_keeps_date() {
        let mut decoder = NmeaDecoder::new();
        decoder.decode("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        let sample = decoder
            .decode("$GPGGA,123518,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,")
            .unwrap();
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(1994, 3, 23, 12, 35, 18).unwrap()
        );
    }

    #[test]
    fn test_southern_western_hemisphere() {
        assert_eq!(parse_coordinate("3330.000", "S", 'S'), Some(-33.5));
        assert_eq!(parse_coordinate("07030.000", "W", 'W'), Some(-70.5));
        assert_eq!(parse_coordinate("", "N", 'S'), None);
    }

    #[test]
    fn test_invalid_sentence() {
        let mut decoder = NmeaDecoder::new();
        assert!(decoder.decode("$INVALID,123,456").is_none());
        assert!(decoder.decode("$GPGSV,3,1,12,01,40,083,46").is_none());
    }
}

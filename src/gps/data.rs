// src/gps/data.rs
//! Fix and status records shared between the parser and the publishers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DG14 reports speed in knots, the fix message carries meters per second
pub const KNOTS_TO_MPS: f64 = 0.5144;

/// Fix quality as carried in the outgoing status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    #[default]
    NoFix,
    Fix,
    SbasFix,
    GbasFix,
    DgpsFix,
}

impl FixStatus {
    /// Map the receiver's position mode (0..=3) to a fix status.
    /// Anything outside the table means no fix.
    pub fn from_mode(mode: i64) -> Self {
        match mode {
            0 => FixStatus::Fix,
            1 => FixStatus::SbasFix,
            2 => FixStatus::GbasFix,
            3 => FixStatus::DgpsFix,
            _ => FixStatus::NoFix,
        }
    }

    /// Wire value of the status
    pub fn code(self) -> i16 {
        match self {
            FixStatus::NoFix => -1,
            FixStatus::Fix => 0,
            FixStatus::SbasFix => 1,
            FixStatus::GbasFix => 2,
            FixStatus::DgpsFix => 18,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FixStatus::NoFix => "No fix",
            FixStatus::Fix => "GPS",
            FixStatus::SbasFix => "SBAS",
            FixStatus::GbasFix => "GBAS",
            FixStatus::DgpsFix => "DGPS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceType {
    #[default]
    Unknown,
    Approximated,
    DiagonalKnown,
    Known,
}

impl CovarianceType {
    pub fn code(self) -> u8 {
        match self {
            CovarianceType::Unknown => 0,
            CovarianceType::Approximated => 1,
            CovarianceType::DiagonalKnown => 2,
            CovarianceType::Known => 3,
        }
    }
}

/// One entry of the visible satellite table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleSatellite {
    pub prn: i32,
    pub elevation: i32,
    pub azimuth: i32,
    pub snr: i32,
}

/// Receiver status: fix quality plus the visible satellite table.
///
/// The four satellite sequences are parallel and always the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsStatus {
    pub stamp: Option<DateTime<Utc>>,
    pub status: FixStatus,
    pub satellites_visible: u16,
    pub satellite_visible_prn: Vec<i32>,
    pub satellite_visible_z: Vec<i32>,
    pub satellite_visible_azimuth: Vec<i32>,
    pub satellite_visible_snr: Vec<i32>,
}

impl GpsStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the satellite table, keeping the parallel sequences dense
    pub fn set_satellites(&mut self, satellites: &[VisibleSatellite]) {
        self.satellites_visible = u16::try_from(satellites.len()).unwrap_or(u16::MAX);
        self.satellite_visible_prn = satellites.iter().map(|s| s.prn).collect();
        self.satellite_visible_z = satellites.iter().map(|s| s.elevation).collect();
        self.satellite_visible_azimuth = satellites.iter().map(|s| s.azimuth).collect();
        self.satellite_visible_snr = satellites.iter().map(|s| s.snr).collect();
    }

    /// Iterate the satellite table row by row
    pub fn satellites(&self) -> impl Iterator<Item = VisibleSatellite> + '_ {
        self.satellite_visible_prn
            .iter()
            .zip(&self.satellite_visible_z)
            .zip(&self.satellite_visible_azimuth)
            .zip(&self.satellite_visible_snr)
            .map(|(((&prn, &elevation), &azimuth), &snr)| VisibleSatellite {
                prn,
                elevation,
                azimuth,
                snr,
            })
    }
}

/// Extended fix: position, motion, dilution of precision and covariance.
///
/// Created once and updated in place; each sentence kind only touches its
/// own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub stamp: Option<DateTime<Utc>>,
    pub status: GpsStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub track: f64,
    pub speed: f64, // m/s
    pub climb: f64,
    pub time: f64, // UTC seconds of day as reported (hhmmss.ss)
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
    pub tdop: f64,
    pub gdop: f64,
    pub position_covariance: [f64; 9],
    pub position_covariance_type: CovarianceType,
}

impl GpsFix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp both the fix and its embedded status with the current time
    pub fn update_timestamp(&mut self) {
        let now = Utc::now();
        self.stamp = Some(now);
        self.status.stamp = Some(now);
    }

    /// sqrt(pdop² + tdop²)
    pub fn geometric_dop(pdop: f64, tdop: f64) -> f64 {
        (pdop.powi(2) + tdop.powi(2)).sqrt()
    }

    /// Diagonal standard deviations (lat, lon, alt) in meters
    pub fn position_std_dev(&self) -> [f64; 3] {
        [
            self.position_covariance[0].sqrt(),
            self.position_covariance[4].sqrt(),
            self.position_covariance[8].sqrt(),
        ]
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: f64, positive: char, negative: char) -> String {
        let hemisphere = if coord < 0.0 { negative } else { positive };
        format!("{:>12.6}° {}", coord.abs(), hemisphere)
    }
}

/// Reduced fix message: position, status code and covariance only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavSatFix {
    pub stamp: Option<DateTime<Utc>>,
    pub status: i16,
    pub latitude: f64,
    pub longitude: f64,
    pub position_covariance: [f64; 9],
    pub position_covariance_type: u8,
}

impl From<&GpsFix> for NavSatFix {
    fn from(fix: &GpsFix) -> Self {
        Self {
            stamp: fix.stamp,
            status: fix.status.status.code(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            position_covariance: fix.position_covariance,
            position_covariance_type: fix.position_covariance_type.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_mapping_is_total() {
        assert_eq!(FixStatus::from_mode(0).code(), 0);
        assert_eq!(FixStatus::from_mode(1).code(), 1);
        assert_eq!(FixStatus::from_mode(2).code(), 2);
        assert_eq!(FixStatus::from_mode(3).code(), 18);
        for mode in [-1, 4, 17, 18, i64::MIN, i64::MAX] {
            assert_eq!(FixStatus::from_mode(mode), FixStatus::NoFix);
            assert_eq!(FixStatus::from_mode(mode).code(), -1);
        }
    }

    #[test]
    fn test_geometric_dop() {
        assert_eq!(GpsFix::geometric_dop(0.0, 0.0), 0.0);
        assert_eq!(GpsFix::geometric_dop(3.0, 4.0), 5.0);
    }

    #[test]
    fn test_set_satellites_keeps_sequences_parallel() {
        let mut status = GpsStatus::new();
        let sats = [
            VisibleSatellite { prn: 5, elevation: 40, azimuth: 120, snr: 44 },
            VisibleSatellite { prn: 12, elevation: 15, azimuth: 300, snr: 31 },
        ];
        status.set_satellites(&sats);

        assert_eq!(status.satellites_visible, 2);
        assert_eq!(status.satellite_visible_prn, vec![5, 12]);
        assert_eq!(status.satellite_visible_z, vec![40, 15]);
        assert_eq!(status.satellite_visible_azimuth, vec![120, 300]);
        assert_eq!(status.satellite_visible_snr, vec![44, 31]);
        assert_eq!(status.satellites().collect::<Vec<_>>(), sats.to_vec());

        status.set_satellites(&[]);
        assert_eq!(status.satellites_visible, 0);
        assert!(status.satellite_visible_snr.is_empty());
    }

    #[test]
    fn test_satellite_count_saturates() {
        let sat = VisibleSatellite { prn: 1, elevation: 0, azimuth: 0, snr: 0 };
        let mut status = GpsStatus::new();
        status.set_satellites(&vec![sat; 70_000]);
        assert_eq!(status.satellites_visible, u16::MAX);
        assert_eq!(status.satellite_visible_prn.len(), 70_000);
        assert_eq!(status.satellite_visible_snr.len(), 70_000);
    }

    #[test]
    fn test_navsat_projection() {
        let mut fix = GpsFix::new();
        fix.latitude = -33.5;
        fix.longitude = 151.25;
        fix.status.status = FixStatus::DgpsFix;
        fix.position_covariance[4] = 2.25;
        fix.position_covariance_type = CovarianceType::DiagonalKnown;

        let navsat = NavSatFix::from(&fix);
        assert_eq!(navsat.status, 18);
        assert_eq!(navsat.latitude, -33.5);
        assert_eq!(navsat.longitude, 151.25);
        assert_eq!(navsat.position_covariance[4], 2.25);
        assert_eq!(navsat.position_covariance_type, 2);
    }

    #[test]
    fn test_default_fix_has_no_fix() {
        let fix = GpsFix::new();
        assert_eq!(fix.status.status, FixStatus::NoFix);
        assert!(fix.stamp.is_none());
        assert_eq!(fix.position_covariance, [0.0; 9]);
        assert_eq!(fix.position_covariance_type, CovarianceType::Unknown);
    }
}

// src/gps/ashtech.rs
//! Ashtech proprietary sentence interpretation ($PASHR,POS / $PASHR,SAT / $GPGST)

use super::data::{CovarianceType, FixStatus, GpsFix, VisibleSatellite, KNOTS_TO_MPS};
use super::tokenizer::{tokenize, trim_trailing};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

const POS_MIN_TOKENS: usize = 18;
const SAT_MIN_TOKENS: usize = 8;
const GST_MIN_TOKENS: usize = 9;

/// Sentence family resolved from the first two tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentenceKind {
    /// $PASHR,POS: position, velocity and DOP
    Position,
    /// $PASHR,SAT: visible satellites
    Satellites,
    /// $GPGST: pseudorange noise statistics
    PseudorangeNoise,
    Unrecognized,
}

impl SentenceKind {
    pub fn classify(family: &str, subtype: &str) -> Self {
        match (family, subtype) {
            ("$PASHR", "POS") => SentenceKind::Position,
            ("$PASHR", "SAT") => SentenceKind::Satellites,
            ("$GPGST", _) => SentenceKind::PseudorangeNoise,
            _ => SentenceKind::Unrecognized,
        }
    }
}

impl fmt::Display for SentenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SentenceKind::Position => "POS",
            SentenceKind::Satellites => "SAT",
            SentenceKind::PseudorangeNoise => "GST",
            SentenceKind::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

/// How satellite groups are located inside a $PASHR,SAT sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatLayout {
    /// Group `i` (1-based, `i < count`) reads fields `3+i, 3+2i, 3+3i, 3+4i`
    /// and is kept when field `3+5i` is non-empty. Strides overlap and the
    /// last announced group is never read; recorded sessions expect this.
    #[default]
    Legacy,
    /// Group `j` (0-based, `j < count`) occupies fields `3+5j ..= 3+5j+4`:
    /// PRN, azimuth, elevation, SNR, used flag.
    Packed,
}

/// Result of feeding one line to the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOutcome {
    /// `None` when the line was discarded before dispatch
    pub kind: Option<SentenceKind>,
    /// The sentence carried a UTC time different from the previous one
    pub utc_changed: bool,
}

/// Parse a leading floating point number, falling back to 0.0.
///
/// Leading whitespace is skipped and the longest decimal prefix is used,
/// so `"12.5M"` reads as 12.5 and `""` or `"N"` read as 0.0. Only plain
/// decimal notation is recognised: `inf`, `nan` and hex forms read as 0.0.
pub fn parse_f64_or_zero(token: &str) -> f64 {
    let s = token.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return 0.0;
    }

    // optional exponent, only taken when it has digits
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Parse a leading integer, falling back to 0
pub fn parse_i64_or_zero(token: &str) -> i64 {
    let s = token.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }

    s[..end].parse().unwrap_or_else(|_| {
        if bytes[0] == b'-' {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

fn parse_i32_or_zero(token: &str) -> i32 {
    parse_i64_or_zero(token).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Stateful interpreter for the DG14 sentence stream.
///
/// Holds the last UTC time seen so callers can tell whether a line moved
/// the fix forward.
#[derive(Debug, Clone, Default)]
pub struct SentenceInterpreter {
    utc_time: f64,
    sat_layout: SatLayout,
}

impl SentenceInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sat_layout(sat_layout: SatLayout) -> Self {
        Self {
            utc_time: 0.0,
            sat_layout,
        }
    }

    /// Last UTC time reported by a POS or GST sentence
    pub fn utc_time(&self) -> f64 {
        self.utc_time
    }

    /// Parse one raw line and apply it to `fix`.
    ///
    /// Lines with fewer than two fields and unrecognized sentences leave
    /// `fix` untouched.
    pub fn process_line(&mut self, fix: &mut GpsFix, line: &str) -> ParseOutcome {
        let tokens = tokenize(trim_trailing(line));
        if tokens.len() < 2 {
            return ParseOutcome::default();
        }

        let utc_time_old = self.utc_time;
        let kind = SentenceKind::classify(&tokens[0], &tokens[1]);

        let applied = match kind {
            SentenceKind::Position => self.apply_position(fix, &tokens),
            SentenceKind::Satellites => self.apply_satellites(fix, &tokens),
            SentenceKind::PseudorangeNoise => self.apply_pseudorange_noise(fix, &tokens),
            SentenceKind::Unrecognized => {
                debug!("Unrecognized sentence {}:{}", tokens[0], tokens[1]);
                return ParseOutcome {
                    kind: Some(kind),
                    utc_changed: false,
                };
            }
        };

        if !applied {
            debug!("Discarding short {} sentence ({} fields)", kind, tokens.len());
            return ParseOutcome::default();
        }

        fix.update_timestamp();

        ParseOutcome {
            kind: Some(kind),
            utc_changed: self.utc_time != utc_time_old,
        }
    }

    fn apply_position(&mut self, fix: &mut GpsFix, tokens: &[String]) -> bool {
        if tokens.len() < POS_MIN_TOKENS {
            return false;
        }

        fix.status.status = FixStatus::from_mode(parse_i64_or_zero(&tokens[2]));

        self.utc_time = parse_f64_or_zero(&tokens[4]);

        fix.latitude = parse_f64_or_zero(&tokens[5]);
        fix.longitude = parse_f64_or_zero(&tokens[7]);
        if tokens[6] == "S" {
            fix.latitude *= -1.0;
        }
        if tokens[8] == "W" {
            fix.longitude *= -1.0;
        }

        fix.track = parse_f64_or_zero(&tokens[11]);
        fix.speed = KNOTS_TO_MPS * parse_f64_or_zero(&tokens[12]);
        fix.climb = parse_f64_or_zero(&tokens[13]);
        fix.time = parse_f64_or_zero(&tokens[4]);

        fix.pdop = parse_f64_or_zero(&tokens[14]);
        fix.hdop = parse_f64_or_zero(&tokens[15]);
        fix.vdop = parse_f64_or_zero(&tokens[16]);
        fix.tdop = parse_f64_or_zero(&tokens[17]);
        fix.gdop = GpsFix::geometric_dop(fix.pdop, fix.tdop);

        true
    }

    fn apply_satellites(&mut self, fix: &mut GpsFix, tokens: &[String]) -> bool {
        if tokens.len() < SAT_MIN_TOKENS {
            return false;
        }

        let count = parse_i64_or_zero(&tokens[2]).max(0) as usize;
        let used = match self.sat_layout {
            SatLayout::Legacy => legacy_satellites(tokens, count),
            SatLayout::Packed => packed_satellites(tokens, count),
        };

        fix.status.set_satellites(&used);
        true
    }

    fn apply_pseudorange_noise(&mut self, fix: &mut GpsFix, tokens: &[String]) -> bool {
        if tokens.len() < GST_MIN_TOKENS {
            return false;
        }

        fix.position_covariance[0] = parse_f64_or_zero(&tokens[6]).powi(2);
        fix.position_covariance[4] = parse_f64_or_zero(&tokens[7]).powi(2);
        fix.position_covariance[8] = parse_f64_or_zero(&tokens[8]).powi(2);
        fix.position_covariance_type = CovarianceType::DiagonalKnown;
        self.utc_time = parse_f64_or_zero(&tokens[1]);

        true
    }
}

fn legacy_satellites(tokens: &[String], count: usize) -> Vec<VisibleSatellite> {
    let mut used = Vec::new();

    for i in 1..count {
        let flag = 3 + 5 * i;
        if flag >= tokens.len() {
            // offsets only grow with i
            break;
        }
        if tokens[flag].is_empty() {
            continue;
        }
        used.push(VisibleSatellite {
            prn: parse_i32_or_zero(&tokens[3 + i]),
            azimuth: parse_i32_or_zero(&tokens[3 + 2 * i]),
            elevation: parse_i32_or_zero(&tokens[3 + 3 * i]),
            snr: parse_i32_or_zero(&tokens[3 + 4 * i]),
        });
    }

    used
}

fn packed_satellites(tokens: &[String], count: usize) -> Vec<VisibleSatellite> {
    let mut used = Vec::new();

    for j in 0..count {
        let base = 3 + 5 * j;
        let flag = base + 4;
        if flag >= tokens.len() {
            break;
        }
        if tokens[flag].is_empty() {
            continue;
        }
        used.push(VisibleSatellite {
            prn: parse_i32_or_zero(&tokens[base]),
            azimuth: parse_i32_or_zero(&tokens[base + 1]),
            elevation: parse_i32_or_zero(&tokens[base + 2]),
            snr: parse_i32_or_zero(&tokens[base + 3]),
        });
    }

    used
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS: &str = "$PASHR,POS,3,10,151230.50,3723.4567,S,12202.1234,W,00100.5,,045.2,010.0,-0.5,2.1,1.2,1.7,0.9,HW01*2C";
    const GST: &str = "$GPGST,151230.50,1.2,0.8,0.6,45.0,1.5,2.0,3.0*6A";
    // count 3: with the legacy strides group 1 reads fields 4..=7 and checks 8,
    // group 2 reads 5,7,9,11 and checks 13
    const SAT: &str = "$PASHR,SAT,3,10,20,30,40,U,11,21,31,41,U,12,22,32,42,U*1B";

    fn feed(line: &str) -> (GpsFix, ParseOutcome) {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        let outcome = interp.process_line(&mut fix, line);
        (fix, outcome)
    }

    #[test]
    fn test_lenient_float_parsing() {
        assert_eq!(parse_f64_or_zero("12.5"), 12.5);
        assert_eq!(parse_f64_or_zero(" -3.25"), -3.25);
        assert_eq!(parse_f64_or_zero("12.5M"), 12.5);
        assert_eq!(parse_f64_or_zero("1e3"), 1000.0);
        assert_eq!(parse_f64_or_zero("2e"), 2.0);
        assert_eq!(parse_f64_or_zero(".5"), 0.5);
        assert_eq!(parse_f64_or_zero("1."), 1.0);
        assert_eq!(parse_f64_or_zero(""), 0.0);
        assert_eq!(parse_f64_or_zero("N"), 0.0);
        assert_eq!(parse_f64_or_zero("-"), 0.0);
        assert_eq!(parse_f64_or_zero("."), 0.0);
        assert_eq!(parse_f64_or_zero("inf"), 0.0);
        assert_eq!(parse_f64_or_zero("nan"), 0.0);
        assert_eq!(parse_f64_or_zero("0x1A"), 0.0);
    }

    #[test]
    fn test_lenient_integer_parsing() {
        assert_eq!(parse_i64_or_zero("3"), 3);
        assert_eq!(parse_i64_or_zero("-7"), -7);
        assert_eq!(parse_i64_or_zero("12abc"), 12);
        assert_eq!(parse_i64_or_zero("2.9"), 2);
        assert_eq!(parse_i64_or_zero(""), 0);
        assert_eq!(parse_i64_or_zero("U"), 0);
        assert_eq!(parse_i64_or_zero("99999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_classify() {
        assert_eq!(SentenceKind::classify("$PASHR", "POS"), SentenceKind::Position);
        assert_eq!(SentenceKind::classify("$PASHR", "SAT"), SentenceKind::Satellites);
        assert_eq!(SentenceKind::classify("$GPGST", "anything"), SentenceKind::PseudorangeNoise);
        assert_eq!(SentenceKind::classify("$PASHR", "RID"), SentenceKind::Unrecognized);
        assert_eq!(SentenceKind::classify("$GPGGA", "POS"), SentenceKind::Unrecognized);
    }

    #[test]
    fn test_position_sentence() {
        let (fix, outcome) = feed(POS);

        assert_eq!(outcome.kind, Some(SentenceKind::Position));
        assert!(outcome.utc_changed);
        assert_eq!(fix.status.status, FixStatus::DgpsFix);
        assert_eq!(fix.latitude, -3723.4567);
        assert_eq!(fix.longitude, -12202.1234);
        assert_eq!(fix.track, 45.2);
        assert_eq!(fix.speed, KNOTS_TO_MPS * 10.0);
        assert_eq!(fix.climb, -0.5);
        assert_eq!(fix.time, 151230.5);
        assert_eq!(fix.pdop, 2.1);
        assert_eq!(fix.hdop, 1.2);
        assert_eq!(fix.vdop, 1.7);
        assert_eq!(fix.tdop, 0.9);
        assert_eq!(fix.gdop, (2.1f64.powi(2) + 0.9f64.powi(2)).sqrt());
        assert!(fix.stamp.is_some());
        assert_eq!(fix.stamp, fix.status.stamp);
    }

    #[test]
    fn test_position_hemispheres() {
        let north_east = POS.replace(",S,", ",N,").replace(",W,", ",E,");
        let (fix, _) = feed(&north_east);
        assert!(fix.latitude >= 0.0);
        assert!(fix.longitude >= 0.0);

        // anything other than S/W keeps the sign
        let odd_flags = POS.replace(",S,", ",s,").replace(",W,", ",X,");
        let (fix, _) = feed(&odd_flags);
        assert_eq!(fix.latitude, 3723.4567);
        assert_eq!(fix.longitude, 12202.1234);
    }

    #[test]
    fn test_speed_conversion() {
        for knots in [0.0, 1.0, 100.0] {
            let line = POS.replace(",010.0,", &format!(",{},", knots));
            let (fix, _) = feed(&line);
            assert_eq!(fix.speed, 0.5144 * knots);
        }
    }

    #[test]
    fn test_zero_dops_give_zero_gdop() {
        let line = "$PASHR,POS,0,10,1.0,1.0,N,1.0,E,0,,0,0,0,0,0,0,0,X*00";
        let (fix, _) = feed(line);
        assert_eq!(fix.gdop, 0.0);
        assert_eq!(fix.status.status, FixStatus::Fix);
    }

    #[test]
    fn test_malformed_numbers_become_zero() {
        let line = "$PASHR,POS,x,10,abc,lat,N,lon,E,0,,trk,spd,clb,p,h,v,t,X*00";
        let (fix, outcome) = feed(line);
        assert_eq!(outcome.kind, Some(SentenceKind::Position));
        assert_eq!(fix.status.status, FixStatus::Fix); // "x" reads as mode 0
        assert_eq!(fix.latitude, 0.0);
        assert_eq!(fix.longitude, 0.0);
        assert_eq!(fix.speed, 0.0);
        assert_eq!(fix.time, 0.0);
        assert_eq!(fix.gdop, 0.0);
    }

    #[test]
    fn test_position_leaves_covariance_alone() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        interp.process_line(&mut fix, GST);
        let covariance = fix.position_covariance;
        let covariance_type = fix.position_covariance_type;

        interp.process_line(&mut fix, POS);
        assert_eq!(fix.position_covariance, covariance);
        assert_eq!(fix.position_covariance_type, covariance_type);
        assert_eq!(fix.latitude, -3723.4567);
    }

    #[test]
    fn test_short_position_is_discarded() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        let outcome = interp.process_line(&mut fix, "$PASHR,POS,1,,123.4,10.0,N,20.0,W*5A");
        assert_eq!(outcome, ParseOutcome::default());
        assert_eq!(fix, GpsFix::new());
        assert_eq!(interp.utc_time(), 0.0);
    }

    #[test]
    fn test_pseudorange_noise_sentence() {
        let (fix, outcome) = feed(GST);

        assert_eq!(outcome.kind, Some(SentenceKind::PseudorangeNoise));
        assert!(outcome.utc_changed);
        assert_eq!(fix.position_covariance_type, CovarianceType::DiagonalKnown);
        assert_eq!(fix.position_covariance[0], 1.5f64.powi(2));
        assert_eq!(fix.position_covariance[4], 4.0);
        // last field loses one character to the checksum truncation: "3.0" -> "3."
        assert_eq!(fix.position_covariance[8], 9.0);
        for idx in [1, 2, 3, 5, 6, 7] {
            assert_eq!(fix.position_covariance[idx], 0.0);
        }
        // GST time does not touch the fix time
        assert_eq!(fix.time, 0.0);
    }

    #[test]
    fn test_pseudorange_noise_sets_type_even_when_empty() {
        let (fix, _) = feed("$GPGST,,,,,,,,,*00");
        assert_eq!(fix.position_covariance_type, CovarianceType::DiagonalKnown);
        assert_eq!(fix.position_covariance, [0.0; 9]);
    }

    #[test]
    fn test_negative_std_dev_squares_to_positive() {
        let (fix, _) = feed("$GPGST,1,0,0,0,0,-2.0,-3.0,-4.0,*00");
        assert_eq!(fix.position_covariance[0], 4.0);
        assert_eq!(fix.position_covariance[4], 9.0);
        assert_eq!(fix.position_covariance[8], 16.0);
    }

    #[test]
    fn test_legacy_satellite_layout() {
        let (fix, outcome) = feed(SAT);

        assert_eq!(outcome.kind, Some(SentenceKind::Satellites));
        assert!(!outcome.utc_changed);
        // i = 1: prn=tok[4], az=tok[5], z=tok[6], snr=tok[7]="U", flag=tok[8]="11"
        // i = 2: prn=tok[5], az=tok[7]="U", z=tok[9], snr=tok[11], flag=tok[13]="12"
        assert_eq!(fix.status.satellites_visible, 2);
        assert_eq!(fix.status.satellite_visible_prn, vec![20, 30]);
        assert_eq!(fix.status.satellite_visible_azimuth, vec![30, 0]);
        assert_eq!(fix.status.satellite_visible_z, vec![40, 21]);
        assert_eq!(fix.status.satellite_visible_snr, vec![0, 41]);
    }

    #[test]
    fn test_legacy_layout_skips_empty_flag() {
        // flag for i = 1 is tok[8], empty here
        let line = "$PASHR,SAT,3,10,20,30,40,U,,21,31,41,U,12,22,32,42,U*1B";
        let (fix, _) = feed(line);
        assert_eq!(fix.status.satellites_visible, 1);
        assert_eq!(fix.status.satellite_visible_prn, vec![30]);
        assert_eq!(fix.status.satellite_visible_z.len(), 1);
        assert_eq!(fix.status.satellite_visible_azimuth.len(), 1);
        assert_eq!(fix.status.satellite_visible_snr.len(), 1);
    }

    #[test]
    fn test_legacy_layout_stops_at_end_of_sentence() {
        // count claims 40 satellites but only a handful of fields follow
        let line = "$PASHR,SAT,40,10,20,30,40,U,11,21*00";
        let (fix, _) = feed(line);
        assert_eq!(fix.status.satellites_visible, 1);
        assert_eq!(fix.status.satellite_visible_prn, vec![20]);
    }

    #[test]
    fn test_packed_satellite_layout() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::with_sat_layout(SatLayout::Packed);
        interp.process_line(&mut fix, SAT);

        // last flag is "U" minus the checksum truncation, so only two groups count
        assert_eq!(fix.status.satellites_visible, 2);
        assert_eq!(fix.status.satellite_visible_prn, vec![10, 11]);
        assert_eq!(fix.status.satellite_visible_azimuth, vec![20, 21]);
        assert_eq!(fix.status.satellite_visible_z, vec![30, 31]);
        assert_eq!(fix.status.satellite_visible_snr, vec![40, 41]);
    }

    #[test]
    fn test_short_satellite_sentence_is_noop() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        interp.process_line(&mut fix, SAT);
        let before = fix.clone();

        let outcome = interp.process_line(&mut fix, "$PASHR,SAT,3,10,20,30*00");
        assert_eq!(outcome.kind, None);
        assert_eq!(fix, before);
    }

    #[test]
    fn test_negative_satellite_count() {
        let line = "$PASHR,SAT,-2,10,20,30,40,U,11,21*00";
        let (fix, _) = feed(line);
        assert_eq!(fix.status.satellites_visible, 0);
        assert!(fix.status.satellite_visible_prn.is_empty());
    }

    #[test]
    fn test_unrecognized_sentence_does_not_mutate() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        interp.process_line(&mut fix, POS);
        interp.process_line(&mut fix, SAT);
        let before = fix.clone();

        let outcome = interp.process_line(
            &mut fix,
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
        );
        assert_eq!(outcome.kind, Some(SentenceKind::Unrecognized));
        assert!(!outcome.utc_changed);
        assert_eq!(fix, before);
    }

    #[test]
    fn test_single_field_lines_are_discarded() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();
        for line in ["", "\r\n", "$PASHR", "garbage*00"] {
            let outcome = interp.process_line(&mut fix, line);
            assert_eq!(outcome.kind, None);
        }
        assert_eq!(fix, GpsFix::new());
    }

    #[test]
    fn test_utc_change_tracking() {
        let mut fix = GpsFix::new();
        let mut interp = SentenceInterpreter::new();

        assert!(interp.process_line(&mut fix, POS).utc_changed);
        assert!(!interp.process_line(&mut fix, POS).utc_changed);
        // GST with the same time does not count as a change
        assert!(!interp.process_line(&mut fix, GST).utc_changed);
        let later = GST.replace("151230.50", "151230.60");
        assert!(interp.process_line(&mut fix, &later).utc_changed);
        assert_eq!(interp.utc_time(), 151230.6);
    }

    #[test]
    fn test_trailing_crlf_is_ignored() {
        let with_crlf = format!("{}\r\n", POS);
        let (fix, outcome) = feed(&with_crlf);
        assert_eq!(outcome.kind, Some(SentenceKind::Position));
        assert_eq!(fix.tdop, 0.9);
    }
}

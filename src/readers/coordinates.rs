//! Coordinate parsing for the notations vendors use: decimal degrees,
//! degrees-minutes-seconds with symbols, and packed degrees+decimal-minutes.

use once_cell::sync::Lazy;
use regex::Regex;

static DMS_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[°º'’"”\s]+"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "N" => Some(Hemisphere::North),
            "S" => Some(Hemisphere::South),
            "E" => Some(Hemisphere::East),
            "W" => Some(Hemisphere::West),
            _ => None,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

pub fn dms_to_dd(degrees: f64, minutes: f64, seconds: f64, hemisphere: Option<Hemisphere>) -> f64 {
    let magnitude = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
    let sign = match hemisphere {
        Some(h) => h.sign(),
        None if degrees < 0.0 => -1.0,
        None => 1.0,
    };
    magnitude * sign
}

/// Parse a single DMS coordinate such as `62°37'21.9600"N`
pub fn parse_dms(value: &str) -> Option<f64> {
    let parts: Vec<&str> = DMS_SEPARATORS
        .split(value.trim())
        .filter(|p| !p.is_empty())
        .collect();

    let (numbers, hemisphere) = match parts.last().and_then(|p| Hemisphere::parse(p)) {
        Some(h) => (&parts[..parts.len() - 1], Some(h)),
        None => (&parts[..], None),
    };

    let mut values = numbers.iter().map(|p| p.parse::<f64>().ok());
    let degrees = values.next()??;
    let minutes = values.next().unwrap_or(Some(0.0))?;
    let seconds = values.next().unwrap_or(Some(0.0))?;
    if values.next().is_some() {
        return None;
    }
    Some(dms_to_dd(degrees, minutes, seconds, hemisphere))
}

/// Parse a `lat lon` DMS pair such as `62°37'21.9600"N 150°44'42.0000"W`
pub fn parse_dms_pair(value: &str) -> Option<(f64, f64)> {
    let mut halves = value.split_whitespace();
    let lat = parse_dms(halves.next()?)?;
    let lon = parse_dms(halves.next()?)?;
    Some((lat, lon))
}

/// Parse either plain decimal degrees or a DMS string
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().or_else(|| parse_dms(trimmed))
}

/// Parse packed degrees + decimal minutes (`DDMM.MMMM` or `DDDMM.MMMM`)
/// with a separate hemisphere indicator
pub fn parse_packed_ddm(value: &str, hemisphere: Option<Hemisphere>) -> Option<f64> {
    let packed: f64 = value.trim().parse().ok()?;
    if !packed.is_finite() {
        return None;
    }
    let packed = packed.abs();
    let degrees = (packed / 100.0).trunc();
    let minutes = packed - degrees * 100.0;
    if minutes >= 60.0 {
        return None;
    }
    Some(dms_to_dd(degrees, minutes, 0.0, hemisphere))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_parse_dms_with_symbols() {
        let lat = parse_dms("62°37'21.9600\"N").unwrap();
        assert!(close(lat, 62.0 + 37.0 / 60.0 + 21.96 / 3600.0));
        let lon = parse_dms("150°44'42.0000\"W").unwrap();
        assert!(close(lon, -(150.0 + 44.0 / 60.0 + 42.0 / 3600.0)));
    }

    #[test]
    fn test_parse_dms_pair() {
        let (lat, lon) = parse_dms_pair("62°37'21.9600\"N 150°44'42.0000\"W").unwrap();
        assert!(lat > 62.6 && lat < 62.7);
        assert!(lon < -150.7 && lon > -150.8);
    }

    #[test]
    fn test_parse_coordinate_decimal_or_dms() {
        assert_eq!(parse_coordinate("-150.25"), Some(-150.25));
        assert!(close(parse_coordinate("61 30 0 N").unwrap(), 61.5));
        assert_eq!(parse_coordinate(""), None);
        assert_eq!(parse_coordinate("abc"), None);
    }

    #[test]
    fn test_parse_packed_ddm() {
        assert!(close(parse_packed_ddm("6137.5000", Some(Hemisphere::North)).unwrap(), 61.625));
        assert!(close(
            parse_packed_ddm("15044.7000", Some(Hemisphere::West)).unwrap(),
            -(150.0 + 44.7 / 60.0)
        ));
        // leading zero dropped by a spreadsheet
        assert!(close(parse_packed_ddm("9030.0", Some(Hemisphere::West)).unwrap(), -90.5));
        assert_eq!(parse_packed_ddm("6175.0", None), None);
    }
}

//! Unit conversion constants shared by the readers and kinematics.

pub const FEET_PER_METER: f64 = 3.2808399;
pub const KNOTS_PER_METER_PER_SECOND: f64 = 1.94384;
pub const MPH_PER_KNOT: f64 = 1.151;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

pub fn mph_to_knots(mph: f64) -> f64 {
    mph / MPH_PER_KNOT
}

pub fn meters_per_second_to_knots(mps: f64) -> f64 {
    mps * KNOTS_PER_METER_PER_SECOND
}

/// Parse a number that may carry a unit suffix or decoration, e.g. "120 knots", "3500 ft", "271°"
pub fn parse_leading_number(value: &str) -> Option<f64> {
    let cleaned = value.trim().replace(['°', ','], "");
    let token = cleaned.split_whitespace().next()?;
    let end = token
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    token[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_to_feet() {
        // 1000 ft is exactly 304.8 m
        assert!((meters_to_feet(304.8) - 1000.0).abs() < 1e-4);
        assert_eq!(meters_to_feet(0.0), 0.0);
    }

    #[test]
    fn test_mph_to_knots() {
        assert!((mph_to_knots(115.1) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_leading_number_with_suffix() {
        assert_eq!(parse_leading_number("120 knots"), Some(120.0));
        assert_eq!(parse_leading_number("3,500 ft"), Some(3500.0));
        assert_eq!(parse_leading_number("271°"), Some(271.0));
        assert_eq!(parse_leading_number("-12.5"), Some(-12.5));
    }

    #[test]
    fn test_parse_leading_number_rejects_garbage() {
        assert_eq!(parse_leading_number(""), None);
        assert_eq!(parse_leading_number("n/a"), None);
    }
}

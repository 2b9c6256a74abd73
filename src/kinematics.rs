//! Per-point motion derived from consecutive positions: displacement on an
//! equal-area projection, elapsed time, ground speed and initial bearing.

use crate::points::{ELAPSED_OUTLIER, HEADING_UNDEFINED, TrackPoint};
use crate::units::meters_per_second_to_knots;

const GRS80_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const GRS80_ECCENTRICITY_SQUARED: f64 = 0.006_694_380_022_90;

/// Ellipsoidal Albers equal-area conic projection (Snyder, Map Projections:
/// A Working Manual, eqs. 3-12, 14-3 to 14-6)
#[derive(Debug, Clone, Copy)]
pub struct AlbersEqualArea {
    a: f64,
    e: f64,
    e2: f64,
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersEqualArea {
    pub fn new(standard_parallel_1: f64, standard_parallel_2: f64, lat0: f64, lon0: f64) -> Self {
        let a = GRS80_SEMI_MAJOR_AXIS;
        let e2 = GRS80_ECCENTRICITY_SQUARED;
        let e = e2.sqrt();
        let m = |phi: f64| phi.cos() / (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let (phi1, phi2, phi0) = (
            standard_parallel_1.to_radians(),
            standard_parallel_2.to_radians(),
            lat0.to_radians(),
        );
        let (m1, m2) = (m(phi1), m(phi2));
        let (q0, q1, q2) = (Self::q(e, e2, phi0), Self::q(e, e2, phi1), Self::q(e, e2, phi2));
        let n = (m1 * m1 - m2 * m2) / (q2 - q1);
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).sqrt() / n;
        Self {
            a,
            e,
            e2,
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    /// NAD83 / Alaska Albers (EPSG:3338)
    pub fn alaska() -> Self {
        Self::new(55.0, 65.0, 50.0, -154.0)
    }

    fn q(e: f64, e2: f64, phi: f64) -> f64 {
        let sin_phi = phi.sin();
        let e_sin = e * sin_phi;
        (1.0 - e2) * (sin_phi / (1.0 - e2 * sin_phi * sin_phi)
            - (1.0 / (2.0 * e)) * ((1.0 - e_sin) / (1.0 + e_sin)).ln())
    }

    /// Project geographic degrees to planar meters
    pub fn project(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let q = Self::q(self.e, self.e2, latitude.to_radians());
        let rho = self.a * (self.c - self.n * q).sqrt() / self.n;
        let theta = self.n * (longitude.to_radians() - self.lon0);
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }

    /// Planar distance in meters between two geographic positions
    pub fn distance_m(&self, from: (f64, f64), to: (f64, f64)) -> f64 {
        let (x1, y1) = self.project(from.0, from.1);
        let (x2, y2) = self.project(to.0, to.1);
        ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
    }
}

/// Initial great-circle bearing from the first position to the second, 0..360
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Elapsed time usable for a speed estimate. Zero, negative and gaps longer
/// than the segmentation threshold collapse to [`ELAPSED_OUTLIER`].
pub fn usable_elapsed(elapsed_seconds: Option<i64>, gap_minutes: u32) -> i64 {
    match elapsed_seconds {
        Some(s) if s > 0 && s <= i64::from(gap_minutes) * 60 => s,
        _ => ELAPSED_OUTLIER,
    }
}

/// Ground speed in knots rounded to an integer, zero when it cannot be derived
pub fn speed_knots(displacement_m: Option<f64>, elapsed: i64) -> i32 {
    match displacement_m {
        Some(d) if elapsed > 0 && d.is_finite() => {
            let knots = meters_per_second_to_knots(d / elapsed as f64).round();
            if knots > 0.0 { knots as i32 } else { 0 }
        }
        _ => 0,
    }
}

fn round_heading(degrees: f64) -> i32 {
    (degrees.round() as i32).rem_euclid(360)
}

/// Fill displacement and elapsed time for every point relative to its
/// predecessor in the given order, and derive speed and heading where the
/// source did not supply them. Points must already be sorted by time.
///
/// The first point has no predecessor and gets [`ELAPSED_OUTLIER`]. Every
/// other point keeps its measured elapsed time, zero included, since noise
/// removal matches on it; the sentinel only replaces it as the speed input.
pub fn derive(points: Vec<TrackPoint>, gap_minutes: u32, projection: &AlbersEqualArea) -> Vec<TrackPoint> {
    let mut previous: Option<(f64, f64, chrono::DateTime<chrono::Utc>)> = None;
    points
        .into_iter()
        .map(|mut point| {
            match previous {
                Some((lat, lon, utc)) => {
                    let displacement =
                        projection.distance_m((lat, lon), (point.latitude, point.longitude));
                    let elapsed = (point.utc_datetime - utc).num_seconds();
                    point.displacement_m = Some(displacement);
                    point.elapsed_seconds = Some(elapsed);
                    if point.knots.is_none() {
                        point.knots = Some(speed_knots(
                            Some(displacement),
                            usable_elapsed(Some(elapsed), gap_minutes),
                        ));
                    }
                    if point.heading.is_none() {
                        point.heading = Some(round_heading(initial_bearing(
                            lat,
                            lon,
                            point.latitude,
                            point.longitude,
                        )));
                    }
                }
                None => {
                    point.displacement_m = None;
                    point.elapsed_seconds = Some(ELAPSED_OUTLIER);
                    point.knots.get_or_insert(0);
                    point.heading.get_or_insert(HEADING_UNDEFINED);
                }
            }
            previous = Some((point.latitude, point.longitude, point.utc_datetime));
            point
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn point(minute_offset: i64, lat: f64, lon: f64) -> TrackPoint {
        let utc = Utc.with_ymd_and_hms(2021, 7, 4, 18, 0, 0).unwrap() + Duration::minutes(minute_offset);
        let local = NaiveDate::from_ymd_opt(2021, 7, 4).unwrap().and_hms_opt(10, 0, 0).unwrap()
            + Duration::minutes(minute_offset);
        TrackPoint::new(utc, local, lat, lon)
    }

    #[test]
    fn test_alaska_albers_origin() {
        let proj = AlbersEqualArea::alaska();
        let (x, y) = proj.project(50.0, -154.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_albers_distance_matches_geodesic_scale() {
        // One degree of latitude near Denali is about 111.4 km
        let proj = AlbersEqualArea::alaska();
        let d = proj.distance_m((63.0, -151.0), (64.0, -151.0));
        assert!((d - 111_400.0).abs() < 1_500.0, "{d}");
    }

    #[test]
    fn test_initial_bearing_cardinal_directions() {
        assert!((initial_bearing(61.0, -150.0, 62.0, -150.0) - 0.0).abs() < 1e-9);
        assert!((initial_bearing(61.0, -150.0, 60.0, -150.0) - 180.0).abs() < 1e-9);
        let east = initial_bearing(0.0, 0.0, 0.0, 1.0);
        assert!((east - 90.0).abs() < 1e-9);
        let west = initial_bearing(0.0, 0.0, 0.0, -1.0);
        assert!((west - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_usable_elapsed_sentinels() {
        assert_eq!(usable_elapsed(Some(60), 15), 60);
        assert_eq!(usable_elapsed(Some(0), 15), ELAPSED_OUTLIER);
        assert_eq!(usable_elapsed(None, 15), ELAPSED_OUTLIER);
        assert_eq!(usable_elapsed(Some(15 * 60 + 1), 15), ELAPSED_OUTLIER);
        assert_eq!(usable_elapsed(Some(15 * 60), 15), 900);
    }

    #[test]
    fn test_speed_knots_clamps() {
        assert_eq!(speed_knots(Some(1000.0), ELAPSED_OUTLIER), 0);
        assert_eq!(speed_knots(None, 60), 0);
        // 100 m/s is 194.384 knots
        assert_eq!(speed_knots(Some(6000.0), 60), 194);
    }

    #[test]
    fn test_derive_fills_missing_motion() {
        let points = vec![point(0, 63.0, -151.0), point(1, 63.02, -151.0)];
        let derived = derive(points, 15, &AlbersEqualArea::alaska());
        assert_eq!(derived[0].heading, Some(HEADING_UNDEFINED));
        assert_eq!(derived[0].knots, Some(0));
        assert_eq!(derived[0].elapsed_seconds, Some(ELAPSED_OUTLIER));
        assert!(derived[0].displacement_m.is_none());
        assert_eq!(derived[1].heading, Some(0));
        assert_eq!(derived[1].elapsed_seconds, Some(60));
        // ~2.2 km in one minute is ~72 knots
        let knots = derived[1].knots.unwrap();
        assert!((70..=74).contains(&knots), "{knots}");
    }

    #[test]
    fn test_derive_keeps_source_motion() {
        let mut second = point(1, 63.02, -151.0);
        second.knots = Some(88);
        second.heading = Some(12);
        let derived = derive(vec![point(0, 63.0, -151.0), second], 15, &AlbersEqualArea::alaska());
        assert_eq!(derived[1].knots, Some(88));
        assert_eq!(derived[1].heading, Some(12));
        assert!(derived[1].displacement_m.is_some());
    }

    #[test]
    fn test_derive_long_gap_gives_zero_speed() {
        let derived = derive(
            vec![point(0, 63.0, -151.0), point(40, 63.5, -151.0)],
            15,
            &AlbersEqualArea::alaska(),
        );
        assert_eq!(derived[1].knots, Some(0));
        assert_eq!(derived[1].elapsed_seconds, Some(40 * 60));
    }
}

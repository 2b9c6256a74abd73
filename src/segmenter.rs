use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::points::TrackPoint;
use crate::timestamps::floor_to_minutes;

pub const FLIGHT_ID_TIME_FORMAT: &str = "%Y%m%d%H%M";

/// `<REGISTRATION>_<YYYYMMDDHHMM>` with the departure floored to the segmentation granularity
pub fn flight_id(registration: &str, departure: NaiveDateTime, gap_minutes: u32) -> String {
    format!(
        "{}_{}",
        registration,
        floor_to_minutes(departure, gap_minutes).format(FLIGHT_ID_TIME_FORMAT)
    )
}

/// True when `point` must start a new segment after `previous`
pub fn is_breakpoint(previous: &TrackPoint, point: &TrackPoint, gap_minutes: u32) -> bool {
    let delta_minutes =
        (point.local_datetime - previous.local_datetime).num_milliseconds() as f64 / 60_000.0;
    point.is_new_segment || delta_minutes >= f64::from(gap_minutes)
}

/// Sort by local time and number the segments. The first point opens segment
/// 0 and every breakpoint after it increments the id by one.
pub fn assign_segments(mut points: Vec<TrackPoint>, gap_minutes: u32) -> Vec<TrackPoint> {
    points.sort_by_key(|p| p.local_datetime);

    let mut segment_id = 0u32;
    for i in 0..points.len() {
        if i > 0 && is_breakpoint(&points[i - 1], &points[i], gap_minutes) {
            segment_id += 1;
        }
        points[i].segment_id = segment_id;
    }
    points
}

/// Time window and identity of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment_id: u32,
    pub flight_id: String,
    pub registration: String,
    pub departure_datetime: NaiveDateTime,
    pub landing_datetime: NaiveDateTime,
    pub point_count: usize,
}

impl SegmentSummary {
    pub fn duration_hrs(&self) -> f64 {
        (self.landing_datetime - self.departure_datetime).num_seconds() as f64 / 3600.0
    }
}

/// One summary per segment id present in `points`, ordered by segment id
pub fn summarize(points: &[TrackPoint], gap_minutes: u32) -> Vec<SegmentSummary> {
    let mut windows: BTreeMap<u32, (NaiveDateTime, NaiveDateTime, usize, &str)> = BTreeMap::new();
    for p in points {
        windows
            .entry(p.segment_id)
            .and_modify(|(departure, landing, count, _)| {
                *departure = (*departure).min(p.local_datetime);
                *landing = (*landing).max(p.local_datetime);
                *count += 1;
            })
            .or_insert((p.local_datetime, p.local_datetime, 1, p.registration.as_str()));
    }

    windows
        .into_iter()
        .map(|(segment_id, (departure, landing, point_count, registration))| SegmentSummary {
            segment_id,
            flight_id: flight_id(registration, departure, gap_minutes),
            registration: registration.to_string(),
            departure_datetime: departure,
            landing_datetime: landing,
            point_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> TrackPoint {
        let local = NaiveDate::from_ymd_opt(2021, 7, 4)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        let utc = Utc.from_utc_datetime(&(local + Duration::hours(8)));
        let mut p = TrackPoint::new(utc, local, 63.0 + minute as f64 / 100.0, -151.0);
        p.registration = "N123AB".to_string();
        p
    }

    #[test]
    fn test_end_to_end_three_points() {
        let points = assign_segments(vec![at(10, 0), at(10, 5), at(10, 40)], 15);
        let ids: Vec<u32> = points.iter().map(|p| p.segment_id).collect();
        assert_eq!(ids, vec![0, 0, 1]);

        let segments = summarize(&points, 15);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].flight_id, "N123AB_202107041000");
        assert_eq!(segments[0].point_count, 2);
        assert_eq!(segments[1].flight_id, "N123AB_202107041030");
        assert_eq!(segments[1].duration_hrs(), 0.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let points = assign_segments(vec![at(10, 40), at(10, 0), at(10, 5)], 15);
        let minutes: Vec<_> = points.iter().map(|p| p.local_datetime).collect();
        assert!(minutes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(points[2].segment_id, 1);
    }

    #[test]
    fn test_gap_exactly_threshold_breaks() {
        let points = assign_segments(vec![at(10, 0), at(10, 15), at(10, 29)], 15);
        let ids: Vec<u32> = points.iter().map(|p| p.segment_id).collect();
        assert_eq!(ids, vec![0, 1, 1]);
    }

    #[test]
    fn test_manual_split_flag_breaks() {
        let mut split = at(10, 2);
        split.is_new_segment = true;
        let points = assign_segments(vec![at(10, 0), split, at(10, 4)], 15);
        let ids: Vec<u32> = points.iter().map(|p| p.segment_id).collect();
        assert_eq!(ids, vec![0, 1, 1]);
    }

    #[test]
    fn test_split_flag_on_first_point_does_not_skip_zero() {
        let mut first = at(10, 0);
        first.is_new_segment = true;
        let points = assign_segments(vec![first, at(10, 1)], 15);
        assert_eq!(points[0].segment_id, 0);
        assert_eq!(points[1].segment_id, 0);
    }

    #[test]
    fn test_boundary_iff_gap_or_flag() {
        // Irregular minutes with a flag sprinkled in
        let minutes = [0u32, 3, 20, 21, 22, 50, 51, 58];
        let mut points: Vec<TrackPoint> = minutes.iter().map(|m| at(9 + m / 60, m % 60)).collect();
        points[4].is_new_segment = true;
        let points = assign_segments(points, 15);

        for i in 1..points.len() {
            let boundary = points[i].segment_id != points[i - 1].segment_id;
            assert_eq!(boundary, is_breakpoint(&points[i - 1], &points[i], 15), "point {i}");
            let step = points[i].segment_id - points[i - 1].segment_id;
            assert!(step <= 1);
        }
        assert_eq!(points.last().unwrap().segment_id, 3);
    }
}

use kml::Kml;
use kml::types::Element;
use std::path::Path;
use tracing::warn;

use super::TrackReader;
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::parse_utc;
use crate::units::meters_to_feet;

/// Parse a `gx:coord` value, "lon lat [ele]" with elevation in meters
fn parse_coord(value: &str) -> Option<(f64, f64, Option<f64>)> {
    let mut parts = value.split_whitespace().map(|p| p.parse::<f64>().ok());
    let lon = parts.next()??;
    let lat = parts.next()??;
    let ele = parts.next().flatten();
    Some((lon, lat, ele))
}

/// Element name without its namespace prefix
fn local_name(element: &Element) -> &str {
    element.name.rsplit(':').next().unwrap_or(&element.name)
}

/// Every `gx:Track` below an extension element, such as a `gx:MultiTrack`
fn collect_tracks<'a>(element: &'a Element, tracks: &mut Vec<&'a Element>) {
    if local_name(element) == "Track" {
        tracks.push(element);
        return;
    }
    for child in &element.children {
        collect_tracks(child, tracks);
    }
}

/// Google Earth style `gx:Track` documents, where each track lists its
/// `when` timestamps and `gx:coord` positions as parallel sequences.
/// The kml crate keeps these extension elements as generic `Element`s.
pub struct KmlReader;

impl KmlReader {
    fn find_tracks<'a>(node: &'a Kml, tracks: &mut Vec<&'a Element>) {
        match node {
            Kml::KmlDocument(document) => {
                for child in &document.elements {
                    Self::find_tracks(child, tracks);
                }
            }
            Kml::Document { elements, .. } => {
                for child in elements {
                    Self::find_tracks(child, tracks);
                }
            }
            Kml::Folder(folder) => {
                for child in &folder.elements {
                    Self::find_tracks(child, tracks);
                }
            }
            Kml::Placemark(placemark) => {
                for child in &placemark.children {
                    collect_tracks(child, tracks);
                }
            }
            Kml::Element(element) => collect_tracks(element, tracks),
            _ => {}
        }
    }

    fn track_points(track: &Element, first_track: bool, path: &Path, points: &mut Vec<RawPoint>) {
        let values = |name: &str| -> Vec<&str> {
            track
                .children
                .iter()
                .filter(|c| local_name(c) == name)
                .map(|c| c.content.as_deref().unwrap_or("").trim())
                .collect()
        };
        let whens = values("when");
        let coords = values("coord");
        if whens.len() != coords.len() {
            warn!(
                "gx:Track in {:?} has {} timestamps but {} coordinates; extra entries ignored",
                path,
                whens.len(),
                coords.len()
            );
        }
        for (i, (when, coord)) in whens.iter().zip(coords.iter()).enumerate() {
            let position = parse_coord(coord);
            points.push(RawPoint {
                utc_datetime: parse_utc(when),
                latitude: position.map(|(_, lat, _)| lat),
                longitude: position.map(|(lon, _, _)| lon),
                altitude_ft: position.and_then(|(_, _, ele)| ele).map(meters_to_feet),
                is_new_segment: i == 0 && !first_track,
                ..Default::default()
            });
        }
    }

    fn parse(text: &str, path: &Path) -> Result<Vec<RawPoint>> {
        let document: Kml = text.parse().map_err(|e: kml::Error| ImportError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut tracks = Vec::new();
        Self::find_tracks(&document, &mut tracks);

        let mut points = Vec::new();
        for (i, track) in tracks.iter().enumerate() {
            Self::track_points(track, i == 0, path, &mut points);
        }
        Ok(points)
    }
}

impl TrackReader for KmlReader {
    fn format(&self) -> &'static str {
        "kml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["kml"]
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let text = std::fs::read_to_string(path)?;
        let points = Self::parse(&text, path)?;
        if points.is_empty() {
            return Err(ImportError::MissingColumns {
                missing: vec!["gx:Track".to_string()],
                found: Vec::new(),
            });
        }
        Ok(RawTrack::new(self.format(), points))
    }
}

//! FILENAME: core/engine/src/distance.rs
//! PURPOSE: The metric used by NEAREST axes.
//! CONTEXT: Numbers use absolute difference, dates the difference in
//! seconds, text the Levenshtein distance (case-insensitive), planar points
//! the Euclidean distance and lat/lon points the great-circle distance in
//! kilometres. Values of different kinds have no distance.

use crate::value::{CubeValue, Point};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

pub trait Distance {
    fn distance(&self, other: &Self) -> Option<f64>;
}

impl Distance for Point {
    fn distance(&self, other: &Point) -> Option<f64> {
        match (self, other) {
            (Point::Xy { x: x1, y: y1 }, Point::Xy { x: x2, y: y2 }) => {
                Some(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt())
            }
            (Point::Xyz { x: x1, y: y1, z: z1 }, Point::Xyz { x: x2, y: y2, z: z2 }) => {
                Some(((x1 - x2).powi(2) + (y1 - y2).powi(2) + (z1 - z2).powi(2)).sqrt())
            }
            (Point::LatLon { lat: lat1, lon: lon1 }, Point::LatLon { lat: lat2, lon: lon2 }) => {
                Some(haversine_km(*lat1, *lon1, *lat2, *lon2))
            }
            _ => None,
        }
    }
}

impl Distance for CubeValue {
    fn distance(&self, other: &CubeValue) -> Option<f64> {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => Some((a.as_f64()? - b.as_f64()?).abs()),
            (CubeValue::Date(a), CubeValue::Date(b)) => {
                Some((*a - *b).num_milliseconds().abs() as f64 / 1000.0)
            }
            (CubeValue::Text(a), CubeValue::Text(b)) => {
                Some(levenshtein(&a.to_lowercase(), &b.to_lowercase()) as f64)
            }
            (CubeValue::Point(a), CubeValue::Point(b)) => a.distance(b),
            _ => None,
        }
    }
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Edit distance over chars with a single rolling row.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == *cb { 0 } else { 1 };
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + cost);
            diag = above;
        }
    }
    row[b_chars.len()]
}

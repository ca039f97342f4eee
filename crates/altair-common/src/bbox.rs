//! Bounding box type and the spatial filter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Axis-aligned lon/lat box `[west, south, east, north]` in WGS84 degrees.
///
/// Serializes as the four-element array used by STAC and GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 4]")]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its edges.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Parse a comma separated "west,south,east,north" string.
    pub fn from_csv(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Lenient extraction from a JSON `bbox` member.
    ///
    /// Accepts 2D (`[w, s, e, n]`) and 3D (`[w, s, zmin, e, n, zmax]`) boxes.
    /// Anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let numbers: Vec<f64> = value
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()?;

        Self::try_from(numbers).ok()
    }

    /// Envelope of a GeoJSON geometry's coordinates.
    ///
    /// Walks nested coordinate arrays of any geometry type, including the
    /// members of a `GeometryCollection`. `None` when no position is found.
    pub fn from_geometry(geometry: &Value) -> Option<Self> {
        let mut envelope: Option<Self> = None;
        let mut extend = |lon: f64, lat: f64| {
            envelope = Some(match envelope {
                None => Self::new(lon, lat, lon, lat),
                Some(b) => Self::new(b.west.min(lon), b.south.min(lat), b.east.max(lon), b.north.max(lat)),
            });
        };

        match geometry.get("geometries").and_then(Value::as_array) {
            Some(members) => {
                for bbox in members.iter().filter_map(Self::from_geometry) {
                    extend(bbox.west, bbox.south);
                    extend(bbox.east, bbox.north);
                }
            }
            None => visit_positions(geometry.get("coordinates")?, &mut extend),
        }
        envelope
    }

    /// True when west <= east and south <= north.
    pub fn is_well_formed(&self) -> bool {
        self.west <= self.east && self.south <= self.north
    }

    /// Width of the box in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the box in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check if this bbox intersects another. Touching edges and corners count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        intersects(self, other)
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// Spatial filter used by every connector.
///
/// Two boxes are disjoint only if one lies strictly west, east, south or north
/// of the other; shared edges intersect.
pub fn intersects(item: &BoundingBox, filter: &BoundingBox) -> bool {
    !(item.east < filter.west
        || item.west > filter.east
        || item.north < filter.south
        || item.south > filter.north)
}

fn visit_positions(coordinates: &Value, visit: &mut impl FnMut(f64, f64)) {
    let Some(array) = coordinates.as_array() else {
        return;
    };
    match (array.first().and_then(Value::as_f64), array.get(1).and_then(Value::as_f64)) {
        (Some(lon), Some(lat)) => visit(lon, lat),
        _ => array.iter().for_each(|nested| visit_positions(nested, visit)),
    }
}

impl TryFrom<Vec<f64>> for BoundingBox {
    type Error = BboxParseError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [w, s, e, n] => Ok(Self::new(*w, *s, *e, *n)),
            [w, s, _, e, n, _] => Ok(Self::new(*w, *s, *e, *n)),
            _ => Err(BboxParseError::WrongLength(values.len())),
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bbox format: {0}. Expected 'west,south,east,north'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),

    #[error("bbox must have 4 or 6 values, got {0}")]
    WrongLength(usize),
}

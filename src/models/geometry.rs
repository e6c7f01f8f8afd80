use serde::{Deserialize, Serialize};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl From<(f64, f64, f64, f64)> for Bounds {
    fn from(extent: (f64, f64, f64, f64)) -> Self {
        Bounds {
            west: extent.0,
            south: extent.1,
            east: extent.2,
            north: extent.3,
        }
    }
}

/// Area of interest used by every catalog entry that does not carry its own.
pub const DEFAULT_AOI_BOUNDS: Bounds = Bounds {
    west: -122.071,
    south: 37.364,
    east: -121.891,
    north: 37.492,
};

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl Bounds {
    /// Centre of the box. Boxes crossing the antimeridian (west > east) wrap.
    pub fn center(&self) -> GeoPoint {
        let east = if self.east < self.west {
            self.east + 360.0
        } else {
            self.east
        };
        let mut lon = (self.west + east) / 2.0;
        if lon > 180.0 {
            lon -= 360.0;
        }
        GeoPoint {
            lon,
            lat: (self.south + self.north) / 2.0,
        }
    }

    pub fn south_west(&self) -> GeoPoint {
        GeoPoint {
            lon: self.west,
            lat: self.south,
        }
    }

    pub fn north_east(&self) -> GeoPoint {
        GeoPoint {
            lon: self.east,
            lat: self.north,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_of_default_aoi() {
        let c = DEFAULT_AOI_BOUNDS.center();
        assert!((c.lon - -121.981).abs() < 1e-9);
        assert!((c.lat - 37.428).abs() < 1e-9);
    }

    #[test]
    fn test_center_wraps_antimeridian() {
        let b = Bounds::from((170.0, -10.0, -170.0, 10.0));
        let c = b.center();
        assert!((c.lon.abs() - 180.0).abs() < 1e-9);
        assert_eq!(c.lat, 0.0);
    }
}

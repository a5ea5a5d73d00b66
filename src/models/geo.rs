use serde::{Deserialize, Serialize};

/// WGS84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Simple (non self-intersecting) polygon boundary. The ring is implicitly closed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPolygon {
    pub vertices: Vec<GeoPoint>,
}

impl GeoPolygon {
    pub fn new(vertices: Vec<GeoPoint>) -> Self {
        Self { vertices }
    }

    /// Distinct vertices, ignoring an explicit closing point
    fn ring(&self) -> &[GeoPoint] {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) if self.vertices.len() > 1 && first == last => {
                &self.vertices[..self.vertices.len() - 1]
            }
            _ => &self.vertices,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let ring = self.ring();
        if ring.len() < 3 {
            return Err(format!(
                "Polygon needs at least 3 distinct vertices, got {}",
                ring.len()
            ));
        }
        if let Some(bad) = ring.iter().find(|p| !p.is_valid()) {
            return Err(format!("Vertex out of range: ({}, {})", bad.lat, bad.lon));
        }
        Ok(())
    }

    /// Ray-casting point-in-polygon test
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let ring = self.ring();
        if ring.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[j]);
            if (a.lat > point.lat) != (b.lat > point.lat)
                && point.lon < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Approximate area in hectares (equirectangular projection, fine at field scale)
    pub fn area_hectares(&self) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;
        let ring = self.ring();
        if ring.len() < 3 {
            return 0.0;
        }
        let mean_lat = ring.iter().map(|p| p.lat).sum::<f64>() / ring.len() as f64;
        let cos_lat = mean_lat.to_radians().cos();
        let project = |p: &GeoPoint| {
            (
                p.lon.to_radians() * EARTH_RADIUS_M * cos_lat,
                p.lat.to_radians() * EARTH_RADIUS_M,
            )
        };

        let mut twice_area = 0.0;
        for (i, current) in ring.iter().enumerate() {
            let next = &ring[(i + 1) % ring.len()];
            let (x1, y1) = project(current);
            let (x2, y2) = project(next);
            twice_area += x1 * y2 - x2 * y1;
        }
        (twice_area.abs() / 2.0) / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> GeoPolygon {
        GeoPolygon::new(vec![
            GeoPoint::new(52.0, 5.0),
            GeoPoint::new(52.0, 5.01),
            GeoPoint::new(52.01, 5.01),
            GeoPoint::new(52.01, 5.0),
        ])
    }

    #[test]
    fn test_validate_rejects_degenerate_rings() {
        assert!(square().validate().is_ok());

        let line = GeoPolygon::new(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(1.0, 1.0),
        ]);
        assert!(line.validate().is_err());

        let out_of_range = GeoPolygon::new(vec![
            GeoPoint::new(95.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(3.0, 1.0),
        ]);
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_contains() {
        let poly = square();
        assert!(poly.contains(&GeoPoint::new(52.005, 5.005)));
        assert!(!poly.contains(&GeoPoint::new(52.02, 5.005)));
    }

    #[test]
    fn test_area_is_plausible() {
        // ~1.1km x ~0.69km at 52N
        let area = square().area_hectares();
        assert!(area > 70.0 && area < 80.0, "area was {area}");
    }
}

/// GRS80 semi-major axis (meters). Shared with WGS84.
pub const GRS80_A: f64 = 6_378_137.0;
/// GRS80 flattening.
pub const GRS80_F: f64 = 1.0 / 298.257_222_101;
/// GRS80 first eccentricity squared.
pub const GRS80_E2: f64 = GRS80_F * (2.0 - GRS80_F);

/// Geodetic position in degrees.
///
/// Photo positions arrive as WGS84 latitude/longitude. The projected frame is
/// RGF93 (GRS80), which coincides with WGS84 to well under a meter, so no
/// datum shift is applied between the two.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLon {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl LatLon {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    pub fn is_valid(self) -> bool {
        self.lat_deg.is_finite()
            && self.lon_deg.is_finite()
            && self.lat_deg.abs() < 90.0
            && self.lon_deg.abs() <= 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::{GRS80_E2, LatLon};

    const WGS84_F: f64 = 1.0 / 298.257_223_563;

    #[test]
    fn ellipsoids_agree_to_first_order() {
        let wgs84_e2 = WGS84_F * (2.0 - WGS84_F);
        assert!((wgs84_e2 - GRS80_E2).abs() < 1e-9);
    }

    #[test]
    fn rejects_poles_and_non_finite() {
        assert!(LatLon::new(48.85, 2.35).is_valid());
        assert!(!LatLon::new(90.0, 0.0).is_valid());
        assert!(!LatLon::new(f64::NAN, 0.0).is_valid());
        assert!(!LatLon::new(10.0, 181.0).is_valid());
    }
}

//! Lambert Conformal Conic (two standard parallels) on GRS80.
//!
//! The pipeline works in Lambert-93 (EPSG:2154): every photo position is
//! projected with [`to_lambert93`] before any planar geometry is done, and the
//! source vector layers are expected to already be in the same frame.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::sync::OnceLock;

use super::{GRS80_A, GRS80_E2, LatLon, Vec2};

/// CRS identifier written into package manifests.
pub const LAMBERT93_CRS: &str = "EPSG:2154";

const MAX_INVERSE_ITERATIONS: usize = 32;
const INVERSE_TOLERANCE_RAD: f64 = 1e-13;

/// Precomputed constants of a conic projection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LambertConic {
    a: f64,
    e: f64,
    lon0_rad: f64,
    false_easting: f64,
    false_northing: f64,
    n: f64,
    big_f: f64,
    rho0: f64,
}

impl LambertConic {
    /// Two-standard-parallel conic. Angles in degrees, offsets in meters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: f64,
        e2: f64,
        lat1_deg: f64,
        lat2_deg: f64,
        lat0_deg: f64,
        lon0_deg: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let e = e2.sqrt();
        let lat1 = lat1_deg.to_radians();
        let lat2 = lat2_deg.to_radians();
        let m1 = m(lat1, e);
        let m2 = m(lat2, e);
        let t1 = t(lat1, e);
        let t2 = t(lat2, e);
        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let big_f = m1 / (n * t1.powf(n));
        let rho0 = a * big_f * t(lat0_deg.to_radians(), e).powf(n);

        Self {
            a,
            e,
            lon0_rad: lon0_deg.to_radians(),
            false_easting,
            false_northing,
            n,
            big_f,
            rho0,
        }
    }

    pub fn forward(&self, geo: LatLon) -> Vec2 {
        let lat = geo.lat_deg.to_radians();
        let lon = geo.lon_deg.to_radians();
        let rho = self.a * self.big_f * t(lat, self.e).powf(self.n);
        let theta = self.n * (lon - self.lon0_rad);
        Vec2::new(
            self.false_easting + rho * theta.sin(),
            self.false_northing + self.rho0 - rho * theta.cos(),
        )
    }

    pub fn inverse(&self, p: Vec2) -> LatLon {
        let dx = p.x - self.false_easting;
        let dy = self.rho0 - (p.y - self.false_northing);
        let sign = self.n.signum();
        let rho = sign * (dx * dx + dy * dy).sqrt();
        let theta = (sign * dx).atan2(sign * dy);
        let t_val = (rho / (self.a * self.big_f)).powf(1.0 / self.n);

        let mut lat = FRAC_PI_2 - 2.0 * t_val.atan();
        for _ in 0..MAX_INVERSE_ITERATIONS {
            let es = self.e * lat.sin();
            let next = FRAC_PI_2 - 2.0 * (t_val * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
            let delta = (next - lat).abs();
            lat = next;
            if delta < INVERSE_TOLERANCE_RAD {
                break;
            }
        }
        let lon = theta / self.n + self.lon0_rad;

        LatLon::new(lat.to_degrees(), lon.to_degrees())
    }
}

fn m(lat: f64, e: f64) -> f64 {
    let s = lat.sin();
    lat.cos() / (1.0 - e * e * s * s).sqrt()
}

fn t(lat: f64, e: f64) -> f64 {
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Lambert-93 (RGF93 / EPSG:2154) parameters.
pub fn lambert93() -> &'static LambertConic {
    static PROJ: OnceLock<LambertConic> = OnceLock::new();
    PROJ.get_or_init(|| {
        LambertConic::new(
            GRS80_A,
            GRS80_E2,
            49.0,
            44.0,
            46.5,
            3.0,
            700_000.0,
            6_600_000.0,
        )
    })
}

/// WGS84 latitude/longitude to Lambert-93 meters.
pub fn to_lambert93(geo: LatLon) -> Vec2 {
    lambert93().forward(geo)
}

/// Lambert-93 meters back to latitude/longitude.
pub fn from_lambert93(p: Vec2) -> LatLon {
    lambert93().inverse(p)
}

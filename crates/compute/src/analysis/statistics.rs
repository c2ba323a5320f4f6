use foundation::math::{bearing_to_math_rad, math_rad_to_bearing};

pub struct Statistics;

impl Statistics {
    /// Mean direction of angles in radians: `atan2(sum sin, sum cos)`.
    ///
    /// The result lies in `(-pi, pi]`.
    pub fn circular_mean(angles_rad: &[f64]) -> Option<f64> {
        if angles_rad.is_empty() {
            return None;
        }
        let mut sin_sum = 0.0;
        let mut cos_sum = 0.0;
        for &a in angles_rad {
            sin_sum += a.sin();
            cos_sum += a.cos();
        }
        Some(sin_sum.atan2(cos_sum))
    }

    /// Circular mean of compass bearings, in `[0, 360)`.
    pub fn mean_bearing_deg(bearings_deg: &[f64]) -> Option<f64> {
        let angles: Vec<f64> = bearings_deg.iter().map(|b| bearing_to_math_rad(*b)).collect();
        Self::circular_mean(&angles).map(math_rad_to_bearing)
    }
}

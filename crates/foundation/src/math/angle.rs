//! Bearing conventions.
//!
//! A bearing is a compass angle in degrees: 0 = north, increasing clockwise.
//! The "math" angle is radians counter-clockwise from +x (east).

/// Wrap degrees into `[0, 360)`.
pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Compass bearing (degrees) to math angle (radians): `pi/2 - bearing`.
pub fn bearing_to_math_rad(bearing_deg: f64) -> f64 {
    (90.0 - bearing_deg).to_radians()
}

/// Math angle (radians) to compass bearing in `[0, 360)`.
pub fn math_rad_to_bearing(angle_rad: f64) -> f64 {
    normalize_bearing(90.0 - angle_rad.to_degrees())
}

/// World bearing of a click on a flat photo.
///
/// The click column is mapped linearly across the horizontal field of view,
/// centered on the camera heading.
pub fn click_bearing(
    x_px: f64,
    image_width_px: f64,
    heading_deg: f64,
    fov_deg: f64,
) -> Option<f64> {
    if image_width_px.is_nan()
        || image_width_px <= 0.0
        || !x_px.is_finite()
        || !heading_deg.is_finite()
    {
        return None;
    }
    let center = image_width_px / 2.0;
    let relative = (x_px - center) / center;
    Some(normalize_bearing(heading_deg + relative * (fov_deg / 2.0)))
}

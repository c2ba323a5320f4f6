pub mod bounds;
pub mod geometry;
pub mod math;

// Foundation crate: small, well-tested planar and geodetic primitives only.
pub use bounds::*;
pub use geometry::*;

pub mod angle;
pub mod geodesy;
pub mod lambert;
pub mod precision;
pub mod vec;

pub use angle::*;
pub use geodesy::*;
pub use lambert::*;
pub use precision::*;
pub use vec::*;

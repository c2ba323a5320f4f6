pub mod analysis;
pub mod boundary;
pub mod cluster;
pub mod observation;
pub mod resolve;
pub mod sight;

pub use boundary::*;
pub use cluster::*;
pub use observation::*;
pub use resolve::*;
pub use sight::*;

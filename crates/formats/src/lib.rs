pub mod config;
pub mod inputs;
pub mod layer;
pub mod manifest;
pub mod package;
pub mod store;

pub use config::*;
pub use inputs::*;
pub use layer::*;
pub use manifest::*;
pub use package::*;
pub use store::*;

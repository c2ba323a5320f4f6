pub mod assemble;
pub mod export;
pub mod layer;
pub mod runlog;
pub mod writer;

pub use export::*;
pub use layer::*;
pub use writer::*;

pub mod common;
pub mod event;
pub mod graph;
pub mod handle;
pub mod objects;
pub mod snapshot;

pub use common::*;
pub use event::*;
pub use graph::*;
pub use handle::*;
pub use objects::*;
pub use snapshot::*;

pub mod assembler;
pub mod identifier_table;
pub mod replay;
pub mod resolver;
pub mod session;
pub mod stats;

pub use identifier_table::*;
pub use replay::*;
pub use resolver::*;
pub use session::*;
pub use stats::*;

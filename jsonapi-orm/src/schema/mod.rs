mod index;
mod parser;
mod types;

pub use index::*;
pub use parser::*;
pub use types::*;

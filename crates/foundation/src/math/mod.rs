pub mod line;
pub mod vec;

pub use line::*;
pub use vec::*;

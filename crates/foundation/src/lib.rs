pub mod bounds;
pub mod math;

// Foundation crate: small, well-tested planar primitives only.
pub use bounds::*;
pub use math::*;

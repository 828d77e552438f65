pub mod geometry;
pub mod integer;
pub mod math_util;
pub mod transform;

pub use geometry::*;
pub use integer::{RoundInteger, round_down, round_up};
pub use math_util::*;
pub use transform::Transform;

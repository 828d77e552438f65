pub mod animation;
pub mod draw;
pub mod error;
pub mod layer;
pub mod math;

pub use draw::{
    CalcDrawPropsInputs, PropertyTrees, calculate_draw_properties,
    calculate_draw_properties_with_relations, calculate_visible_rect,
};
pub use error::{LayerTreeError, Result};
pub use layer::*;

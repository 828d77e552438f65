//! Errors reported by [`LayerTree`](crate::LayerTree) mutations.
//!
//! These are caller programming errors caught at mutation time. The draw
//! properties walk itself never fails.

use thiserror::Error;

use crate::layer::LayerId;

pub type Result<T> = std::result::Result<T, LayerTreeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerTreeError {
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),

    /// A layer was named as its own child, mask, replica, scroll or clip parent.
    #[error("layer {layer:?} cannot reference itself as its {relation}")]
    SelfReference {
        layer: LayerId,
        relation: &'static str,
    },

    #[error("adding {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: LayerId, child: LayerId },

    /// Masks and replicas are owned by exactly one layer and never sit in the
    /// child list.
    #[error("layer {layer:?} is already attached elsewhere")]
    AlreadyAttached { layer: LayerId },

    #[error("layer {child:?} is not a child of {parent:?}")]
    NotAChild { parent: LayerId, child: LayerId },
}

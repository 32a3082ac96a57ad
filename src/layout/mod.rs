//! Layout algorithms: property resolution, the group base, the stacking
//! groups, the stock participants and the subtree rebuilder.

pub mod element;
pub mod fitter;
pub mod group;
pub mod rebuilder;
pub mod stack;
pub mod utility;

use crate::tree::ElementId;

pub use element::LayoutElement;
pub use fitter::{ContentSizeFitter, FitMode};
pub use group::LayoutGroup;
pub use rebuilder::{LayoutRebuilder, LayoutRebuilderPool};
pub use stack::HorizontalOrVerticalLayoutGroup;

/// A measure, place or rebuild callback could not finish.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("element {0:?} was destroyed")]
    ElementDestroyed(ElementId),
    #[error("behaviour `{name}` on {element} is already borrowed")]
    BehaviourBusy { name: String, element: String },
    #[error("no behaviour `{name}` on {element}")]
    MissingBehaviour { name: String, element: String },
    #[error("behaviour `{name}` failed: {reason}")]
    Behaviour { name: String, reason: String },
}

impl LayoutError {
    pub fn behaviour(name: impl Into<String>, reason: impl Into<String>) -> Self {
        LayoutError::Behaviour {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

//! Resizes its own element to the element's resolved min or preferred size.

use serde::{Deserialize, Serialize};

use crate::behaviour::{Behaviour, Capabilities, LayoutController};
use crate::context::LayoutCx;
use crate::geom::Axis;
use crate::layout::group::set_property;
use crate::layout::{utility, LayoutError};
use crate::tree::{BehaviourOwner, DrivenProperties, ElementId, ElementTree};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    #[default]
    Unconstrained,
    MinSize,
    PreferredSize,
}

#[derive(Debug, Default, Clone)]
pub struct ContentSizeFitter {
    owner: Option<BehaviourOwner>,
    active: bool,
    horizontal_fit: FitMode,
    vertical_fit: FitMode,
}

impl ContentSizeFitter {
    pub fn new(horizontal_fit: FitMode, vertical_fit: FitMode) -> Self {
        Self {
            horizontal_fit,
            vertical_fit,
            ..Self::default()
        }
    }

    pub fn fit(&self, axis: Axis) -> FitMode {
        match axis {
            Axis::Horizontal => self.horizontal_fit,
            Axis::Vertical => self.vertical_fit,
        }
    }

    pub fn set_fit(&mut self, cx: &mut LayoutCx<'_>, axis: Axis, fit: FitMode) {
        let target = self.dirty_target();
        let slot = match axis {
            Axis::Horizontal => &mut self.horizontal_fit,
            Axis::Vertical => &mut self.vertical_fit,
        };
        set_property(cx, target, slot, fit);
    }

    fn dirty_target(&self) -> Option<ElementId> {
        if self.active {
            self.owner.map(|o| o.element)
        } else {
            None
        }
    }

    fn handle_self_fitting_along_axis(&self, tree: &mut ElementTree, axis: Axis) {
        let Some(owner) = self.owner else {
            return;
        };
        let size = match self.fit(axis) {
            FitMode::Unconstrained => return,
            FitMode::MinSize => utility::min_size(tree, owner.element, axis),
            FitMode::PreferredSize => utility::preferred_size(tree, owner.element, axis),
        };
        tree.drive(owner, owner.element, DrivenProperties::SIZE_DELTA);
        let _ = tree.set_size_with_current_anchors(owner.element, axis, size);
    }
}

impl LayoutController for ContentSizeFitter {
    fn set_layout(&mut self, tree: &mut ElementTree, axis: Axis) -> Result<(), LayoutError> {
        if axis == Axis::Horizontal {
            if let Some(owner) = self.owner {
                tree.clear_driven_by(owner);
            }
        }
        self.handle_self_fitting_along_axis(tree, axis);
        Ok(())
    }
}

impl Behaviour for ContentSizeFitter {
    fn name(&self) -> &'static str {
        "ContentSizeFitter"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CONTROLLER | Capabilities::SELF_CONTROLLER
    }

    fn on_attach(&mut self, owner: BehaviourOwner) {
        self.owner = Some(owner);
    }

    fn layout_controller_mut(&mut self) -> Option<&mut dyn LayoutController> {
        Some(self)
    }

    fn on_enable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = true;
        if let Some(element) = self.dirty_target() {
            cx.mark_layout_for_rebuild(element);
        }
    }

    fn on_disable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = false;
        if let Some(owner) = self.owner {
            cx.tree.clear_driven_by(owner);
            cx.mark_layout_for_rebuild(owner.element);
        }
    }

    fn on_rect_transform_dimensions_change(&mut self, cx: &mut LayoutCx<'_>) {
        if let Some(element) = self.dirty_target() {
            cx.mark_layout_for_rebuild(element);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/fitter.rs"]
mod tests;

//! Box layout: children stacked along one axis and stretched along the other.

use crate::behaviour::{Behaviour, Capabilities, LayoutController, LayoutParticipant};
use crate::context::LayoutCx;
use crate::geom::{clamp, clamp01, lerp, Axis, RectOffset, TextAnchor};
use crate::layout::group::{set_property, LayoutGroup};
use crate::layout::{utility, LayoutError};
use crate::tree::{BehaviourOwner, ElementId, ElementTree};

#[derive(Debug)]
pub struct HorizontalOrVerticalLayoutGroup {
    base: LayoutGroup,
    is_vertical: bool,
    spacing: f32,
    child_force_expand_width: bool,
    child_force_expand_height: bool,
}

impl HorizontalOrVerticalLayoutGroup {
    fn new(is_vertical: bool) -> Self {
        Self {
            base: LayoutGroup::new(),
            is_vertical,
            spacing: 0.0,
            child_force_expand_width: true,
            child_force_expand_height: true,
        }
    }

    pub fn horizontal() -> Self {
        Self::new(false)
    }

    pub fn vertical() -> Self {
        Self::new(true)
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_padding(mut self, padding: RectOffset) -> Self {
        self.base.padding = padding;
        self
    }

    pub fn with_child_alignment(mut self, alignment: TextAnchor) -> Self {
        self.base.child_alignment = alignment;
        self
    }

    pub fn with_child_force_expand(mut self, width: bool, height: bool) -> Self {
        self.child_force_expand_width = width;
        self.child_force_expand_height = height;
        self
    }

    pub fn base(&self) -> &LayoutGroup {
        &self.base
    }

    pub fn is_vertical(&self) -> bool {
        self.is_vertical
    }

    /// The axis children are laid out consecutively along.
    pub fn stacking_axis(&self) -> Axis {
        if self.is_vertical {
            Axis::Vertical
        } else {
            Axis::Horizontal
        }
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn child_force_expand(&self, axis: Axis) -> bool {
        match axis {
            Axis::Horizontal => self.child_force_expand_width,
            Axis::Vertical => self.child_force_expand_height,
        }
    }

    pub fn set_spacing(&mut self, cx: &mut LayoutCx<'_>, spacing: f32) {
        let target = self.base.dirty_target();
        set_property(cx, target, &mut self.spacing, spacing);
    }

    pub fn set_padding(&mut self, cx: &mut LayoutCx<'_>, padding: RectOffset) {
        let target = self.base.dirty_target();
        set_property(cx, target, &mut self.base.padding, padding);
    }

    pub fn set_child_alignment(&mut self, cx: &mut LayoutCx<'_>, alignment: TextAnchor) {
        let target = self.base.dirty_target();
        set_property(cx, target, &mut self.base.child_alignment, alignment);
    }

    pub fn set_child_force_expand(&mut self, cx: &mut LayoutCx<'_>, axis: Axis, expand: bool) {
        let target = self.base.dirty_target();
        let slot = match axis {
            Axis::Horizontal => &mut self.child_force_expand_width,
            Axis::Vertical => &mut self.child_force_expand_height,
        };
        set_property(cx, target, slot, expand);
    }

    fn child_sizes(&self, tree: &ElementTree, child: ElementId, axis: Axis) -> (f32, f32, f32) {
        let min = utility::min_size(tree, child, axis);
        let preferred = utility::preferred_size(tree, child, axis);
        let mut flexible = utility::flexible_size(tree, child, axis);
        if self.child_force_expand(axis) {
            flexible = flexible.max(1.0);
        }
        (min, preferred, flexible)
    }

    /// Aggregate child inputs into this group's min/preferred/flexible.
    ///
    /// Across the cross axis children overlap, so the group takes the largest
    /// child; along the stacking axis it takes the sum plus spacing.
    pub fn calc_along_axis(&mut self, tree: &ElementTree, axis: Axis) {
        let combined_padding = self.base.padding.combined(axis);

        let mut total_min = combined_padding;
        let mut total_preferred = combined_padding;
        let mut total_flexible = 0.0_f32;

        let along_other_axis = self.is_vertical ^ (axis == Axis::Vertical);
        for &child in self.base.rect_children() {
            let (min, preferred, flexible) = self.child_sizes(tree, child, axis);

            if along_other_axis {
                total_min = (min + combined_padding).max(total_min);
                total_preferred = (preferred + combined_padding).max(total_preferred);
                total_flexible = flexible.max(total_flexible);
            } else {
                total_min += min + self.spacing;
                total_preferred += preferred + self.spacing;
                total_flexible += flexible;
            }
        }

        if !along_other_axis && !self.base.rect_children().is_empty() {
            total_min -= self.spacing;
            total_preferred -= self.spacing;
        }
        total_preferred = total_preferred.max(total_min);
        self.base
            .set_layout_input_for_axis(total_min, total_preferred, total_flexible, axis);
    }

    /// Size and place every participating child along `axis`.
    pub fn set_children_along_axis(&self, tree: &mut ElementTree, axis: Axis) {
        let size = self.base.size(tree, axis);
        let along_other_axis = self.is_vertical ^ (axis == Axis::Vertical);

        if along_other_axis {
            let inner_size = size - self.base.padding.combined(axis);
            for &child in self.base.rect_children() {
                let (min, preferred, flexible) = self.child_sizes(tree, child, axis);
                let max = if flexible > 0.0 { size } else { preferred };
                let required_space = clamp(inner_size, min, max);
                let start_offset = self.base.start_offset(tree, axis, required_space);
                self.base
                    .set_child_along_axis(tree, child, axis, start_offset, required_space);
            }
            return;
        }

        let total_min = self.base.total_min_size(axis);
        let total_preferred = self.base.total_preferred_size(axis);
        let total_flexible = self.base.total_flexible_size(axis);

        let mut pos = self.base.padding.leading(axis);
        if total_flexible == 0.0 && total_preferred < size {
            pos = self.base.start_offset(
                tree,
                axis,
                total_preferred - self.base.padding.combined(axis),
            );
        }

        let mut min_max_lerp = 0.0;
        if total_min != total_preferred {
            min_max_lerp = clamp01((size - total_min) / (total_preferred - total_min));
        }

        let mut item_flexible_multiplier = 0.0;
        if size > total_preferred && total_flexible > 0.0 {
            item_flexible_multiplier = (size - total_preferred) / total_flexible;
        }

        for &child in self.base.rect_children() {
            let (min, preferred, flexible) = self.child_sizes(tree, child, axis);
            let child_size =
                lerp(min, preferred, min_max_lerp) + flexible * item_flexible_multiplier;
            self.base.set_child_along_axis(tree, child, axis, pos, child_size);
            pos += child_size + self.spacing;
        }
    }
}

impl LayoutParticipant for HorizontalOrVerticalLayoutGroup {
    fn calculate_layout_input(
        &mut self,
        tree: &mut ElementTree,
        axis: Axis,
    ) -> Result<(), LayoutError> {
        if axis == Axis::Horizontal {
            self.base.gather_rect_children(tree);
        }
        self.calc_along_axis(tree, axis);
        Ok(())
    }

    fn min_size(&self, axis: Axis) -> f32 {
        self.base.total_min_size(axis)
    }

    fn preferred_size(&self, axis: Axis) -> f32 {
        self.base.total_preferred_size(axis)
    }

    fn flexible_size(&self, axis: Axis) -> f32 {
        self.base.total_flexible_size(axis)
    }
}

impl LayoutController for HorizontalOrVerticalLayoutGroup {
    fn set_layout(&mut self, tree: &mut ElementTree, axis: Axis) -> Result<(), LayoutError> {
        self.set_children_along_axis(tree, axis);
        Ok(())
    }
}

impl Behaviour for HorizontalOrVerticalLayoutGroup {
    fn name(&self) -> &'static str {
        if self.is_vertical {
            "VerticalLayoutGroup"
        } else {
            "HorizontalLayoutGroup"
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PARTICIPANT | Capabilities::CONTROLLER | Capabilities::GROUP
    }

    fn on_attach(&mut self, owner: BehaviourOwner) {
        self.base.attach(owner);
    }

    fn layout_participant(&self) -> Option<&dyn LayoutParticipant> {
        Some(self)
    }

    fn layout_participant_mut(&mut self) -> Option<&mut dyn LayoutParticipant> {
        Some(self)
    }

    fn layout_controller_mut(&mut self) -> Option<&mut dyn LayoutController> {
        Some(self)
    }

    fn on_enable(&mut self, cx: &mut LayoutCx<'_>) {
        self.base.on_enable(cx);
    }

    fn on_disable(&mut self, cx: &mut LayoutCx<'_>) {
        self.base.on_disable(cx);
    }

    fn on_rect_transform_dimensions_change(&mut self, cx: &mut LayoutCx<'_>) {
        self.base.on_rect_transform_dimensions_change(cx);
    }

    fn on_transform_children_changed(&mut self, cx: &mut LayoutCx<'_>) {
        self.base.on_transform_children_changed(cx);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/stack.rs"]
mod tests;

//! Shared state and helpers for behaviours that arrange their children.
//!
//! Concrete groups embed a [`LayoutGroup`] and fill in the per-axis
//! aggregate during measurement; placement goes through
//! [`LayoutGroup::set_child_along_axis`] so every written child is tracked as
//! driven.

use crate::behaviour::Capabilities;
use crate::context::LayoutCx;
use crate::geom::{Axis, RectOffset, TextAnchor, Vec2};
use crate::tree::{BehaviourOwner, DrivenProperties, ElementId, ElementTree};

const CHILD_DRIVEN: DrivenProperties = DrivenProperties::ANCHORS
    .union(DrivenProperties::ANCHORED_POSITION)
    .union(DrivenProperties::SIZE_DELTA);

#[derive(Debug, Default)]
pub struct LayoutGroup {
    owner: Option<BehaviourOwner>,
    active: bool,
    pub(crate) padding: RectOffset,
    pub(crate) child_alignment: TextAnchor,
    total_min: Vec2,
    total_preferred: Vec2,
    total_flexible: Vec2,
    rect_children: Vec<ElementId>,
}

impl LayoutGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<BehaviourOwner> {
        self.owner
    }

    pub fn element(&self) -> Option<ElementId> {
        self.owner.map(|o| o.element)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn padding(&self) -> RectOffset {
        self.padding
    }

    pub fn child_alignment(&self) -> TextAnchor {
        self.child_alignment
    }

    /// Children taking part in the last measurement, in sibling order.
    pub fn rect_children(&self) -> &[ElementId] {
        &self.rect_children
    }

    pub fn total_min_size(&self, axis: Axis) -> f32 {
        self.total_min.get(axis)
    }

    pub fn total_preferred_size(&self, axis: Axis) -> f32 {
        self.total_preferred.get(axis)
    }

    pub fn total_flexible_size(&self, axis: Axis) -> f32 {
        self.total_flexible.get(axis)
    }

    pub(crate) fn attach(&mut self, owner: BehaviourOwner) {
        self.owner = Some(owner);
    }

    /// Rebuild the list of participating children and drop stale driven
    /// entries from the previous pass.
    pub fn gather_rect_children(&mut self, tree: &mut ElementTree) {
        self.rect_children.clear();
        let Some(element) = self.element() else {
            return;
        };

        for &child in tree.children(element) {
            if !tree.active_in_hierarchy(child) {
                continue;
            }
            let ignorers = tree.behaviours_with(child, Capabilities::IGNORER);
            if ignorers.is_empty() {
                self.rect_children.push(child);
                continue;
            }
            let participates = ignorers.iter().any(|b| {
                b.try_borrow()
                    .ok()
                    .and_then(|b| b.layout_ignorer().map(|i| !i.ignore_layout()))
                    .unwrap_or(false)
            });
            if participates {
                self.rect_children.push(child);
            }
        }

        if let Some(owner) = self.owner {
            tree.clear_driven_by(owner);
        }
    }

    pub fn set_layout_input_for_axis(
        &mut self,
        total_min: f32,
        total_preferred: f32,
        total_flexible: f32,
        axis: Axis,
    ) {
        self.total_min.set(axis, total_min);
        self.total_preferred.set(axis, total_preferred);
        self.total_flexible.set(axis, total_flexible);
    }

    /// Own size along `axis`.
    pub fn size(&self, tree: &ElementTree, axis: Axis) -> f32 {
        self.element()
            .map(|e| tree.rect(e).size().get(axis))
            .unwrap_or(0.0)
    }

    /// Leading position for content that needs `required_space_without_padding`
    /// along `axis`; leftover space is split by the child alignment.
    pub fn start_offset(
        &self,
        tree: &ElementTree,
        axis: Axis,
        required_space_without_padding: f32,
    ) -> f32 {
        let required_space = required_space_without_padding + self.padding.combined(axis);
        let available_space = self.size(tree, axis);
        let surplus_space = available_space - required_space;
        let alignment_on_axis = self.child_alignment.alignment_on_axis(axis);
        self.padding.leading(axis) + surplus_space * alignment_on_axis
    }

    pub fn set_child_along_axis(
        &self,
        tree: &mut ElementTree,
        child: ElementId,
        axis: Axis,
        pos: f32,
        size: f32,
    ) {
        if !tree.contains(child) {
            return;
        }
        if let Some(owner) = self.owner {
            tree.drive(owner, child, CHILD_DRIVEN);
        }
        // Only fails for dead ids, checked above.
        let _ = tree.set_inset_and_size_from_parent_edge(child, axis, pos, size);
    }

    /// True when the parent is not itself arranged by a group.
    pub fn is_root_layout_group(&self, tree: &ElementTree) -> bool {
        let Some(element) = self.element() else {
            return true;
        };
        match tree.parent(element) {
            None => true,
            Some(parent) => !tree.has_behaviour(parent, Capabilities::GROUP),
        }
    }

    pub fn set_dirty(&self, cx: &mut LayoutCx<'_>) {
        if let Some(element) = self.dirty_target() {
            cx.mark_layout_for_rebuild(element);
        }
    }

    /// The element to re-mark on a property change, if the group is live.
    pub fn dirty_target(&self) -> Option<ElementId> {
        if self.active {
            self.element()
        } else {
            None
        }
    }

    pub fn on_enable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = true;
        self.set_dirty(cx);
    }

    pub fn on_disable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = false;
        if let Some(owner) = self.owner {
            cx.tree.clear_driven_by(owner);
            cx.mark_layout_for_rebuild(owner.element);
        }
    }

    pub fn on_rect_transform_dimensions_change(&mut self, cx: &mut LayoutCx<'_>) {
        if self.is_root_layout_group(cx.tree) {
            self.set_dirty(cx);
        }
    }

    pub fn on_transform_children_changed(&mut self, cx: &mut LayoutCx<'_>) {
        self.set_dirty(cx);
    }
}

/// Store `value` into `current` if it differs, then re-mark `dirty_target`.
/// Returns whether anything changed.
pub fn set_property<T: PartialEq>(
    cx: &mut LayoutCx<'_>,
    dirty_target: Option<ElementId>,
    current: &mut T,
    value: T,
) -> bool {
    if *current == value {
        return false;
    }
    *current = value;
    if let Some(element) = dirty_target {
        cx.mark_layout_for_rebuild(element);
    }
    true
}

#[cfg(test)]
#[path = "../../tests/unit/layout/group.rs"]
mod tests;

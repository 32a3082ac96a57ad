use crate::behaviour::{Behaviour, Capabilities, LayoutIgnorer, LayoutParticipant};
use crate::context::LayoutCx;
use crate::geom::{Axis, Vec2};
use crate::layout::group::set_property;
use crate::layout::LayoutError;
use crate::tree::{BehaviourOwner, ElementId, ElementTree};

const UNSET: f32 = -1.0;

/// Explicit size overrides for one element.
///
/// Runs at priority 1 so it beats the groups and content on the same element.
/// Any axis value left negative is skipped by the resolver.
#[derive(Debug, Clone)]
pub struct LayoutElement {
    owner: Option<BehaviourOwner>,
    active: bool,
    ignore_layout: bool,
    min: Vec2,
    preferred: Vec2,
    flexible: Vec2,
    layout_priority: i32,
}

impl Default for LayoutElement {
    fn default() -> Self {
        Self {
            owner: None,
            active: false,
            ignore_layout: false,
            min: Vec2::splat(UNSET),
            preferred: Vec2::splat(UNSET),
            flexible: Vec2::splat(UNSET),
            layout_priority: 1,
        }
    }
}

impl LayoutElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min(mut self, axis: Axis, v: f32) -> Self {
        self.min.set(axis, v);
        self
    }

    pub fn with_preferred(mut self, axis: Axis, v: f32) -> Self {
        self.preferred.set(axis, v);
        self
    }

    pub fn with_flexible(mut self, axis: Axis, v: f32) -> Self {
        self.flexible.set(axis, v);
        self
    }

    pub fn with_ignore_layout(mut self, ignore: bool) -> Self {
        self.ignore_layout = ignore;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.layout_priority = priority;
        self
    }

    fn dirty_target(&self) -> Option<ElementId> {
        if self.active {
            self.owner.map(|o| o.element)
        } else {
            None
        }
    }

    fn set_dirty(&self, cx: &mut LayoutCx<'_>) {
        if let Some(element) = self.dirty_target() {
            cx.mark_layout_for_rebuild(element);
        }
    }

    pub fn set_min(&mut self, cx: &mut LayoutCx<'_>, axis: Axis, v: f32) {
        let target = self.dirty_target();
        let mut next = self.min;
        next.set(axis, v);
        set_property(cx, target, &mut self.min, next);
    }

    pub fn set_preferred(&mut self, cx: &mut LayoutCx<'_>, axis: Axis, v: f32) {
        let target = self.dirty_target();
        let mut next = self.preferred;
        next.set(axis, v);
        set_property(cx, target, &mut self.preferred, next);
    }

    pub fn set_flexible(&mut self, cx: &mut LayoutCx<'_>, axis: Axis, v: f32) {
        let target = self.dirty_target();
        let mut next = self.flexible;
        next.set(axis, v);
        set_property(cx, target, &mut self.flexible, next);
    }

    pub fn set_ignore_layout(&mut self, cx: &mut LayoutCx<'_>, ignore: bool) {
        let target = self.dirty_target();
        set_property(cx, target, &mut self.ignore_layout, ignore);
    }

    pub fn set_layout_priority(&mut self, cx: &mut LayoutCx<'_>, priority: i32) {
        let target = self.dirty_target();
        set_property(cx, target, &mut self.layout_priority, priority);
    }
}

impl LayoutParticipant for LayoutElement {
    fn calculate_layout_input(
        &mut self,
        _tree: &mut ElementTree,
        _axis: Axis,
    ) -> Result<(), LayoutError> {
        Ok(())
    }

    fn min_size(&self, axis: Axis) -> f32 {
        self.min.get(axis)
    }

    fn preferred_size(&self, axis: Axis) -> f32 {
        self.preferred.get(axis)
    }

    fn flexible_size(&self, axis: Axis) -> f32 {
        self.flexible.get(axis)
    }

    fn layout_priority(&self) -> i32 {
        self.layout_priority
    }
}

impl LayoutIgnorer for LayoutElement {
    fn ignore_layout(&self) -> bool {
        self.ignore_layout
    }
}

impl Behaviour for LayoutElement {
    fn name(&self) -> &'static str {
        "LayoutElement"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PARTICIPANT | Capabilities::IGNORER
    }

    fn on_attach(&mut self, owner: BehaviourOwner) {
        self.owner = Some(owner);
    }

    fn layout_participant(&self) -> Option<&dyn LayoutParticipant> {
        Some(self)
    }

    fn layout_participant_mut(&mut self) -> Option<&mut dyn LayoutParticipant> {
        Some(self)
    }

    fn layout_ignorer(&self) -> Option<&dyn LayoutIgnorer> {
        Some(self)
    }

    fn on_enable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = true;
        self.set_dirty(cx);
    }

    fn on_disable(&mut self, cx: &mut LayoutCx<'_>) {
        self.active = false;
        if let Some(owner) = self.owner {
            cx.mark_layout_for_rebuild(owner.element);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/element.rs"]
mod tests;

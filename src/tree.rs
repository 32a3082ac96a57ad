//! Element tree: flat arena storage with parent links, resolved rectangles and
//! the driven-property tracker.
//!
//! Ids are generational, so an id taken before `destroy` stays a valid value
//! but [`ElementTree::contains`] reports it dead. Everything that queues work
//! against an element relies on that to tell a destroyed element apart from a
//! dropped handle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::behaviour::{Behaviour, BehaviourRef, Capabilities};
use crate::geom::{Axis, Rect, Vec2};

new_key_type! { pub struct ElementId; }

/// Identifies one behaviour attachment for the lifetime of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BehaviourId(u64);

/// Passed to a behaviour when it is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BehaviourOwner {
    pub element: ElementId,
    pub behaviour: BehaviourId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("element {0:?} does not exist")]
    InvalidElement(ElementId),
    #[error("cannot parent {element:?} under its own descendant {parent:?}")]
    CycleDetected { element: ElementId, parent: ElementId },
}

bitflags! {
    /// Transform slots a layout controller claims ownership of.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DrivenProperties: u8 {
        const ANCHORS = 1 << 0;
        const ANCHORED_POSITION = 1 << 1;
        const SIZE_DELTA = 1 << 2;
    }
}

/// Placement relative to the parent rectangle.
///
/// Resolved size is `(anchor_max - anchor_min) * parent_size + size_delta`.
/// The pivot sits at `anchored_position` from the reference point
/// `lerp(anchor_min, anchor_max, pivot) * parent_size`, and the top-left
/// corner at `pivot * size` before it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectTransform {
    pub anchor_min: Vec2,
    pub anchor_max: Vec2,
    pub anchored_position: Vec2,
    pub size_delta: Vec2,
    pub pivot: Vec2,
}

impl Default for RectTransform {
    fn default() -> Self {
        Self {
            anchor_min: Vec2::ZERO,
            anchor_max: Vec2::ZERO,
            anchored_position: Vec2::ZERO,
            size_delta: Vec2::ZERO,
            pivot: Vec2::splat(0.5),
        }
    }
}

impl RectTransform {
    /// Top-left pinned rectangle of a fixed size.
    pub fn fixed(position: Vec2, size: Vec2) -> Self {
        Self {
            anchor_min: Vec2::ZERO,
            anchor_max: Vec2::ZERO,
            anchored_position: position,
            size_delta: size,
            pivot: Vec2::ZERO,
        }
    }

    /// Fills the parent.
    pub fn stretch() -> Self {
        Self {
            anchor_min: Vec2::ZERO,
            anchor_max: Vec2::ONE,
            anchored_position: Vec2::ZERO,
            size_delta: Vec2::ZERO,
            pivot: Vec2::splat(0.5),
        }
    }

    pub fn resolve(&self, parent_size: Vec2) -> Rect {
        let size = Vec2::new(
            (self.anchor_max.x - self.anchor_min.x) * parent_size.x + self.size_delta.x,
            (self.anchor_max.y - self.anchor_min.y) * parent_size.y + self.size_delta.y,
        );
        let x = self.reference(Axis::Horizontal) * parent_size.x + self.anchored_position.x
            - self.pivot.x * size.x;
        let y = self.reference(Axis::Vertical) * parent_size.y + self.anchored_position.y
            - self.pivot.y * size.y;
        Rect::new(x, y, size.x, size.y)
    }

    fn reference(&self, axis: Axis) -> f32 {
        let min = self.anchor_min.get(axis);
        min + (self.anchor_max.get(axis) - min) * self.pivot.get(axis)
    }

    fn stretches(&self) -> bool {
        self.anchor_min != self.anchor_max
    }

    /// Pin to the leading edge (left or top) of the parent along `axis`.
    pub fn set_inset_and_size_from_leading_edge(&mut self, axis: Axis, inset: f32, size: f32) {
        self.anchor_min.set(axis, 0.0);
        self.anchor_max.set(axis, 0.0);
        self.size_delta.set(axis, size);
        let pivot = self.pivot.get(axis);
        self.anchored_position.set(axis, inset + size * pivot);
    }

    pub fn set_size_with_current_anchors(&mut self, axis: Axis, size: f32, parent_size: Vec2) {
        let span = self.anchor_max.get(axis) - self.anchor_min.get(axis);
        self.size_delta.set(axis, size - parent_size.get(axis) * span);
    }
}

pub(crate) struct Attached {
    pub(crate) id: BehaviourId,
    pub(crate) enabled: bool,
    pub(crate) capabilities: Capabilities,
    pub(crate) behaviour: BehaviourRef,
}

pub struct Element {
    name: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    active_self: bool,
    transform: RectTransform,
    behaviours: Vec<Attached>,
}

impl Element {
    fn new(name: String, parent: Option<ElementId>, transform: RectTransform) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            active_self: true,
            transform,
            behaviours: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn active_self(&self) -> bool {
        self.active_self
    }

    pub fn transform(&self) -> &RectTransform {
        &self.transform
    }
}

/// Change notices produced by the tree and forwarded to behaviour hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeEvent {
    DimensionsChanged(ElementId),
    ChildrenChanged(ElementId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DrivenEntry {
    driver: BehaviourOwner,
    properties: DrivenProperties,
}

#[derive(Default)]
pub struct ElementTree {
    arena: SlotMap<ElementId, Element>,
    driven: FxHashMap<ElementId, Vec<DrivenEntry>>,
    events: VecDeque<TreeEvent>,
    next_behaviour: u64,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.arena.contains_key(id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.arena.get(id)
    }

    pub fn create(
        &mut self,
        name: impl Into<String>,
        parent: Option<ElementId>,
        transform: RectTransform,
    ) -> Result<ElementId, TreeError> {
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(TreeError::InvalidElement(parent));
            }
        }

        let id = self.arena.insert(Element::new(name.into(), parent, transform));
        if let Some(parent) = parent {
            if let Some(node) = self.arena.get_mut(parent) {
                node.children.push(id);
            }
            self.events.push_back(TreeEvent::ChildrenChanged(parent));
        }
        Ok(id)
    }

    /// Removes `id` and its whole subtree. Returns the removed ids, root first.
    pub fn destroy(&mut self, id: ElementId) -> Result<Vec<ElementId>, TreeError> {
        let parent = self.arena.get(id).ok_or(TreeError::InvalidElement(id))?.parent;
        let removed = self.subtree(id);

        if let Some(parent) = parent {
            if let Some(node) = self.arena.get_mut(parent) {
                node.children.retain(|c| *c != id);
            }
        }
        for &dead in &removed {
            self.arena.remove(dead);
            self.driven.remove(&dead);
        }
        self.driven.retain(|_, entries| {
            entries.retain(|e| !removed.contains(&e.driver.element));
            !entries.is_empty()
        });
        if let Some(parent) = parent {
            self.events.push_back(TreeEvent::ChildrenChanged(parent));
        }
        Ok(removed)
    }

    pub fn set_parent(
        &mut self,
        id: ElementId,
        new_parent: Option<ElementId>,
    ) -> Result<(), TreeError> {
        let old_parent = self.arena.get(id).ok_or(TreeError::InvalidElement(id))?.parent;
        if let Some(parent) = new_parent {
            if !self.contains(parent) {
                return Err(TreeError::InvalidElement(parent));
            }
            if self.is_ancestor_or_self(id, parent) {
                return Err(TreeError::CycleDetected { element: id, parent });
            }
        }
        if old_parent == new_parent {
            return Ok(());
        }

        let size_before = self.rect(id).size();
        if let Some(old) = old_parent {
            if let Some(node) = self.arena.get_mut(old) {
                node.children.retain(|c| *c != id);
            }
            self.events.push_back(TreeEvent::ChildrenChanged(old));
        }
        if let Some(new) = new_parent {
            if let Some(node) = self.arena.get_mut(new) {
                node.children.push(id);
            }
            self.events.push_back(TreeEvent::ChildrenChanged(new));
        }
        if let Some(node) = self.arena.get_mut(id) {
            node.parent = new_parent;
        }
        self.notify_if_resized(id, size_before);
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: ElementId, mut id: ElementId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.arena.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.arena.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Pre-order list of `id` and its descendants.
    pub fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Number of ancestor hops up to the root.
    pub fn depth(&self, id: ElementId) -> usize {
        let mut count = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            count += 1;
            current = self.parent(parent);
        }
        count
    }

    /// Slash-joined names from the root, for diagnostics.
    pub fn path(&self, id: ElementId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.arena.get(cur) else {
                break;
            };
            names.push(node.name.as_str());
            current = node.parent;
        }
        if names.is_empty() {
            return format!("<destroyed {:?}>", id);
        }
        names.reverse();
        names.join("/")
    }

    pub fn active_in_hierarchy(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        let mut seen = false;
        while let Some(cur) = current {
            let Some(node) = self.arena.get(cur) else {
                return false;
            };
            if !node.active_self {
                return false;
            }
            seen = true;
            current = node.parent;
        }
        seen
    }

    pub(crate) fn set_active_self(&mut self, id: ElementId, active: bool) -> Result<(), TreeError> {
        let node = self.arena.get_mut(id).ok_or(TreeError::InvalidElement(id))?;
        node.active_self = active;
        Ok(())
    }

    pub fn transform(&self, id: ElementId) -> Option<&RectTransform> {
        self.arena.get(id).map(|n| &n.transform)
    }

    /// Rectangle in the parent's space. Dead ids resolve to an empty rect.
    pub fn rect(&self, id: ElementId) -> Rect {
        let Some(node) = self.arena.get(id) else {
            return Rect::default();
        };
        let parent_size = node
            .parent
            .map(|p| self.rect(p).size())
            .unwrap_or(Vec2::ZERO);
        node.transform.resolve(parent_size)
    }

    pub fn world_rect(&self, id: ElementId) -> Rect {
        let local = self.rect(id);
        match self.parent(id) {
            Some(parent) => local.translate(self.world_rect(parent).position()),
            None => local,
        }
    }

    fn parent_size(&self, id: ElementId) -> Vec2 {
        self.parent(id)
            .map(|p| self.rect(p).size())
            .unwrap_or(Vec2::ZERO)
    }

    pub fn set_transform(&mut self, id: ElementId, transform: RectTransform) -> Result<(), TreeError> {
        self.update_transform(id, |t, _| *t = transform)
    }

    pub fn set_inset_and_size_from_parent_edge(
        &mut self,
        id: ElementId,
        axis: Axis,
        inset: f32,
        size: f32,
    ) -> Result<(), TreeError> {
        self.update_transform(id, |t, _| {
            t.set_inset_and_size_from_leading_edge(axis, inset, size)
        })
    }

    pub fn set_size_with_current_anchors(
        &mut self,
        id: ElementId,
        axis: Axis,
        size: f32,
    ) -> Result<(), TreeError> {
        self.update_transform(id, |t, parent_size| {
            t.set_size_with_current_anchors(axis, size, parent_size)
        })
    }

    fn update_transform(
        &mut self,
        id: ElementId,
        f: impl FnOnce(&mut RectTransform, Vec2),
    ) -> Result<(), TreeError> {
        if !self.contains(id) {
            return Err(TreeError::InvalidElement(id));
        }
        let size_before = self.rect(id).size();
        let parent_size = self.parent_size(id);
        if let Some(node) = self.arena.get_mut(id) {
            f(&mut node.transform, parent_size);
        }
        self.notify_if_resized(id, size_before);
        Ok(())
    }

    fn notify_if_resized(&mut self, id: ElementId, size_before: Vec2) {
        if self.rect(id).size() == size_before {
            return;
        }
        self.events.push_back(TreeEvent::DimensionsChanged(id));
        // Stretched children follow their parent's size.
        let mut stack: Vec<ElementId> = self.children(id).to_vec();
        while let Some(child) = stack.pop() {
            let Some(node) = self.arena.get(child) else {
                continue;
            };
            if node.transform.stretches() {
                self.events.push_back(TreeEvent::DimensionsChanged(child));
                stack.extend(node.children.iter().copied());
            }
        }
    }

    pub fn pop_event(&mut self) -> Option<TreeEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub(crate) fn attach(
        &mut self,
        id: ElementId,
        behaviour: BehaviourRef,
        capabilities: Capabilities,
    ) -> Result<BehaviourOwner, TreeError> {
        let node = self.arena.get_mut(id).ok_or(TreeError::InvalidElement(id))?;
        self.next_behaviour += 1;
        let behaviour_id = BehaviourId(self.next_behaviour);
        node.behaviours.push(Attached {
            id: behaviour_id,
            enabled: true,
            capabilities,
            behaviour,
        });
        Ok(BehaviourOwner {
            element: id,
            behaviour: behaviour_id,
        })
    }

    /// Flips a behaviour's enabled flag. Returns the previous value.
    pub(crate) fn set_behaviour_enabled(
        &mut self,
        owner: BehaviourOwner,
        enabled: bool,
    ) -> Result<bool, TreeError> {
        let node = self
            .arena
            .get_mut(owner.element)
            .ok_or(TreeError::InvalidElement(owner.element))?;
        let slot = node
            .behaviours
            .iter_mut()
            .find(|a| a.id == owner.behaviour)
            .ok_or(TreeError::InvalidElement(owner.element))?;
        let previous = slot.enabled;
        slot.enabled = enabled;
        Ok(previous)
    }

    pub(crate) fn attached(&self, id: ElementId) -> &[Attached] {
        self.arena
            .get(id)
            .map(|n| n.behaviours.as_slice())
            .unwrap_or(&[])
    }

    /// Enabled behaviours of an element that is active in hierarchy, limited
    /// to those declaring any of `capabilities`. Attachment order is kept.
    pub fn active_behaviours(&self, id: ElementId, capabilities: Capabilities) -> Vec<BehaviourRef> {
        if !self.active_in_hierarchy(id) {
            return Vec::new();
        }
        self.attached(id)
            .iter()
            .filter(|a| a.enabled && a.capabilities.intersects(capabilities))
            .map(|a| Rc::clone(&a.behaviour))
            .collect()
    }

    /// Every enabled behaviour of an element that is active in hierarchy.
    pub fn all_active_behaviours(&self, id: ElementId) -> Vec<BehaviourRef> {
        if !self.active_in_hierarchy(id) {
            return Vec::new();
        }
        self.attached(id)
            .iter()
            .filter(|a| a.enabled)
            .map(|a| Rc::clone(&a.behaviour))
            .collect()
    }

    /// Like [`Self::active_behaviours`] but also reports which ones are
    /// self-controllers.
    pub(crate) fn active_behaviours_tagged(
        &self,
        id: ElementId,
        capabilities: Capabilities,
    ) -> Vec<(Capabilities, BehaviourRef)> {
        if !self.active_in_hierarchy(id) {
            return Vec::new();
        }
        self.attached(id)
            .iter()
            .filter(|a| a.enabled && a.capabilities.intersects(capabilities))
            .map(|a| (a.capabilities, Rc::clone(&a.behaviour)))
            .collect()
    }

    pub fn has_active_behaviour(&self, id: ElementId, capabilities: Capabilities) -> bool {
        self.active_in_hierarchy(id)
            && self
                .attached(id)
                .iter()
                .any(|a| a.enabled && a.capabilities.intersects(capabilities))
    }

    /// Any attachment with `capabilities`, enabled or not.
    pub fn has_behaviour(&self, id: ElementId, capabilities: Capabilities) -> bool {
        self.attached(id)
            .iter()
            .any(|a| a.capabilities.intersects(capabilities))
    }

    pub fn behaviour_count(&self, id: ElementId) -> usize {
        self.attached(id).len()
    }

    /// Every attachment declaring any of `capabilities`, enabled or not.
    pub fn behaviours_with(&self, id: ElementId, capabilities: Capabilities) -> Vec<BehaviourRef> {
        self.attached(id)
            .iter()
            .filter(|a| a.capabilities.intersects(capabilities))
            .map(|a| Rc::clone(&a.behaviour))
            .collect()
    }

    /// First behaviour of concrete type `B` on `id`, enabled or not.
    pub fn find_behaviour<B: Behaviour>(&self, id: ElementId) -> Option<(BehaviourOwner, BehaviourRef)> {
        self.attached(id).iter().find_map(|a| {
            let matches = a.behaviour.try_borrow().map(|b| b.is::<B>()).unwrap_or(false);
            matches.then(|| {
                let owner = BehaviourOwner {
                    element: id,
                    behaviour: a.id,
                };
                (owner, Rc::clone(&a.behaviour))
            })
        })
    }

    /// Where a behaviour handle is attached, found by cell address.
    pub fn owner_of<B: Behaviour + ?Sized>(&self, behaviour: &Rc<RefCell<B>>) -> Option<BehaviourOwner> {
        let addr = Rc::as_ptr(behaviour).cast::<()>();
        self.arena.iter().find_map(|(element, node)| {
            node.behaviours
                .iter()
                .find(|a| Rc::as_ptr(&a.behaviour).cast::<()>() == addr)
                .map(|a| BehaviourOwner {
                    element,
                    behaviour: a.id,
                })
        })
    }

    /// Records that `driver` owns `properties` of `target`. Each driver keeps
    /// its own entry; other drivers' locks on the same target are untouched.
    pub fn drive(&mut self, driver: BehaviourOwner, target: ElementId, properties: DrivenProperties) {
        if !self.contains(target) {
            return;
        }
        let entries = self.driven.entry(target).or_default();
        match entries.iter_mut().find(|e| e.driver == driver) {
            Some(entry) => entry.properties |= properties,
            None => entries.push(DrivenEntry { driver, properties }),
        }
    }

    pub fn clear_driven_by(&mut self, driver: BehaviourOwner) {
        self.driven.retain(|_, entries| {
            entries.retain(|e| e.driver != driver);
            !entries.is_empty()
        });
    }

    /// Union of every driver's properties on `target`.
    pub fn driven_properties(&self, target: ElementId) -> DrivenProperties {
        self.driven
            .get(&target)
            .map(|entries| {
                entries
                    .iter()
                    .fold(DrivenProperties::empty(), |acc, e| acc | e.properties)
            })
            .unwrap_or_default()
    }

    pub fn driven_by(&self, driver: BehaviourOwner, target: ElementId) -> DrivenProperties {
        self.driven
            .get(&target)
            .and_then(|entries| entries.iter().find(|e| e.driver == driver))
            .map(|e| e.properties)
            .unwrap_or_default()
    }

    /// Drivers of `target` in the order they first claimed it.
    pub fn drivers_of(&self, target: ElementId) -> Vec<BehaviourOwner> {
        self.driven
            .get(&target)
            .map(|entries| entries.iter().map(|e| e.driver).collect())
            .unwrap_or_default()
    }
}

/// Wraps a concrete behaviour for storage in the tree.
pub fn behaviour_ref<B: Behaviour>(behaviour: B) -> (Rc<RefCell<B>>, BehaviourRef) {
    let typed = Rc::new(RefCell::new(behaviour));
    let erased: BehaviourRef = typed.clone();
    (typed, erased)
}

#[cfg(test)]
#[path = "../tests/unit/tree.rs"]
mod tests;

//! Subtree rebuild: two-pass measure/place over one layout root, plus the
//! pool of rebuild units the scheduler queues.

use std::cell::{RefCell, RefMut};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHasher;

use crate::behaviour::{Behaviour, BehaviourRef, Capabilities};
use crate::context::LayoutCx;
use crate::geom::Axis;
use crate::layout::LayoutError;
use crate::perf;
use crate::registry::{CanvasElement, CanvasElementRef, CanvasUpdate};
use crate::tree::{ElementId, ElementTree};

/// One pending rebuild of the subtree under `to_rebuild`.
///
/// Equality and hashing go through the identity cached at
/// [`LayoutRebuilder::initialize`], so two rebuilders for the same root are
/// the same queue entry even after the root is destroyed.
#[derive(Debug, Default)]
pub struct LayoutRebuilder {
    to_rebuild: Option<ElementId>,
    cached_hash: u64,
}

impl LayoutRebuilder {
    pub fn initialize(&mut self, root: ElementId) {
        self.to_rebuild = Some(root);
        self.cached_hash = root_identity(root);
    }

    pub fn clear(&mut self) {
        self.to_rebuild = None;
        self.cached_hash = 0;
    }

    pub fn root(&self) -> Option<ElementId> {
        self.to_rebuild
    }

    pub fn is_released(&self) -> bool {
        self.to_rebuild.is_none()
    }
}

impl PartialEq for LayoutRebuilder {
    fn eq(&self, other: &Self) -> bool {
        self.cached_hash == other.cached_hash
    }
}

impl Eq for LayoutRebuilder {}

impl Hash for LayoutRebuilder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cached_hash.hash(state);
    }
}

fn root_identity(root: ElementId) -> u64 {
    let mut hasher = FxHasher::default();
    "LayoutRebuilder".hash(&mut hasher);
    root.hash(&mut hasher);
    hasher.finish()
}

impl CanvasElement for LayoutRebuilder {
    fn rebuild(&mut self, cx: &mut LayoutCx<'_>, executing: CanvasUpdate) -> Result<(), LayoutError> {
        if executing != CanvasUpdate::Layout {
            return Ok(());
        }
        let Some(root) = self.to_rebuild else {
            return Ok(());
        };
        if !cx.tree.contains(root) {
            return Err(LayoutError::ElementDestroyed(root));
        }
        rebuild_layout(cx.tree, root)
    }

    fn transform(&self) -> Option<ElementId> {
        self.to_rebuild
    }

    fn is_destroyed(&self, tree: &ElementTree) -> bool {
        self.to_rebuild.map_or(true, |root| !tree.contains(root))
    }

    fn layout_complete(&mut self) {
        self.clear();
    }

    fn graphic_update_complete(&mut self) {}

    fn identity(&self) -> u64 {
        self.cached_hash
    }

    fn describe(&self, tree: &ElementTree) -> String {
        match self.to_rebuild {
            Some(root) => format!("(Layout Rebuilder for) {}", tree.path(root)),
            None => "(Layout Rebuilder for) <none>".to_string(),
        }
    }
}

/// Reusable rebuild units. A unit is free while it has no root; the
/// scheduler's layout-complete callback clears it.
#[derive(Default)]
pub struct LayoutRebuilderPool {
    rebuilders: Vec<Rc<RefCell<LayoutRebuilder>>>,
}

impl LayoutRebuilderPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rebuilders: (0..capacity)
                .map(|_| Rc::new(RefCell::new(LayoutRebuilder::default())))
                .collect(),
        }
    }

    /// A free rebuilder, allocating one when every unit is in use.
    pub fn get(&mut self) -> Rc<RefCell<LayoutRebuilder>> {
        let free = self.rebuilders.iter().find(|r| {
            Rc::strong_count(r) == 1 && r.try_borrow().is_ok_and(|r| r.is_released())
        });
        if let Some(free) = free {
            return Rc::clone(free);
        }
        let fresh = Rc::new(RefCell::new(LayoutRebuilder::default()));
        self.rebuilders.push(Rc::clone(&fresh));
        tracing::trace!(total = self.rebuilders.len(), "rebuilder pool grew");
        fresh
    }

    pub fn release(&mut self, rebuilder: &Rc<RefCell<LayoutRebuilder>>) {
        match rebuilder.try_borrow_mut() {
            Ok(mut r) => r.clear(),
            Err(_) => tracing::warn!("rebuilder busy; not released"),
        }
    }

    pub fn count_all(&self) -> usize {
        self.rebuilders.len()
    }

    pub fn count_active(&self) -> usize {
        self.count_all() - self.count_inactive()
    }

    pub fn count_inactive(&self) -> usize {
        self.rebuilders
            .iter()
            .filter(|r| r.try_borrow().is_ok_and(|r| r.is_released()))
            .count()
    }
}

/// Schedule a rebuild for the layout root that owns `id`.
///
/// Walks up while the parent carries an active layout group. When `id` is
/// its own root it must carry an active controller, otherwise nothing is
/// scheduled.
pub fn mark_layout_for_rebuild(cx: &mut LayoutCx<'_>, id: ElementId) {
    if !cx.tree.contains(id) {
        return;
    }

    let mut layout_root = id;
    while let Some(parent) = cx.tree.parent(layout_root) {
        if !valid_layout_group(cx.tree, parent) {
            break;
        }
        layout_root = parent;
    }

    if layout_root == id && !valid_controller(cx.tree, layout_root) {
        return;
    }

    mark_layout_root_for_rebuild(cx, layout_root);
}

pub fn valid_layout_group(tree: &ElementTree, id: ElementId) -> bool {
    tree.has_active_behaviour(id, Capabilities::GROUP)
}

pub fn valid_controller(tree: &ElementTree, id: ElementId) -> bool {
    tree.has_active_behaviour(id, Capabilities::CONTROLLER)
}

fn mark_layout_root_for_rebuild(cx: &mut LayoutCx<'_>, root: ElementId) {
    let rebuilder = cx.rebuilders.get();
    match rebuilder.try_borrow_mut() {
        Ok(mut r) => r.initialize(root),
        Err(_) => return,
    }
    let element: CanvasElementRef = rebuilder.clone();
    if !cx.registry.try_register_for_layout_rebuild(&element) {
        cx.rebuilders.release(&rebuilder);
    }
}

/// Run the full measure/place cycle on `root` outside the frame pass.
pub fn force_rebuild_layout_immediate(
    tree: &mut ElementTree,
    rebuilders: &mut LayoutRebuilderPool,
    root: ElementId,
) -> Result<(), LayoutError> {
    let rebuilder = rebuilders.get();
    let result = match rebuilder.try_borrow_mut() {
        Ok(mut r) => {
            r.initialize(root);
            if tree.contains(root) {
                rebuild_layout(tree, root)
            } else {
                Err(LayoutError::ElementDestroyed(root))
            }
        }
        Err(_) => Err(LayoutError::BehaviourBusy {
            name: "LayoutRebuilder".to_string(),
            element: tree.path(root),
        }),
    };
    rebuilders.release(&rebuilder);
    result
}

/// Horizontal sizes must be final before any vertical measurement starts.
pub fn rebuild_layout(tree: &mut ElementTree, root: ElementId) -> Result<(), LayoutError> {
    let _timer = perf::timer("layout.rebuild");
    perform_layout_calculation(tree, root, Axis::Horizontal)?;
    perform_layout_control(tree, root, Axis::Horizontal)?;
    perform_layout_calculation(tree, root, Axis::Vertical)?;
    perform_layout_control(tree, root, Axis::Vertical)
}

/// Bottom-up: children first, then this element's participants. A subtree
/// under an element without participants is skipped; any controller deeper
/// down is its own root.
fn perform_layout_calculation(
    tree: &mut ElementTree,
    id: ElementId,
    axis: Axis,
) -> Result<(), LayoutError> {
    let participants = tree.active_behaviours(id, Capabilities::PARTICIPANT);
    if participants.is_empty() {
        return Ok(());
    }

    let children = tree.children(id).to_vec();
    for child in children {
        perform_layout_calculation(tree, child, axis)?;
    }

    for behaviour in participants {
        let mut borrowed = borrow_mut(tree, id, &behaviour)?;
        if let Some(participant) = borrowed.layout_participant_mut() {
            participant.calculate_layout_input(tree, axis)?;
        }
    }
    Ok(())
}

/// Top-down: self-controllers, then the other controllers, then children.
fn perform_layout_control(
    tree: &mut ElementTree,
    id: ElementId,
    axis: Axis,
) -> Result<(), LayoutError> {
    let controllers = tree.active_behaviours_tagged(id, Capabilities::CONTROLLER);
    if controllers.is_empty() {
        return Ok(());
    }

    let (self_controllers, others): (Vec<_>, Vec<_>) = controllers
        .into_iter()
        .partition(|(caps, _)| caps.contains(Capabilities::SELF_CONTROLLER));

    for (_, behaviour) in self_controllers.iter().chain(others.iter()) {
        let mut borrowed = borrow_mut(tree, id, behaviour)?;
        if let Some(controller) = borrowed.layout_controller_mut() {
            controller.set_layout(tree, axis)?;
        }
    }

    let children = tree.children(id).to_vec();
    for child in children {
        perform_layout_control(tree, child, axis)?;
    }
    Ok(())
}

fn borrow_mut<'b>(
    tree: &ElementTree,
    id: ElementId,
    behaviour: &'b BehaviourRef,
) -> Result<RefMut<'b, dyn Behaviour>, LayoutError> {
    behaviour
        .try_borrow_mut()
        .map_err(|_| LayoutError::BehaviourBusy {
            name: "<busy>".to_string(),
            element: tree.path(id),
        })
}

#[cfg(test)]
#[path = "../../tests/unit/layout/rebuilder.rs"]
mod tests;

//! Host driver: owns the tree, the scheduler, the rebuilder pool and the
//! clipper registry, and routes every mutation through the behaviour hooks.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::behaviour::{Behaviour, BehaviourRef};
use crate::clipping::{ClipperRef, ClipperRegistry};
use crate::context::{FrameResources, LayoutCx};
use crate::geom::{Axis, Rect};
use crate::layout::rebuilder::{self, LayoutRebuilderPool};
use crate::layout::LayoutError;
use crate::registry::{CanvasElementRef, CanvasUpdateRegistry, RegistryError};
use crate::settings::Settings;
use crate::tree::{behaviour_ref, BehaviourId, BehaviourOwner, ElementId, ElementTree, RectTransform, TreeError};

pub struct Canvas {
    tree: ElementTree,
    registry: CanvasUpdateRegistry,
    rebuilders: LayoutRebuilderPool,
    clippers: ClipperRegistry,
    frame: u64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            tree: ElementTree::new(),
            registry: CanvasUpdateRegistry::new(),
            rebuilders: LayoutRebuilderPool::with_capacity(settings.rebuilder_pool_capacity),
            clippers: ClipperRegistry::new(),
            frame: 0,
        }
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn registry(&self) -> &CanvasUpdateRegistry {
        &self.registry
    }

    pub fn rebuilders(&self) -> &LayoutRebuilderPool {
        &self.rebuilders
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn cx(&mut self) -> LayoutCx<'_> {
        LayoutCx::new(&mut self.tree, &mut self.registry, &mut self.rebuilders)
    }

    fn flush(&mut self) {
        self.cx().flush_tree_events();
    }

    pub fn create_element(
        &mut self,
        name: impl Into<String>,
        parent: Option<ElementId>,
        transform: RectTransform,
    ) -> Result<ElementId, TreeError> {
        let id = self.tree.create(name, parent, transform)?;
        self.flush();
        Ok(id)
    }

    /// Attach `behaviour` to `id`; it is enabled right away when the element
    /// is active in hierarchy.
    pub fn add_behaviour<B: Behaviour>(
        &mut self,
        id: ElementId,
        behaviour: B,
    ) -> Result<(Rc<RefCell<B>>, BehaviourOwner), TreeError> {
        let capabilities = behaviour.capabilities();
        let (typed, erased) = behaviour_ref(behaviour);
        let owner = self.tree.attach(id, Rc::clone(&erased), capabilities)?;
        typed.borrow_mut().on_attach(owner);

        if self.tree.active_in_hierarchy(id) {
            let mut cx = self.cx();
            invoke(&mut cx, &erased, |b, cx| b.on_enable(cx));
        }
        self.flush();
        Ok((typed, owner))
    }

    pub fn set_behaviour_enabled(
        &mut self,
        owner: BehaviourOwner,
        enabled: bool,
    ) -> Result<(), TreeError> {
        let element = owner.element;
        self.change_hierarchy(element, |tree| {
            tree.set_behaviour_enabled(owner, enabled).map(|_| ())
        })
    }

    /// Toggle `active_self`. Behaviours whose effective state flips get
    /// `on_enable` / `on_disable`, and the enclosing layout is re-marked.
    pub fn set_active(&mut self, id: ElementId, active: bool) -> Result<(), TreeError> {
        self.change_hierarchy(id, |tree| tree.set_active_self(id, active))?;
        self.cx().mark_layout_for_rebuild(id);
        self.flush();
        Ok(())
    }

    pub fn set_parent(&mut self, id: ElementId, parent: Option<ElementId>) -> Result<(), TreeError> {
        self.change_hierarchy(id, |tree| tree.set_parent(id, parent))
    }

    /// Deactivate, disable and remove `id` with its subtree.
    pub fn destroy(&mut self, id: ElementId) -> Result<(), TreeError> {
        if !self.tree.contains(id) {
            return Err(TreeError::InvalidElement(id));
        }
        self.change_hierarchy(id, |tree| tree.set_active_self(id, false))?;
        let removed = self.tree.destroy(id)?;
        tracing::trace!(removed = removed.len(), "destroyed subtree");
        self.flush();
        Ok(())
    }

    /// Apply a hierarchy edit and fire enable/disable hooks for every
    /// behaviour under `root` whose effective state changed.
    fn change_hierarchy(
        &mut self,
        root: ElementId,
        change: impl FnOnce(&mut ElementTree) -> Result<(), TreeError>,
    ) -> Result<(), TreeError> {
        if !self.tree.contains(root) {
            return Err(TreeError::InvalidElement(root));
        }
        let before = self.active_behaviours_under(root);
        change(&mut self.tree)?;
        let after = self.active_behaviours_under(root);

        let before_ids: FxHashSet<BehaviourId> = before.iter().map(|(id, _)| *id).collect();
        let after_ids: FxHashSet<BehaviourId> = after.iter().map(|(id, _)| *id).collect();

        let mut cx = self.cx();
        for (id, behaviour) in &before {
            if !after_ids.contains(id) {
                invoke(&mut cx, behaviour, |b, cx| b.on_disable(cx));
            }
        }
        for (id, behaviour) in &after {
            if !before_ids.contains(id) {
                invoke(&mut cx, behaviour, |b, cx| b.on_enable(cx));
            }
        }
        cx.flush_tree_events();
        Ok(())
    }

    fn active_behaviours_under(&self, root: ElementId) -> Vec<(BehaviourId, BehaviourRef)> {
        let mut out = Vec::new();
        for id in self.tree.subtree(root) {
            if !self.tree.active_in_hierarchy(id) {
                continue;
            }
            for attached in self.tree.attached(id) {
                if attached.enabled {
                    out.push((attached.id, Rc::clone(&attached.behaviour)));
                }
            }
        }
        out
    }

    /// Replace the transform of `id`. Edits to driven slots are undone by the
    /// next layout pass.
    pub fn set_transform(&mut self, id: ElementId, transform: RectTransform) -> Result<(), TreeError> {
        self.tree.set_transform(id, transform)?;
        self.reapply_driven_properties(id);
        self.flush();
        Ok(())
    }

    pub fn set_size_with_current_anchors(
        &mut self,
        id: ElementId,
        axis: Axis,
        size: f32,
    ) -> Result<(), TreeError> {
        self.tree.set_size_with_current_anchors(id, axis, size)?;
        self.reapply_driven_properties(id);
        self.flush();
        Ok(())
    }

    fn reapply_driven_properties(&mut self, id: ElementId) {
        if !self.tree.driven_properties(id).is_empty() {
            self.cx().mark_layout_for_rebuild(id);
        }
    }

    /// Borrow a behaviour together with a [`LayoutCx`] so its setters can
    /// schedule work.
    pub fn with_behaviour<B: Behaviour, R>(
        &mut self,
        behaviour: &Rc<RefCell<B>>,
        f: impl FnOnce(&mut B, &mut LayoutCx<'_>) -> R,
    ) -> Result<R, LayoutError> {
        let result = {
            let mut borrowed = behaviour.try_borrow_mut().map_err(|_| LayoutError::BehaviourBusy {
                name: std::any::type_name::<B>().to_string(),
                element: self.owner_path(behaviour),
            })?;
            let mut cx = self.cx();
            f(&mut borrowed, &mut cx)
        };
        self.flush();
        Ok(result)
    }

    /// [`Self::with_behaviour`] for the first `B` attached to `id`.
    /// Behaviours borrowed elsewhere are not found.
    pub fn with_behaviour_on<B: Behaviour, R>(
        &mut self,
        id: ElementId,
        f: impl FnOnce(&mut B, &mut LayoutCx<'_>) -> R,
    ) -> Result<R, LayoutError> {
        let missing = |tree: &ElementTree| LayoutError::MissingBehaviour {
            name: std::any::type_name::<B>().to_string(),
            element: tree.path(id),
        };
        let Some((_, behaviour)) = self.tree.find_behaviour::<B>(id) else {
            return Err(missing(&self.tree));
        };
        let result = {
            let mut borrowed = behaviour.try_borrow_mut().map_err(|_| LayoutError::BehaviourBusy {
                name: std::any::type_name::<B>().to_string(),
                element: self.tree.path(id),
            })?;
            let Some(typed) = borrowed.downcast_mut::<B>() else {
                return Err(missing(&self.tree));
            };
            let mut cx = self.cx();
            f(typed, &mut cx)
        };
        self.flush();
        Ok(result)
    }

    /// Read-only view of the first `B` attached to `id`.
    pub fn inspect_behaviour<B: Behaviour, R>(&self, id: ElementId, f: impl FnOnce(&B) -> R) -> Option<R> {
        let (_, behaviour) = self.tree.find_behaviour::<B>(id)?;
        let borrowed = behaviour.try_borrow().ok()?;
        borrowed.downcast_ref::<B>().map(f)
    }

    fn owner_path<B: Behaviour>(&self, behaviour: &Rc<RefCell<B>>) -> String {
        self.tree
            .owner_of(behaviour)
            .map(|owner| self.tree.path(owner.element))
            .unwrap_or_else(|| "<detached>".to_string())
    }

    pub fn mark_layout_for_rebuild(&mut self, id: ElementId) {
        self.cx().mark_layout_for_rebuild(id);
    }

    pub fn register_for_layout_rebuild(&mut self, element: &CanvasElementRef) -> bool {
        self.registry.try_register_for_layout_rebuild(element)
    }

    pub fn register_for_graphic_rebuild(&mut self, element: &CanvasElementRef) -> bool {
        self.registry.try_register_for_graphic_rebuild(element)
    }

    pub fn unregister(&mut self, element: &CanvasElementRef) -> Result<(), RegistryError> {
        self.registry.unregister(element)
    }

    pub fn register_clipper(&mut self, clipper: &ClipperRef) -> bool {
        self.clippers.register(clipper)
    }

    pub fn unregister_clipper(&mut self, clipper: &ClipperRef) -> bool {
        self.clippers.unregister(clipper)
    }

    /// The once-per-frame trigger.
    pub fn will_render_canvases(&mut self) {
        self.frame += 1;
        self.flush();
        tracing::trace!(frame = self.frame, "will render canvases");
        self.registry.perform_update(FrameResources {
            tree: &mut self.tree,
            rebuilders: &mut self.rebuilders,
            clippers: &mut self.clippers,
        });
        self.flush();
    }

    /// Lay out the subtree under `root` now, outside the frame pass.
    pub fn force_rebuild_layout_immediate(&mut self, root: ElementId) -> Result<(), LayoutError> {
        let result =
            rebuilder::force_rebuild_layout_immediate(&mut self.tree, &mut self.rebuilders, root);
        self.flush();
        result
    }

    pub fn rect(&self, id: ElementId) -> Rect {
        self.tree.rect(id)
    }

    pub fn world_rect(&self, id: ElementId) -> Rect {
        self.tree.world_rect(id)
    }

    /// Notify everything still queued and drop the queues.
    pub fn teardown(&mut self) {
        tracing::debug!(
            layout = self.registry.layout_queue_len(),
            graphic = self.registry.graphic_queue_len(),
            "canvas teardown"
        );
        self.registry.teardown();
    }
}

fn invoke(
    cx: &mut LayoutCx<'_>,
    behaviour: &BehaviourRef,
    hook: impl FnOnce(&mut dyn Behaviour, &mut LayoutCx<'_>),
) {
    match behaviour.try_borrow_mut() {
        Ok(mut b) => hook(&mut *b, cx),
        Err(_) => tracing::warn!("behaviour busy; lifecycle hook skipped"),
    }
}

#[cfg(test)]
#[path = "../tests/unit/canvas.rs"]
mod tests;

//! Mutable context handed to behaviour hooks and property setters.

use crate::clipping::ClipperRegistry;
use crate::layout::rebuilder::{self, LayoutRebuilderPool};
use crate::registry::CanvasUpdateRegistry;
use crate::tree::{ElementId, ElementTree, TreeEvent};

pub struct LayoutCx<'a> {
    pub tree: &'a mut ElementTree,
    pub registry: &'a mut CanvasUpdateRegistry,
    pub rebuilders: &'a mut LayoutRebuilderPool,
}

impl<'a> LayoutCx<'a> {
    pub fn new(
        tree: &'a mut ElementTree,
        registry: &'a mut CanvasUpdateRegistry,
        rebuilders: &'a mut LayoutRebuilderPool,
    ) -> Self {
        Self {
            tree,
            registry,
            rebuilders,
        }
    }

    /// Schedule a rebuild of the outermost layout root containing `id`.
    pub fn mark_layout_for_rebuild(&mut self, id: ElementId) {
        rebuilder::mark_layout_for_rebuild(self, id);
    }

    /// Forward queued tree events to the hooks of active behaviours.
    pub fn flush_tree_events(&mut self) {
        while let Some(event) = self.tree.pop_event() {
            let element = match event {
                TreeEvent::DimensionsChanged(id) | TreeEvent::ChildrenChanged(id) => id,
            };
            for behaviour in self.tree.all_active_behaviours(element) {
                let Ok(mut behaviour) = behaviour.try_borrow_mut() else {
                    tracing::trace!(
                        element = %self.tree.path(element),
                        ?event,
                        "behaviour busy; tree event skipped"
                    );
                    continue;
                };
                match event {
                    TreeEvent::DimensionsChanged(_) => {
                        behaviour.on_rect_transform_dimensions_change(self)
                    }
                    TreeEvent::ChildrenChanged(_) => behaviour.on_transform_children_changed(self),
                }
            }
        }
    }
}

/// Everything the per-frame pass needs besides the scheduler itself.
pub struct FrameResources<'a> {
    pub tree: &'a mut ElementTree,
    pub rebuilders: &'a mut LayoutRebuilderPool,
    pub clippers: &'a mut ClipperRegistry,
}

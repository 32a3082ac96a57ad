//! Per-frame update scheduler.
//!
//! Elements queue themselves for a layout or a graphic rebuild; once per frame
//! [`CanvasUpdateRegistry::perform_update`] drains both queues in a fixed
//! order: cleanup, layout stages (parents before children), culling, graphic
//! stages. Queues hold weak handles, so a dropped element simply vanishes,
//! while an element whose tree node was destroyed is removed and still told it
//! is complete.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::context::{FrameResources, LayoutCx};
use crate::layout::rebuilder::LayoutRebuilderPool;
use crate::layout::LayoutError;
use crate::perf;
use crate::tree::{ElementId, ElementTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanvasUpdate {
    Prelayout,
    Layout,
    PostLayout,
    PreRender,
    LatePreRender,
}

impl CanvasUpdate {
    pub const LAYOUT_STAGES: [CanvasUpdate; 3] = [
        CanvasUpdate::Prelayout,
        CanvasUpdate::Layout,
        CanvasUpdate::PostLayout,
    ];

    pub const GRAPHIC_STAGES: [CanvasUpdate; 2] =
        [CanvasUpdate::PreRender, CanvasUpdate::LatePreRender];
}

/// Anything the scheduler can rebuild.
pub trait CanvasElement {
    fn rebuild(&mut self, cx: &mut LayoutCx<'_>, executing: CanvasUpdate) -> Result<(), LayoutError>;

    /// Tree node used for depth ordering and diagnostics.
    fn transform(&self) -> Option<ElementId>;

    fn layout_complete(&mut self);

    fn graphic_update_complete(&mut self);

    /// The handle is alive but what it stands for is gone.
    fn is_destroyed(&self, tree: &ElementTree) -> bool;

    /// Queue key. Two handles with the same identity are one entry.
    fn identity(&self) -> u64 {
        (self as *const Self).cast::<()>() as usize as u64
    }

    fn describe(&self, tree: &ElementTree) -> String {
        match self.transform() {
            Some(id) => tree.path(id),
            None => "<detached>".to_string(),
        }
    }
}

pub type CanvasElementRef = Rc<RefCell<dyn CanvasElement>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("cannot remove an element from the layout queue during the layout pass")]
    LayoutPassRunning,
    #[error("cannot remove an element from the graphic queue during the graphic pass")]
    GraphicPassRunning,
}

/// Only consulted for handles not already queued. A busy handle falls back
/// to the address the default `identity` reports, so an element with a custom
/// identity cannot be told apart from its cell while it is borrowed.
fn identity_of(element: &CanvasElementRef) -> u64 {
    match element.try_borrow() {
        Ok(e) => e.identity(),
        Err(_) => address_of(element) as u64,
    }
}

fn address_of(element: &CanvasElementRef) -> usize {
    Rc::as_ptr(element).cast::<()>() as usize
}

#[derive(Clone)]
struct QueueEntry {
    element: Weak<RefCell<dyn CanvasElement>>,
    key: u64,
    addr: usize,
}

impl QueueEntry {
    fn new(element: &CanvasElementRef, key: u64) -> Self {
        Self {
            element: Rc::downgrade(element),
            key,
            addr: address_of(element),
        }
    }
}

/// Insertion-ordered set with O(1) membership by identity. Keys are also
/// indexed by cell address, so a queued handle resolves without a borrow.
#[derive(Default)]
struct IndexedSet {
    entries: Vec<QueueEntry>,
    index: FxHashMap<u64, usize>,
    by_addr: FxHashMap<usize, u64>,
}

impl IndexedSet {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, i: usize) -> Option<&QueueEntry> {
        self.entries.get(i)
    }

    fn contains(&self, key: u64) -> bool {
        self.index.contains_key(&key)
    }

    fn key_at(&self, addr: usize) -> Option<u64> {
        self.by_addr.get(&addr).copied()
    }

    fn add_unique(&mut self, entry: QueueEntry) -> bool {
        if self.contains(entry.key) {
            return false;
        }
        self.index.insert(entry.key, self.entries.len());
        self.by_addr.insert(entry.addr, entry.key);
        self.entries.push(entry);
        true
    }

    fn remove(&mut self, key: u64) -> bool {
        let Some(i) = self.index.remove(&key) else {
            return false;
        };
        let entry = self.entries.remove(i);
        self.by_addr.remove(&entry.addr);
        self.reindex_from(i);
        true
    }

    fn remove_at(&mut self, i: usize) -> QueueEntry {
        let entry = self.entries.remove(i);
        self.index.remove(&entry.key);
        self.by_addr.remove(&entry.addr);
        self.reindex_from(i);
        entry
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, entry) in self.entries.iter().enumerate().skip(start) {
            self.index.insert(entry.key, i);
        }
    }

    fn clear(&mut self) -> Vec<QueueEntry> {
        self.index.clear();
        self.by_addr.clear();
        std::mem::take(&mut self.entries)
    }

    /// Stable: equal keys keep insertion order.
    fn sort_by_cached_key<K: Ord>(&mut self, mut f: impl FnMut(&QueueEntry) -> K) {
        let mut keyed: Vec<(K, QueueEntry)> =
            self.entries.drain(..).map(|e| (f(&e), e)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries = keyed.into_iter().map(|(_, e)| e).collect();
        self.reindex_from(0);
    }
}

#[derive(Default)]
pub struct CanvasUpdateRegistry {
    performing_layout_update: bool,
    performing_graphic_update: bool,
    layout_queue: IndexedSet,
    graphic_queue: IndexedSet,
}

impl CanvasUpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rebuilding_layout(&self) -> bool {
        self.performing_layout_update
    }

    pub fn is_rebuilding_graphics(&self) -> bool {
        self.performing_graphic_update
    }

    pub fn layout_queue_len(&self) -> usize {
        self.layout_queue.len()
    }

    pub fn graphic_queue_len(&self) -> usize {
        self.graphic_queue.len()
    }

    /// The key `element` was queued under, else its current identity.
    fn key_of(&self, element: &CanvasElementRef) -> u64 {
        let addr = address_of(element);
        self.layout_queue
            .key_at(addr)
            .or_else(|| self.graphic_queue.key_at(addr))
            .unwrap_or_else(|| identity_of(element))
    }

    pub fn is_queued_for_layout(&self, element: &CanvasElementRef) -> bool {
        self.layout_queue.contains(self.key_of(element))
    }

    pub fn is_queued_for_graphic(&self, element: &CanvasElementRef) -> bool {
        self.graphic_queue.contains(self.key_of(element))
    }

    pub fn register_for_layout_rebuild(&mut self, element: &CanvasElementRef) {
        self.try_register_for_layout_rebuild(element);
    }

    /// Accepted at any time, including during the layout pass: the pass
    /// re-reads the queue length and picks late arrivals up unsorted.
    pub fn try_register_for_layout_rebuild(&mut self, element: &CanvasElementRef) -> bool {
        let key = self.key_of(element);
        self.layout_queue.add_unique(QueueEntry::new(element, key))
    }

    pub fn register_for_graphic_rebuild(&mut self, element: &CanvasElementRef) {
        self.try_register_for_graphic_rebuild(element);
    }

    /// Refused while the graphic pass runs.
    pub fn try_register_for_graphic_rebuild(&mut self, element: &CanvasElementRef) -> bool {
        let key = self.key_of(element);
        if self.performing_graphic_update {
            tracing::error!(
                key,
                "element added for graphic rebuild while a graphic rebuild is running; refused"
            );
            return false;
        }
        self.graphic_queue.add_unique(QueueEntry::new(element, key))
    }

    /// Removes `element` from both queues after firing its completion
    /// callbacks. Each queue refuses while its own pass runs.
    pub fn unregister(&mut self, element: &CanvasElementRef) -> Result<(), RegistryError> {
        let key = self.key_of(element);
        let layout = self.unregister_from_layout(element, key);
        let graphic = self.unregister_from_graphic(element, key);
        layout.and(graphic)
    }

    fn unregister_from_layout(
        &mut self,
        element: &CanvasElementRef,
        key: u64,
    ) -> Result<(), RegistryError> {
        if self.performing_layout_update {
            tracing::error!(key, "element removed from the layout queue mid-pass; refused");
            return Err(RegistryError::LayoutPassRunning);
        }
        match element.try_borrow_mut() {
            Ok(mut e) => e.layout_complete(),
            Err(_) => tracing::warn!(key, "element busy; layout_complete skipped"),
        }
        self.layout_queue.remove(key);
        Ok(())
    }

    fn unregister_from_graphic(
        &mut self,
        element: &CanvasElementRef,
        key: u64,
    ) -> Result<(), RegistryError> {
        if self.performing_graphic_update {
            tracing::error!(key, "element removed from the graphic queue mid-pass; refused");
            return Err(RegistryError::GraphicPassRunning);
        }
        match element.try_borrow_mut() {
            Ok(mut e) => e.graphic_update_complete(),
            Err(_) => tracing::warn!(key, "element busy; graphic_update_complete skipped"),
        }
        self.graphic_queue.remove(key);
        Ok(())
    }

    /// One frame. Not re-entrant.
    pub fn perform_update(&mut self, resources: FrameResources<'_>) {
        let FrameResources {
            tree,
            rebuilders,
            clippers,
        } = resources;

        self.clean_invalid_items(tree);

        let layout_timer = perf::timer("frame.layout");
        self.performing_layout_update = true;
        self.layout_queue
            .sort_by_cached_key(|entry| depth_of(entry, tree));
        tracing::debug!(queued = self.layout_queue.len(), "layout pass");
        for stage in CanvasUpdate::LAYOUT_STAGES {
            let mut i = 0;
            while let Some(entry) = self.layout_queue.get(i).cloned() {
                i += 1;
                self.rebuild_entry(&entry, stage, tree, rebuilders);
            }
        }
        for entry in self.layout_queue.clear() {
            notify(&entry, |e| e.layout_complete());
        }
        self.performing_layout_update = false;
        drop(layout_timer);

        clippers.cull(tree);

        let _graphic_timer = perf::timer("frame.graphic");
        self.performing_graphic_update = true;
        tracing::debug!(queued = self.graphic_queue.len(), "graphic pass");
        for stage in CanvasUpdate::GRAPHIC_STAGES {
            let mut i = 0;
            while let Some(entry) = self.graphic_queue.get(i).cloned() {
                i += 1;
                self.rebuild_entry(&entry, stage, tree, rebuilders);
            }
        }
        // Graphic entries share the layout-complete hook.
        for entry in self.graphic_queue.clear() {
            notify(&entry, |e| e.layout_complete());
        }
        self.performing_graphic_update = false;
    }

    /// Null handles are dropped silently; destroyed ones are dropped and
    /// still get their completion callback.
    fn clean_invalid_items(&mut self, tree: &ElementTree) {
        for i in (0..self.layout_queue.len()).rev() {
            let Some(entry) = self.layout_queue.get(i) else {
                continue;
            };
            let Some(element) = entry.element.upgrade() else {
                self.layout_queue.remove_at(i);
                continue;
            };
            if is_destroyed(&element, tree) {
                self.layout_queue.remove_at(i);
                if let Ok(mut e) = element.try_borrow_mut() {
                    e.layout_complete();
                }
            }
        }

        for i in (0..self.graphic_queue.len()).rev() {
            let Some(entry) = self.graphic_queue.get(i) else {
                continue;
            };
            let Some(element) = entry.element.upgrade() else {
                self.graphic_queue.remove_at(i);
                continue;
            };
            if is_destroyed(&element, tree) {
                self.graphic_queue.remove_at(i);
                if let Ok(mut e) = element.try_borrow_mut() {
                    e.graphic_update_complete();
                }
            }
        }
    }

    fn rebuild_entry(
        &mut self,
        entry: &QueueEntry,
        stage: CanvasUpdate,
        tree: &mut ElementTree,
        rebuilders: &mut LayoutRebuilderPool,
    ) {
        let Some(element) = entry.element.upgrade() else {
            return;
        };
        if is_destroyed(&element, tree) {
            return;
        }

        let mut cx = LayoutCx::new(tree, self, rebuilders);
        let outcome = match element.try_borrow_mut() {
            Ok(mut e) => e
                .rebuild(&mut cx, stage)
                .map_err(|err| (e.describe(cx.tree), err)),
            Err(_) => {
                let label = format!("<element {:#x}>", entry.key);
                Err((
                    label.clone(),
                    LayoutError::BehaviourBusy {
                        name: "CanvasElement".to_string(),
                        element: label,
                    },
                ))
            }
        };
        // Logged and skipped; the rest of the batch still runs.
        if let Err((label, error)) = outcome {
            tracing::error!(element = %label, ?stage, %error, "rebuild failed");
        }
        cx.flush_tree_events();
    }

    /// Fire the completion callbacks of everything still queued and empty
    /// both queues.
    pub fn teardown(&mut self) {
        for entry in self.layout_queue.clear() {
            notify(&entry, |e| e.layout_complete());
        }
        for entry in self.graphic_queue.clear() {
            notify(&entry, |e| e.graphic_update_complete());
        }
        self.performing_layout_update = false;
        self.performing_graphic_update = false;
    }
}

fn is_destroyed(element: &CanvasElementRef, tree: &ElementTree) -> bool {
    element.try_borrow().is_ok_and(|e| e.is_destroyed(tree))
}

/// Hops from the element's node to the root; 0 when it has none.
fn depth_of(entry: &QueueEntry, tree: &ElementTree) -> usize {
    let Some(element) = entry.element.upgrade() else {
        return 0;
    };
    let transform = match element.try_borrow() {
        Ok(e) => e.transform(),
        Err(_) => None,
    };
    transform.map_or(0, |id| tree.depth(id))
}

fn notify(entry: &QueueEntry, callback: impl FnOnce(&mut dyn CanvasElement)) {
    let Some(element) = entry.element.upgrade() else {
        return;
    };
    match element.try_borrow_mut() {
        Ok(mut e) => callback(&mut *e),
        Err(_) => tracing::warn!(key = entry.key, "element busy; completion skipped"),
    };
}

#[cfg(test)]
#[path = "../tests/unit/registry.rs"]
mod tests;

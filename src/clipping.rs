//! Hook for the clipping collaborator. Clippers run once per frame, after
//! layout has settled and before the graphic stages.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::tree::ElementTree;

pub trait Clipper {
    fn perform_clipping(&mut self, tree: &ElementTree);
}

pub type ClipperRef = Rc<RefCell<dyn Clipper>>;

#[derive(Default)]
pub struct ClipperRegistry {
    clippers: Vec<Weak<RefCell<dyn Clipper>>>,
}

impl ClipperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `clipper` is already registered.
    pub fn register(&mut self, clipper: &ClipperRef) -> bool {
        if self.position(clipper).is_some() {
            return false;
        }
        self.clippers.push(Rc::downgrade(clipper));
        true
    }

    pub fn unregister(&mut self, clipper: &ClipperRef) -> bool {
        match self.position(clipper) {
            Some(i) => {
                self.clippers.remove(i);
                true
            }
            None => false,
        }
    }

    fn position(&self, clipper: &ClipperRef) -> Option<usize> {
        let target = Rc::downgrade(clipper);
        self.clippers.iter().position(|c| c.ptr_eq(&target))
    }

    /// Live registrations.
    pub fn len(&self) -> usize {
        self.clippers.iter().filter(|c| c.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cull(&mut self, tree: &ElementTree) {
        self.clippers.retain(|c| c.strong_count() > 0);
        for clipper in &self.clippers {
            let Some(clipper) = clipper.upgrade() else {
                continue;
            };
            match clipper.try_borrow_mut() {
                Ok(mut c) => c.perform_clipping(tree),
                Err(_) => tracing::warn!("clipper busy; skipped this frame"),
            };
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/clipping.rs"]
mod tests;

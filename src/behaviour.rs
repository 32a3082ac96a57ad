//! Behaviours attached to elements, queried by capability.
//!
//! A behaviour declares a fixed [`Capabilities`] set when it is attached. The
//! tree filters on those tags without borrowing the behaviour; the accessor
//! methods then hand out the matching trait view.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::context::LayoutCx;
use crate::geom::Axis;
use crate::layout::LayoutError;
use crate::tree::{BehaviourOwner, ElementTree};

pub type BehaviourRef = Rc<RefCell<dyn Behaviour>>;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Exposes min/preferred/flexible sizes to the parent.
        const PARTICIPANT = 1 << 0;
        /// Assigns final geometry to itself or its children.
        const CONTROLLER = 1 << 1;
        /// Controller that only touches its own rectangle; runs first.
        const SELF_CONTROLLER = 1 << 2;
        /// Can opt its element out of the parent's layout.
        const IGNORER = 1 << 3;
        /// Arranges its children; parents of nested groups defer to it.
        const GROUP = 1 << 4;
    }
}

/// Sizing inputs one behaviour contributes to its element.
///
/// Negative values mean "no opinion" and are skipped by the resolver.
pub trait LayoutParticipant {
    /// Bottom-up pass. Children have already been measured along `axis`.
    fn calculate_layout_input(
        &mut self,
        tree: &mut ElementTree,
        axis: Axis,
    ) -> Result<(), LayoutError>;

    fn min_size(&self, axis: Axis) -> f32;
    fn preferred_size(&self, axis: Axis) -> f32;
    fn flexible_size(&self, axis: Axis) -> f32;

    fn layout_priority(&self) -> i32 {
        0
    }
}

/// Top-down pass: write final geometry along `axis`.
pub trait LayoutController {
    fn set_layout(&mut self, tree: &mut ElementTree, axis: Axis) -> Result<(), LayoutError>;
}

pub trait LayoutIgnorer {
    fn ignore_layout(&self) -> bool;
}

pub trait Behaviour: Any {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn on_attach(&mut self, _owner: BehaviourOwner) {}

    fn layout_participant(&self) -> Option<&dyn LayoutParticipant> {
        None
    }

    fn layout_participant_mut(&mut self) -> Option<&mut dyn LayoutParticipant> {
        None
    }

    fn layout_controller_mut(&mut self) -> Option<&mut dyn LayoutController> {
        None
    }

    fn layout_ignorer(&self) -> Option<&dyn LayoutIgnorer> {
        None
    }

    fn on_enable(&mut self, _cx: &mut LayoutCx<'_>) {}

    fn on_disable(&mut self, _cx: &mut LayoutCx<'_>) {}

    fn on_rect_transform_dimensions_change(&mut self, _cx: &mut LayoutCx<'_>) {}

    fn on_transform_children_changed(&mut self, _cx: &mut LayoutCx<'_>) {}
}

impl dyn Behaviour {
    pub fn is<T: Behaviour>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Behaviour>(&self) -> Option<&T> {
        if self.is::<T>() {
            // Same allocation, vtable dropped.
            unsafe { Some(&*(self as *const dyn Behaviour as *const T)) }
        } else {
            None
        }
    }

    #[inline]
    pub fn downcast_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        if (*self).type_id() == TypeId::of::<T>() {
            unsafe { Some(&mut *(self as *mut dyn Behaviour as *mut T)) }
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/behaviour.rs"]
mod tests;

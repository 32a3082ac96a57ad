//! Resolves one sizing property of an element from all of its participants.
//!
//! The highest `layout_priority` wins; at equal priority the largest value
//! wins. Negative values are "no opinion".

use crate::behaviour::{BehaviourRef, Capabilities, LayoutParticipant};
use crate::geom::Axis;
use crate::tree::{ElementId, ElementTree};

pub fn min_size(tree: &ElementTree, id: ElementId, axis: Axis) -> f32 {
    get_layout_property(tree, id, |e| e.min_size(axis), 0.0).0
}

/// Never below [`min_size`].
pub fn preferred_size(tree: &ElementTree, id: ElementId, axis: Axis) -> f32 {
    let min = get_layout_property(tree, id, |e| e.min_size(axis), 0.0).0;
    let preferred = get_layout_property(tree, id, |e| e.preferred_size(axis), 0.0).0;
    min.max(preferred)
}

pub fn flexible_size(tree: &ElementTree, id: ElementId, axis: Axis) -> f32 {
    get_layout_property(tree, id, |e| e.flexible_size(axis), 0.0).0
}

/// Returns the resolved value and the participant it came from, or
/// `default_value` with no source when nobody contributes.
pub fn get_layout_property<F>(
    tree: &ElementTree,
    id: ElementId,
    property: F,
    default_value: f32,
) -> (f32, Option<BehaviourRef>)
where
    F: Fn(&dyn LayoutParticipant) -> f32,
{
    if !tree.contains(id) {
        return (0.0, None);
    }

    let mut value = default_value;
    let mut max_priority = i32::MIN;
    let mut source = None;

    for behaviour in tree.active_behaviours(id, Capabilities::PARTICIPANT) {
        let Ok(borrowed) = behaviour.try_borrow() else {
            tracing::warn!(element = %tree.path(id), "participant busy; skipped during resolve");
            continue;
        };
        let Some(participant) = borrowed.layout_participant() else {
            continue;
        };

        let priority = participant.layout_priority();
        if priority < max_priority {
            continue;
        }
        let prop = property(participant);
        if prop < 0.0 {
            continue;
        }

        if priority > max_priority {
            value = prop;
            max_priority = priority;
            source = Some(behaviour.clone());
        } else if prop > value {
            value = prop;
            source = Some(behaviour.clone());
        }
    }

    (value, source)
}

#[cfg(test)]
#[path = "../../tests/unit/layout/utility.rs"]
mod tests;

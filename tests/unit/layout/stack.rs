use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::geom::{Rect, Vec2};
use crate::layout::rebuilder::rebuild_layout;
use crate::layout::LayoutElement;
use crate::tree::{behaviour_ref, DrivenProperties, RectTransform};

fn attach<B: Behaviour>(tree: &mut ElementTree, id: ElementId, behaviour: B) -> Rc<RefCell<B>> {
    let capabilities = behaviour.capabilities();
    let (typed, erased) = behaviour_ref(behaviour);
    let owner = tree.attach(id, erased, capabilities).unwrap();
    typed.borrow_mut().on_attach(owner);
    typed
}

fn container(tree: &mut ElementTree, w: f32, h: f32) -> ElementId {
    tree.create("group", None, RectTransform::fixed(Vec2::ZERO, Vec2::new(w, h)))
        .unwrap()
}

fn child(tree: &mut ElementTree, parent: ElementId, name: &str, element: LayoutElement) -> ElementId {
    let id = tree
        .create(name, Some(parent), RectTransform::default())
        .unwrap();
    attach(tree, id, element);
    id
}

fn sized(axis: Axis, min: f32, preferred: f32, flexible: f32) -> LayoutElement {
    LayoutElement::new()
        .with_min(axis, min)
        .with_preferred(axis, preferred)
        .with_flexible(axis, flexible)
}

#[test]
fn test_stacking_axis_aggregates_by_sum() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 50.0, 10.0);
    let group = attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal()
            .with_spacing(2.0)
            .with_child_force_expand(false, false),
    );
    child(&mut tree, root, "a", sized(Axis::Horizontal, 10.0, 20.0, 0.0));
    child(&mut tree, root, "b", sized(Axis::Horizontal, 5.0, 15.0, 1.0));

    group
        .borrow_mut()
        .calculate_layout_input(&mut tree, Axis::Horizontal)
        .unwrap();

    let group = group.borrow();
    assert_eq!(group.base().rect_children().len(), 2);
    assert_eq!(group.min_size(Axis::Horizontal), 17.0);
    assert_eq!(group.preferred_size(Axis::Horizontal), 37.0);
    assert_eq!(group.flexible_size(Axis::Horizontal), 1.0);
}

#[test]
fn test_stacking_axis_distributes_extra_space_to_flexible() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 50.0, 10.0);
    attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal()
            .with_spacing(2.0)
            .with_child_force_expand(false, false),
    );
    let a = child(&mut tree, root, "a", sized(Axis::Horizontal, 10.0, 20.0, 0.0));
    let b = child(&mut tree, root, "b", sized(Axis::Horizontal, 5.0, 15.0, 1.0));

    rebuild_layout(&mut tree, root).unwrap();

    let (ra, rb) = (tree.rect(a), tree.rect(b));
    assert_eq!((ra.x, ra.w), (0.0, 20.0));
    assert_eq!((rb.x, rb.w), (22.0, 28.0));
    assert_eq!(rb.right(), 50.0);
}

#[test]
fn test_stacking_axis_shrinks_between_min_and_preferred() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 27.0, 10.0);
    attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal()
            .with_spacing(2.0)
            .with_child_force_expand(false, false),
    );
    let a = child(&mut tree, root, "a", sized(Axis::Horizontal, 10.0, 20.0, 0.0));
    let b = child(&mut tree, root, "b", sized(Axis::Horizontal, 5.0, 15.0, 1.0));

    rebuild_layout(&mut tree, root).unwrap();

    // Halfway between total min 17 and total preferred 37.
    assert_eq!(tree.rect(a).w, 15.0);
    assert_eq!(tree.rect(b).w, 10.0);
    assert_eq!(tree.rect(b).x, 17.0);
}

#[test]
fn test_cross_axis_clamps_to_child_min() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 5.0);
    attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal().with_child_force_expand(false, false),
    );
    let a = child(&mut tree, root, "a", sized(Axis::Vertical, 10.0, 30.0, 0.0));

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(tree.rect(a).h, 10.0);
    assert_eq!(tree.rect(a).y, 0.0);
}

#[test]
fn test_cross_axis_aggregates_by_max() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 100.0);
    let group = attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal()
            .with_padding(RectOffset::new(0.0, 0.0, 3.0, 1.0))
            .with_child_force_expand(false, false),
    );
    child(&mut tree, root, "a", sized(Axis::Vertical, 10.0, 30.0, 0.0));
    child(&mut tree, root, "b", sized(Axis::Vertical, 12.0, 20.0, 2.0));

    {
        let mut g = group.borrow_mut();
        g.calculate_layout_input(&mut tree, Axis::Horizontal).unwrap();
        g.calculate_layout_input(&mut tree, Axis::Vertical).unwrap();
    }

    let g = group.borrow();
    assert_eq!(g.min_size(Axis::Vertical), 16.0);
    assert_eq!(g.preferred_size(Axis::Vertical), 34.0);
    assert_eq!(g.flexible_size(Axis::Vertical), 2.0);
}

#[test]
fn test_force_expand_splits_leftover_evenly() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 40.0);
    attach(&mut tree, root, HorizontalOrVerticalLayoutGroup::horizontal());
    let a = child(&mut tree, root, "a", LayoutElement::new().with_preferred(Axis::Horizontal, 20.0));
    let b = child(&mut tree, root, "b", LayoutElement::new().with_preferred(Axis::Horizontal, 20.0));

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(tree.rect(a), Rect::new(0.0, 0.0, 50.0, 40.0));
    assert_eq!(tree.rect(b), Rect::new(50.0, 0.0, 50.0, 40.0));
}

#[test]
fn test_alignment_centres_rigid_children() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 40.0);
    attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal()
            .with_child_alignment(TextAnchor::UpperCenter)
            .with_child_force_expand(false, false),
    );
    let a = child(&mut tree, root, "a", LayoutElement::new().with_preferred(Axis::Horizontal, 20.0));
    let b = child(&mut tree, root, "b", LayoutElement::new().with_preferred(Axis::Horizontal, 20.0));

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(tree.rect(a).x, 30.0);
    assert_eq!(tree.rect(b).x, 50.0);
}

#[test]
fn test_vertical_group_with_padding() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 50.0, 200.0);
    attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::vertical()
            .with_padding(RectOffset::new(5.0, 5.0, 10.0, 0.0))
            .with_spacing(4.0)
            .with_child_force_expand(true, false),
    );
    let a = child(&mut tree, root, "a", LayoutElement::new().with_preferred(Axis::Vertical, 20.0));
    let b = child(&mut tree, root, "b", LayoutElement::new().with_preferred(Axis::Vertical, 20.0));

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(tree.rect(a), Rect::new(5.0, 10.0, 40.0, 20.0));
    assert_eq!(tree.rect(b), Rect::new(5.0, 34.0, 40.0, 20.0));
}

#[test]
fn test_ignored_and_inactive_children_are_skipped() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 10.0);
    let group = attach(
        &mut tree,
        root,
        HorizontalOrVerticalLayoutGroup::horizontal().with_child_force_expand(false, false),
    );
    let kept = child(&mut tree, root, "kept", LayoutElement::new().with_preferred(Axis::Horizontal, 10.0));
    child(
        &mut tree,
        root,
        "ignored",
        LayoutElement::new()
            .with_preferred(Axis::Horizontal, 10.0)
            .with_ignore_layout(true),
    );
    let hidden = child(&mut tree, root, "hidden", LayoutElement::new().with_preferred(Axis::Horizontal, 10.0));
    tree.set_active_self(hidden, false).unwrap();
    let plain = tree.create("plain", Some(root), RectTransform::default()).unwrap();

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(group.borrow().base().rect_children(), &[kept, plain]);
    assert_eq!(group.borrow().preferred_size(Axis::Horizontal), 10.0);
}

#[test]
fn test_disabled_ignorer_still_excludes_its_element() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 10.0);
    let group = attach(&mut tree, root, HorizontalOrVerticalLayoutGroup::horizontal());
    let a = tree.create("a", Some(root), RectTransform::default()).unwrap();
    let b = tree.create("b", Some(root), RectTransform::default()).unwrap();
    let (_, ignorer) = behaviour_ref(LayoutElement::new().with_ignore_layout(true));
    let owner = tree.attach(b, ignorer, Capabilities::PARTICIPANT | Capabilities::IGNORER).unwrap();
    tree.set_behaviour_enabled(owner, false).unwrap();

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(group.borrow().base().rect_children(), &[a]);
    assert_eq!(tree.rect(a).w, 100.0);
}

#[test]
fn test_placed_children_are_driven_by_the_group() {
    let mut tree = ElementTree::new();
    let root = container(&mut tree, 100.0, 10.0);
    let group = attach(&mut tree, root, HorizontalOrVerticalLayoutGroup::horizontal());
    let a = child(&mut tree, root, "a", LayoutElement::new());

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(
        tree.driven_properties(a),
        DrivenProperties::ANCHORS | DrivenProperties::ANCHORED_POSITION | DrivenProperties::SIZE_DELTA
    );
    let owner = group.borrow().base().owner().unwrap();
    assert_eq!(tree.drivers_of(a), vec![owner]);
}

#[test]
fn test_names_follow_direction() {
    assert_eq!(HorizontalOrVerticalLayoutGroup::horizontal().name(), "HorizontalLayoutGroup");
    assert_eq!(HorizontalOrVerticalLayoutGroup::vertical().name(), "VerticalLayoutGroup");
    assert_eq!(HorizontalOrVerticalLayoutGroup::vertical().stacking_axis(), Axis::Vertical);
}

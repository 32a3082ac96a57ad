use super::*;
use crate::behaviour::LayoutController;
use crate::canvas::Canvas;
use crate::geom::{Rect, Vec2};
use crate::layout::{ContentSizeFitter, FitMode, HorizontalOrVerticalLayoutGroup, LayoutElement};
use crate::registry::CanvasUpdateRegistry;
use crate::tree::{behaviour_ref, BehaviourOwner, RectTransform};

fn fixed(w: f32, h: f32) -> RectTransform {
    RectTransform::fixed(Vec2::ZERO, Vec2::new(w, h))
}

fn queued_for(root: ElementId) -> CanvasElementRef {
    let mut rebuilder = LayoutRebuilder::default();
    rebuilder.initialize(root);
    Rc::new(RefCell::new(rebuilder))
}

type Log = Rc<RefCell<Vec<String>>>;

/// Controller that only records when it runs.
struct Recorder {
    label: &'static str,
    capabilities: Capabilities,
    log: Log,
}

impl LayoutController for Recorder {
    fn set_layout(&mut self, _tree: &mut ElementTree, axis: Axis) -> Result<(), LayoutError> {
        self.log.borrow_mut().push(format!("{}:{axis:?}", self.label));
        Ok(())
    }
}

impl Behaviour for Recorder {
    fn name(&self) -> &'static str {
        self.label
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn layout_controller_mut(&mut self) -> Option<&mut dyn LayoutController> {
        Some(self)
    }
}

fn attach<B: Behaviour>(tree: &mut ElementTree, id: ElementId, behaviour: B) -> BehaviourOwner {
    let capabilities = behaviour.capabilities();
    let (typed, erased) = behaviour_ref(behaviour);
    let owner = tree.attach(id, erased, capabilities).unwrap();
    typed.borrow_mut().on_attach(owner);
    owner
}

#[test]
fn test_pool_reuses_released_units() {
    let mut tree = ElementTree::new();
    let root = tree.create("root", None, fixed(10.0, 10.0)).unwrap();
    let mut pool = LayoutRebuilderPool::new();

    let a = pool.get();
    a.borrow_mut().initialize(root);
    assert_eq!(pool.count_all(), 1);
    assert_eq!(pool.count_active(), 1);

    let b = pool.get();
    assert!(!Rc::ptr_eq(&a, &b));
    assert_eq!(pool.count_all(), 2);

    pool.release(&a);
    assert!(a.borrow().is_released());
    assert_eq!(pool.count_active(), 0);
    drop(a);
    drop(b);

    let _c = pool.get();
    assert_eq!(pool.count_all(), 2);
}

#[test]
fn test_pool_with_capacity_starts_inactive() {
    let pool = LayoutRebuilderPool::with_capacity(4);
    assert_eq!(pool.count_all(), 4);
    assert_eq!(pool.count_inactive(), 4);
    assert_eq!(pool.count_active(), 0);
}

#[test]
fn test_rebuilders_for_same_root_are_equal() {
    let mut tree = ElementTree::new();
    let a = tree.create("a", None, fixed(10.0, 10.0)).unwrap();
    let b = tree.create("b", None, fixed(10.0, 10.0)).unwrap();

    let mut first = LayoutRebuilder::default();
    first.initialize(a);
    let mut second = LayoutRebuilder::default();
    second.initialize(a);
    let mut other = LayoutRebuilder::default();
    other.initialize(b);

    assert_eq!(first, second);
    assert_eq!(first.identity(), second.identity());
    assert_ne!(first, other);
    assert_eq!(first.describe(&tree), "(Layout Rebuilder for) a");

    // Identity survives the root being destroyed.
    tree.destroy(a).unwrap();
    assert!(first.is_destroyed(&tree));
    assert_eq!(first, second);

    first.layout_complete();
    assert!(first.is_released());
    assert_eq!(first.root(), None);
}

#[test]
fn test_mark_walks_up_to_outermost_group() {
    let mut canvas = Canvas::new();
    let outer = canvas.create_element("outer", None, fixed(100.0, 100.0)).unwrap();
    let inner = canvas.create_element("inner", Some(outer), RectTransform::default()).unwrap();
    let leaf = canvas.create_element("leaf", Some(inner), RectTransform::default()).unwrap();
    canvas
        .add_behaviour(outer, HorizontalOrVerticalLayoutGroup::vertical())
        .unwrap();
    canvas
        .add_behaviour(inner, HorizontalOrVerticalLayoutGroup::horizontal())
        .unwrap();
    canvas.will_render_canvases();
    assert_eq!(canvas.registry().layout_queue_len(), 0);

    canvas.mark_layout_for_rebuild(leaf);
    assert_eq!(canvas.registry().layout_queue_len(), 1);
    assert!(canvas.registry().is_queued_for_layout(&queued_for(outer)));
    assert!(!canvas.registry().is_queued_for_layout(&queued_for(inner)));

    // Marking again is a duplicate; its rebuilder goes straight back.
    canvas.mark_layout_for_rebuild(inner);
    assert_eq!(canvas.registry().layout_queue_len(), 1);
    assert_eq!(canvas.rebuilders().count_active(), 1);
}

#[test]
fn test_mark_without_controller_schedules_nothing() {
    let mut canvas = Canvas::new();
    let lone = canvas.create_element("lone", None, fixed(10.0, 10.0)).unwrap();
    canvas.add_behaviour(lone, LayoutElement::new()).unwrap();
    canvas.mark_layout_for_rebuild(lone);
    assert_eq!(canvas.registry().layout_queue_len(), 0);

    canvas
        .add_behaviour(lone, ContentSizeFitter::new(FitMode::MinSize, FitMode::Unconstrained))
        .unwrap();
    assert!(canvas.registry().is_queued_for_layout(&queued_for(lone)));
}

#[test]
fn test_disabled_group_does_not_claim_children() {
    let mut canvas = Canvas::new();
    let root = canvas.create_element("root", None, fixed(100.0, 100.0)).unwrap();
    let child = canvas.create_element("child", Some(root), RectTransform::default()).unwrap();
    canvas
        .add_behaviour(child, ContentSizeFitter::new(FitMode::MinSize, FitMode::MinSize))
        .unwrap();
    let (_, group) = canvas
        .add_behaviour(root, HorizontalOrVerticalLayoutGroup::vertical())
        .unwrap();
    canvas.set_behaviour_enabled(group, false).unwrap();
    canvas.will_render_canvases();

    canvas.mark_layout_for_rebuild(child);
    assert!(canvas.registry().is_queued_for_layout(&queued_for(child)));
    assert!(!canvas.registry().is_queued_for_layout(&queued_for(root)));
}

#[test]
fn test_force_rebuild_lays_out_immediately() {
    let mut canvas = Canvas::new();
    let root = canvas.create_element("root", None, fixed(80.0, 20.0)).unwrap();
    canvas
        .add_behaviour(root, HorizontalOrVerticalLayoutGroup::horizontal())
        .unwrap();
    let a = canvas.create_element("a", Some(root), RectTransform::default()).unwrap();
    let b = canvas.create_element("b", Some(root), RectTransform::default()).unwrap();

    canvas.force_rebuild_layout_immediate(root).unwrap();

    assert_eq!(canvas.rect(a), Rect::new(0.0, 0.0, 40.0, 20.0));
    assert_eq!(canvas.rect(b), Rect::new(40.0, 0.0, 40.0, 20.0));
    assert_eq!(canvas.rebuilders().count_active(), 1);
}

#[test]
fn test_destroyed_root_reports_error() {
    let mut canvas = Canvas::new();
    let root = canvas.create_element("root", None, fixed(10.0, 10.0)).unwrap();
    canvas.destroy(root).unwrap();
    assert_eq!(
        canvas.force_rebuild_layout_immediate(root),
        Err(LayoutError::ElementDestroyed(root))
    );
    assert_eq!(canvas.rebuilders().count_active(), 0);

    let mut tree = ElementTree::new();
    let gone = tree.create("gone", None, fixed(1.0, 1.0)).unwrap();
    tree.destroy(gone).unwrap();
    let mut registry = CanvasUpdateRegistry::new();
    let mut pool = LayoutRebuilderPool::new();
    let mut cx = LayoutCx::new(&mut tree, &mut registry, &mut pool);

    let mut rebuilder = LayoutRebuilder::default();
    rebuilder.initialize(gone);
    assert!(rebuilder.rebuild(&mut cx, CanvasUpdate::Prelayout).is_ok());
    assert_eq!(
        rebuilder.rebuild(&mut cx, CanvasUpdate::Layout),
        Err(LayoutError::ElementDestroyed(gone))
    );
}

#[test]
fn test_self_controllers_run_before_other_controllers() {
    let log: Log = Rc::default();
    let mut tree = ElementTree::new();
    let root = tree.create("root", None, fixed(10.0, 10.0)).unwrap();
    attach(
        &mut tree,
        root,
        Recorder {
            label: "group",
            capabilities: Capabilities::CONTROLLER,
            log: log.clone(),
        },
    );
    attach(
        &mut tree,
        root,
        Recorder {
            label: "fitter",
            capabilities: Capabilities::CONTROLLER | Capabilities::SELF_CONTROLLER,
            log: log.clone(),
        },
    );

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "fitter:Horizontal",
            "group:Horizontal",
            "fitter:Vertical",
            "group:Vertical",
        ]
    );
}

#[test]
fn test_controllers_under_an_element_without_controllers_are_skipped() {
    let log: Log = Rc::default();
    let mut tree = ElementTree::new();
    let root = tree.create("root", None, fixed(10.0, 10.0)).unwrap();
    let plain = tree.create("plain", Some(root), fixed(5.0, 5.0)).unwrap();
    let deep = tree.create("deep", Some(plain), fixed(5.0, 5.0)).unwrap();
    attach(
        &mut tree,
        root,
        Recorder {
            label: "root",
            capabilities: Capabilities::CONTROLLER,
            log: log.clone(),
        },
    );
    attach(
        &mut tree,
        deep,
        Recorder {
            label: "deep",
            capabilities: Capabilities::CONTROLLER,
            log: log.clone(),
        },
    );

    rebuild_layout(&mut tree, root).unwrap();

    assert_eq!(*log.borrow(), vec!["root:Horizontal", "root:Vertical"]);
}

use super::*;
use crate::clipping::ClipperRegistry;
use crate::geom::Vec2;
use crate::tree::RectTransform;

type Log = Rc<RefCell<Vec<String>>>;

enum Action {
    Fail,
    RegisterLayout(CanvasElementRef),
    RegisterGraphic(CanvasElementRef),
    Unregister(CanvasElementRef),
    UnregisterSelf(Weak<RefCell<dyn CanvasElement>>),
}

struct Recorder {
    name: &'static str,
    node: Option<ElementId>,
    log: Log,
    action: Option<(CanvasUpdate, Action)>,
    identity: Option<u64>,
}

impl CanvasElement for Recorder {
    fn rebuild(&mut self, cx: &mut LayoutCx<'_>, executing: CanvasUpdate) -> Result<(), LayoutError> {
        self.log
            .borrow_mut()
            .push(format!("{}:{executing:?}", self.name));
        let Some((stage, action)) = &self.action else {
            return Ok(());
        };
        if *stage != executing {
            return Ok(());
        }
        let note = match action {
            Action::Fail => return Err(LayoutError::behaviour(self.name, "boom")),
            Action::RegisterLayout(other) => format!(
                "register_layout={}",
                cx.registry.try_register_for_layout_rebuild(other)
            ),
            Action::RegisterGraphic(other) => format!(
                "register_graphic={}",
                cx.registry.try_register_for_graphic_rebuild(other)
            ),
            Action::Unregister(other) => format!("unregister={:?}", cx.registry.unregister(other)),
            Action::UnregisterSelf(me) => {
                let Some(me) = me.upgrade() else {
                    return Ok(());
                };
                format!("unregister={:?}", cx.registry.unregister(&me))
            }
        };
        self.log.borrow_mut().push(format!("{}:{note}", self.name));
        Ok(())
    }

    fn transform(&self) -> Option<ElementId> {
        self.node
    }

    fn layout_complete(&mut self) {
        self.log
            .borrow_mut()
            .push(format!("{}:layout_complete", self.name));
    }

    fn graphic_update_complete(&mut self) {
        self.log
            .borrow_mut()
            .push(format!("{}:graphic_update_complete", self.name));
    }

    fn is_destroyed(&self, tree: &ElementTree) -> bool {
        self.node.is_some_and(|id| !tree.contains(id))
    }

    fn identity(&self) -> u64 {
        self.identity
            .unwrap_or((self as *const Self).cast::<()>() as usize as u64)
    }
}

#[derive(Default)]
struct Harness {
    tree: ElementTree,
    registry: CanvasUpdateRegistry,
    rebuilders: LayoutRebuilderPool,
    clippers: ClipperRegistry,
    log: Log,
}

impl Harness {
    fn recorder(&self, name: &'static str, node: Option<ElementId>) -> CanvasElementRef {
        self.recorder_with(name, node, None)
    }

    fn recorder_with(
        &self,
        name: &'static str,
        node: Option<ElementId>,
        action: Option<(CanvasUpdate, Action)>,
    ) -> CanvasElementRef {
        Rc::new(RefCell::new(Recorder {
            name,
            node,
            log: self.log.clone(),
            action,
            identity: None,
        }))
    }

    fn frame(&mut self) {
        self.registry.perform_update(FrameResources {
            tree: &mut self.tree,
            rebuilders: &mut self.rebuilders,
            clippers: &mut self.clippers,
        });
    }

    fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

fn fixed() -> RectTransform {
    RectTransform::fixed(Vec2::ZERO, Vec2::new(10.0, 10.0))
}

#[test]
fn test_registration_is_idempotent() {
    let mut h = Harness::default();
    let p = h.recorder("p", None);

    assert!(h.registry.try_register_for_layout_rebuild(&p));
    assert!(!h.registry.try_register_for_layout_rebuild(&p));
    h.registry.register_for_layout_rebuild(&p);
    assert_eq!(h.registry.layout_queue_len(), 1);
    assert!(h.registry.is_queued_for_layout(&p));

    h.frame();
    assert_eq!(
        h.take_log(),
        vec!["p:Prelayout", "p:Layout", "p:PostLayout", "p:layout_complete"]
    );
    assert_eq!(h.registry.layout_queue_len(), 0);
}

#[test]
fn test_layout_runs_parents_before_children() {
    let mut h = Harness::default();
    let root = h.tree.create("root", None, fixed()).unwrap();
    let mid = h.tree.create("mid", Some(root), fixed()).unwrap();
    let leaf = h.tree.create("leaf", Some(mid), fixed()).unwrap();

    let deep = h.recorder("deep", Some(leaf));
    let shallow = h.recorder("shallow", Some(root));
    h.registry.register_for_layout_rebuild(&deep);
    h.registry.register_for_layout_rebuild(&shallow);

    h.frame();
    assert_eq!(
        h.take_log(),
        vec![
            "shallow:Prelayout",
            "deep:Prelayout",
            "shallow:Layout",
            "deep:Layout",
            "shallow:PostLayout",
            "deep:PostLayout",
            "shallow:layout_complete",
            "deep:layout_complete",
        ]
    );
}

#[test]
fn test_equal_depth_keeps_registration_order() {
    let mut h = Harness::default();
    let a = h.recorder("a", None);
    let b = h.recorder("b", None);
    h.registry.register_for_layout_rebuild(&b);
    h.registry.register_for_layout_rebuild(&a);

    h.frame();
    let log = h.take_log();
    assert_eq!(&log[..2], &["b:Prelayout", "a:Prelayout"]);
}

#[test]
fn test_destroyed_entries_are_completed_without_rebuild() {
    let mut h = Harness::default();
    let node = h.tree.create("node", None, fixed()).unwrap();
    let p = h.recorder("p", Some(node));
    h.registry.register_for_layout_rebuild(&p);
    h.registry.register_for_graphic_rebuild(&p);
    h.tree.destroy(node).unwrap();

    h.frame();
    assert_eq!(
        h.take_log(),
        vec!["p:layout_complete", "p:graphic_update_complete"]
    );
    assert_eq!(h.registry.layout_queue_len(), 0);
    assert_eq!(h.registry.graphic_queue_len(), 0);
}

#[test]
fn test_dropped_entries_vanish_silently() {
    let mut h = Harness::default();
    let p = h.recorder("p", None);
    h.registry.register_for_layout_rebuild(&p);
    h.registry.register_for_graphic_rebuild(&p);
    drop(p);
    assert_eq!(h.registry.layout_queue_len(), 1);

    h.frame();
    assert!(h.take_log().is_empty());
    assert_eq!(h.registry.layout_queue_len(), 0);
    assert_eq!(h.registry.graphic_queue_len(), 0);
}

#[test]
fn test_failing_element_does_not_stop_the_batch() {
    let mut h = Harness::default();
    let x = h.recorder_with("x", None, Some((CanvasUpdate::Layout, Action::Fail)));
    let y = h.recorder("y", None);
    h.registry.register_for_layout_rebuild(&x);
    h.registry.register_for_layout_rebuild(&y);

    h.frame();
    let log = h.take_log();
    for expected in ["y:Layout", "y:PostLayout", "x:PostLayout", "x:layout_complete"] {
        assert!(log.iter().any(|l| l == expected), "missing {expected} in {log:?}");
    }
    assert!(!h.registry.is_rebuilding_layout());
}

#[test]
fn test_layout_registration_mid_pass_is_picked_up() {
    let mut h = Harness::default();
    let late = h.recorder("late", None);
    let early = h.recorder_with(
        "early",
        None,
        Some((CanvasUpdate::Layout, Action::RegisterLayout(late.clone()))),
    );
    h.registry.register_for_layout_rebuild(&early);

    h.frame();
    let log = h.take_log();
    assert!(log.contains(&"early:register_layout=true".to_string()));
    assert!(log.contains(&"late:Layout".to_string()));
    assert!(log.contains(&"late:PostLayout".to_string()));
    assert!(!log.contains(&"late:Prelayout".to_string()));
    assert!(log.contains(&"late:layout_complete".to_string()));
}

#[test]
fn test_graphic_registration_refused_during_graphic_pass() {
    let mut h = Harness::default();
    let other = h.recorder("other", None);
    let p = h.recorder_with(
        "p",
        None,
        Some((CanvasUpdate::PreRender, Action::RegisterGraphic(other.clone()))),
    );
    h.registry.register_for_graphic_rebuild(&p);

    h.frame();
    assert_eq!(
        h.take_log(),
        vec![
            "p:PreRender",
            "p:register_graphic=false",
            "p:LatePreRender",
            "p:layout_complete",
        ]
    );
    assert!(!h.registry.is_queued_for_graphic(&other));
    assert!(h.registry.try_register_for_graphic_rebuild(&other));
}

#[test]
fn test_unregister_refused_while_its_pass_runs() {
    let mut h = Harness::default();
    let other = h.recorder("other", None);
    let p = h.recorder_with(
        "p",
        None,
        Some((CanvasUpdate::Layout, Action::Unregister(other.clone()))),
    );
    h.registry.register_for_layout_rebuild(&p);
    h.registry.register_for_layout_rebuild(&other);

    h.frame();
    let log = h.take_log();
    assert!(log.contains(&"p:unregister=Err(LayoutPassRunning)".to_string()));
    assert!(log.contains(&"other:Layout".to_string()));
}

#[test]
fn test_unregister_outside_pass_fires_callbacks() {
    let mut h = Harness::default();
    let p = h.recorder("p", None);
    h.registry.register_for_layout_rebuild(&p);
    h.registry.register_for_graphic_rebuild(&p);

    assert_eq!(h.registry.unregister(&p), Ok(()));
    assert_eq!(
        h.take_log(),
        vec!["p:layout_complete", "p:graphic_update_complete"]
    );
    assert_eq!(h.registry.layout_queue_len(), 0);
    assert_eq!(h.registry.graphic_queue_len(), 0);
}

#[test]
fn test_teardown_completes_everything_queued() {
    let mut h = Harness::default();
    let a = h.recorder("a", None);
    let b = h.recorder("b", None);
    h.registry.register_for_layout_rebuild(&a);
    h.registry.register_for_graphic_rebuild(&b);

    h.registry.teardown();
    assert_eq!(
        h.take_log(),
        vec!["a:layout_complete", "b:graphic_update_complete"]
    );
    assert_eq!(h.registry.layout_queue_len(), 0);
    assert_eq!(h.registry.graphic_queue_len(), 0);
}

#[test]
fn test_custom_identity_resolves_while_borrowed() {
    let mut h = Harness::default();
    let log = h.log.clone();
    let p: Rc<RefCell<Recorder>> = Rc::new_cyclic(|me: &Weak<RefCell<Recorder>>| {
        let me: Weak<RefCell<dyn CanvasElement>> = me.clone();
        RefCell::new(Recorder {
            name: "p",
            node: None,
            log,
            action: Some((CanvasUpdate::Layout, Action::UnregisterSelf(me))),
            identity: Some(7),
        })
    });
    let p: CanvasElementRef = p;
    assert!(h.registry.try_register_for_layout_rebuild(&p));
    assert!(h.registry.try_register_for_graphic_rebuild(&p));

    {
        let _held = p.borrow();
        assert!(h.registry.is_queued_for_layout(&p));
        assert!(h.registry.is_queued_for_graphic(&p));
    }

    // Unregistering itself mid-layout still drops the graphic entry.
    h.frame();
    assert_eq!(
        h.take_log(),
        vec![
            "p:Prelayout",
            "p:Layout",
            "p:unregister=Err(LayoutPassRunning)",
            "p:PostLayout",
            "p:layout_complete",
        ]
    );
    assert_eq!(h.registry.graphic_queue_len(), 0);
}

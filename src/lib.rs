//! relayout - incremental UI layout and per-frame update scheduling
//!
//! Modules:
//! - tree: element arena, rect transforms, driven-property tracker
//! - behaviour: capability traits for things attached to elements
//! - layout: property resolution, layout groups, the subtree rebuilder
//! - registry: the per-frame layout/graphic update queues
//! - canvas: host driver tying the pieces together
//! - scene / settings: JSON input for the command line driver

pub mod behaviour;
pub mod canvas;
pub mod clipping;
pub mod context;
pub mod geom;
pub mod layout;
pub mod perf;
pub mod registry;
pub mod scene;
pub mod settings;
pub mod tree;

pub use behaviour::{Behaviour, Capabilities, LayoutController, LayoutIgnorer, LayoutParticipant};
pub use canvas::Canvas;
pub use context::LayoutCx;
pub use geom::{Axis, Rect, RectOffset, TextAnchor, Vec2};
pub use registry::{CanvasElement, CanvasElementRef, CanvasUpdate, CanvasUpdateRegistry};
pub use tree::{ElementId, ElementTree, RectTransform};

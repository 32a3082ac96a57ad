//! JSON scene descriptions: build a tree on a [`Canvas`] and snapshot the
//! resolved rectangles back out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::geom::{Axis, Rect, RectOffset, TextAnchor, Vec2};
use crate::layout::{ContentSizeFitter, FitMode, HorizontalOrVerticalLayoutGroup, LayoutElement};
use crate::tree::{ElementId, RectTransform, TreeError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default)]
    pub size: Vec2,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<Anchors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<Vec2>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitDesc>,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchors {
    pub min: Vec2,
    pub max: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDesc {
    /// Stacking axis.
    pub direction: Axis,
    #[serde(default)]
    pub spacing: f32,
    #[serde(default)]
    pub padding: RectOffset,
    #[serde(default)]
    pub child_alignment: TextAnchor,
    #[serde(default)]
    pub child_force_expand: ForceExpand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceExpand {
    #[serde(default = "default_true")]
    pub width: bool,
    #[serde(default = "default_true")]
    pub height: bool,
}

impl Default for ForceExpand {
    fn default() -> Self {
        Self {
            width: true,
            height: true,
        }
    }
}

/// Per-axis overrides; omitted values stay unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementDesc {
    pub min_width: Option<f32>,
    pub min_height: Option<f32>,
    pub preferred_width: Option<f32>,
    pub preferred_height: Option<f32>,
    pub flexible_width: Option<f32>,
    pub flexible_height: Option<f32>,
    pub ignore_layout: bool,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitDesc {
    pub horizontal: FitMode,
    pub vertical: FitMode,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub fn load_scene(path: &Path) -> Result<SceneNode, SceneError> {
    let data = std::fs::read_to_string(path).map_err(|source| SceneError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| SceneError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl SceneNode {
    pub fn transform(&self) -> RectTransform {
        let (anchor_min, anchor_max) = match self.anchors {
            Some(a) => (a.min, a.max),
            None => (Vec2::ZERO, Vec2::ZERO),
        };
        RectTransform {
            anchor_min,
            anchor_max,
            anchored_position: self.position,
            size_delta: self.size,
            pivot: self.pivot.unwrap_or(Vec2::ZERO),
        }
    }

    /// Instantiate this node and its children under `parent`.
    pub fn build(&self, canvas: &mut Canvas, parent: Option<ElementId>) -> Result<ElementId, SceneError> {
        let id = canvas.create_element(self.name.as_str(), parent, self.transform())?;

        if let Some(desc) = &self.element {
            canvas.add_behaviour(id, desc.to_layout_element())?;
        }
        if let Some(fit) = self.fit {
            canvas.add_behaviour(id, ContentSizeFitter::new(fit.horizontal, fit.vertical))?;
        }
        if let Some(group) = &self.group {
            canvas.add_behaviour(id, group.to_layout_group())?;
        }

        for child in &self.children {
            child.build(canvas, Some(id))?;
        }

        if !self.active {
            canvas.set_active(id, false)?;
        }
        Ok(id)
    }
}

impl GroupDesc {
    fn to_layout_group(&self) -> HorizontalOrVerticalLayoutGroup {
        let group = match self.direction {
            Axis::Horizontal => HorizontalOrVerticalLayoutGroup::horizontal(),
            Axis::Vertical => HorizontalOrVerticalLayoutGroup::vertical(),
        };
        group
            .with_spacing(self.spacing)
            .with_padding(self.padding)
            .with_child_alignment(self.child_alignment)
            .with_child_force_expand(self.child_force_expand.width, self.child_force_expand.height)
    }
}

impl ElementDesc {
    fn to_layout_element(&self) -> LayoutElement {
        let mut element = LayoutElement::new().with_ignore_layout(self.ignore_layout);
        let overrides = [
            (Axis::Horizontal, self.min_width, self.preferred_width, self.flexible_width),
            (Axis::Vertical, self.min_height, self.preferred_height, self.flexible_height),
        ];
        for (axis, min, preferred, flexible) in overrides {
            if let Some(v) = min {
                element = element.with_min(axis, v);
            }
            if let Some(v) = preferred {
                element = element.with_preferred(axis, v);
            }
            if let Some(v) = flexible {
                element = element.with_flexible(axis, v);
            }
        }
        if let Some(priority) = self.priority {
            element = element.with_priority(priority);
        }
        element
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectSnapshot {
    pub path: String,
    /// In the parent's space.
    pub rect: Rect,
    pub world: Rect,
}

/// Pre-order rectangles of `root` and everything under it.
pub fn snapshot(canvas: &Canvas, root: ElementId) -> Vec<RectSnapshot> {
    let tree = canvas.tree();
    tree.subtree(root)
        .into_iter()
        .map(|id| RectSnapshot {
            path: tree.path(id),
            rect: tree.rect(id),
            world: tree.world_rect(id),
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/unit/scene.rs"]
mod tests;

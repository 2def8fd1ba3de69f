//! Scene model: nodes, selection, camera and history behind one owned handle.
//!
//! Every mutation computes a complete new node list (and selection) and swaps
//! it in at the end, so observers never see a half-applied change. Mutations
//! outside a transform session push a pre-mutation snapshot first. Invalid
//! input and no-op requests leave the state untouched and return `false`.

use crate::camera::{CoordinateNormalizer, WorldTransform};
use crate::config::EngineConfig;
use crate::gesture::CameraGesture;
use crate::history::{HistoryManager, SceneSnapshot};
use crate::loading::{LoadKind, LoadTicket, PendingLoad};
use crate::selection::{
    HandleKind, HandleSizing, SelectionOverlay, calculate_group_selection_overlay, calculate_selection_handle_sizing,
};
use crate::shapes::{
    ApproximateTextMeasurer, ImageDefinition, NodeId, NodePayload, SceneNode, SerializableColor, ShapeDefinition, Stroke,
    TextBounds, TextDefinition, TextMeasureInput, TextMeasurer, TextStyle,
};
use crate::tiles;
use crate::transform::{TransformBaseline, TransformEngine};
use crate::validate;
use kurbo::{Point, Rect, Size, Vec2};
use peniko::Color;
use std::collections::HashSet;

/// Identifies a registered observer.
pub type SubscriptionId = u64;

/// Which parts of the scene changed in one atomic update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneChange {
    pub nodes: bool,
    pub selection: bool,
    pub world: bool,
}

impl SceneChange {
    pub const NODES: Self = Self {
        nodes: true,
        selection: false,
        world: false,
    };
    pub const SELECTION: Self = Self {
        nodes: false,
        selection: true,
        world: false,
    };
    pub const WORLD: Self = Self {
        nodes: false,
        selection: false,
        world: true,
    };
    pub const ALL: Self = Self {
        nodes: true,
        selection: true,
        world: true,
    };

    pub fn is_empty(&self) -> bool {
        !(self.nodes || self.selection || self.world)
    }
}

/// Work order for an asynchronous text metrics provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayoutRequest {
    pub ticket: LoadTicket,
    pub input: TextMeasureInput,
}

type Observer = Box<dyn FnMut(&SceneChange)>;

/// The design surface state and its mutation API.
pub struct SceneModel {
    nodes: Vec<SceneNode>,
    /// Selection in recency order; the last id was selected most recently.
    selected_ids: Vec<NodeId>,
    normalizer: CoordinateNormalizer,
    viewport: Size,
    config: EngineConfig,
    history: HistoryManager,
    measurer: Box<dyn TextMeasurer>,
    /// Selected nodes as they were when the current transform session began.
    baseline: Option<TransformBaseline>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl Default for SceneModel {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SceneModel {
    /// Empty scene using the approximate text measurer.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_measurer(config, Box::new(ApproximateTextMeasurer::default()))
    }

    /// Empty scene with a host-supplied text measurer. A config that fails
    /// validation is replaced by the defaults.
    pub fn with_measurer(config: EngineConfig, measurer: Box<dyn TextMeasurer>) -> Self {
        let config = config.or_default();
        Self {
            nodes: Vec::new(),
            selected_ids: Vec::new(),
            normalizer: CoordinateNormalizer::new(config.normalizer),
            viewport: Size::new(800.0, 600.0),
            history: HistoryManager::new(config.history_limit),
            config,
            measurer,
            baseline: None,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Install a different text metrics provider. Existing nodes keep their sizes.
    pub fn set_measurer(&mut self, measurer: Box<dyn TextMeasurer>) {
        self.measurer = measurer;
    }

    // --- Accessors ---

    /// Nodes back to front.
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Selected ids, most recently selected last.
    pub fn selected_ids(&self) -> &[NodeId] {
        &self.selected_ids
    }

    /// Whether `id` is in the selection.
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected_ids.contains(&id)
    }

    /// Selected nodes in z-order.
    pub fn selected_nodes(&self) -> Vec<&SceneNode> {
        let selected = self.selected_set();
        self.nodes.iter().filter(|n| selected.contains(&n.id)).collect()
    }

    /// The camera.
    pub fn normalizer(&self) -> &CoordinateNormalizer {
        &self.normalizer
    }

    /// Camera position and scale.
    pub fn world(&self) -> WorldTransform {
        self.normalizer.world()
    }

    /// Viewport size in screen pixels.
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Resize the viewport. Non-finite or negative sizes are ignored.
    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport.width.is_finite() && viewport.height.is_finite() && viewport.width >= 0.0 && viewport.height >= 0.0 {
            self.viewport = viewport;
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Undo/redo stacks.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Whether there is anything to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether there is anything to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Deep copy of the undoable state.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            nodes: self.nodes.clone(),
            selected_ids: self.selected_ids.clone(),
            world: self.normalizer.clone(),
        }
    }

    // --- Observers ---

    /// Register a callback fired after every state swap, in registration order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SceneChange) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn notify(&mut self, change: SceneChange) {
        if change.is_empty() {
            return;
        }
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }

    // --- Internal state swap ---

    fn engine(&self) -> TransformEngine<'_> {
        TransformEngine::new(self.config.min_node_size, self.measurer.as_ref())
    }

    fn selected_set(&self) -> HashSet<NodeId> {
        self.selected_ids.iter().copied().collect()
    }

    fn is_selectable(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| !n.locked)
    }

    /// Swap in a new node list, recording history first. Selection is pruned
    /// of ids that no longer refer to existing unlocked nodes.
    fn commit_nodes(&mut self, nodes: Vec<SceneNode>) -> bool {
        if nodes == self.nodes {
            return false;
        }
        self.history.record(self.snapshot());
        self.nodes = nodes;
        let selection_changed = self.prune_selection();
        self.notify(SceneChange {
            nodes: true,
            selection: selection_changed,
            world: false,
        });
        true
    }

    /// Swap in a new selection. Selection changes are not undoable on their own.
    fn commit_selection(&mut self, selection: Vec<NodeId>) -> bool {
        if selection == self.selected_ids {
            return false;
        }
        self.selected_ids = selection;
        self.notify(SceneChange::SELECTION);
        true
    }

    fn prune_selection(&mut self) -> bool {
        let valid: HashSet<NodeId> = self.nodes.iter().filter(|n| !n.locked).map(|n| n.id).collect();
        let before = self.selected_ids.len();
        self.selected_ids.retain(|id| valid.contains(id));
        self.selected_ids.len() != before
    }

    /// Apply `f` to every selected node.
    fn map_selected(&self, mut f: impl FnMut(&SceneNode) -> SceneNode) -> Vec<SceneNode> {
        let selected = self.selected_set();
        self.nodes
            .iter()
            .map(|n| if selected.contains(&n.id) { f(n) } else { n.clone() })
            .collect()
    }

    // --- Factories ---

    fn viewport_center_scene(&self) -> Point {
        self.normalizer
            .screen_to_scene(Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0))
    }

    fn insert_node(&mut self, node: SceneNode) -> NodeId {
        let id = node.id;
        self.history.record(self.snapshot());
        log::debug!("created {:?} node {} at {:?}", node.kind(), id, node.position);
        self.nodes.push(node);
        self.selected_ids = vec![id];
        self.notify(SceneChange {
            nodes: true,
            selection: true,
            world: false,
        });
        id
    }

    /// Add a square rectangle at the viewport center, sized to look the same
    /// on screen at any zoom, and select it.
    pub fn add_rectangle(&mut self, corner_radius: f64) -> NodeId {
        let radius = validate::length(corner_radius, "corner radius").into_value();
        self.add_shape(ShapeDefinition::rectangle(radius / self.normalizer.scene_scale()))
    }

    /// Add a shape node at the viewport center and select it.
    pub fn add_shape(&mut self, shape: ShapeDefinition) -> NodeId {
        let scale = self.normalizer.scene_scale();
        let side = self.config.default_node_screen_size / scale;
        let size = self.engine().clamp_size(Size::new(side, side));
        let mut node = SceneNode::new(self.viewport_center_scene(), size, NodePayload::Shape(shape.sanitized()));
        node.stroke.width /= scale;
        self.insert_node(node)
    }

    /// Add an image shown at native resolution (shrunk to fit the viewport)
    /// and select it.
    pub fn add_image(&mut self, image: ImageDefinition) -> NodeId {
        let size = self.initial_image_size(image.intrinsic_size);
        let node = SceneNode::new(self.viewport_center_scene(), size, NodePayload::Image(image));
        self.insert_node(node)
    }

    /// Add an image whose asset is still being fetched. Complete it with
    /// [`apply_image_asset`](Self::apply_image_asset) using the returned ticket.
    pub fn add_image_placeholder(&mut self, intrinsic_size: Size) -> LoadTicket {
        let size = self.initial_image_size(intrinsic_size);
        let mut node = SceneNode::new(
            self.viewport_center_scene(),
            size,
            NodePayload::Image(ImageDefinition::placeholder(intrinsic_size)),
        );
        let pending = PendingLoad::new(LoadKind::ImageAsset);
        node.pending = Some(pending);
        let node_id = self.insert_node(node);
        LoadTicket {
            node_id,
            kind: pending.kind,
            token: pending.token,
        }
    }

    /// Add a text node at the viewport center, measured synchronously, and select it.
    pub fn add_text(&mut self, content: impl Into<String>) -> NodeId {
        let font_size = self.config.default_font_size / self.normalizer.scene_scale();
        let node = SceneNode::new(
            self.viewport_center_scene(),
            Size::new(self.config.min_node_size, self.config.min_node_size),
            NodePayload::Text(TextDefinition::new(content, font_size)),
        );
        let node = self.engine().remeasure(&node);
        self.insert_node(node)
    }

    fn initial_image_size(&self, intrinsic: Size) -> Size {
        let fallback = self.config.default_node_screen_size;
        let intrinsic = if intrinsic.width.is_finite() && intrinsic.height.is_finite() && !intrinsic.is_zero_area() {
            Size::new(intrinsic.width.abs(), intrinsic.height.abs())
        } else {
            Size::new(fallback, fallback)
        };
        let fit = if self.viewport.is_zero_area() {
            1.0
        } else {
            (self.viewport.width * 0.8 / intrinsic.width)
                .min(self.viewport.height * 0.8 / intrinsic.height)
                .min(1.0)
        };
        let scale = self.normalizer.scene_scale();
        self.engine()
            .clamp_size(Size::new(intrinsic.width * fit / scale, intrinsic.height * fit / scale))
    }

    // --- Deletion ---

    /// Remove every selected node. Returns the number removed.
    pub fn delete_selected(&mut self) -> usize {
        let ids = self.selected_ids.clone();
        self.delete_nodes(&ids)
    }

    /// Remove nodes by id. Missing ids are ignored. Returns the number removed.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> usize {
        let doomed: HashSet<NodeId> = ids.iter().copied().collect();
        let nodes: Vec<SceneNode> = self.nodes.iter().filter(|n| !doomed.contains(&n.id)).cloned().collect();
        let removed = self.nodes.len() - nodes.len();
        if removed > 0 {
            log::debug!("deleting {} node(s)", removed);
            self.commit_nodes(nodes);
        }
        removed
    }

    // --- Selection ---

    /// Replace the selection. Missing and locked ids are dropped; a repeated
    /// id keeps its last position.
    pub fn select(&mut self, ids: &[NodeId]) -> bool {
        let mut selection: Vec<NodeId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.is_selectable(id) {
                selection.retain(|s| *s != id);
                selection.push(id);
            }
        }
        self.commit_selection(selection)
    }

    /// Add one node, moving it to the most-recent position if already selected.
    pub fn add_to_selection(&mut self, id: NodeId) -> bool {
        if !self.is_selectable(id) {
            return false;
        }
        let mut selection = self.selected_ids.clone();
        selection.retain(|s| *s != id);
        selection.push(id);
        self.commit_selection(selection)
    }

    /// Add `id` to the selection, or remove it if already selected.
    pub fn toggle_selection(&mut self, id: NodeId) -> bool {
        if self.is_selected(id) {
            self.deselect(id)
        } else {
            self.add_to_selection(id)
        }
    }

    /// Remove one node from the selection.
    pub fn deselect(&mut self, id: NodeId) -> bool {
        let mut selection = self.selected_ids.clone();
        selection.retain(|s| *s != id);
        self.commit_selection(selection)
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) -> bool {
        self.commit_selection(Vec::new())
    }

    /// Select every unlocked node in z-order.
    pub fn select_all(&mut self) -> bool {
        let selection = self.nodes.iter().filter(|n| !n.locked).map(|n| n.id).collect();
        self.commit_selection(selection)
    }

    /// Topmost unlocked node under a screen point.
    pub fn node_at(&self, screen_point: Point) -> Option<NodeId> {
        let scene_point = self.normalizer.screen_to_scene(finite_point(screen_point)?);
        self.nodes
            .iter()
            .rev()
            .filter(|n| !n.locked)
            .find(|n| n.hit_test(scene_point, n.stroke.width / 2.0))
            .map(|n| n.id)
    }

    /// Select every unlocked node whose rotated bounds touch `rect` (scene units).
    pub fn select_in_rect(&mut self, rect: Rect) -> bool {
        let rect = rect.abs();
        let selection = self
            .nodes
            .iter()
            .filter(|n| !n.locked)
            .filter(|n| {
                let b = n.bounds();
                b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1
            })
            .map(|n| n.id)
            .collect();
        self.commit_selection(selection)
    }

    // --- Transforms ---

    /// Move every selected node by a scene-space delta.
    pub fn translate_selected(&mut self, delta: Vec2) -> bool {
        let delta = validate::delta(delta).into_value();
        if delta == Vec2::ZERO || self.selected_ids.is_empty() {
            return false;
        }
        let nodes = {
            let engine = self.engine();
            self.map_selected(|n| engine.translate(n, delta))
        };
        log::trace!("translate {} node(s) by {:?}", self.selected_ids.len(), delta);
        self.commit_nodes(nodes)
    }

    /// Scale every selected node about `anchor` (scene units).
    pub fn scale_selected(&mut self, anchor: Point, scale_x: f64, scale_y: f64) -> bool {
        let Some(anchor) = self.valid_anchor(anchor) else {
            return false;
        };
        let nodes = {
            let engine = self.engine();
            self.map_selected(|n| engine.scale(n, anchor, scale_x, scale_y))
        };
        self.commit_nodes(nodes)
    }

    /// Rotate every selected node about `anchor` by `delta` radians.
    pub fn rotate_selected(&mut self, anchor: Point, delta: f64) -> bool {
        let delta = validate::angle(delta).into_value();
        let Some(anchor) = self.valid_anchor(anchor) else {
            return false;
        };
        if delta == 0.0 {
            return false;
        }
        let nodes = {
            let engine = self.engine();
            self.map_selected(|n| engine.rotate(n, anchor, delta))
        };
        self.commit_nodes(nodes)
    }

    /// A usable anchor, falling back to the selection center; `None` without a selection.
    fn valid_anchor(&self, anchor: Point) -> Option<Point> {
        let overlay = self.selection_overlay()?;
        Some(validate::point(anchor, overlay.center).into_value())
    }

    // --- Transform sessions ---

    /// Start batching mutations into one undo step and capture the selected
    /// nodes as the gesture baseline. Returns false if a session is already open.
    pub fn start_transform_session(&mut self) -> bool {
        if !self.history.start_session(self.snapshot()) {
            return false;
        }
        self.baseline = Some(TransformBaseline::capture(self.selected_nodes()));
        true
    }

    /// Close the current session. No-op when none is open.
    pub fn commit_transform_session(&mut self) -> bool {
        self.baseline = None;
        self.history.commit_session()
    }

    /// Whether a transform session is open.
    pub fn is_transform_session_active(&self) -> bool {
        self.history.is_recording()
    }

    /// Scale the session baseline by the gesture's total factors.
    ///
    /// Each call replaces the previous frame's result instead of compounding it.
    /// Returns false when no session is open.
    pub fn scale_selected_from_baseline(&mut self, anchor: Point, scale_x: f64, scale_y: f64) -> bool {
        let Some(baseline) = self.baseline.as_ref() else {
            return false;
        };
        let Some(anchor) = finite_point(anchor) else {
            return false;
        };
        let replayed = baseline.scaled(&self.engine(), anchor, scale_x, scale_y);
        let nodes = self.apply_replay(replayed);
        self.commit_nodes(nodes)
    }

    /// Rotate the session baseline by the gesture's total angle.
    pub fn rotate_selected_from_baseline(&mut self, anchor: Point, total_delta: f64) -> bool {
        let Some(baseline) = self.baseline.as_ref() else {
            return false;
        };
        let Some(anchor) = finite_point(anchor) else {
            return false;
        };
        let replayed = baseline.rotated(&self.engine(), anchor, total_delta);
        let nodes = self.apply_replay(replayed);
        self.commit_nodes(nodes)
    }

    /// Current nodes with the geometry of `replayed` copied onto them.
    ///
    /// Only nodes that are still selected (and therefore unlocked) take part.
    /// Style, lock and content changes made during the session are kept.
    fn apply_replay(&self, replayed: Vec<SceneNode>) -> Vec<SceneNode> {
        let selected = self.selected_set();
        let engine = self.engine();
        let mut nodes = self.nodes.clone();
        for replay in replayed.iter().filter(|r| selected.contains(&r.id)) {
            let Some(slot) = nodes.iter_mut().find(|n| n.id == replay.id && !n.locked) else {
                continue;
            };
            adopt_geometry(slot, replay);
            // Content or typography edited mid-session: the replayed size is stale.
            let stale = matches!((slot.as_text(), replay.as_text()), (Some(a), Some(b)) if a != b);
            if stale {
                *slot = engine.remeasure(slot);
            }
        }
        nodes
    }

    // --- Restyle & lock ---

    /// Set or clear the fill of the selected nodes.
    pub fn set_fill(&mut self, fill: Option<Color>) -> bool {
        let fill: Option<SerializableColor> = fill.map(Into::into);
        let nodes = self.map_selected(|n| {
            let mut n = n.clone();
            n.fill = fill;
            n
        });
        self.commit_nodes(nodes)
    }

    /// Set stroke colour and width (scene units) on the selected shapes and images.
    pub fn set_stroke(&mut self, color: Color, width: f64) -> bool {
        let stroke = Stroke {
            color: color.into(),
            width: validate::length(width, "stroke width").into_value(),
        };
        let nodes = self.map_selected(|n| {
            let mut n = n.clone();
            if !n.is_text() {
                n.stroke = stroke;
            }
            n
        });
        self.commit_nodes(nodes)
    }

    /// Set the corner radius of selected rectangles; other nodes are untouched.
    pub fn set_corner_radius(&mut self, radius: f64) -> bool {
        let radius = validate::length(radius, "corner radius").into_value();
        let nodes = self.map_selected(|n| {
            let mut n = n.clone();
            if let NodePayload::Shape(ShapeDefinition::Rectangle { corner_radius }) = &mut n.payload {
                *corner_radius = radius;
            }
            n
        });
        self.commit_nodes(nodes)
    }

    /// Replace a text node's content and re-measure it.
    pub fn set_text_content(&mut self, id: NodeId, content: impl Into<String>) -> bool {
        let content = content.into();
        let engine = self.engine();
        let nodes: Vec<SceneNode> = self
            .nodes
            .iter()
            .map(|n| match n.as_text() {
                Some(text) if n.id == id && !n.locked && text.content != content => {
                    let mut edited = n.clone();
                    if let Some(text) = edited.as_text_mut() {
                        text.content = content.clone();
                    }
                    engine.remeasure(&edited)
                }
                _ => n.clone(),
            })
            .collect();
        self.commit_nodes(nodes)
    }

    /// Apply a partial typography update to the selected text nodes.
    pub fn set_text_style(&mut self, style: &TextStyle) -> bool {
        let nodes = {
            let engine = self.engine();
            self.map_selected(|n| {
                let mut n = n.clone();
                let relayout = n.as_text_mut().is_some_and(|text| style.apply_to(text));
                if relayout { engine.remeasure(&n) } else { n }
            })
        };
        self.commit_nodes(nodes)
    }

    /// Lock or unlock nodes by id. Locking removes them from the selection.
    pub fn set_locked(&mut self, ids: &[NodeId], locked: bool) -> bool {
        let targets: HashSet<NodeId> = ids.iter().copied().collect();
        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let mut n = n.clone();
                if targets.contains(&n.id) {
                    n.locked = locked;
                }
                n
            })
            .collect();
        self.commit_nodes(nodes)
    }

    /// Lock or unlock the aspect ratio of the selected nodes.
    pub fn set_aspect_ratio_locked(&mut self, locked: bool) -> bool {
        let nodes = self.map_selected(|n| n.clone().with_aspect_ratio_locked(locked));
        self.commit_nodes(nodes)
    }

    // --- Z-order ---

    fn selected_flags(&self) -> Vec<bool> {
        let selected = self.selected_set();
        self.nodes.iter().map(|n| selected.contains(&n.id)).collect()
    }

    /// Move each contiguous run of selected nodes one step toward the front.
    pub fn bring_forward(&mut self) -> bool {
        let mut flags = self.selected_flags();
        let mut nodes = self.nodes.clone();
        for i in (0..nodes.len().saturating_sub(1)).rev() {
            if flags[i] && !flags[i + 1] {
                nodes.swap(i, i + 1);
                flags.swap(i, i + 1);
            }
        }
        self.commit_nodes(nodes)
    }

    /// Move each contiguous run of selected nodes one step toward the back.
    pub fn send_backward(&mut self) -> bool {
        let mut flags = self.selected_flags();
        let mut nodes = self.nodes.clone();
        for i in 1..nodes.len() {
            if flags[i] && !flags[i - 1] {
                nodes.swap(i, i - 1);
                flags.swap(i, i - 1);
            }
        }
        self.commit_nodes(nodes)
    }

    /// Move the selection above every other node, keeping relative order.
    pub fn bring_to_front(&mut self) -> bool {
        let selected = self.selected_set();
        let (front, back): (Vec<SceneNode>, Vec<SceneNode>) =
            self.nodes.iter().cloned().partition(|n| selected.contains(&n.id));
        self.commit_nodes(back.into_iter().chain(front).collect())
    }

    /// Move the selection below every other node, keeping relative order.
    pub fn send_to_back(&mut self) -> bool {
        let selected = self.selected_set();
        let (back, front): (Vec<SceneNode>, Vec<SceneNode>) =
            self.nodes.iter().cloned().partition(|n| selected.contains(&n.id));
        self.commit_nodes(back.into_iter().chain(front).collect())
    }

    // --- Undo / redo ---

    /// Restore the previous snapshot. Closes any open transform session.
    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Re-apply the most recently undone snapshot.
    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, snapshot: SceneSnapshot) {
        self.baseline = None;
        self.nodes = snapshot.nodes;
        self.selected_ids = snapshot.selected_ids;
        self.normalizer = snapshot.world;
        self.prune_selection();
        self.notify(SceneChange::ALL);
    }

    // --- Camera ---

    /// Pan the camera by a screen-space delta.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.normalizer.pan(screen_delta);
        self.notify(SceneChange::WORLD);
    }

    /// Zoom about a screen point, keeping it fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.normalizer.zoom_at(screen_point, factor);
        self.notify(SceneChange::WORLD);
    }

    /// Multiply the camera scale by `m`; see
    /// [`CoordinateNormalizer::multiply_scene_scale`] for the range clamp.
    pub fn multiply_scene_scale(&mut self, m: f64) -> f64 {
        let applied = self.normalizer.multiply_scene_scale(m);
        self.notify(SceneChange::WORLD);
        applied
    }

    /// Fit the camera to all nodes, or reset it when the scene is empty.
    pub fn fit_to_content(&mut self, padding: f64) {
        let bounds = self.nodes.iter().map(SceneNode::bounds).reduce(|a, b| a.union(b));
        match bounds {
            Some(bounds) => self.normalizer.fit_to_bounds(bounds, self.viewport, padding),
            None => self.normalizer.reset(),
        }
        self.notify(SceneChange::WORLD);
    }

    /// Back to scale 1 at the scene origin.
    pub fn reset_camera(&mut self) {
        self.normalizer.reset();
        self.notify(SceneChange::WORLD);
    }

    /// Apply a pan or pinch produced by [`PointerTracker`](crate::gesture::PointerTracker).
    pub fn apply_camera_gesture(&mut self, gesture: CameraGesture) {
        match gesture {
            CameraGesture::Pan { delta } => self.normalizer.pan(delta),
            CameraGesture::Pinch {
                center,
                target_scale,
                pan,
            } => {
                self.normalizer.pan(pan);
                let factor = target_scale / self.normalizer.scene_scale();
                self.normalizer.zoom_at(center, factor);
            }
        }
        log::trace!("camera gesture -> {:?}", self.normalizer.world());
        self.notify(SceneChange::WORLD);
    }

    // --- Selection geometry ---

    /// Oriented box and handles of the current selection.
    pub fn selection_overlay(&self) -> Option<SelectionOverlay> {
        calculate_group_selection_overlay(&self.selected_nodes(), &self.config.handles)
    }

    /// Handle sizes for the current zoom.
    pub fn handle_sizing(&self) -> HandleSizing {
        calculate_selection_handle_sizing(self.normalizer.scene_scale(), &self.config.handles)
    }

    /// Handle of the current selection under a screen point.
    pub fn handle_at(&self, screen_point: Point) -> Option<HandleKind> {
        finite_point(screen_point)?;
        self.selection_overlay()?
            .hit_test_handles_screen(screen_point, &self.normalizer, &self.config.handles)
    }

    // --- Tiles ---

    /// Tile level the renderer should request for an image node at the current zoom.
    pub fn tile_level_for(&self, id: NodeId) -> Option<u32> {
        let node = self.node(id)?;
        tiles::tile_level_for_node(node, self.normalizer.scene_scale(), self.config.min_tile_density)
    }

    // --- Async loads ---

    fn begin_load(&mut self, id: NodeId, kind: LoadKind) -> Option<LoadTicket> {
        let node = self.nodes.iter_mut().find(|n| n.id == id)?;
        let pending = PendingLoad::new(kind);
        node.pending = Some(pending);
        Some(LoadTicket {
            node_id: id,
            kind,
            token: pending.token,
        })
    }

    /// Start an async layout for a text node. Any earlier request for the
    /// same node becomes stale.
    pub fn request_text_layout(&mut self, id: NodeId) -> Option<TextLayoutRequest> {
        let input = self.node(id)?.as_text()?.measure_input();
        let ticket = self.begin_load(id, LoadKind::TextLayout)?;
        Some(TextLayoutRequest { ticket, input })
    }

    /// Apply async layout bounds if `ticket` is still current for its node.
    pub fn apply_text_layout(&mut self, ticket: LoadTicket, bounds: TextBounds) -> bool {
        let min = self.config.min_node_size;
        let size = Size::new(bounds.width, bounds.height);
        self.finish_load(&ticket, |node| {
            node.size = validate::size(size, min).into_value();
            node.pending = None;
        })
    }

    /// Start (or restart) an asset fetch for an image node.
    pub fn request_image_asset(&mut self, id: NodeId) -> Option<LoadTicket> {
        self.node(id)?.as_image()?;
        self.begin_load(id, LoadKind::ImageAsset)
    }

    /// Install fetched image metadata if `ticket` is still current. The node
    /// keeps its width and takes the asset's aspect ratio.
    pub fn apply_image_asset(&mut self, ticket: LoadTicket, image: ImageDefinition) -> bool {
        let min = self.config.min_node_size;
        let intrinsic = image.intrinsic_size;
        let has_aspect = intrinsic.width > 0.0 && intrinsic.height.is_finite() && intrinsic.height > 0.0;
        self.finish_load(&ticket, |node| {
            if has_aspect {
                let height = node.size.width * intrinsic.height / intrinsic.width;
                node.size = validate::size(Size::new(node.size.width, height), min).into_value();
            }
            node.payload = NodePayload::Image(image.clone());
            node.pending = None;
        })
    }

    /// Run `complete` on the live node and on every history entry still
    /// waiting on `ticket`. Returns whether the live node was updated.
    ///
    /// History entries are resolved even when the live node has moved on,
    /// since they still hold the inputs the load was requested for.
    fn finish_load(&mut self, ticket: &LoadTicket, mut complete: impl FnMut(&mut SceneNode)) -> bool {
        self.history.resolve_load(ticket, &mut complete);
        let Some(node) = self.current_load_target(ticket) else {
            return false;
        };
        complete(node);
        self.notify(SceneChange::NODES);
        true
    }

    /// The node a completion should update, or `None` if the completion is stale.
    fn current_load_target(&mut self, ticket: &LoadTicket) -> Option<&mut SceneNode> {
        let node = self.nodes.iter_mut().find(|n| n.id == ticket.node_id);
        match node {
            Some(node) if node.pending.is_some_and(|p| p.matches(ticket)) => Some(node),
            _ => {
                log::debug!(
                    "discarding stale {:?} completion for node {} (token {})",
                    ticket.kind,
                    ticket.node_id,
                    ticket.token.value()
                );
                None
            }
        }
    }
}

fn finite_point(p: Point) -> Option<Point> {
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

/// Copy the transform-driven fields of `source` onto `target`.
fn adopt_geometry(target: &mut SceneNode, source: &SceneNode) {
    target.position = source.position;
    target.size = source.size;
    target.rotation = source.rotation;
    if !target.is_text() {
        target.stroke.width = source.stroke.width;
    }
    match (&mut target.payload, &source.payload) {
        (
            NodePayload::Shape(ShapeDefinition::Rectangle { corner_radius }),
            NodePayload::Shape(ShapeDefinition::Rectangle { corner_radius: radius }),
        ) => *corner_radius = *radius,
        (NodePayload::Text(text), NodePayload::Text(replayed)) => {
            if text.font_size != replayed.font_size {
                text.font_size = replayed.font_size;
                target.pending = None;
            }
        }
        _ => {}
    }
}

//! Snapshot-based undo/redo with transform sessions.

use crate::camera::CoordinateNormalizer;
use crate::loading::LoadTicket;
use crate::shapes::{NodeId, NodePayload, SceneNode};
use serde::{Deserialize, Serialize};

/// Deep copy of everything undo/redo restores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub nodes: Vec<SceneNode>,
    pub selected_ids: Vec<NodeId>,
    pub world: CoordinateNormalizer,
}

impl SceneSnapshot {
    /// Serialize for hand-off to a host. Pending loads are not included.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a snapshot, substituting the default triangle for degenerate
    /// polygons and repairing an inconsistent camera.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut snapshot: Self = serde_json::from_str(json)?;
        snapshot.world = snapshot.world.sanitized();
        for node in &mut snapshot.nodes {
            if let NodePayload::Shape(shape) = &mut node.payload {
                *shape = shape.clone().sanitized();
            }
        }
        Ok(snapshot)
    }
}

/// Undo and redo stacks plus the transform session flag.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    past: Vec<SceneSnapshot>,
    future: Vec<SceneSnapshot>,
    recording: bool,
    limit: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(200)
    }
}

impl HistoryManager {
    /// Empty history keeping at most `limit` entries per stack.
    pub fn new(limit: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            recording: false,
            limit: limit.max(1),
        }
    }

    /// Push a pre-mutation snapshot unconditionally (call before making changes).
    pub fn push(&mut self, snapshot: SceneSnapshot) {
        self.past.push(snapshot);

        // New changes invalidate anything undone
        self.future.clear();

        if self.past.len() > self.limit {
            self.past.remove(0);
            log::debug!("history limit {} reached, evicted oldest entry", self.limit);
        }
        log::debug!("history push ({} undo entries)", self.past.len());
    }

    /// Push `snapshot` unless a transform session is already recording.
    /// Returns whether a snapshot was pushed.
    pub fn record(&mut self, snapshot: SceneSnapshot) -> bool {
        if self.recording {
            return false;
        }
        self.push(snapshot);
        true
    }

    /// Begin batching mutations into one undo step.
    ///
    /// Pushes `snapshot` and starts recording. Calling this while a session is
    /// already recording does nothing and returns false.
    pub fn start_session(&mut self, snapshot: SceneSnapshot) -> bool {
        if self.recording {
            return false;
        }
        self.push(snapshot);
        self.recording = true;
        log::debug!("transform session started");
        true
    }

    /// Stop recording. Committing a session that was never started is a no-op.
    pub fn commit_session(&mut self) -> bool {
        if !self.recording {
            return false;
        }
        self.recording = false;
        log::debug!("transform session committed");
        true
    }

    /// Whether a transform session is open.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Pop the most recent snapshot, saving `current` for redo.
    ///
    /// An open session is closed first so the restored state is not treated
    /// as part of it.
    pub fn undo(&mut self, current: SceneSnapshot) -> Option<SceneSnapshot> {
        let snapshot = self.past.pop()?;
        self.recording = false;
        self.future.push(current);
        if self.future.len() > self.limit {
            self.future.remove(0);
        }
        log::debug!("undo ({} undo / {} redo left)", self.past.len(), self.future.len());
        Some(snapshot)
    }

    /// Pop the most recently undone snapshot, saving `current` for undo.
    pub fn redo(&mut self, current: SceneSnapshot) -> Option<SceneSnapshot> {
        let snapshot = self.future.pop()?;
        self.recording = false;
        self.past.push(current);
        if self.past.len() > self.limit {
            self.past.remove(0);
        }
        log::debug!("redo ({} undo / {} redo left)", self.past.len(), self.future.len());
        Some(snapshot)
    }

    /// Whether there is anything to undo.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether there is anything to redo.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undo entries.
    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    /// Number of redo entries.
    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    /// Drop both stacks and close any open session.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.recording = false;
    }

    /// Apply a finished async load to every stored node still waiting on
    /// `ticket`, so undo and redo never bring back a load nobody will answer.
    /// Returns the number of stored nodes updated.
    pub fn resolve_load(&mut self, ticket: &LoadTicket, mut complete: impl FnMut(&mut SceneNode)) -> usize {
        let mut resolved = 0;
        for snapshot in self.past.iter_mut().chain(self.future.iter_mut()) {
            for node in snapshot
                .nodes
                .iter_mut()
                .filter(|n| n.id == ticket.node_id && n.pending.is_some_and(|p| p.matches(ticket)))
            {
                complete(node);
                resolved += 1;
            }
        }
        if resolved > 0 {
            log::debug!("resolved {:?} load in {} history entries", ticket.kind, resolved);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeDefinition;
    use kurbo::{Point, Size};

    fn snapshot_with(count: usize) -> SceneSnapshot {
        SceneSnapshot {
            nodes: (0..count)
                .map(|i| {
                    SceneNode::new(
                        Point::new(i as f64, 0.0),
                        Size::new(10.0, 10.0),
                        NodePayload::Shape(ShapeDefinition::Ellipse),
                    )
                })
                .collect(),
            selected_ids: Vec::new(),
            world: CoordinateNormalizer::default(),
        }
    }

    #[test]
    fn test_undo_redo_swaps_states() {
        let mut history = HistoryManager::new(10);
        let before = snapshot_with(0);
        let after = snapshot_with(1);

        history.push(before.clone());
        assert!(history.can_undo());

        let restored = history.undo(after.clone()).unwrap();
        assert_eq!(restored, before);
        assert!(history.can_redo());

        let reapplied = history.redo(restored).unwrap();
        assert_eq!(reapplied, after);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = HistoryManager::new(10);
        history.push(snapshot_with(0));
        history.undo(snapshot_with(1));
        assert!(history.can_redo());

        history.push(snapshot_with(0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = HistoryManager::new(3);
        for i in 0..5 {
            history.push(snapshot_with(i));
        }
        assert_eq!(history.undo_len(), 3);
        // Oldest surviving entry is the third push.
        let mut last = None;
        while let Some(s) = history.undo(snapshot_with(0)) {
            last = Some(s);
        }
        assert_eq!(last.unwrap().nodes.len(), 2);
        assert_eq!(history.redo_len(), 3);
    }

    #[test]
    fn test_session_batches_records() {
        let mut history = HistoryManager::new(10);
        assert!(history.start_session(snapshot_with(0)));
        assert!(!history.start_session(snapshot_with(1)));
        assert!(!history.record(snapshot_with(2)));
        assert!(!history.record(snapshot_with(3)));
        assert!(history.commit_session());
        assert_eq!(history.undo_len(), 1);

        assert!(history.record(snapshot_with(4)));
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_commit_without_session_is_noop() {
        let mut history = HistoryManager::default();
        assert!(!history.commit_session());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_undo_on_empty() {
        let mut history = HistoryManager::default();
        assert!(history.undo(snapshot_with(0)).is_none());
        assert!(history.redo(snapshot_with(0)).is_none());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_resolve_load_updates_matching_entries() {
        use crate::loading::{LoadKind, PendingLoad};

        let mut waiting = snapshot_with(2);
        let pending = PendingLoad::new(LoadKind::TextLayout);
        waiting.nodes[0].pending = Some(pending);
        let ticket = LoadTicket {
            node_id: waiting.nodes[0].id(),
            kind: pending.kind,
            token: pending.token,
        };
        let stale = LoadTicket {
            token: PendingLoad::new(LoadKind::TextLayout).token,
            ..ticket
        };

        let mut history = HistoryManager::new(10);
        history.push(waiting.clone());
        history.push(snapshot_with(0));
        // One waiting copy on each stack.
        history.undo(waiting);

        assert_eq!(history.resolve_load(&stale, |n| n.size = Size::new(1.0, 1.0)), 0);
        assert_eq!(history.resolve_load(&ticket, |n| n.pending = None), 2);
        assert_eq!(history.resolve_load(&ticket, |n| n.pending = None), 0);
        let restored = history.undo(snapshot_with(0)).unwrap();
        assert!(restored.nodes[0].pending_load().is_none());
        assert_eq!(restored.nodes[1].size, Size::new(10.0, 10.0));
    }

    #[test]
    fn test_snapshot_json_sanitizes_polygons() {
        let mut snapshot = snapshot_with(1);
        snapshot.nodes[0].payload = NodePayload::Shape(ShapeDefinition::Polygon {
            points: vec![Point::ZERO, Point::new(1.0, 1.0)],
        });
        let json = snapshot.to_json().unwrap();
        let parsed = SceneSnapshot::from_json(&json).unwrap();
        match &parsed.nodes[0].payload {
            NodePayload::Shape(ShapeDefinition::Polygon { points }) => assert_eq!(points.len(), 3),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(parsed.nodes[0].id(), snapshot.nodes[0].id());
    }
}

//! Generation tokens for asynchronous per-node loads.
//!
//! A request captures the node's current [`LoadToken`]; the completion is
//! applied only while that token is still current. Issuing a newer request
//! or editing the node invalidates older completions without an explicit
//! cancel call.

use crate::shapes::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic per-process generation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoadToken(u64);

impl LoadToken {
    /// Allocate a fresh token, distinct from every previously issued one.
    pub fn next() -> Self {
        static GENERATION: AtomicU64 = AtomicU64::new(1);
        Self(GENERATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// What a load is fetching for its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadKind {
    TextLayout,
    ImageAsset,
}

/// Handle returned to the caller when a load is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub node_id: NodeId,
    pub kind: LoadKind,
    pub token: LoadToken,
}

/// A load currently outstanding on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLoad {
    pub kind: LoadKind,
    pub token: LoadToken,
}

impl PendingLoad {
    pub fn new(kind: LoadKind) -> Self {
        Self {
            kind,
            token: LoadToken::next(),
        }
    }

    /// Whether a completion for `ticket` should be applied.
    pub fn matches(&self, ticket: &LoadTicket) -> bool {
        self.kind == ticket.kind && self.token == ticket.token
    }
}

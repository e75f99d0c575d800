use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of an [`crate::Engine`] instance, unique within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineId(pub(crate) u64);

impl EngineId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Identifier of a graph node.
///
/// Ids are monotonic per engine and carry the owning engine, so a node id handed to a different
/// engine is detected as foreign instead of silently aliasing an unrelated node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) engine: EngineId,
    pub(crate) seq: u64,
}

impl NodeId {
    /// Engine that owns this node.
    pub fn engine(self) -> EngineId {
        self.engine
    }

    /// Per-engine sequence number (creation order).
    pub fn seq(self) -> u64 {
        self.seq
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}@{}", self.seq, self.engine.0)
    }
}

/// Handle returned by [`crate::Engine::on`], used to unregister a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Handle returned by [`crate::Engine::go`] for a registered per-frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(pub(crate) u64);

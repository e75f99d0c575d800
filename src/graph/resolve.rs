use crate::engine::Engine;
use crate::engine::options::SourceOptions;
use crate::foundation::error::CompographResult;
use crate::foundation::ids::NodeId;
use crate::media::MediaRef;

/// Anything that can be plugged into an image input.
#[derive(Clone)]
pub enum NodeInput {
    /// An existing node of this engine.
    Node(NodeId),
    /// External media, adapted into (or matched to) a source node.
    Media(MediaRef),
    /// Disconnect.
    Empty,
}

impl std::fmt::Debug for NodeInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(id) => f.debug_tuple("Node").field(id).finish(),
            Self::Media(m) => f.debug_tuple("Media").field(&m.kind()).finish(),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl From<NodeId> for NodeInput {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<Option<NodeId>> for NodeInput {
    fn from(id: Option<NodeId>) -> Self {
        id.map_or(Self::Empty, Self::Node)
    }
}

impl From<MediaRef> for NodeInput {
    fn from(media: MediaRef) -> Self {
        Self::Media(media)
    }
}

impl Engine {
    /// Turn a connection request into a concrete node of this engine.
    ///
    /// Ids from other engines fail with `ForeignNode`; media goes through [`Engine::source`], so
    /// connecting the same media twice reuses one source node.
    pub(crate) fn resolve_input(&mut self, input: NodeInput) -> CompographResult<Option<NodeId>> {
        match input {
            NodeInput::Node(id) => {
                self.graph.check(id)?;
                Ok(Some(id))
            }
            NodeInput::Media(media) => self.source(media, None, SourceOptions::default()).map(Some),
            NodeInput::Empty => Ok(None),
        }
    }
}

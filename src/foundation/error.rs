use crate::device::shader::ShaderCompileError;
use crate::foundation::ids::NodeId;

/// Convenience result type used across compograph.
pub type CompographResult<T> = Result<T, CompographError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Structural errors (unknown kind, cycle, foreign node, reserved name) are returned before the
/// graph is touched. Resource errors (shader compile, cross-origin media) are reported here and
/// also recorded on the offending node.
#[derive(thiserror::Error, Debug)]
pub enum CompographError {
    /// No plugin registered under this hook for the requested node role.
    #[error("unknown {role}: {hook}")]
    UnknownNodeKind {
        /// Node role (`effect`, `source`, `transform`, `target`).
        role: &'static str,
        /// Requested hook.
        hook: String,
    },

    /// No source adapter accepted the media handle.
    #[error("unknown source type")]
    UnknownSourceType,

    /// No target adapter accepted the drawing surface.
    #[error("unknown target type")]
    UnknownTargetType,

    /// Connecting `source` into `node` would close a cycle.
    #[error("cyclic connection: {source_node} is downstream of {node}")]
    CyclicConnection {
        /// Node whose input was being set.
        node: NodeId,
        /// Node that was about to become an upstream of `node`.
        source_node: NodeId,
    },

    /// The node belongs to a different engine instance.
    #[error("cannot connect a foreign node: {0}")]
    ForeignNode(NodeId),

    /// The node id does not (or no longer) exist in this engine.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The operation requires a different node kind.
    #[error("node {node} is not a {expected} node")]
    WrongNodeKind {
        /// Offending node.
        node: NodeId,
        /// Kind the operation expects.
        expected: &'static str,
    },

    /// The node has no input with this name.
    #[error("node {node} has no input named '{input}'")]
    UnknownInput {
        /// Node that was addressed.
        node: NodeId,
        /// Requested input name.
        input: String,
    },

    /// The name collides with a reserved identifier.
    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    /// Shader compile/link failure with diagnostics.
    #[error(transparent)]
    ShaderCompile(Box<ShaderCompileError>),

    /// Media pixels could not be read because of a same-origin restriction.
    #[error("unable to access cross-origin media for {0}")]
    CrossOriginMedia(NodeId),

    /// Pixel readback was requested before any device context was attached.
    #[error("cannot read pixels until a target with a device context is connected")]
    NoContext,

    /// Invalid user-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Device-level failure not covered by a more specific variant.
    #[error("device error: {0}")]
    Device(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompographError {
    /// Build a [`CompographError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompographError::Device`] value.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    pub(crate) fn unknown_kind(role: &'static str, hook: impl Into<String>) -> Self {
        Self::UnknownNodeKind {
            role,
            hook: hook.into(),
        }
    }

    /// Whether this error is structural (rejected before any graph mutation).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownNodeKind { .. }
                | Self::UnknownSourceType
                | Self::UnknownTargetType
                | Self::CyclicConnection { .. }
                | Self::ForeignNode(_)
                | Self::ReservedName(_)
        )
    }
}

impl From<ShaderCompileError> for CompographError {
    fn from(err: ShaderCompileError) -> Self {
        Self::ShaderCompile(Box::new(err))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

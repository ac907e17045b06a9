use std::path::PathBuf;

use crate::scene::NodeId;

/// Errors raised by the scene graph when a structural edit is rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist in this scene")]
    UnknownNode(NodeId),

    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

/// Errors raised while bringing up the rendering backend
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("shader binary not found: {0} (compile shaders/*.vert|frag with glslc)")]
    ShaderMissing(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

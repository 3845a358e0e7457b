//! Render system error types.

use crate::backend::BackendError;
use crate::render_system::{ComponentId, EntityId};
use thiserror::Error;

/// Errors reported by the render system.
///
/// Structural table errors (`DuplicateEntity`, `InvalidComponent`) are caller
/// bugs and leave the table exactly as it was before the call. A missing
/// component is not an error: lookups return [`ComponentId::EMPTY`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("entity {0} already has a render component")]
    DuplicateEntity(EntityId),
    #[error("component id {0} is out of range")]
    InvalidComponent(ComponentId),
    #[error("unsupported projection kind {0}")]
    UnsupportedProjection(u32),
    #[error("mesh data cannot change while the mesh is realized")]
    MeshRealized,
    #[error("invalid framebuffer size {width}x{height}")]
    InvalidFramebufferSize { width: u32, height: u32 },
    #[error("frame targets have not been sized; call resize before render")]
    TargetsNotSized,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;

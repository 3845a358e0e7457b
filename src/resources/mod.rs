//! Resource management
//!
//! CPU geometry and texture data, their GPU counterparts, and the
//! generational store the render system keeps them in.

mod mesh;
mod store;
mod texture;

pub use mesh::*;
pub use store::*;
pub use texture::*;

/// Handle to a mesh owned by the render system.
pub type MeshId = Handle<Mesh>;

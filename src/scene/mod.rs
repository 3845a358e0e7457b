//! Scene collaborators
//!
//! Transforms, lights and camera math consumed by the render system. The
//! render system never owns the scene graph; it only queries it.

pub mod camera;
mod graph;
mod light;
mod transform;

pub use camera::{Camera, CameraUniform, ProjectionKind};
pub use graph::*;
pub use light::*;
pub use transform::*;

//! Backend abstraction layer
//!
//! Provides the [`GraphicsBackend`] trait and its two implementations: the
//! wgpu backend used at runtime and a recording dummy backend used by tests
//! and headless tooling.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use dummy::DummyBackend;
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;

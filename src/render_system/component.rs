//! Identifiers and the per-entity render record

use std::fmt;

use glam::{Vec3, Vec4};

use crate::backend::BindGroupHandle;
use crate::resources::{GpuTexture, Handle, MeshId};

/// Externally issued identifier of a game entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Slot in the dense render-component table.
///
/// Only stable until the next `destroy`, which may move the last record
/// into the freed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Returned by lookups for entities without a render component.
    pub const EMPTY: Self = Self(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<empty>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A texture uploaded through the render system together with the bind
/// group the geometry pass samples it through.
#[derive(Debug)]
pub struct BoundTexture {
    pub(crate) texture: GpuTexture,
    pub(crate) bind_group: BindGroupHandle,
}

impl BoundTexture {
    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    pub fn bind_group(&self) -> BindGroupHandle {
        self.bind_group
    }
}

/// Handle to a texture owned by the render system.
pub type TextureId = Handle<BoundTexture>;

/// What to draw for one entity.
///
/// Records are identified by the entity that owns them, so there is no
/// content equality.
#[derive(Debug, Clone, Copy)]
pub struct RenderComponent {
    /// `None` or a removed mesh skips the record.
    pub mesh: Option<MeshId>,
    /// `None` or a removed texture draws with the white fallback.
    pub texture: Option<TextureId>,
    /// Multiplied into the sampled albedo.
    pub tint: Vec4,
    /// Applied on top of the entity's world transform.
    pub scale: Vec3,
}

impl Default for RenderComponent {
    fn default() -> Self {
        Self {
            mesh: None,
            texture: None,
            tint: Vec4::ONE,
            scale: Vec3::ONE,
        }
    }
}

impl RenderComponent {
    pub fn new(mesh: MeshId) -> Self {
        Self {
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

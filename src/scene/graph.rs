//! World-transform lookup

use std::collections::HashMap;

use crate::render_system::EntityId;
use crate::scene::Transform;

/// Source of world transforms for the geometry pass.
///
/// Entities the graph does not know about render with
/// [`Transform::IDENTITY`].
pub trait SceneGraph {
    fn world_transform(&self, entity: EntityId) -> Option<Transform>;
}

/// Flat entity-to-transform map
#[derive(Debug, Clone, Default)]
pub struct TransformMap {
    transforms: HashMap<EntityId, Transform>,
}

impl TransformMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityId, transform: Transform) -> Option<Transform> {
        self.transforms.insert(entity, transform)
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<Transform> {
        self.transforms.remove(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Transform> {
        self.transforms.get_mut(&entity)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl SceneGraph for TransformMap {
    fn world_transform(&self, entity: EntityId) -> Option<Transform> {
        self.transforms.get(&entity).copied()
    }
}

impl<G: SceneGraph + ?Sized> SceneGraph for &G {
    fn world_transform(&self, entity: EntityId) -> Option<Transform> {
        (**self).world_transform(entity)
    }
}

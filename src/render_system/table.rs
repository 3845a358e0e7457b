//! Dense render-component table
//!
//! Parallel `entity_id` / `component` arrays of equal length, plus a map from
//! entity to slot. Removal swaps the last record into the freed slot so the
//! arrays stay packed for the per-frame iteration.

use std::collections::HashMap;

use super::component::{ComponentId, EntityId, RenderComponent};
use crate::error::{RenderError, RenderResult};

/// Sparse-set storage of render components.
///
/// For every occupied slot `i`, `map[entity_id[i]] == i`, and the map has
/// no entry without a slot. Failed calls leave the table untouched.
#[derive(Debug, Default)]
pub struct InstanceData {
    entity_id: Vec<EntityId>,
    component: Vec<RenderComponent>,
    map: HashMap<EntityId, ComponentId>,
    capacity: usize,
}

impl InstanceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut data = Self::new();
        data.allocate(capacity);
        data
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.entity_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_id.is_empty()
    }

    /// Number of slots reserved in both arrays
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve room for at least `capacity` records. Never shrinks and never
    /// changes `len`.
    pub fn allocate(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        log::debug!(
            "Render component table: capacity {} -> {}",
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        self.reset_all_pointers();
    }

    /// Bring both arrays back to the table's capacity after a reallocation,
    /// so they always grow together.
    pub fn reset_all_pointers(&mut self) {
        let len = self.len();
        self.entity_id.reserve_exact(self.capacity - len);
        self.component.reserve_exact(self.capacity - len);
    }

    /// Attach a component to `entity`.
    pub fn create(
        &mut self,
        entity: EntityId,
        component: RenderComponent,
    ) -> RenderResult<ComponentId> {
        if self.map.contains_key(&entity) {
            return Err(RenderError::DuplicateEntity(entity));
        }

        if self.len() == self.capacity {
            self.allocate(2 * self.capacity + 1);
        }

        let id = ComponentId(self.len() as u32);
        self.entity_id.push(entity);
        self.component.push(component);
        self.map.insert(entity, id);
        Ok(id)
    }

    /// Remove the record in slot `id`, moving the last record into it.
    pub fn destroy(&mut self, id: ComponentId) -> RenderResult<()> {
        if !self.is_valid(id) {
            return Err(RenderError::InvalidComponent(id));
        }

        let index = id.index();
        let last = self.len() - 1;
        let entity = self.entity_id[index];

        if index != last {
            let moved = self.entity_id[last];
            self.entity_id.swap(index, last);
            self.component.swap(index, last);
            self.map.insert(moved, id);
        }

        self.entity_id.pop();
        self.component.pop();
        self.map.remove(&entity);
        Ok(())
    }

    /// Slot of `entity`'s record, or [`ComponentId::EMPTY`].
    pub fn get_component_id(&self, entity: EntityId) -> ComponentId {
        self.map.get(&entity).copied().unwrap_or(ComponentId::EMPTY)
    }

    pub fn is_valid(&self, id: ComponentId) -> bool {
        id.index() < self.len()
    }

    pub fn entity(&self, id: ComponentId) -> Option<EntityId> {
        self.entity_id.get(id.index()).copied()
    }

    pub fn component(&self, id: ComponentId) -> Option<&RenderComponent> {
        self.component.get(id.index())
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut RenderComponent> {
        self.component.get_mut(id.index())
    }

    /// Entities in slot order
    pub fn entities(&self) -> &[EntityId] {
        &self.entity_id
    }

    /// Components in slot order
    pub fn components(&self) -> &[RenderComponent] {
        &self.component
    }

    /// Iterates over `(slot, entity, &component)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, EntityId, &RenderComponent)> {
        self.entity_id
            .iter()
            .zip(self.component.iter())
            .enumerate()
            .map(|(i, (&entity, component))| (ComponentId(i as u32), entity, component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn tinted(v: f32) -> RenderComponent {
        RenderComponent::default().with_tint(Vec4::splat(v))
    }

    fn assert_consistent(table: &InstanceData) {
        assert!(table.len() <= table.capacity());
        assert_eq!(table.map.len(), table.len());
        assert_eq!(table.component.len(), table.entity_id.len());
        for (i, entity) in table.entity_id.iter().enumerate() {
            assert_eq!(table.map[entity], ComponentId(i as u32));
        }
    }

    #[test]
    fn create_returns_sequential_slots() {
        let mut table = InstanceData::new();
        assert_eq!(table.create(EntityId(10), tinted(1.0)).unwrap(), ComponentId(0));
        assert_eq!(table.create(EntityId(20), tinted(2.0)).unwrap(), ComponentId(1));
        assert_eq!(table.get_component_id(EntityId(20)), ComponentId(1));
        assert!(table.is_valid(ComponentId(1)));
        assert!(!table.is_valid(ComponentId(2)));
        assert_consistent(&table);
    }

    #[test]
    fn duplicate_leaves_table_unchanged() {
        let mut table = InstanceData::new();
        table.create(EntityId(1), tinted(1.0)).unwrap();
        let capacity = table.capacity();

        let result = table.create(EntityId(1), tinted(9.0));

        assert!(matches!(result, Err(RenderError::DuplicateEntity(EntityId(1)))));
        assert_eq!(table.len(), 1);
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.components()[0].tint, Vec4::ONE);
        assert_consistent(&table);
    }

    #[test]
    fn destroy_middle_swaps_last_in() {
        let mut table = InstanceData::new();
        for e in 1..=3 {
            table.create(EntityId(e), tinted(e as f32)).unwrap();
        }

        table.destroy(table.get_component_id(EntityId(2))).unwrap();

        assert_eq!(table.entities(), &[EntityId(1), EntityId(3)]);
        assert_eq!(table.get_component_id(EntityId(3)), ComponentId(1));
        assert_eq!(table.get_component_id(EntityId(2)), ComponentId::EMPTY);
        assert_eq!(table.components()[1].tint, Vec4::splat(3.0));
        assert_consistent(&table);
    }

    #[test]
    fn destroy_last_slot() {
        let mut table = InstanceData::new();
        table.create(EntityId(1), tinted(1.0)).unwrap();
        table.create(EntityId(2), tinted(2.0)).unwrap();

        table.destroy(ComponentId(1)).unwrap();

        assert_eq!(table.entities(), &[EntityId(1)]);
        assert_eq!(table.get_component_id(EntityId(1)), ComponentId(0));
        assert_consistent(&table);
    }

    #[test]
    fn destroy_invalid_fails() {
        let mut table = InstanceData::new();
        table.create(EntityId(1), tinted(1.0)).unwrap();

        assert!(matches!(
            table.destroy(ComponentId(1)),
            Err(RenderError::InvalidComponent(ComponentId(1)))
        ));
        assert!(table.destroy(ComponentId::EMPTY).is_err());
        assert_eq!(table.len(), 1);
        assert_consistent(&table);
    }

    #[test]
    fn geometric_growth() {
        let mut table = InstanceData::new();
        let mut seen = Vec::new();
        for e in 0..10 {
            table.create(EntityId(e), tinted(0.0)).unwrap();
            if seen.last() != Some(&table.capacity()) {
                seen.push(table.capacity());
            }
        }
        assert_eq!(seen, vec![1, 3, 7, 15]);
    }

    #[test]
    fn allocate_reserves_without_changing_len() {
        let mut table = InstanceData::new();
        table.create(EntityId(1), tinted(1.0)).unwrap();
        table.allocate(64);

        assert_eq!(table.capacity(), 64);
        assert_eq!(table.len(), 1);
        assert!(table.entity_id.capacity() >= 64);
        assert!(table.component.capacity() >= 64);

        table.allocate(8);
        assert_eq!(table.capacity(), 64);
    }

    #[test]
    fn invariant_holds_over_mixed_sequence() {
        let mut table = InstanceData::new();
        // Deterministic pseudo-random walk over create/destroy
        let mut state = 0x2545_f491u32;
        for step in 0..500u32 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let entity = EntityId(state % 64);
            if table.get_component_id(entity).is_empty() {
                table.create(entity, tinted(step as f32)).unwrap();
            } else {
                let victim = ComponentId(state % table.len() as u32);
                table.destroy(victim).unwrap();
            }
            assert_consistent(&table);
        }
    }
}

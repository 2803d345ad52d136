use std::collections::BTreeMap;
use std::sync::Arc;

use worldspace_common::{EntityId, EntityScope};

use crate::component::{Component, ComponentMap};
use crate::prefab::{Prefab, PrefabManager};

/// Per-entity bookkeeping that is not a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    /// Prefab the entity was instantiated from, if any.
    pub parent_prefab: Option<String>,
    /// Logical "owned-by" relation; may dangle or form cycles.
    pub owner: Option<EntityId>,
    pub scope: Option<EntityScope>,
    pub always_relevant: bool,
    pub persistent: bool,
}

impl Default for EntityInfo {
    fn default() -> Self {
        Self {
            parent_prefab: None,
            owner: None,
            scope: None,
            always_relevant: false,
            persistent: true,
        }
    }
}

impl EntityInfo {
    /// Info for an entity instantiated from `prefab`.
    pub fn from_prefab(prefab: &Prefab) -> Self {
        Self {
            parent_prefab: Some(prefab.name().to_string()),
            always_relevant: prefab.is_always_relevant(),
            persistent: prefab.is_persisted(),
            ..Self::default()
        }
    }
}

/// An entity: id, bookkeeping info and its component set.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    info: EntityInfo,
    components: ComponentMap,
}

impl Entity {
    pub fn new(id: EntityId, info: EntityInfo, components: ComponentMap) -> Self {
        Self {
            id,
            info,
            components,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut EntityInfo {
        &mut self.info
    }

    pub fn parent_prefab(&self) -> Option<&str> {
        self.info.parent_prefab.as_deref()
    }

    /// Raw owner reference. Use [`EntityManager::owner_of`] to skip dangling owners.
    pub fn owner(&self) -> Option<EntityId> {
        self.info.owner
    }

    pub fn scope(&self) -> Option<EntityScope> {
        self.info.scope
    }

    pub fn is_always_relevant(&self) -> bool {
        self.info.always_relevant
    }

    pub fn is_persistent(&self) -> bool {
        self.info.persistent
    }

    pub fn components(&self) -> &ComponentMap {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentMap {
        &mut self.components
    }

    pub fn iter_components(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.iter()
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components.get::<C>()
    }
}

/// Owns live entities and mints entity ids.
#[derive(Debug)]
pub struct EntityManager {
    prefabs: Arc<PrefabManager>,
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl EntityManager {
    pub fn new(prefabs: Arc<PrefabManager>) -> Self {
        Self {
            prefabs,
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn prefabs(&self) -> &Arc<PrefabManager> {
        &self.prefabs
    }

    /// Reserve a fresh id that is not in use. Never returns [`EntityId::NULL`].
    pub fn mint_id(&mut self) -> EntityId {
        loop {
            let id = EntityId(self.next_id);
            self.next_id = successor(self.next_id);
            if !id.is_null() && !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    /// Create an entity with default info and a fresh id.
    pub fn create(&mut self, components: ComponentMap) -> EntityId {
        self.create_with_info(EntityInfo::default(), components)
    }

    pub fn create_with_info(&mut self, info: EntityInfo, components: ComponentMap) -> EntityId {
        let id = self.mint_id();
        self.entities.insert(id, Entity::new(id, info, components));
        id
    }

    /// Instantiate an entity from a registered prefab. `None` if the prefab is unknown.
    pub fn create_from_prefab(&mut self, prefab_name: &str) -> Option<EntityId> {
        let prefab = self.prefabs.get(prefab_name)?;
        Some(self.create_with_info(EntityInfo::from_prefab(&prefab), prefab.instantiate_components()))
    }

    /// Create (or replace) the entity with the given id.
    pub fn create_with_id(&mut self, id: EntityId, info: EntityInfo, components: ComponentMap) -> EntityId {
        if self
            .entities
            .insert(id, Entity::new(id, info, components))
            .is_some()
        {
            tracing::debug!(%id, "replaced existing entity");
        }
        if id.0 >= self.next_id {
            self.next_id = successor(id.0);
        }
        id
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn destroy(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// The entity's owner, if it still exists.
    pub fn owner_of(&self, id: EntityId) -> Option<EntityId> {
        self.entities
            .get(&id)?
            .owner()
            .filter(|owner| self.entities.contains_key(owner))
    }

    /// Entities whose owner is `id`.
    pub fn owned_by(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.owner() == Some(id))
            .map(Entity::id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Next id counter value; wraps past `u64::MAX` to 1, skipping the null id.
fn successor(id: u64) -> u64 {
    id.checked_add(1).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Hp(i32);

    fn manager() -> EntityManager {
        let mut prefabs = PrefabManager::new();
        prefabs.register(
            Prefab::builder("test:orc")
                .with(Hp(10))
                .always_relevant(true)
                .build(),
        );
        EntityManager::new(Arc::new(prefabs))
    }

    #[test]
    fn ids_are_unique_and_never_null() {
        let mut manager = manager();
        let a = manager.create(ComponentMap::new());
        let b = manager.create(ComponentMap::new());
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn create_with_id_advances_counter() {
        let mut manager = manager();
        manager.create_with_id(EntityId(50), EntityInfo::default(), ComponentMap::new());
        let next = manager.create(ComponentMap::new());
        assert_eq!(next, EntityId(51));
    }

    #[test]
    fn max_id_wraps_the_counter_without_minting_null() {
        let mut manager = manager();
        let first = manager.create(ComponentMap::new());
        manager.create_with_id(EntityId(u64::MAX), EntityInfo::default(), ComponentMap::new());
        let next = manager.create(ComponentMap::new());
        assert!(!next.is_null());
        assert_ne!(next, first);
        assert_ne!(next, EntityId(u64::MAX));
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn prefab_instantiation_copies_components() {
        let mut manager = manager();
        let id = manager.create_from_prefab("test:orc").unwrap();
        let entity = manager.get(id).unwrap();
        assert_eq!(entity.get::<Hp>(), Some(&Hp(10)));
        assert_eq!(entity.parent_prefab(), Some("test:orc"));
        assert!(entity.is_always_relevant());
        assert!(manager.create_from_prefab("test:missing").is_none());
    }

    #[test]
    fn dangling_owner_reads_as_absent() {
        let mut manager = manager();
        let owner = manager.create(ComponentMap::new());
        let owned = manager.create_with_info(
            EntityInfo {
                owner: Some(owner),
                ..EntityInfo::default()
            },
            ComponentMap::new(),
        );
        assert_eq!(manager.owner_of(owned), Some(owner));
        assert_eq!(manager.owned_by(owner), vec![owned]);

        manager.destroy(owner);
        assert_eq!(manager.owner_of(owned), None);
        assert_eq!(manager.get(owned).unwrap().owner(), Some(owner));
    }

    #[test]
    fn ownership_cycles_are_tolerated() {
        let mut manager = manager();
        let a = manager.create(ComponentMap::new());
        let b = manager.create_with_info(
            EntityInfo {
                owner: Some(a),
                ..EntityInfo::default()
            },
            ComponentMap::new(),
        );
        manager.get_mut(a).unwrap().info_mut().owner = Some(b);
        assert_eq!(manager.owner_of(a), Some(b));
        assert_eq!(manager.owner_of(b), Some(a));
    }
}

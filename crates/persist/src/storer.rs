use std::collections::BTreeSet;

use worldspace_common::EntityId;
use worldspace_ecs::EntityManager;

use crate::checks::{PersistedComponents, PersistedFields};
use crate::entity_serializer::EntitySerializer;
use crate::error::PersistError;
use crate::id_mapping::ComponentIdMapping;
use crate::wire::EntityStore;

/// Collects entities into an [`EntityStore`].
///
/// Components are written with compact ids; the id table goes into the store
/// so it can be read back against a different registration order.
pub struct EntityStorer<'a> {
    manager: &'a EntityManager,
    serializer: EntitySerializer,
    store: EntityStore,
    stored: BTreeSet<EntityId>,
}

impl<'a> EntityStorer<'a> {
    pub fn new(manager: &'a EntityManager, mut serializer: EntitySerializer) -> Self {
        let library = serializer.component_serializer().library();
        let component_names = library.iter().map(|m| m.name().to_string()).collect();
        let mapping = ComponentIdMapping::from_library(library);
        serializer.set_id_mapping(mapping);
        serializer.set_component_check(PersistedComponents);
        Self {
            manager,
            serializer,
            store: EntityStore {
                component_names,
                entities: Vec::new(),
            },
            stored: BTreeSet::new(),
        }
    }

    /// Store a persistent entity, preceded by the persistent entities it owns
    /// that are not always relevant. Non-persistent and missing entities are skipped.
    pub fn store(&mut self, id: EntityId) -> Result<(), PersistError> {
        if self.stored.contains(&id) {
            return Ok(());
        }
        let manager = self.manager;
        let Some(entity) = manager.get(id) else {
            tracing::debug!(%id, "entity to store does not exist");
            return Ok(());
        };
        if !entity.is_persistent() {
            return Ok(());
        }
        // Marked before recursing so ownership cycles terminate.
        self.stored.insert(id);

        for owned in manager.owned_by(id) {
            let Some(owned_entity) = manager.get(owned) else {
                continue;
            };
            if owned_entity.is_persistent() && !owned_entity.is_always_relevant() {
                self.store(owned)?;
            }
        }

        let data = self.serializer.serialize(manager, entity, true, &PersistedFields)?;
        tracing::trace!(%id, components = data.components.len(), "entity stored");
        self.store.entities.push(data);
        Ok(())
    }

    pub fn stored_entities(&self) -> &BTreeSet<EntityId> {
        &self.stored
    }

    pub fn finish(self) -> (EntityStore, BTreeSet<EntityId>) {
        (self.store, self.stored)
    }
}

/// Reads an [`EntityStore`] back into an entity manager.
#[derive(Debug, Clone)]
pub struct EntityRestorer {
    serializer: EntitySerializer,
}

impl EntityRestorer {
    pub fn new(serializer: EntitySerializer) -> Self {
        Self { serializer }
    }

    /// Restore every entity in `store`, returning the ids in store order.
    pub fn restore(&self, manager: &mut EntityManager, store: &EntityStore) -> Result<Vec<EntityId>, PersistError> {
        let mut serializer = self.serializer.clone();
        let mut mapping = ComponentIdMapping::new();
        for (id, name) in (0u32..).zip(&store.component_names) {
            match serializer.component_serializer().library().resolve(name) {
                Some(metadata) => mapping.insert(metadata, id)?,
                None => tracing::warn!(component = name.as_str(), "stored component type is not registered"),
            }
        }
        serializer.set_id_mapping(mapping);
        serializer.set_component_check(PersistedComponents);

        let ids = store
            .entities
            .iter()
            .map(|data| serializer.deserialize(manager, data))
            .collect::<Vec<_>>();
        tracing::debug!(entities = ids.len(), "entity store restored");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use worldspace_ecs::{
        ComponentLibrary, ComponentMap, ComponentMetadata, EntityInfo, Prefab, PrefabManager,
    };
    use worldspace_typehandling::TypeHandlerLibrary;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Label {
        text: String,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        value: i32,
        cache: i32,
    }

    fn setup(library: ComponentLibrary) -> (EntitySerializer, EntityManager) {
        let mut prefabs = PrefabManager::new();
        prefabs.register(
            Prefab::builder("test:crate")
                .with(Label { text: "crate".into() })
                .build(),
        );
        let prefabs = Arc::new(prefabs);
        let serializer = EntitySerializer::new(
            Arc::new(library),
            Arc::clone(&prefabs),
            Arc::new(TypeHandlerLibrary::with_defaults()),
        );
        (serializer, EntityManager::new(prefabs))
    }

    fn library(reversed: bool) -> ComponentLibrary {
        let label = ComponentMetadata::builder::<Label>("test:label")
            .field("text", |c| &c.text, |c| &mut c.text)
            .build();
        let counter = ComponentMetadata::builder::<Counter>("test:counter")
            .field("value", |c| &c.value, |c| &mut c.value)
            .transient_field("cache", |c| &c.cache, |c| &mut c.cache)
            .build();
        let mut library = ComponentLibrary::new();
        if reversed {
            library.register(counter).unwrap();
            library.register(label).unwrap();
        } else {
            library.register(label).unwrap();
            library.register(counter).unwrap();
        }
        library
    }

    fn owned_by(owner: EntityId) -> EntityInfo {
        EntityInfo {
            owner: Some(owner),
            ..EntityInfo::default()
        }
    }

    #[test]
    fn stores_owned_entities_first_and_skips_transient() {
        let (serializer, mut manager) = setup(library(false));
        let chest = manager.create(ComponentMap::new().with(Counter { value: 3, cache: 99 }));
        let item = manager.create_with_info(owned_by(chest), ComponentMap::new().with(Label { text: "gem".into() }));
        let ghost = manager.create_with_info(
            EntityInfo {
                persistent: false,
                ..owned_by(chest)
            },
            ComponentMap::new(),
        );
        let global = manager.create_with_info(
            EntityInfo {
                always_relevant: true,
                ..owned_by(chest)
            },
            ComponentMap::new(),
        );

        let mut storer = EntityStorer::new(&manager, serializer);
        storer.store(chest).unwrap();
        let (store, stored) = storer.finish();

        assert_eq!(stored, BTreeSet::from([chest, item]));
        assert!(!stored.contains(&ghost));
        assert!(!stored.contains(&global));
        assert_eq!(store.component_names, vec!["test:label", "test:counter"]);
        assert_eq!(store.entities.len(), 2);
        assert_eq!(store.entities[0].id, Some(item.0));
        assert_eq!(store.entities[1].id, Some(chest.0));
    }

    #[test]
    fn ownership_cycle_terminates() {
        let (serializer, mut manager) = setup(library(false));
        let a = manager.create(ComponentMap::new());
        let b = manager.create_with_info(owned_by(a), ComponentMap::new());
        manager.get_mut(a).unwrap().info_mut().owner = Some(b);

        let mut storer = EntityStorer::new(&manager, serializer);
        storer.store(a).unwrap();
        storer.store(b).unwrap();
        let (store, stored) = storer.finish();
        assert_eq!(stored.len(), 2);
        assert_eq!(store.entities.len(), 2);
    }

    #[test]
    fn restore_against_different_registration_order() {
        let (serializer, mut manager) = setup(library(false));
        let chest = manager.create(ComponentMap::new().with(Counter { value: 3, cache: 99 }));
        let from_prefab = manager.create_from_prefab("test:crate").unwrap();
        manager
            .get_mut(from_prefab)
            .unwrap()
            .components_mut()
            .insert(Counter { value: 8, cache: 1 });

        let mut storer = EntityStorer::new(&manager, serializer);
        storer.store(chest).unwrap();
        storer.store(from_prefab).unwrap();
        let (store, _) = storer.finish();

        let (other_serializer, mut target) = setup(library(true));
        let restored = EntityRestorer::new(other_serializer)
            .restore(&mut target, &store)
            .unwrap();
        assert_eq!(restored, vec![chest, from_prefab]);

        let chest_entity = target.get(chest).unwrap();
        assert_eq!(chest_entity.get::<Counter>(), Some(&Counter { value: 3, cache: 0 }));
        let crate_entity = target.get(from_prefab).unwrap();
        assert_eq!(crate_entity.get::<Label>(), Some(&Label { text: "crate".into() }));
        assert_eq!(crate_entity.get::<Counter>().unwrap().value, 8);
    }

    #[test]
    fn unregistered_store_components_are_skipped() {
        let (serializer, mut manager) = setup(library(false));
        let id = manager.create(
            ComponentMap::new()
                .with(Label { text: "x".into() })
                .with(Counter { value: 1, cache: 0 }),
        );
        let mut storer = EntityStorer::new(&manager, serializer);
        storer.store(id).unwrap();
        let (store, _) = storer.finish();

        let mut only_labels = ComponentLibrary::new();
        only_labels
            .register(
                ComponentMetadata::builder::<Label>("test:label")
                    .field("text", |c| &c.text, |c| &mut c.text)
                    .build(),
            )
            .unwrap();
        let (other_serializer, mut target) = setup(only_labels);
        let restored = EntityRestorer::new(other_serializer)
            .restore(&mut target, &store)
            .unwrap();
        let entity = target.get(restored[0]).unwrap();
        assert_eq!(entity.components().len(), 1);
        assert!(entity.get::<Label>().is_some());
    }
}

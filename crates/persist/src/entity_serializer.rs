use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use worldspace_common::EntityId;
use worldspace_ecs::{
    ComponentLibrary, ComponentMap, Entity, EntityInfo, EntityManager, Prefab, PrefabManager,
};
use worldspace_typehandling::TypeHandlerLibrary;

use crate::checks::{AllComponents, AllFields, ComponentSerializeCheck, FieldSerializeCheck};
use crate::component_serializer::ComponentSerializer;
use crate::config::PersistConfig;
use crate::error::PersistError;
use crate::id_mapping::ComponentIdMapping;
use crate::wire::{ComponentKey, EncodedEntity};

/// Encodes whole entities, in full or as a delta against their parent prefab,
/// and turns encoded entities back into live ones.
#[derive(Clone)]
pub struct EntitySerializer {
    components: ComponentSerializer,
    prefabs: Arc<PrefabManager>,
    component_check: Arc<dyn ComponentSerializeCheck>,
    ignoring_entity_id: bool,
}

impl EntitySerializer {
    pub fn new(
        library: Arc<ComponentLibrary>,
        prefabs: Arc<PrefabManager>,
        handlers: Arc<TypeHandlerLibrary>,
    ) -> Self {
        Self {
            components: ComponentSerializer::new(library, handlers),
            prefabs,
            component_check: Arc::new(AllComponents),
            ignoring_entity_id: false,
        }
    }

    /// Apply session settings.
    pub fn configure(&mut self, config: &PersistConfig) {
        self.ignoring_entity_id = config.ignoring_entity_id;
        self.components.set_using_field_ids(config.using_field_ids);
        if config.component_ids {
            let mapping = ComponentIdMapping::from_library(self.components.library());
            self.components.set_id_mapping(mapping);
        }
    }

    pub fn component_serializer(&self) -> &ComponentSerializer {
        &self.components
    }

    pub fn component_serializer_mut(&mut self) -> &mut ComponentSerializer {
        &mut self.components
    }

    pub fn set_id_mapping(&mut self, mapping: ComponentIdMapping) {
        self.components.set_id_mapping(mapping);
    }

    pub fn set_component_check(&mut self, check: impl ComponentSerializeCheck + 'static) {
        self.component_check = Arc::new(check);
    }

    pub fn is_ignoring_entity_id(&self) -> bool {
        self.ignoring_entity_id
    }

    /// Omit ids on write and always mint fresh ids on read.
    ///
    /// Entity references held in component fields still point at the original
    /// ids, so links between entities do not survive.
    pub fn set_ignoring_entity_id(&mut self, ignoring: bool) {
        self.ignoring_entity_id = ignoring;
    }

    /// Encode an entity. With `delta` set and a resolvable parent prefab, only
    /// the differences from the prefab are written.
    ///
    /// An owner that no longer exists in `manager` is not written.
    pub fn serialize(
        &self,
        manager: &EntityManager,
        entity: &Entity,
        delta: bool,
        field_check: &dyn FieldSerializeCheck,
    ) -> Result<EncodedEntity, PersistError> {
        let mut data = EncodedEntity {
            id: (!self.ignoring_entity_id).then_some(entity.id().0),
            owner: entity
                .owner()
                .filter(|owner| manager.exists(*owner))
                .map(|owner| owner.0),
            scope: entity.scope(),
            ..EncodedEntity::default()
        };
        let prefab = entity.parent_prefab().and_then(|name| self.prefabs.get(name));
        match prefab {
            Some(prefab) if delta => self.serialize_delta(&mut data, entity, &prefab, field_check)?,
            _ => self.serialize_full(&mut data, entity, field_check)?,
        }
        Ok(data)
    }

    fn serialize_full(
        &self,
        data: &mut EncodedEntity,
        entity: &Entity,
        field_check: &dyn FieldSerializeCheck,
    ) -> Result<(), PersistError> {
        data.always_relevant = Some(entity.is_always_relevant());
        for component in entity.iter_components() {
            let Some(metadata) = self.components.library().metadata_of(component) else {
                tracing::warn!(entity = %entity.id(), ?component, "unregistered component not serialized");
                continue;
            };
            if !self.component_check.should_serialize(metadata) {
                continue;
            }
            data.components
                .push(self.components.serialize(component, field_check)?);
        }
        Ok(())
    }

    fn serialize_delta(
        &self,
        data: &mut EncodedEntity,
        entity: &Entity,
        prefab: &Prefab,
        field_check: &dyn FieldSerializeCheck,
    ) -> Result<(), PersistError> {
        data.parent_prefab = Some(prefab.name().to_string());
        if entity.is_always_relevant() != prefab.is_always_relevant() {
            data.always_relevant = Some(entity.is_always_relevant());
        }

        let mut present: HashSet<TypeId> = HashSet::new();
        for component in entity.iter_components() {
            let Some(metadata) = self.components.library().metadata_of(component) else {
                tracing::warn!(entity = %entity.id(), ?component, "unregistered component not serialized");
                continue;
            };
            if !self.component_check.should_serialize(metadata) {
                continue;
            }
            present.insert(metadata.type_id());
            let encoded = match prefab.component(metadata.type_id()) {
                Some(base) => self
                    .components
                    .serialize_delta(base, component, field_check)?,
                None => Some(self.components.serialize(component, field_check)?),
            };
            data.components.extend(encoded);
        }

        for base in prefab.iter_components() {
            let Some(metadata) = self.components.library().metadata_of(base) else {
                continue;
            };
            if !present.contains(&metadata.type_id()) && self.component_check.should_serialize(metadata) {
                data.removed_components
                    .push(self.components.component_key(metadata));
            }
        }
        Ok(())
    }

    /// Rebuild an entity inside `manager` and return its id.
    ///
    /// Unresolvable components are skipped with a warning; the entity is always
    /// created with whatever could be decoded.
    pub fn deserialize(&self, manager: &mut EntityManager, data: &EncodedEntity) -> EntityId {
        let (mut info, mut components) = self.initial_components(data);

        if let Some(owner) = data.owner {
            info.owner = Some(EntityId(owner));
        }
        if let Some(always_relevant) = data.always_relevant {
            info.always_relevant = always_relevant;
        }
        if let Some(scope) = data.scope {
            info.scope = Some(scope);
        }

        for encoded in &data.components {
            let Some(metadata) = self.components.resolve(&encoded.component) else {
                tracing::warn!(component = %encoded.component, "unknown component skipped");
                continue;
            };
            if !self.component_check.should_serialize(metadata) {
                continue;
            }
            match components.get_dyn_mut(metadata.type_id()) {
                Some(existing) => {
                    if let Err(err) = self.components.deserialize_onto(existing, encoded, &AllFields) {
                        tracing::warn!(component = metadata.name(), %err, "component merge skipped");
                    }
                }
                None => match self.components.deserialize(encoded, &AllFields) {
                    Ok(component) => {
                        components.insert_boxed(component);
                    }
                    Err(err) => {
                        tracing::warn!(component = metadata.name(), %err, "component skipped");
                    }
                },
            }
        }

        let id = match data.id {
            Some(id) if !self.ignoring_entity_id && id != EntityId::NULL.0 => EntityId(id),
            stray => {
                let mut id = manager.mint_id();
                while stray == Some(id.0) {
                    id = manager.mint_id();
                }
                id
            }
        };
        tracing::trace!(%id, components = components.len(), "entity deserialized");
        manager.create_with_id(id, info, components)
    }

    /// Prefab components minus the removed ones, and the prefab-derived info.
    fn initial_components(&self, data: &EncodedEntity) -> (EntityInfo, ComponentMap) {
        let prefab = data
            .parent_prefab
            .as_deref()
            .filter(|name| !name.is_empty())
            .and_then(|name| {
                let prefab = self.prefabs.get(name);
                if prefab.is_none() {
                    tracing::warn!(prefab = name, "unknown parent prefab");
                }
                prefab
            });
        let Some(prefab) = prefab else {
            return (EntityInfo::default(), ComponentMap::new());
        };

        let removed: HashSet<TypeId> = data
            .removed_components
            .iter()
            .filter_map(|key| self.resolve_removed(key))
            .collect();
        let components = prefab
            .iter_components()
            .filter(|c| !removed.contains(&(*c).component_type()))
            .map(|c| self.components.library().copy(c))
            .collect();
        (EntityInfo::from_prefab(&prefab), components)
    }

    fn resolve_removed(&self, key: &ComponentKey) -> Option<TypeId> {
        let resolved = self.components.resolve(key).map(|m| m.type_id());
        if resolved.is_none() {
            tracing::warn!(component = %key, "unknown removed component");
        }
        resolved
    }
}

impl std::fmt::Debug for EntitySerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySerializer")
            .field("components", &self.components)
            .field("ignoring_entity_id", &self.ignoring_entity_id)
            .finish_non_exhaustive()
    }
}

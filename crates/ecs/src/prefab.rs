use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{Component, ComponentMap};

/// A named, immutable template supplying default components for entities.
#[derive(Debug)]
pub struct Prefab {
    name: String,
    components: ComponentMap,
    always_relevant: bool,
    persisted: bool,
}

impl Prefab {
    pub fn builder(name: impl Into<String>) -> PrefabBuilder {
        PrefabBuilder {
            name: name.into(),
            components: ComponentMap::new(),
            always_relevant: false,
            persisted: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_always_relevant(&self) -> bool {
        self.always_relevant
    }

    /// Whether entities instantiated from this prefab are persisted.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn iter_components(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.iter()
    }

    pub fn component(&self, type_id: TypeId) -> Option<&dyn Component> {
        self.components.get_dyn(type_id)
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components.get::<C>()
    }

    pub fn has_component(&self, type_id: TypeId) -> bool {
        self.components.contains(type_id)
    }

    /// Deep copy of the prefab's components.
    pub fn instantiate_components(&self) -> ComponentMap {
        self.components.clone()
    }
}

pub struct PrefabBuilder {
    name: String,
    components: ComponentMap,
    always_relevant: bool,
    persisted: bool,
}

impl PrefabBuilder {
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.components.insert(component);
        self
    }

    pub fn always_relevant(mut self, always_relevant: bool) -> Self {
        self.always_relevant = always_relevant;
        self
    }

    pub fn persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }

    pub fn build(self) -> Prefab {
        Prefab {
            name: self.name,
            components: self.components,
            always_relevant: self.always_relevant,
            persisted: self.persisted,
        }
    }
}

/// Prefabs by name. Loaded once, read-only afterwards.
#[derive(Debug, Default)]
pub struct PrefabManager {
    prefabs: HashMap<String, Arc<Prefab>>,
}

impl PrefabManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefab, replacing any prefab with the same name.
    pub fn register(&mut self, prefab: Prefab) -> Arc<Prefab> {
        let prefab = Arc::new(prefab);
        if self
            .prefabs
            .insert(prefab.name().to_string(), Arc::clone(&prefab))
            .is_some()
        {
            tracing::warn!(name = prefab.name(), "replaced existing prefab");
        }
        prefab
    }

    pub fn exists(&self, name: &str) -> bool {
        self.prefabs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Prefab>> {
        self.prefabs.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Hp(i32);

    #[test]
    fn instantiate_is_deep_copy() {
        let prefab = Prefab::builder("test:orc").with(Hp(10)).build();
        let mut components = prefab.instantiate_components();
        components.get_mut::<Hp>().unwrap().0 = 3;
        assert_eq!(prefab.get::<Hp>(), Some(&Hp(10)));
        assert!(prefab.has_component(TypeId::of::<Hp>()));
    }

    #[test]
    fn manager_lookup() {
        let mut prefabs = PrefabManager::new();
        prefabs.register(Prefab::builder("test:orc").always_relevant(true).build());
        assert!(prefabs.exists("test:orc"));
        assert!(!prefabs.exists("test:elf"));
        assert!(prefabs.get("test:orc").unwrap().is_always_relevant());
        assert!(prefabs.get("test:orc").unwrap().is_persisted());
    }
}

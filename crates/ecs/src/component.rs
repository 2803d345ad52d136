use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;

/// A component instance stored on an entity or a prefab.
///
/// Implemented for every `Clone + Debug + Send + Sync + 'static` type, so a
/// plain struct is a component as soon as it is registered in a
/// [`ComponentLibrary`](crate::ComponentLibrary).
pub trait Component: Any + Send + Sync + fmt::Debug {
    fn component_type(&self) -> TypeId;
    fn clone_component(&self) -> Box<dyn Component>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> Component for T
where
    T: Any + Send + Sync + fmt::Debug + Clone,
{
    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Component set keyed by component type: one instance per type.
#[derive(Debug, Default)]
pub struct ComponentMap {
    components: BTreeMap<TypeId, Box<dyn Component>>,
}

impl ComponentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, replacing (and returning) any instance of the same type.
    pub fn insert<C: Component>(&mut self, component: C) -> Option<Box<dyn Component>> {
        self.insert_boxed(Box::new(component))
    }

    pub fn insert_boxed(&mut self, component: Box<dyn Component>) -> Option<Box<dyn Component>> {
        self.components.insert(component.component_type(), component)
    }

    /// Builder-style insert.
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.insert(component);
        self
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components
            .get(&TypeId::of::<C>())
            .and_then(|c| (**c).as_any().downcast_ref::<C>())
    }

    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .get_mut(&TypeId::of::<C>())
            .and_then(|c| (**c).as_any_mut().downcast_mut::<C>())
    }

    pub fn get_dyn(&self, type_id: TypeId) -> Option<&dyn Component> {
        self.components.get(&type_id).map(|c| &**c)
    }

    pub fn get_dyn_mut(&mut self, type_id: TypeId) -> Option<&mut dyn Component> {
        match self.components.get_mut(&type_id) {
            Some(c) => Some(&mut **c),
            None => None,
        }
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    pub fn remove(&mut self, type_id: TypeId) -> Option<Box<dyn Component>> {
        self.components.remove(&type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.values().map(|c| &**c)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.components.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Clone for ComponentMap {
    /// Deep copy: every component is cloned.
    fn clone(&self) -> Self {
        Self {
            components: self
                .components
                .iter()
                .map(|(k, v)| (*k, (**v).clone_component()))
                .collect(),
        }
    }
}

impl FromIterator<Box<dyn Component>> for ComponentMap {
    fn from_iter<I: IntoIterator<Item = Box<dyn Component>>>(iter: I) -> Self {
        let mut map = Self::new();
        for component in iter {
            map.insert_boxed(component);
        }
        map
    }
}

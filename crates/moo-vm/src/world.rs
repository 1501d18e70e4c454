//! The object store the interpreter runs against.
//!
//! Persistence and trait inheritance live outside this crate; the VM only
//! needs the lookups below. [`MemoryWorld`] is a flat in-memory store for
//! tests and the command-line runner.

use std::rc::Rc;

use hashbrown::HashMap;
use moo_common::ErrorKind;

use crate::executable::Executable;
use crate::value::{ObjId, Value};

pub trait World {
    fn valid(&self, obj: ObjId) -> bool;

    fn get_property(&self, obj: ObjId, name: &str) -> Result<Value, ErrorKind>;

    fn set_property(&mut self, obj: ObjId, name: &str, value: Value) -> Result<(), ErrorKind>;

    /// Verb `name` callable on `obj`, through any trait it carries.
    fn find_verb(&self, obj: ObjId, name: &str) -> Option<Rc<Executable>>;

    fn trait_exists(&self, name: &str) -> bool;

    fn has_trait(&self, obj: ObjId, name: &str) -> bool;

    fn get_trait_property(&self, _trait_name: &str, _name: &str) -> Option<Value> {
        None
    }

    fn find_trait_verb(&self, _trait_name: &str, _name: &str) -> Option<Rc<Executable>> {
        None
    }

    /// Deliver text to whoever is connected as `obj`.
    fn notify(&mut self, obj: ObjId, text: &str);

    /// Host-provided builtin. `None` when the host has no builtin by that name.
    fn call_builtin(&mut self, _name: &str, _args: &[Value]) -> Option<Result<Value, ErrorKind>> {
        None
    }
}

#[derive(Debug, Default)]
pub struct MemoryObject {
    pub props: HashMap<String, Value>,
    pub traits: Vec<String>,
    pub verbs: HashMap<String, Rc<Executable>>,
}

#[derive(Debug, Default)]
pub struct MemoryTrait {
    pub props: HashMap<String, Value>,
    pub verbs: HashMap<String, Rc<Executable>>,
}

#[derive(Debug, Default)]
pub struct MemoryWorld {
    objects: HashMap<ObjId, MemoryObject>,
    traits: HashMap<String, MemoryTrait>,
    /// Every `notify` call in order, for inspection.
    pub notifications: Vec<(ObjId, String)>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, obj: ObjId) -> &mut MemoryObject {
        self.objects.entry(obj).or_default()
    }

    pub fn object(&self, obj: ObjId) -> Option<&MemoryObject> {
        self.objects.get(&obj)
    }

    pub fn recycle(&mut self, obj: ObjId) -> bool {
        self.objects.remove(&obj).is_some()
    }

    pub fn define_trait(&mut self, name: impl Into<String>) -> &mut MemoryTrait {
        self.traits.entry(name.into()).or_default()
    }

    pub fn add_trait(&mut self, obj: ObjId, name: impl Into<String>) {
        let name = name.into();
        self.traits.entry(name.clone()).or_default();
        let object = self.create(obj);
        if !object.traits.contains(&name) {
            object.traits.push(name);
        }
    }

    pub fn add_verb(&mut self, obj: ObjId, name: impl Into<String>, code: Executable) {
        self.create(obj).verbs.insert(name.into(), Rc::new(code));
    }

    pub fn add_trait_verb(&mut self, trait_name: &str, name: impl Into<String>, code: Executable) {
        self.define_trait(trait_name).verbs.insert(name.into(), Rc::new(code));
    }

    /// Notifications sent to `obj`, oldest first.
    pub fn notifications_for(&self, obj: ObjId) -> Vec<&str> {
        self.notifications
            .iter()
            .filter(|(o, _)| *o == obj)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl World for MemoryWorld {
    fn valid(&self, obj: ObjId) -> bool {
        self.objects.contains_key(&obj)
    }

    fn get_property(&self, obj: ObjId, name: &str) -> Result<Value, ErrorKind> {
        let object = self.objects.get(&obj).ok_or(ErrorKind::InvObj)?;
        if let Some(value) = object.props.get(name) {
            return Ok(value.clone());
        }
        object
            .traits
            .iter()
            .find_map(|t| self.get_trait_property(t, name))
            .ok_or(ErrorKind::PropNf)
    }

    fn set_property(&mut self, obj: ObjId, name: &str, value: Value) -> Result<(), ErrorKind> {
        let object = self.objects.get_mut(&obj).ok_or(ErrorKind::InvObj)?;
        object.props.insert(name.to_string(), value);
        Ok(())
    }

    fn find_verb(&self, obj: ObjId, name: &str) -> Option<Rc<Executable>> {
        let object = self.objects.get(&obj)?;
        object
            .verbs
            .get(name)
            .cloned()
            .or_else(|| object.traits.iter().find_map(|t| self.find_trait_verb(t, name)))
    }

    fn trait_exists(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    fn has_trait(&self, obj: ObjId, name: &str) -> bool {
        self.objects
            .get(&obj)
            .map_or(false, |o| o.traits.iter().any(|t| t == name))
    }

    fn get_trait_property(&self, trait_name: &str, name: &str) -> Option<Value> {
        self.traits.get(trait_name)?.props.get(name).cloned()
    }

    fn find_trait_verb(&self, trait_name: &str, name: &str) -> Option<Rc<Executable>> {
        self.traits.get(trait_name)?.verbs.get(name).cloned()
    }

    fn notify(&mut self, obj: ObjId, text: &str) {
        self.notifications.push((obj, text.to_string()));
    }
}

//! Per-run object arena.
//!
//! Objects live until the run ends; a run is bounded by its step budget, so the
//! arena never needs collecting.

use std::rc::Rc;

use super::ast::{ClassDef, FunctionDef};
use super::interpreter::{Completion, Machine};
use super::value::{ObjId, Value};

/// Signature of built-in functions: machine, `this`, arguments.
pub type NativeFn = fn(&mut Machine, Value, Vec<Value>) -> Completion<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub enum Slot {
    Data(Value),
    Accessor {
        get: Option<ObjId>,
        set: Option<ObjId>,
    },
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: ScopeId,
    /// Lexical `this` captured by arrow functions.
    pub this: Option<Value>,
    /// Object whose prototype `super.x` resolves against.
    pub home: Option<ObjId>,
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub def: Rc<ClassDef>,
    pub scope: ScopeId,
    pub parent: Option<ObjId>,
}

#[derive(Debug, Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
    /// Whether `new` may be applied.
    pub constructor: bool,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Closure(Closure),
    Native(Native),
    Class(ClassData),
}

impl ObjectKind {
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ObjectKind::Closure(_) | ObjectKind::Native(_) | ObjectKind::Class(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    pub kind: ObjectKind,
    pub props: Vec<(Rc<str>, Slot)>,
    pub proto: Option<ObjId>,
}

impl HeapObject {
    #[must_use]
    pub fn new(kind: ObjectKind, proto: Option<ObjId>) -> Self {
        Self {
            kind,
            props: Vec::new(),
            proto,
        }
    }

    #[must_use]
    pub fn own(&self, key: &str) -> Option<&Slot> {
        self.props.iter().find(|(k, _)| &**k == key).map(|(_, slot)| slot)
    }

    /// Creates or overwrites an own data property, keeping insertion order.
    pub fn define(&mut self, key: &str, value: Value) {
        self.define_slot(key, Slot::Data(value));
    }

    pub fn define_slot(&mut self, key: &str, slot: Slot) {
        match self.props.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, existing)) => *existing = slot,
            None => self.props.push((key.into(), slot)),
        }
    }

    /// Own enumerable keys in `Object.keys` order.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = match &self.kind {
            ObjectKind::Array(items) => (0..items.len()).map(|i| i.to_string().into()).collect(),
            _ => Vec::new(),
        };
        keys.extend(
            self.props
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Data(_)))
                .map(|(k, _)| k.clone()),
        );
        keys
    }
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    pub fn alloc(&mut self, object: HeapObject) -> ObjId {
        self.objects.push(object);
        ObjId(self.objects.len() - 1)
    }

    #[must_use]
    pub fn get(&self, id: ObjId) -> &HeapObject {
        &self.objects[id.0]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut HeapObject {
        &mut self.objects[id.0]
    }

    /// Whether `proto` appears on the prototype chain of `id`.
    #[must_use]
    pub fn inherits(&self, id: ObjId, proto: ObjId) -> bool {
        let mut current = self.get(id).proto;
        while let Some(candidate) = current {
            if candidate == proto {
                return true;
            }
            current = self.get(candidate).proto;
        }
        false
    }
}

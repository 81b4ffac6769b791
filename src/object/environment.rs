use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::Object;

struct Inner {
    store: HashMap<String, Object>,
    outer: Option<Environment>,
}

/// A name-to-value mapping with a parent pointer, used only by the
/// tree-walking evaluator. Lookups walk outward through enclosing scopes;
/// `let` always defines in the current (innermost) frame, matching the
/// teacher's `Scope::set` — this language has no reassignment, so there is
/// no analogue of the teacher's `Scope::update`.
///
/// Cloning an `Environment` is cheap and shares the same underlying store,
/// which is what lets a closure capture "the environment at creation time"
/// without copying it.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Inner>>);

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Environment")
    }
}

impl Environment {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Inner {
            store: HashMap::new(),
            outer: None,
        })))
    }

    pub fn enclosed(outer: &Environment) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            store: HashMap::new(),
            outer: Some(outer.clone()),
        })))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        let inner = self.0.borrow();
        if let Some(value) = inner.store.get(name) {
            return Some(value.clone());
        }
        inner.outer.as_ref()?.get(name)
    }

    pub fn set(&self, name: &str, value: Object) {
        self.0.borrow_mut().store.insert(name.to_owned(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

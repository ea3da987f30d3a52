//! Lexical environments for variable binding.
//!
//! Function activations that create an environment expose their register
//! bound variables through it: the record keeps the activation's register
//! file and the template's varmap, so closures and slow path lookups see
//! the same storage the bytecode uses directly.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::object::has_property;
use super::value::{ObjectRef, Value};
use crate::compiler::FunctionTemplate;

/// Shared handle to an environment.
pub type EnvRef = Rc<Environment>;

/// A register file shared between an activation and its environment.
pub type Registers = Rc<RefCell<Vec<Value>>>;

/// A variable binding in a declarative record.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The value
    pub value: Value,
    /// Whether assignment may change it
    pub mutable: bool,
    /// Whether `delete` may remove it
    pub deletable: bool,
}

/// The two kinds of environment record.
pub enum EnvRecord {
    /// Bindings held by the environment itself, plus optionally the
    /// registers of a function activation.
    Declarative {
        /// Named bindings
        bindings: RefCell<FxHashMap<String, Binding>>,
        /// Register file and the template naming its slots
        registers: Option<(Registers, Arc<FunctionTemplate>)>,
    },
    /// Bindings are the properties of an object (global code, `with`).
    Object {
        /// The binding object
        target: ObjectRef,
        /// Calls through this record pass `target` as `this` (`with`)
        provide_this: bool,
    },
}

/// A lexical environment.
pub struct Environment {
    /// The record
    pub record: EnvRecord,
    /// The outer (parent) environment
    pub outer: Option<EnvRef>,
}

/// Where an identifier resolved to.
pub enum Resolved {
    /// Register of a live or finished activation
    Register(Registers, usize),
    /// Named binding in a declarative record
    Binding(EnvRef),
    /// Property of a binding object
    Property {
        /// The binding object
        target: ObjectRef,
        /// Whether calls pass `target` as `this`
        provide_this: bool,
    },
    /// Not found anywhere
    Unresolvable,
}

impl Environment {
    /// Creates an empty declarative environment.
    pub fn declarative(outer: Option<EnvRef>) -> EnvRef {
        Rc::new(Self {
            record: EnvRecord::Declarative {
                bindings: RefCell::new(FxHashMap::default()),
                registers: None,
            },
            outer,
        })
    }

    /// Creates the environment of a function activation.
    pub fn activation(registers: Registers, template: Arc<FunctionTemplate>, outer: Option<EnvRef>) -> EnvRef {
        Rc::new(Self {
            record: EnvRecord::Declarative {
                bindings: RefCell::new(FxHashMap::default()),
                registers: Some((registers, template)),
            },
            outer,
        })
    }

    /// Creates an object environment.
    pub fn object(target: ObjectRef, provide_this: bool, outer: Option<EnvRef>) -> EnvRef {
        Rc::new(Self {
            record: EnvRecord::Object { target, provide_this },
            outer,
        })
    }

    /// Adds or replaces a named binding. No-op for object records.
    pub fn declare(&self, name: &str, value: Value, mutable: bool, deletable: bool) {
        if let EnvRecord::Declarative { bindings, .. } = &self.record {
            bindings.borrow_mut().insert(
                name.to_string(),
                Binding {
                    value,
                    mutable,
                    deletable,
                },
            );
        }
    }

    /// Returns true if this record itself binds `name`.
    pub fn has_binding(&self, name: &str) -> bool {
        match &self.record {
            EnvRecord::Declarative { bindings, registers } => {
                bindings.borrow().contains_key(name)
                    || registers
                        .as_ref()
                        .and_then(|(_, t)| t.varmap.as_ref())
                        .is_some_and(|m| m.contains_key(name))
            }
            EnvRecord::Object { target, .. } => has_property(target, name),
        }
    }

    /// Reads a named binding of a declarative record.
    pub fn get_binding(&self, name: &str) -> Option<Value> {
        match &self.record {
            EnvRecord::Declarative { bindings, .. } => bindings.borrow().get(name).map(|b| b.value.clone()),
            EnvRecord::Object { .. } => None,
        }
    }

    /// Writes a named binding. Returns false if the binding is immutable.
    pub fn set_binding(&self, name: &str, value: Value) -> bool {
        let EnvRecord::Declarative { bindings, .. } = &self.record else {
            return false;
        };
        let mut bindings = bindings.borrow_mut();
        match bindings.get_mut(name) {
            Some(binding) if binding.mutable => {
                binding.value = value;
                true
            }
            _ => false,
        }
    }

    /// Removes a deletable named binding.
    pub fn delete_binding(&self, name: &str) -> bool {
        let EnvRecord::Declarative { bindings, .. } = &self.record else {
            return false;
        };
        let mut bindings = bindings.borrow_mut();
        match bindings.get(name) {
            Some(binding) if binding.deletable => {
                bindings.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Resolves `name` starting at `env` (E5 Section 10.2.2.1).
    pub fn resolve(env: &EnvRef, name: &str) -> Resolved {
        let mut current = Some(env.clone());
        while let Some(env) = current {
            match &env.record {
                EnvRecord::Declarative { bindings, registers } => {
                    if bindings.borrow().contains_key(name) {
                        return Resolved::Binding(env.clone());
                    }
                    if let Some((regs, template)) = registers {
                        if let Some(reg) = template.varmap.as_ref().and_then(|m| m.get(name)) {
                            return Resolved::Register(regs.clone(), *reg as usize);
                        }
                    }
                }
                EnvRecord::Object { target, provide_this } => {
                    if has_property(target, name) {
                        return Resolved::Property {
                            target: target.clone(),
                            provide_this: *provide_this,
                        };
                    }
                }
            }
            current = env.outer.clone();
        }
        Resolved::Unresolvable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::JsObject;

    #[test]
    fn test_declarative_bindings() {
        let env = Environment::declarative(None);
        env.declare("x", Value::Number(1.0), true, false);
        assert!(env.has_binding("x"));
        assert!(env.set_binding("x", Value::Number(2.0)));
        assert!(matches!(env.get_binding("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(!env.delete_binding("x"));
    }

    #[test]
    fn test_immutable_binding() {
        let env = Environment::declarative(None);
        env.declare("f", Value::Null, false, false);
        assert!(!env.set_binding("f", Value::Undefined));
        assert!(matches!(env.get_binding("f"), Some(Value::Null)));
    }

    #[test]
    fn test_resolve_walks_outward() {
        let global = Rc::new(RefCell::new(JsObject::new(None)));
        global.borrow_mut().set_own("g", Value::Boolean(true));
        let outer = Environment::object(global, false, None);
        let inner = Environment::declarative(Some(outer));
        inner.declare("x", Value::Null, true, true);

        assert!(matches!(Environment::resolve(&inner, "x"), Resolved::Binding(_)));
        assert!(matches!(
            Environment::resolve(&inner, "g"),
            Resolved::Property { provide_this: false, .. }
        ));
        assert!(matches!(Environment::resolve(&inner, "nope"), Resolved::Unresolvable));
    }
}

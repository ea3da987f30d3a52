//! JavaScript object representation.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::environment::EnvRef;
use super::value::{ObjectRef, Value};
use crate::compiler::FunctionTemplate;
use crate::error::Result;
use crate::vm::Interpreter;

/// A host function: `(interpreter, this, args) -> result`.
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Result<Value>;

/// A closure: a template instantiated over a scope.
#[derive(Clone)]
pub struct Closure {
    /// The compiled function
    pub template: Arc<FunctionTemplate>,
    /// Environment the function was created in
    pub scope: EnvRef,
}

/// A host function object.
#[derive(Clone)]
pub struct NativeFunction {
    /// Function name
    pub name: &'static str,
    /// Implementation
    pub func: NativeFn,
}

/// State of a `for-in` enumeration.
#[derive(Clone, Default)]
pub struct Enumerator {
    /// Object being enumerated; keys deleted meanwhile are skipped
    pub target: Option<ObjectRef>,
    /// Snapshot of the enumerable keys
    pub keys: Vec<String>,
    /// Index of the next key
    pub next: usize,
}

/// Internal class of an object.
#[derive(Clone)]
pub enum ObjectClass {
    /// Ordinary object
    Object,
    /// Array with a maintained `length`
    Array,
    /// Compiled function
    Function(Closure),
    /// Host function
    Native(NativeFunction),
    /// `arguments` object
    Arguments,
    /// Regular expression literal (not executable here)
    RegExp,
    /// Error object created for a runtime error
    Error,
    /// Internal `for-in` enumerator
    Enumerator(Enumerator),
}

impl ObjectClass {
    /// Class name, as in `[[Class]]`.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Object => "Object",
            ObjectClass::Array => "Array",
            ObjectClass::Function(_) | ObjectClass::Native(_) => "Function",
            ObjectClass::Arguments => "Arguments",
            ObjectClass::RegExp => "RegExp",
            ObjectClass::Error => "Error",
            ObjectClass::Enumerator(_) => "Enumerator",
        }
    }
}

/// What a property holds.
#[derive(Clone, Debug)]
pub enum PropertyKind {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// Whether assignment may change it
        writable: bool,
    },
    /// Accessor property; either half may be missing
    Accessor {
        /// Getter function
        get: Option<Value>,
        /// Setter function
        set: Option<Value>,
    },
}

/// A property descriptor.
#[derive(Clone, Debug)]
pub struct Property {
    /// Data or accessor
    pub kind: PropertyKind,
    /// Whether the property shows up in `for-in`
    pub enumerable: bool,
    /// Whether the property can be deleted
    pub configurable: bool,
}

impl Property {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self::data_with_flags(value, true, true, true)
    }

    /// A data property with explicit attributes.
    pub fn data_with_flags(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            kind: PropertyKind::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    /// A non-enumerable data property.
    pub fn hidden(value: Value) -> Self {
        Self::data_with_flags(value, true, false, true)
    }
}

/// A JavaScript object.
#[derive(Clone)]
pub struct JsObject {
    /// Internal class
    pub class: ObjectClass,
    /// The prototype of this object
    pub prototype: Option<ObjectRef>,
    /// Whether new properties may be added
    pub extensible: bool,
    properties: FxHashMap<String, Property>,
    /// Property names in insertion order
    order: Vec<String>,
}

impl JsObject {
    /// Creates a new ordinary object.
    pub fn new(prototype: Option<ObjectRef>) -> Self {
        Self::with_class(ObjectClass::Object, prototype)
    }

    /// Creates an empty array.
    pub fn array(prototype: Option<ObjectRef>) -> Self {
        let mut obj = Self::with_class(ObjectClass::Array, prototype);
        obj.define("length", Property::data_with_flags(Value::Number(0.0), true, false, false));
        obj
    }

    /// Creates an object of a given class.
    pub fn with_class(class: ObjectClass, prototype: Option<ObjectRef>) -> Self {
        Self {
            class,
            prototype,
            extensible: true,
            properties: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Returns true for functions.
    pub fn is_callable(&self) -> bool {
        matches!(self.class, ObjectClass::Function(_) | ObjectClass::Native(_))
    }

    /// Returns true for arrays.
    pub fn is_array(&self) -> bool {
        matches!(self.class, ObjectClass::Array)
    }

    /// Returns an own property descriptor.
    pub fn get_own_property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Returns the value of an own data property.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        match &self.properties.get(key)?.kind {
            PropertyKind::Data { value, .. } => Some(value.clone()),
            PropertyKind::Accessor { .. } => None,
        }
    }

    /// Returns true if the object has an own property `key`.
    pub fn has_own(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Stores an own data value, keeping the attributes of an existing data
    /// property. Does not maintain array `length`.
    pub fn set_own(&mut self, key: &str, value: Value) {
        if let Some(Property {
            kind: PropertyKind::Data { value: slot, .. },
            ..
        }) = self.properties.get_mut(key)
        {
            *slot = value;
            return;
        }
        self.define(key, Property::data(value));
    }

    /// Defines or replaces an own property.
    pub fn define(&mut self, key: &str, property: Property) {
        if self.properties.insert(key.to_string(), property).is_none() {
            self.order.push(key.to_string());
        }
    }

    /// Removes an own property regardless of its attributes.
    pub fn remove_own(&mut self, key: &str) -> Option<Property> {
        let removed = self.properties.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    /// Own property names in insertion order.
    pub fn own_keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("class", &self.class.name())
            .field("keys", &self.order)
            .finish()
    }
}

/// Returns true if `obj` or an object on its prototype chain has `key`.
pub fn has_property(obj: &ObjectRef, key: &str) -> bool {
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        let o = o.borrow();
        if o.has_own(key) {
            return true;
        }
        current = o.prototype.clone();
    }
    false
}

/// Parses a canonical array index (`"0"`, `"17"`, not `"017"`).
pub fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|&i| i != u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_set_get() {
        let mut obj = JsObject::new(None);
        obj.set_own("x", Value::Number(42.0));
        assert!(matches!(obj.get_own("x"), Some(Value::Number(n)) if n == 42.0));
        assert!(obj.get_own("y").is_none());
    }

    #[test]
    fn test_object_keys_keep_insertion_order() {
        let mut obj = JsObject::new(None);
        obj.set_own("b", Value::Null);
        obj.set_own("a", Value::Null);
        obj.set_own("b", Value::Undefined);
        let keys: Vec<_> = obj.own_keys().cloned().collect();
        assert_eq!(keys, ["b", "a"]);

        obj.remove_own("b");
        let keys: Vec<_> = obj.own_keys().cloned().collect();
        assert_eq!(keys, ["a"]);
    }

    #[test]
    fn test_set_own_keeps_attributes() {
        let mut obj = JsObject::new(None);
        obj.define("k", Property::hidden(Value::Null));
        obj.set_own("k", Value::Boolean(true));
        let prop = obj.get_own_property("k").unwrap();
        assert!(!prop.enumerable);
    }

    #[test]
    fn test_array_has_length() {
        let arr = JsObject::array(None);
        assert!(arr.is_array());
        assert!(matches!(arr.get_own("length"), Some(Value::Number(n)) if n == 0.0));
        assert!(!arr.get_own_property("length").unwrap().enumerable);
    }

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("042"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("4294967295"), None);
        assert_eq!(array_index("length"), None);
    }
}

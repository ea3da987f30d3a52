//! The realm: intrinsic prototypes, the global object and its environment.

use std::cell::RefCell;
use std::rc::Rc;

use super::environment::{EnvRef, Environment};
use super::object::{JsObject, NativeFn, NativeFunction, ObjectClass, Property};
use super::value::{ObjectRef, Value};

/// Intrinsics shared by everything running in one interpreter.
pub struct Realm {
    /// `Object.prototype`
    pub object_prototype: ObjectRef,
    /// `Function.prototype`
    pub function_prototype: ObjectRef,
    /// `Array.prototype`
    pub array_prototype: ObjectRef,
    /// `Error.prototype`
    pub error_prototype: ObjectRef,
    /// `RegExp.prototype`
    pub regexp_prototype: ObjectRef,
    /// The global object
    pub global_object: ObjectRef,
    /// Object environment over the global object
    pub global_env: EnvRef,
}

fn new_ref(obj: JsObject) -> ObjectRef {
    Rc::new(RefCell::new(obj))
}

impl Realm {
    /// Creates the intrinsics and a global object holding `undefined`,
    /// `NaN` and `Infinity`.
    pub fn new() -> Self {
        let object_prototype = new_ref(JsObject::new(None));
        let proto = || Some(object_prototype.clone());
        let function_prototype = new_ref(JsObject::new(proto()));
        let array_prototype = new_ref(JsObject::new(proto()));
        let error_prototype = new_ref(JsObject::new(proto()));
        let regexp_prototype = new_ref(JsObject::new(proto()));
        let global_object = new_ref(JsObject::new(proto()));

        {
            let mut error_proto = error_prototype.borrow_mut();
            error_proto.define("name", Property::hidden(Value::from("Error")));
            error_proto.define("message", Property::hidden(Value::from("")));
        }
        {
            let mut global = global_object.borrow_mut();
            for (name, value) in [
                ("undefined", Value::Undefined),
                ("NaN", Value::Number(f64::NAN)),
                ("Infinity", Value::Number(f64::INFINITY)),
            ] {
                global.define(name, Property::data_with_flags(value, false, false, false));
            }
        }

        let global_env = Environment::object(global_object.clone(), false, None);
        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            regexp_prototype,
            global_object,
            global_env,
        }
    }

    /// A new ordinary object inheriting from `Object.prototype`.
    pub fn new_object(&self) -> Value {
        Value::object(JsObject::new(Some(self.object_prototype.clone())))
    }

    /// A new empty array.
    pub fn new_array(&self) -> Value {
        Value::object(JsObject::array(Some(self.array_prototype.clone())))
    }

    /// A new error object, e.g. `TypeError: message`.
    pub fn new_error(&self, name: &str, message: &str) -> Value {
        let mut obj = JsObject::with_class(ObjectClass::Error, Some(self.error_prototype.clone()));
        obj.define("name", Property::hidden(Value::from(name)));
        obj.define("message", Property::hidden(Value::from(message)));
        Value::object(obj)
    }

    /// Installs a host function as a global.
    pub fn register_native(&self, name: &'static str, func: NativeFn) {
        let native = JsObject::with_class(
            ObjectClass::Native(NativeFunction { name, func }),
            Some(self.function_prototype.clone()),
        );
        self.global_object
            .borrow_mut()
            .define(name, Property::hidden(Value::object(native)));
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_globals() {
        let realm = Realm::new();
        let global = realm.global_object.borrow();
        assert!(global.get_own("undefined").is_some_and(|v| v.is_undefined()));
        assert!(!global.get_own_property("NaN").unwrap().configurable);
    }

    #[test]
    fn test_new_error_display() {
        let realm = Realm::new();
        let err = realm.new_error("TypeError", "not a function");
        assert_eq!(err.to_js_string(), "TypeError: not a function");
    }
}

//! Property access, object conversion and `for-in` enumeration.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use super::interpreter::{Completion, Interpreter};
use crate::error::Error;
use crate::runtime::object::{
    Enumerator, JsObject, ObjectClass, Property, PropertyKind, array_index, has_property,
};
use crate::runtime::value::ObjectRef;
use crate::runtime::Value;

/// Raises the `length` of an array past a newly written index.
fn bump_array_length(obj: &mut JsObject, key: &str) {
    if !obj.is_array() {
        return;
    }
    if let Some(index) = array_index(key) {
        let len = obj.get_own("length").map(|v| v.to_uint32()).unwrap_or(0);
        if index >= len {
            obj.set_own("length", Value::Number(index as f64 + 1.0));
        }
    }
}

fn reject(strict: bool, message: String) -> Completion<()> {
    if strict {
        Err(Error::TypeError(message).into())
    } else {
        Ok(())
    }
}

/// Where an assignment to a missing own property ends up.
enum Inherited {
    Absent,
    Setter(Option<Value>),
    ReadOnly,
}

fn find_inherited(obj: &JsObject, key: &str) -> Inherited {
    let mut current = obj.prototype.clone();
    while let Some(proto) = current {
        let proto = proto.borrow();
        if let Some(prop) = proto.get_own_property(key) {
            return match &prop.kind {
                PropertyKind::Accessor { set, .. } => Inherited::Setter(set.clone()),
                PropertyKind::Data { writable: false, .. } => Inherited::ReadOnly,
                PropertyKind::Data { .. } => Inherited::Absent,
            };
        }
        current = proto.prototype.clone();
    }
    Inherited::Absent
}

impl Interpreter {
    /// `GETPROP`: `base[key]`.
    pub(super) fn get_property(&mut self, base: &Value, key: &Value) -> Completion<Value> {
        self.get_named(base, &key.to_js_string())
    }

    /// `[[Get]]` with primitive bases.
    pub(super) fn get_named(&mut self, base: &Value, key: &str) -> Completion<Value> {
        match base {
            Value::Undefined | Value::Null => Err(Error::TypeError(format!(
                "cannot read property '{}' of {}",
                key,
                base.to_js_string()
            ))
            .into()),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(unit) = s.encode_utf16().nth(index as usize) {
                        return Ok(Value::String(String::from_utf16_lossy(&[unit])));
                    }
                }
                let proto = self.realm().object_prototype.clone();
                self.lookup(&proto, base, key)
            }
            Value::Object(obj) => self.lookup(obj, base, key),
            Value::Boolean(_) | Value::Number(_) => {
                let proto = self.realm().object_prototype.clone();
                self.lookup(&proto, base, key)
            }
        }
    }

    /// Walks the prototype chain from `obj`, calling getters on `receiver`.
    fn lookup(&mut self, obj: &ObjectRef, receiver: &Value, key: &str) -> Completion<Value> {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            let found = o.borrow().get_own_property(key).map(|p| p.kind.clone());
            match found {
                Some(PropertyKind::Data { value, .. }) => return Ok(value),
                Some(PropertyKind::Accessor { get: Some(getter), .. }) => {
                    return self.call_value(&getter, receiver.clone(), Vec::new());
                }
                Some(PropertyKind::Accessor { get: None, .. }) => return Ok(Value::Undefined),
                None => current = o.borrow().prototype.clone(),
            }
        }
        Ok(Value::Undefined)
    }

    /// `PUTPROP`: `base[key] = value`.
    pub(super) fn put_property(&mut self, base: &Value, key: &Value, value: Value, strict: bool) -> Completion<()> {
        self.put_named(base, &key.to_js_string(), value, strict)
    }

    /// `[[Put]]`. Failed assignments throw only in strict code.
    pub(super) fn put_named(&mut self, base: &Value, key: &str, value: Value, strict: bool) -> Completion<()> {
        let obj = match base {
            Value::Undefined | Value::Null => {
                return Err(Error::TypeError(format!(
                    "cannot set property '{}' of {}",
                    key,
                    base.to_js_string()
                ))
                .into());
            }
            Value::Object(obj) => obj.clone(),
            _ => return reject(strict, format!("cannot create property '{}' on {}", key, base.type_of())),
        };

        if key == "length" && obj.borrow().is_array() {
            return self.set_array_length(base, &value);
        }

        let own = obj.borrow().get_own_property(key).map(|p| p.kind.clone());
        let setter = match own {
            Some(PropertyKind::Data { writable: true, .. }) => {
                obj.borrow_mut().set_own(key, value);
                return Ok(());
            }
            Some(PropertyKind::Data { writable: false, .. }) => {
                return reject(strict, format!("cannot assign to read-only property '{}'", key));
            }
            Some(PropertyKind::Accessor { set, .. }) => set,
            None => {
                let inherited = find_inherited(&obj.borrow(), key);
                match inherited {
                    Inherited::Setter(set) => set,
                    Inherited::ReadOnly => {
                        return reject(strict, format!("cannot assign to read-only property '{}'", key));
                    }
                    Inherited::Absent => {
                        let mut o = obj.borrow_mut();
                        if !o.extensible {
                            drop(o);
                            return reject(strict, format!("cannot add property '{}'", key));
                        }
                        o.define(key, Property::data(value));
                        bump_array_length(&mut o, key);
                        return Ok(());
                    }
                }
            }
        };

        match setter {
            Some(setter) => {
                self.call_value(&setter, base.clone(), vec![value])?;
                Ok(())
            }
            None => reject(strict, format!("property '{}' has only a getter", key)),
        }
    }

    /// Sets the `length` of an array, deleting elements past the end.
    pub(super) fn set_array_length(&mut self, array: &Value, length: &Value) -> Completion<()> {
        let new_len = length.to_uint32();
        if new_len as f64 != length.to_number() {
            return Err(Error::RangeError("invalid array length".into()).into());
        }
        let Some(obj) = array.as_object() else {
            return Ok(());
        };
        let mut obj = obj.borrow_mut();
        let old_len = obj.get_own("length").map(|v| v.to_uint32()).unwrap_or(0);
        if new_len < old_len {
            let doomed: Vec<String> = obj
                .own_keys()
                .filter(|k| array_index(k).is_some_and(|i| i >= new_len))
                .cloned()
                .collect();
            for key in doomed {
                obj.remove_own(&key);
            }
        }
        obj.set_own("length", Value::Number(new_len as f64));
        Ok(())
    }

    /// Defines a literal property (`MPUTOBJ`, `MPUTARR`).
    pub(super) fn init_property(&mut self, obj: &Value, key: &str, value: Value) {
        if let Some(obj) = obj.as_object() {
            let mut obj = obj.borrow_mut();
            obj.define(key, Property::data(value));
            bump_array_length(&mut obj, key);
        }
    }

    /// `INITGET` / `INITSET`. A getter and setter for the same name share
    /// one accessor property.
    pub(super) fn init_accessor(&mut self, obj: &Value, key: &str, func: Value, is_getter: bool) {
        let Some(obj) = obj.as_object() else {
            return;
        };
        let mut obj = obj.borrow_mut();
        let (mut get, mut set) = match obj.get_own_property(key).map(|p| &p.kind) {
            Some(PropertyKind::Accessor { get, set }) => (get.clone(), set.clone()),
            _ => (None, None),
        };
        if is_getter {
            get = Some(func);
        } else {
            set = Some(func);
        }
        obj.define(
            key,
            Property {
                kind: PropertyKind::Accessor { get, set },
                enumerable: true,
                configurable: true,
            },
        );
    }

    /// `DELPROP`.
    pub(super) fn delete_property(&mut self, base: &Value, key: &Value, strict: bool) -> Completion<bool> {
        self.delete_named(base, &key.to_js_string(), strict)
    }

    /// `[[Delete]]`.
    pub(super) fn delete_named(&mut self, base: &Value, key: &str, strict: bool) -> Completion<bool> {
        let obj = match base {
            Value::Undefined | Value::Null => {
                return Err(Error::TypeError(format!("cannot delete property '{}' of {}", key, base.to_js_string())).into());
            }
            Value::String(s) => {
                let fixed = key == "length" || array_index(key).is_some_and(|i| (i as usize) < s.encode_utf16().count());
                if fixed {
                    reject(strict, format!("cannot delete property '{}'", key))?;
                }
                return Ok(!fixed);
            }
            Value::Object(obj) => obj,
            _ => return Ok(true),
        };

        let mut obj = obj.borrow_mut();
        match obj.get_own_property(key).map(|p| p.configurable) {
            None => Ok(true),
            Some(true) => {
                obj.remove_own(key);
                Ok(true)
            }
            Some(false) => {
                drop(obj);
                reject(strict, format!("cannot delete property '{}'", key))?;
                Ok(false)
            }
        }
    }

    /// The `in` operator.
    pub(super) fn has_property_op(&mut self, key: &Value, target: &Value) -> Completion<bool> {
        let Value::Object(obj) = target else {
            return Err(Error::TypeError("invalid 'in' operand".into()).into());
        };
        Ok(has_property(obj, &key.to_js_string()))
    }

    /// The `instanceof` operator.
    pub(super) fn instance_of(&mut self, value: &Value, constructor: &Value) -> Completion<bool> {
        if !constructor.is_callable() {
            return Err(Error::TypeError("invalid 'instanceof' operand".into()).into());
        }
        let Value::Object(obj) = value else {
            return Ok(false);
        };
        let Value::Object(proto) = self.get_named(constructor, "prototype")? else {
            return Err(Error::TypeError("function has non-object prototype".into()).into());
        };

        let mut current = obj.borrow().prototype.clone();
        while let Some(o) = current {
            if Rc::ptr_eq(&o, &proto) {
                return Ok(true);
            }
            current = o.borrow().prototype.clone();
        }
        Ok(false)
    }

    /// ToObject (E5 Section 9.9).
    pub(super) fn to_object(&mut self, value: &Value) -> Completion<ObjectRef> {
        let proto = Some(self.realm().object_prototype.clone());
        let wrapper = match value {
            Value::Object(obj) => return Ok(obj.clone()),
            Value::Undefined | Value::Null => {
                return Err(Error::TypeError(format!("cannot convert {} to object", value.to_js_string())).into());
            }
            Value::String(s) => {
                let mut obj = JsObject::new(proto);
                let units: Vec<u16> = s.encode_utf16().collect();
                for (i, unit) in units.iter().enumerate() {
                    obj.define(
                        &i.to_string(),
                        Property::data_with_flags(Value::String(String::from_utf16_lossy(&[*unit])), false, true, false),
                    );
                }
                obj.define(
                    "length",
                    Property::data_with_flags(Value::Number(units.len() as f64), false, false, false),
                );
                obj
            }
            Value::Boolean(_) | Value::Number(_) => JsObject::new(proto),
        };
        Ok(Rc::new(RefCell::new(wrapper)))
    }

    /// `INITENUM`: snapshots the enumerable keys of `target` and its
    /// prototypes. Null and undefined enumerate nothing.
    pub(super) fn create_enumerator(&mut self, target: &Value) -> Value {
        let mut enumerator = Enumerator::default();
        match target {
            Value::Object(obj) => {
                let mut seen = FxHashSet::default();
                let mut current = Some(obj.clone());
                while let Some(o) = current {
                    let o = o.borrow();
                    for key in o.own_keys() {
                        if !seen.insert(key.clone()) {
                            continue;
                        }
                        if o.get_own_property(key).is_some_and(|p| p.enumerable) {
                            enumerator.keys.push(key.clone());
                        }
                    }
                    current = o.prototype.clone();
                }
                enumerator.target = Some(obj.clone());
            }
            Value::String(s) => {
                enumerator.keys = (0..s.encode_utf16().count()).map(|i| i.to_string()).collect();
            }
            _ => {}
        }
        Value::object(JsObject::with_class(ObjectClass::Enumerator(enumerator), None))
    }

    /// `NEXTENUM`: the next key still present on the target.
    pub(super) fn next_enum_key(&mut self, enumerator: &Value) -> Option<String> {
        let obj = enumerator.as_object()?;
        let mut obj = obj.borrow_mut();
        let ObjectClass::Enumerator(state) = &mut obj.class else {
            return None;
        };
        while let Some(key) = state.keys.get(state.next).cloned() {
            state.next += 1;
            if state.target.as_ref().is_some_and(|t| !has_property(t, &key)) {
                continue;
            }
            return Some(key);
        }
        None
    }

    /// A regular expression object for a literal. Matching is not
    /// supported; the object carries its source and flags.
    pub(super) fn new_regexp(&mut self, source: &str, flags: &str) -> Value {
        let mut obj = JsObject::with_class(ObjectClass::RegExp, Some(self.realm().regexp_prototype.clone()));
        let fixed = |v: Value| Property::data_with_flags(v, false, false, false);
        obj.define("source", fixed(Value::from(source)));
        obj.define("global", fixed(Value::Boolean(flags.contains('g'))));
        obj.define("ignoreCase", fixed(Value::Boolean(flags.contains('i'))));
        obj.define("multiline", fixed(Value::Boolean(flags.contains('m'))));
        obj.define("lastIndex", Property::data_with_flags(Value::Number(0.0), true, false, false));
        Value::object(obj)
    }
}

//! Identifier access through the scope chain.

use super::interpreter::{Completion, Interpreter};
use crate::compiler::bytecode::{
    DECLVAR_FLAG_FUNC_DECL, DECLVAR_FLAG_UNDEF_VALUE, PROPDESC_FLAG_CONFIGURABLE, PROPDESC_FLAG_ENUMERABLE,
    PROPDESC_FLAG_WRITABLE,
};
use crate::error::Error;
use crate::runtime::environment::{EnvRecord, Environment, Resolved};
use crate::runtime::object::Property;
use crate::runtime::{CallFrame, Value};

fn not_defined(name: &str) -> Error {
    Error::ReferenceError(format!("{} is not defined", name))
}

impl Interpreter {
    /// `GETVAR`.
    pub(super) fn get_var(&mut self, frame: &CallFrame, name: &str) -> Completion<Value> {
        Ok(self.get_var_with_this(frame, name)?.0)
    }

    /// `CSVAR`: the value plus the implicit `this` of a call through it.
    pub(super) fn get_var_with_this(&mut self, frame: &CallFrame, name: &str) -> Completion<(Value, Value)> {
        match Environment::resolve(&frame.env, name) {
            Resolved::Register(regs, reg) => {
                let value = regs.borrow().get(reg).cloned().unwrap_or_default();
                Ok((value, Value::Undefined))
            }
            Resolved::Binding(env) => Ok((env.get_binding(name).unwrap_or_default(), Value::Undefined)),
            Resolved::Property { target, provide_this } => {
                let base = Value::Object(target);
                let value = self.get_named(&base, name)?;
                let this = if provide_this { base } else { Value::Undefined };
                Ok((value, this))
            }
            Resolved::Unresolvable => Err(not_defined(name).into()),
        }
    }

    /// `PUTVAR`. Non-strict assignment to an undeclared name creates a
    /// global property.
    pub(super) fn put_var(&mut self, frame: &CallFrame, name: &str, value: Value) -> Completion<()> {
        let strict = frame.template.strict;
        match Environment::resolve(&frame.env, name) {
            Resolved::Register(regs, reg) => {
                let mut regs = regs.borrow_mut();
                if reg >= regs.len() {
                    regs.resize(reg + 1, Value::Undefined);
                }
                regs[reg] = value;
            }
            Resolved::Binding(env) => {
                if !env.set_binding(name, value) && strict {
                    return Err(Error::TypeError(format!("assignment to constant '{}'", name)).into());
                }
            }
            Resolved::Property { target, .. } => {
                self.put_named(&Value::Object(target), name, value, strict)?;
            }
            Resolved::Unresolvable if strict => return Err(not_defined(name).into()),
            Resolved::Unresolvable => {
                let global = Value::Object(self.realm().global_object.clone());
                self.put_named(&global, name, value, false)?;
            }
        }
        Ok(())
    }

    /// `DECLVAR` into the variable environment of the frame.
    pub(super) fn declare_var(&mut self, frame: &CallFrame, flags: u32, name: &str, value: Value) {
        let configurable = flags & PROPDESC_FLAG_CONFIGURABLE != 0;
        let undef_only = flags & DECLVAR_FLAG_UNDEF_VALUE != 0;

        match &frame.var_env.record {
            EnvRecord::Object { target, .. } => {
                let mut target = target.borrow_mut();
                let exists = target.has_own(name);
                if undef_only {
                    if !exists {
                        target.define(
                            name,
                            Property::data_with_flags(
                                Value::Undefined,
                                flags & PROPDESC_FLAG_WRITABLE != 0,
                                flags & PROPDESC_FLAG_ENUMERABLE != 0,
                                configurable,
                            ),
                        );
                    }
                } else if exists && flags & DECLVAR_FLAG_FUNC_DECL != 0 {
                    target.set_own(name, value);
                } else {
                    target.define(
                        name,
                        Property::data_with_flags(
                            value,
                            flags & PROPDESC_FLAG_WRITABLE != 0,
                            flags & PROPDESC_FLAG_ENUMERABLE != 0,
                            configurable,
                        ),
                    );
                }
            }
            EnvRecord::Declarative { .. } => {
                if undef_only && frame.var_env.has_binding(name) {
                    return;
                }
                let value = if undef_only { Value::Undefined } else { value };
                frame.var_env.declare(name, value, true, configurable);
            }
        }
    }

    /// `DELVAR`. Register bound variables cannot be deleted.
    pub(super) fn delete_var(&mut self, frame: &CallFrame, name: &str) -> Completion<bool> {
        match Environment::resolve(&frame.env, name) {
            Resolved::Register(..) => Ok(false),
            Resolved::Binding(env) => Ok(env.delete_binding(name)),
            Resolved::Property { target, .. } => self.delete_named(&Value::Object(target), name, false),
            Resolved::Unresolvable => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::CompileOptions;
    use crate::error::Error;
    use crate::vm::Interpreter;

    #[test]
    fn test_undeclared_assignment_creates_global() {
        let mut interp = Interpreter::new();
        interp.eval("function f() { leaked = 7; } f();").unwrap();
        assert!(matches!(interp.global("leaked"), Some(v) if v.to_number() == 7.0));
    }

    #[test]
    fn test_strict_undeclared_assignment_fails() {
        let mut interp = Interpreter::new();
        let options = CompileOptions::new().with_strict(true);
        let result = interp.eval_with("leaked = 7;", &options);
        assert!(matches!(result, Err(Error::ReferenceError(m)) if m == "leaked is not defined"));
    }

    #[test]
    fn test_var_declarations_are_global_properties() {
        let mut interp = Interpreter::new();
        interp.eval("var a = 1; function g() { return 2; }").unwrap();
        assert!(interp.global("a").is_some());
        assert!(interp.global("g").is_some_and(|g| g.is_callable()));
        // Redeclaring without an initialiser keeps the value.
        let result = interp.eval("var a; a;").unwrap();
        assert_eq!(result.to_number(), 1.0);
    }

    #[test]
    fn test_delete_identifiers() {
        let mut interp = Interpreter::new();
        let result = interp.eval("var kept = 1; implicit = 2; [delete kept, delete implicit, delete nothing];");
        assert_eq!(result.unwrap().to_js_string(), "false,true,true");
        assert!(interp.global("implicit").is_none());
    }

    #[test]
    fn test_closure_sees_register_variables() {
        let mut interp = Interpreter::new();
        let result = interp
            .eval("function f() { var x = 1; var g = function () { return x; }; x = 5; return g(); } f();")
            .unwrap();
        assert_eq!(result.to_number(), 5.0);
    }

    #[test]
    fn test_named_function_expression_binding_is_read_only() {
        let mut interp = Interpreter::new();
        let result = interp
            .eval("var f = function g() { g = 1; return typeof g; }; f();")
            .unwrap();
        assert_eq!(result.to_js_string(), "function");
    }
}

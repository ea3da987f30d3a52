//! The bytecode interpreter.

use std::sync::Arc;

use tracing::{debug, trace};

use super::comparison::{abstract_equals, less_than, strict_equals};
use super::unwind::{self, Resume};
use crate::compiler::bytecode::{
    CALL_FLAG_TAILCALL, RETURN_FLAG_FAST, RETURN_FLAG_HAVE_RETVAL, TRYCATCH_FLAG_CATCH_BINDING,
    TRYCATCH_FLAG_HAVE_CATCH, TRYCATCH_FLAG_HAVE_FINALLY, TRYCATCH_FLAG_WITH_BINDING,
};
use crate::compiler::{CompileOptions, ExtraOp, FunctionTemplate, Instruction, OpCode, compile};
use crate::error::{Error, Result};
use crate::runtime::environment::{EnvRef, Environment, Resolved};
use crate::runtime::object::{Closure, JsObject, NativeFn, ObjectClass, Property};
use crate::runtime::value::ObjectRef;
use crate::runtime::{CallFrame, Catcher, Realm, Value};

/// Default limit on nested calls.
pub const DEFAULT_CALL_DEPTH_LIMIT: u32 = 256;

/// Abrupt completion of an operation.
pub(crate) enum Abrupt {
    /// A JavaScript value was thrown
    Throw(Value),
    /// An error; runtime error kinds become catchable error objects
    Fatal(Error),
}

impl From<Error> for Abrupt {
    fn from(err: Error) -> Self {
        Abrupt::Fatal(err)
    }
}

pub(crate) type Completion<T> = std::result::Result<T, Abrupt>;

/// Outcome of one instruction.
enum Step {
    Next,
    Return(Value),
    TailCall { func: Value, this: Value, args: Vec<Value> },
}

/// A reference interpreter for compiled function templates.
///
/// Executes the full instruction set with a small realm: ordinary
/// objects, arrays, functions, error objects and a global `print`.
pub struct Interpreter {
    realm: Realm,
    call_depth: u32,
    call_depth_limit: u32,
    output: Vec<String>,
    echo: bool,
}

fn native_print(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let line = args.iter().map(Value::to_js_string).collect::<Vec<_>>().join(" ");
    if interp.echo {
        println!("{}", line);
    }
    interp.output.push(line);
    Ok(Value::Undefined)
}

impl Interpreter {
    /// Creates an interpreter with a fresh realm.
    pub fn new() -> Self {
        let realm = Realm::new();
        realm.register_native("print", native_print);
        Self {
            realm,
            call_depth: 0,
            call_depth_limit: DEFAULT_CALL_DEPTH_LIMIT,
            output: Vec::new(),
            echo: false,
        }
    }

    /// Sets the maximum call nesting.
    pub fn with_call_depth_limit(mut self, limit: u32) -> Self {
        self.call_depth_limit = limit;
        self
    }

    /// Also write `print` output to stdout.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Lines written by `print` so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// The realm.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Installs a host function as a global.
    pub fn register_native(&mut self, name: &'static str, func: NativeFn) {
        self.realm.register_native(name, func);
    }

    /// Reads a property of the global object.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.realm.global_object.borrow().get_own(name)
    }

    /// Compiles and runs `source` as global code.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.eval_with(source, &CompileOptions::default())
    }

    /// Compiles `source` with `options` and runs it.
    pub fn eval_with(&mut self, source: &str, options: &CompileOptions) -> Result<Value> {
        let template = compile(source, options)?;
        self.run(&template)
    }

    /// Runs a program or eval template and returns its completion value.
    /// A function template evaluates to a closure over the global scope.
    pub fn run(&mut self, template: &FunctionTemplate) -> Result<Value> {
        let template = Arc::new(template.clone());
        debug!(name = ?template.name, code = template.code.len(), "run template");

        let global_env = self.realm.global_env.clone();
        if template.is_function {
            return Ok(self.instantiate(template, global_env));
        }

        let registers = CallFrame::new_registers(template.nregs as usize);
        let env = if template.newenv {
            Environment::declarative(Some(global_env))
        } else {
            global_env
        };
        let this = Value::Object(self.realm.global_object.clone());
        let frame = CallFrame::new(template, registers, env, this);

        self.call_depth = 0;
        self.execute(frame).map_err(|abrupt| self.uncaught(abrupt))
    }

    /// Calls a function value.
    pub fn call(&mut self, func: &Value, this: Value, args: &[Value]) -> Result<Value> {
        self.call_value(func, this, args.to_vec())
            .map_err(|abrupt| self.uncaught(abrupt))
    }

    fn uncaught(&self, abrupt: Abrupt) -> Error {
        match abrupt {
            Abrupt::Fatal(err) => err,
            Abrupt::Throw(value) => {
                if let Value::Object(obj) = &value {
                    let obj = obj.borrow();
                    if matches!(obj.class, ObjectClass::Error) {
                        let name = obj.get_own("name").map(|v| v.to_js_string()).unwrap_or_default();
                        let message = obj.get_own("message").map(|v| v.to_js_string()).unwrap_or_default();
                        match name.as_str() {
                            "TypeError" => return Error::TypeError(message),
                            "ReferenceError" => return Error::ReferenceError(message),
                            "RangeError" => return Error::RangeError(message),
                            _ => {}
                        }
                    }
                }
                Error::Uncaught(value.to_js_string())
            }
        }
    }

    /// The value a catch clause sees for an abrupt completion, or the
    /// error itself if it cannot be caught.
    fn exception_value(&self, abrupt: Abrupt) -> Completion<Value> {
        match abrupt {
            Abrupt::Throw(value) => Ok(value),
            Abrupt::Fatal(err) => {
                let name = match &err {
                    Error::TypeError(_) => "TypeError",
                    Error::ReferenceError(_) => "ReferenceError",
                    Error::RangeError(_) => "RangeError",
                    _ => return Err(Abrupt::Fatal(err)),
                };
                Ok(self.realm.new_error(name, err.message()))
            }
        }
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Creates a function object for `template` closing over `scope`.
    pub(crate) fn instantiate(&self, template: Arc<FunctionTemplate>, scope: EnvRef) -> Value {
        // A named function expression sees its own name in an extra scope.
        let name_env = template
            .namebinding
            .then(|| Environment::declarative(Some(scope.clone())));
        let closure = Closure {
            template: template.clone(),
            scope: name_env.clone().unwrap_or(scope),
        };
        let func = Value::object(JsObject::with_class(
            ObjectClass::Function(closure),
            Some(self.realm.function_prototype.clone()),
        ));
        if let (Some(env), Some(name)) = (name_env, &template.name) {
            env.declare(name, func.clone(), false, false);
        }

        let prototype = self.realm.new_object();
        if let (Value::Object(proto), Value::Object(obj)) = (&prototype, &func) {
            proto.borrow_mut().define("constructor", Property::hidden(func.clone()));
            let mut obj = obj.borrow_mut();
            obj.define("prototype", Property::data_with_flags(prototype.clone(), true, false, false));
            obj.define(
                "length",
                Property::data_with_flags(Value::Number(template.nargs as f64), false, false, false),
            );
        }
        func
    }

    fn arguments_object(&self, callee: &ObjectRef, args: &[Value], strict: bool) -> Value {
        let mut obj = JsObject::with_class(ObjectClass::Arguments, Some(self.realm.object_prototype.clone()));
        for (i, arg) in args.iter().enumerate() {
            obj.define(&i.to_string(), Property::data(arg.clone()));
        }
        obj.define("length", Property::hidden(Value::Number(args.len() as f64)));
        if !strict {
            obj.define("callee", Property::hidden(Value::Object(callee.clone())));
        }
        Value::object(obj)
    }

    /// Sets up the activation of a compiled function.
    fn prepare_frame(&self, closure: &Closure, callee: &ObjectRef, this: Value, args: Vec<Value>) -> CallFrame {
        let template = closure.template.clone();
        let nregs = (template.nregs as usize).max(template.nargs as usize);
        let registers = CallFrame::new_registers(nregs);
        {
            let mut regs = registers.borrow_mut();
            for (slot, arg) in regs.iter_mut().zip(args.iter().take(template.nargs as usize)) {
                *slot = arg.clone();
            }
        }

        let this = if !template.strict && this.is_nullish() {
            Value::Object(self.realm.global_object.clone())
        } else {
            this
        };

        let env = if template.newenv {
            Environment::activation(registers.clone(), template.clone(), Some(closure.scope.clone()))
        } else {
            closure.scope.clone()
        };
        if template.createargs {
            let arguments = self.arguments_object(callee, &args, template.strict);
            env.declare("arguments", arguments, !template.strict, false);
        }

        trace!(name = ?template.name, nargs = args.len(), "call");
        CallFrame::new(template, registers, env, this)
    }

    fn callee_closure(func: &Value) -> Option<(Closure, ObjectRef)> {
        let obj = func.as_object()?;
        let closure = match &obj.borrow().class {
            ObjectClass::Function(closure) => closure.clone(),
            _ => return None,
        };
        Some((closure, obj.clone()))
    }

    /// `[[Call]]`.
    pub(crate) fn call_value(&mut self, func: &Value, this: Value, args: Vec<Value>) -> Completion<Value> {
        let native = match func.as_object() {
            Some(obj) => match &obj.borrow().class {
                ObjectClass::Native(native) => Some(native.func),
                ObjectClass::Function(_) => None,
                _ => return Err(Error::TypeError("not a function".into()).into()),
            },
            None => return Err(Error::TypeError(format!("{} is not a function", func.type_of())).into()),
        };
        if let Some(native) = native {
            return Ok(native(self, &this, &args)?);
        }
        let Some((closure, callee)) = Self::callee_closure(func) else {
            return Err(Error::TypeError("not a function".into()).into());
        };

        if self.call_depth >= self.call_depth_limit {
            return Err(Error::RangeError("call stack size exceeded".into()).into());
        }
        self.call_depth += 1;
        let frame = self.prepare_frame(&closure, &callee, this, args);
        let result = self.execute(frame);
        self.call_depth -= 1;
        result
    }

    /// `[[Construct]]`.
    fn construct(&mut self, func: &Value, args: Vec<Value>) -> Completion<Value> {
        if !func.is_callable() {
            return Err(Error::TypeError(format!("{} is not a constructor", func.type_of())).into());
        }
        let proto = match self.get_named(func, "prototype")? {
            Value::Object(proto) => proto,
            _ => self.realm.object_prototype.clone(),
        };
        let obj = Value::object(JsObject::new(Some(proto)));
        let result = self.call_value(func, obj.clone(), args)?;
        Ok(if matches!(result, Value::Object(_)) { result } else { obj })
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn execute(&mut self, mut frame: CallFrame) -> Completion<Value> {
        loop {
            let Some(&ins) = frame.template.code.get(frame.pc) else {
                return Err(Error::internal("pc out of range", frame.current_line().unwrap_or(0)).into());
            };
            frame.pc += 1;

            match self.step(&mut frame, ins) {
                Ok(Step::Next) => {}
                Ok(Step::Return(value)) => return Ok(value),
                Ok(Step::TailCall { func, this, args }) => match Self::callee_closure(&func) {
                    Some((closure, callee)) => {
                        trace!(name = ?closure.template.name, "tail call");
                        frame = self.prepare_frame(&closure, &callee, this, args);
                    }
                    None => return self.call_value(&func, this, args),
                },
                Err(abrupt) => {
                    let value = self.exception_value(abrupt)?;
                    if !unwind::handle_throw(&mut frame, value.clone()) {
                        return Err(Abrupt::Throw(value));
                    }
                }
            }
        }
    }

    fn step(&mut self, frame: &mut CallFrame, ins: Instruction) -> Completion<Step> {
        let strict = frame.template.strict;
        match ins.op() {
            OpCode::LdReg => frame.set_reg(ins.a(), frame.reg(ins.bc())),
            OpCode::LdConst => frame.set_reg(ins.a(), frame.constant(ins.bc())),
            OpCode::LdInt => frame.set_reg(ins.a(), Value::Number(ins.ldint_value() as f64)),

            OpCode::GetVar => {
                let name = frame.constant(ins.bc()).to_js_string();
                let value = self.get_var(frame, &name)?;
                frame.set_reg(ins.a(), value);
            }
            OpCode::PutVar => {
                let name = frame.constant(ins.bc()).to_js_string();
                let value = frame.reg(ins.a());
                self.put_var(frame, &name, value)?;
            }
            OpCode::DeclVar => {
                let name = frame.const_name(ins.b());
                let value = frame.reg(ins.c());
                self.declare_var(frame, ins.a(), &name, value);
            }
            OpCode::DelVar => {
                let name = frame.const_name(ins.b());
                let deleted = self.delete_var(frame, &name)?;
                frame.set_reg(ins.a(), Value::Boolean(deleted));
            }

            OpCode::GetProp => {
                let base = frame.regconst(ins.b());
                let key = frame.regconst(ins.c());
                let value = self.get_property(&base, &key)?;
                frame.set_reg(ins.a(), value);
            }
            OpCode::PutProp => {
                let base = frame.reg(ins.a());
                let key = frame.regconst(ins.b());
                let value = frame.regconst(ins.c());
                self.put_property(&base, &key, value, strict)?;
            }
            OpCode::DelProp => {
                let base = frame.reg(ins.b());
                let key = frame.regconst(ins.c());
                let deleted = self.delete_property(&base, &key, strict)?;
                frame.set_reg(ins.a(), Value::Boolean(deleted));
            }

            op @ (OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::BAsl
            | OpCode::BAsr
            | OpCode::BLsr
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Eq
            | OpCode::Neq
            | OpCode::SEq
            | OpCode::SNeq
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::Lt
            | OpCode::Le
            | OpCode::InstOf
            | OpCode::In) => {
                let lhs = frame.regconst(ins.b());
                let rhs = frame.regconst(ins.c());
                let result = self.binary_op(op, &lhs, &rhs)?;
                frame.set_reg(ins.a(), result);
            }

            OpCode::MPutObj => {
                let obj = frame.reg(ins.a());
                for i in 0..ins.c() {
                    let key = frame.reg(ins.b() + 2 * i).to_js_string();
                    let value = frame.reg(ins.b() + 2 * i + 1);
                    self.init_property(&obj, &key, value);
                }
            }
            OpCode::MPutArr => {
                let obj = frame.reg(ins.a());
                let start = frame.reg(ins.b()).to_uint32();
                for i in 0..ins.c() {
                    let value = frame.reg(ins.b() + 1 + i);
                    self.init_property(&obj, &(start + i).to_string(), value);
                }
            }
            op @ (OpCode::InitGet | OpCode::InitSet) => {
                let obj = frame.reg(ins.a());
                let key = frame.reg(ins.b()).to_js_string();
                let func = frame.reg(ins.b() + 1);
                self.init_accessor(&obj, &key, func, op == OpCode::InitGet);
            }
            OpCode::Regexp => {
                let source = frame.regconst(ins.b()).to_js_string();
                let flags = frame.regconst(ins.c()).to_js_string();
                frame.set_reg(ins.a(), self.new_regexp(&source, &flags));
            }
            OpCode::Closure => {
                let Some(template) = frame.template.funcs.get(ins.bc() as usize).cloned() else {
                    return Err(Error::internal("invalid function index", frame.current_line().unwrap_or(0)).into());
                };
                let func = self.instantiate(template, frame.env.clone());
                frame.set_reg(ins.a(), func);
            }

            OpCode::CsReg => {
                let func = frame.reg(ins.b());
                frame.set_reg(ins.a(), func);
                frame.set_reg(ins.a() + 1, Value::Undefined);
            }
            OpCode::CsVar => {
                let name = frame.const_name(ins.b());
                let (func, this) = self.get_var_with_this(frame, &name)?;
                frame.set_reg(ins.a(), func);
                frame.set_reg(ins.a() + 1, this);
            }
            OpCode::CsProp => {
                let base = frame.regconst(ins.b());
                let key = frame.regconst(ins.c());
                let func = self.get_property(&base, &key)?;
                frame.set_reg(ins.a(), func);
                frame.set_reg(ins.a() + 1, base);
            }
            OpCode::Call => {
                let base = ins.b();
                let func = frame.reg(base);
                let this = frame.reg(base + 1);
                let args: Vec<Value> = (0..ins.c()).map(|i| frame.reg(base + 2 + i)).collect();
                // Direct eval calls run as ordinary calls.
                if ins.a() & CALL_FLAG_TAILCALL != 0 {
                    return Ok(Step::TailCall { func, this, args });
                }
                let result = self.call_value(&func, this, args)?;
                frame.set_reg(base, result);
            }
            OpCode::New => {
                let base = ins.b();
                let func = frame.reg(base);
                let args: Vec<Value> = (0..ins.c()).map(|i| frame.reg(base + 1 + i)).collect();
                let result = self.construct(&func, args)?;
                frame.set_reg(base, result);
            }

            OpCode::Jump => {
                let target = ins.jump_target(frame.pc - 1);
                frame.pc = target;
            }
            OpCode::If => {
                if frame.regconst(ins.b()).to_boolean() == (ins.a() != 0) {
                    frame.pc += 1;
                }
            }
            OpCode::Return => {
                let value = if ins.a() & RETURN_FLAG_HAVE_RETVAL != 0 {
                    frame.regconst(ins.b())
                } else {
                    Value::Undefined
                };
                if ins.a() & RETURN_FLAG_FAST != 0 {
                    return Ok(Step::Return(value));
                }
                if let Some(value) = unwind::unwind_return(frame, value) {
                    return Ok(Step::Return(value));
                }
            }
            OpCode::Label => {
                let pc_label = frame.pc - 1;
                unwind::enter_label(frame, ins.abc_field(), pc_label);
                frame.pc += 2;
            }
            OpCode::EndLabel => unwind::end_label(frame, ins.abc_field()),
            OpCode::Break => unwind::unwind_label(frame, ins.abc_field(), false)?,
            OpCode::Continue => unwind::unwind_label(frame, ins.abc_field(), true)?,
            OpCode::TryCatch => self.enter_trycatch(frame, ins)?,
            OpCode::Extra => return self.step_extra(frame, ins),
            OpCode::Invalid => {
                return Err(Error::internal("invalid instruction", frame.current_line().unwrap_or(0)).into());
            }
        }
        Ok(Step::Next)
    }

    fn enter_trycatch(&mut self, frame: &mut CallFrame, ins: Instruction) -> Completion<()> {
        let pc = frame.pc - 1;
        let flags = ins.a();
        let saved_env = frame.env.clone();

        if flags & TRYCATCH_FLAG_WITH_BINDING != 0 {
            let target = self.to_object(&frame.regconst(ins.c()))?;
            frame.env = Environment::object(target, true, Some(saved_env.clone()));
            frame.catchers.push(Catcher::TryCatch {
                pc,
                flags,
                reg: ins.b(),
                catch_enabled: false,
                finally_enabled: false,
                catch_name: None,
                env: saved_env,
            });
        } else {
            let catch_name = (flags & TRYCATCH_FLAG_CATCH_BINDING != 0).then(|| frame.const_name(ins.c()));
            frame.catchers.push(Catcher::TryCatch {
                pc,
                flags,
                reg: ins.b(),
                catch_enabled: flags & TRYCATCH_FLAG_HAVE_CATCH != 0,
                finally_enabled: flags & TRYCATCH_FLAG_HAVE_FINALLY != 0,
                catch_name,
                env: saved_env,
            });
        }
        frame.pc += 2;
        Ok(())
    }

    fn step_extra(&mut self, frame: &mut CallFrame, ins: Instruction) -> Completion<Step> {
        let Some(op) = ins.extra_op() else {
            return Err(Error::internal("invalid extra op", frame.current_line().unwrap_or(0)).into());
        };
        let (b, c) = (ins.b(), ins.c());
        match op {
            ExtraOp::Nop => {}
            ExtraOp::LdThis => frame.set_reg(b, frame.this.clone()),
            ExtraOp::LdUndef => frame.set_reg(b, Value::Undefined),
            ExtraOp::LdNull => frame.set_reg(b, Value::Null),
            ExtraOp::LdBool => frame.set_reg(b, Value::Boolean(c != 0)),
            ExtraOp::NewObj => frame.set_reg(b, self.realm.new_object()),
            ExtraOp::NewArr => frame.set_reg(b, self.realm.new_array()),
            ExtraOp::SetALen => {
                let obj = frame.reg(b);
                let len = frame.reg(c);
                self.set_array_length(&obj, &len)?;
            }
            ExtraOp::TypeOf => {
                let value = frame.regconst(c);
                frame.set_reg(b, Value::from(value.type_of()));
            }
            ExtraOp::TypeOfId => {
                let name = frame.const_name(c);
                let type_name = match Environment::resolve(&frame.env, &name) {
                    Resolved::Unresolvable => "undefined",
                    _ => self.get_var(frame, &name)?.type_of(),
                };
                frame.set_reg(b, Value::from(type_name));
            }
            ExtraOp::InitEnum => {
                let target = frame.reg(c);
                frame.set_reg(b, self.create_enumerator(&target));
            }
            ExtraOp::NextEnum => {
                if let Some(key) = self.next_enum_key(&frame.reg(c)) {
                    frame.set_reg(b, Value::String(key));
                    frame.pc += 1;
                }
            }
            ExtraOp::Throw => return Err(Abrupt::Throw(frame.regconst(b))),
            ExtraOp::InvLhs => return Err(Error::ReferenceError("invalid assignment target".into()).into()),
            ExtraOp::UnM => frame.set_reg(b, Value::Number(-frame.regconst(c).to_number())),
            ExtraOp::UnP | ExtraOp::ToNum => frame.set_reg(b, Value::Number(frame.regconst(c).to_number())),
            ExtraOp::BNot => frame.set_reg(b, Value::Number(!frame.regconst(c).to_int32() as f64)),
            ExtraOp::LNot => frame.set_reg(b, Value::Boolean(!frame.regconst(c).to_boolean())),
            ExtraOp::Inc => frame.set_reg(b, Value::Number(frame.regconst(c).to_number() + 1.0)),
            ExtraOp::Dec => frame.set_reg(b, Value::Number(frame.regconst(c).to_number() - 1.0)),
            ExtraOp::EndTry | ExtraOp::EndCatch => unwind::leave_guarded(frame)?,
            ExtraOp::EndFin => match unwind::end_finally(frame, b)? {
                Resume::Next => {}
                Resume::Throw(value) => return Err(Abrupt::Throw(value)),
                Resume::Return(value) => {
                    if let Some(value) = unwind::unwind_return(frame, value) {
                        return Ok(Step::Return(value));
                    }
                }
                Resume::Break(id) => unwind::unwind_label(frame, id, false)?,
                Resume::Continue(id) => unwind::unwind_label(frame, id, true)?,
            },
        }
        Ok(Step::Next)
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn binary_op(&mut self, op: OpCode, lhs: &Value, rhs: &Value) -> Completion<Value> {
        let num = |f: fn(f64, f64) -> f64| Value::Number(f(lhs.to_number(), rhs.to_number()));
        let int = |f: fn(i32, i32) -> i32| Value::Number(f(lhs.to_int32(), rhs.to_int32()) as f64);
        let shift = rhs.to_uint32() & 31;

        let result = match op {
            OpCode::Add => {
                let (a, b) = (lhs.to_primitive(), rhs.to_primitive());
                if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                    Value::String(a.to_js_string() + &b.to_js_string())
                } else {
                    Value::Number(a.to_number() + b.to_number())
                }
            }
            OpCode::Sub => num(|a, b| a - b),
            OpCode::Mul => num(|a, b| a * b),
            OpCode::Div => num(|a, b| a / b),
            OpCode::Mod => num(|a, b| a % b),
            OpCode::BAsl => Value::Number(lhs.to_int32().wrapping_shl(shift) as f64),
            OpCode::BAsr => Value::Number((lhs.to_int32() >> shift) as f64),
            OpCode::BLsr => Value::Number((lhs.to_uint32() >> shift) as f64),
            OpCode::BAnd => int(|a, b| a & b),
            OpCode::BOr => int(|a, b| a | b),
            OpCode::BXor => int(|a, b| a ^ b),
            OpCode::Eq => Value::Boolean(abstract_equals(lhs, rhs)),
            OpCode::Neq => Value::Boolean(!abstract_equals(lhs, rhs)),
            OpCode::SEq => Value::Boolean(strict_equals(lhs, rhs)),
            OpCode::SNeq => Value::Boolean(!strict_equals(lhs, rhs)),
            OpCode::Lt => Value::Boolean(less_than(lhs, rhs) == Some(true)),
            OpCode::Gt => Value::Boolean(less_than(rhs, lhs) == Some(true)),
            OpCode::Le => Value::Boolean(less_than(rhs, lhs) == Some(false)),
            OpCode::Ge => Value::Boolean(less_than(lhs, rhs) == Some(false)),
            OpCode::InstOf => Value::Boolean(self.instance_of(lhs, rhs)?),
            OpCode::In => Value::Boolean(self.has_property_op(lhs, rhs)?),
            _ => {
                return Err(Error::internal(format!("{} is not a binary operator", op.mnemonic()), 0).into());
            }
        };
        Ok(result)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Result<Value> {
        Interpreter::new().eval(src)
    }

    fn eval_ok(src: &str) -> Value {
        eval(src).expect("evaluation should succeed")
    }

    fn eval_num(src: &str) -> f64 {
        match eval_ok(src) {
            Value::Number(n) => n,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    fn eval_str(src: &str) -> String {
        eval_ok(src).to_js_string()
    }

    #[test]
    fn test_eval_empty_program() {
        assert!(eval_ok("").is_undefined());
    }

    #[test]
    fn test_eval_literals() {
        assert_eq!(eval_num("42;"), 42.0);
        assert_eq!(eval_num("3.14;"), 3.14);
        assert_eq!(eval_str("'hello';"), "hello");
        assert!(matches!(eval_ok("true;"), Value::Boolean(true)));
        assert!(matches!(eval_ok("null;"), Value::Null));
    }

    #[test]
    fn test_eval_arithmetic() {
        assert_eq!(eval_num("var a = 10, b = 4; a - b;"), 6.0);
        assert_eq!(eval_num("var a = 6; a * 7;"), 42.0);
        assert_eq!(eval_num("var a = 7; a % 4;"), 3.0);
        assert_eq!(eval_num("var a = -7; a % 4;"), -3.0);
        assert_eq!(eval_num("var a = 2; a + 3 * 4;"), 14.0);
        assert!(eval_num("var a = 0; a / a;").is_nan());
    }

    #[test]
    fn test_eval_string_concat() {
        assert_eq!(eval_str("var s = 'a'; s + 1 + 2;"), "a12");
        assert_eq!(eval_str("var n = 1; n + 2 + 'a';"), "3a");
        assert_eq!(eval_str("var a = [1, 2]; a + '';"), "1,2");
    }

    #[test]
    fn test_eval_bitwise() {
        assert_eq!(eval_num("var x = 1; x << 31;"), -2147483648.0);
        assert_eq!(eval_num("var x = -1; x >>> 28;"), 15.0);
        assert_eq!(eval_num("var x = -16; x >> 2;"), -4.0);
        assert_eq!(eval_num("var x = 6; (x & 3) | (x ^ 1);"), 7.0);
        assert_eq!(eval_num("var x = 5; ~x;"), -6.0);
    }

    #[test]
    fn test_eval_comparisons() {
        assert!(matches!(eval_ok("var a = 1; a < 2;"), Value::Boolean(true)));
        assert!(matches!(eval_ok("var a = 'b'; a > 'a';"), Value::Boolean(true)));
        assert!(matches!(eval_ok("var a = 1; a <= NaN;"), Value::Boolean(false)));
        assert!(matches!(eval_ok("var a = 1; a == '1';"), Value::Boolean(true)));
        assert!(matches!(eval_ok("var a = 1; a === '1';"), Value::Boolean(false)));
        assert!(matches!(eval_ok("var a = null; a == undefined;"), Value::Boolean(true)));
    }

    #[test]
    fn test_eval_unary() {
        assert_eq!(eval_num("var x = '5'; +x;"), 5.0);
        assert_eq!(eval_num("var x = 5; -x;"), -5.0);
        assert!(matches!(eval_ok("var x = 0; !x;"), Value::Boolean(true)));
        assert_eq!(eval_str("var x; typeof x;"), "undefined");
        assert_eq!(eval_str("typeof notDeclared;"), "undefined");
        assert_eq!(eval_str("typeof function () {};"), "function");
    }

    #[test]
    fn test_eval_increment() {
        assert_eq!(eval_num("var i = 1; i++; i;"), 2.0);
        assert_eq!(eval_num("var i = 1; i++;"), 1.0);
        assert_eq!(eval_num("var i = 1; ++i;"), 2.0);
        assert_eq!(eval_num("var o = {n: 1}; o.n += 4; o.n--; o.n;"), 4.0);
    }

    #[test]
    fn test_eval_if_else() {
        assert_eq!(eval_num("var x = 0; if (true) { x = 1; } x;"), 1.0);
        assert_eq!(eval_num("var x = 0; if (false) { x = 1; } else { x = 2; } x;"), 2.0);
    }

    #[test]
    fn test_eval_loops() {
        assert_eq!(eval_num("var x = 0; while (x < 3) { x = x + 1; } x;"), 3.0);
        assert_eq!(eval_num("var x = 0; do { x += 2; } while (x < 5); x;"), 6.0);
        assert_eq!(eval_num("var s = 0; for (var i = 0; i < 5; i++) s += i; s;"), 10.0);
    }

    #[test]
    fn test_eval_logical_operators() {
        assert_eq!(eval_num("var a = 0; a || 7;"), 7.0);
        assert_eq!(eval_num("var a = 3; a && 7;"), 7.0);
        assert_eq!(eval_num("var a = 0; a ? 1 : 2;"), 2.0);
    }

    #[test]
    fn test_eval_functions_and_closures() {
        assert_eq!(eval_num("function add(a, b) { return a + b; } add(2, 3);"), 5.0);
        assert_eq!(
            eval_num(
                "function counter() { var n = 0; return function () { return ++n; }; }
                 var c = counter(); c(); c(); c();"
            ),
            3.0
        );
        assert_eq!(eval_num("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5);"), 120.0);
    }

    #[test]
    fn test_eval_arguments_object() {
        assert_eq!(eval_num("function f() { return arguments.length; } f(1, 2, 3);"), 3.0);
        assert_eq!(eval_num("function f(a) { return arguments[1]; } f(1, 9);"), 9.0);
    }

    #[test]
    fn test_eval_this_and_new() {
        assert_eq!(eval_num("var o = {v: 4, get: function () { return this.v; }}; o.get();"), 4.0);
        assert_eq!(eval_num("function P(x) { this.x = x; } var p = new P(8); p.x;"), 8.0);
        assert!(matches!(
            eval_ok("function P() {} var p = new P(); p instanceof P;"),
            Value::Boolean(true)
        ));
    }

    #[test]
    fn test_eval_objects_and_arrays() {
        assert_eq!(eval_num("var a = [1, 2, 3]; a.length;"), 3.0);
        assert_eq!(eval_num("var a = [1, , 3, , ]; a.length;"), 4.0);
        assert_eq!(eval_num("var a = []; a[5] = 1; a.length;"), 6.0);
        assert_eq!(eval_num("var a = [1, 2, 3]; a.length = 1; a[1] === undefined ? 1 : 0;"), 1.0);
        assert_eq!(eval_num("var o = {a: 1, 'b': 2, 3: 4}; o.a + o.b + o[3];"), 7.0);
        assert!(matches!(eval_ok("var o = {a: 1}; 'a' in o;"), Value::Boolean(true)));
        assert!(matches!(eval_ok("var o = {a: 1}; delete o.a; 'a' in o;"), Value::Boolean(false)));
    }

    #[test]
    fn test_eval_accessors() {
        assert_eq!(
            eval_num("var o = { _v: 1, get v() { return this._v * 10; }, set v(x) { this._v = x; } }; o.v = 5; o.v;"),
            50.0
        );
    }

    #[test]
    fn test_eval_for_in() {
        assert_eq!(eval_str("var s = ''; var o = {a: 1, b: 2, c: 3}; for (var k in o) s += k; s;"), "abc");
        assert_eq!(
            eval_str("var s = ''; var o = {a: 1, b: 2, c: 3}; for (var k in o) { delete o.b; s += k; } s;"),
            "ac"
        );
        assert_eq!(eval_num("var n = 0; for (var k in null) n++; n;"), 0.0);
    }

    #[test]
    fn test_eval_try_catch_finally() {
        assert_eq!(eval_num("var x; try { throw 3; } catch (e) { x = e; } x;"), 3.0);
        assert_eq!(eval_num("var x = 0; try { x = 1; } finally { x += 10; } x;"), 11.0);
        assert_eq!(
            eval_num("function f() { try { return 1; } finally { g = 2; } } var g = 0; f() + g;"),
            3.0
        );
        assert_eq!(eval_str("var m; try { null.x; } catch (e) { m = e.name; } m;"), "TypeError");
    }

    #[test]
    fn test_eval_with() {
        assert_eq!(eval_num("var o = {x: 5}; var r; with (o) { r = x; x = 6; } r + o.x;"), 11.0);
    }

    #[test]
    fn test_eval_switch() {
        assert_eq!(
            eval_str(
                "var s = ''; switch (2) { case 1: s += 'a'; case 2: s += 'b'; case 3: s += 'c'; break; default: s += 'd'; } s;"
            ),
            "bc"
        );
        assert_eq!(eval_str("var s = ''; switch (9) { default: s += 'd'; case 1: s += 'a'; } s;"), "da");
    }

    #[test]
    fn test_uncaught_errors() {
        assert!(matches!(eval("undefinedName;"), Err(Error::ReferenceError(_))));
        assert!(matches!(eval("var x = 1; x();"), Err(Error::TypeError(_))));
        assert!(matches!(eval("throw 'boom';"), Err(Error::Uncaught(m)) if m == "boom"));
        assert!(matches!(eval("var = 1;"), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut interp = Interpreter::new().with_call_depth_limit(50);
        let result = interp.eval("function f(n) { return 1 + f(n + 1); } f(0);");
        assert!(matches!(result, Err(Error::RangeError(_))));
    }

    #[test]
    fn test_tail_calls_do_not_grow_depth() {
        let mut interp = Interpreter::new().with_call_depth_limit(10);
        let result = interp
            .eval("function loop(n) { if (n === 0) return 'done'; return loop(n - 1); } loop(1000);")
            .unwrap();
        assert_eq!(result.to_js_string(), "done");
    }

    #[test]
    fn test_print_output() {
        let mut interp = Interpreter::new();
        interp.eval("print('a', 1); print(true);").unwrap();
        assert_eq!(interp.output(), ["a 1", "true"]);
    }

    #[test]
    fn test_register_native() {
        fn answer(_interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Result<Value> {
            Ok(Value::Number(42.0))
        }
        let mut interp = Interpreter::new();
        interp.register_native("answer", answer);
        assert!(interp.global("answer").is_some_and(|f| f.is_callable()));
        assert!(interp.global("nonexistent").is_none());
        assert!(matches!(interp.eval("answer() + 1;").unwrap(), Value::Number(n) if n == 43.0));
    }

    #[test]
    fn test_run_function_expression() {
        let options = CompileOptions::new().with_function_expression(true);
        let template = compile("function (a, b) { return a * b; }", &options).unwrap();
        let mut interp = Interpreter::new();
        let func = interp.run(&template).unwrap();
        let result = interp.call(&func, Value::Undefined, &[Value::Number(6.0), Value::Number(7.0)]);
        assert!(matches!(result, Ok(Value::Number(n)) if n == 42.0));
    }
}

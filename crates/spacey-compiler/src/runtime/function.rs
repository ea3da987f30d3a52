//! Call frames and the catcher stack.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::environment::{EnvRef, Registers};
use super::value::Value;
use crate::compiler::bytecode::REGCONST_LIMIT;
use crate::compiler::{Constant, FunctionTemplate, Reg};

/// An entry on a frame's catcher stack.
#[derive(Clone)]
pub enum Catcher {
    /// An active label site (`LABEL id` at `pc_label`)
    Label {
        /// Label site id
        id: u32,
        /// pc of the `LABEL` instruction
        pc_label: usize,
    },
    /// A `try` statement or a `with` body
    TryCatch {
        /// pc of the `TRYCATCH` instruction
        pc: usize,
        /// `TRYCATCH` flags
        flags: u32,
        /// First of the two completion registers
        reg: Reg,
        /// A throw still enters the catch clause
        catch_enabled: bool,
        /// An abrupt exit still enters the finally clause
        finally_enabled: bool,
        /// Name bound to the exception inside the catch clause
        catch_name: Option<String>,
        /// Lexical environment to restore when leaving the region
        env: EnvRef,
    },
}

/// One activation of a function, program or eval body.
pub struct CallFrame {
    /// Code being executed
    pub template: Arc<FunctionTemplate>,
    /// Register file, shared with the activation's environment
    pub registers: Registers,
    /// Next instruction
    pub pc: usize,
    /// Current lexical environment
    pub env: EnvRef,
    /// Target of `DECLVAR`
    pub var_env: EnvRef,
    /// `this` binding
    pub this: Value,
    /// Active labels and guarded regions, innermost last
    pub catchers: Vec<Catcher>,
}

impl CallFrame {
    /// Creates a frame positioned at the first instruction.
    pub fn new(template: Arc<FunctionTemplate>, registers: Registers, env: EnvRef, this: Value) -> Self {
        Self {
            template,
            registers,
            pc: 0,
            var_env: env.clone(),
            env,
            this,
            catchers: Vec::new(),
        }
    }

    /// Allocates a register file of `size` undefined values.
    pub fn new_registers(size: usize) -> Registers {
        Rc::new(RefCell::new(vec![Value::Undefined; size]))
    }

    /// Reads `R[reg]`.
    pub fn reg(&self, reg: u32) -> Value {
        self.registers.borrow().get(reg as usize).cloned().unwrap_or_default()
    }

    /// Writes `R[reg]`, growing the file if needed.
    pub fn set_reg(&self, reg: u32, value: Value) {
        let mut regs = self.registers.borrow_mut();
        let idx = reg as usize;
        if idx >= regs.len() {
            regs.resize(idx + 1, Value::Undefined);
        }
        regs[idx] = value;
    }

    /// Reads `K[index]`.
    pub fn constant(&self, index: u32) -> Value {
        match self.template.consts.get(index as usize) {
            Some(Constant::Number(n)) => Value::Number(*n),
            Some(Constant::String(s)) => Value::String(s.clone()),
            None => Value::Undefined,
        }
    }

    /// Reads a regconst operand.
    pub fn regconst(&self, x: u32) -> Value {
        if x >= REGCONST_LIMIT {
            self.constant(x - REGCONST_LIMIT)
        } else {
            self.reg(x)
        }
    }

    /// Reads the identifier named by a regconst operand.
    pub fn const_name(&self, x: u32) -> String {
        self.regconst(x).to_js_string()
    }

    /// Source line of the instruction just executed.
    pub fn current_line(&self) -> Option<u32> {
        self.template.line_for_pc(self.pc.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, compile};
    use crate::runtime::environment::Environment;

    fn frame_for(source: &str) -> CallFrame {
        let template = Arc::new(compile(source, &CompileOptions::default()).unwrap());
        let registers = CallFrame::new_registers(template.nregs as usize);
        CallFrame::new(template, registers, Environment::declarative(None), Value::Undefined)
    }

    #[test]
    fn test_registers_grow_on_write() {
        let frame = frame_for("");
        frame.set_reg(10, Value::Number(3.0));
        assert!(matches!(frame.reg(10), Value::Number(n) if n == 3.0));
        assert!(frame.reg(200).is_undefined());
    }

    #[test]
    fn test_regconst_reads_constants() {
        let frame = frame_for("x = 'hello';");
        let k = frame
            .template
            .consts
            .iter()
            .position(|c| c.as_str() == Some("hello"))
            .unwrap() as u32;
        assert_eq!(frame.regconst(REGCONST_LIMIT + k).to_js_string(), "hello");
        assert_eq!(frame.const_name(REGCONST_LIMIT + k), "hello");
    }
}

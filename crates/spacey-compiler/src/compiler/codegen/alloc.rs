//! Temporary register and constant pool allocation.
//!
//! Temporaries are handed out stack-like from `temp_next`; callers roll the
//! cursor back with `settemp` at statement and argument boundaries. The
//! frame size of the function is the high-water mark, `temp_max`.

use tracing::trace;

use super::Compiler;
use super::ivalue::RegConst;
use crate::compiler::bytecode::{REGCONST_LIMIT, Reg};
use crate::compiler::template::Constant;
use crate::error::Result;

/// Only this many leading pool entries are searched for a duplicate.
const GETCONST_MAX_CONSTS_CHECK: usize = 256;

impl Compiler<'_> {
    /// Allocates `num` consecutive temporaries and returns the first.
    pub(super) fn alloctemps(&mut self, num: u32) -> Result<Reg> {
        let res = self.func.temp_next;
        self.func.temp_next += num;

        if self.func.temp_next > REGCONST_LIMIT {
            return Err(self.internal_error("out of temp regs"));
        }
        if self.func.temp_next > self.func.temp_max {
            self.func.temp_max = self.func.temp_next;
        }
        Ok(res)
    }

    pub(super) fn alloctemp(&mut self) -> Result<Reg> {
        self.alloctemps(1)
    }

    /// Allocates a temporary above every register used so far, so it
    /// survives any code already emitted.
    pub(super) fn alloctemp_unused(&mut self) -> Result<Reg> {
        let next = self.func.temp_next.max(self.func.temp_max);
        self.settemp_checkmax(next);
        self.alloctemp()
    }

    pub(super) fn gettemp(&self) -> Reg {
        self.func.temp_next
    }

    /// Rolls the temp cursor back. Must only lower it.
    pub(super) fn settemp(&mut self, temp: Reg) {
        self.func.temp_next = temp;
    }

    /// Moves the temp cursor, raising the high-water mark if needed.
    pub(super) fn settemp_checkmax(&mut self, temp: Reg) {
        self.func.temp_next = temp;
        if temp > self.func.temp_max {
            self.func.temp_max = temp;
        }
    }

    /// Returns true if `x` is a temporary register (not bound, not a constant).
    pub(super) fn is_temp(&self, x: RegConst) -> bool {
        matches!(x, RegConst::Reg(r) if r >= self.func.temp_first)
    }

    /// Returns the pool index for `value`, appending it if needed.
    pub(super) fn getconst(&mut self, value: Constant) -> Result<u32> {
        let consts = &self.func.consts;
        let n_check = consts.len().min(GETCONST_MAX_CONSTS_CHECK);
        if let Some(i) = consts[..n_check].iter().position(|k| k.same_value(&value)) {
            return Ok(i as u32);
        }

        let n = consts.len();
        if n >= REGCONST_LIMIT as usize {
            return Err(self.internal_error("out of consts"));
        }
        trace!(index = n, value = %value, "new constant");
        self.func.consts.push(value);
        Ok(n as u32)
    }

    /// Constant pool entry for an identifier name or string key.
    pub(super) fn getconst_str(&mut self, s: &str) -> Result<u32> {
        self.getconst(Constant::String(s.to_string()))
    }
}

//! Instruction emission and jump patching.
//!
//! Forward jumps are emitted empty and patched once their target is known.
//! Label sites and `TRYCATCH` reserve `INVALID` slots that are overwritten
//! later, so `patch_jump` accepts any instruction at the patch site.

use tracing::trace;

use super::Compiler;
use super::ivalue::RegConst;
use crate::compiler::bytecode::{ExtraOp, Instruction, LDINT_BIAS, OpCode, Reg};

/// Passes over the finished code straightening `JUMP -> JUMP` chains.
const PEEPHOLE_MAX_ITER: usize = 3;

impl Compiler<'_> {
    pub(super) fn current_pc(&self) -> usize {
        self.func.code.len()
    }

    /// Appends `ins`, tagged with the line of the current token.
    pub(super) fn emit(&mut self, ins: Instruction) {
        trace!(pc = self.func.code.len(), line = self.curr_token.line, "emit {}", ins);
        self.func.code.push(ins);
        self.func.lines.push(self.curr_token.line);
    }

    pub(super) fn emit_a_b_c(&mut self, op: OpCode, a: u32, b: u32, c: u32) {
        self.emit(Instruction::a_b_c(op, a, b, c));
    }

    pub(super) fn emit_a_b(&mut self, op: OpCode, a: u32, b: u32) {
        self.emit_a_b_c(op, a, b, 0);
    }

    pub(super) fn emit_a_bc(&mut self, op: OpCode, a: u32, bc: u32) {
        self.emit(Instruction::a_bc(op, a, bc));
    }

    pub(super) fn emit_abc(&mut self, op: OpCode, abc: u32) {
        self.emit(Instruction::abc(op, abc));
    }

    pub(super) fn emit_extraop_b_c(&mut self, op: ExtraOp, b: u32, c: u32) {
        self.emit(Instruction::extra(op, b, c));
    }

    pub(super) fn emit_extraop_b(&mut self, op: ExtraOp, b: u32) {
        self.emit_extraop_b_c(op, b, 0);
    }

    pub(super) fn emit_extraop_only(&mut self, op: ExtraOp) {
        self.emit_extraop_b_c(op, 0, 0);
    }

    /// `LDINT reg, val`; the caller guarantees `val` fits the biased field.
    pub(super) fn emit_loadint(&mut self, reg: Reg, val: i32) {
        self.emit_a_bc(OpCode::LdInt, reg, (val + LDINT_BIAS) as u32);
    }

    pub(super) fn emit_jump(&mut self, target: usize) {
        let pc = self.current_pc();
        self.emit(Instruction::jump(pc, target));
    }

    /// Emits a placeholder jump and returns its pc for patching.
    pub(super) fn emit_jump_empty(&mut self) -> usize {
        let pc = self.current_pc();
        self.emit_abc(OpCode::Jump, 0);
        pc
    }

    /// Inserts `ins` at `pc`, shifting later code down.
    ///
    /// Jumps already emitted across the insertion point are not adjusted.
    /// Callers insert at the start of code whose forward jumps are all
    /// resolved inside it, so relative offsets stay valid.
    pub(super) fn insert(&mut self, pc: usize, ins: Instruction) {
        trace!(pc, "insert {}", ins);
        self.func.code.insert(pc, ins);
        self.func.lines.insert(pc, self.curr_token.line);
    }

    /// Inserts a placeholder jump at `pc`.
    pub(super) fn insert_jump_empty(&mut self, pc: usize) {
        self.insert(pc, Instruction::abc(OpCode::Jump, 0));
    }

    /// Overwrites the instruction at `jump_pc` with a jump to `target`.
    /// `None` is a no-op.
    pub(super) fn patch_jump(&mut self, jump_pc: Option<usize>, target: usize) {
        let Some(pc) = jump_pc else {
            return;
        };
        trace!(pc, target, "patch jump");
        self.func.code[pc] = Instruction::jump(pc, target);
    }

    pub(super) fn patch_jump_here(&mut self, jump_pc: Option<usize>) {
        let here = self.current_pc();
        self.patch_jump(jump_pc, here);
    }

    pub(super) fn patch_trycatch(&mut self, pc: usize, reg_catch: Reg, const_varname: u32, flags: u32) {
        self.func.code[pc] = Instruction::a_b_c(OpCode::TryCatch, flags, reg_catch, const_varname);
    }

    /// `IF 0, x`: skip the next instruction when `x` is falsy.
    pub(super) fn emit_if_false_skip(&mut self, x: RegConst) {
        self.emit_a_b_c(OpCode::If, 0, x.operand(), 0);
    }

    /// `IF 1, x`: skip the next instruction when `x` is truthy.
    pub(super) fn emit_if_true_skip(&mut self, x: RegConst) {
        self.emit_a_b_c(OpCode::If, 1, x.operand(), 0);
    }

    pub(super) fn emit_invalid(&mut self) {
        self.emit(Instruction::invalid());
    }

    /// Straightens jump chains. Never adds or removes instructions.
    pub(super) fn peephole_optimize(&mut self) {
        let code = &mut self.func.code;
        let n = code.len();

        for iter in 0..PEEPHOLE_MAX_ITER {
            let mut count_opt = 0;

            for i in 0..n {
                if code[i].op() != OpCode::Jump {
                    continue;
                }
                let target1 = code[i].jump_target(i);
                if target1 >= n || code[target1].op() != OpCode::Jump {
                    continue;
                }
                let target2 = code[target1].jump_target(target1);
                if target2 >= n || target2 == target1 {
                    continue;
                }
                code[i] = Instruction::jump(i, target2);
                count_opt += 1;
            }

            trace!(round = iter + 1, count_opt, "peephole");
            if count_opt == 0 {
                break;
            }
        }
    }
}

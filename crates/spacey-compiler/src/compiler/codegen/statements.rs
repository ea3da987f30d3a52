//! Statement parsing and control flow lowering.
//!
//! Statements are compiled in place; no statement tree is built. Every
//! iteration statement and `switch` opens a label site (see `labels`) whose
//! break and continue slots are patched once the exit and continue points
//! are known.
//!
//! ## Loop shapes
//!
//! ```text
//! while (C) S           for (A; C; U) S            for (L in O) S
//!
//! L1: C                     A                          JUMP L2
//!     IF 1, C           L1: C                      L1: L := R[t0]
//!     JUMP L2               IF 0, C                    JUMP L3
//!     S                     JUMP L3                L2: O
//!     JUMP L1               JUMP L4                    INITENUM t1, O
//! L2:                   L2: U                          JUMP L4
//!                           JUMP L1                L3: S
//!                       L3: S                      L4: NEXTENUM t0, t1
//!                           JUMP L2                    JUMP L5
//!                       L4:                            JUMP L1
//!                                                  L5:
//! ```
//!
//! The `for-in` left hand side is parsed before `in` is seen, so the
//! leading `JUMP L2` is spliced in front of its code afterwards.

use tracing::trace;

use super::{Compiler, STATEMENT_RECURSION_COST};
use super::expressions::{BP_COMMA, BP_FOR_EXPR, EXPR_FLAG_ALLOW_EMPTY, EXPR_FLAG_REJECT_IN};
use super::ivalue::{IValue, RegConst};
use super::labels::{LABEL_FLAG_ALLOW_BREAK, LABEL_FLAG_ALLOW_CONTINUE};
use super::scope::{Decl, DeclKind, VarBinding};
use crate::compiler::bytecode::{
    CALL_FLAG_TAILCALL, ExtraOp, OpCode, REGCONST_LIMIT, RETURN_FLAG_FAST,
    RETURN_FLAG_HAVE_RETVAL, Reg, TRYCATCH_FLAG_CATCH_BINDING, TRYCATCH_FLAG_HAVE_CATCH,
    TRYCATCH_FLAG_HAVE_FINALLY, TRYCATCH_FLAG_WITH_BINDING,
};
use crate::error::Result;
use crate::lexer::TokenKind;

/// The statement produces a value (expression statements).
const STMT_FLAG_HAS_VAL: u32 = 1 << 0;
/// The statement ends with `;` or an automatic semicolon.
const STMT_FLAG_HAS_TERM: u32 = 1 << 1;
/// A missing `;` is always accepted (`do-while`).
const STMT_FLAG_ALLOW_AUTO_SEMI_ALWAYS: u32 = 1 << 2;
/// The statement was a directive; the prologue continues.
const STMT_FLAG_STILL_PROLOGUE: u32 = 1 << 3;

/// Where the `default` clause of a switch stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultClause {
    Absent,
    /// Seen; its statements start with the next statement list
    Pending,
    At(usize),
}

impl Compiler<'_> {
    // ========================================================================
    // Statement Lists
    // ========================================================================

    /// Parses statements up to `}` (or end of input with `expect_eof`) and
    /// consumes the terminator.
    pub(super) fn parse_statements(&mut self, allow_source_elem: bool, expect_eof: bool) -> Result<()> {
        loop {
            let done = if expect_eof {
                self.curr_token.kind == TokenKind::Eof
            } else {
                self.curr_token.kind == TokenKind::RightBrace
            };
            if done {
                break;
            }
            self.parse_statement(allow_source_elem)?;
        }
        self.advance()
    }

    /// Parses one statement. `allow_source_elem` permits function
    /// declarations (top level of a program or function body).
    pub(super) fn parse_statement(&mut self, allow_source_elem: bool) -> Result<()> {
        self.recursion_increase(STATEMENT_RECURSION_COST)?;

        let temp_at_entry = self.gettemp();
        let pc_at_entry = self.current_pc();
        let labels_len_at_entry = self.func.labels.len();
        let dir_prol_at_entry = self.func.in_directive_prologue;
        self.func.in_directive_prologue = false;

        let mut allow_source_elem = allow_source_elem;
        let mut label_id: Option<u32> = None;
        let mut stmt_flags;
        let mut res = IValue::undefined();

        loop {
            if matches!(
                self.curr_token.kind,
                TokenKind::For | TokenKind::Do | TokenKind::While | TokenKind::Switch
            ) {
                let id = self.stmt_label_site(label_id);
                label_id = Some(id);
                self.add_label("", pc_at_entry, id)?;
            }

            stmt_flags = 0;
            match self.curr_token.kind {
                TokenKind::Function => {
                    if !allow_source_elem {
                        return Err(self.syntax_error("function declaration not allowed outside of top level"));
                    }
                    self.advance()?;
                    let fnum = self.parse_function_like_fnum(true, false)?;
                    if self.func.in_scanning {
                        if let Some(name) = self.func.funcs[fnum as usize].name.clone() {
                            self.func.decls.push(Decl {
                                name,
                                kind: DeclKind::Func(fnum),
                            });
                        }
                    }
                }
                TokenKind::LeftBrace => {
                    self.advance()?;
                    self.parse_statements(false, false)?;
                }
                TokenKind::Var => {
                    self.parse_var_stmt()?;
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                TokenKind::Semicolon => {
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                TokenKind::If => {
                    self.parse_if_stmt()?;
                }
                TokenKind::Do => {
                    let id = label_id.unwrap_or_default();
                    self.update_label_flags(id, LABEL_FLAG_ALLOW_BREAK | LABEL_FLAG_ALLOW_CONTINUE);
                    self.parse_do_stmt(pc_at_entry)?;
                    stmt_flags = STMT_FLAG_HAS_TERM | STMT_FLAG_ALLOW_AUTO_SEMI_ALWAYS;
                }
                TokenKind::While => {
                    let id = label_id.unwrap_or_default();
                    self.update_label_flags(id, LABEL_FLAG_ALLOW_BREAK | LABEL_FLAG_ALLOW_CONTINUE);
                    self.parse_while_stmt(pc_at_entry)?;
                }
                TokenKind::For => {
                    let id = label_id.unwrap_or_default();
                    self.update_label_flags(id, LABEL_FLAG_ALLOW_BREAK | LABEL_FLAG_ALLOW_CONTINUE);
                    self.parse_for_stmt(pc_at_entry)?;
                }
                TokenKind::Continue | TokenKind::Break => {
                    self.parse_break_or_continue()?;
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                TokenKind::Return => {
                    self.parse_return_stmt()?;
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                TokenKind::With => {
                    self.parse_with_stmt()?;
                }
                TokenKind::Switch => {
                    self.parse_switch_stmt(pc_at_entry)?;
                }
                TokenKind::Throw => {
                    self.parse_throw_stmt()?;
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                TokenKind::Try => {
                    self.parse_try_stmt()?;
                }
                TokenKind::Debugger => {
                    self.advance()?;
                    stmt_flags = STMT_FLAG_HAS_TERM;
                }
                _ => {
                    res = self.exprtop(BP_FOR_EXPR)?;
                    let single_token = self.func.nud_count == 1 && self.func.led_count == 0;

                    if single_token && self.curr_token.kind == TokenKind::Colon {
                        if let TokenKind::Identifier(name) = &self.prev_token.kind {
                            let name = name.clone();
                            trace!(%name, "labelled statement");
                            self.advance()?;
                            let id = self.stmt_label_site(label_id);
                            label_id = Some(id);
                            self.add_label(&name, pc_at_entry, id)?;
                            allow_source_elem = false;
                            continue;
                        }
                    }

                    if dir_prol_at_entry && single_token {
                        if let TokenKind::String(value) = &self.prev_token.kind {
                            stmt_flags |= STMT_FLAG_STILL_PROLOGUE;
                            if value == "use strict" && self.prev_token.num_escapes == 0 {
                                trace!("use strict directive");
                                self.func.is_strict = true;
                            }
                        }
                    }

                    stmt_flags |= STMT_FLAG_HAS_VAL | STMT_FLAG_HAS_TERM;
                }
            }
            break;
        }

        if stmt_flags & STMT_FLAG_HAS_VAL != 0 {
            match self.func.reg_stmt_value {
                Some(reg) => {
                    self.ivalue_toforcedreg(res, reg)?;
                }
                None => self.ivalue_toplain_ignore(res)?,
            }
        }

        if stmt_flags & STMT_FLAG_HAS_TERM != 0 {
            if self.curr_token.kind == TokenKind::Semicolon {
                self.advance()?;
            } else if !self.curr_token.allow_auto_semi
                && stmt_flags & STMT_FLAG_ALLOW_AUTO_SEMI_ALWAYS == 0
            {
                return Err(self.syntax_error("unterminated statement"));
            }
        }

        if stmt_flags & STMT_FLAG_STILL_PROLOGUE != 0 {
            self.func.in_directive_prologue = true;
        }

        if let Some(id) = label_id {
            // Labelled blocks and other non-loops leave the break slot to us.
            let slot = pc_at_entry + 1;
            if self.func.code[slot].op() == OpCode::Invalid {
                self.patch_jump_here(Some(slot));
            }
            self.emit_abc(OpCode::EndLabel, id);
        }

        self.settemp(temp_at_entry);
        self.reset_labels(labels_len_at_entry);
        self.recursion_decrease(STATEMENT_RECURSION_COST);
        Ok(())
    }

    // ========================================================================
    // Variable Declarations
    // ========================================================================

    /// `var a = 1, b, c = 2`; `curr_token` is `var`.
    fn parse_var_stmt(&mut self) -> Result<()> {
        self.advance()?;
        loop {
            let temp = self.gettemp();
            self.parse_var_decl(0)?;
            self.settemp(temp);
            if self.curr_token.kind != TokenKind::Comma {
                break;
            }
            self.advance()?;
        }
        Ok(())
    }

    /// One `name [= value]` declaration. Returns the binding so `for-in`
    /// can assign to it.
    fn parse_var_decl(&mut self, expr_flags: u32) -> Result<VarBinding> {
        let name = match &self.curr_token.kind {
            TokenKind::Identifier(name) if !self.func.is_restricted_name(name) => name.clone(),
            _ => return Err(self.syntax_error("invalid variable declaration")),
        };

        if self.func.in_scanning {
            self.func.decls.push(Decl {
                name: name.clone(),
                kind: DeclKind::Var,
            });
        }

        let binding = self.lookup_lhs(&name)?;
        self.advance()?;

        if self.curr_token.kind == TokenKind::Equal {
            self.advance()?;
            let res = self.exprtop(BP_COMMA | expr_flags)?;
            match binding {
                VarBinding::Reg(reg) => {
                    self.ivalue_toforcedreg(res, reg)?;
                }
                VarBinding::Slow(k) => {
                    let reg = self.ivalue_toreg(res)?;
                    self.emit_a_bc(OpCode::PutVar, reg, k);
                }
            }
        }

        Ok(binding)
    }

    // ========================================================================
    // Conditionals and Loops
    // ========================================================================

    fn parse_if_stmt(&mut self) -> Result<()> {
        let temp_reset = self.gettemp();

        self.advance()?;
        self.advance_expect(&TokenKind::LeftParen)?;
        let cond = self.exprtop_toregconst(BP_FOR_EXPR)?;
        self.emit_if_true_skip(cond);
        let pc_jump_false = self.emit_jump_empty();
        self.settemp(temp_reset);
        self.advance_expect(&TokenKind::RightParen)?;

        self.parse_statement(false)?;

        if self.curr_token.kind == TokenKind::Else {
            self.advance()?;
            let pc_jump_end = self.emit_jump_empty();
            self.patch_jump_here(Some(pc_jump_false));
            self.parse_statement(false)?;
            self.patch_jump_here(Some(pc_jump_end));
        } else {
            self.patch_jump_here(Some(pc_jump_false));
        }
        Ok(())
    }

    fn parse_do_stmt(&mut self, pc_label_site: usize) -> Result<()> {
        self.advance()?;
        let pc_start = self.current_pc();
        self.parse_statement(false)?;

        self.advance_expect(&TokenKind::While)?;
        self.advance_expect(&TokenKind::LeftParen)?;

        // continue re-evaluates the condition
        self.patch_jump_here(Some(pc_label_site + 2));
        let cond = self.exprtop_toregconst(BP_FOR_EXPR)?;
        self.emit_if_false_skip(cond);
        self.emit_jump(pc_start);
        self.advance_expect(&TokenKind::RightParen)?;

        self.patch_jump_here(Some(pc_label_site + 1));
        Ok(())
    }

    fn parse_while_stmt(&mut self, pc_label_site: usize) -> Result<()> {
        let temp_reset = self.gettemp();

        self.advance()?;
        self.advance_expect(&TokenKind::LeftParen)?;

        let pc_start = self.current_pc();
        self.patch_jump_here(Some(pc_label_site + 2));

        let cond = self.exprtop_toregconst(BP_FOR_EXPR)?;
        self.emit_if_true_skip(cond);
        let pc_jump_false = self.emit_jump_empty();
        self.settemp(temp_reset);

        self.advance_expect(&TokenKind::RightParen)?;
        self.parse_statement(false)?;
        self.emit_jump(pc_start);

        self.patch_jump_here(Some(pc_jump_false));
        self.patch_jump_here(Some(pc_label_site + 1));
        Ok(())
    }

    /// All four `for` forms.
    ///
    /// 1. `for (A; C; U) S`
    /// 2. `for (var a = 1, b; C; U) S`
    /// 3. `for (L in O) S`
    /// 4. `for (var a in O) S`
    ///
    /// `R[t0]` receives each key and `R[t1]` holds the enumerator.
    fn parse_for_stmt(&mut self, pc_label_site: usize) -> Result<()> {
        let reg_temps = self.alloctemps(2)?;
        let temp_reset = self.gettemp();

        self.advance()?;
        self.advance_expect(&TokenKind::LeftParen)?;

        let pc_v34_lhs;
        if self.curr_token.kind == TokenKind::Var {
            self.advance()?;
            let binding = self.parse_var_decl(EXPR_FLAG_REJECT_IN)?;
            self.settemp(temp_reset);

            if self.curr_token.kind != TokenKind::In {
                while self.curr_token.kind == TokenKind::Comma {
                    self.advance()?;
                    self.parse_var_decl(EXPR_FLAG_REJECT_IN)?;
                    self.settemp(temp_reset);
                }
                return self.parse_for_1_or_2(pc_label_site, reg_temps);
            }

            pc_v34_lhs = self.current_pc();
            match binding {
                VarBinding::Reg(reg) => self.emit_a_bc(OpCode::LdReg, reg, reg_temps),
                VarBinding::Slow(k) => self.emit_a_bc(OpCode::PutVar, reg_temps, k),
            }
        } else {
            pc_v34_lhs = self.current_pc();
            let res = self.exprtop(BP_FOR_EXPR | EXPR_FLAG_REJECT_IN | EXPR_FLAG_ALLOW_EMPTY)?;

            if self.curr_token.kind != TokenKind::In {
                self.ivalue_toplain_ignore(res)?;
                return self.parse_for_1_or_2(pc_label_site, reg_temps);
            }
            match res {
                IValue::Var(name) => {
                    if self.func.is_restricted_name(&name) {
                        return Err(self.syntax_error("invalid lvalue"));
                    }
                    match self.lookup_lhs(&name)? {
                        VarBinding::Reg(reg) => self.emit_a_bc(OpCode::LdReg, reg, reg_temps),
                        VarBinding::Slow(k) => self.emit_a_bc(OpCode::PutVar, reg_temps, k),
                    }
                }
                IValue::Prop { obj, key } => {
                    let obj = self.ispec_toregconst_raw(obj, None, false, false)?;
                    let key = self.ispec_toregconst(key)?;
                    self.emit_a_b_c(OpCode::PutProp, obj.operand(), key.operand(), reg_temps);
                }
                other => {
                    // Evaluated for side effects, then a ReferenceError at run time
                    self.ivalue_toplain_ignore(other)?;
                    self.emit_extraop_only(ExtraOp::InvLhs);
                }
            }
        }

        self.parse_for_3_or_4(pc_label_site, reg_temps, temp_reset, pc_v34_lhs)
    }

    /// `; C; U) S` of forms 1 and 2.
    fn parse_for_1_or_2(&mut self, pc_label_site: usize, reg_temps: Reg) -> Result<()> {
        // The key and enumerator registers aren't needed.
        let temp_reset = reg_temps;
        self.settemp(temp_reset);

        self.advance_expect(&TokenKind::Semicolon)?;

        let pc_l1 = self.current_pc();
        let res = self.exprtop(BP_FOR_EXPR | EXPR_FLAG_ALLOW_EMPTY)?;
        let (pc_jumpto_l3, pc_jumpto_l4) = if self.expr_is_empty() {
            (self.emit_jump_empty(), None)
        } else {
            let cond = self.ivalue_toregconst(res)?;
            self.emit_if_false_skip(cond);
            let to_body = self.emit_jump_empty();
            let to_exit = self.emit_jump_empty();
            (to_body, Some(to_exit))
        };
        self.settemp(temp_reset);

        self.advance_expect(&TokenKind::Semicolon)?;

        let pc_l2 = self.current_pc();
        let res = self.exprtop(BP_FOR_EXPR | EXPR_FLAG_ALLOW_EMPTY)?;
        let update_empty = self.expr_is_empty();
        if !update_empty {
            self.ivalue_toplain_ignore(res)?;
            self.emit_jump(pc_l1);
        }
        self.settemp(temp_reset);

        self.advance_expect(&TokenKind::RightParen)?;

        let pc_l3 = self.current_pc();
        self.parse_statement(false)?;
        let pc_continue = if update_empty { pc_l1 } else { pc_l2 };
        self.emit_jump(pc_continue);

        let pc_l4 = self.current_pc();
        trace!(pc_l1, pc_l2, pc_l3, pc_l4, "for loop");

        self.patch_jump(Some(pc_jumpto_l3), pc_l3);
        self.patch_jump(pc_jumpto_l4, pc_l4);
        self.patch_jump(Some(pc_label_site + 1), pc_l4);
        self.patch_jump(Some(pc_label_site + 2), pc_continue);
        Ok(())
    }

    /// `in O) S` of forms 3 and 4; the code assigning `R[t0]` to the left
    /// hand side starts at `pc_v34_lhs`.
    fn parse_for_3_or_4(
        &mut self,
        pc_label_site: usize,
        reg_temps: Reg,
        temp_reset: Reg,
        pc_v34_lhs: usize,
    ) -> Result<()> {
        self.settemp(temp_reset);

        // Enter at the enumerator setup, not at the assignment.
        self.insert_jump_empty(pc_v34_lhs);
        let pc_jumpto_l2 = pc_v34_lhs;
        let pc_l1 = pc_v34_lhs + 1;
        let pc_jumpto_l3 = self.emit_jump_empty();

        self.advance_expect(&TokenKind::In)?;

        let pc_l2 = self.current_pc();
        let reg_target = self.exprtop_toreg(BP_FOR_EXPR)?;
        self.emit_extraop_b_c(ExtraOp::InitEnum, reg_temps + 1, reg_target);
        let pc_jumpto_l4 = self.emit_jump_empty();
        self.settemp(temp_reset);

        self.advance_expect(&TokenKind::RightParen)?;

        let pc_l3 = self.current_pc();
        self.parse_statement(false)?;

        let pc_l4 = self.current_pc();
        self.emit_extraop_b_c(ExtraOp::NextEnum, reg_temps, reg_temps + 1);
        let pc_jumpto_l5 = self.emit_jump_empty();
        self.emit_jump(pc_l1);

        let pc_l5 = self.current_pc();
        trace!(pc_l1, pc_l2, pc_l3, pc_l4, pc_l5, "for-in loop");

        self.patch_jump(Some(pc_jumpto_l2), pc_l2);
        self.patch_jump(Some(pc_jumpto_l3), pc_l3);
        self.patch_jump(Some(pc_jumpto_l4), pc_l4);
        self.patch_jump(Some(pc_jumpto_l5), pc_l5);
        self.patch_jump(Some(pc_label_site + 1), pc_l5);
        self.patch_jump(Some(pc_label_site + 2), pc_l4);
        Ok(())
    }

    /// Lowers `switch` to a chain of `SEQ` tests.
    ///
    /// Each case test jumps to its clause's statements on a match and to the
    /// next test otherwise; the last test goes to `default` (or the end).
    /// Statement lists are reached only through those jumps or by falling
    /// out of the previous list.
    fn parse_switch_stmt(&mut self, pc_label_site: usize) -> Result<()> {
        self.advance()?;
        self.advance_expect(&TokenKind::LeftParen)?;
        let res = self.exprtop(BP_FOR_EXPR)?;
        // Case expressions may assign to the subject's variable.
        let rc_switch = self.ivalue_toregconst_raw(res, None, true, true)?;
        self.advance_expect(&TokenKind::RightParen)?;
        self.advance_expect(&TokenKind::LeftBrace)?;

        let temp_at_loop = self.gettemp();
        let mut pc_prevcase = Some(self.emit_jump_empty());
        let mut pc_prevstmt: Option<usize> = None;
        let mut pending_bodies: Vec<usize> = Vec::new();
        let mut default = DefaultClause::Absent;
        let mut seen_clause = false;

        loop {
            self.settemp(temp_at_loop);

            match self.curr_token.kind {
                TokenKind::RightBrace => break,
                TokenKind::Case => {
                    seen_clause = true;
                    self.patch_jump_here(pc_prevcase);
                    self.advance()?;
                    let rc_case = self.exprtop_toregconst(BP_FOR_EXPR)?;
                    self.advance_expect(&TokenKind::Colon)?;

                    let reg_temp = self.alloctemp()?;
                    self.emit_a_b_c(OpCode::SEq, reg_temp, rc_switch.operand(), rc_case.operand());
                    self.emit_if_true_skip(RegConst::Reg(reg_temp));
                    pc_prevcase = Some(self.emit_jump_empty());
                    pending_bodies.push(self.emit_jump_empty());
                    continue;
                }
                TokenKind::Default => {
                    if default != DefaultClause::Absent {
                        return Err(self.syntax_error("duplicate default clause"));
                    }
                    seen_clause = true;
                    self.advance()?;
                    self.advance_expect(&TokenKind::Colon)?;
                    default = DefaultClause::Pending;
                    continue;
                }
                _ if !seen_clause => {
                    return Err(self.syntax_error("invalid switch statement"));
                }
                _ => {}
            }

            let here = self.current_pc();
            if default == DefaultClause::Pending {
                default = DefaultClause::At(here);
            }
            for pc in pending_bodies.drain(..) {
                self.patch_jump(Some(pc), here);
            }
            self.patch_jump_here(pc_prevstmt);

            while !matches!(
                self.curr_token.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace
            ) {
                self.parse_statement(false)?;
            }

            // Fall through to the next statement list.
            pc_prevstmt = Some(self.emit_jump_empty());
        }

        self.advance()?;

        let end = self.current_pc();
        for pc in pending_bodies.drain(..) {
            self.patch_jump(Some(pc), end);
        }
        match default {
            DefaultClause::At(pc_default) => self.patch_jump(pc_prevcase, pc_default),
            _ => self.patch_jump(pc_prevcase, end),
        }
        self.patch_jump(pc_prevstmt, end);

        // The continue slot stays INVALID; continue never targets a switch.
        self.patch_jump(Some(pc_label_site + 1), end);
        Ok(())
    }

    // ========================================================================
    // Completion Statements
    // ========================================================================

    fn parse_return_stmt(&mut self) -> Result<()> {
        self.advance()?;

        if !self.func.is_function {
            return Err(self.syntax_error("invalid return"));
        }

        let mut ret_flags = 0;
        if self.func.catch_depth == 0 {
            ret_flags |= RETURN_FLAG_FAST;
        }

        if self.curr_token.kind == TokenKind::Semicolon
            || self.curr_token.lineterm
            || self.curr_token.allow_auto_semi
        {
            self.emit_a_b(OpCode::Return, ret_flags, 0);
            return Ok(());
        }

        let pc_before_expr = self.current_pc();
        let rc_val = self.exprtop_toregconst(BP_FOR_EXPR)?;
        let pc_after_expr = self.current_pc();

        // `return f(x)` outside any catcher reuses the caller's frame.
        if self.func.catch_depth == 0 && pc_after_expr > pc_before_expr {
            let last = self.func.code[pc_after_expr - 1];
            if last.op() == OpCode::Call && rc_val == RegConst::Reg(last.b()) {
                trace!(pc = pc_after_expr - 1, "tail call");
                self.func.code[pc_after_expr - 1] = last.with_a(last.a() | CALL_FLAG_TAILCALL);
                return Ok(());
            }
        }

        self.emit_a_b(OpCode::Return, ret_flags | RETURN_FLAG_HAVE_RETVAL, rc_val.operand());
        Ok(())
    }

    fn parse_throw_stmt(&mut self) -> Result<()> {
        self.advance()?;

        // No line break may follow `throw`, and the expression is required.
        if self.curr_token.kind == TokenKind::Semicolon || self.curr_token.allow_auto_semi {
            return Err(self.syntax_error("invalid throw"));
        }

        let reg_val = self.exprtop_toreg(BP_FOR_EXPR)?;
        self.emit_extraop_b(ExtraOp::Throw, reg_val);
        Ok(())
    }

    // ========================================================================
    // Exception Handling
    // ========================================================================

    /// `try` with `catch`, `finally`, or both.
    ///
    /// ```text
    ///     TRYCATCH flags, R[c], name
    ///     JUMP catch
    ///     JUMP finally
    ///     <try block>
    ///     ENDTRY
    /// catch:
    ///     PUTVAR R[c], name
    ///     <catch block>
    ///     ENDCATCH
    /// finally:
    ///     <finally block>
    ///     ENDFIN R[c]
    /// ```
    ///
    /// `R[c]` holds the thrown value and `R[c+1]` the completion type.
    fn parse_try_stmt(&mut self) -> Result<()> {
        self.func.catch_depth += 1;

        self.advance()?;

        let reg_catch = self.alloctemps(2)?;
        let pc_trycatch = self.current_pc();
        self.emit_invalid();
        self.emit_invalid();
        self.emit_invalid();

        self.advance_expect(&TokenKind::LeftBrace)?;
        self.parse_statements(false, false)?;
        self.emit_extraop_only(ExtraOp::EndTry);

        let mut trycatch_flags = 0;
        let mut const_varname = 0;
        let mut pc_catch = None;
        let mut pc_finally = None;

        if self.curr_token.kind == TokenKind::Catch {
            trycatch_flags |= TRYCATCH_FLAG_HAVE_CATCH;
            pc_catch = Some(self.current_pc());

            self.advance()?;
            self.advance_expect(&TokenKind::LeftParen)?;

            let name = match &self.curr_token.kind {
                TokenKind::Identifier(name) if !self.func.is_restricted_name(name) => name.clone(),
                _ => return Err(self.syntax_error("invalid try statement")),
            };
            let k = self.getconst_str(&name)?;
            const_varname = k + REGCONST_LIMIT;

            self.advance()?;
            self.advance_expect(&TokenKind::RightParen)?;
            self.advance_expect(&TokenKind::LeftBrace)?;

            // The catch variable lives in its own environment, so a
            // register binding of the same name is hidden meanwhile.
            let saved = self.func.varmap.insert(name.clone(), None);
            self.emit_a_bc(OpCode::PutVar, reg_catch, k);

            let parsed = self.parse_statements(false, false);
            match saved {
                Some(prev) => {
                    self.func.varmap.insert(name, prev);
                }
                None => {
                    self.func.varmap.remove(&name);
                }
            }
            parsed?;

            self.emit_extraop_only(ExtraOp::EndCatch);
            trycatch_flags |= TRYCATCH_FLAG_CATCH_BINDING;
        }

        if self.curr_token.kind == TokenKind::Finally {
            trycatch_flags |= TRYCATCH_FLAG_HAVE_FINALLY;
            pc_finally = Some(self.current_pc());

            self.advance()?;
            self.advance_expect(&TokenKind::LeftBrace)?;
            self.parse_statements(false, false)?;
            self.emit_extraop_b(ExtraOp::EndFin, reg_catch);
        }

        if pc_catch.is_none() && pc_finally.is_none() {
            return Err(self.syntax_error("invalid try statement"));
        }

        self.patch_trycatch(pc_trycatch, reg_catch, const_varname, trycatch_flags);
        if let Some(pc) = pc_catch {
            self.patch_jump(Some(pc_trycatch + 1), pc);
        }
        match pc_finally {
            Some(pc) => self.patch_jump(Some(pc_trycatch + 2), pc),
            None => self.patch_jump_here(Some(pc_trycatch + 2)),
        }

        self.func.catch_depth -= 1;
        Ok(())
    }

    /// `with (O) S` runs `S` inside an object environment, expressed as a
    /// `TRYCATCH` region with a with-binding.
    fn parse_with_stmt(&mut self) -> Result<()> {
        if self.func.is_strict {
            return Err(self.syntax_error("with in strict mode"));
        }

        self.advance()?;

        let reg_catch = self.alloctemps(2)?;

        self.advance_expect(&TokenKind::LeftParen)?;
        let rc_target = self.exprtop_toregconst(BP_FOR_EXPR)?;
        self.advance_expect(&TokenKind::RightParen)?;

        let pc_trycatch = self.current_pc();
        self.emit_a_b_c(OpCode::TryCatch, TRYCATCH_FLAG_WITH_BINDING, reg_catch, rc_target.operand());
        self.emit_invalid();
        self.emit_invalid();

        // Identifiers in the body may resolve to properties of the object.
        self.func.catch_depth += 1;
        self.func.with_depth += 1;
        let parsed = self.parse_statement(false);
        self.func.with_depth -= 1;
        self.func.catch_depth -= 1;
        parsed?;

        self.emit_extraop_only(ExtraOp::EndTry);
        self.patch_jump_here(Some(pc_trycatch + 2));
        Ok(())
    }
}

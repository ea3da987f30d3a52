//! Pratt expression parser.
//!
//! `expr(rbp)` consumes the first token with a *null denotation* (`nud`)
//! handler and then keeps feeding the left value into *left denotation*
//! (`led`) handlers while the next token binds tighter than `rbp`.
//!
//! | Binding power | Value | Tokens |
//! |---------------|-------|--------|
//! | `BP_EOF` | 2 | end of input |
//! | `BP_CLOSING` | 4 | `)` `]` |
//! | `BP_COMMA` | 6 | `,` |
//! | `BP_ASSIGNMENT` | 8 | `=` `+=` ... |
//! | `BP_CONDITIONAL` | 10 | `?` |
//! | `BP_LOR` .. `BP_BAND` | 12..20 | `\|\|` `&&` `\|` `^` `&` |
//! | `BP_EQUALITY` | 22 | `==` `!=` `===` `!==` |
//! | `BP_RELATIONAL` | 24 | `<` `>` `<=` `>=` `instanceof` `in` |
//! | `BP_SHIFT` | 26 | `<<` `>>` `>>>` |
//! | `BP_ADDITIVE` | 28 | `+` `-` |
//! | `BP_MULTIPLICATIVE` | 30 | `*` `/` `%` |
//! | `BP_POSTFIX` | 32 | `++` `--` |
//! | `BP_CALL` | 34 | `(` |
//! | `BP_MEMBER` | 36 | `.` `[` |
//!
//! Right associative operators (assignment, `&&`, `||`) recurse with
//! `bp - 1`. Unary operators parse their operand at `BP_MULTIPLICATIVE`.

use rustc_hash::FxHashMap;

use super::{Compiler, EXPR_RECURSION_COST};
use super::ivalue::{ISpec, IValue, Literal, RegConst};
use super::scope::VarBinding;
use crate::compiler::bytecode::{CALL_FLAG_EVALCALL, ExtraOp, OpCode, REGCONST_LIMIT, Reg};
use crate::compiler::template::Constant;
use crate::error::Result;
use crate::lexer::TokenKind;
use crate::runtime::value::number_to_string;

pub(super) const BP_INVALID: u32 = 0;
pub(super) const BP_EOF: u32 = 2;
pub(super) const BP_CLOSING: u32 = 4;
pub(super) const BP_FOR_EXPR: u32 = BP_CLOSING;
pub(super) const BP_COMMA: u32 = 6;
pub(super) const BP_ASSIGNMENT: u32 = 8;
pub(super) const BP_CONDITIONAL: u32 = 10;
pub(super) const BP_LOR: u32 = 12;
pub(super) const BP_LAND: u32 = 14;
pub(super) const BP_BOR: u32 = 16;
pub(super) const BP_BXOR: u32 = 18;
pub(super) const BP_BAND: u32 = 20;
pub(super) const BP_EQUALITY: u32 = 22;
pub(super) const BP_RELATIONAL: u32 = 24;
pub(super) const BP_SHIFT: u32 = 26;
pub(super) const BP_ADDITIVE: u32 = 28;
pub(super) const BP_MULTIPLICATIVE: u32 = 30;
pub(super) const BP_POSTFIX: u32 = 32;
pub(super) const BP_CALL: u32 = 34;
pub(super) const BP_MEMBER: u32 = 36;

const EXPR_RBP_MASK: u32 = 0xff;
/// `in` is not an operator (for statement heads).
pub(super) const EXPR_FLAG_REJECT_IN: u32 = 1 << 8;
/// An empty expression is not an error.
pub(super) const EXPR_FLAG_ALLOW_EMPTY: u32 = 1 << 9;

/// Values per `MPUTARR` batch.
const MAX_ARRAY_INIT_VALUES: u32 = 20;
/// Key/value pairs per `MPUTOBJ` batch.
const MAX_OBJECT_INIT_PAIRS: u32 = 10;

// Object literal key tracking
const OBJ_LIT_KEY_PLAIN: u32 = 1 << 0;
const OBJ_LIT_KEY_GET: u32 = 1 << 1;
const OBJ_LIT_KEY_SET: u32 = 1 << 2;

/// Left binding power of a token, ignoring context.
fn token_lbp(kind: &TokenKind) -> u32 {
    use TokenKind::*;
    match kind {
        Eof => BP_EOF,
        RightParen | RightBracket => BP_CLOSING,
        Comma => BP_COMMA,
        Equal | PlusEqual | MinusEqual | StarEqual | SlashEqual | PercentEqual
        | LeftShiftEqual | RightShiftEqual | UnsignedRightShiftEqual | AmpersandEqual
        | PipeEqual | CaretEqual => BP_ASSIGNMENT,
        Question => BP_CONDITIONAL,
        PipePipe => BP_LOR,
        AmpersandAmpersand => BP_LAND,
        Pipe => BP_BOR,
        Caret => BP_BXOR,
        Ampersand => BP_BAND,
        EqualEqual | NotEqual | StrictEqual | StrictNotEqual => BP_EQUALITY,
        LessThan | GreaterThan | LessThanEqual | GreaterThanEqual | Instanceof | In => {
            BP_RELATIONAL
        }
        LeftShift | RightShift | UnsignedRightShift => BP_SHIFT,
        Plus | Minus => BP_ADDITIVE,
        Star | Slash | Percent => BP_MULTIPLICATIVE,
        PlusPlus | MinusMinus => BP_POSTFIX,
        LeftParen => BP_CALL,
        LeftBracket | Dot => BP_MEMBER,
        _ => BP_INVALID,
    }
}

/// Opcode and right binding power of a binary operator token.
fn binary_op(kind: &TokenKind) -> Option<(OpCode, u32)> {
    use TokenKind::*;
    let op = match kind {
        Star => (OpCode::Mul, BP_MULTIPLICATIVE),
        Slash => (OpCode::Div, BP_MULTIPLICATIVE),
        Percent => (OpCode::Mod, BP_MULTIPLICATIVE),
        Plus => (OpCode::Add, BP_ADDITIVE),
        Minus => (OpCode::Sub, BP_ADDITIVE),
        LeftShift => (OpCode::BAsl, BP_SHIFT),
        RightShift => (OpCode::BAsr, BP_SHIFT),
        UnsignedRightShift => (OpCode::BLsr, BP_SHIFT),
        LessThan => (OpCode::Lt, BP_RELATIONAL),
        GreaterThan => (OpCode::Gt, BP_RELATIONAL),
        LessThanEqual => (OpCode::Le, BP_RELATIONAL),
        GreaterThanEqual => (OpCode::Ge, BP_RELATIONAL),
        Instanceof => (OpCode::InstOf, BP_RELATIONAL),
        In => (OpCode::In, BP_RELATIONAL),
        EqualEqual => (OpCode::Eq, BP_EQUALITY),
        NotEqual => (OpCode::Neq, BP_EQUALITY),
        StrictEqual => (OpCode::SEq, BP_EQUALITY),
        StrictNotEqual => (OpCode::SNeq, BP_EQUALITY),
        Ampersand => (OpCode::BAnd, BP_BAND),
        Caret => (OpCode::BXor, BP_BXOR),
        Pipe => (OpCode::BOr, BP_BOR),
        _ => return None,
    };
    Some(op)
}

/// For assignment tokens: `Some(None)` for `=`, `Some(Some(op))` for `op=`.
fn assignment_op(kind: &TokenKind) -> Option<Option<OpCode>> {
    use TokenKind::*;
    let op = match kind {
        Equal => None,
        PlusEqual => Some(OpCode::Add),
        MinusEqual => Some(OpCode::Sub),
        StarEqual => Some(OpCode::Mul),
        SlashEqual => Some(OpCode::Div),
        PercentEqual => Some(OpCode::Mod),
        LeftShiftEqual => Some(OpCode::BAsl),
        RightShiftEqual => Some(OpCode::BAsr),
        UnsignedRightShiftEqual => Some(OpCode::BLsr),
        AmpersandEqual => Some(OpCode::BAnd),
        PipeEqual => Some(OpCode::BOr),
        CaretEqual => Some(OpCode::BXor),
        _ => return None,
    };
    Some(op)
}

/// Regconst operand naming constant `k`.
fn const_operand(k: u32) -> u32 {
    REGCONST_LIMIT + k
}

impl Compiler<'_> {
    // ========================================================================
    // Driver
    // ========================================================================

    fn expr_lbp(&self) -> u32 {
        let tok = &self.curr_token;
        match tok.kind {
            TokenKind::In if !self.func.allow_in => BP_INVALID,
            // Restricted production: no line break before postfix ++/--
            TokenKind::PlusPlus | TokenKind::MinusMinus if tok.lineterm => BP_INVALID,
            ref kind => token_lbp(kind),
        }
    }

    /// Parses an expression whose operators bind tighter than `rbp`.
    ///
    /// On entry `curr_token` is the first token of the expression; on exit
    /// it is the first token after it.
    pub(super) fn expr(&mut self, rbp: u32) -> Result<IValue> {
        self.recursion_increase(EXPR_RECURSION_COST)?;
        let res = self.expr_inner(rbp);
        self.recursion_decrease(EXPR_RECURSION_COST);
        res
    }

    fn expr_inner(&mut self, rbp_flags: u32) -> Result<IValue> {
        if matches!(self.curr_token.kind, TokenKind::Semicolon | TokenKind::RightParen) {
            if rbp_flags & EXPR_FLAG_ALLOW_EMPTY == 0 {
                return Err(self.syntax_error("empty expression not allowed"));
            }
            return Ok(IValue::undefined());
        }

        let rbp = rbp_flags & EXPR_RBP_MASK;

        self.advance()?;
        let mut res = self.expr_nud()?;
        while rbp < self.expr_lbp() {
            self.advance()?;
            res = self.expr_led(res)?;
        }
        Ok(res)
    }

    /// Parses a complete expression, resetting the per-expression state.
    pub(super) fn exprtop(&mut self, rbp_flags: u32) -> Result<IValue> {
        self.func.nud_count = 0;
        self.func.led_count = 0;
        self.func.paren_level = 0;
        self.func.allow_in = rbp_flags & EXPR_FLAG_REJECT_IN == 0;

        self.expr(rbp_flags)
    }

    pub(super) fn expr_is_empty(&self) -> bool {
        self.func.nud_count == 0 && self.func.led_count == 0
    }

    pub(super) fn expr_toreg(&mut self, rbp: u32) -> Result<Reg> {
        let res = self.expr(rbp)?;
        self.ivalue_toreg(res)
    }

    pub(super) fn expr_toforcedreg(&mut self, rbp: u32, forced: Reg) -> Result<Reg> {
        let res = self.expr(rbp)?;
        self.ivalue_toforcedreg(res, forced)
    }

    pub(super) fn expr_toregconst(&mut self, rbp: u32) -> Result<RegConst> {
        let res = self.expr(rbp)?;
        self.ivalue_toregconst(res)
    }

    pub(super) fn expr_toplain(&mut self, rbp: u32) -> Result<ISpec> {
        let res = self.expr(rbp)?;
        self.ivalue_toplain_raw(res, None)
    }

    pub(super) fn expr_toplain_ignore(&mut self, rbp: u32) -> Result<()> {
        let res = self.expr(rbp)?;
        self.ivalue_toplain_ignore(res)
    }

    pub(super) fn exprtop_toreg(&mut self, rbp_flags: u32) -> Result<Reg> {
        let res = self.exprtop(rbp_flags)?;
        self.ivalue_toreg(res)
    }

    pub(super) fn exprtop_toregconst(&mut self, rbp_flags: u32) -> Result<RegConst> {
        let res = self.exprtop(rbp_flags)?;
        self.ivalue_toregconst(res)
    }

    // ========================================================================
    // Null Denotation
    // ========================================================================

    /// Handles `prev_token` as the start of an expression.
    fn expr_nud(&mut self) -> Result<IValue> {
        let temp_at_entry = self.gettemp();
        self.func.nud_count += 1;
        let kind = self.prev_token.kind.clone();

        match kind {
            TokenKind::This => {
                let reg = self.alloctemp()?;
                self.emit_extraop_b(ExtraOp::LdThis, reg);
                Ok(IValue::reg(reg))
            }
            TokenKind::Identifier(name) => Ok(IValue::Var(name)),
            TokenKind::Null => Ok(IValue::literal(Literal::Null)),
            TokenKind::True => Ok(IValue::literal(Literal::Boolean(true))),
            TokenKind::False => Ok(IValue::literal(Literal::Boolean(false))),
            TokenKind::Number(n) => Ok(IValue::Plain(ISpec::number(n))),
            TokenKind::String(s) => Ok(IValue::literal(Literal::String(s))),
            TokenKind::RegExp { pattern, flags } => {
                let reg = self.alloctemp()?;
                let k_pattern = self.getconst(Constant::String(pattern))?;
                let k_flags = self.getconst(Constant::String(flags))?;
                self.emit_a_b_c(
                    OpCode::Regexp,
                    reg,
                    const_operand(k_pattern),
                    const_operand(k_flags),
                );
                Ok(IValue::reg(reg))
            }
            TokenKind::LeftBracket => self.nud_array_literal(),
            TokenKind::LeftBrace => self.nud_object_literal(),
            TokenKind::LeftParen => {
                if self.curr_token.kind == TokenKind::RightParen {
                    return Err(self.syntax_error("empty expression not allowed"));
                }
                self.func.paren_level += 1;
                let prev_allow_in = self.func.allow_in;
                self.func.allow_in = true;

                let res = self.expr(BP_FOR_EXPR)?;
                self.advance_expect(&TokenKind::RightParen)?;

                self.func.allow_in = prev_allow_in;
                self.func.paren_level -= 1;
                Ok(res)
            }
            TokenKind::New => {
                // Stop at '(' so the arguments belong to `new`, not to a call.
                let reg_target = self.alloctemp()?;
                self.expr_toforcedreg(BP_CALL, reg_target)?;
                self.settemp(reg_target + 1);

                let nargs = if self.curr_token.kind == TokenKind::LeftParen {
                    self.advance()?;
                    self.parse_arguments()?
                } else {
                    0
                };
                self.emit_a_b_c(OpCode::New, reg_target, reg_target, nargs);
                Ok(IValue::reg(reg_target))
            }
            TokenKind::Function => {
                let reg = self.alloctemp()?;
                let fnum = self.parse_function_like_fnum(false, false)?;
                self.emit_a_bc(OpCode::Closure, reg, fnum);
                Ok(IValue::reg(reg))
            }
            TokenKind::Delete => self.nud_delete(temp_at_entry),
            TokenKind::Void => {
                self.expr_toplain_ignore(BP_MULTIPLICATIVE)?;
                Ok(IValue::undefined())
            }
            TokenKind::Typeof => {
                let res = self.expr(BP_MULTIPLICATIVE)?;
                if let IValue::Var(name) = &res {
                    // Unresolvable identifiers must not throw.
                    if let VarBinding::Slow(k) = self.lookup_lhs(name)? {
                        let reg = self.alloctemp()?;
                        self.emit_extraop_b_c(ExtraOp::TypeOfId, reg, const_operand(k));
                        return Ok(IValue::reg(reg));
                    }
                }
                self.nud_unary(ExtraOp::TypeOf, res)
            }
            TokenKind::PlusPlus => self.nud_preincdec(ExtraOp::Inc),
            TokenKind::MinusMinus => self.nud_preincdec(ExtraOp::Dec),
            TokenKind::Plus => {
                let res = self.expr(BP_MULTIPLICATIVE)?;
                if matches!(res, IValue::Plain(ISpec::Value(Literal::Number(_)))) {
                    return Ok(res);
                }
                self.nud_unary(ExtraOp::UnP, res)
            }
            TokenKind::Minus => {
                // Negative numeric literals are folded here.
                let res = self.expr(BP_MULTIPLICATIVE)?;
                if let IValue::Plain(ISpec::Value(Literal::Number(n))) = res {
                    return Ok(IValue::Plain(ISpec::number(-n)));
                }
                self.nud_unary(ExtraOp::UnM, res)
            }
            TokenKind::Tilde => {
                let res = self.expr(BP_MULTIPLICATIVE)?;
                self.nud_unary(ExtraOp::BNot, res)
            }
            TokenKind::Bang => {
                let res = self.expr(BP_MULTIPLICATIVE)?;
                self.nud_unary(ExtraOp::LNot, res)
            }
            _ => Err(self.syntax_error("unexpected token")),
        }
    }

    /// Applies a unary operator in place on a temporary copy of `res`.
    fn nud_unary(&mut self, op: ExtraOp, res: IValue) -> Result<IValue> {
        let reg = self.ivalue_totempreg(res)?;
        self.emit_extraop_b_c(op, reg, reg);
        Ok(IValue::reg(reg))
    }

    fn nud_delete(&mut self, temp_at_entry: Reg) -> Result<IValue> {
        let res = self.expr(BP_MULTIPLICATIVE)?;
        match res {
            IValue::Var(name) => {
                if self.func.is_strict {
                    return Err(self.syntax_error("cannot delete identifier"));
                }
                self.settemp(temp_at_entry);
                let reg = self.alloctemp()?;
                match self.lookup_lhs(&name)? {
                    // Register bindings are never configurable.
                    VarBinding::Reg(_) => self.emit_extraop_b_c(ExtraOp::LdBool, reg, 0),
                    VarBinding::Slow(k) => self.emit_a_b(OpCode::DelVar, reg, const_operand(k)),
                }
                Ok(IValue::reg(reg))
            }
            IValue::Prop { obj, key } => {
                self.settemp(temp_at_entry);
                let reg = self.alloctemp()?;
                let reg_obj = self.ispec_toregconst_raw(obj, None, false, false)?;
                let reg_key = self.ispec_toregconst_raw(key, None, true, false)?;
                self.emit_a_b_c(OpCode::DelProp, reg, reg_obj.operand(), reg_key.operand());
                Ok(IValue::reg(reg))
            }
            other => {
                // Deleting a non-reference is `true`, even in strict code.
                self.ivalue_toplain_ignore(other)?;
                Ok(IValue::literal(Literal::Boolean(true)))
            }
        }
    }

    fn nud_preincdec(&mut self, op: ExtraOp) -> Result<IValue> {
        let reg_res = self.alloctemp()?;
        let res = self.expr(BP_MULTIPLICATIVE)?;

        match res {
            IValue::Var(name) => {
                if self.func.is_restricted_name(&name) {
                    return Err(self.syntax_error("invalid lvalue"));
                }
                match self.lookup_lhs(&name)? {
                    VarBinding::Reg(reg) => {
                        self.emit_extraop_b_c(op, reg, reg);
                        self.emit_a_bc(OpCode::LdReg, reg_res, reg);
                    }
                    VarBinding::Slow(k) => {
                        self.emit_a_bc(OpCode::GetVar, reg_res, k);
                        self.emit_extraop_b_c(op, reg_res, reg_res);
                        self.emit_a_bc(OpCode::PutVar, reg_res, k);
                    }
                }
            }
            IValue::Prop { obj, key } => {
                let reg_obj = self.ispec_toregconst_raw(obj, None, false, false)?;
                let reg_key = self.ispec_toregconst_raw(key, None, true, false)?;
                self.emit_a_b_c(OpCode::GetProp, reg_res, reg_obj.operand(), reg_key.operand());
                self.emit_extraop_b_c(op, reg_res, reg_res);
                self.emit_a_b_c(OpCode::PutProp, reg_obj.operand(), reg_key.operand(), reg_res);
            }
            other => {
                // ToNumber still runs before the ReferenceError.
                self.ivalue_toforcedreg(other, reg_res)?;
                self.emit_extraop_b_c(ExtraOp::ToNum, reg_res, reg_res);
                self.emit_extraop_only(ExtraOp::InvLhs);
            }
        }

        self.settemp(reg_res + 1);
        Ok(IValue::reg(reg_res))
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// `[ ... ]`; `prev_token` is the opening bracket.
    ///
    /// Values are stored in batches with `MPUTARR`. Elisions are skipped
    /// (never stored as `undefined`) and trailing elisions only show up in
    /// the final `length`.
    fn nud_array_literal(&mut self) -> Result<IValue> {
        let reg_obj = self.alloctemp()?;
        self.emit_extraop_b_c(ExtraOp::NewArr, reg_obj, 0);
        let temp_start = self.gettemp();

        let mut curr_idx: i32 = 0;
        let mut init_idx: i32 = 0;
        let mut start_idx: i32 = 0;
        let mut require_comma = false;

        loop {
            let mut num_values = 0;
            self.settemp(temp_start);

            if self.curr_token.kind == TokenKind::RightBracket {
                break;
            }

            loop {
                if self.curr_token.kind == TokenKind::RightBracket {
                    break;
                }

                if require_comma {
                    if self.curr_token.kind != TokenKind::Comma {
                        return Err(self.syntax_error("invalid array literal"));
                    }
                    self.advance()?;
                    require_comma = false;
                    continue;
                }
                if self.curr_token.kind == TokenKind::Comma {
                    // Elision: flush the current batch.
                    curr_idx += 1;
                    self.advance()?;
                    break;
                }

                if num_values == 0 {
                    start_idx = curr_idx;
                    let reg_idx = self.alloctemp()?;
                    self.emit_loadint(reg_idx, start_idx);
                }
                let reg_temp = self.alloctemp()?;
                self.settemp(reg_temp);
                self.expr_toforcedreg(BP_COMMA, reg_temp)?;
                self.settemp(reg_temp + 1);

                num_values += 1;
                curr_idx += 1;
                require_comma = true;

                if num_values >= MAX_ARRAY_INIT_VALUES {
                    break;
                }
            }

            if num_values > 0 {
                self.emit_a_b_c(OpCode::MPutArr, reg_obj, temp_start, num_values);
                init_idx = start_idx + num_values as i32;
            }
        }

        self.advance()?;

        if curr_idx > init_idx {
            let reg_len = self.alloctemp()?;
            self.emit_loadint(reg_len, curr_idx);
            self.emit_extraop_b_c(ExtraOp::SetALen, reg_obj, reg_len);
        }

        self.settemp(temp_start);
        Ok(IValue::reg(reg_obj))
    }

    /// Records `key` with `new_flags`; returns false on a forbidden duplicate.
    fn object_literal_key_check(
        &self,
        keys: &mut FxHashMap<String, u32>,
        key: &str,
        new_flags: u32,
    ) -> bool {
        let flags = keys.get(key).copied().unwrap_or(0);
        if new_flags & OBJ_LIT_KEY_PLAIN != 0 {
            if flags & OBJ_LIT_KEY_PLAIN != 0 && self.func.is_strict {
                return false;
            }
            if flags & (OBJ_LIT_KEY_GET | OBJ_LIT_KEY_SET) != 0 {
                return false;
            }
        } else {
            if flags & OBJ_LIT_KEY_PLAIN != 0 {
                return false;
            }
            if flags & new_flags != 0 {
                return false;
            }
        }
        keys.insert(key.to_string(), flags | new_flags);
        true
    }

    /// A PropertyName token: IdentifierName, string, or number (ToString).
    fn property_name(kind: &TokenKind, identifier_name: Option<&str>) -> Option<String> {
        match kind {
            TokenKind::String(s) => Some(s.clone()),
            TokenKind::Number(n) => Some(number_to_string(*n)),
            _ => identifier_name.map(str::to_string),
        }
    }

    /// `{ ... }`; `prev_token` is the opening brace.
    ///
    /// Plain properties are stored in batches with `MPUTOBJ`. An accessor
    /// flushes the current batch and is defined with `INITGET`/`INITSET`.
    fn nud_object_literal(&mut self) -> Result<IValue> {
        let reg_obj = self.alloctemp()?;
        self.emit_extraop_b_c(ExtraOp::NewObj, reg_obj, 0);
        let temp_start = self.gettemp();
        let mut keys: FxHashMap<String, u32> = FxHashMap::default();

        loop {
            let mut num_pairs = 0;
            self.settemp(temp_start);

            if self.curr_token.kind == TokenKind::RightBrace {
                break;
            }

            loop {
                if self.curr_token.kind == TokenKind::RightBrace {
                    break;
                }

                // One token of lookahead tells `get: 1` from `get x() {}`.
                self.advance()?;

                let accessor = match &self.prev_token.kind {
                    TokenKind::Identifier(word) if self.curr_token.kind != TokenKind::Colon => {
                        match word.as_str() {
                            "get" => Some(true),
                            "set" => Some(false),
                            _ => None,
                        }
                    }
                    _ => None,
                };

                if let Some(is_getter) = accessor {
                    let key = Self::property_name(
                        &self.curr_token.kind,
                        self.curr_token.identifier_name(),
                    )
                    .ok_or_else(|| self.syntax_error("invalid object literal"))?;
                    let flag = if is_getter { OBJ_LIT_KEY_GET } else { OBJ_LIT_KEY_SET };
                    if !self.object_literal_key_check(&mut keys, &key, flag) {
                        return Err(self.syntax_error("invalid object literal"));
                    }
                    let k_key = self.getconst(Constant::String(key))?;

                    if num_pairs > 0 {
                        self.emit_a_b_c(OpCode::MPutObj, reg_obj, temp_start, num_pairs);
                        num_pairs = 0;
                        self.settemp(temp_start);
                    }

                    let fnum = self.parse_function_like_fnum(false, true)?;
                    let reg_key = self.alloctemp()?;
                    self.emit_a_bc(OpCode::LdConst, reg_key, k_key);
                    let reg_fn = self.alloctemp()?;
                    self.emit_a_bc(OpCode::Closure, reg_fn, fnum);
                    let op = if is_getter { OpCode::InitGet } else { OpCode::InitSet };
                    self.emit_a_b(op, reg_obj, temp_start);
                    self.settemp(temp_start);
                } else {
                    let key = Self::property_name(
                        &self.prev_token.kind,
                        self.prev_token.identifier_name(),
                    )
                    .ok_or_else(|| self.syntax_error("invalid object literal"))?;
                    if !self.object_literal_key_check(&mut keys, &key, OBJ_LIT_KEY_PLAIN) {
                        return Err(self.syntax_error("invalid object literal"));
                    }
                    let k_key = self.getconst(Constant::String(key))?;
                    let reg_key = self.alloctemp()?;
                    self.emit_a_bc(OpCode::LdConst, reg_key, k_key);

                    self.advance_expect(&TokenKind::Colon)?;

                    let reg_value = self.alloctemp()?;
                    self.settemp(reg_value);
                    self.expr_toforcedreg(BP_COMMA, reg_value)?;
                    self.settemp(reg_value + 1);
                    num_pairs += 1;
                }

                match self.curr_token.kind {
                    TokenKind::Comma => self.advance()?,
                    TokenKind::RightBrace => break,
                    _ => return Err(self.syntax_error("invalid object literal")),
                }

                if num_pairs >= MAX_OBJECT_INIT_PAIRS {
                    break;
                }
            }

            if num_pairs > 0 {
                self.emit_a_b_c(OpCode::MPutObj, reg_obj, temp_start, num_pairs);
            }
        }

        self.advance()?;
        self.settemp(temp_start);
        Ok(IValue::reg(reg_obj))
    }

    /// Parses call arguments into consecutive temporaries starting at the
    /// next free register. `prev_token` is `(`; the closing `)` is consumed.
    pub(super) fn parse_arguments(&mut self) -> Result<u32> {
        let mut nargs = 0;

        loop {
            if self.curr_token.kind == TokenKind::RightParen {
                break;
            }
            if nargs > 0 {
                self.advance_expect(&TokenKind::Comma)?;
            }

            let reg = self.alloctemp()?;
            self.settemp(reg);
            self.expr_toforcedreg(BP_COMMA, reg)?;
            self.settemp(reg + 1);
            nargs += 1;
        }

        self.advance_expect(&TokenKind::RightParen)?;
        Ok(nargs)
    }

    // ========================================================================
    // Left Denotation
    // ========================================================================

    /// Handles `prev_token` as an operator applied to `left`.
    fn expr_led(&mut self, left: IValue) -> Result<IValue> {
        self.func.led_count += 1;
        let kind = self.prev_token.kind.clone();

        if let Some((op, rbp)) = binary_op(&kind) {
            let x1 = self.ivalue_toplain_raw(left, None)?;
            let pc_start = self.current_pc();
            let x2 = self.expr_toplain(rbp)?;
            let x1 = self.ispec_capture(x1, pc_start)?;
            return Ok(IValue::Arith { op, x1, x2 });
        }
        if let Some(op) = assignment_op(&kind) {
            return self.led_assign(left, op);
        }

        match kind {
            TokenKind::Dot => {
                let obj = self.ivalue_toplain_raw(left, None)?;
                let name = self
                    .curr_token
                    .identifier_name()
                    .ok_or_else(|| self.syntax_error("expecting identifier name"))?
                    .to_string();
                // `a.if / 2` divides.
                self.reject_regexp_in_adv = true;
                self.advance()?;
                Ok(IValue::Prop {
                    obj,
                    key: ISpec::string(name),
                })
            }
            TokenKind::LeftBracket => {
                let obj = self.ivalue_toplain_raw(left, None)?;
                let pc_start = self.current_pc();
                let key = self.expr_toplain(BP_FOR_EXPR)?;
                let obj = self.ispec_capture(obj, pc_start)?;
                self.advance_expect(&TokenKind::RightBracket)?;
                Ok(IValue::Prop { obj, key })
            }
            TokenKind::LeftParen => self.led_call(left),
            TokenKind::PlusPlus => self.led_postincdec(left, ExtraOp::Inc),
            TokenKind::MinusMinus => self.led_postincdec(left, ExtraOp::Dec),
            // `a && b && c` parses as `a && (b && c)` so one skip covers the tail.
            TokenKind::AmpersandAmpersand => self.led_logical(left, true, BP_LAND - 1),
            TokenKind::PipePipe => self.led_logical(left, false, BP_LOR - 1),
            TokenKind::Question => {
                let reg = self.alloctemp()?;
                self.ivalue_toforcedreg(left, reg)?;
                self.emit_if_true_skip(RegConst::Reg(reg));
                let pc_jump_false = self.emit_jump_empty();
                self.expr_toforcedreg(BP_COMMA, reg)?;
                self.advance_expect(&TokenKind::Colon)?;
                let pc_jump_end = self.emit_jump_empty();
                self.patch_jump_here(Some(pc_jump_false));
                self.expr_toforcedreg(BP_COMMA, reg)?;
                self.patch_jump_here(Some(pc_jump_end));
                self.settemp(reg + 1);
                Ok(IValue::reg(reg))
            }
            TokenKind::Comma => {
                self.ivalue_toplain_ignore(left)?;
                let res = self.expr_toplain(BP_COMMA - 1)?;
                Ok(IValue::Plain(res))
            }
            _ => Err(self.syntax_error("unexpected token")),
        }
    }

    fn led_call(&mut self, left: IValue) -> Result<IValue> {
        let reg_cs = self.alloctemps(2)?;
        let mut call_flags = 0;

        match left {
            IValue::Var(name) => {
                if name == "eval" {
                    // Possibly a direct eval; the binding stays register capable.
                    call_flags |= CALL_FLAG_EVALCALL;
                    self.func.may_direct_eval = true;
                }
                match self.lookup_lhs(&name)? {
                    VarBinding::Reg(reg) => self.emit_a_b(OpCode::CsReg, reg_cs, reg),
                    VarBinding::Slow(k) => self.emit_a_b(OpCode::CsVar, reg_cs, const_operand(k)),
                }
            }
            IValue::Prop { obj, key } => {
                self.ispec_toforcedreg(obj, reg_cs)?;
                self.ispec_toforcedreg(key, reg_cs + 1)?;
                self.emit_a_b_c(OpCode::CsProp, reg_cs, reg_cs, reg_cs + 1);
            }
            other => {
                self.ivalue_toforcedreg(other, reg_cs)?;
                self.emit_a_b(OpCode::CsReg, reg_cs, reg_cs);
            }
        }

        self.settemp(reg_cs + 2);
        let nargs = self.parse_arguments()?;
        // `return` may later flip the TAILCALL bit on this instruction.
        self.emit_a_b_c(OpCode::Call, call_flags, reg_cs, nargs);
        self.settemp(reg_cs + 1);
        Ok(IValue::reg(reg_cs))
    }

    fn led_logical(&mut self, left: IValue, truthval: bool, rbp: u32) -> Result<IValue> {
        let reg = self.alloctemp()?;
        self.ivalue_toforcedreg(left, reg)?;
        self.emit_a_b(OpCode::If, truthval as u32, reg);
        let pc_jump = self.emit_jump_empty();
        self.expr_toforcedreg(rbp, reg)?;
        self.patch_jump_here(Some(pc_jump));
        Ok(IValue::reg(reg))
    }

    /// `=` and compound assignment. Non-reference targets compile to a run
    /// time ReferenceError after both sides are evaluated.
    fn led_assign(&mut self, left: IValue, op: Option<OpCode>) -> Result<IValue> {
        let rbp = BP_ASSIGNMENT - 1;

        match left {
            IValue::Var(name) => {
                // A compound target is read before the right side runs.
                let old = match op {
                    Some(_) => Some(match self.lookup_lhs(&name)? {
                        VarBinding::Reg(reg) => RegConst::Reg(reg),
                        VarBinding::Slow(k) => {
                            let reg_temp = self.alloctemp()?;
                            self.emit_a_bc(OpCode::GetVar, reg_temp, k);
                            RegConst::Reg(reg_temp)
                        }
                    }),
                    None => None,
                };
                let pc_start = self.current_pc();
                let reg_src = self.expr_toreg(rbp)?;
                if self.func.is_restricted_name(&name) {
                    return Err(self.syntax_error("invalid lvalue"));
                }
                let binding = self.lookup_lhs(&name)?;

                let reg_res = match op.zip(old) {
                    None => reg_src,
                    Some((op, old)) => {
                        let old = self.regconst_capture(old, pc_start)?;
                        let reg_temp = self.alloctemp()?;
                        self.emit_a_b_c(op, reg_temp, old.operand(), reg_src);
                        reg_temp
                    }
                };

                match binding {
                    VarBinding::Reg(reg) => self.emit_a_bc(OpCode::LdReg, reg, reg_res),
                    VarBinding::Slow(k) => self.emit_a_bc(OpCode::PutVar, reg_res, k),
                }
                Ok(IValue::reg(reg_res))
            }
            IValue::Prop { obj, key } => {
                // The object goes into the A field: register only.
                let reg_obj = self.ispec_toregconst_raw(obj, None, false, false)?;
                let reg_key = self.ispec_toregconst_raw(key, None, true, false)?;
                let compound = match op {
                    Some(op) => {
                        let reg_temp = self.alloctemp()?;
                        self.emit_a_b_c(OpCode::GetProp, reg_temp, reg_obj.operand(), reg_key.operand());
                        Some((op, reg_temp))
                    }
                    None => None,
                };

                let pc_start = self.current_pc();
                let src = self.expr_toregconst(rbp)?;
                let reg_obj = self.regconst_capture(reg_obj, pc_start)?;
                let reg_key = self.regconst_capture(reg_key, pc_start)?;

                let res = match compound {
                    None => src,
                    Some((op, reg_temp)) => {
                        self.emit_a_b_c(op, reg_temp, reg_temp, src.operand());
                        RegConst::Reg(reg_temp)
                    }
                };
                self.emit_a_b_c(
                    OpCode::PutProp,
                    reg_obj.operand(),
                    reg_key.operand(),
                    res.operand(),
                );
                Ok(IValue::Plain(ISpec::RegConst(res)))
            }
            other => {
                self.ivalue_toplain_ignore(other)?;
                let src = self.expr_toregconst(rbp)?;
                self.emit_extraop_only(ExtraOp::InvLhs);
                Ok(IValue::Plain(ISpec::RegConst(src)))
            }
        }
    }

    /// `x++` / `x--`: the result is the old value after ToNumber.
    fn led_postincdec(&mut self, left: IValue, op: ExtraOp) -> Result<IValue> {
        let reg_res = self.alloctemp()?;

        match left {
            IValue::Var(name) => {
                if self.func.is_restricted_name(&name) {
                    return Err(self.syntax_error("invalid lvalue"));
                }
                match self.lookup_lhs(&name)? {
                    VarBinding::Reg(reg) => {
                        self.emit_a_bc(OpCode::LdReg, reg_res, reg);
                        self.emit_extraop_b_c(ExtraOp::ToNum, reg_res, reg_res);
                        self.emit_extraop_b_c(op, reg, reg_res);
                    }
                    VarBinding::Slow(k) => {
                        let reg_temp = self.alloctemp()?;
                        self.emit_a_bc(OpCode::GetVar, reg_res, k);
                        self.emit_extraop_b_c(ExtraOp::ToNum, reg_res, reg_res);
                        self.emit_extraop_b_c(op, reg_temp, reg_res);
                        self.emit_a_bc(OpCode::PutVar, reg_temp, k);
                    }
                }
            }
            IValue::Prop { obj, key } => {
                let reg_temp = self.alloctemp()?;
                let reg_obj = self.ispec_toregconst_raw(obj, None, false, false)?;
                let reg_key = self.ispec_toregconst_raw(key, None, true, false)?;
                self.emit_a_b_c(OpCode::GetProp, reg_res, reg_obj.operand(), reg_key.operand());
                self.emit_extraop_b_c(ExtraOp::ToNum, reg_res, reg_res);
                self.emit_extraop_b_c(op, reg_temp, reg_res);
                self.emit_a_b_c(OpCode::PutProp, reg_obj.operand(), reg_key.operand(), reg_temp);
            }
            other => {
                self.ivalue_toforcedreg(other, reg_res)?;
                self.emit_extraop_b_c(ExtraOp::ToNum, reg_res, reg_res);
                self.emit_extraop_only(ExtraOp::InvLhs);
            }
        }

        self.settemp(reg_res + 1);
        Ok(IValue::reg(reg_res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_power_order() {
        assert!(token_lbp(&TokenKind::Star) > token_lbp(&TokenKind::Plus));
        assert!(token_lbp(&TokenKind::Plus) > token_lbp(&TokenKind::LeftShift));
        assert!(token_lbp(&TokenKind::AmpersandAmpersand) > token_lbp(&TokenKind::PipePipe));
        assert!(token_lbp(&TokenKind::Dot) > token_lbp(&TokenKind::LeftParen));
        assert_eq!(token_lbp(&TokenKind::Semicolon), BP_INVALID);
        assert_eq!(token_lbp(&TokenKind::RightParen), BP_FOR_EXPR);
    }

    #[test]
    fn test_assignment_tokens() {
        assert_eq!(assignment_op(&TokenKind::Equal), Some(None));
        assert_eq!(assignment_op(&TokenKind::CaretEqual), Some(Some(OpCode::BXor)));
        assert_eq!(assignment_op(&TokenKind::Plus), None);
        assert_eq!(token_lbp(&TokenKind::UnsignedRightShiftEqual), BP_ASSIGNMENT);
    }

    #[test]
    fn test_binary_tokens() {
        assert_eq!(binary_op(&TokenKind::In), Some((OpCode::In, BP_RELATIONAL)));
        assert_eq!(binary_op(&TokenKind::StrictNotEqual), Some((OpCode::SNeq, BP_EQUALITY)));
        assert_eq!(binary_op(&TokenKind::AmpersandAmpersand), None);
    }
}

//! Intermediate values.
//!
//! The expression parser does not load every subexpression into a register
//! right away. It returns an [`IValue`] describing the value, and the
//! consumer decides how to materialize it:
//!
//! | IValue | Meaning | Materialized by |
//! |--------|---------|-----------------|
//! | `Plain` | literal, register or constant | `LD*` when a register is needed |
//! | `Arith` | `x1 op x2` not yet emitted | constant folding or a binary op |
//! | `Prop` | `obj[key]` | `GETPROP`, or used as an assignment target |
//! | `Var` | identifier reference | bound register or `GETVAR` |
//!
//! Keeping `Prop` and `Var` lazy is what lets `a.b = c`, `delete a.b`,
//! `typeof x` and `f()` work without spurious loads.

use super::Compiler;
use super::scope::VarBinding;
use crate::compiler::bytecode::{ExtraOp, Instruction, OpCode, REGCONST_LIMIT, Reg};
use crate::compiler::template::Constant;
use crate::error::Result;

/// A literal value known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

/// A register or a constant pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegConst {
    Reg(Reg),
    Const(u32),
}

impl RegConst {
    /// Encodes as a `B`/`C` regconst operand.
    pub fn operand(self) -> u32 {
        match self {
            RegConst::Reg(r) => r,
            RegConst::Const(k) => REGCONST_LIMIT + k,
        }
    }
}

/// A value that can be placed in an instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum ISpec {
    /// Not yet placed anywhere.
    Value(Literal),
    /// Already in a register or the constant pool.
    RegConst(RegConst),
}

impl ISpec {
    pub fn reg(reg: Reg) -> Self {
        ISpec::RegConst(RegConst::Reg(reg))
    }

    pub fn undefined() -> Self {
        ISpec::Value(Literal::Undefined)
    }

    pub fn number(n: f64) -> Self {
        ISpec::Value(Literal::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        ISpec::Value(Literal::String(s.into()))
    }
}

/// An expression result whose code may not have been emitted yet.
#[derive(Debug, Clone, PartialEq)]
pub enum IValue {
    Plain(ISpec),
    Arith { op: OpCode, x1: ISpec, x2: ISpec },
    Prop { obj: ISpec, key: ISpec },
    Var(String),
}

impl IValue {
    pub fn undefined() -> Self {
        IValue::Plain(ISpec::undefined())
    }

    pub fn reg(reg: Reg) -> Self {
        IValue::Plain(ISpec::reg(reg))
    }

    pub fn literal(lit: Literal) -> Self {
        IValue::Plain(ISpec::Value(lit))
    }
}

/// Returns `x` as an `i32` if it is a whole number other than `-0`.
fn whole_i32(x: f64) -> Option<i32> {
    if !x.is_finite() || (x == 0.0 && x.is_sign_negative()) {
        return None;
    }
    let t = x as i32;
    if t as f64 == x { Some(t) } else { None }
}

impl Compiler<'_> {
    // ========================================================================
    // ISpec Conversion
    // ========================================================================

    /// Places `x` in a register or constant.
    ///
    /// - `forced`: the result must end up in this register
    /// - `allow_const`: a constant operand is acceptable
    /// - `require_temp`: a bound register must be copied to a temporary
    pub(super) fn ispec_toregconst_raw(
        &mut self,
        x: ISpec,
        forced: Option<Reg>,
        allow_const: bool,
        require_temp: bool,
    ) -> Result<RegConst> {
        match x {
            ISpec::Value(lit) => self.literal_toregconst(lit, forced, allow_const),
            ISpec::RegConst(RegConst::Const(k)) if !allow_const => {
                let dest = self.forced_or_temp(forced)?;
                self.emit_a_bc(OpCode::LdConst, dest, k);
                Ok(RegConst::Reg(dest))
            }
            ISpec::RegConst(rc) => {
                if let Some(forced) = forced {
                    if rc != RegConst::Reg(forced) {
                        self.emit_a_bc(OpCode::LdReg, forced, rc.operand());
                    }
                    return Ok(RegConst::Reg(forced));
                }
                match rc {
                    RegConst::Reg(r) if require_temp && !self.is_temp(rc) => {
                        let dest = self.alloctemp()?;
                        self.emit_a_bc(OpCode::LdReg, dest, r);
                        Ok(RegConst::Reg(dest))
                    }
                    _ => Ok(rc),
                }
            }
        }
    }

    /// Keeps an operand evaluated before `pc_start` stable across the code
    /// emitted since then. A bound register is copied into an unused
    /// temporary by an `LDREG` placed at `pc_start`; the copy is skipped
    /// when nothing was emitted.
    pub(super) fn regconst_capture(&mut self, x: RegConst, pc_start: usize) -> Result<RegConst> {
        let RegConst::Reg(reg) = x else {
            return Ok(x);
        };
        if self.is_temp(x) || self.current_pc() == pc_start {
            return Ok(x);
        }
        let copy = self.alloctemp_unused()?;
        self.insert(pc_start, Instruction::a_bc(OpCode::LdReg, copy, reg));
        Ok(RegConst::Reg(copy))
    }

    pub(super) fn ispec_capture(&mut self, x: ISpec, pc_start: usize) -> Result<ISpec> {
        match x {
            ISpec::RegConst(rc) => Ok(ISpec::RegConst(self.regconst_capture(rc, pc_start)?)),
            other => Ok(other),
        }
    }

    fn literal_toregconst(
        &mut self,
        lit: Literal,
        forced: Option<Reg>,
        allow_const: bool,
    ) -> Result<RegConst> {
        let dest = match lit {
            Literal::Undefined => {
                let dest = self.forced_or_temp(forced)?;
                self.emit_extraop_b(ExtraOp::LdUndef, dest);
                dest
            }
            Literal::Null => {
                let dest = self.forced_or_temp(forced)?;
                self.emit_extraop_b(ExtraOp::LdNull, dest);
                dest
            }
            Literal::Boolean(b) => {
                let dest = self.forced_or_temp(forced)?;
                self.emit_extraop_b_c(ExtraOp::LdBool, dest, b as u32);
                dest
            }
            Literal::String(s) => {
                let k = self.getconst(Constant::String(s))?;
                if allow_const {
                    return Ok(RegConst::Const(k));
                }
                let dest = self.forced_or_temp(forced)?;
                self.emit_a_bc(OpCode::LdConst, dest, k);
                dest
            }
            Literal::Number(n) => {
                if !allow_const {
                    if let Some(ival) = whole_i32(n) {
                        let biased = ival as i64 + LDINT_RANGE_BIAS;
                        if (0..=crate::compiler::bytecode::BC_MAX as i64).contains(&biased) {
                            let dest = self.forced_or_temp(forced)?;
                            self.emit_loadint(dest, ival);
                            return Ok(RegConst::Reg(dest));
                        }
                    }
                }
                let k = self.getconst(Constant::Number(n))?;
                if allow_const {
                    return Ok(RegConst::Const(k));
                }
                let dest = self.forced_or_temp(forced)?;
                self.emit_a_bc(OpCode::LdConst, dest, k);
                dest
            }
        };
        Ok(RegConst::Reg(dest))
    }

    fn forced_or_temp(&mut self, forced: Option<Reg>) -> Result<Reg> {
        match forced {
            Some(r) => Ok(r),
            None => self.alloctemp(),
        }
    }

    /// Places `x` in a register (never a constant).
    pub(super) fn ispec_toreg_raw(
        &mut self,
        x: ISpec,
        forced: Option<Reg>,
        require_temp: bool,
    ) -> Result<Reg> {
        match self.ispec_toregconst_raw(x, forced, false, require_temp)? {
            RegConst::Reg(r) => Ok(r),
            RegConst::Const(_) => Err(self.internal_error("constant where a register was required")),
        }
    }

    pub(super) fn ispec_toforcedreg(&mut self, x: ISpec, forced: Reg) -> Result<Reg> {
        self.ispec_toreg_raw(x, Some(forced), false)
    }

    pub(super) fn ispec_toregconst(&mut self, x: ISpec) -> Result<RegConst> {
        self.ispec_toregconst_raw(x, None, true, false)
    }

    // ========================================================================
    // IValue Conversion
    // ========================================================================

    /// Emits whatever code `x` still needs and returns the resulting plain value.
    pub(super) fn ivalue_toplain_raw(&mut self, x: IValue, forced: Option<Reg>) -> Result<ISpec> {
        match x {
            IValue::Plain(spec) => Ok(spec),
            IValue::Arith { op, x1, x2 } => {
                if let Some(folded) = fold_constant(op, &x1, &x2) {
                    return Ok(ISpec::Value(folded));
                }
                let arg1 = self.ispec_toregconst(x1)?;
                let arg2 = self.ispec_toregconst(x2)?;
                let dest = self.pick_dest(forced, arg1, arg2)?;
                self.emit_a_b_c(op, dest, arg1.operand(), arg2.operand());
                Ok(ISpec::reg(dest))
            }
            IValue::Prop { obj, key } => {
                let arg1 = self.ispec_toregconst(obj)?;
                let arg2 = self.ispec_toregconst(key)?;
                let dest = self.pick_dest(forced, arg1, arg2)?;
                self.emit_a_b_c(OpCode::GetProp, dest, arg1.operand(), arg2.operand());
                Ok(ISpec::reg(dest))
            }
            IValue::Var(name) => match self.lookup_lhs(&name)? {
                VarBinding::Reg(reg) => Ok(ISpec::reg(reg)),
                VarBinding::Slow(k) => {
                    let dest = self.forced_or_temp(forced)?;
                    self.emit_a_bc(OpCode::GetVar, dest, k);
                    Ok(ISpec::reg(dest))
                }
            },
        }
    }

    /// Destination for a binary result: the forced register, else a
    /// temporary operand, else a fresh temporary.
    fn pick_dest(&mut self, forced: Option<Reg>, arg1: RegConst, arg2: RegConst) -> Result<Reg> {
        if let Some(r) = forced {
            return Ok(r);
        }
        for arg in [arg1, arg2] {
            if let RegConst::Reg(r) = arg {
                if self.is_temp(arg) {
                    return Ok(r);
                }
            }
        }
        self.alloctemp()
    }

    /// Evaluates `x` for its side effects only.
    pub(super) fn ivalue_toplain_ignore(&mut self, x: IValue) -> Result<()> {
        let temp = self.gettemp();
        self.ivalue_toplain_raw(x, None)?;
        self.settemp(temp);
        Ok(())
    }

    pub(super) fn ivalue_toregconst_raw(
        &mut self,
        x: IValue,
        forced: Option<Reg>,
        allow_const: bool,
        require_temp: bool,
    ) -> Result<RegConst> {
        let plain = self.ivalue_toplain_raw(x, forced)?;
        self.ispec_toregconst_raw(plain, forced, allow_const, require_temp)
    }

    fn ivalue_toreg_raw(&mut self, x: IValue, forced: Option<Reg>, require_temp: bool) -> Result<Reg> {
        let plain = self.ivalue_toplain_raw(x, forced)?;
        self.ispec_toreg_raw(plain, forced, require_temp)
    }

    pub(super) fn ivalue_toreg(&mut self, x: IValue) -> Result<Reg> {
        self.ivalue_toreg_raw(x, None, false)
    }

    pub(super) fn ivalue_totempreg(&mut self, x: IValue) -> Result<Reg> {
        self.ivalue_toreg_raw(x, None, true)
    }

    pub(super) fn ivalue_toforcedreg(&mut self, x: IValue, forced: Reg) -> Result<Reg> {
        self.ivalue_toreg_raw(x, Some(forced), false)
    }

    pub(super) fn ivalue_toregconst(&mut self, x: IValue) -> Result<RegConst> {
        self.ivalue_toregconst_raw(x, None, true, false)
    }

    // ========================================================================
    // Identifiers
    // ========================================================================

    /// Resolves an identifier for reading or writing.
    pub(super) fn lookup_lhs(&mut self, name: &str) -> Result<VarBinding> {
        match self.func.lookup_active_register_binding(name) {
            Some(reg) => Ok(VarBinding::Reg(reg)),
            None => Ok(VarBinding::Slow(self.getconst_str(name)?)),
        }
    }
}

const LDINT_RANGE_BIAS: i64 = crate::compiler::bytecode::LDINT_BIAS as i64;

/// Folds literal arithmetic: number `+ - * /` and string concatenation.
fn fold_constant(op: OpCode, x1: &ISpec, x2: &ISpec) -> Option<Literal> {
    let (ISpec::Value(v1), ISpec::Value(v2)) = (x1, x2) else {
        return None;
    };
    match (v1, v2) {
        (Literal::Number(d1), Literal::Number(d2)) => {
            let d3 = match op {
                OpCode::Add => d1 + d2,
                OpCode::Sub => d1 - d2,
                OpCode::Mul => d1 * d2,
                OpCode::Div => d1 / d2,
                _ => return None,
            };
            Some(Literal::Number(d3))
        }
        (Literal::String(s1), Literal::String(s2)) if op == OpCode::Add => {
            Some(Literal::String(format!("{}{}", s1, s2)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_i32() {
        assert_eq!(whole_i32(3.0), Some(3));
        assert_eq!(whole_i32(-7.0), Some(-7));
        assert_eq!(whole_i32(0.0), Some(0));
        assert_eq!(whole_i32(-0.0), None);
        assert_eq!(whole_i32(1.5), None);
        assert_eq!(whole_i32(f64::NAN), None);
        assert_eq!(whole_i32(1e10), None);
    }

    #[test]
    fn test_fold_numbers() {
        let folded = fold_constant(OpCode::Add, &ISpec::number(1.0), &ISpec::number(2.0));
        assert_eq!(folded, Some(Literal::Number(3.0)));

        let folded = fold_constant(OpCode::Div, &ISpec::number(1.0), &ISpec::number(0.0));
        assert_eq!(folded, Some(Literal::Number(f64::INFINITY)));

        assert_eq!(
            fold_constant(OpCode::Mod, &ISpec::number(5.0), &ISpec::number(2.0)),
            None
        );
    }

    #[test]
    fn test_fold_strings_only_for_add() {
        let folded = fold_constant(OpCode::Add, &ISpec::string("a"), &ISpec::string("b"));
        assert_eq!(folded, Some(Literal::String("ab".into())));
        assert_eq!(
            fold_constant(OpCode::Sub, &ISpec::string("a"), &ISpec::string("b")),
            None
        );
        assert_eq!(
            fold_constant(OpCode::Add, &ISpec::string("a"), &ISpec::number(1.0)),
            None
        );
    }

    #[test]
    fn test_regconst_operand() {
        assert_eq!(RegConst::Reg(5).operand(), 5);
        assert_eq!(RegConst::Const(2).operand(), 258);
    }
}

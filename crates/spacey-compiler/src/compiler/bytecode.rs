//! Bytecode definitions.
//!
//! Every instruction is a single 32-bit word. This layout is the
//! compatibility surface between the compiler and any executor.
//!
//! ```text
//!  31        23 22        14 13      6 5     0
//! +------------+------------+---------+-------+
//! |     C      |     B      |    A    |  OP   |
//! +------------+------------+---------+-------+
//! |           BC            |    A    |  OP   |
//! +-------------------------+---------+-------+
//! |                ABC                |  OP   |
//! +-----------------------------------+-------+
//! ```
//!
//! | Field | Bits | Range |
//! |-------|------|-------|
//! | `OP`  | 6    | 0..63 |
//! | `A`   | 8    | 0..255 |
//! | `B`   | 9    | 0..511 |
//! | `C`   | 9    | 0..511 |
//! | `BC`  | 18   | 0..262143 |
//! | `ABC` | 26   | 0..67108863 |
//!
//! A `B` or `C` operand documented as *regconst* names register `x` when
//! `x < 256` and constant `x - 256` otherwise. `LDINT` stores its value
//! biased by [`LDINT_BIAS`]; `JUMP` stores a pc offset relative to the
//! following instruction, biased by [`JUMP_BIAS`].
//!
//! Notation below: `R[x]` register, `K[x]` constant, `RC[x]` regconst.

use std::fmt;

/// Register number.
pub type Reg = u32;

/// Number of addressable registers (and constants in a regconst operand).
pub const REGCONST_LIMIT: u32 = 256;
/// Largest `A` value.
pub const A_MAX: u32 = 0xff;
/// Largest `B`/`C` value.
pub const B_MAX: u32 = 0x1ff;
/// Largest `BC` value.
pub const BC_MAX: u32 = 0x3ffff;
/// Largest `ABC` value.
pub const ABC_MAX: u32 = 0x3ff_ffff;
/// Bias added to `LDINT` values.
pub const LDINT_BIAS: i32 = 1 << 17;
/// Bias added to `JUMP` offsets.
pub const JUMP_BIAS: i32 = 1 << 25;

const OP_SHIFT: u32 = 0;
const A_SHIFT: u32 = 6;
const B_SHIFT: u32 = 14;
const C_SHIFT: u32 = 23;

// CALL flags (A)
/// The call replaces the current activation.
pub const CALL_FLAG_TAILCALL: u32 = 1 << 0;
/// The call is a candidate direct `eval` call.
pub const CALL_FLAG_EVALCALL: u32 = 1 << 1;

// TRYCATCH flags (A)
/// The guarded region has a catch clause.
pub const TRYCATCH_FLAG_HAVE_CATCH: u32 = 1 << 0;
/// The guarded region has a finally clause.
pub const TRYCATCH_FLAG_HAVE_FINALLY: u32 = 1 << 1;
/// The catch clause binds a variable named by `C`.
pub const TRYCATCH_FLAG_CATCH_BINDING: u32 = 1 << 2;
/// The region is a `with` statement; `C` is the target object.
pub const TRYCATCH_FLAG_WITH_BINDING: u32 = 1 << 3;

// RETURN flags (A)
/// No catchers are active; the frame can be dropped directly.
pub const RETURN_FLAG_FAST: u32 = 1 << 0;
/// `B` holds the return value; otherwise `undefined` is returned.
pub const RETURN_FLAG_HAVE_RETVAL: u32 = 1 << 1;

// DECLVAR flags (A)
/// Binding is writable.
pub const PROPDESC_FLAG_WRITABLE: u32 = 1 << 0;
/// Binding is enumerable.
pub const PROPDESC_FLAG_ENUMERABLE: u32 = 1 << 1;
/// Binding is configurable (deletable).
pub const PROPDESC_FLAG_CONFIGURABLE: u32 = 1 << 2;
/// Declare without touching an existing value (`var`).
pub const DECLVAR_FLAG_UNDEF_VALUE: u32 = 1 << 4;
/// The value is a function declaration closure in `C`.
pub const DECLVAR_FLAG_FUNC_DECL: u32 = 1 << 5;

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Register loads
    /// `R[A] = R[BC]`
    LdReg = 0,
    /// `R[A] = K[BC]`
    LdConst,
    /// `R[A] = BC - LDINT_BIAS`
    LdInt,

    // Slow path variable access
    /// `R[A] = GetVar(K[BC])`
    GetVar,
    /// `PutVar(K[BC], R[A])`
    PutVar,
    /// Declare `RC[B]` with flags `A`, initial value `R[C]`
    DeclVar,
    /// `R[A] = delete RC[B]` (identifier reference)
    DelVar,

    // Properties
    /// `R[A] = RC[B][RC[C]]`
    GetProp,
    /// `R[A][RC[B]] = RC[C]`
    PutProp,
    /// `R[A] = delete R[B][RC[C]]`
    DelProp,

    // Binary operators: `R[A] = RC[B] op RC[C]`
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<<`
    BAsl,
    /// `>>`
    BAsr,
    /// `>>>`
    BLsr,
    /// `&`
    BAnd,
    /// `|`
    BOr,
    /// `^`
    BXor,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `===`
    SEq,
    /// `!==`
    SNeq,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `instanceof`
    InstOf,
    /// `in`
    In,

    // Literals and closures
    /// `R[A][R[B+2i]] = R[B+2i+1]` for `i in 0..C`
    MPutObj,
    /// `R[A][R[B]+i] = R[B+1+i]` for `i in 0..C`
    MPutArr,
    /// Define getter `R[B+1]` for key `R[B]` on `R[A]`
    InitGet,
    /// Define setter `R[B+1]` for key `R[B]` on `R[A]`
    InitSet,
    /// `R[A] = new RegExp(RC[B], RC[C])`
    Regexp,
    /// `R[A] = closure(funcs[BC])`
    Closure,

    // Calls
    /// `R[A] = R[B]`, `R[A+1] = undefined`
    CsReg,
    /// `R[A] = GetVar(RC[B])`, `R[A+1]` = implicit this of the binding
    CsVar,
    /// `R[A] = RC[B][RC[C]]`, `R[A+1] = RC[B]`
    CsProp,
    /// `R[B] = R[B].call(R[B+1], R[B+2..B+2+C])`, flags in `A`
    Call,
    /// `R[B] = new R[B](R[B+1..B+1+C])`
    New,

    // Control flow
    /// `pc += ABC - JUMP_BIAS`
    Jump,
    /// Skip the next instruction if `ToBoolean(RC[B]) == A`
    If,
    /// Return `RC[B]` (see flags in `A`)
    Return,
    /// Enter label site `ABC`; the next two slots are break/continue jumps
    Label,
    /// Leave label site `ABC`
    EndLabel,
    /// Abrupt break to label `ABC`, unwinding catchers
    Break,
    /// Abrupt continue to label `ABC`, unwinding catchers
    Continue,
    /// Guarded region; flags `A`, catch registers `B`, `B+1`, name/target `C`
    TryCatch,
    /// Extended operation selected by `A` (see [`ExtraOp`])
    Extra,
    /// Unpatched slot; executing it is an internal error
    Invalid,
}

impl OpCode {
    /// All opcodes in encoding order.
    pub const ALL: [OpCode; 52] = [
        OpCode::LdReg,
        OpCode::LdConst,
        OpCode::LdInt,
        OpCode::GetVar,
        OpCode::PutVar,
        OpCode::DeclVar,
        OpCode::DelVar,
        OpCode::GetProp,
        OpCode::PutProp,
        OpCode::DelProp,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::BAsl,
        OpCode::BAsr,
        OpCode::BLsr,
        OpCode::BAnd,
        OpCode::BOr,
        OpCode::BXor,
        OpCode::Eq,
        OpCode::Neq,
        OpCode::SEq,
        OpCode::SNeq,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::Lt,
        OpCode::Le,
        OpCode::InstOf,
        OpCode::In,
        OpCode::MPutObj,
        OpCode::MPutArr,
        OpCode::InitGet,
        OpCode::InitSet,
        OpCode::Regexp,
        OpCode::Closure,
        OpCode::CsReg,
        OpCode::CsVar,
        OpCode::CsProp,
        OpCode::Call,
        OpCode::New,
        OpCode::Jump,
        OpCode::If,
        OpCode::Return,
        OpCode::Label,
        OpCode::EndLabel,
        OpCode::Break,
        OpCode::Continue,
        OpCode::TryCatch,
        OpCode::Extra,
        OpCode::Invalid,
    ];

    /// Decodes an opcode number.
    pub fn from_u8(value: u8) -> Option<OpCode> {
        OpCode::ALL.get(value as usize).copied()
    }

    /// Returns true for `R[A] = RC[B] op RC[C]` operators.
    pub fn is_binary(self) -> bool {
        (OpCode::Add as u8..=OpCode::In as u8).contains(&(self as u8))
    }

    /// Mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::LdReg => "LDREG",
            OpCode::LdConst => "LDCONST",
            OpCode::LdInt => "LDINT",
            OpCode::GetVar => "GETVAR",
            OpCode::PutVar => "PUTVAR",
            OpCode::DeclVar => "DECLVAR",
            OpCode::DelVar => "DELVAR",
            OpCode::GetProp => "GETPROP",
            OpCode::PutProp => "PUTPROP",
            OpCode::DelProp => "DELPROP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::BAsl => "BASL",
            OpCode::BAsr => "BASR",
            OpCode::BLsr => "BLSR",
            OpCode::BAnd => "BAND",
            OpCode::BOr => "BOR",
            OpCode::BXor => "BXOR",
            OpCode::Eq => "EQ",
            OpCode::Neq => "NEQ",
            OpCode::SEq => "SEQ",
            OpCode::SNeq => "SNEQ",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::InstOf => "INSTOF",
            OpCode::In => "IN",
            OpCode::MPutObj => "MPUTOBJ",
            OpCode::MPutArr => "MPUTARR",
            OpCode::InitGet => "INITGET",
            OpCode::InitSet => "INITSET",
            OpCode::Regexp => "REGEXP",
            OpCode::Closure => "CLOSURE",
            OpCode::CsReg => "CSREG",
            OpCode::CsVar => "CSVAR",
            OpCode::CsProp => "CSPROP",
            OpCode::Call => "CALL",
            OpCode::New => "NEW",
            OpCode::Jump => "JUMP",
            OpCode::If => "IF",
            OpCode::Return => "RETURN",
            OpCode::Label => "LABEL",
            OpCode::EndLabel => "ENDLABEL",
            OpCode::Break => "BREAK",
            OpCode::Continue => "CONTINUE",
            OpCode::TryCatch => "TRYCATCH",
            OpCode::Extra => "EXTRA",
            OpCode::Invalid => "INVALID",
        }
    }
}

/// Extended operations, selected by the `A` field of an `EXTRA` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtraOp {
    /// No operation
    Nop = 0,
    /// `R[B] = this`
    LdThis,
    /// `R[B] = undefined`
    LdUndef,
    /// `R[B] = null`
    LdNull,
    /// `R[B] = C != 0`
    LdBool,
    /// `R[B] = {}`
    NewObj,
    /// `R[B] = []`
    NewArr,
    /// `R[B].length = R[C]`
    SetALen,
    /// `R[B] = typeof RC[C]`
    TypeOf,
    /// `R[B] = typeof` identifier `RC[C]` (no ReferenceError)
    TypeOfId,
    /// `R[B] = enumerator over R[C]`
    InitEnum,
    /// Store the next key of enumerator `R[C]` in `R[B]` and skip the next
    /// instruction; fall through when exhausted
    NextEnum,
    /// Throw `RC[B]`
    Throw,
    /// Throw ReferenceError for an invalid assignment target
    InvLhs,
    /// `R[B] = -ToNumber(RC[C])`
    UnM,
    /// `R[B] = ToNumber(RC[C])`
    UnP,
    /// `R[B] = ~ToInt32(RC[C])`
    BNot,
    /// `R[B] = !ToBoolean(RC[C])`
    LNot,
    /// `R[B] = ToNumber(RC[C]) + 1`
    Inc,
    /// `R[B] = ToNumber(RC[C]) - 1`
    Dec,
    /// `R[B] = ToNumber(RC[C])`
    ToNum,
    /// End of a try block (or a `with` body)
    EndTry,
    /// End of a catch block
    EndCatch,
    /// End of a finally block; resumes the completion saved in `R[B]`,
    /// `R[B+1]`
    EndFin,
}

impl ExtraOp {
    const ALL: [ExtraOp; 24] = [
        ExtraOp::Nop,
        ExtraOp::LdThis,
        ExtraOp::LdUndef,
        ExtraOp::LdNull,
        ExtraOp::LdBool,
        ExtraOp::NewObj,
        ExtraOp::NewArr,
        ExtraOp::SetALen,
        ExtraOp::TypeOf,
        ExtraOp::TypeOfId,
        ExtraOp::InitEnum,
        ExtraOp::NextEnum,
        ExtraOp::Throw,
        ExtraOp::InvLhs,
        ExtraOp::UnM,
        ExtraOp::UnP,
        ExtraOp::BNot,
        ExtraOp::LNot,
        ExtraOp::Inc,
        ExtraOp::Dec,
        ExtraOp::ToNum,
        ExtraOp::EndTry,
        ExtraOp::EndCatch,
        ExtraOp::EndFin,
    ];

    /// Decodes a sub-op number.
    pub fn from_u8(value: u8) -> Option<ExtraOp> {
        ExtraOp::ALL.get(value as usize).copied()
    }

    /// Mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            ExtraOp::Nop => "NOP",
            ExtraOp::LdThis => "LDTHIS",
            ExtraOp::LdUndef => "LDUNDEF",
            ExtraOp::LdNull => "LDNULL",
            ExtraOp::LdBool => "LDBOOL",
            ExtraOp::NewObj => "NEWOBJ",
            ExtraOp::NewArr => "NEWARR",
            ExtraOp::SetALen => "SETALEN",
            ExtraOp::TypeOf => "TYPEOF",
            ExtraOp::TypeOfId => "TYPEOFID",
            ExtraOp::InitEnum => "INITENUM",
            ExtraOp::NextEnum => "NEXTENUM",
            ExtraOp::Throw => "THROW",
            ExtraOp::InvLhs => "INVLHS",
            ExtraOp::UnM => "UNM",
            ExtraOp::UnP => "UNP",
            ExtraOp::BNot => "BNOT",
            ExtraOp::LNot => "LNOT",
            ExtraOp::Inc => "INC",
            ExtraOp::Dec => "DEC",
            ExtraOp::ToNum => "TONUM",
            ExtraOp::EndTry => "ENDTRY",
            ExtraOp::EndCatch => "ENDCATCH",
            ExtraOp::EndFin => "ENDFIN",
        }
    }
}

/// A single encoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction(pub u32);

impl Instruction {
    /// Encodes `OP A, B, C`.
    pub fn a_b_c(op: OpCode, a: u32, b: u32, c: u32) -> Self {
        debug_assert!(a <= A_MAX && b <= B_MAX && c <= B_MAX);
        Instruction(
            ((op as u32) << OP_SHIFT) | (a << A_SHIFT) | (b << B_SHIFT) | (c << C_SHIFT),
        )
    }

    /// Encodes `OP A, BC`.
    pub fn a_bc(op: OpCode, a: u32, bc: u32) -> Self {
        debug_assert!(a <= A_MAX && bc <= BC_MAX);
        Instruction(((op as u32) << OP_SHIFT) | (a << A_SHIFT) | (bc << B_SHIFT))
    }

    /// Encodes `OP ABC`.
    pub fn abc(op: OpCode, abc: u32) -> Self {
        debug_assert!(abc <= ABC_MAX);
        Instruction(((op as u32) << OP_SHIFT) | (abc << A_SHIFT))
    }

    /// Encodes `EXTRA op, B, C`.
    pub fn extra(op: ExtraOp, b: u32, c: u32) -> Self {
        Self::a_b_c(OpCode::Extra, op as u32, b, c)
    }

    /// Encodes a relative jump from `pc` to `target`.
    pub fn jump(pc: usize, target: usize) -> Self {
        let offset = target as i64 - pc as i64 - 1;
        Self::abc(OpCode::Jump, (offset + JUMP_BIAS as i64) as u32)
    }

    /// An unpatched slot.
    pub fn invalid() -> Self {
        Self::abc(OpCode::Invalid, 0)
    }

    /// Decodes the opcode.
    pub fn op(self) -> OpCode {
        OpCode::from_u8((self.0 & 0x3f) as u8).unwrap_or(OpCode::Invalid)
    }

    /// Decodes the extra sub-op (meaningful for `EXTRA` only).
    pub fn extra_op(self) -> Option<ExtraOp> {
        ExtraOp::from_u8(self.a() as u8)
    }

    /// The `A` field.
    pub fn a(self) -> u32 {
        (self.0 >> A_SHIFT) & A_MAX
    }

    /// The `B` field.
    pub fn b(self) -> u32 {
        (self.0 >> B_SHIFT) & B_MAX
    }

    /// The `C` field.
    pub fn c(self) -> u32 {
        (self.0 >> C_SHIFT) & B_MAX
    }

    /// The `BC` field.
    pub fn bc(self) -> u32 {
        (self.0 >> B_SHIFT) & BC_MAX
    }

    /// The `ABC` field.
    pub fn abc_field(self) -> u32 {
        (self.0 >> A_SHIFT) & ABC_MAX
    }

    /// Jump offset relative to the following instruction.
    pub fn jump_offset(self) -> i32 {
        self.abc_field() as i32 - JUMP_BIAS
    }

    /// Absolute jump target for a `JUMP` located at `pc`.
    pub fn jump_target(self, pc: usize) -> usize {
        (pc as i64 + 1 + self.jump_offset() as i64) as usize
    }

    /// Decoded `LDINT` value.
    pub fn ldint_value(self) -> i32 {
        self.bc() as i32 - LDINT_BIAS
    }

    /// Returns a copy with the `A` field replaced.
    pub fn with_a(self, a: u32) -> Self {
        Instruction((self.0 & !(A_MAX << A_SHIFT)) | ((a & A_MAX) << A_SHIFT))
    }
}

/// Formats a regconst operand.
fn regconst(x: u32) -> String {
    if x >= REGCONST_LIMIT {
        format!("k{}", x - REGCONST_LIMIT)
    } else {
        format!("r{}", x)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.op();
        let (a, b, c) = (self.a(), self.b(), self.c());
        match op {
            OpCode::LdReg => write!(f, "LDREG r{}, r{}", a, self.bc()),
            OpCode::LdConst | OpCode::GetVar => {
                write!(f, "{} r{}, k{}", op.mnemonic(), a, self.bc())
            }
            OpCode::PutVar => write!(f, "PUTVAR r{}, k{}", a, self.bc()),
            OpCode::LdInt => write!(f, "LDINT r{}, {}", a, self.ldint_value()),
            OpCode::Closure => write!(f, "CLOSURE r{}, f{}", a, self.bc()),
            OpCode::DeclVar => write!(f, "DECLVAR {:#x}, {}, r{}", a, regconst(b), c),
            OpCode::DelVar => write!(f, "DELVAR r{}, {}", a, regconst(b)),
            OpCode::PutProp => write!(f, "PUTPROP r{}, {}, {}", a, regconst(b), regconst(c)),
            OpCode::DelProp => write!(f, "DELPROP r{}, r{}, {}", a, b, regconst(c)),
            OpCode::MPutObj | OpCode::MPutArr => {
                write!(f, "{} r{}, r{}, {}", op.mnemonic(), a, b, c)
            }
            OpCode::InitGet | OpCode::InitSet => write!(f, "{} r{}, r{}", op.mnemonic(), a, b),
            OpCode::CsReg => write!(f, "CSREG r{}, r{}", a, b),
            OpCode::CsVar => write!(f, "CSVAR r{}, {}", a, regconst(b)),
            OpCode::Call => write!(f, "CALL {:#x}, r{}, {}", a, b, c),
            OpCode::New => write!(f, "NEW r{}, {}", b, c),
            OpCode::Jump => write!(f, "JUMP {:+}", self.jump_offset()),
            OpCode::If => write!(f, "IF {}, {}", a, regconst(b)),
            OpCode::Return => write!(f, "RETURN {:#x}, {}", a, regconst(b)),
            OpCode::Label | OpCode::EndLabel | OpCode::Break | OpCode::Continue => {
                write!(f, "{} {}", op.mnemonic(), self.abc_field())
            }
            OpCode::TryCatch => write!(f, "TRYCATCH {:#x}, r{}, {}", a, b, regconst(c)),
            OpCode::Extra => match self.extra_op() {
                Some(ExtraOp::LdBool) => write!(f, "LDBOOL r{}, {}", b, c != 0),
                Some(
                    x @ (ExtraOp::LdThis
                    | ExtraOp::LdUndef
                    | ExtraOp::LdNull
                    | ExtraOp::NewObj
                    | ExtraOp::NewArr
                    | ExtraOp::EndFin),
                ) => write!(f, "{} r{}", x.mnemonic(), b),
                Some(ExtraOp::Throw) => write!(f, "THROW {}", regconst(b)),
                Some(
                    x @ (ExtraOp::Nop | ExtraOp::InvLhs | ExtraOp::EndTry | ExtraOp::EndCatch),
                ) => f.write_str(x.mnemonic()),
                Some(x @ (ExtraOp::SetALen | ExtraOp::InitEnum | ExtraOp::NextEnum)) => {
                    write!(f, "{} r{}, r{}", x.mnemonic(), b, c)
                }
                Some(x) => write!(f, "{} r{}, {}", x.mnemonic(), b, regconst(c)),
                None => write!(f, "EXTRA? {}, {}, {}", a, b, c),
            },
            OpCode::Invalid => write!(f, "INVALID {}", self.abc_field()),
            _ => write!(f, "{} r{}, {}, {}", op.mnemonic(), a, regconst(b), regconst(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        let ins = Instruction::a_b_c(OpCode::Add, 3, 260, 511);
        assert_eq!(ins.op(), OpCode::Add);
        assert_eq!(ins.a(), 3);
        assert_eq!(ins.b(), 260);
        assert_eq!(ins.c(), 511);
        assert_eq!(ins.0 & 0x3f, OpCode::Add as u32);
    }

    #[test]
    fn test_bc_and_ldint_bias() {
        let ins = Instruction::a_bc(OpCode::LdInt, 7, (-5 + LDINT_BIAS) as u32);
        assert_eq!(ins.a(), 7);
        assert_eq!(ins.ldint_value(), -5);
    }

    #[test]
    fn test_jump_encoding() {
        let forward = Instruction::jump(10, 20);
        assert_eq!(forward.jump_offset(), 9);
        assert_eq!(forward.jump_target(10), 20);

        let backward = Instruction::jump(10, 2);
        assert_eq!(backward.jump_offset(), -9);
        assert_eq!(backward.jump_target(10), 2);
    }

    #[test]
    fn test_opcode_numbering_is_dense() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(OpCode::from_u8(i as u8), Some(*op));
        }
        assert!(OpCode::ALL.len() <= 64);
        assert_eq!(OpCode::from_u8(63), None);
    }

    #[test]
    fn test_extra_op_numbering_is_dense() {
        for i in 0..=ExtraOp::EndFin as u8 {
            let op = ExtraOp::from_u8(i).expect("sub-op should decode");
            assert_eq!(op as u8, i);
        }
        assert_eq!(ExtraOp::from_u8(ExtraOp::EndFin as u8 + 1), None);
    }

    #[test]
    fn test_binary_ops() {
        assert!(OpCode::Add.is_binary());
        assert!(OpCode::In.is_binary());
        assert!(!OpCode::GetProp.is_binary());
        assert!(!OpCode::MPutObj.is_binary());
    }

    #[test]
    fn test_with_a_preserves_other_fields() {
        let ins = Instruction::a_b_c(OpCode::Call, 0, 4, 2).with_a(CALL_FLAG_TAILCALL);
        assert_eq!(ins.a(), CALL_FLAG_TAILCALL);
        assert_eq!(ins.b(), 4);
        assert_eq!(ins.c(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Instruction::a_b_c(OpCode::Add, 2, 0, 257).to_string(),
            "ADD r2, r0, k1"
        );
        assert_eq!(Instruction::extra(ExtraOp::LdUndef, 4, 0).to_string(), "LDUNDEF r4");
        assert_eq!(Instruction::jump(0, 3).to_string(), "JUMP +2");
        assert_eq!(Instruction::invalid().to_string(), "INVALID 0");
    }
}

//! Function templates: the immutable output of a compilation.
//!
//! A template is everything an executor needs to instantiate a closure:
//! bytecode, the constant pool, inner function templates (referenced by
//! `CLOSURE` through their index), the register frame size and a handful of
//! environment flags decided at compile time.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use super::bytecode::{Instruction, Reg};
use crate::runtime::value::number_to_string;

/// A constant pool entry.
#[derive(Debug, Clone)]
pub enum Constant {
    /// A number literal (or folded number expression)
    Number(f64),
    /// A string literal, identifier name or property key
    String(String),
}

impl Constant {
    /// SameValue comparison (E5 Section 9.12).
    ///
    /// `+0` and `-0` are distinct constants and `NaN` matches itself.
    pub fn same_value(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(s) => Some(s),
            Constant::Number(_) => None,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) if *n == 0.0 && n.is_sign_negative() => f.write_str("-0"),
            Constant::Number(n) => f.write_str(&number_to_string(*n)),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A compiled function, program or eval body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTemplate {
    /// Function name (`global`/`eval` for program code)
    pub name: Option<String>,
    /// Bytecode
    pub code: Vec<Instruction>,
    /// Constant pool, indexed by `K[x]` operands
    pub consts: Vec<Constant>,
    /// Inner function templates, indexed by `CLOSURE`
    pub funcs: Vec<Arc<FunctionTemplate>>,
    /// Register frame size
    pub nregs: u32,
    /// Number of formal arguments
    pub nargs: u32,
    /// Formal argument names, in declaration order
    pub formals: Vec<String>,
    /// Register-bound identifiers, kept only when a slow path lookup may need
    /// to find them at run time
    pub varmap: Option<BTreeMap<String, Reg>>,
    /// Source line for each instruction
    pub pc2line: Vec<u32>,
    /// Source file name given to the compiler
    pub filename: Option<String>,
    /// Strict mode code
    pub strict: bool,
    /// Calls create a fresh declarative environment
    pub newenv: bool,
    /// Calls create an `arguments` object
    pub createargs: bool,
    /// A named function expression binds its own name
    pub namebinding: bool,
    /// Function code (as opposed to global or eval code)
    pub is_function: bool,
}

impl FunctionTemplate {
    /// Returns the source line of the instruction at `pc`.
    pub fn line_for_pc(&self, pc: usize) -> Option<u32> {
        self.pc2line.get(pc).copied()
    }

    /// Renders a human readable listing, inner functions included.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.write_listing(&mut out, "");
        out
    }

    fn write_listing(&self, out: &mut String, path: &str) {
        let name = self.name.as_deref().unwrap_or("<anon>");
        let mut flags = Vec::new();
        if self.strict {
            flags.push("strict");
        }
        if self.newenv {
            flags.push("newenv");
        }
        if self.createargs {
            flags.push("createargs");
        }
        if self.namebinding {
            flags.push("namebinding");
        }

        let _ = writeln!(
            out,
            "function {}{} (nargs={}, nregs={}) [{}]",
            path,
            name,
            self.nargs,
            self.nregs,
            flags.join(" ")
        );
        if let Some(filename) = &self.filename {
            let _ = writeln!(out, "  file: {}", filename);
        }
        if !self.formals.is_empty() {
            let _ = writeln!(out, "  formals: {}", self.formals.join(", "));
        }
        if let Some(varmap) = &self.varmap {
            let entries: Vec<String> = varmap.iter().map(|(k, r)| format!("{}=r{}", k, r)).collect();
            let _ = writeln!(out, "  varmap: {}", entries.join(", "));
        }
        for (i, k) in self.consts.iter().enumerate() {
            let _ = writeln!(out, "  k{:<4} {}", i, k);
        }
        for (pc, ins) in self.code.iter().enumerate() {
            let line = self.line_for_pc(pc).unwrap_or(0);
            let _ = writeln!(out, "  {:04} [{:>4}]  {}", pc, line, ins);
        }
        for (i, inner) in self.funcs.iter().enumerate() {
            out.push('\n');
            inner.write_listing(out, &format!("{}f{}/", path, i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::OpCode;

    fn template() -> FunctionTemplate {
        FunctionTemplate {
            name: Some("global".into()),
            code: vec![Instruction::a_bc(OpCode::LdConst, 0, 0)],
            consts: vec![Constant::String("hi".into())],
            funcs: Vec::new(),
            nregs: 1,
            nargs: 0,
            formals: Vec::new(),
            varmap: None,
            pc2line: vec![3],
            filename: Some("test.js".into()),
            strict: true,
            newenv: false,
            createargs: false,
            namebinding: false,
            is_function: false,
        }
    }

    #[test]
    fn test_same_value_distinguishes_zeros() {
        assert!(!Constant::Number(0.0).same_value(&Constant::Number(-0.0)));
        assert!(Constant::Number(f64::NAN).same_value(&Constant::Number(f64::NAN)));
        assert!(Constant::Number(1.5).same_value(&Constant::Number(1.5)));
        assert!(!Constant::Number(1.0).same_value(&Constant::String("1".into())));
    }

    #[test]
    fn test_constant_display() {
        assert_eq!(Constant::Number(-0.0).to_string(), "-0");
        assert_eq!(Constant::Number(2.5).to_string(), "2.5");
        assert_eq!(Constant::String("a\"b".into()).to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_line_for_pc() {
        let t = template();
        assert_eq!(t.line_for_pc(0), Some(3));
        assert_eq!(t.line_for_pc(1), None);
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = template().disassemble();
        assert!(listing.starts_with("function global (nargs=0, nregs=1) [strict]"));
        assert!(listing.contains("file: test.js"));
        assert!(listing.contains("k0    \"hi\""));
        assert!(listing.contains("0000 [   3]  LDCONST r0, k0"));
    }
}

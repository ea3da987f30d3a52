//! Per-function compilation state and identifier resolution.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::labels::LabelInfo;
use crate::compiler::bytecode::{Instruction, Reg};
use crate::compiler::template::{Constant, FunctionTemplate};

/// What a hoisted declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `var name`
    Var,
    /// `function name() {}`, with the index of its template in `funcs`
    Func(u32),
}

/// A declaration found during the scanning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    /// Declared identifier
    pub name: String,
    /// Declaration kind
    pub kind: DeclKind,
}

/// Where an identifier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarBinding {
    /// Register bound: read and written directly.
    Reg(Reg),
    /// Looked up by name at run time; the payload is the name's constant index.
    Slow(u32),
}

/// State of the function currently being compiled.
///
/// A nested function literal gets a fresh `FuncState`; the parent is parked
/// while the child compiles and only learns the child's index in `funcs`.
#[derive(Debug, Default)]
pub struct FuncState {
    /// Emitted instructions
    pub code: Vec<Instruction>,
    /// Source line of each instruction in `code`
    pub lines: Vec<u32>,
    /// Constant pool
    pub consts: Vec<Constant>,
    /// Inner function templates
    pub funcs: Vec<Arc<FunctionTemplate>>,
    /// Declarations collected in pass 1, in source order
    pub decls: Vec<Decl>,
    /// Formal argument names
    pub argnames: Vec<String>,
    /// Identifier to register map; `None` marks a known but unbound name
    pub varmap: FxHashMap<String, Option<Reg>>,
    /// Active labels, innermost last
    pub labels: Vec<LabelInfo>,
    /// Function name
    pub name: Option<String>,

    pub is_function: bool,
    pub is_eval: bool,
    pub is_setget: bool,
    pub is_decl: bool,
    pub is_strict: bool,

    /// Still inside the directive prologue
    pub in_directive_prologue: bool,
    /// Pass 1: code is thrown away, declarations are recorded
    pub in_scanning: bool,
    /// A call to an identifier named `eval` was seen
    pub may_direct_eval: bool,
    /// The identifier `arguments` was referenced
    pub id_access_arguments: bool,
    /// Some identifier needed a slow path lookup
    pub id_access_slow: bool,
    /// A formal or function declaration named `arguments` exists
    pub is_arguments_shadowed: bool,

    /// Register receiving statement values (program and eval code only)
    pub reg_stmt_value: Option<Reg>,
    /// First temporary register; everything below is bound
    pub temp_first: Reg,
    /// Next free temporary
    pub temp_next: Reg,
    /// High-water mark of `temp_next`
    pub temp_max: Reg,

    /// Next label id
    pub label_next: u32,
    /// Number of enclosing `try` and `with` regions
    pub catch_depth: u32,
    /// Number of enclosing `with` statements
    pub with_depth: u32,

    // Per expression state, reset by `exprtop`
    pub nud_count: u32,
    pub led_count: u32,
    pub paren_level: u32,
    pub allow_in: bool,
}

impl FuncState {
    /// State for global (program) code.
    pub fn global(strict: bool) -> Self {
        Self {
            name: Some("global".to_string()),
            is_strict: strict,
            ..Self::default()
        }
    }

    /// State for eval code.
    pub fn eval(strict: bool) -> Self {
        Self {
            name: Some("eval".to_string()),
            is_eval: true,
            is_strict: strict,
            ..Self::default()
        }
    }

    /// State for a function body. Strictness is inherited from the parent.
    pub fn function(strict: bool, is_decl: bool, is_setget: bool) -> Self {
        Self {
            is_function: true,
            is_decl,
            is_setget,
            is_strict: strict,
            ..Self::default()
        }
    }

    /// Discards pass 1 output.
    ///
    /// Declarations and formals survive; inner functions are compiled again
    /// in the same order, so function numbers recorded in `decls` remain
    /// valid.
    pub fn reset_for_pass2(&mut self) {
        self.code.clear();
        self.lines.clear();
        self.consts.clear();
        self.funcs.clear();
        self.labels.clear();
        self.varmap.clear();
        self.temp_next = 0;
        self.temp_max = 0;
    }

    /// Returns true if `name` is `eval` or `arguments` and the code is strict.
    pub fn is_restricted_name(&self, name: &str) -> bool {
        self.is_strict && is_eval_or_arguments(name)
    }

    /// Resolves `name` to a bound register, if it has one at this point.
    ///
    /// Inside `with` every identifier goes through the slow path, and a
    /// catch binding masks a register binding of the same name with `None`.
    pub fn lookup_active_register_binding(&mut self, name: &str) -> Option<Reg> {
        if name == "arguments" {
            self.id_access_arguments = true;
        }

        let reg = if self.with_depth > 0 {
            None
        } else {
            self.varmap.get(name).copied().flatten()
        };

        if reg.is_none() {
            self.id_access_slow = true;
        }
        reg
    }
}

/// Returns true for the two names strict code may not bind.
pub fn is_eval_or_arguments(name: &str) -> bool {
    name == "eval" || name == "arguments"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_state_defaults() {
        let func = FuncState::global(false);
        assert!(!func.is_eval);
        assert!(!func.is_function);
        assert_eq!(func.name.as_deref(), Some("global"));
        assert_eq!(func.temp_next, 0);
    }

    #[test]
    fn test_register_binding_lookup() {
        let mut func = FuncState::function(false, false, false);
        func.varmap.insert("x".into(), Some(3));
        func.varmap.insert("y".into(), None);

        assert_eq!(func.lookup_active_register_binding("x"), Some(3));
        assert!(!func.id_access_slow);

        assert_eq!(func.lookup_active_register_binding("y"), None);
        assert!(func.id_access_slow);
    }

    #[test]
    fn test_with_forces_slow_path() {
        let mut func = FuncState::function(false, false, false);
        func.varmap.insert("x".into(), Some(0));
        func.with_depth = 1;
        assert_eq!(func.lookup_active_register_binding("x"), None);
        assert!(func.id_access_slow);
    }

    #[test]
    fn test_arguments_access_is_flagged() {
        let mut func = FuncState::function(false, false, false);
        func.lookup_active_register_binding("arguments");
        assert!(func.id_access_arguments);
    }

    #[test]
    fn test_reset_for_pass2_keeps_decls() {
        let mut func = FuncState::function(false, false, false);
        func.decls.push(Decl {
            name: "a".into(),
            kind: DeclKind::Var,
        });
        func.argnames.push("p".into());
        func.consts.push(Constant::Number(1.0));
        func.code.push(Instruction::invalid());
        func.lines.push(1);
        func.temp_max = 4;

        func.reset_for_pass2();

        assert_eq!(func.decls.len(), 1);
        assert_eq!(func.argnames, vec!["p".to_string()]);
        assert!(func.consts.is_empty());
        assert!(func.code.is_empty());
        assert_eq!(func.temp_max, 0);
    }

    #[test]
    fn test_restricted_names() {
        let strict = FuncState::function(true, false, false);
        assert!(strict.is_restricted_name("eval"));
        assert!(strict.is_restricted_name("arguments"));
        assert!(!strict.is_restricted_name("x"));

        let sloppy = FuncState::function(false, false, false);
        assert!(!sloppy.is_restricted_name("eval"));
    }
}

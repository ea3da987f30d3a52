//! Function bodies: the two-pass driver, the prologue, and template
//! assembly.
//!
//! A body is parsed twice from the same lexer checkpoint:
//!
//! 1. **Scanning**: code is emitted and thrown away. The pass records
//!    `var` and function declarations, strictness, and whether `eval` or
//!    `arguments` are referenced.
//! 2. **Emitting**: with the declarations known up front, formals and
//!    locals get fixed registers and the prologue declares everything
//!    else by name. The code of this pass is kept.
//!
//! Inner functions are compiled (both passes) wherever they appear, in
//! both passes of the parent. They come out in the same order each time,
//! so function numbers recorded by pass 1 remain valid.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{Compiler, FUNCTION_RECURSION_COST};
use super::scope::{DeclKind, FuncState, is_eval_or_arguments};
use crate::compiler::bytecode::{
    DECLVAR_FLAG_FUNC_DECL, DECLVAR_FLAG_UNDEF_VALUE, ExtraOp, OpCode, PROPDESC_FLAG_CONFIGURABLE,
    PROPDESC_FLAG_ENUMERABLE, PROPDESC_FLAG_WRITABLE, REGCONST_LIMIT, RETURN_FLAG_FAST,
    RETURN_FLAG_HAVE_RETVAL,
};
use crate::compiler::template::FunctionTemplate;
use crate::error::Result;
use crate::lexer::{Token, TokenKind, is_reserved_word, is_strict_reserved_word};
use crate::runtime::value::number_to_string;

/// Inner functions per function.
const MAX_FUNCS: usize = 256;

impl Compiler<'_> {
    // ========================================================================
    // Two-Pass Driver
    // ========================================================================

    /// Compiles the body of the current function.
    ///
    /// On entry the lexer is positioned right after the opening `{` (or at
    /// the start of the input for program and eval code); `curr_token` is
    /// ignored. On exit the terminator has been consumed.
    pub(super) fn parse_function_body(&mut self, expect_eof: bool, implicit_return: bool) -> Result<()> {
        self.recursion_increase(FUNCTION_RECURSION_COST)?;

        let lex_pt = self.lexer.checkpoint();

        // Pass 1
        trace!(name = ?self.func.name, "scanning pass");
        if implicit_return {
            self.func.reg_stmt_value = Some(self.alloctemp()?);
        }
        self.func.in_directive_prologue = true;
        self.func.in_scanning = true;
        self.func.may_direct_eval = false;
        self.func.id_access_arguments = false;
        self.func.id_access_slow = false;

        self.curr_token = Token::start_of_input();
        self.advance()?;
        self.parse_statements(true, expect_eof)?;

        // Pass 2
        trace!(name = ?self.func.name, decls = self.func.decls.len(), "emitting pass");
        self.lexer.rewind(lex_pt);
        self.curr_token = Token::start_of_input();
        self.advance()?;

        self.func.reset_for_pass2();
        self.func.in_directive_prologue = true;
        self.func.in_scanning = false;

        self.init_varmap_and_prologue(implicit_return)?;

        self.func.temp_first = self.gettemp();
        self.func.label_next = 0;
        self.func.id_access_arguments = false;
        self.func.id_access_slow = false;

        self.check_function_name()?;

        if let Some(reg) = self.func.reg_stmt_value {
            self.emit_extraop_b(ExtraOp::LdUndef, reg);
        }

        self.parse_statements(true, expect_eof)?;

        match self.func.reg_stmt_value {
            Some(reg) => self.emit_a_b(OpCode::Return, RETURN_FLAG_FAST | RETURN_FLAG_HAVE_RETVAL, reg),
            None => self.emit_a_b(OpCode::Return, RETURN_FLAG_FAST, 0),
        }

        self.peephole_optimize();
        self.recursion_decrease(FUNCTION_RECURSION_COST);
        Ok(())
    }

    /// The function's own name must be bindable; strictness may only be
    /// known after the body's directive prologue.
    fn check_function_name(&self) -> Result<()> {
        let func = &self.func;
        if !func.is_function || func.is_setget {
            return Ok(());
        }
        let Some(name) = &func.name else {
            return Ok(());
        };

        let invalid = if func.is_strict {
            is_eval_or_arguments(name) || is_strict_reserved_word(name) || is_reserved_word(name)
        } else {
            is_reserved_word(name)
        };
        if invalid {
            return Err(self.syntax_error("invalid function name"));
        }
        Ok(())
    }

    // ========================================================================
    // Prologue
    // ========================================================================

    /// Binds formals and declarations and emits the declaration prologue.
    ///
    /// In function code every declaration gets a register. Program and eval
    /// code declare their bindings by name with `DECLVAR`; eval bindings are
    /// configurable.
    fn init_varmap_and_prologue(&mut self, implicit_return: bool) -> Result<()> {
        let configurable_bindings = self.func.is_eval;
        let configurable_flag = if configurable_bindings {
            PROPDESC_FLAG_CONFIGURABLE
        } else {
            0
        };

        // Formals. A duplicate name in non-strict code binds the last one.
        let argnames = self.func.argnames.clone();
        for (i, name) in argnames.iter().enumerate() {
            if self.func.is_strict
                && (is_eval_or_arguments(name)
                    || is_strict_reserved_word(name)
                    || self.func.varmap.contains_key(name))
            {
                return Err(self.syntax_error("invalid arg name"));
            }
            self.func.varmap.insert(name.clone(), Some(i as u32));
        }
        self.settemp_checkmax(argnames.len() as u32);

        if implicit_return {
            self.func.reg_stmt_value = Some(self.alloctemp()?);
        }

        // Function declarations first: they win over `var` of the same name.
        let decls = self.func.decls.clone();
        for decl in &decls {
            let DeclKind::Func(fnum) = decl.kind else {
                continue;
            };

            if self.func.is_function {
                let reg = match self.func.varmap.get(&decl.name).copied().flatten() {
                    Some(reg) => reg,
                    None => {
                        let reg = self.alloctemp()?;
                        self.func.varmap.insert(decl.name.clone(), Some(reg));
                        reg
                    }
                };
                self.emit_a_bc(OpCode::Closure, reg, fnum);
            } else {
                let temp = self.gettemp();
                let reg_temp = self.alloctemp()?;
                let k = self.getconst_str(&decl.name)?;
                self.emit_a_bc(OpCode::Closure, reg_temp, fnum);
                let flags = PROPDESC_FLAG_WRITABLE
                    | PROPDESC_FLAG_ENUMERABLE
                    | configurable_flag
                    | DECLVAR_FLAG_FUNC_DECL;
                self.emit_a_b_c(OpCode::DeclVar, flags, k + REGCONST_LIMIT, reg_temp);
                self.settemp(temp);
                self.func.varmap.insert(decl.name.clone(), None);
            }
        }

        self.func.is_arguments_shadowed = self.func.varmap.contains_key("arguments");

        for decl in &decls {
            if decl.kind != DeclKind::Var {
                continue;
            }
            if self.func.varmap.contains_key(&decl.name) {
                continue;
            }
            // Reads of `arguments` go to the arguments object instead.
            if decl.name == "arguments" && !self.func.is_arguments_shadowed {
                continue;
            }

            if self.func.is_function {
                let reg = self.alloctemp()?;
                self.func.varmap.insert(decl.name.clone(), Some(reg));
            } else {
                let k = self.getconst_str(&decl.name)?;
                let flags = PROPDESC_FLAG_WRITABLE
                    | PROPDESC_FLAG_ENUMERABLE
                    | configurable_flag
                    | DECLVAR_FLAG_UNDEF_VALUE;
                self.emit_a_b_c(OpCode::DeclVar, flags, k + REGCONST_LIMIT, 0);
                self.func.varmap.insert(decl.name.clone(), None);
            }
        }

        trace!(
            nargs = argnames.len(),
            bound = self.func.varmap.values().filter(|r| r.is_some()).count(),
            "prologue"
        );
        Ok(())
    }

    // ========================================================================
    // Function Literals
    // ========================================================================

    /// Parses name, formals and body into the current (fresh) `FuncState`.
    /// `curr_token` is the token after `function` (or after `get`/`set`).
    pub(super) fn parse_function_like_raw(&mut self, is_decl: bool, is_setget: bool) -> Result<()> {
        if is_setget {
            let name = match &self.curr_token.kind {
                TokenKind::String(s) => s.clone(),
                TokenKind::Number(n) => number_to_string(*n),
                _ => match self.curr_token.identifier_name() {
                    Some(name) => name.to_string(),
                    None => return Err(self.syntax_error("invalid getter/setter name")),
                },
            };
            self.func.name = Some(name);
            self.advance()?;
        } else if let Some(name) = self.curr_token.identifier_name() {
            self.func.name = Some(name.to_string());
            self.advance()?;
        } else if is_decl {
            return Err(self.syntax_error("function name required"));
        }

        self.advance_expect(&TokenKind::LeftParen)?;

        let mut first = true;
        while self.curr_token.kind != TokenKind::RightParen {
            if !first {
                self.advance_expect(&TokenKind::Comma)?;
            }
            first = false;

            let TokenKind::Identifier(name) = &self.curr_token.kind else {
                return Err(self.syntax_error("expected identifier"));
            };
            self.func.argnames.push(name.clone());
            self.advance()?;
        }
        self.advance_expect(&TokenKind::RightParen)?;

        // The body lexes on from just after `{`.
        if self.curr_token.kind != TokenKind::LeftBrace {
            return Err(self.syntax_error("expected function body"));
        }
        self.parse_function_body(false, false)
    }

    /// Compiles a nested function literal and returns its index in the
    /// parent's `funcs`.
    pub(super) fn parse_function_like_fnum(&mut self, is_decl: bool, is_setget: bool) -> Result<u32> {
        let child = FuncState::function(self.func.is_strict, is_decl, is_setget);
        let parent = std::mem::replace(&mut self.func, child);

        let parsed = self.parse_function_like_raw(is_decl, is_setget);
        let template = parsed.map(|()| self.convert_to_template());
        self.func = parent;
        let template = template?;

        let fnum = self.func.funcs.len();
        if fnum >= MAX_FUNCS {
            return Err(self.internal_error("out of funcs"));
        }
        self.func.funcs.push(Arc::new(template));
        Ok(fnum as u32)
    }

    // ========================================================================
    // Template Assembly
    // ========================================================================

    /// Moves the finished function out of the compiler state.
    pub(super) fn convert_to_template(&mut self) -> FunctionTemplate {
        let func = std::mem::take(&mut self.func);

        // Names are needed at run time only if something can look them up.
        let keep_varmap = func.id_access_slow || func.may_direct_eval || !func.funcs.is_empty();
        let varmap = if keep_varmap {
            let map: BTreeMap<String, u32> = func
                .varmap
                .into_iter()
                .filter_map(|(name, reg)| reg.map(|reg| (name, reg)))
                .collect();
            (!map.is_empty()).then_some(map)
        } else {
            None
        };

        let newenv = func.is_function || (func.is_eval && func.is_strict);
        let createargs = func.is_function
            && !func.is_arguments_shadowed
            && (func.id_access_arguments || func.may_direct_eval);
        let namebinding = func.is_function && !func.is_decl && !func.is_setget && func.name.is_some();

        let template = FunctionTemplate {
            name: func.name,
            code: func.code,
            consts: func.consts,
            funcs: func.funcs,
            nregs: func.temp_max,
            nargs: func.argnames.len() as u32,
            formals: func.argnames,
            varmap,
            pc2line: func.lines,
            filename: self.filename.clone(),
            strict: func.is_strict,
            newenv,
            createargs,
            namebinding,
            is_function: func.is_function,
        };
        debug!(
            name = ?template.name,
            nregs = template.nregs,
            nargs = template.nargs,
            strict = template.strict,
            "function template"
        );
        template
    }
}

//! Single pass code generation from tokens to bytecode.
//!
//! There is no AST. The `Compiler` pulls tokens from the scanner one at a
//! time, keeping one token of lookahead (`curr_token`) and the token just
//! consumed (`prev_token`), and emits register bytecode as it goes. Every
//! function body is parsed twice; see [`function`] for the driver.
//!
//! # Module Structure
//!
//! - `scope`: per-function state (`FuncState`) and identifier resolution
//! - `alloc`: temporary registers and the constant pool
//! - `emitter`: instruction emission, jump patching, peephole pass
//! - `ivalue`: deferred intermediate values and their materialization
//! - `labels`: label sites, break and continue
//! - `expressions`: Pratt expression parser
//! - `statements`: statement parser and control flow lowering
//! - `function`: two-pass driver, prologue, template assembly

mod alloc;
mod emitter;
mod expressions;
mod function;
mod ivalue;
mod labels;
mod scope;
mod statements;

#[cfg(test)]
mod tests;

use tracing::debug;

use super::CompileOptions;
use super::template::FunctionTemplate;
use crate::error::{Error, Result};
use crate::lexer::{Scanner, Token, TokenKind};
use scope::FuncState;

/// Nesting units charged per `expr` level.
pub(super) const EXPR_RECURSION_COST: u32 = 1;
/// Nesting units charged per statement level.
pub(super) const STATEMENT_RECURSION_COST: u32 = 2;
/// Nesting units charged per function body.
pub(super) const FUNCTION_RECURSION_COST: u32 = 1;

/// Compiles `source` according to `options`.
pub(crate) fn compile(source: &str, options: &CompileOptions) -> Result<FunctionTemplate> {
    let mut compiler = Compiler::new(source, options);
    let template = compiler.compile_program(options)?;
    debug!(
        name = ?template.name,
        code = template.code.len(),
        consts = template.consts.len(),
        funcs = template.funcs.len(),
        "compiled template"
    );
    Ok(template)
}

/// Compiler context shared by all functions of one compilation.
pub(crate) struct Compiler<'src> {
    /// Token source
    lexer: Scanner<'src>,
    /// The token most recently consumed
    prev_token: Token,
    /// One token lookahead
    curr_token: Token,
    /// Lex the next token in division mode regardless of `curr_token`
    reject_regexp_in_adv: bool,
    recursion_depth: u32,
    recursion_limit: u32,
    filename: Option<String>,
    /// The function being compiled
    func: FuncState,
}

impl<'src> Compiler<'src> {
    /// Creates a compiler positioned at the start of `source`.
    pub(crate) fn new(source: &'src str, options: &CompileOptions) -> Self {
        Self {
            lexer: Scanner::new(source),
            prev_token: Token::start_of_input(),
            curr_token: Token::start_of_input(),
            reject_regexp_in_adv: false,
            recursion_depth: 0,
            recursion_limit: options.recursion_limit,
            filename: options.filename.clone(),
            func: FuncState::default(),
        }
    }

    // ========================================================================
    // Entry Point
    // ========================================================================

    /// Compiles the whole input as global code, eval code, or a single
    /// function expression.
    pub(crate) fn compile_program(&mut self, options: &CompileOptions) -> Result<FunctionTemplate> {
        if options.function_expression {
            // Function constructor form: anonymous unless named in the source
            self.func = FuncState::function(options.strict, false, false);
            self.advance()?;
            self.advance_expect(&TokenKind::Function)?;
            self.parse_function_like_raw(false, false)?;
            if self.curr_token.kind != TokenKind::Eof {
                return Err(self.syntax_error("unexpected token"));
            }
        } else {
            self.func = if options.eval {
                FuncState::eval(options.strict)
            } else {
                FuncState::global(options.strict)
            };
            self.parse_function_body(true, true)?;
        }

        Ok(self.convert_to_template())
    }

    // ========================================================================
    // Token Handling
    // ========================================================================

    /// Consumes `curr_token` and lexes the next one.
    pub(super) fn advance(&mut self) -> Result<()> {
        self.advance_helper(None)
    }

    /// Like [`Compiler::advance`], but `curr_token` must be `expect`.
    pub(super) fn advance_expect(&mut self, expect: &TokenKind) -> Result<()> {
        self.advance_helper(Some(expect))
    }

    fn advance_helper(&mut self, expect: Option<&TokenKind>) -> Result<()> {
        // A token that ends an operand makes a following '/' a division.
        let mut regexp = !self.curr_token.kind.rejects_regexp();
        if self.reject_regexp_in_adv {
            self.reject_regexp_in_adv = false;
            regexp = false;
        }

        if let Some(expect) = expect {
            if &self.curr_token.kind != expect {
                return Err(self.syntax_error(format!(
                    "parse error (expected {:?}, got {:?})",
                    expect, self.curr_token.kind
                )));
            }
        }

        let next = self.lexer.next_token(self.func.is_strict, regexp)?;
        self.prev_token = std::mem::replace(&mut self.curr_token, next);
        Ok(())
    }

    // ========================================================================
    // Errors and Recursion
    // ========================================================================

    /// A SyntaxError at the current token.
    pub(super) fn syntax_error(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, self.curr_token.line)
    }

    /// An InternalError (limit exceeded) at the current token.
    pub(super) fn internal_error(&self, message: impl Into<String>) -> Error {
        Error::internal(message, self.curr_token.line)
    }

    /// Charges `cost` units against the nesting limit. Statement levels
    /// charge more because their frames are larger.
    pub(super) fn recursion_increase(&mut self, cost: u32) -> Result<()> {
        if self.recursion_depth + cost > self.recursion_limit {
            return Err(self.internal_error("compiler recursion limit reached"));
        }
        self.recursion_depth += cost;
        Ok(())
    }

    pub(super) fn recursion_decrease(&mut self, cost: u32) {
        debug_assert!(self.recursion_depth >= cost);
        self.recursion_depth -= cost;
    }
}

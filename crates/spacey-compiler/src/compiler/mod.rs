//! Bytecode compiler for ECMAScript.
//!
//! Source text goes straight to register bytecode; there is no AST. The
//! result of a compilation is a [`FunctionTemplate`] tree.
//!
//! # Module Structure
//!
//! - `bytecode`: instruction encoding, opcodes and flags
//! - `codegen`: the two-pass parser and code generator
//! - `template`: compiled function templates
//!
//! # Example
//!
//! ```rust
//! use spacey_compiler::compiler::{CompileOptions, compile};
//!
//! let template = compile("var x = 1 + 2; x;", &CompileOptions::default()).unwrap();
//! assert_eq!(template.name.as_deref(), Some("global"));
//! println!("{}", template.disassemble());
//! ```

pub mod bytecode;
mod codegen;
pub mod template;

pub use bytecode::{ExtraOp, Instruction, OpCode, Reg};
pub use template::{Constant, FunctionTemplate};

use crate::error::Result;

/// Default nesting limit, in units: one per expression level or function
/// body, two per statement level. Sized to fit a 2 MiB thread stack in
/// unoptimized builds.
pub const DEFAULT_RECURSION_LIMIT: u32 = 200;

/// How a source text should be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Start in strict mode (a `"use strict"` directive can also turn it on)
    pub strict: bool,
    /// Compile as eval code rather than global code
    pub eval: bool,
    /// The source is a single `function (...) { ... }` expression
    pub function_expression: bool,
    /// Maximum parser nesting depth
    pub recursion_limit: u32,
    /// Source name recorded in every template
    pub filename: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            eval: false,
            function_expression: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            filename: None,
        }
    }
}

impl CompileOptions {
    /// Options for global code.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`CompileOptions::strict`].
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets [`CompileOptions::eval`].
    pub fn with_eval(mut self, eval: bool) -> Self {
        self.eval = eval;
        self
    }

    /// Sets [`CompileOptions::function_expression`].
    pub fn with_function_expression(mut self, function_expression: bool) -> Self {
        self.function_expression = function_expression;
        self
    }

    /// Sets the parser nesting limit.
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Records a source name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Compiles `source` into a function template.
///
/// Errors abort the compilation; nothing partial is returned.
pub fn compile(source: &str, options: &CompileOptions) -> Result<FunctionTemplate> {
    codegen::compile(source, options)
}

/// Compiles independent sources with the same options.
///
/// With the `parallel` feature the sources are distributed over the rayon
/// thread pool; each compilation is still single-threaded. Results keep
/// the order of `sources`.
pub fn compile_many<S>(sources: &[S], options: &CompileOptions) -> Vec<Result<FunctionTemplate>>
where
    S: AsRef<str> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        sources.par_iter().map(|src| compile(src.as_ref(), options)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        sources.iter().map(|src| compile(src.as_ref(), options)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompileOptions::default();
        assert!(!options.strict);
        assert!(!options.eval);
        assert!(!options.function_expression);
        assert_eq!(options.recursion_limit, DEFAULT_RECURSION_LIMIT);
        assert_eq!(options.filename, None);
    }

    #[test]
    fn test_option_builders() {
        let options = CompileOptions::new()
            .with_strict(true)
            .with_eval(true)
            .with_recursion_limit(10)
            .with_filename("a.js");
        assert!(options.strict);
        assert!(options.eval);
        assert_eq!(options.recursion_limit, 10);
        assert_eq!(options.filename.as_deref(), Some("a.js"));
    }

    #[test]
    fn test_compile_many_keeps_order() {
        let sources = ["1;", "var;", "function f() {}"];
        let results = compile_many(&sources, &CompileOptions::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        let third = results[2].as_ref().expect("third source should compile");
        assert_eq!(third.funcs.len(), 1);
    }
}

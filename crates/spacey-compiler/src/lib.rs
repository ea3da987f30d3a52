// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-compiler
//!
//! An ECMAScript 5 front end that compiles source text directly to
//! register bytecode, with no intermediate AST.
//!
//! ## Overview
//!
//! - A lexer producing one token of lookahead with line tracking
//! - A two-pass Pratt parser that emits code as it parses; the first pass
//!   discovers declarations and scoping facts, the second emits final code
//! - [`FunctionTemplate`]s holding code, constants, inner functions and
//!   the metadata the runtime needs
//! - A small reference [`Interpreter`] that executes templates
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_compiler::{CompileOptions, Interpreter, Value, compile};
//!
//! let template = compile("var x = 40; x + 2;", &CompileOptions::default()).unwrap();
//! println!("{}", template.disassemble());
//!
//! let mut interp = Interpreter::new();
//! let result = interp.run(&template).unwrap();
//! assert!(matches!(result, Value::Number(n) if n == 42.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod runtime;
pub mod vm;

pub use compiler::{CompileOptions, FunctionTemplate, compile, compile_many};
pub use error::{Error, Result};
pub use runtime::Value;
pub use vm::Interpreter;

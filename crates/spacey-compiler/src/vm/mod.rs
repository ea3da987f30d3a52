//! Reference interpreter for compiled templates.
//!
//! Executes [`FunctionTemplate`](crate::compiler::FunctionTemplate)s
//! produced by the compiler so that generated code can be checked end to
//! end.
//!
//! ## Structure
//!
//! - `interpreter` - dispatch loop, calls and operators
//! - `variables` - identifier access through the scope chain
//! - `property` - property access, `for-in` and object conversion
//! - `unwind` - labels, `try` regions and `with` bodies
//! - `comparison` - equality and relational comparison

mod interpreter;
mod property;
mod unwind;
mod variables;

pub mod comparison;

pub use interpreter::{DEFAULT_CALL_DEPTH_LIMIT, Interpreter};

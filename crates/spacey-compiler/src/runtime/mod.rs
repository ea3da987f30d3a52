//! Runtime data model of the reference interpreter.

pub mod context;
pub mod environment;
pub mod function;
pub mod object;
pub mod value;

pub use context::Realm;
pub use function::{CallFrame, Catcher};
pub use value::Value;

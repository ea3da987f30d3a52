//! Lexical analysis (tokenization) for ES5 source code.
//!
//! The lexer is pulled one token at a time by the compiler. Two inputs
//! change how the next token is read:
//!
//! - **strictness**: `implements`, `let`, `yield` and friends become reserved
//!   words, legacy octal literals and escapes are rejected
//! - **regexp mode**: whether a leading `/` starts a regular expression
//!   literal or is a division operator
//!
//! ## Structure
//!
//! - `scanner.rs` - `Scanner` with checkpoint/rewind support
//! - `token.rs` - `Token` and `TokenKind` definitions, reserved word tables
//!
//! ## Usage
//!
//! ```rust
//! use spacey_compiler::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("var x = 42;");
//!
//! loop {
//!     let token = scanner.next_token(false, true).unwrap();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::{LexerPoint, Scanner, tokenize};
pub use token::{Span, Token, TokenKind, is_reserved_word, is_strict_reserved_word};

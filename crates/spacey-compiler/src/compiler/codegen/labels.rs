//! Label sites, `break` and `continue`.
//!
//! Every iteration statement, `switch`, and explicitly labelled statement
//! owns a *label site*: `LABEL id` followed by a break jump slot and a
//! continue jump slot. The statement patches the slots once it knows its
//! exit and continue points.
//!
//! A `break`/`continue` whose target is at the same catch depth compiles
//! to a direct `JUMP` into the target's slot (the peephole pass then
//! shortens the chain). Crossing a `try` or `with` boundary requires run
//! time unwinding, so those compile to `BREAK id` / `CONTINUE id`.

use tracing::trace;

use super::Compiler;
use crate::compiler::bytecode::OpCode;
use crate::error::Result;
use crate::lexer::TokenKind;

/// The label accepts `break`.
pub const LABEL_FLAG_ALLOW_BREAK: u32 = 1 << 0;
/// The label accepts `continue` (iteration statements only).
pub const LABEL_FLAG_ALLOW_CONTINUE: u32 = 1 << 1;

/// An active label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    /// Label name; empty for the implicit label of loops and `switch`
    pub name: String,
    /// Label site id, shared by all labels of one statement
    pub id: u32,
    /// pc of the `LABEL` instruction
    pub pc_label: usize,
    /// Catch depth where the label was declared
    pub catch_depth: u32,
    pub flags: u32,
}

/// Result of resolving a `break` or `continue` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelTarget {
    pub id: u32,
    pub pc_label: usize,
    pub catch_depth: u32,
}

impl Compiler<'_> {
    /// Pushes a label. Non-empty labels may not shadow an active label.
    pub(super) fn add_label(&mut self, name: &str, pc_label: usize, id: u32) -> Result<()> {
        if !name.is_empty() && self.func.labels.iter().any(|l| l.name == name) {
            return Err(self.syntax_error("duplicate (non-empty) label"));
        }

        let label = LabelInfo {
            name: name.to_string(),
            id,
            pc_label,
            catch_depth: self.func.catch_depth,
            flags: LABEL_FLAG_ALLOW_BREAK,
        };
        trace!(?label, "add label");
        self.func.labels.push(label);
        Ok(())
    }

    /// Sets `flags` on the topmost labels with id `id`.
    pub(super) fn update_label_flags(&mut self, id: u32, flags: u32) {
        for label in self.func.labels.iter_mut().rev() {
            if label.id != id {
                break;
            }
            label.flags = flags;
        }
    }

    /// Finds the target of a `break` (any label) or `continue` (iteration
    /// labels only), innermost first.
    pub(super) fn lookup_active_label(&self, name: &str, is_break: bool) -> Result<LabelTarget> {
        for label in self.func.labels.iter().rev() {
            if label.name != name {
                continue;
            }
            if is_break || label.flags & LABEL_FLAG_ALLOW_CONTINUE != 0 {
                return Ok(LabelTarget {
                    id: label.id,
                    pc_label: label.pc_label,
                    catch_depth: label.catch_depth,
                });
            }
            // An empty label may be a switch nested in a loop; keep looking.
            if !name.is_empty() {
                return Err(self.syntax_error("continue label matches an invalid statement type"));
            }
        }
        Err(self.syntax_error("cannot resolve label"))
    }

    pub(super) fn reset_labels(&mut self, len: usize) {
        self.func.labels.truncate(len);
    }

    /// Emits a label site unless the statement already has one.
    pub(super) fn stmt_label_site(&mut self, label_id: Option<u32>) -> u32 {
        if let Some(id) = label_id {
            return id;
        }
        let id = self.func.label_next;
        self.func.label_next += 1;
        self.emit_abc(OpCode::Label, id);
        self.emit_invalid();
        self.emit_invalid();
        id
    }

    /// `break` / `continue` with an optional label. `curr_token` is the keyword.
    pub(super) fn parse_break_or_continue(&mut self) -> Result<()> {
        let is_break = self.curr_token.kind == TokenKind::Break;
        self.advance()?;

        let target = if self.curr_token.kind == TokenKind::Semicolon
            || self.curr_token.lineterm
            || self.curr_token.allow_auto_semi
        {
            self.lookup_active_label("", is_break)?
        } else if let TokenKind::Identifier(name) = &self.curr_token.kind {
            let name = name.clone();
            let target = self.lookup_active_label(&name, is_break)?;
            self.advance()?;
            target
        } else {
            return Err(self.syntax_error("invalid break/continue label"));
        };

        if target.catch_depth == self.func.catch_depth {
            let slot = target.pc_label + if is_break { 1 } else { 2 };
            trace!(is_break, id = target.id, slot, "fast break/continue");
            self.emit_jump(slot);
        } else {
            trace!(is_break, id = target.id, "slow break/continue");
            let op = if is_break { OpCode::Break } else { OpCode::Continue };
            self.emit_abc(op, target.id);
        }
        Ok(())
    }
}

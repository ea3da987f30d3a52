//! Catcher stack handling: labels, `try` regions and `with` bodies.
//!
//! A guarded region owns two registers. When control enters a catch or
//! finally clause, `R[reg]` holds the completion value and `R[reg + 1]`
//! its type; `ENDFIN` resumes whatever completion is recorded there.
//! `TRYCATCH` at `pc` is followed by a jump to the catch clause
//! (`pc + 1`) and a jump to the finally clause or the statement end
//! (`pc + 2`).

use tracing::trace;

use crate::compiler::bytecode::{TRYCATCH_FLAG_HAVE_FINALLY, TRYCATCH_FLAG_WITH_BINDING};
use crate::error::{Error, Result};
use crate::runtime::environment::Environment;
use crate::runtime::{CallFrame, Catcher, Value};

/// Completion types stored in `R[reg + 1]`.
pub(super) const COMPLETION_NORMAL: f64 = 0.0;
pub(super) const COMPLETION_THROW: f64 = 1.0;
pub(super) const COMPLETION_RETURN: f64 = 2.0;
pub(super) const COMPLETION_BREAK: f64 = 3.0;
pub(super) const COMPLETION_CONTINUE: f64 = 4.0;

/// What `ENDFIN` resumes.
pub(super) enum Resume {
    Next,
    Throw(Value),
    Return(Value),
    Break(u32),
    Continue(u32),
}

fn internal(frame: &CallFrame, message: &str) -> Error {
    Error::internal(message, frame.current_line().unwrap_or(0))
}

/// Clears the catch and finally entries of the topmost catcher.
fn disable_top(frame: &mut CallFrame) {
    if let Some(Catcher::TryCatch {
        catch_enabled,
        finally_enabled,
        ..
    }) = frame.catchers.last_mut()
    {
        *catch_enabled = false;
        *finally_enabled = false;
    }
}

/// Enters the finally clause of the topmost catcher with a completion.
fn enter_finally(frame: &mut CallFrame, value: Value, completion: f64) {
    let Some(Catcher::TryCatch { pc, reg, env, .. }) = frame.catchers.last().cloned() else {
        return;
    };
    disable_top(frame);
    frame.env = env;
    frame.set_reg(reg, value);
    frame.set_reg(reg + 1, Value::Number(completion));
    frame.pc = pc + 2;
}

/// Pops the topmost catcher, restoring the environment of a region.
fn pop_catcher(frame: &mut CallFrame) {
    if let Some(Catcher::TryCatch { env, .. }) = frame.catchers.pop() {
        frame.env = env;
    }
}

/// Routes a thrown value to the innermost catch or finally clause of the
/// frame. Returns false if the frame has none left.
pub(super) fn handle_throw(frame: &mut CallFrame, value: Value) -> bool {
    while let Some(top) = frame.catchers.last().cloned() {
        let Catcher::TryCatch {
            pc,
            flags,
            reg,
            catch_enabled,
            finally_enabled,
            catch_name,
            env,
        } = top
        else {
            frame.catchers.pop();
            continue;
        };

        if flags & TRYCATCH_FLAG_WITH_BINDING == 0 && catch_enabled {
            trace!(pc, "enter catch");
            if let Some(Catcher::TryCatch { catch_enabled, .. }) = frame.catchers.last_mut() {
                *catch_enabled = false;
            }
            frame.env = match catch_name {
                Some(name) => {
                    let catch_env = Environment::declarative(Some(env));
                    catch_env.declare(&name, Value::Undefined, true, false);
                    catch_env
                }
                None => env,
            };
            frame.set_reg(reg, value);
            frame.set_reg(reg + 1, Value::Number(COMPLETION_THROW));
            frame.pc = pc + 1;
            return true;
        }
        if flags & TRYCATCH_FLAG_WITH_BINDING == 0 && finally_enabled {
            trace!(pc, "enter finally on throw");
            enter_finally(frame, value, COMPLETION_THROW);
            return true;
        }
        pop_catcher(frame);
    }
    false
}

/// Runs pending finally clauses for a `return`. Returns the value once
/// nothing intercepts it.
pub(super) fn unwind_return(frame: &mut CallFrame, value: Value) -> Option<Value> {
    while let Some(top) = frame.catchers.last() {
        if let Catcher::TryCatch {
            finally_enabled: true, ..
        } = top
        {
            enter_finally(frame, value, COMPLETION_RETURN);
            return None;
        }
        pop_catcher(frame);
    }
    Some(value)
}

/// Transfers control to the break (or continue) slot of label site `id`,
/// running finally clauses on the way.
pub(super) fn unwind_label(frame: &mut CallFrame, id: u32, is_continue: bool) -> Result<()> {
    loop {
        match frame.catchers.last() {
            None => return Err(internal(frame, "break target not found")),
            Some(Catcher::Label { id: label_id, pc_label }) if *label_id == id => {
                frame.pc = pc_label + if is_continue { 2 } else { 1 };
                return Ok(());
            }
            Some(Catcher::TryCatch {
                finally_enabled: true, ..
            }) => {
                let completion = if is_continue {
                    COMPLETION_CONTINUE
                } else {
                    COMPLETION_BREAK
                };
                enter_finally(frame, Value::Number(id as f64), completion);
                return Ok(());
            }
            Some(_) => pop_catcher(frame),
        }
    }
}

/// `LABEL id`. An entry for the same site left behind by a direct jump
/// is dropped first.
pub(super) fn enter_label(frame: &mut CallFrame, id: u32, pc_label: usize) {
    end_label(frame, id);
    frame.catchers.push(Catcher::Label { id, pc_label });
}

/// `ENDLABEL id`: drops the label and anything still above it.
pub(super) fn end_label(frame: &mut CallFrame, id: u32) {
    let found = frame
        .catchers
        .iter()
        .rposition(|c| matches!(c, Catcher::Label { id: label_id, .. } if *label_id == id));
    if let Some(pos) = found {
        frame.catchers.truncate(pos);
    }
}

/// Drops labels above the innermost guarded region.
fn pop_labels(frame: &mut CallFrame) {
    while let Some(Catcher::Label { .. }) = frame.catchers.last() {
        frame.catchers.pop();
    }
}

/// `ENDTRY` / `ENDCATCH`: leaves the protected block or the catch clause.
/// With a finally clause pending, control enters it with a normal
/// completion; otherwise the region ends.
pub(super) fn leave_guarded(frame: &mut CallFrame) -> Result<()> {
    pop_labels(frame);
    let Some(Catcher::TryCatch {
        pc,
        flags,
        finally_enabled,
        env,
        ..
    }) = frame.catchers.last().cloned()
    else {
        return Err(internal(frame, "no guarded region to leave"));
    };

    if flags & TRYCATCH_FLAG_HAVE_FINALLY != 0 && finally_enabled {
        enter_finally(frame, Value::Undefined, COMPLETION_NORMAL);
    } else {
        frame.catchers.pop();
        frame.env = env;
        frame.pc = pc + 2;
    }
    Ok(())
}

/// `ENDFIN reg`: closes the region and reports the completion to resume.
pub(super) fn end_finally(frame: &mut CallFrame, reg: u32) -> Result<Resume> {
    pop_labels(frame);
    if !matches!(frame.catchers.last(), Some(Catcher::TryCatch { .. })) {
        return Err(internal(frame, "no guarded region to finish"));
    }
    pop_catcher(frame);

    let value = frame.reg(reg);
    let completion = frame.reg(reg + 1).to_number();
    let resume = if completion == COMPLETION_THROW {
        Resume::Throw(value)
    } else if completion == COMPLETION_RETURN {
        Resume::Return(value)
    } else if completion == COMPLETION_BREAK {
        Resume::Break(value.to_uint32())
    } else if completion == COMPLETION_CONTINUE {
        Resume::Continue(value.to_uint32())
    } else {
        Resume::Next
    };
    Ok(resume)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compiler::{CompileOptions, compile};

    fn frame() -> CallFrame {
        let template = Arc::new(compile("", &CompileOptions::default()).unwrap());
        let registers = CallFrame::new_registers(8);
        CallFrame::new(template, registers, Environment::declarative(None), Value::Undefined)
    }

    fn push_try(frame: &mut CallFrame, pc: usize, flags: u32, catch: bool, finally: bool) {
        frame.catchers.push(Catcher::TryCatch {
            pc,
            flags,
            reg: 2,
            catch_enabled: catch,
            finally_enabled: finally,
            catch_name: Some("e".into()),
            env: frame.env.clone(),
        });
    }

    #[test]
    fn test_throw_enters_catch_then_finally() {
        let mut frame = frame();
        push_try(&mut frame, 10, TRYCATCH_FLAG_HAVE_FINALLY | 1, true, true);

        assert!(handle_throw(&mut frame, Value::Number(1.0)));
        assert_eq!(frame.pc, 11);
        assert!(frame.env.has_binding("e"));

        // A second throw, from inside the catch clause, goes to finally.
        assert!(handle_throw(&mut frame, Value::Number(2.0)));
        assert_eq!(frame.pc, 12);
        assert!(!frame.env.has_binding("e"));
        assert_eq!(frame.reg(3).to_number(), COMPLETION_THROW);

        // Nothing left to catch a third one.
        assert!(!handle_throw(&mut frame, Value::Null));
        assert!(frame.catchers.is_empty());
    }

    #[test]
    fn test_label_reentry_drops_stale_entry() {
        let mut frame = frame();
        enter_label(&mut frame, 0, 1);
        enter_label(&mut frame, 1, 5);
        enter_label(&mut frame, 1, 5);
        assert_eq!(frame.catchers.len(), 2);

        end_label(&mut frame, 0);
        assert!(frame.catchers.is_empty());
    }

    #[test]
    fn test_break_runs_finally() {
        let mut frame = frame();
        enter_label(&mut frame, 3, 4);
        push_try(&mut frame, 20, TRYCATCH_FLAG_HAVE_FINALLY, false, true);

        unwind_label(&mut frame, 3, false).unwrap();
        assert_eq!(frame.pc, 22);

        match end_finally(&mut frame, 2).unwrap() {
            Resume::Break(id) => assert_eq!(id, 3),
            _ => panic!("expected a break completion"),
        }
        unwind_label(&mut frame, 3, false).unwrap();
        assert_eq!(frame.pc, 5);
    }

    #[test]
    fn test_return_without_finally() {
        let mut frame = frame();
        enter_label(&mut frame, 0, 0);
        push_try(&mut frame, 3, 1, true, false);
        let value = unwind_return(&mut frame, Value::Boolean(true));
        assert!(matches!(value, Some(Value::Boolean(true))));
        assert!(frame.catchers.is_empty());
    }

    #[test]
    fn test_missing_label_is_internal_error() {
        let mut frame = frame();
        let err = unwind_label(&mut frame, 9, true).unwrap_err();
        assert!(err.is_internal_error());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL: compiles each entry, runs it on a persistent
//! interpreter and prints the completion value.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use spacey_compiler::{CompileOptions, Interpreter, Value, compile};

use crate::print_error;

const HISTORY_FILE: &str = ".spacey_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// ES5 keywords and the literals worth completing.
const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "finally",
    "for",
    "function",
    "if",
    "in",
    "instanceof",
    "new",
    "return",
    "switch",
    "this",
    "throw",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
];

const LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity"];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Strict,
    Dis,
    Load,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let cmd = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "strict" => ReplCommand::Strict,
            "dis" => ReplCommand::Dis,
            "load" | "l" => ReplCommand::Load,
            _ => return None,
        };
        Some((cmd, arg))
    }

    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".strict", "Toggle strict mode compilation"),
            (".dis <code>", "Print the bytecode of a snippet"),
            (".load <file>", "Compile and run a file"),
        ]
    }
}

#[derive(Default)]
struct SpaceyHelper;

fn word_start(line: &str) -> usize {
    line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '$')
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn candidates(word: &str) -> impl Iterator<Item = &'static str> + '_ {
    KEYWORDS
        .iter()
        .chain(LITERALS)
        .chain(std::iter::once(&"print"))
        .copied()
        .filter(move |kw| kw.starts_with(word) && kw.len() > word.len())
}

impl Completer for SpaceyHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(&line[..pos]);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }
        let matches = candidates(word)
            .map(|kw| Pair {
                display: kw.to_string(),
                replacement: kw[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for SpaceyHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }
        candidates(word)
            .next()
            .map(|kw| kw[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for SpaceyHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                result.push_str(&highlight_word(&word));
                word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~' => c.cyan().to_string(),
                '"' | '\'' => c.green().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }
        if !word.is_empty() {
            result.push_str(&highlight_word(&word));
        }
        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if word.starts_with(|c: char| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for SpaceyHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if input.trim_start().starts_with('.') {
            return Ok(ValidationResult::Valid(None));
        }
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }
        let continues = input
            .trim_end()
            .ends_with(['\\', '+', '-', '*', '/', '=', ',', '{', '(', '[']);
        Ok(if continues {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Valid(None)
        })
    }
}

/// Check if brackets, braces, and parentheses are balanced. A stray
/// closer counts as balanced so the compiler reports it.
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }
        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    if stack.pop() != Some(c) {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

impl Helper for SpaceyHelper {}

enum CommandResult {
    Continue,
    Exit,
}

/// The interactive REPL.
pub struct Repl {
    interp: Interpreter,
    strict: bool,
    editor: Editor<SpaceyHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new() -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(SpaceyHelper));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spacey")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        let mut interp = Interpreter::new();
        interp.set_echo(true);

        Ok(Self {
            interp,
            strict: false,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "spacey>".bright_green().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }
                    self.eval_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        Ok(())
    }

    fn options(&self) -> CompileOptions {
        CompileOptions::new().with_strict(self.strict)
    }

    fn print_banner(&self) {
        println!(
            "  {} {}{}",
            "Spacey ES5 compiler".white().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!("  {} {} {}", "Type".dimmed(), ".help".cyan(), "for available commands".dimmed());
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => {
                println!();
                for (cmd, desc) in ReplCommand::all_commands() {
                    println!("  {:16} {}", cmd.cyan(), desc.dimmed());
                }
                println!();
            }
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Strict => {
                self.strict = !self.strict;
                let state = if self.strict { "on" } else { "off" };
                println!("{} {}", "strict mode".dimmed(), state.yellow());
            }
            ReplCommand::Dis => match arg {
                Some(code) => match compile(code, &self.options()) {
                    Ok(template) => print!("{}", template.disassemble()),
                    Err(e) => print_error(&e),
                },
                None => missing_argument(".dis", "requires code"),
            },
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)),
                None => missing_argument(".load", "requires a file path"),
            },
        }
        CommandResult::Continue
    }

    fn load_file(&mut self, path: &Path) {
        match std::fs::read_to_string(path) {
            Ok(source) => self.eval_and_print(&source),
            Err(e) => print_error(&e.into()),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        let options = self.options();
        match self.interp.eval_with(input, &options) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }
}

fn missing_argument(cmd: &str, what: &str) {
    eprintln!("{}: {} {}", "Error".red().bold(), cmd.cyan(), what.dimmed());
}

/// Format a value for display with syntax coloring
fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Boolean(b) => b.to_string().yellow().to_string(),
        Value::Number(_) => value.to_js_string().yellow().to_string(),
        Value::String(s) => format!("'{}'", s).green().to_string(),
        Value::Object(_) if value.is_callable() => value.to_js_string().magenta().to_string(),
        Value::Object(_) => value.to_js_string().cyan().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(ReplCommand::parse(".help"), Some((ReplCommand::Help, None))));
        assert!(matches!(ReplCommand::parse(".q"), Some((ReplCommand::Exit, None))));
        assert!(matches!(
            ReplCommand::parse(".dis var x = 1;"),
            Some((ReplCommand::Dis, Some("var x = 1;")))
        ));
        assert!(matches!(
            ReplCommand::parse(".load test.js"),
            Some((ReplCommand::Load, Some("test.js")))
        ));
        assert!(ReplCommand::parse(".unknown").is_none());
        assert!(ReplCommand::parse("not a command").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("var o = { a: [1] };"));
        assert!(!is_balanced("function f() { return 1;"));
        assert!(!is_balanced("[1, 2"));
        assert!(is_balanced("'string with (unbalanced'"));
        assert!(is_balanced("a)"));
    }

    #[test]
    fn test_candidates() {
        assert_eq!(candidates("ty").collect::<Vec<_>>(), ["typeof"]);
        assert!(candidates("pri").any(|c| c == "print"));
        assert_eq!(candidates("var").count(), 0);
    }

    #[test]
    fn test_format_value_numbers_use_js_form() {
        let text = format_value(&Value::Number(1e21));
        assert!(text.contains("1e+21"));
    }
}

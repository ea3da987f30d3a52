// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Spacey - an ECMAScript 5 bytecode compiler
//!
//! Compiles a file or a code string and prints the disassembled function
//! templates, or runs them on the reference interpreter. Without input it
//! starts the interactive REPL.

mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use owo_colors::OwoColorize;
use spacey_compiler::{CompileOptions, Error, FunctionTemplate, Interpreter, compile};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "spacey", version, about = "ECMAScript 5 to register bytecode compiler")]
struct Cli {
    /// Source file to compile
    file: Option<PathBuf>,

    /// Compile a code string instead of a file
    #[arg(short = 'e', long = "eval", value_name = "CODE", conflicts_with = "file")]
    code: Option<String>,

    /// Compile in strict mode
    #[arg(long)]
    strict: bool,

    /// Compile as eval code
    #[arg(long = "eval-code", conflicts_with = "function")]
    eval_code: bool,

    /// The source is a single function expression
    #[arg(long)]
    function: bool,

    /// Execute the program instead of printing its bytecode
    #[arg(long)]
    run: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn compile_options(&self) -> CompileOptions {
        let options = CompileOptions::new()
            .with_strict(self.strict)
            .with_eval(self.eval_code)
            .with_function_expression(self.function);
        match &self.file {
            Some(path) => options.with_filename(path.display().to_string()),
            None => options,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "spacey_compiler=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.file.is_none() && cli.code.is_none() {
        return run_repl();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<Error>() {
                Some(err) => print_error(err),
                None => eprintln!("{}: {:#}", "Error".red().bold(), err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = match (&cli.code, &cli.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?,
        (None, None) => anyhow::bail!("no input"),
    };

    let options = cli.compile_options();
    debug!(?options, bytes = source.len(), "compiling");
    let template = compile(&source, &options)?;

    if cli.run {
        execute(&template)?;
    } else {
        print!("{}", template.disassemble());
    }
    Ok(())
}

fn execute(template: &FunctionTemplate) -> spacey_compiler::Result<()> {
    let mut interp = Interpreter::new();
    interp.set_echo(true);
    let value = interp.run(template)?;
    if !value.is_undefined() {
        println!("{}", value);
    }
    Ok(())
}

/// Start the interactive REPL
fn run_repl() -> ExitCode {
    match repl::Repl::new() {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: Failed to initialize REPL: {:?}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Prints an error with its kind highlighted.
pub(crate) fn print_error(error: &Error) {
    let text = error.to_string();
    match text.find(':') {
        Some(pos) => {
            let (kind, message) = text.split_at(pos);
            eprintln!("{}{}", kind.red().bold(), message);
        }
        None => eprintln!("{}", text.red()),
    }
}

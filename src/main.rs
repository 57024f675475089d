// ABOUTME: CLI entry point: reads a source file, runs it, reports the first error

mod activation;
mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod scope;
mod symbol;
mod token;
mod validator;
mod value;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use error::CouError;
use eval::Sink;

/// A tree-walking interpreter for cou, a small statically-typed imperative
/// scripting language.
#[derive(ClapParser, Debug)]
#[command(name = "cou")]
#[command(version)]
#[command(about = "A tree-walking interpreter for the cou scripting language")]
struct CliArgs {
    /// Source file to execute
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

struct StdoutSink;

impl Sink for StdoutSink {
    fn writeln(&mut self, line: &str) {
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "{}", line);
    }
}

fn run(source: &str) -> Result<(), CouError> {
    let (ast, program) = parser::parse(source)?;
    eval::Evaluator::new(&ast).run(program, &mut StdoutSink)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let source = match fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("could not read {}: {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

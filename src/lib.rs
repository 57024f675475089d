// ABOUTME: Library module wiring the lex/parse/eval pipeline and exposing it for testing

pub mod activation;
pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod symbol;
pub mod token;
pub mod validator;
pub mod value;

use error::CouError;
use eval::{Evaluator, Sink};

/// Parses and evaluates `source` against `sink`, surfacing the first
/// lex/parse/scope/type/runtime error encountered.
pub fn run(source: &str, sink: &mut dyn Sink) -> Result<(), CouError> {
    let (ast, program) = parser::parse(source)?;
    Evaluator::new(&ast).run(program, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eval::StringSink;

    #[test]
    fn test_run_wires_parser_into_evaluator() {
        let mut sink = StringSink::new();
        run("say 1 + 1;", &mut sink).unwrap();
        assert_eq!(sink.0, vec!["2"]);
    }

    #[test]
    fn test_run_surfaces_first_error() {
        let mut sink = StringSink::new();
        let err = run("say x;", &mut sink).unwrap_err();
        assert!(matches!(err, CouError::Scope(_)));
    }
}

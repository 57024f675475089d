// ABOUTME: Tree-walking evaluator with a lexically-nested call stack

use std::rc::Rc;

use crate::activation::{ActivationRecord, CallStack};
use crate::ast::{AssignTarget, Ast, BinaryOpKind, Expr, ExprId, NumberLit, Stmt, StmtId, UnaryOpKind};
use crate::error::{CouError, RuntimeError};
use crate::error::Pos;
use crate::validator;
use crate::value::Value;

/// Line-oriented output sink; the evaluator only ever appends whole lines.
/// `main` wires this up to standard output, tests to an in-memory buffer.
pub trait Sink {
    fn writeln(&mut self, line: &str);
}

#[derive(Default)]
pub struct StringSink(pub Vec<String>);

impl StringSink {
    pub fn new() -> Self {
        StringSink::default()
    }
}

impl Sink for StringSink {
    fn writeln(&mut self, line: &str) {
        self.0.push(line.to_string());
    }
}

/// Controls how a block finishes executing a statement sequence.
enum Flow {
    Normal,
    Returned,
}

pub struct Evaluator<'a> {
    ast: &'a Ast,
    stack: CallStack,
}

impl<'a> Evaluator<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Evaluator { ast, stack: CallStack::new() }
    }

    /// Runs a parsed program to completion. Pushes the `main` record at
    /// level 1, executes top-level statements, and pops it.
    pub fn run(&mut self, program: StmtId, sink: &mut dyn Sink) -> Result<(), CouError> {
        self.stack.push(Rc::new(ActivationRecord::new_root("main")));
        let result = match self.ast.stmt(program) {
            Stmt::Program(stmts) => self.exec_block(stmts, sink),
            other => unreachable!("program root must be Stmt::Program, got {:?}", other),
        };
        self.stack.pop();
        result.map(|_| ())
    }

    /// Executes a statement sequence, stopping early if a `return` fires.
    fn exec_block(&mut self, stmts: &[StmtId], sink: &mut dyn Sink) -> Result<Flow, CouError> {
        for &id in stmts {
            self.exec_stmt(id, sink)?;
            if self.stack.current().has_returned() {
                return Ok(Flow::Returned);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, id: StmtId, sink: &mut dyn Sink) -> Result<(), CouError> {
        match self.ast.stmt(id) {
            Stmt::Empty => Ok(()),
            Stmt::Program(stmts) | Stmt::Block(stmts) => {
                self.exec_block(stmts, sink)?;
                Ok(())
            }
            Stmt::ExprStmt { expr, .. } => {
                self.eval(*expr, sink)?;
                Ok(())
            }
            Stmt::Say { expr, .. } => {
                let value = self.eval(*expr, sink)?;
                sink.writeln(&value.canonical_string());
                Ok(())
            }
            Stmt::Return { expr, .. } => {
                match expr {
                    Some(e) => {
                        let value = self.eval(*e, sink)?;
                        self.stack.current().set_return(value);
                    }
                    None => self.stack.current().mark_returned_without_value(),
                }
                Ok(())
            }
            Stmt::Assignment { target, rhs, pos } => {
                let target = target.clone();
                let rhs = *rhs;
                self.exec_assignment(&target, &rhs, *pos, sink)
            }
            Stmt::Conditions { arms, .. } => {
                let arms = arms.clone();
                self.exec_conditions(&arms, sink)
            }
            Stmt::As { init, condition, step, body, .. } => {
                self.exec_as_loop(*init, *condition, *step, *body, sink)
            }
            Stmt::Process { .. } => Ok(()), // declaration only; nothing to execute
        }
    }

    fn exec_assignment(
        &mut self,
        target: &AssignTarget,
        rhs: &Option<ExprId>,
        pos: Pos,
        sink: &mut dyn Sink,
    ) -> Result<(), CouError> {
        match target {
            AssignTarget::Declaration { name, ty } => {
                let value = match rhs {
                    Some(e) => {
                        let v = self.eval(*e, sink)?;
                        validator::check_assignment_type(*ty, &v, pos)?;
                        v
                    }
                    None => Value::Nothing,
                };
                self.stack.current().declare_local(name, value);
                Ok(())
            }
            AssignTarget::Variable { name } => {
                let rhs_id = rhs.expect("variable assignment always carries an rhs");
                let value = self.eval(rhs_id, sink)?;
                let declared = self.lookup(name, pos)?;
                validator::check_assignment_type(declared.type_of(), &value, pos)?;
                self.stack.current().write(name, value);
                Ok(())
            }
            AssignTarget::ArrayElement { name, indices } => {
                let rhs_id = rhs.expect("array element assignment always carries an rhs");
                let value = self.eval(rhs_id, sink)?;
                let mut idx = Vec::with_capacity(indices.len());
                for &i in indices {
                    idx.push(self.eval(i, sink)?);
                }
                self.write_array_element(name, &idx, value, pos)
            }
        }
    }

    fn write_array_element(
        &self,
        name: &str,
        indices: &[Value],
        value: Value,
        pos: Pos,
    ) -> Result<(), CouError> {
        let record = self.stack.current();
        let result = record.with_array_mut(name, |root| {
            let mut current = root;
            for (depth, index) in indices.iter().enumerate() {
                let len = match current {
                    Value::Array(items) => items.len(),
                    other => {
                        return Err(RuntimeError::new(
                            format!("'{}' is not an array at index depth {}", other.type_of().name(), depth),
                            pos,
                        ))
                    }
                };
                let i = validator::check_array_index(index, len, pos)?;
                current = match current {
                    Value::Array(items) => &mut items[i],
                    _ => unreachable!(),
                };
            }
            *current = value;
            Ok(())
        });

        match result {
            Some(inner) => inner.map_err(CouError::from),
            None => Err(RuntimeError::new(format!("undeclared reference '{}'", name), pos).into()),
        }
    }

    fn read_array_element(&mut self, name: &str, indices: &[Value], pos: Pos) -> Result<Value, CouError> {
        let base = self
            .stack
            .current()
            .read(name)
            .ok_or_else(|| RuntimeError::new(format!("undeclared reference '{}'", name), pos))?;

        let mut current = base;
        for index in indices {
            let len = match &current {
                Value::Array(items) => items.len(),
                other => {
                    return Err(RuntimeError::new(
                        format!("cannot index into '{}'", other.type_of().name()),
                        pos,
                    )
                    .into())
                }
            };
            let i = validator::check_array_index(index, len, pos)?;
            current = match current {
                Value::Array(items) => items.into_iter().nth(i).unwrap(),
                _ => unreachable!(),
            };
        }
        Ok(current)
    }

    fn exec_conditions(&mut self, arms: &[(ExprId, StmtId)], sink: &mut dyn Sink) -> Result<(), CouError> {
        for (cond, block) in arms {
            let value = self.eval(*cond, sink)?;
            let pos = self.ast.expr(*cond).pos();
            if validator::check_condition(&value, pos)? {
                self.exec_stmt(*block, sink)?;
                return Ok(());
            }
        }
        Ok(())
    }

    fn exec_as_loop(
        &mut self,
        init: Option<StmtId>,
        condition: ExprId,
        step: Option<StmtId>,
        body: StmtId,
        sink: &mut dyn Sink,
    ) -> Result<(), CouError> {
        if let Some(init_id) = init {
            self.exec_stmt(init_id, sink)?;
        }

        loop {
            let value = self.eval(condition, sink)?;
            let pos = self.ast.expr(condition).pos();
            if !validator::check_condition(&value, pos)? {
                break;
            }

            self.exec_stmt(body, sink)?;
            if self.stack.current().has_returned() {
                return Ok(());
            }

            if let Some(step_id) = step {
                self.exec_stmt(step_id, sink)?;
            }
        }

        Ok(())
    }

    fn lookup(&self, name: &str, pos: Pos) -> Result<Value, CouError> {
        self.stack
            .current()
            .read(name)
            .ok_or_else(|| RuntimeError::new(format!("undeclared reference '{}'", name), pos).into())
    }

    // ---- expressions ----

    fn eval(&mut self, id: ExprId, sink: &mut dyn Sink) -> Result<Value, CouError> {
        match self.ast.expr(id).clone() {
            Expr::Number(lit, _) => Ok(match lit {
                NumberLit::Int(n) => Value::Int(n),
                NumberLit::Float(n) => Value::Float(n),
            }),
            Expr::Boolean(b, _) => Ok(Value::Bool(b)),
            Expr::StringLit(s, _) => Ok(Value::Str(s)),
            Expr::Nothing(_) => Ok(Value::Nothing),
            Expr::Variable { name, pos, .. } => self.lookup(&name, pos),
            Expr::UnaryOp { op, child, pos } => {
                let value = self.eval(child, sink)?;
                validator::check_unary_operation(op, &value, pos)?;
                Ok(apply_unary(op, &value))
            }
            Expr::BinaryOp { op, left, right, pos } => self.eval_binary(op, left, right, pos, sink),
            Expr::ArrayInitialization { size, pos } => {
                let size_value = self.eval(size, sink)?;
                let n = validator::check_array_size(&size_value, pos)?;
                Ok(Value::Array(vec![Value::Nothing; n]))
            }
            Expr::ArrayElement { name, indices, pos } => {
                let mut idx = Vec::with_capacity(indices.len());
                for i in indices {
                    idx.push(self.eval(i, sink)?);
                }
                self.read_array_element(&name, &idx, pos)
            }
            Expr::ProcessCall { name, args, proc, pos } => self.call_process(&name, &args, proc, pos, sink),
        }
    }

    /// `&&`/`||` are short-circuiting: the right operand is only evaluated
    /// when the left doesn't already determine the result.
    fn eval_binary(
        &mut self,
        op: BinaryOpKind,
        left: ExprId,
        right: ExprId,
        pos: Pos,
        sink: &mut dyn Sink,
    ) -> Result<Value, CouError> {
        let left_value = self.eval(left, sink)?;

        if op == BinaryOpKind::And || op == BinaryOpKind::Or {
            let lb = match &left_value {
                Value::Bool(b) => *b,
                other => {
                    return Err(crate::error::TypeError::new(
                        format!("operator not supported for type '{}'", other.type_of().name()),
                        pos,
                    )
                    .into())
                }
            };

            let short_circuits = if op == BinaryOpKind::And { !lb } else { lb };
            if short_circuits {
                return Ok(Value::Bool(lb));
            }

            let right_value = self.eval(right, sink)?;
            validator::check_binary_operation(op, &left_value, &right_value, pos)?;
            return Ok(right_value);
        }

        let right_value = self.eval(right, sink)?;
        validator::check_binary_operation(op, &left_value, &right_value, pos)?;
        apply_binary(op, &left_value, &right_value, pos)
    }

    fn call_process(
        &mut self,
        name: &str,
        args: &[ExprId],
        proc: StmtId,
        pos: Pos,
        sink: &mut dyn Sink,
    ) -> Result<Value, CouError> {
        let (params, scope_level, return_type, body) = match self.ast.stmt(proc) {
            Stmt::Process { params, scope_level, return_type, body, .. } => {
                (params.clone(), *scope_level, *return_type, *body)
            }
            other => unreachable!("ProcessCall must reference a Stmt::Process, got {:?}", other),
        };

        // Step 2: evaluate arguments left-to-right in the *caller's*
        // scope before the new record exists.
        let mut arg_values = Vec::with_capacity(args.len());
        for &a in args {
            arg_values.push(self.eval(a, sink)?);
        }

        // Step 1: the callee's enclosing frame is the caller's frame,
        // walked up (caller.level - callee.declared_level + 1) hops,
        // which realizes lexical rather than dynamic scoping.
        let caller_level = self.stack.current().level();
        let hops = caller_level + 1 - scope_level;
        let enclosing = self
            .stack
            .ancestor_memory(hops)
            .ok_or_else(|| RuntimeError::new(format!("cannot resolve enclosing scope for '{}'", name), pos))?;

        let record = Rc::new(ActivationRecord::new_child(name, enclosing));
        for (param, value) in params.iter().zip(arg_values.into_iter()) {
            record.declare_local(&param.name, value);
        }

        // Step 3: push, run, pop.
        self.stack.push(record);
        let run_result = self.exec_stmt(body, sink);
        let popped = self.stack.pop().expect("just pushed");

        run_result?;

        let return_value = popped.take_return_value().unwrap_or(Value::Nothing);

        // Step 4: validate against the declared return type.
        validator::check_return(return_type, &return_value, pos)?;

        Ok(return_value)
    }
}

fn apply_unary(op: UnaryOpKind, value: &Value) -> Value {
    match (op, value) {
        (UnaryOpKind::Pos, Value::Int(n)) => Value::Int(*n),
        (UnaryOpKind::Pos, Value::Float(n)) => Value::Float(*n),
        (UnaryOpKind::Neg, Value::Int(n)) => Value::Int(-n),
        (UnaryOpKind::Neg, Value::Float(n)) => Value::Float(-n),
        (UnaryOpKind::Not, Value::Bool(b)) => Value::Bool(!b),
        _ => unreachable!("validator already rejected this combination"),
    }
}

/// Numeric ops promote to float whenever either operand is float; `/`
/// always yields float; `%/` yields integer when both operands are
/// integer, else floor-of-float.
fn apply_binary(op: BinaryOpKind, left: &Value, right: &Value, pos: Pos) -> Result<Value, CouError> {
    use BinaryOpKind::*;

    if op == Add && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
        return Ok(Value::Str(format!("{}{}", left.canonical_string(), right.canonical_string())));
    }

    match op {
        Eq => return Ok(Value::Bool(left == right)),
        NotEq => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
        return Ok(match op {
            And => Value::Bool(*a && *b),
            Or => Value::Bool(*a || *b),
            _ => unreachable!("validator already rejected this operator for bool"),
        });
    }

    let (a, b) = (left.as_f64().unwrap(), right.as_f64().unwrap());
    let both_int = left.is_int() && right.is_int();

    Ok(match op {
        Add => numeric(a + b, both_int),
        Sub => numeric(a - b, both_int),
        Mul => numeric(a * b, both_int),
        Div => {
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero", pos).into());
            }
            Value::Float(a / b)
        }
        Mod => {
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero", pos).into());
            }
            // Floored modulus (sign of the divisor), so it pairs with
            // FloorDiv's floor-based quotient: x %/ y * y + x % y == x
            // holds for negative operands too, unlike Rust's truncated `%`.
            numeric(a - (a / b).floor() * b, both_int)
        }
        FloorDiv => {
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero", pos).into());
            }
            if both_int {
                Value::Int((left_int(left) as f64 / b).floor() as i64)
            } else {
                Value::Float((a / b).floor())
            }
        }
        Gt => Value::Bool(a > b),
        Lt => Value::Bool(a < b),
        Ge => Value::Bool(a >= b),
        Le => Value::Bool(a <= b),
        Eq | NotEq | And | Or => unreachable!("handled above"),
    })
}

fn left_int(v: &Value) -> i64 {
    match v {
        Value::Int(n) => *n,
        _ => unreachable!(),
    }
}

fn numeric(n: f64, both_int: bool) -> Value {
    if both_int {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(src: &str) -> Vec<String> {
        let (ast, program) = parse(src).unwrap_or_else(|e| panic!("parse failed: {}", e));
        let mut sink = StringSink::new();
        Evaluator::new(&ast)
            .run(program, &mut sink)
            .unwrap_or_else(|e| panic!("eval failed: {}", e));
        sink.0
    }

    #[test]
    fn test_scenario_a_arithmetic_precedence() {
        assert_eq!(
            run("a: num = 2 + 3 * 4; say a; say (2 + 3) * 4;"),
            vec!["14", "20"]
        );
    }

    #[test]
    fn test_scenario_b_lexical_closure() {
        assert_eq!(
            run("x: num = 10; proc f: num () { return x + 1; } say f();"),
            vec!["11"]
        );
    }

    #[test]
    fn test_scenario_d_as_loop_with_step() {
        assert_eq!(
            run("i: num; as (i = 0; i < 3; i = i + 1) { say i; }"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn test_scenario_e_nested_array_indexing() {
        assert_eq!(
            run("a: arr = arr[2]; a[0] = arr[2]; a[0][1] = 'hi'; say a[0][1];"),
            vec!["hi"]
        );
    }

    #[test]
    fn test_scenario_f_short_circuit_skips_call() {
        assert_eq!(
            run("proc bad: num () { return 1 %/ 0; } say (false && bad() == 0);"),
            vec!["false"]
        );
    }

    #[test]
    fn test_string_concatenation_coerces_number() {
        assert_eq!(run("say 'a' + 1;"), vec!["a1"]);
    }

    #[test]
    fn test_array_out_of_bounds_is_runtime_error() {
        let (ast, program) = parse("a: arr = arr[0]; say a[0];").unwrap();
        let mut sink = StringSink::new();
        let err = Evaluator::new(&ast).run(program, &mut sink).unwrap_err();
        assert!(matches!(err, CouError::Runtime(_)));
    }

    #[test]
    fn test_division_by_zero_is_runtime_error() {
        let (ast, program) = parse("say 1 %/ 0;").unwrap();
        let mut sink = StringSink::new();
        let err = Evaluator::new(&ast).run(program, &mut sink).unwrap_err();
        assert!(matches!(err, CouError::Runtime(_)));
    }

    #[test]
    fn test_recursive_process() {
        assert_eq!(
            run("proc fact: num (n: num) { if (n == 0) { return 1; } return n * fact(n - 1); } say fact(5);"),
            vec!["120"]
        );
    }

    #[test]
    fn test_condition_non_bool_is_type_error() {
        let (ast, program) = parse("if (1) { say 1; }").unwrap();
        let mut sink = StringSink::new();
        let err = Evaluator::new(&ast).run(program, &mut sink).unwrap_err();
        assert!(matches!(err, CouError::Type(_)));
    }

    #[test]
    fn test_call_stack_returns_to_zero_after_run() {
        let (ast, program) = parse("proc f: num () { return 1; } say f();").unwrap();
        let mut sink = StringSink::new();
        let mut ev = Evaluator::new(&ast);
        ev.run(program, &mut sink).unwrap();
        assert_eq!(ev.stack.depth(), 0);
    }

    #[test]
    fn test_real_division_by_zero_is_runtime_error() {
        let (ast, program) = parse("say 1 / 0;").unwrap();
        let mut sink = StringSink::new();
        let err = Evaluator::new(&ast).run(program, &mut sink).unwrap_err();
        assert!(matches!(err, CouError::Runtime(_)));
    }

    #[test]
    fn test_floored_modulus_matches_floor_division_for_negative_operands() {
        // x %/ y * y + x % y == x must hold for negative x too.
        assert_eq!(run("say -7 %/ 2;"), vec!["-4"]);
        assert_eq!(run("say -7 % 2;"), vec!["1"]);
        assert_eq!(run("say -7 %/ 2 * 2 + -7 % 2 == -7;"), vec!["true"]);
    }

    #[test]
    fn test_process_declared_inside_nested_block_resolves_enclosing_frame() {
        // A process declared inside an `if`/`as` body nested inside another
        // process must still resolve its caller's real runtime frame: the
        // extra lexical block nesting must not inflate its scope level.
        assert_eq!(
            run(
                "proc outer: num () { if (true) { proc inner: num () { return 1; } return inner(); } return 0; } say outer();"
            ),
            vec!["1"]
        );
    }
}

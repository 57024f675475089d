// ABOUTME: Pure type-compatibility predicates used by the evaluator at runtime

use crate::ast::{BinaryOpKind, Type, UnaryOpKind};
use crate::error::{Pos, RuntimeError, TypeError};
use crate::value::Value;

fn binary_ops_for(ty: Type) -> &'static [BinaryOpKind] {
    use BinaryOpKind::*;
    match ty {
        Type::Num => &[Add, Sub, Mul, Div, Mod, FloorDiv, Eq, NotEq, Ge, Le, Gt, Lt],
        Type::Bool => &[And, Or, Eq, NotEq],
        Type::Str => &[Add, Eq, NotEq],
        Type::Nil => &[Eq, NotEq],
        Type::Arr => &[Eq, NotEq],
    }
}

fn unary_ops_for(ty: Type) -> &'static [UnaryOpKind] {
    use UnaryOpKind::*;
    match ty {
        Type::Num => &[Neg, Pos],
        Type::Bool => &[Not],
        _ => &[],
    }
}

/// Validates a binary operation's operand types and the operator's
/// membership in that type's allowed set. The one exception is `+` with a
/// string operand, which coerces the other side to its canonical string
/// form rather than requiring matching types.
pub fn check_binary_operation(
    op: BinaryOpKind,
    left: &Value,
    right: &Value,
    pos: Pos,
) -> Result<(), TypeError> {
    if op == BinaryOpKind::Add && (left.type_of() == Type::Str || right.type_of() == Type::Str) {
        return Ok(());
    }

    if left.type_of() != right.type_of() {
        return Err(TypeError::new(
            format!(
                "operand types do not match: '{}' and '{}'",
                left.type_of().name(),
                right.type_of().name()
            ),
            pos,
        ));
    }

    if !binary_ops_for(left.type_of()).contains(&op) {
        return Err(TypeError::new(
            format!("operator not supported for type '{}'", left.type_of().name()),
            pos,
        ));
    }

    Ok(())
}

pub fn check_unary_operation(op: UnaryOpKind, operand: &Value, pos: Pos) -> Result<(), TypeError> {
    if !unary_ops_for(operand.type_of()).contains(&op) {
        return Err(TypeError::new(
            format!("operator not supported for type '{}'", operand.type_of().name()),
            pos,
        ));
    }
    Ok(())
}

/// `type(declared, value)`: value's runtime kind must equal the declared
/// type exactly, no implicit widening.
pub fn check_assignment_type(declared: Type, value: &Value, pos: Pos) -> Result<(), TypeError> {
    if value.type_of() != declared {
        return Err(TypeError::new(
            format!(
                "cannot assign type '{}' to '{}'",
                value.type_of().name(),
                declared.name()
            ),
            pos,
        ));
    }
    Ok(())
}

pub fn check_condition(value: &Value, pos: Pos) -> Result<bool, TypeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(TypeError::new(
            format!("condition must be 'bool', got '{}'", other.type_of().name()),
            pos,
        )),
    }
}

pub fn check_return(declared: Type, value: &Value, pos: Pos) -> Result<(), TypeError> {
    if value.type_of() != declared {
        return Err(TypeError::new(
            format!(
                "return type mismatch: expected '{}', got '{}'",
                declared.name(),
                value.type_of().name()
            ),
            pos,
        ));
    }
    Ok(())
}

/// `array_index(idx, arr)`: `idx` must be an integer and within bounds.
pub fn check_array_index(index: &Value, len: usize, pos: Pos) -> Result<usize, RuntimeError> {
    let i = match index {
        Value::Int(n) => *n,
        other => {
            return Err(RuntimeError::new(
                format!("array index must be 'num' (integer), got '{}'", other.type_of().name()),
                pos,
            ))
        }
    };

    if i < 0 || i as usize >= len {
        return Err(RuntimeError::new(
            format!("array index {} out of bounds for length {}", i, len),
            pos,
        ));
    }

    Ok(i as usize)
}

/// `array_size(size)`: kind is integer and non-negative.
pub fn check_array_size(size: &Value, pos: Pos) -> Result<usize, RuntimeError> {
    let n = match size {
        Value::Int(n) => *n,
        other => {
            return Err(RuntimeError::new(
                format!("array size must be 'num' (integer), got '{}'", other.type_of().name()),
                pos,
            ))
        }
    };

    if n < 0 {
        return Err(RuntimeError::new(format!("invalid array size {}", n), pos));
    }

    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Pos {
        Pos::new(1, 1)
    }

    #[test]
    fn test_num_operators_allowed() {
        assert!(check_binary_operation(BinaryOpKind::Add, &Value::Int(1), &Value::Int(2), p()).is_ok());
    }

    #[test]
    fn test_bool_does_not_support_add() {
        assert!(check_binary_operation(BinaryOpKind::Add, &Value::Bool(true), &Value::Bool(false), p()).is_err());
    }

    #[test]
    fn test_string_plus_number_coerces() {
        assert!(check_binary_operation(BinaryOpKind::Add, &Value::Str("a".into()), &Value::Int(1), p()).is_ok());
    }

    #[test]
    fn test_mismatched_types_rejected() {
        assert!(check_binary_operation(BinaryOpKind::Eq, &Value::Int(1), &Value::Bool(true), p()).is_err());
    }

    #[test]
    fn test_unary_not_only_for_bool() {
        assert!(check_unary_operation(UnaryOpKind::Not, &Value::Bool(true), p()).is_ok());
        assert!(check_unary_operation(UnaryOpKind::Not, &Value::Int(1), p()).is_err());
    }

    #[test]
    fn test_assignment_type_no_widening() {
        assert!(check_assignment_type(Type::Num, &Value::Int(1), p()).is_ok());
        assert!(check_assignment_type(Type::Str, &Value::Int(1), p()).is_err());
    }

    #[test]
    fn test_condition_requires_bool() {
        assert!(check_condition(&Value::Bool(true), p()).is_ok());
        assert!(check_condition(&Value::Int(1), p()).is_err());
    }

    #[test]
    fn test_array_index_bounds() {
        assert!(check_array_index(&Value::Int(0), 0, p()).is_err());
        assert!(check_array_index(&Value::Int(-1), 3, p()).is_err());
        assert_eq!(check_array_index(&Value::Int(2), 3, p()).unwrap(), 2);
    }

    #[test]
    fn test_array_size_rejects_negative() {
        assert!(check_array_size(&Value::Int(-1), p()).is_err());
        assert_eq!(check_array_size(&Value::Int(3), p()).unwrap(), 3);
    }
}

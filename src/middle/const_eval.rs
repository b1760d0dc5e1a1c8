//! Compile-time evaluation of constant expressions
//!
//! The grammar guarantees compile-time constants in three places: `const`
//! definitions, array extents, and global initializers. Everything else is
//! lowered as written; this module is never used to fold runtime
//! expressions.

use crate::{
    frontend::{
        ast::{BinaryOperatorKind, Expression, ExpressionKind, UnaryOperatorKind},
        lexer::Span,
    },
    middle::scope::{Binding, ScopeStack},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstEvalError {
    /// The expression reached an lvalue that is not a known constant, or a
    /// function call
    NonConstant(Span),
    DivisionByZero(Span),
}

impl ConstEvalError {
    pub fn span(self) -> Span {
        match self {
            Self::NonConstant(span) | Self::DivisionByZero(span) => span,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NonConstant(_) => "Expected a compile-time constant expression",
            Self::DivisionByZero(_) => "Division by zero in a constant expression",
        }
    }
}

/// Reduces an expression built only from literals and known constants to an
/// integer, with C semantics: truncating division and modulo, zero/nonzero
/// truthiness, and short-circuiting `&&`/`||`.
pub fn evaluate(
    expression: &Expression,
    scopes: &ScopeStack<Binding>,
) -> Result<i32, ConstEvalError> {
    match &expression.kind {
        ExpressionKind::Literal(value) => Ok(*value),
        ExpressionKind::LValue(lvalue) => {
            if !lvalue.indices.is_empty() {
                return Err(ConstEvalError::NonConstant(expression.span));
            }

            match scopes.get_binding(lvalue.name.symbol) {
                Some(Binding::Constant(value)) => Ok(*value),
                _ => Err(ConstEvalError::NonConstant(expression.span)),
            }
        }
        ExpressionKind::Call { .. } => Err(ConstEvalError::NonConstant(expression.span)),
        ExpressionKind::Unary { operator, operand } => {
            let value = evaluate(operand, scopes)?;

            Ok(match operator {
                UnaryOperatorKind::Plus => value,
                UnaryOperatorKind::Negate => value.wrapping_neg(),
                UnaryOperatorKind::LogicalNot => (value == 0) as i32,
            })
        }
        ExpressionKind::Binary { lhs, operator, rhs } => {
            // Short-circuit forms must not evaluate the dead operand, e.g.
            // `1 || (1 / 0)` is 1
            match operator {
                BinaryOperatorKind::LogicalAnd => {
                    if evaluate(lhs, scopes)? == 0 {
                        return Ok(0);
                    }
                    return Ok((evaluate(rhs, scopes)? != 0) as i32);
                }
                BinaryOperatorKind::LogicalOr => {
                    if evaluate(lhs, scopes)? != 0 {
                        return Ok(1);
                    }
                    return Ok((evaluate(rhs, scopes)? != 0) as i32);
                }
                _ => {}
            }

            let lhs = evaluate(lhs, scopes)?;
            let rhs = evaluate(rhs, scopes)?;

            Ok(match operator {
                BinaryOperatorKind::Add => lhs.wrapping_add(rhs),
                BinaryOperatorKind::Subtract => lhs.wrapping_sub(rhs),
                BinaryOperatorKind::Multiply => lhs.wrapping_mul(rhs),
                BinaryOperatorKind::Divide => {
                    if rhs == 0 {
                        return Err(ConstEvalError::DivisionByZero(expression.span));
                    }
                    lhs.wrapping_div(rhs)
                }
                BinaryOperatorKind::Modulus => {
                    if rhs == 0 {
                        return Err(ConstEvalError::DivisionByZero(expression.span));
                    }
                    lhs.wrapping_rem(rhs)
                }
                BinaryOperatorKind::Equals => (lhs == rhs) as i32,
                BinaryOperatorKind::NotEquals => (lhs != rhs) as i32,
                BinaryOperatorKind::LessThan => (lhs < rhs) as i32,
                BinaryOperatorKind::LessThanOrEqualTo => (lhs <= rhs) as i32,
                BinaryOperatorKind::GreaterThan => (lhs > rhs) as i32,
                BinaryOperatorKind::GreaterThanOrEqualTo => (lhs >= rhs) as i32,
                BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => unreachable!(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{
        SourceFile,
        ast::{InitializerKind, ItemKind},
        parser::Parser,
    };

    fn try_constant(expression_source: &str) -> Result<i32, ConstEvalError> {
        let source = SourceFile::new_in_memory(format!("const int c = {expression_source};"));
        let unit = Parser::parse_compilation_unit(&source);

        let ItemKind::Declaration(declaration) = &unit.items[0].kind else {
            panic!("expected a declaration");
        };
        let initializer = declaration.definitions[0].initializer.as_ref().unwrap();
        let InitializerKind::Expression(expression) = &initializer.kind else {
            panic!("expected an expression initializer");
        };

        evaluate(expression, &ScopeStack::new())
    }

    fn constant(expression_source: &str) -> i32 {
        try_constant(expression_source).unwrap()
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        assert_eq!(constant("1 + 2 * 3"), 7);
        assert_eq!(constant("(1 + 2) * 3"), 9);
        assert_eq!(constant("10 - 2 - 3"), 5);
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(constant("7 / 2"), 3);
        assert_eq!(constant("7 / -2"), -3);
        assert_eq!(constant("-7 / 2"), -3);
        assert_eq!(constant("-7 % 2"), -1);
        assert_eq!(constant("7 % -2"), 1);
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(constant("1 || 1 / 0"), 1);
        assert_eq!(constant("0 && 1 / 0"), 0);
        assert_eq!(constant("2 && 3"), 1);
        assert_eq!(constant("0 || 0"), 0);
    }

    #[test]
    fn comparison_and_not_produce_zero_or_one() {
        assert_eq!(constant("3 < 4"), 1);
        assert_eq!(constant("4 <= 3"), 0);
        assert_eq!(constant("5 == 5"), 1);
        assert_eq!(constant("5 != 5"), 0);
        assert_eq!(constant("!0"), 1);
        assert_eq!(constant("!42"), 0);
        assert_eq!(constant("!!42"), 1);
    }

    #[test]
    fn division_by_zero_is_an_error_when_evaluated() {
        assert!(matches!(
            try_constant("1 / 0"),
            Err(ConstEvalError::DivisionByZero(_))
        ));
        assert!(matches!(
            try_constant("1 % 0"),
            Err(ConstEvalError::DivisionByZero(_))
        ));
    }

    #[test]
    fn non_constant_operands_are_rejected() {
        assert!(matches!(
            try_constant("x + 1"),
            Err(ConstEvalError::NonConstant(_))
        ));
        assert!(matches!(
            try_constant("f()"),
            Err(ConstEvalError::NonConstant(_))
        ));
    }
}

//! Parsing of boolean expressions: the topmost expression level.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::cut;

use super::for_expression::{for_expression_full, of_expression};
use super::primary_expression::primary_expression;
use super::{Expression, ExpressionKind};
use crate::error::{Error, ErrorKind};
use crate::nom_recipes::{rtrim, textual_tag as ttag};
use crate::types::{Input, ParseResult};

/// Maximum number of imbricated expressions.
const MAX_EXPR_RECURSION: usize = 40;

/// Parse an expression.
///
/// This is the entry point of expression parsing, handling the `or`
/// operator, the lowest priority one.
pub(crate) fn expression(mut input: Input) -> ParseResult<Expression> {
    if input.expr_recursion_counter >= MAX_EXPR_RECURSION {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(input.pos()),
            ErrorKind::ExprTooDeep,
        )));
    }
    input.expr_recursion_counter += 1;

    let start = input.pos();
    let (mut input, mut res) = expression_and(input)?;

    while let Ok((i, _)) = rtrim(ttag("or"))(input) {
        let (i2, right_elem) = cut(expression_and)(i)?;
        input = i2;
        res = Expression {
            kind: ExpressionKind::Or(Box::new(res), Box::new(right_elem)),
            span: input.get_span_from(start),
        };
    }

    input.expr_recursion_counter -= 1;
    Ok((input, res))
}

/// Parse the `and` operator.
fn expression_and(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = expression_term(input)?;

    while let Ok((i, _)) = rtrim(ttag("and"))(input) {
        let (i2, right_elem) = cut(expression_term)(i)?;
        input = i2;
        res = Expression {
            kind: ExpressionKind::And(Box::new(res), Box::new(right_elem)),
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse a boolean term.
fn expression_term(input: Input) -> ParseResult<Expression> {
    alt((for_expression_full, of_expression, comparison_expression))(input)
}

/// Parse `==`, `!=`, `<=`, `>=`, `<` and `>` operators.
fn comparison_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression(input)?;

    while let Ok((i, op)) = rtrim(alt((
        tag("=="),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("<"),
        tag(">"),
    )))(input)
    {
        let (i2, right_elem) = cut(primary_expression)(i)?;
        input = i2;

        let left = Box::new(res);
        let right = Box::new(right_elem);
        res = Expression {
            kind: match op.cursor() {
                "==" => ExpressionKind::Eq(left, right),
                "!=" => ExpressionKind::NotEq(left, right),
                op => ExpressionKind::Cmp {
                    left,
                    right,
                    less_than: op.as_bytes()[0] == b'<',
                    can_be_equal: op.len() == 2,
                },
            },
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

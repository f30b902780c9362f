//! Parsing of primary expressions: everything with a numeric value.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::sequence::{delimited, preceded};

use super::{boolean_expression, common, Expression, ExpressionKind};
use crate::nom_recipes::{rtrim, textual_tag as ttag};
use crate::types::{Input, ParseResult};
use crate::{number, string};

/// Parse `|`, the lowest priority operator.
pub(super) fn primary_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression_bitwise_xor(input)?;

    while let Ok((i, _)) = rtrim(char('|'))(input) {
        let (i2, right_elem) = cut(primary_expression_bitwise_xor)(i)?;
        input = i2;

        res = Expression {
            kind: ExpressionKind::BitwiseOr(Box::new(res), Box::new(right_elem)),
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse `^` operator.
fn primary_expression_bitwise_xor(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression_bitwise_and(input)?;

    while let Ok((i, _)) = rtrim(char('^'))(input) {
        let (i2, right_elem) = cut(primary_expression_bitwise_and)(i)?;
        input = i2;

        res = Expression {
            kind: ExpressionKind::BitwiseXor(Box::new(res), Box::new(right_elem)),
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse `&` operator.
fn primary_expression_bitwise_and(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression_shift(input)?;

    while let Ok((i, _)) = rtrim(char('&'))(input) {
        let (i2, right_elem) = cut(primary_expression_shift)(i)?;
        input = i2;

        res = Expression {
            kind: ExpressionKind::BitwiseAnd(Box::new(res), Box::new(right_elem)),
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse `<<` and `>>` operators.
fn primary_expression_shift(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression_add(input)?;

    while let Ok((i, op)) = rtrim(alt((tag("<<"), tag(">>"))))(input) {
        let (i2, right_elem) = cut(primary_expression_add)(i)?;
        input = i2;

        let left = Box::new(res);
        let right = Box::new(right_elem);
        res = Expression {
            kind: match op.cursor() {
                "<<" => ExpressionKind::ShiftLeft(left, right),
                ">>" => ExpressionKind::ShiftRight(left, right),
                _ => unreachable!(),
            },
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse `+` and `-` operators.
fn primary_expression_add(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, mut res) = primary_expression_neg(input)?;

    while let Ok((i, op)) = rtrim(alt((char('+'), char('-'))))(input) {
        let (i2, right_elem) = cut(primary_expression_neg)(i)?;
        input = i2;

        let left = Box::new(res);
        let right = Box::new(right_elem);
        res = Expression {
            kind: match op {
                '+' => ExpressionKind::Add(left, right),
                '-' => ExpressionKind::Sub(left, right),
                _ => unreachable!(),
            },
            span: input.get_span_from(start),
        };
    }
    Ok((input, res))
}

/// Parse unary `-`.
fn primary_expression_neg(mut input: Input) -> ParseResult<Expression> {
    let mut start = input.pos();
    // Push ops into a vec to avoid unbounded recursion.
    let mut ops = Vec::new();
    while let Ok((i, _)) = rtrim(char('-'))(input) {
        ops.push(start);
        input = i;
        start = i.pos();
    }

    let (input, mut expr) = primary_expression_item(input)?;
    while let Some(start) = ops.pop() {
        expr = Expression {
            kind: ExpressionKind::Neg(Box::new(expr)),
            span: input.get_span_from(start),
        };
    }

    Ok((input, expr))
}

fn primary_expression_item(input: Input) -> ParseResult<Expression> {
    alt((
        // '(' expression ')'
        delimited(
            rtrim(char('(')),
            cut(boolean_expression::expression),
            cut(rtrim(char(')'))),
        ),
        // 'true'
        map_expr(rtrim(ttag("true")), |_| ExpressionKind::Boolean(true)),
        // 'false'
        map_expr(rtrim(ttag("false")), |_| ExpressionKind::Boolean(false)),
        // 'filesize'
        map_expr(rtrim(ttag("filesize")), |_| ExpressionKind::Filesize),
        // number
        map_expr(number::number, ExpressionKind::Integer),
        // '#' variable_name
        map_expr(string::count, ExpressionKind::Count),
        // '@' variable_name ( '[' primary_expression ']' )?
        offset_expression,
        // '$' variable_name ( 'at' | 'in' ... )?
        variable_expression,
        // identifier
        map_expr(string::identifier, ExpressionKind::Identifier),
    ))(input)
}

/// Parse a `@a` or `@a[expr]` offset expression.
fn offset_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, variable_name) = string::offset(input)?;
    let (input, occurrence) = opt(delimited(
        rtrim(char('[')),
        cut(primary_expression),
        cut(rtrim(char(']'))),
    ))(input)?;

    Ok((
        input,
        Expression {
            kind: ExpressionKind::Offset {
                variable_name,
                occurrence: occurrence.map(Box::new),
            },
            span: input.get_span_from(start),
        },
    ))
}

/// Parse a variable test: `$a`, `$a at expr` or `$a in (from..to)`.
fn variable_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, variable_name) = string::string_identifier(input)?;

    if let Ok((i, _)) = rtrim(ttag("at"))(input) {
        let (i, offset) = cut(primary_expression)(i)?;
        Ok((
            i,
            Expression {
                kind: ExpressionKind::VariableAt {
                    variable_name,
                    offset: Box::new(offset),
                },
                span: i.get_span_from(start),
            },
        ))
    } else if let Ok((i, (from, to))) = preceded(rtrim(ttag("in")), common::range)(input) {
        Ok((
            i,
            Expression {
                kind: ExpressionKind::VariableIn {
                    variable_name,
                    from,
                    to,
                },
                span: i.get_span_from(start),
            },
        ))
    } else {
        Ok((
            input,
            Expression {
                kind: ExpressionKind::Variable(variable_name),
                span: input.get_span_from(start),
            },
        ))
    }
}

fn map_expr<'a, F, O, C>(
    mut f: F,
    constructor: C,
) -> impl FnMut(Input<'a>) -> ParseResult<'a, Expression>
where
    F: FnMut(Input<'a>) -> ParseResult<'a, O>,
    C: Fn(O) -> ExpressionKind,
{
    move |input| {
        let start = input.pos();
        let (input, output) = f(input)?;
        Ok((
            input,
            Expression {
                kind: constructor(output),
                span: input.get_span_from(start),
            },
        ))
    }
}

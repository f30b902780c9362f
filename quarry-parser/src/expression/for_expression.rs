//! Parsing of `for` and `of` expressions.
use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{cut, map};
use nom::multi::separated_list1;
use nom::sequence::{delimited, terminated};

use super::{boolean_expression, common, Expression, ExpressionKind, ForSelection, SetElement, VariableSet};
use crate::nom_recipes::{rtrim, textual_tag as ttag};
use crate::types::{Input, ParseResult};
use crate::{number, string};

/// Parse a full `for` expression:
///
/// - `'for' selection 'of' set ':' '(' body ')'`
/// - `'for' selection identifier 'in' range ':' '(' body ')'`
pub(super) fn for_expression_full(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, _) = rtrim(ttag("for"))(input)?;
    let (input, selection) = cut(for_selection)(input)?;

    if let Ok((input, _)) = rtrim(ttag("of"))(input) {
        let (input, set) = cut(terminated(string_set, rtrim(char(':'))))(input)?;
        let (input, body) = cut(delimited(
            rtrim(char('(')),
            boolean_expression::expression,
            rtrim(char(')')),
        ))(input)?;

        Ok((
            input,
            Expression {
                kind: ExpressionKind::ForOf {
                    selection,
                    set,
                    body: Box::new(body),
                },
                span: input.get_span_from(start),
            },
        ))
    } else {
        let (input, identifier) =
            cut(terminated(string::identifier, rtrim(ttag("in"))))(input)?;
        let (input, (from, to)) = cut(terminated(common::range, rtrim(char(':'))))(input)?;
        let (input, body) = cut(delimited(
            rtrim(char('(')),
            boolean_expression::expression,
            rtrim(char(')')),
        ))(input)?;

        Ok((
            input,
            Expression {
                kind: ExpressionKind::ForIn {
                    selection,
                    identifier,
                    from,
                    to,
                    body: Box::new(body),
                },
                span: input.get_span_from(start),
            },
        ))
    }
}

/// Parse an abbreviated `of` expression: `selection 'of' set`.
pub(super) fn of_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, selection) = for_selection(input)?;
    // No cut: on a missing 'of', backtrack and let the selection be
    // reparsed as a primary expression.
    let (input, _) = rtrim(ttag("of"))(input)?;
    let (input, set) = cut(string_set)(input)?;

    Ok((
        input,
        Expression {
            kind: ExpressionKind::Of { selection, set },
            span: input.get_span_from(start),
        },
    ))
}

/// Parse the selection of a `for` or `of` expression.
fn for_selection(input: Input) -> ParseResult<ForSelection> {
    alt((
        map(rtrim(ttag("any")), |_| ForSelection::Any),
        map(rtrim(ttag("all")), |_| ForSelection::All),
        map(rtrim(ttag("none")), |_| ForSelection::None),
        map(number::number, ForSelection::Count),
    ))(input)
}

/// Parse a set of variables: `them` or `( $a, $b*, ... )`.
fn string_set(input: Input) -> ParseResult<VariableSet> {
    alt((
        map(rtrim(ttag("them")), |_| VariableSet { elements: vec![] }),
        map(
            delimited(
                rtrim(char('(')),
                cut(string_enumeration),
                cut(rtrim(char(')'))),
            ),
            |elements| VariableSet { elements },
        ),
    ))(input)
}

fn string_enumeration(input: Input) -> ParseResult<Vec<SetElement>> {
    separated_list1(
        rtrim(char(',')),
        map(string::string_identifier_with_wildcard, |(name, is_wildcard)| SetElement {
            name,
            is_wildcard,
        }),
    )(input)
}

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::cut;

use super::primary_expression::primary_expression;
use super::Expression;
use crate::nom_recipes::rtrim;
use crate::types::{Input, ParseResult};

/// Parse a `( expr '..' expr )` range.
pub(super) fn range(input: Input) -> ParseResult<(Box<Expression>, Box<Expression>)> {
    let (input, _) = rtrim(char('('))(input)?;

    let (input, from) = cut(primary_expression)(input)?;
    let (input, _) = cut(rtrim(tag("..")))(input)?;
    let (input, to) = cut(primary_expression)(input)?;
    let (input, _) = cut(rtrim(char(')')))(input)?;

    Ok((input, (Box::new(from), Box::new(to))))
}

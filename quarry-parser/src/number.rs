//! Parsing related to numbers.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{digit1, hex_digit1};
use nom::combinator::{cut, opt};
use nom::sequence::pair;

use super::error::ErrorKind;
use super::nom_recipes::{map_res, rtrim, textual_tag as ttag};
use super::types::{Input, ParseResult};

/// Parse a decimal number, with an optional KB or MB suffix.
fn decimal_number(input: Input) -> ParseResult<i64> {
    map_res(
        rtrim(pair(
            map_res(digit1, |v: Input| {
                str::parse::<i64>(v.cursor()).map_err(ErrorKind::StrToIntError)
            }),
            opt(alt((ttag("MB"), ttag("KB")))),
        )),
        |(n, suffix)| {
            let multiplier = match suffix {
                Some("MB") => 1024 * 1024,
                Some("KB") => 1024,
                _ => return Ok(n),
            };
            n.checked_mul(multiplier).ok_or(ErrorKind::MulOverflow {
                left: n,
                right: multiplier,
            })
        },
    )(input)
}

/// Parse an hexadecimal number with a `0x` prefix.
fn hexadecimal_number(input: Input) -> ParseResult<i64> {
    let (input, _) = tag("0x")(input)?;

    cut(map_res(rtrim(hex_digit1), |v: Input| {
        i64::from_str_radix(v.cursor(), 16).map_err(ErrorKind::StrToHexIntError)
    }))(input)
}

/// Parse a number (integer).
///
/// Can be hexadecimal with a 0x prefix, or decimal with an optional
/// KB/MB suffix.
pub(crate) fn number(input: Input) -> ParseResult<i64> {
    // XXX: decimal number must be last, otherwise it would parse the '0'
    // in the '0x' prefix.
    alt((hexadecimal_number, decimal_number))(input)
}

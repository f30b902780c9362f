//! Parsing related to hex strings, e.g. `{ AB ?? [2-4] ( 01 | 23 ) }`.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1};
use nom::combinator::{cut, map, opt, value};
use nom::error::ErrorKind as NomErrorKind;
use nom::error::ParseError;
use nom::multi::{many1, separated_list1};
use nom::sequence::{preceded, terminated};

use super::error::{Error, ErrorKind};
use super::nom_recipes::{map_res, rtrim};
use super::types::{Input, ParseResult};

/// A token in a hex string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HexToken {
    /// A fully declared byte, e.g. `9C`.
    Byte(u8),
    /// A wildcard byte, i.e. `??`.
    Wildcard,
    /// A jump of unknown bytes, e.g. `[2-5]`. Both bounds are inclusive.
    Jump { from: u32, to: u32 },
    /// Alternative lists of atoms, e.g. `( 12 34 | 98 76 )`.
    Alternatives(Vec<Vec<HexAtom>>),
}

/// An atom allowed inside an alternation branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HexAtom {
    /// A fully declared byte.
    Byte(u8),
    /// A wildcard byte.
    Wildcard,
}

/// Parse a hex string, e.g. `{ AB .. }`.
pub(crate) fn hex_string(input: Input) -> ParseResult<Vec<HexToken>> {
    let start = input.pos();
    let (input, _) = rtrim(char('{'))(input)?;

    let (input, tokens) = cut(terminated(many1(hex_token), rtrim(char('}'))))(input)?;

    // A jump at either end of the string matches nothing on its own and
    // would leave the first automaton byte undefined.
    if matches!(tokens.first(), Some(HexToken::Jump { .. }))
        || matches!(tokens.last(), Some(HexToken::Jump { .. }))
    {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::JumpAtBound,
        )));
    }

    Ok((input, tokens))
}

/// Parse a single hex digit and return its value in [0-15].
fn hex_digit(mut input: Input) -> ParseResult<u8> {
    match input
        .cursor()
        .chars()
        .next()
        .and_then(|c| c.to_digit(16).map(|v| v as u8))
    {
        Some(v) => {
            input.advance(1);
            Ok((input, v))
        }
        _ => Err(nom::Err::Error(Error::from_error_kind(
            input,
            NomErrorKind::HexDigit,
        ))),
    }
}

/// Parse a hex byte: two hex digits with no spacing in between.
fn byte(input: Input) -> ParseResult<u8> {
    let (input, digit0) = hex_digit(input)?;

    map(rtrim(hex_digit), move |digit1| (digit0 << 4) | digit1)(input)
}

/// Parse a `??` wildcard byte.
fn wildcard(input: Input) -> ParseResult<HexToken> {
    value(HexToken::Wildcard, rtrim(tag("??")))(input)
}

/// Parse a jump, either `[n]` or `[n-m]`, bounds inclusive.
fn jump(input: Input) -> ParseResult<HexToken> {
    let start = input.pos();
    let (input, _) = rtrim(char('['))(input)?;

    let parse_bound = |input| {
        map_res(rtrim(digit1), |v: Input| {
            str::parse::<u32>(v.cursor()).map_err(ErrorKind::StrToIntError)
        })(input)
    };

    let (input, from) = cut(parse_bound)(input)?;
    let (input, to) = cut(terminated(
        opt(preceded(rtrim(char('-')), parse_bound)),
        rtrim(char(']')),
    ))(input)?;

    let to = to.unwrap_or(from);
    if from > to {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::JumpRangeInvalid { from, to },
        )));
    }
    if from == 0 && to == 0 {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::JumpEmpty,
        )));
    }

    Ok((input, HexToken::Jump { from, to }))
}

/// Parse alternatives between lists of bytes, e.g. `( 12 ?? | 34 )`.
///
/// Branches are flat: only bytes and wildcards are allowed inside.
fn alternatives(input: Input) -> ParseResult<HexToken> {
    let (input, _) = rtrim(char('('))(input)?;

    cut(terminated(
        map(
            separated_list1(
                rtrim(char('|')),
                many1(alt((
                    map(byte, HexAtom::Byte),
                    value(HexAtom::Wildcard, rtrim(tag("??"))),
                ))),
            ),
            HexToken::Alternatives,
        ),
        rtrim(char(')')),
    ))(input)
}

fn hex_token(input: Input) -> ParseResult<HexToken> {
    alt((wildcard, map(byte, HexToken::Byte), jump, alternatives))(input)
}

//! Parsing related to regex literals.
use std::ops::Range;

use nom::character::complete::char;
use nom::combinator::opt;
use nom::error::ErrorKind as NomErrorKind;
use nom::error::ParseError;

use super::error::{Error, ErrorKind};
use super::nom_recipes::rtrim;
use super::types::{Input, ParseResult};

/// A regular expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Regex {
    /// The regular expression parsed inside the `/` delimiters.
    pub expr: String,
    /// Case insensitive (`i` flag).
    pub case_insensitive: bool,
    /// `.` matches `\n` (`s` flag).
    pub dot_all: bool,
    /// Span of the regex literal.
    pub span: Range<usize>,
}

/// Parse a regular expression, e.g. `/ab.+/i`.
///
/// An escaped `/` is unescaped; any other escape sequence is kept as-is
/// for the regex engine to interpret. Newlines are not allowed.
pub(crate) fn regex(input: Input) -> ParseResult<Regex> {
    let start = input.pos();
    let (input, _) = char('/')(input)?;

    let (input, expr) = regex_contents(input)?;
    let (input, _) = char('/')(input)?;

    if expr.is_empty() {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::EmptyRegex,
        )));
    }

    let (input, no_case) = opt(char('i'))(input)?;
    let (input, dot_all) = rtrim(opt(char('s')))(input)?;

    Ok((
        input,
        Regex {
            expr,
            case_insensitive: no_case.is_some(),
            dot_all: dot_all.is_some(),
            span: input.get_span_from(start),
        },
    ))
}

/// Parse the contents between the '/' chars delimiting a regex.
fn regex_contents(mut input: Input) -> ParseResult<String> {
    let mut res = String::new();

    loop {
        let bytes = input.cursor().as_bytes();
        match bytes.first() {
            None | Some(b'/') => return Ok((input, res)),
            Some(b'\n') => {
                return Err(nom::Err::Failure(Error::from_error_kind(
                    input,
                    NomErrorKind::Fail,
                )))
            }
            Some(b'\\') => match bytes.get(1) {
                Some(b'/') => {
                    res.push('/');
                    input.advance(2);
                }
                Some(_) => {
                    // Keep the escape for the regex engine.
                    res.push('\\');
                    // Safe: a second byte implies a second char.
                    let c = input.cursor()[1..].chars().next().unwrap();
                    res.push(c);
                    input.advance(1 + c.len_utf8());
                }
                None => {
                    return Err(nom::Err::Failure(Error::from_error_kind(
                        input,
                        NomErrorKind::Fail,
                    )))
                }
            },
            Some(_) => {
                // Safe: the cursor is a str, a first byte implies a first char.
                let c = input.cursor().chars().next().unwrap();
                res.push(c);
                input.advance(c.len_utf8());
            }
        }
    }
}

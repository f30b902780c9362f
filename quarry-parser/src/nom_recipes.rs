//! Some common and useful nom recipes, shared by all other modules.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::{char, multispace1};
use nom::combinator::{cut, opt, value};
use nom::error::{ErrorKind as NomErrorKind, ParseError};
use nom::multi::many0;
use nom::sequence::tuple;

use super::error::{Error, ErrorKind};
use super::types::{Input, ParseResult};

/// Right trim after the given parser.
pub(crate) fn rtrim<'a, F, O>(mut inner: F) -> impl FnMut(Input<'a>) -> ParseResult<'a, O>
where
    F: FnMut(Input<'a>) -> ParseResult<'a, O>,
{
    move |input| {
        let (mut input, output) = inner(input)?;
        input.save_cursor_before_rtrim();
        let (input, _) = opt(many0(alt((
            multiline_comment,
            singleline_comment,
            value((), multispace1),
        ))))(input)?;
        Ok((input, output))
    }
}

/// Left trim the input.
pub(crate) fn ltrim(mut input: Input) -> ParseResult<()> {
    loop {
        match alt((
            multiline_comment,
            singleline_comment,
            value((), multispace1),
        ))(input)
        {
            Ok((i, ())) => input = i,
            Err(nom::Err::Error(_)) => return Ok((input, ())),
            err @ Err(_) => return err,
        }
    }
}

/// Accepts a single character if the passed function returns true on it.
pub(crate) fn take_one<F>(f: F) -> impl for<'a> Fn(Input<'a>) -> ParseResult<'a, char>
where
    F: Fn(char) -> bool,
{
    move |mut input| match input.cursor().chars().next().map(|c| (c, f(c))) {
        Some((c, true)) => {
            input.advance(c.len_utf8());
            Ok((input, c))
        }
        _ => Err(nom::Err::Error(Error::from_char(input, '0'))),
    }
}

/// Recognize a textual tag.
///
/// This is the same as [`nom::bytes::complete::tag`], but ensures the
/// following character is not alphanumeric, so that `foo` is not
/// recognized inside `foobar`.
pub(crate) fn textual_tag(
    tag: &'static str,
) -> impl for<'a> Fn(Input<'a>) -> ParseResult<'a, &'static str> {
    move |input: Input| {
        if let Some(input) = input.strip_prefix(tag) {
            match input.cursor().chars().next() {
                Some(c) if c.is_alphanumeric() || c == '_' => Err(nom::Err::Error(
                    Error::from_error_kind(input, NomErrorKind::Tag),
                )),
                _ => Ok((input, tag)),
            }
        } else {
            Err(nom::Err::Error(Error::from_error_kind(
                input,
                NomErrorKind::Tag,
            )))
        }
    }
}

/// Parse a C-style /* ... */ comment.
fn multiline_comment(input: Input) -> ParseResult<()> {
    value((), tuple((tag("/*"), cut(take_until("*/")), cut(tag("*/")))))(input)
}

/// Parse a single line // ... comment.
fn singleline_comment(input: Input) -> ParseResult<()> {
    value((), tuple((tag("//"), cut(take_until("\n")), cut(char('\n')))))(input)
}

/// Equivalent to [`nom::combinator::map_res`] but expects an
/// [`ErrorKind`] type of error.
///
/// This allows using the starting input to generate a proper span
/// for the error.
pub(crate) fn map_res<'a, O1, O2, F, G>(
    mut parser: F,
    mut f: G,
) -> impl FnMut(Input<'a>) -> ParseResult<'a, O2>
where
    F: FnMut(Input<'a>) -> ParseResult<'a, O1>,
    G: FnMut(O1) -> Result<O2, ErrorKind>,
{
    move |input: Input| {
        let start = input.pos();
        let (input, o1) = parser(input)?;
        match f(o1) {
            Ok(o2) => Ok((input, o2)),
            Err(kind) => Err(nom::Err::Failure(Error::new(
                input.get_span_from(start),
                kind,
            ))),
        }
    }
}

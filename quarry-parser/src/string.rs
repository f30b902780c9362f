//! Parsing related to strings and identifiers.
use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt, recognize};
use nom::error::ErrorKind as NomErrorKind;
use nom::error::ParseError;
use nom::sequence::{pair, preceded};

use super::error::Error;
use super::nom_recipes::{rtrim, take_one};
use super::types::{Input, ParseResult};

/// Returns true if the char is an identifier digit, i.e. a-z, A-Z, 0-9, _
fn is_identifier_digit(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

/// Parse the contents of an identifier string.
///
/// This is always the rest of an identifier type, where the first
/// character determines which type of identifier is being parsed.
fn identifier_contents(input: Input) -> ParseResult<String> {
    map(take_while(is_identifier_digit), |s: Input| {
        s.cursor().to_owned()
    })(input)
}

/// Parse an identifier, roughly equivalent to `[a-zA-Z_][a-zA-Z0-9_]*`.
pub(crate) fn identifier(input: Input) -> ParseResult<String> {
    rtrim(map(
        recognize(pair(
            take_one(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '_')),
            cut(take_while(is_identifier_digit)),
        )),
        |s: Input| s.cursor().to_owned(),
    ))(input)
}

/// Parse a variable name, roughly equivalent to `$[a-zA-Z0-9_]*`.
///
/// An empty name is allowed, and refers to the pattern bound by an
/// enclosing `for` expression.
pub(crate) fn string_identifier(input: Input) -> ParseResult<String> {
    rtrim(preceded(char('$'), cut(identifier_contents)))(input)
}

/// Parse a variable name with an optional trailing wildcard,
/// roughly equivalent to `$[a-zA-Z0-9_]*\*?`.
pub(crate) fn string_identifier_with_wildcard(input: Input) -> ParseResult<(String, bool)> {
    rtrim(preceded(
        char('$'),
        cut(pair(
            identifier_contents,
            map(opt(char('*')), |v| v.is_some()),
        )),
    ))(input)
}

/// Parse a variable count, roughly equivalent to `#[a-zA-Z0-9_]*`.
pub(crate) fn count(input: Input) -> ParseResult<String> {
    rtrim(preceded(char('#'), cut(identifier_contents)))(input)
}

/// Parse a variable offset, roughly equivalent to `@[a-zA-Z0-9_]*`.
pub(crate) fn offset(input: Input) -> ParseResult<String> {
    rtrim(preceded(char('@'), cut(identifier_contents)))(input)
}

/// Parse a quoted string with escapable characters.
///
/// This is roughly equivalent to the pattern `/"[^\n\"]*"/`, with
/// escape sequences `\t`, `\r`, `\n`, `\"`, `\\`, and `\x[0-9a-fA-F]{2}`.
///
/// The returned value is a byte string: escape sequences can produce
/// arbitrary bytes, not necessarily valid UTF-8.
pub(crate) fn quoted(input: Input) -> ParseResult<Vec<u8>> {
    rtrim(quoted_no_rtrim)(input)
}

fn quoted_no_rtrim(input: Input) -> ParseResult<Vec<u8>> {
    let (mut input, _) = char('"')(input)?;

    let bytes = input.cursor().as_bytes();
    let mut res = Vec::new();
    let mut i = 0;

    loop {
        let Some(&b) = bytes.get(i) else {
            // Unterminated string.
            return Err(nom::Err::Failure(Error::from_error_kind(
                input,
                NomErrorKind::Fail,
            )));
        };
        match b {
            b'"' => {
                i += 1;
                break;
            }
            b'\n' => {
                return Err(nom::Err::Failure(Error::from_error_kind(
                    input,
                    NomErrorKind::Fail,
                )))
            }
            b'\\' => {
                let escaped = match bytes.get(i + 1) {
                    Some(b't') => Some(b'\t'),
                    Some(b'r') => Some(b'\r'),
                    Some(b'n') => Some(b'\n'),
                    Some(b'"') => Some(b'"'),
                    Some(b'\\') => Some(b'\\'),
                    _ => None,
                };
                match escaped {
                    Some(c) => {
                        res.push(c);
                        i += 2;
                    }
                    None if bytes.get(i + 1) == Some(&b'x') => {
                        let digits = bytes
                            .get(i + 2)
                            .zip(bytes.get(i + 3))
                            .and_then(|(&a, &b)| {
                                let hi = (a as char).to_digit(16)?;
                                let lo = (b as char).to_digit(16)?;
                                Some((hi << 4) | lo)
                            });
                        match digits {
                            Some(v) => {
                                // Cannot truncate, the value is built from two nibbles.
                                #[allow(clippy::cast_possible_truncation)]
                                res.push(v as u8);
                                i += 4;
                            }
                            None => {
                                return Err(nom::Err::Failure(Error::from_error_kind(
                                    input,
                                    NomErrorKind::Fail,
                                )))
                            }
                        }
                    }
                    None => {
                        return Err(nom::Err::Failure(Error::from_error_kind(
                            input,
                            NomErrorKind::Fail,
                        )))
                    }
                }
            }
            c => {
                res.push(c);
                i += 1;
            }
        }
    }

    input.advance(i);
    Ok((input, res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{parse, parse_err};

    #[test]
    fn test_quoted() {
        parse(quoted, "\"\"", "", b"".to_vec());
        parse(quoted, "\"1\"b", "b", b"1".to_vec());
        parse(quoted, "\"abc +$\" b", "b", b"abc +$".to_vec());

        parse(
            quoted,
            r#"" \r \n \t \"\\a \\r""#,
            "",
            b" \r \n \t \"\\a \\r".to_vec(),
        );
        parse(quoted, r#""\x10 \x32""#, "", b"\x10 2".to_vec());
        parse(quoted, r#""\x00 \xFF""#, "", b"\x00 \xFF".to_vec());

        parse_err(quoted, "a");
        parse_err(quoted, "\"");
        parse_err(quoted, "\"\n\"");
        parse_err(quoted, r#""\a""#);
        parse_err(quoted, r#""\x1""#);
    }

    #[test]
    fn test_string_identifier() {
        parse(string_identifier, "$-", "-", "".to_owned());
        parse(string_identifier, "$a", "", "a".to_owned());
        parse(string_identifier, "$9b c", "c", "9b".to_owned());
        parse(string_identifier, "$_1Bd_F+", "+", "_1Bd_F".to_owned());

        parse_err(string_identifier, "");
        parse_err(string_identifier, "*");
    }

    #[test]
    fn test_string_identifier_with_wildcard() {
        parse(
            string_identifier_with_wildcard,
            "$a* b",
            "b",
            ("a".to_owned(), true),
        );
        parse(
            string_identifier_with_wildcard,
            "$a b",
            "b",
            ("a".to_owned(), false),
        );
        parse(string_identifier_with_wildcard, "$*", "", ("".to_owned(), true));

        parse_err(string_identifier_with_wildcard, "");
        parse_err(string_identifier_with_wildcard, "b");
    }

    #[test]
    fn test_count_and_offset() {
        parse(count, "#a", "", "a".to_owned());
        parse(count, "#", "", "".to_owned());
        parse(count, "#9b*c", "*c", "9b".to_owned());
        parse(offset, "@a", "", "a".to_owned());
        parse(offset, "@", "", "".to_owned());

        parse_err(count, "$");
        parse_err(offset, "#");
    }

    #[test]
    fn test_identifier() {
        parse(identifier, "a+", "+", "a".to_owned());
        parse(identifier, "_", "", "_".to_owned());
        parse(identifier, "A5 b", "b", "A5".to_owned());
        parse(identifier, "__1Bd_F+", "+", "__1Bd_F".to_owned());

        parse_err(identifier, "");
        parse_err(identifier, "*");
        parse_err(identifier, "$");
        parse_err(identifier, "9b");
    }
}

//! Parsing of rule declarations.
use std::collections::HashSet;
use std::ops::Range;

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt};
use nom::multi::many1;
use nom::sequence::{delimited, pair, preceded, separated_pair, tuple};

use super::error::{Error, ErrorKind};
use super::expression::{self, Expression};
use super::hex_string::{self, HexToken};
use super::nom_recipes::{map_res, rtrim, textual_tag as ttag};
use super::regex::{self, Regex};
use super::string;
use super::types::{Input, ParseResult};
use super::number;

/// A scan rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Name of the rule.
    pub name: String,

    /// Span of the rule name.
    pub name_span: Range<usize>,

    /// Tags associated with the rule.
    pub tags: Vec<String>,

    /// Metadata associated with the rule.
    pub metadatas: Vec<Metadata>,

    /// Variables associated with the rule.
    ///
    /// In YARA terms, those are the "strings" of the rule, declared in
    /// the `strings:` section. The "string" denomination is confusing in
    /// an implementation however, so they are named variables here, as
    /// they are declared with a `$` prefix.
    pub variables: Vec<VariableDeclaration>,

    /// Condition of the rule.
    pub condition: Expression,

    /// Is the rule private.
    pub is_private: bool,
    /// Is the rule global.
    pub is_global: bool,
}

/// Value associated with a metadata key.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    /// A byte string.
    Bytes(Vec<u8>),
    /// An integer.
    Number(i64),
    /// A boolean.
    Boolean(bool),
}

/// A metadata key-value, associated with a rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    /// Name of the metadata.
    pub name: String,
    /// Value of the metadata.
    pub value: MetadataValue,
}

/// Value of a variable declared in a rule.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableDeclarationValue {
    /// A byte string literal.
    Bytes(Vec<u8>),
    /// A regular expression.
    Regex(Regex),
    /// A hex string.
    HexString(Vec<HexToken>),
}

/// Modifiers applicable on a variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableModifiers {
    /// Fold the pattern and the scanned bytes to lowercase.
    pub nocase: bool,
    /// Match the raw byte encoding.
    pub ascii: bool,
    /// Match the UTF-16LE re-encoding.
    pub wide: bool,
    /// Match on word boundaries only. Accepted but not enforced.
    pub fullword: bool,
    /// Xor key range. Accepted but not enforced.
    pub xor: Option<(u8, u8)>,
    /// Match the base64 encoding.
    pub base64: bool,
    /// Match the base64 encoding, re-encoded as UTF-16LE.
    pub base64wide: bool,
    /// Custom alphabet for the base64 modifiers.
    pub base64_alphabet: Option<[u8; 64]>,
}

/// A variable declared in a rule, e.g. `$a = "abc" nocase`.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDeclaration {
    /// Name of the variable, without the `$`.
    ///
    /// An empty name is allowed and declares an anonymous variable.
    pub name: String,
    /// Value of the variable.
    pub value: VariableDeclarationValue,
    /// Modifiers of the variable.
    pub modifiers: VariableModifiers,
    /// Span of the declaration.
    pub span: Range<usize>,
}

/// Parse a rule.
pub(crate) fn rule(mut input: Input) -> ParseResult<Rule> {
    let mut is_private = false;
    let mut is_global = false;

    loop {
        match rtrim(ttag("rule"))(input) {
            Ok((i, _)) => {
                input = i;
                break;
            }
            Err(e) => {
                if let Ok((i, _)) = rtrim(ttag("private"))(input) {
                    input = i;
                    is_private = true;
                } else if let Ok((i, _)) = rtrim(ttag("global"))(input) {
                    input = i;
                    is_global = true;
                } else {
                    return Err(e);
                }
            }
        }
    }

    map(
        tuple((
            rule_name,
            opt(tags),
            delimited(
                rtrim(char('{')),
                tuple((opt(meta), opt(strings), condition)),
                rtrim(char('}')),
            ),
        )),
        move |((name, name_span), tags, (meta, strings, condition))| Rule {
            name,
            name_span,
            tags: tags.unwrap_or_default(),
            metadatas: meta.unwrap_or_default(),
            variables: strings.unwrap_or_default(),
            condition,
            is_private,
            is_global,
        },
    )(input)
}

fn rule_name(input: Input) -> ParseResult<(String, Range<usize>)> {
    let start = input.pos();
    let (input, name) = cut(string::identifier)(input)?;

    let span = input.get_span_from(start);
    Ok((input, (name, span)))
}

/// Parse the tags of a rule: `: tag1 tag2 ...`.
fn tags(input: Input) -> ParseResult<Vec<String>> {
    let (input, _) = rtrim(char(':'))(input)?;

    cut(many1(string::identifier))(input)
}

/// Parse the `meta:` section of a rule.
fn meta(input: Input) -> ParseResult<Vec<Metadata>> {
    preceded(
        pair(rtrim(ttag("meta")), rtrim(char(':'))),
        cut(many1(meta_declaration)),
    )(input)
}

/// Parse a single metadata declaration.
fn meta_declaration(input: Input) -> ParseResult<Metadata> {
    map(
        separated_pair(
            string::identifier,
            rtrim(char('=')),
            alt((
                map(string::quoted, MetadataValue::Bytes),
                map(number::number, MetadataValue::Number),
                map(preceded(rtrim(char('-')), number::number), |v| {
                    MetadataValue::Number(-v)
                }),
                map(rtrim(ttag("true")), |_| MetadataValue::Boolean(true)),
                map(rtrim(ttag("false")), |_| MetadataValue::Boolean(false)),
            )),
        ),
        |(name, value)| Metadata { name, value },
    )(input)
}

/// Parse the `strings:` section of a rule.
fn strings(input: Input) -> ParseResult<Vec<VariableDeclaration>> {
    let (input, _) = pair(rtrim(ttag("strings")), rtrim(char(':')))(input)?;
    let (mut input, mut var) = cut(string_declaration)(input)?;

    let mut existing_variables = HashSet::new();
    let mut decls = Vec::new();
    loop {
        // An empty name is an anonymous variable, it can be declared
        // several times.
        if !var.name.is_empty() && !existing_variables.insert(var.name.clone()) {
            return Err(nom::Err::Failure(Error::new(
                var.span,
                ErrorKind::StringDeclarationDuplicated { name: var.name },
            )));
        }
        decls.push(var);

        match string_declaration(input) {
            Ok((i, new_var)) => {
                input = i;
                var = new_var;
            }
            Err(nom::Err::Failure(e)) => return Err(nom::Err::Failure(e)),
            Err(_) => break,
        }
    }

    Ok((input, decls))
}

/// Parse a single variable declaration.
fn string_declaration(input: Input) -> ParseResult<VariableDeclaration> {
    let start = input.pos();
    let (input, (name, (value, modifiers))) = separated_pair(
        string::string_identifier,
        cut(rtrim(char('='))),
        cut(alt((
            pair(
                map(string::quoted, VariableDeclarationValue::Bytes),
                modifiers,
            ),
            pair(
                map(regex::regex, VariableDeclarationValue::Regex),
                modifiers,
            ),
            pair(
                map(hex_string::hex_string, VariableDeclarationValue::HexString),
                modifiers,
            ),
        ))),
    )(input)?;

    let span = input.get_span_from(start);
    Ok((
        input,
        VariableDeclaration {
            name,
            value,
            modifiers,
            span,
        },
    ))
}

/// A single parsed modifier.
#[derive(Debug, PartialEq, Eq)]
enum Modifier {
    Nocase,
    Ascii,
    Wide,
    Fullword,
    Xor(u8, u8),
    Base64(Option<[u8; 64]>),
    Base64Wide(Option<[u8; 64]>),
}

/// Accumulate modifiers after a variable declaration.
fn modifiers(mut input: Input) -> ParseResult<VariableModifiers> {
    let mut modifiers = VariableModifiers::default();

    let start = input;
    while let Ok((i, modifier)) = modifier(input) {
        let duplicated = match &modifier {
            Modifier::Nocase => std::mem::replace(&mut modifiers.nocase, true),
            Modifier::Ascii => std::mem::replace(&mut modifiers.ascii, true),
            Modifier::Wide => std::mem::replace(&mut modifiers.wide, true),
            Modifier::Fullword => std::mem::replace(&mut modifiers.fullword, true),
            Modifier::Xor(from, to) => modifiers.xor.replace((*from, *to)).is_some(),
            Modifier::Base64(alphabet) => {
                modifiers.base64_alphabet = *alphabet;
                std::mem::replace(&mut modifiers.base64, true)
            }
            Modifier::Base64Wide(alphabet) => {
                modifiers.base64_alphabet = *alphabet;
                std::mem::replace(&mut modifiers.base64wide, true)
            }
        };
        if duplicated {
            return Err(nom::Err::Failure(Error::new(
                input.get_span_from(start.pos()),
                ErrorKind::ModifiersDuplicated {
                    modifier_name: format!("{modifier:?}"),
                },
            )));
        }
        input = i;
    }

    Ok((input, modifiers))
}

fn modifier(input: Input) -> ParseResult<Modifier> {
    alt((
        map(rtrim(ttag("nocase")), |_| Modifier::Nocase),
        map(rtrim(ttag("ascii")), |_| Modifier::Ascii),
        map(rtrim(ttag("wide")), |_| Modifier::Wide),
        map(rtrim(ttag("fullword")), |_| Modifier::Fullword),
        xor_modifier,
        base64_modifier,
    ))(input)
}

/// Parse a xor modifier:
///
/// - `'xor'`
/// - `'xor' '(' number ')'`
/// - `'xor' '(' number '-' number ')'`
fn xor_modifier(input: Input) -> ParseResult<Modifier> {
    let (input, _) = rtrim(ttag("xor"))(input)?;

    let start = input;
    let (input, open_paren) = opt(rtrim(char('(')))(input)?;
    if open_paren.is_none() {
        return Ok((input, Modifier::Xor(0, 255)));
    }

    let (input, from) = cut(map_res(number::number, number_to_u8))(input)?;

    let (input, to) = cut(nom::sequence::terminated(
        opt(preceded(
            rtrim(char('-')),
            map_res(number::number, number_to_u8),
        )),
        rtrim(char(')')),
    ))(input)?;

    let res = match to {
        Some(to) => {
            if to < from {
                return Err(nom::Err::Failure(Error::new(
                    input.get_span_from(start.pos()),
                    ErrorKind::XorRangeInvalid { from, to },
                )));
            }
            Modifier::Xor(from, to)
        }
        None => Modifier::Xor(from, from),
    };
    Ok((input, res))
}

/// Parse a base64 modifier:
///
/// - `'base64(wide)'`
/// - `'base64(wide)' '(' alphabet ')'`
fn base64_modifier(input: Input) -> ParseResult<Modifier> {
    let (input, is_wide) = rtrim(alt((
        map(ttag("base64wide"), |_| true),
        map(ttag("base64"), |_| false),
    )))(input)?;

    let (mut input, open_paren) = opt(rtrim(char('(')))(input)?;

    let mut alphabet: Option<[u8; 64]> = None;
    if open_paren.is_some() {
        let start = input.pos();
        let (input2, val) = cut(string::quoted)(input)?;
        match val.as_slice().try_into() {
            Ok(v) => alphabet = Some(v),
            Err(_) => {
                return Err(nom::Err::Failure(Error::new(
                    input2.get_span_from(start),
                    ErrorKind::Base64AlphabetInvalidLength { length: val.len() },
                )));
            }
        }
        let (input2, _) = cut(rtrim(char(')')))(input2)?;
        input = input2;
    }

    Ok((
        input,
        if is_wide {
            Modifier::Base64Wide(alphabet)
        } else {
            Modifier::Base64(alphabet)
        },
    ))
}

fn number_to_u8(value: i64) -> Result<u8, ErrorKind> {
    u8::try_from(value).map_err(|_| ErrorKind::XorRangeInvalidValue { value })
}

/// Parse the condition of a rule.
fn condition(input: Input) -> ParseResult<Expression> {
    let (input, _) = rtrim(ttag("condition"))(input)?;
    cut(preceded(rtrim(char(':')), expression::expression))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionKind;
    use crate::test_helpers::{parse, parse_err};

    #[test]
    fn test_tags() {
        parse(
            tags,
            ": a _ a8 {",
            "{",
            vec!["a".to_owned(), "_".to_owned(), "a8".to_owned()],
        );
        parse(tags, ": b 8", "8", vec!["b".to_owned()]);

        parse_err(tags, "");
        parse_err(tags, ":");
        parse_err(tags, ": {");
    }

    #[test]
    fn test_meta() {
        parse(
            meta,
            "meta : a = 3 b =-4 _=true d",
            "d",
            vec![
                Metadata {
                    name: "a".to_owned(),
                    value: MetadataValue::Number(3),
                },
                Metadata {
                    name: "b".to_owned(),
                    value: MetadataValue::Number(-4),
                },
                Metadata {
                    name: "_".to_owned(),
                    value: MetadataValue::Boolean(true),
                },
            ],
        );
        parse(
            meta,
            "meta:\n  a = \" a\rb \"  \n  b= false \n  strings",
            "strings",
            vec![
                Metadata {
                    name: "a".to_owned(),
                    value: MetadataValue::Bytes(b" a\rb ".to_vec()),
                },
                Metadata {
                    name: "b".to_owned(),
                    value: MetadataValue::Boolean(false),
                },
            ],
        );

        parse_err(meta, "");
        parse_err(meta, "meta");
        parse_err(meta, "meta:");
    }

    #[test]
    fn test_modifiers() {
        parse(
            modifiers,
            "nocase fullword Xor",
            "Xor",
            VariableModifiers {
                nocase: true,
                fullword: true,
                ..VariableModifiers::default()
            },
        );
        parse(
            modifiers,
            "wide ascii",
            "",
            VariableModifiers {
                wide: true,
                ascii: true,
                ..VariableModifiers::default()
            },
        );
        parse(
            modifiers,
            "xor ( 15 )",
            "",
            VariableModifiers {
                xor: Some((15, 15)),
                ..VariableModifiers::default()
            },
        );
        parse(
            modifiers,
            "xor (50 - 120) base64wide",
            "",
            VariableModifiers {
                xor: Some((50, 120)),
                base64wide: true,
                ..VariableModifiers::default()
            },
        );
        parse(
            modifiers,
            "base64 nocase",
            "",
            VariableModifiers {
                base64: true,
                nocase: true,
                ..VariableModifiers::default()
            },
        );

        parse_err(modifiers, "nocase nocase");
        parse_err(modifiers, "wide ascii wide");
    }

    #[test]
    fn test_xor_modifier() {
        parse(xor_modifier, "xor a", "a", Modifier::Xor(0, 255));
        parse(xor_modifier, "xor(23)", "", Modifier::Xor(23, 23));
        parse(xor_modifier, "xor ( 12 -15 )b", "b", Modifier::Xor(12, 15));

        parse_err(xor_modifier, "");
        parse_err(xor_modifier, "xora");
        parse_err(xor_modifier, "xor(");
        parse_err(xor_modifier, "xor(13");
        parse_err(xor_modifier, "xor()");
        parse_err(xor_modifier, "xor(256)");
        parse_err(xor_modifier, "xor(50-4)");
    }

    #[test]
    fn test_base64_modifier() {
        let alphabet = "!@#$%^&*(){}[].,|ABCDEFGHIJ\x09LMNOPQRSTUVWXYZabcdefghijklmnopqrstu";
        let alphabet_array: [u8; 64] = alphabet.as_bytes().try_into().unwrap();

        parse(base64_modifier, "base64 a", "a", Modifier::Base64(None));
        parse(
            base64_modifier,
            "base64wide a",
            "a",
            Modifier::Base64Wide(None),
        );
        parse(
            base64_modifier,
            &format!(r#"base64("{alphabet}")"#),
            "",
            Modifier::Base64(Some(alphabet_array)),
        );
        parse(
            base64_modifier,
            &format!(r#"base64wide ( "{alphabet}")b"#),
            "b",
            Modifier::Base64Wide(Some(alphabet_array)),
        );

        parse_err(base64_modifier, "");
        parse_err(base64_modifier, "base64a");
        parse_err(base64_modifier, "base64(\"123\")");
    }

    #[test]
    fn test_strings() {
        parse(
            strings,
            "strings : $a = \"b\td\" xor ascii \n  $b= /a?b/  $= { ?? 4B} d",
            "d",
            vec![
                VariableDeclaration {
                    name: "a".to_owned(),
                    value: VariableDeclarationValue::Bytes(b"b\td".to_vec()),
                    modifiers: VariableModifiers {
                        xor: Some((0, 255)),
                        ascii: true,
                        ..VariableModifiers::default()
                    },
                    span: 10..30,
                },
                VariableDeclaration {
                    name: "b".to_owned(),
                    value: VariableDeclarationValue::Regex(Regex {
                        expr: "a?b".to_owned(),
                        case_insensitive: false,
                        dot_all: false,
                        span: 38..43,
                    }),
                    modifiers: VariableModifiers::default(),
                    span: 34..43,
                },
                VariableDeclaration {
                    name: String::new(),
                    value: VariableDeclarationValue::HexString(vec![
                        HexToken::Wildcard,
                        HexToken::Byte(0x4B),
                    ]),
                    modifiers: VariableModifiers::default(),
                    span: 45..56,
                },
            ],
        );

        parse_err(strings, "");
        parse_err(strings, "strings");
        parse_err(strings, "strings:");

        parse_err(strings, "strings: $a = /a/ $b = /b/ $a = /c/");
    }

    #[test]
    fn test_rule() {
        parse(
            rule,
            "rule a { condition: false }",
            "",
            Rule {
                name: "a".to_owned(),
                name_span: 5..6,
                condition: Expression {
                    kind: ExpressionKind::Boolean(false),
                    span: 20..25,
                },
                tags: Vec::new(),
                metadatas: Vec::new(),
                variables: Vec::new(),
                is_private: false,
                is_global: false,
            },
        );

        parse(
            rule,
            "private global rule b : tag1 tag2 { strings: $b = \"t\" condition: all of them }",
            "",
            Rule {
                name: "b".to_owned(),
                name_span: 20..21,
                tags: vec!["tag1".to_owned(), "tag2".to_owned()],
                metadatas: Vec::new(),
                variables: vec![VariableDeclaration {
                    name: "b".to_owned(),
                    value: VariableDeclarationValue::Bytes(b"t".to_vec()),
                    modifiers: VariableModifiers::default(),
                    span: 45..53,
                }],
                condition: Expression {
                    kind: ExpressionKind::Of {
                        selection: crate::expression::ForSelection::All,
                        set: crate::expression::VariableSet { elements: vec![] },
                    },
                    span: 65..76,
                },
                is_private: true,
                is_global: true,
            },
        );

        parse_err(rule, "");
        parse_err(rule, "rule");
        parse_err(rule, "rule {}");
        parse_err(rule, "rule a {}");
        parse_err(rule, "rule b { condition true }");
        parse_err(rule, "rule c { condition: true");

        // Declaration order is fixed.
        parse_err(
            rule,
            "rule c { strings: $a = /a/ meta: a = 3 condition: true }",
        );
    }

    // Test that keywords are parsed as textual tags.
    #[test]
    fn test_textual_keywords() {
        parse_err(rule, "rulea{condition:true}");
        parse_err(rule, "privaterule a{condition:true}");
        parse_err(rule, "globalrule a{condition:true}");

        parse_err(meta, "meta: a=trueb=false");

        parse_err(modifier, "widexor");
        parse_err(modifier, "base64xor");
    }
}

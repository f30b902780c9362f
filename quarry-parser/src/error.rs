//! Parsing error types.
use std::num::ParseIntError;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use nom::error::{ErrorKind as NomErrorKind, ParseError};

use super::types::Input;

/// Parsing error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    /// Span of the error, in bytes from the start of the parsed input.
    span: Range<usize>,

    /// Kind of the error.
    kind: ErrorKind,
}

impl Error {
    #[must_use]
    pub(crate) fn new(span: Range<usize>, kind: ErrorKind) -> Self {
        Self { span, kind }
    }

    /// Convert to a [`Diagnostic`].
    ///
    /// This can be used to display the error in a user-friendly manner.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match &self.kind {
            ErrorKind::Base64AlphabetInvalidLength { length } => Diagnostic::error()
                .with_message("base64 modifier alphabet must contain exactly 64 characters")
                .with_labels(vec![Label::primary((), self.span.clone())
                    .with_message(format!("this contains {length} characters"))]),

            ErrorKind::EmptyRegex => Diagnostic::error()
                .with_message("regex expression cannot be empty")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::ExprTooDeep => Diagnostic::error()
                .with_message("too many imbricated expressions")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::JumpAtBound => Diagnostic::error()
                .with_message("a hex string cannot start or end with a jump")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::JumpEmpty => Diagnostic::error()
                .with_message("jump cannot have a length of 0")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::JumpRangeInvalid { from, to } => Diagnostic::error()
                .with_message(format!("invalid range for the jump: {from} > {to}"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::ModifiersDuplicated { modifier_name } => Diagnostic::error()
                .with_message(format!(
                    "string modifier {modifier_name} appears multiple times"
                ))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::NomError(_) => Diagnostic::error()
                .with_message("syntax error")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::StrToIntError(err) => Diagnostic::error()
                .with_message(format!("error converting to integer: {err}"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::StrToHexIntError(err) => Diagnostic::error()
                .with_message(format!(
                    "error converting hexadecimal notation to integer: {err}"
                ))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::StringDeclarationDuplicated { name } => Diagnostic::error()
                .with_message(format!("string ${name} is declared multiple times"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::MulOverflow { left, right } => Diagnostic::error()
                .with_message(format!("multiplication {left} * {right} overflows"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::XorRangeInvalid { from, to } => Diagnostic::error()
                .with_message(format!("xor range invalid: {from} > {to}"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            ErrorKind::XorRangeInvalidValue { value } => Diagnostic::error()
                .with_message(format!(
                    "xor range value {value} invalid, must be in [0-255]"
                ))
                .with_labels(vec![Label::primary((), self.span.clone())]),
        }
    }

    fn from_nom_error_kind(position: usize, kind: NomErrorKind) -> Self {
        Self {
            span: Range {
                start: position,
                end: position + 1,
            },
            kind: ErrorKind::NomError(kind),
        }
    }
}

impl ParseError<Input<'_>> for Error {
    fn from_error_kind(input: Input, kind: NomErrorKind) -> Self {
        Self::from_nom_error_kind(input.get_position_offset(), kind)
    }

    fn append(_: Input, _: NomErrorKind, other: Self) -> Self {
        other
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// A base64 modifier alphabet has an invalid length, it must be 64.
    Base64AlphabetInvalidLength { length: usize },

    /// A regex between two '/' has no content.
    EmptyRegex,

    /// An expression contains too many imbricated subexpressions.
    ExprTooDeep,

    /// A jump is not allowed at the beginning or end of a hex string.
    JumpAtBound,

    /// Jump of an empty size, i.e. `[0-0]`.
    JumpEmpty,

    /// Jump with an invalid range, i.e. `from` > `to`.
    JumpRangeInvalid { from: u32, to: u32 },

    /// Duplicated string modifier.
    ModifiersDuplicated { modifier_name: String },

    /// Overflow on a multiplication.
    MulOverflow { left: i64, right: i64 },

    /// Generic error from nom parsing utilities.
    NomError(NomErrorKind),

    /// Error converting a string to an integer.
    StrToIntError(ParseIntError),

    /// Error converting a string to an integer in base 16.
    StrToHexIntError(ParseIntError),

    /// Two strings with the same name declared in a single rule.
    StringDeclarationDuplicated { name: String },

    /// Xor modifier with an invalid range, i.e. `from` > `to`.
    XorRangeInvalid { from: u8, to: u8 },

    /// A value used in a xor modifier range is outside the [0-255] range.
    XorRangeInvalidValue { value: i64 },
}

//! Errors and warnings raised while compiling rules.
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use super::pattern::VariableCompilationError;

/// Error while compiling a rule.
#[derive(Debug)]
pub struct CompilationError {
    /// Kind of the error.
    pub(crate) kind: CompilationErrorKind,
    /// Span of the part of the input comprising the error.
    pub(crate) span: Range<usize>,
}

#[derive(Debug)]
pub(crate) enum CompilationErrorKind {
    /// A rule with the same name was already compiled.
    DuplicatedRuleName(String),

    /// Reference to a variable not declared in the rule.
    UnknownVariable { name: String },

    /// Use of `$`, `#` or `@` outside the body of a `for` over a set of
    /// variables.
    UnboundAnonymousVariable,

    /// Reference to an identifier not bound by an enclosing `for`.
    UnknownIdentifier { name: String },

    /// A `for` expression with a selection that cannot conclude a loop.
    UnsupportedForSelection,

    /// Error while lowering a variable into patterns.
    VariableCompilation {
        /// Name of the variable.
        variable_name: String,
        /// The error.
        error: VariableCompilationError,
    },
}

impl CompilationError {
    /// Convert to a [`Diagnostic`], for user-friendly display.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match &self.kind {
            CompilationErrorKind::DuplicatedRuleName(name) => Diagnostic::error()
                .with_message(format!("rule `{name}` is already declared"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            CompilationErrorKind::UnknownVariable { name } => Diagnostic::error()
                .with_message(format!("unknown variable ${name}"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            CompilationErrorKind::UnboundAnonymousVariable => Diagnostic::error()
                .with_message("anonymous variable used outside of a for expression")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            CompilationErrorKind::UnknownIdentifier { name } => Diagnostic::error()
                .with_message(format!("unknown identifier `{name}`"))
                .with_labels(vec![Label::primary((), self.span.clone())]),

            CompilationErrorKind::UnsupportedForSelection => Diagnostic::error()
                .with_message("this selection cannot be used in a for expression")
                .with_labels(vec![Label::primary((), self.span.clone())]),

            CompilationErrorKind::VariableCompilation {
                variable_name,
                error,
            } => Diagnostic::error()
                .with_message(format!("unable to compile variable ${variable_name}: {error}"))
                .with_labels(vec![Label::primary((), self.span.clone())]),
        }
    }
}

/// Warning raised while compiling rules.
///
/// Warnings do not prevent compilation, but point at rules that will
/// scan slowly or behave unexpectedly.
#[derive(Debug)]
pub struct Warning {
    pub(crate) kind: WarningKind,
    pub(crate) span: Range<usize>,
}

#[derive(Debug)]
pub(crate) enum WarningKind {
    /// The guaranteed literal prefix of a regex is short.
    ///
    /// Every occurrence of the prefix triggers a run of the full regex,
    /// a short prefix makes those runs frequent.
    ShortRegexPrefix { length: usize },
}

impl Warning {
    /// Convert to a [`Diagnostic`], for user-friendly display.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match &self.kind {
            WarningKind::ShortRegexPrefix { length } => Diagnostic::warning()
                .with_message(format!(
                    "slow regex: the literal prefix is only {length} bytes long, \
                     it should be at least 6 bytes"
                ))
                .with_labels(vec![Label::primary((), self.span.clone())]),
        }
    }
}

//! Compilation of parsed rules into their executable form.
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;

mod base64;
mod condition;
mod error;
pub(crate) mod pattern;

pub use error::{CompilationError, Warning};

use crate::bytecode::Op;
use crate::Scanner;
use error::CompilationErrorKind;
use pattern::{dedup_key, encode_variable, PatternSet};

/// Object used to compile rules.
///
/// Rules are added from their textual form, then every added rule is
/// turned into a [`Scanner`] with [`Compiler::into_scanner`].
#[derive(Debug, Default)]
pub struct Compiler {
    /// Compiled rules, in declaration order.
    rules: Vec<Rule>,

    /// Every distinct pattern set, indexed by match index.
    patterns: Vec<PatternSet>,

    /// Map from the canonical form of a declaration to the match index
    /// of its patterns. Identical declarations share their match index
    /// and are only inserted once in the automaton.
    dedup: HashMap<[u8; 32], usize>,

    /// Names of the compiled rules, to reject duplicates.
    rule_names: HashSet<String>,

    /// Warnings accumulated while compiling.
    warnings: Vec<Warning>,
}

/// A compiled rule.
#[derive(Debug)]
pub(crate) struct Rule {
    /// Name of the rule.
    pub(crate) name: String,

    /// Tags of the rule.
    pub(crate) tags: Vec<String>,

    /// Instructions of the compiled condition.
    pub(crate) ops: Vec<Op>,

    /// Variables of the rule, as `(name, match_index)`, in declaration
    /// order.
    pub(crate) variables: Vec<(String, usize)>,

    /// A private rule is evaluated but never reported.
    pub(crate) is_private: bool,

    /// When a global rule does not match, non-global matches are
    /// suppressed for the scan.
    pub(crate) is_global: bool,
}

impl Compiler {
    /// Create a new object to compile rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules to compile from their textual declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or compilation of any rule fails.
    /// Rules added before the failing one stay compiled.
    pub fn add_rules_str(&mut self, s: &str) -> Result<(), AddRuleError> {
        let file = quarry_parser::parse(s).map_err(AddRuleError::ParseError)?;

        for rule in file.rules {
            self.add_rule(rule).map_err(AddRuleError::CompilationError)?;
        }
        Ok(())
    }

    /// Warnings accumulated while compiling rules.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn add_rule(&mut self, rule: quarry_parser::rule::Rule) -> Result<(), CompilationError> {
        if self.rule_names.contains(&rule.name) {
            return Err(CompilationError {
                kind: CompilationErrorKind::DuplicatedRuleName(rule.name),
                span: rule.name_span,
            });
        }

        let mut variables = Vec::with_capacity(rule.variables.len());
        for decl in &rule.variables {
            let match_index = match self.dedup.entry(dedup_key(decl)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let encoded =
                        encode_variable(decl, &mut self.warnings).map_err(|error| {
                            CompilationError {
                                kind: CompilationErrorKind::VariableCompilation {
                                    variable_name: decl.name.clone(),
                                    error,
                                },
                                span: decl.span.clone(),
                            }
                        })?;
                    let match_index = self.patterns.len();
                    self.patterns.push(PatternSet {
                        match_index,
                        name: format!("{}_{}", rule.name, decl.name),
                        nocase: encoded.nocase,
                        variants: encoded.variants,
                    });
                    let _ = entry.insert(match_index);
                    match_index
                }
            };
            variables.push((decl.name.clone(), match_index));
        }

        let ops = condition::compile_condition(&variables, &rule.condition)?;

        let _ = self.rule_names.insert(rule.name.clone());
        self.rules.push(Rule {
            name: rule.name,
            tags: rule.tags,
            ops,
            variables,
            is_private: rule.is_private,
            is_global: rule.is_global,
        });
        Ok(())
    }

    /// Turn every compiled rule into a scanner.
    #[must_use]
    pub fn into_scanner(self) -> Scanner {
        Scanner::new(self.rules, self.patterns)
    }
}

/// Error while adding rules to a [`Compiler`].
#[derive(Debug)]
pub enum AddRuleError {
    /// Error while parsing the rules.
    ParseError(quarry_parser::error::Error),
    /// Error while compiling a rule.
    CompilationError(CompilationError),
}

impl AddRuleError {
    /// Convert to a displayable, single-lined description.
    ///
    /// # Arguments
    ///
    /// * `input_name`: a name for the input, used at the beginning of
    ///   the description: `<filename>:<line>:<column>: <description>`.
    /// * `input`: the rules string that generated the error.
    #[must_use]
    pub fn to_short_description(&self, input_name: &str, input: &str) -> String {
        // Generate a small report using codespan_reporting.
        let mut writer = term::termcolor::Buffer::no_color();
        let config = term::Config {
            display_style: term::DisplayStyle::Short,
            ..term::Config::default()
        };

        let files = SimpleFile::new(&input_name, &input);
        let _res = term::emit(&mut writer, &config, &files, &self.to_diagnostic());
        String::from_utf8_lossy(writer.as_slice()).to_string()
    }

    /// Convert to a [`Diagnostic`].
    ///
    /// This can be used to display the error in a user-friendly manner,
    /// with the faulty part of the rule highlighted.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            Self::ParseError(err) => err.to_diagnostic(),
            Self::CompilationError(err) => err.to_diagnostic(),
        }
    }
}

impl std::fmt::Display for AddRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.to_diagnostic().message)
    }
}

impl std::error::Error for AddRuleError {}

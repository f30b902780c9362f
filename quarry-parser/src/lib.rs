//! Parser for quarry scan rules.
//!
//! This crate is designed to be used by the `quarry` crate, which
//! compiles and evaluates the parsed rules.
//!
//! It exposes a main entrypoint function, [`parse`], which parses the
//! contents of a rules file.
//!
//! ```rust
//! use quarry_parser::expression::ExpressionKind;
//!
//! let file = quarry_parser::parse(r#"
//! private rule b : tag1 {
//!     meta:
//!         a = true
//!     strings:
//!         $b = "\\mspaint.exe" wide
//!     condition:
//!         all of them
//! }"#)?;
//!
//! let rule = &file.rules[0];
//! assert_eq!(rule.name, "b");
//! assert!(rule.is_private);
//! assert!(rule.variables[0].modifiers.wide);
//! assert!(matches!(rule.condition.kind, ExpressionKind::Of { .. }));
//! # Ok::<(), quarry_parser::error::Error>(())
//! ```

// Parsing uses the [`nom`] crate, adapted for textual parsing.
//
// All of the parsing functions, unless otherwise indicated, depend on the
// following invariants:
// - The received input has already been left-trimmed
// - The returned input is right-trimmed
// The [`nom_recipes::rtrim`] function is provided to make this easier.

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod expression;
pub mod file;
pub mod hex_string;
mod nom_recipes;
mod number;
pub mod regex;
pub mod rule;
mod string;
mod types;

/// Parse a rules file.
///
/// # Errors
///
/// Returns an error if the parsing fails, or if there is trailing
/// data in the file that has not been parsed.
pub fn parse(input: &str) -> Result<file::RuleFile, error::Error> {
    use nom::Finish;

    let input = types::Input::new(input);
    let (_, file) = file::parse_rule_file(input).finish()?;

    Ok(file)
}

#[cfg(test)]
mod test_helpers;

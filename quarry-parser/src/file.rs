//! Parsing of a whole rules file.
use nom::combinator::cut;
use nom::sequence::preceded;

use super::nom_recipes::{ltrim, rtrim, textual_tag as ttag};
use super::rule::{rule, Rule};
use super::string;
use super::types::{Input, ParseResult};

/// A parsed rules file.
#[derive(Debug, PartialEq)]
pub struct RuleFile {
    /// Names of the imported modules.
    ///
    /// Imports are accepted by the parser but have no effect on
    /// compilation: there is no module namespace.
    pub imports: Vec<String>,

    /// Rules declared in the file, in declaration order.
    pub rules: Vec<Rule>,
}

/// Parse a full rules file.
pub(crate) fn parse_rule_file(input: Input) -> ParseResult<RuleFile> {
    let (mut input, ()) = ltrim(input)?;

    let mut file = RuleFile {
        imports: Vec::new(),
        rules: Vec::new(),
    };
    while !input.is_empty() {
        if let Ok((i, import)) = import(input) {
            file.imports.push(import);
            input = i;
        } else {
            let (i, rule) = rule(input)?;
            file.rules.push(rule);
            input = i;
        }
    }

    Ok((input, file))
}

/// Parse an import declaration.
fn import(input: Input) -> ParseResult<String> {
    let (input, quoted) = preceded(rtrim(ttag("import")), cut(string::quoted))(input)?;

    // Module names are identifiers, they are always valid UTF-8.
    match String::from_utf8(quoted) {
        Ok(name) => Ok((input, name)),
        Err(err) => Ok((input, String::from_utf8_lossy(err.as_bytes()).into_owned())),
    }
}

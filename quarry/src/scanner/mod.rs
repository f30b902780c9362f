//! Provides the [`Scanner`] object which scans bytes against a set of
//! compiled rules.
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::compiler::pattern::PatternSet;
use crate::compiler::Rule;
use crate::evaluator::{self, EvalContext};
use crate::matcher::AcAutomaton;

pub use crate::evaluator::EvalFault;

/// Match offsets per pattern, indexed by match index.
///
/// Built fresh for every scan: the compiled state never changes after
/// compilation.
pub(crate) type MatchTable = Vec<Vec<usize>>;

/// Holds compiled rules and provides methods to scan bytes against them.
///
/// The scanner is immutable once built and can be shared between
/// threads: concurrent calls to [`Scanner::scan_mem`] each own their
/// scan state.
#[derive(Debug)]
pub struct Scanner {
    /// Compiled rules, in declaration order.
    rules: Vec<Rule>,

    /// Every distinct pattern set, indexed by match index.
    patterns: Vec<PatternSet>,

    /// Automaton over the case-sensitive patterns, if any.
    automaton: Option<AcAutomaton>,

    /// Automaton over the case-insensitive patterns, if any. Input bytes
    /// are folded during its traversal.
    automaton_nocase: Option<AcAutomaton>,

    /// Parameters applied to every scan.
    params: ScanParams,
}

/// Parameters modifying the behavior of scans.
#[derive(Clone, Debug, Default)]
pub struct ScanParams {
    string_matches: bool,
    stop: Option<Arc<AtomicBool>>,
}

impl ScanParams {
    /// Report the match offsets of every string of a matched rule.
    #[must_use]
    pub fn string_matches(mut self, string_matches: bool) -> Self {
        self.string_matches = string_matches;
        self
    }

    /// Cooperative cancellation flag.
    ///
    /// The flag is polled during scans; once set, the running scan
    /// returns [`ScanError::Cancelled`] with no partial results. It can
    /// be used by a caller to enforce a timeout.
    #[must_use]
    pub fn stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }
}

/// Result of a scan.
#[derive(Debug)]
pub struct ScanResult<'scanner> {
    /// Rules that matched, in declaration order.
    pub matched_rules: Vec<MatchedRule<'scanner>>,
}

/// Description of a rule that matched during a scan.
#[derive(Debug)]
pub struct MatchedRule<'scanner> {
    /// Name of the rule.
    pub name: &'scanner str,

    /// Tags of the rule.
    pub tags: &'scanner [String],

    /// Match details of the strings of the rule.
    ///
    /// Only filled when [`ScanParams::string_matches`] is set.
    pub strings: Vec<StringMatches<'scanner>>,
}

/// Match offsets of a single string of a matched rule.
#[derive(Debug)]
pub struct StringMatches<'scanner> {
    /// Name of the string, without the `$`.
    pub name: &'scanner str,

    /// Offsets of its matches in the scanned bytes, in ascending order.
    pub offsets: Vec<usize>,
}

/// Error while scanning.
#[derive(Debug)]
pub enum ScanError {
    /// The scan was cancelled through the stop flag.
    Cancelled,

    /// Internal fault while evaluating a rule condition.
    Fault {
        /// Name of the rule being evaluated.
        rule: String,
        /// The fault.
        fault: EvalFault,
    },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "scan cancelled"),
            Self::Fault { rule, fault } => {
                write!(f, "internal fault while evaluating rule {rule}: {fault}")
            }
        }
    }
}

impl std::error::Error for ScanError {}

impl Scanner {
    pub(crate) fn new(rules: Vec<Rule>, patterns: Vec<PatternSet>) -> Self {
        let automaton = AcAutomaton::build(&patterns, false);
        let automaton_nocase = AcAutomaton::build(&patterns, true);

        Self {
            rules,
            patterns,
            automaton: (!automaton.is_empty()).then_some(automaton),
            automaton_nocase: (!automaton_nocase.is_empty()).then_some(automaton_nocase),
            params: ScanParams::default(),
        }
    }

    /// Set the parameters applied to every subsequent scan.
    pub fn set_scan_params(&mut self, params: ScanParams) {
        self.params = params;
    }

    /// Scan a byte slice, returning the rules that matched on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan is cancelled through the stop flag,
    /// or on an internal evaluation fault.
    pub fn scan_mem(&self, mem: &[u8]) -> Result<ScanResult, ScanError> {
        let stop = self.params.stop.as_deref();

        let mut matches: MatchTable = vec![Vec::new(); self.patterns.len()];
        if let Some(automaton) = &self.automaton {
            automaton.scan(mem, &mut matches, stop)?;
        }
        if let Some(automaton) = &self.automaton_nocase {
            automaton.scan(mem, &mut matches, stop)?;
        }

        let statics = [mem.len() as i64];
        let ctx = EvalContext {
            matches: &matches,
            statics: &statics,
        };

        let mut verdicts = Vec::with_capacity(self.rules.len());
        let mut global_failure = false;
        for rule in &self.rules {
            if let Some(stop) = stop {
                if stop.load(Ordering::Relaxed) {
                    return Err(ScanError::Cancelled);
                }
            }

            let matched =
                evaluator::evaluate(&rule.ops, &ctx).map_err(|fault| ScanError::Fault {
                    rule: rule.name.clone(),
                    fault,
                })?;
            if rule.is_global && !matched {
                global_failure = true;
            }
            verdicts.push(matched);
        }

        let mut matched_rules = Vec::new();
        for (rule, matched) in self.rules.iter().zip(verdicts) {
            if !matched || rule.is_private {
                continue;
            }
            // A failed global rule suppresses every non-global match.
            if global_failure && !rule.is_global {
                continue;
            }

            matched_rules.push(MatchedRule {
                name: &rule.name,
                tags: &rule.tags,
                strings: if self.params.string_matches {
                    rule.variables
                        .iter()
                        .map(|(name, match_index)| StringMatches {
                            name,
                            offsets: matches[*match_index].clone(),
                        })
                        .collect()
                } else {
                    Vec::new()
                },
            });
        }

        Ok(ScanResult { matched_rules })
    }

    /// Dump the compiled instructions and patterns.
    ///
    /// The format is meant for debugging and is not stable.
    #[must_use]
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "instructions");
        for rule in &self.rules {
            let _ = writeln!(out, "    rule {}", rule.name);
            for (addr, op) in rule.ops.iter().enumerate() {
                let _ = writeln!(out, "        {addr}: {op}");
            }
        }

        let _ = writeln!(out, "patterns");
        for set in &self.patterns {
            for variant in &set.variants {
                let mut bytes = String::new();
                for b in &variant.bytes {
                    let _ = write!(bytes, "{b:02x} ");
                }
                let mut notes = String::new();
                if set.nocase {
                    notes.push_str(" nocase");
                }
                if variant.full.is_some() {
                    notes.push_str(" partial");
                }
                if variant.regex.is_some() {
                    notes.push_str(" regex");
                }
                let _ = writeln!(
                    out,
                    "    {} [{}] = {bytes}{notes}",
                    set.name, set.match_index
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Compiler;

    fn scanner(rules: &str) -> Scanner {
        let mut compiler = Compiler::new();
        compiler.add_rules_str(rules).unwrap();
        compiler.into_scanner()
    }

    fn matched(scanner: &Scanner, mem: &[u8]) -> Vec<String> {
        scanner
            .scan_mem(mem)
            .unwrap()
            .matched_rules
            .iter()
            .map(|rule| rule.name.to_owned())
            .collect()
    }

    #[test]
    fn test_scan_outputs_in_declaration_order() {
        let scanner = scanner(
            r#"
rule first { strings: $a = "aaa" condition: $a }
rule second { strings: $b = "bbb" condition: $b }
rule third { condition: true }
"#,
        );

        assert_eq!(matched(&scanner, b"bbb aaa"), ["first", "second", "third"]);
        assert_eq!(matched(&scanner, b"bbb"), ["second", "third"]);
        assert_eq!(matched(&scanner, b""), ["third"]);
    }

    #[test]
    fn test_private_rules_are_suppressed() {
        let scanner = scanner(
            r#"
private rule hidden { strings: $a = "aaa" condition: $a }
rule visible { strings: $a = "aaa" condition: $a }
"#,
        );

        assert_eq!(matched(&scanner, b"aaa"), ["visible"]);
    }

    #[test]
    fn test_global_rules_gate_others() {
        let scanner = scanner(
            r#"
global rule gate { strings: $g = "gate" condition: $g }
rule r { strings: $a = "aaa" condition: $a }
"#,
        );

        assert_eq!(matched(&scanner, b"gate aaa"), ["gate", "r"]);
        assert_eq!(matched(&scanner, b"aaa"), Vec::<String>::new());
        assert_eq!(matched(&scanner, b"gate"), ["gate"]);
    }

    #[test]
    fn test_string_matches_reporting() {
        let mut scanner = scanner(
            r#"
rule r { strings: $a = "aa" $b = "zz" condition: $a }
"#,
        );
        scanner.set_scan_params(ScanParams::default().string_matches(true));

        let res = scanner.scan_mem(b"aa aa").unwrap();
        assert_eq!(res.matched_rules.len(), 1);
        let strings = &res.matched_rules[0].strings;
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].name, "a");
        assert_eq!(strings[0].offsets, [0, 3]);
        assert_eq!(strings[1].name, "b");
        assert_eq!(strings[1].offsets, Vec::<usize>::new());
    }

    #[test]
    fn test_cancellation_between_rules() {
        let mut scanner = scanner("rule r { condition: true }");
        let stop = Arc::new(AtomicBool::new(true));
        scanner.set_scan_params(ScanParams::default().stop_flag(Arc::clone(&stop)));

        assert!(matches!(scanner.scan_mem(b"x"), Err(ScanError::Cancelled)));

        stop.store(false, Ordering::Relaxed);
        assert_eq!(scanner.scan_mem(b"x").unwrap().matched_rules.len(), 1);
    }

    #[test]
    fn test_scanner_is_shareable() {
        let scanner = scanner(r#"rule r { strings: $a = "aaa" condition: $a }"#);
        let scanner = std::sync::Arc::new(scanner);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scanner = std::sync::Arc::clone(&scanner);
                std::thread::spawn(move || matched(&scanner, b"xx aaa"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), ["r"]);
        }
    }

    #[test]
    fn test_debug_dump() {
        let scanner = scanner(
            r#"rule r { strings: $a = "ab" condition: $a and filesize > 0 }"#,
        );
        let dump = scanner.debug_dump();
        assert!(dump.contains("rule r"));
        assert!(dump.contains("LOADCOUNT 0"));
        assert!(dump.contains("LOADSTATIC 0"));
        assert!(dump.contains("r_a [0] = 61 62"));
    }
}

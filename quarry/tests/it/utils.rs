use quarry::scanner::ScanParams;
use quarry::{Compiler, Scanner};

/// Compiles a set of rules once, to assert on scan results over
/// multiple inputs.
pub struct Checker {
    scanner: Scanner,
}

impl Checker {
    #[track_caller]
    pub fn new(rules: &str) -> Self {
        let mut compiler = Compiler::new();
        if let Err(err) = compiler.add_rules_str(rules) {
            panic!(
                "compilation failed: {}",
                err.to_short_description("mem", rules)
            );
        }

        Self {
            scanner: compiler.into_scanner(),
        }
    }

    #[track_caller]
    pub fn new_with_strings(rules: &str) -> Self {
        let mut this = Self::new(rules);
        this.scanner
            .set_scan_params(ScanParams::default().string_matches(true));
        this
    }

    /// Check whether any rule matches on the given input.
    #[track_caller]
    pub fn check(&self, mem: &[u8], expected: bool) {
        let res = self.scanner.scan_mem(mem).unwrap();
        assert_eq!(
            !res.matched_rules.is_empty(),
            expected,
            "unexpected scan result on input {mem:?}"
        );
    }

    /// Check the exact list of matching rule names on the given input.
    #[track_caller]
    pub fn check_rule_matches(&self, mem: &[u8], expected: &[&str]) {
        let res = self.scanner.scan_mem(mem).unwrap();
        let matched: Vec<&str> = res.matched_rules.iter().map(|rule| rule.name).collect();
        assert_eq!(matched, expected, "unexpected matches on input {mem:?}");
    }

    /// Check the tags of the first matching rule.
    #[track_caller]
    pub fn check_tags(&self, mem: &[u8], expected: &[&str]) {
        let res = self.scanner.scan_mem(mem).unwrap();
        let rule = res.matched_rules.first().expect("no matching rule");
        assert_eq!(rule.tags, expected);
    }

    /// Check the match offsets of a string of the first matching rule.
    #[track_caller]
    pub fn check_string_offsets(&self, mem: &[u8], name: &str, expected: &[usize]) {
        let res = self.scanner.scan_mem(mem).unwrap();
        let rule = res.matched_rules.first().expect("no matching rule");
        let string = rule
            .strings
            .iter()
            .find(|s| s.name == name)
            .expect("string not reported");
        assert_eq!(string.offsets, expected, "unexpected offsets for ${name}");
    }
}

/// Check whether a single-rule set matches on an input.
#[track_caller]
pub fn check(rules: &str, mem: &[u8], expected: bool) {
    Checker::new(rules).check(mem, expected);
}

/// Check that a set of rules does not compile.
#[track_caller]
pub fn check_err(rules: &str) {
    let mut compiler = Compiler::new();
    assert!(
        compiler.add_rules_str(rules).is_err(),
        "compilation should have failed for {rules}"
    );
}

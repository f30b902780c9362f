use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::utils::Checker;

#[test]
fn test_case_sensitivity_mixture() {
    let checker = Checker::new(
        r#"
rule R : T {
    strings:
        $s1 = "foobar"
        $s2 = "foobaz" nocase
    condition:
        $s1 and $s2
}"#,
    );

    checker.check_rule_matches(b"foobaZ foobar", &["R"]);
    checker.check_tags(b"foobaZ foobar", &["T"]);

    // The case-sensitive string does not fold.
    checker.check(b"foobaZ fooBar", false);
    checker.check(b"FOOBAZ foobar", true);
}

#[test]
fn test_count_comparison() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = "foobar"
    condition:
        #s1 > 2
}"#,
    );

    checker.check_rule_matches(b"foobar foobar foobar", &["R"]);
    checker.check(b"foobar foobar", false);
}

#[test]
fn test_at_with_arithmetic() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a = "text1"
    condition:
        $a at (5+5)
}"#,
    );

    checker.check_rule_matches(b"0123456789text1", &["R"]);
    checker.check(b"012345678text1", false);
}

#[test]
fn test_at_with_double_negation() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a = "text1"
    condition:
        $a at -(-(5 + 5))
}"#,
    );

    checker.check_rule_matches(b"0123456789text1", &["R"]);
}

#[test]
fn test_in_range_with_filesize() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a = "text1"
    condition:
        $a in (8..filesize)
}"#,
    );

    checker.check_rule_matches(b"0123456789text1-----", &["R"]);
    // The bounds are strict: a match at offset 8 is not inside (8..x).
    checker.check(b"01234567text1-------", false);
}

#[test]
fn test_quantified_of() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a = "dummy1"
        $b = "dummy2"
        $c = "dummy3"
    condition:
        2 of ($a,$b,$c)
}"#,
    );

    checker.check_rule_matches(b"dummy2 dummy3", &["R"]);
    checker.check(b"dummy3", false);
    checker.check(b"dummy1 dummy2 dummy3", true);
}

#[test]
fn test_hex_bytes_with_jump_and_alternation() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = { 41 41 41 [1-5] ( 42 | 43 ) }
    condition:
        $s1
}"#,
    );
    checker.check_rule_matches(b"AAADDB", &["R"]);
    checker.check(b"AAADDC", true);
    checker.check(b"AAAB", false);

    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = { 41 41 41 [1-5] ( 48 | 49 ) }
    condition:
        $s1
}"#,
    );
    checker.check_rule_matches(b"AAADB", &[]);
    checker.check(b"AAADH", true);
}

#[test]
fn test_for_range_with_offset_subscript() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a = "dummy1"
        $b = "dummy2"
    condition:
        for any i in (0..3) : ( @a[i] + 10 == @b[i] )
}"#,
    );

    checker.check_rule_matches(b"dummy1    dummy2", &["R"]);
    checker.check(b"dummy1   dummy2", false);
}

#[test]
fn test_for_over_them() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a1 = "dummy1"
        $a2 = "dummy2"
        $b = "foobar"
    condition:
        // every variable must match after the first foobar match
        for any of them : ( @ > @b )
}"#,
    );

    checker.check(b"foobar dummy1    dummy2 dummy2", true);
    checker.check(b"dummy1 foobar", false);
}

#[test]
fn test_for_all_them_count() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $a1 = "dummy1"
        $a2 = "dummy2"
    condition:
        for all of them : ( # > 2 )
}"#,
    );

    checker.check(b"foobar dummy1 dummy1 dummy1   dummy2 dummy2 dummy2", true);
    checker.check(b"dummy1 dummy1 dummy1 dummy2 dummy2", false);
}

#[test]
fn test_base64_nocase() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = "foobar foobaZ" base64 nocase
    condition:
        $s1
}"#,
    );

    // The fold applies to the source before encoding: the pattern is
    // the encoding of the folded text, itself matched case-insensitively.
    let encoded = STANDARD.encode(b"foobar foobaz");
    let input = format!("some prefix {encoded} and suffix");
    checker.check_rule_matches(input.as_bytes(), &["R"]);

    checker.check(b"foobar foobaz", false);
}

#[test]
fn test_base64_custom_alphabet() {
    // An alphabet only has to be 64 bytes long, it does not have to be
    // a decodable dictionary.
    let alphabet = "!".repeat(64);
    let checker = Checker::new(&format!(
        r#"
rule R {{
    strings:
        $s1 = "ab" base64("{alphabet}")
    condition:
        $s1
}}"#
    ));

    checker.check(b"xx !!!= yy", true);
    checker.check(b"ab", false);
}

#[test]
fn test_regex_literal_prefix() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = /(foobar|foobaz)[0-9]{1,2}/
    condition:
        $s1
}"#,
    );

    checker.check_rule_matches(b"foobar12", &["R"]);
    checker.check(b"foobaz7", true);
    checker.check(b"xxfoobar12", true);
    // The prefix alone is not a match, the full regex is checked.
    checker.check(b"foobar", false);
    checker.check(b"fooba12", false);
}

#[test]
fn test_hex_bytes_plain() {
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = { 68 65 6c 6c 6f }
    condition:
        $s1
}"#,
    );

    checker.check_rule_matches(b"hello", &["R"]);
    checker.check(b"hell", false);
}

#[test]
fn test_wide_base64() {
    let encoded = STANDARD.encode(b"t\0m\0p\0");
    let checker = Checker::new(
        r#"
rule R {
    strings:
        $s1 = "tmp" wide base64
    condition:
        $s1
}"#,
    );

    checker.check(format!("xx{encoded}yy").as_bytes(), true);
    checker.check(b"tmp", false);
}

use crate::utils::{check, check_err, Checker};

fn build_rule(condition: &str) -> String {
    format!(
        r#"
rule a {{
    strings:
        $a0 = "a0"
        $a1 = "a1"
        $b0 = "b0"
    condition:
        {condition}
}}"#
    )
}

#[test]
fn test_variable_test() {
    let checker = Checker::new(&build_rule("$a0"));
    checker.check(b"a0", true);
    checker.check(b"a1", false);
    checker.check(b"", false);
    checker.check(b"xa0x", true);
}

#[test]
fn test_of_equivalences() {
    // all of them is n of them with n the number of declared strings.
    let all = Checker::new(&build_rule("all of them"));
    let n = Checker::new(&build_rule("3 of them"));
    // any of them is 1 of them.
    let any = Checker::new(&build_rule("any of them"));
    let one = Checker::new(&build_rule("1 of them"));

    for input in [
        b"".as_slice(),
        b"a0",
        b"a0 a1",
        b"a0 a1 b0",
        b"b0 xx a1 yy a0",
        b"other",
    ] {
        let found = [&b"a0"[..], b"a1", b"b0"]
            .iter()
            .filter(|pat| input.windows(2).any(|w| w == **pat))
            .count();

        all.check(input, found == 3);
        n.check(input, found == 3);
        any.check(input, found >= 1);
        one.check(input, found >= 1);
    }
}

#[test]
fn test_at_in_equivalence() {
    // $a at k implies a match inside any strict range around k.
    let at = Checker::new(&build_rule("$a0 at 4"));
    let in_range = Checker::new(&build_rule("$a0 in (3..7)"));

    at.check(b"xxxxa0", true);
    in_range.check(b"xxxxa0", true);
    at.check(b"a0", false);
    in_range.check(b"a0", false);
}

#[test]
fn test_in_filesize_and_count() {
    // The count of in-range matches is at least 1 whenever any match
    // exists strictly inside the buffer.
    let count = Checker::new(&build_rule("#a0 > 0"));
    let in_range = Checker::new(&build_rule("$a0 in (0..filesize)"));

    for input in [b"xa0x".as_slice(), b"xx a0 yy", b"xa0"] {
        count.check(input, true);
        in_range.check(input, true);
    }

    // A match at offset 0 is outside the strict range.
    count.check(b"a0xx", true);
    in_range.check(b"a0xx", false);
}

#[test]
fn test_offsets() {
    let checker = Checker::new(&build_rule("@a0 == 3"));
    checker.check(b"xxxa0", true);
    checker.check(b"xxa0", false);
    // The offset of the first match is used.
    checker.check(b"xxxa0 a0", true);
    checker.check(b"a0 xa0", false);

    let checker = Checker::new(&build_rule("@a0[1] == 3"));
    checker.check(b"a0a0", false);
    checker.check(b"a0 a0", true);
}

#[test]
fn test_counts() {
    let checker = Checker::new(&build_rule("#a0 == 2"));
    checker.check(b"a0 a0", true);
    checker.check(b"a0 a0 a0", false);
    // Overlapping matches are all counted.
    let checker = Checker::new(
        r#"rule c { strings: $a = "aa" condition: #a == 3 }"#,
    );
    checker.check(b"aaaa", true);
}

#[test]
fn test_arithmetic_and_bitwise() {
    check(&build_rule("1 + 2 == 3"), b"", true);
    check(&build_rule("5 - 2 == 3"), b"", true);
    check(&build_rule("1 << 3 == 8"), b"", true);
    check(&build_rule("8 >> 3 == 1"), b"", true);
    check(&build_rule("(1 | 2) == 3"), b"", true);
    check(&build_rule("(7 & 2) == 2"), b"", true);
    check(&build_rule("(7 ^ 2) == 5"), b"", true);
    check(&build_rule("-5 + 10 == 5"), b"", true);
    check(&build_rule("0x10 == 16"), b"", true);
    check(&build_rule("2KB == 2048"), b"", true);
}

#[test]
fn test_boolean_operators() {
    check(&build_rule("true"), b"", true);
    check(&build_rule("false"), b"", false);
    check(&build_rule("true and false"), b"", false);
    check(&build_rule("true or false"), b"", true);
    check(&build_rule("($a0 or $a1) and $b0"), b"a1 b0", true);
    check(&build_rule("($a0 or $a1) and $b0"), b"a1 a0", false);
}

#[test]
fn test_filesize() {
    check(&build_rule("filesize == 10"), b"0123456789", true);
    check(&build_rule("filesize == 10"), b"012345678", false);
    check(&build_rule("filesize > 5 and filesize < 20"), b"0123456789", true);
}

#[test]
fn test_wide_ascii_variants() {
    // Both encodings are searched under the same variable.
    let checker = Checker::new(
        r#"
rule w {
    strings:
        $a = "tmp" wide ascii
    condition:
        $a
}"#,
    );
    checker.check(b"xx tmp xx", true);
    checker.check(b"xx t\0m\0p\0 xx", true);
    checker.check(b"xx t m p xx", false);

    // Wide alone does not match the ascii encoding.
    let checker = Checker::new(
        r#"
rule w {
    strings:
        $a = "tmp" wide
    condition:
        $a
}"#,
    );
    checker.check(b"xx tmp xx", false);
    checker.check(b"xx t\0m\0p\0 xx", true);
}

#[test]
fn test_nocase_wide() {
    let checker = Checker::new(
        r#"
rule w {
    strings:
        $a = "TMP" wide nocase
    condition:
        $a
}"#,
    );
    checker.check(b"xx t\0M\0p\0 xx", true);
    checker.check(b"xx tmp xx", false);
}

#[test]
fn test_for_range_all() {
    // With a lower bound of 0, an all selection compares the truth
    // count against 0.
    let checker = Checker::new(&build_rule("for all i in (1..2) : ( @a0[i] > 0 )"));
    checker.check(b"xa0 a0 a0", false);

    let checker = Checker::new(&build_rule("for any i in (0..2) : ( @a0[i] == 3 )"));
    checker.check(b"a0 a0", true);
    checker.check(b"a0  a0", false);
}

#[test]
fn test_string_offsets_reporting() {
    let checker = Checker::new_with_strings(&build_rule("$a0"));
    checker.check_string_offsets(b"a0 xx a0", "a0", &[0, 6]);
    checker.check_string_offsets(b"a0 xx a0", "b0", &[]);
}

#[test]
fn test_deduplicated_patterns_count_separately() {
    let checker = Checker::new(
        r#"
rule d {
    strings:
        $x = "dup"
        $y = "dup"
    condition:
        #x == #y and #x > 0
}"#,
    );
    checker.check(b"dup", true);
    checker.check(b"nope", false);
}

#[test]
fn test_compilation_errors() {
    check_err("rule e { condition: $missing }");
    check_err("rule e { condition: #missing > 0 }");
    check_err("rule e { condition: i > 0 }");
    check_err("rule e { condition: $ }");
    check_err(r#"rule e { strings: $a = "x" condition: 1 of ($b*) }"#);
    check_err(r#"rule e { strings: $a = "" condition: $a }"#);
    check_err(r#"rule e { strings: $a = /[0-9]+/ condition: $a }"#);
    check_err(r#"rule e { strings: $a = { ?? 41 } condition: $a }"#);
    check_err("rule e { condition: true } rule e { condition: false }");
}

#[test]
fn test_empty_input() {
    check(&build_rule("filesize == 0"), b"", true);
    check(&build_rule("$a0"), b"", false);
    check(&build_rule("none of them"), b"", true);
}

#[test]
fn test_none_of() {
    let checker = Checker::new(&build_rule("none of them"));
    checker.check(b"zzz", true);
    checker.check(b"a0", false);
    checker.check(b"b0", false);
}

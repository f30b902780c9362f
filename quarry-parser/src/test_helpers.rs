use crate::types::{Input, ParseResult};

#[track_caller]
pub(crate) fn parse<'a, F, O>(mut f: F, input: &'a str, expected_remaining: &str, expected_output: O)
where
    F: FnMut(Input<'a>) -> ParseResult<'a, O>,
    O: PartialEq + std::fmt::Debug,
{
    let res = f(Input::new(input));
    match res {
        Ok((remaining, output)) => {
            assert_eq!(remaining.cursor(), expected_remaining, "on input {input:?}");
            assert_eq!(output, expected_output, "on input {input:?}");
        }
        Err(e) => panic!("parsing of {input:?} failed: {e:?}"),
    }
}

#[track_caller]
pub(crate) fn parse_err<'a, F, O>(mut f: F, input: &'a str)
where
    F: FnMut(Input<'a>) -> ParseResult<'a, O>,
    O: std::fmt::Debug,
{
    let res = f(Input::new(input));
    assert!(res.is_err(), "parsing of {input:?} should have failed");
}

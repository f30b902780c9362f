// Utilities to build scanners and assert on scan results.
mod utils;

// Tests related to the evaluation of conditions.
mod evaluation;

// End to end scenarios, each a (rules, input) pair with the expected
// matching rules.
mod scenarios;

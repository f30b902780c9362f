//! **quarry** is a rule-based byte pattern scanner.
//!
//! Rules associate named byte patterns (plain strings, hex strings with
//! wildcards, regexes) with a boolean condition over their matches. All
//! the patterns of the compiled rules are searched in a single traversal
//! of the input through an Aho-Corasick automaton; each condition is
//! compiled to a small instruction sequence evaluated against the match
//! results.
//!
//! ```
//! use quarry::Compiler;
//!
//! // Rules must first be added to a compiler.
//! let mut compiler = Compiler::new();
//! compiler.add_rules_str(r#"
//! rule example : suspicious {
//!     strings:
//!         $s1 = { 78 6d 6c [1-4] 73 65 6e 64 }
//!         $s2 = "tmp.dat" wide
//!     condition:
//!         any of them
//! }
//! "#)?;
//!
//! // Then, all added rules are compiled into a scanner object.
//! let scanner = compiler.into_scanner();
//!
//! // Use this object to scan bytes.
//! let res = scanner.scan_mem(b"<\0t\0m\0p\0.\0d\0a\0t\0>\0")?;
//! assert!(res.matched_rules.iter().any(|rule| rule.name == "example"));
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod bytecode;
pub mod compiler;
pub use compiler::Compiler;
mod evaluator;
mod matcher;
pub mod scanner;
pub use scanner::Scanner;

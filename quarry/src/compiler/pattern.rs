//! Lowering of variable declarations into concrete byte patterns.
use std::fmt::Write;

use regex_syntax::hir::{Hir, HirKind};
use sha2::{Digest, Sha256};

use quarry_parser::hex_string::{HexAtom, HexToken};
use quarry_parser::regex::Regex as RegexAst;
use quarry_parser::rule::{VariableDeclaration, VariableDeclarationValue, VariableModifiers};

use super::base64::encode_base64;
use super::error::{Warning, WarningKind};

/// Code of a wildcard position in the full form of a partial pattern.
///
/// Values 0-255 are concrete bytes; any disjoint encoding would do for
/// the wildcard, bit 12 is used.
pub(crate) const WILDCARD: u16 = 0x1000;

/// Upper bound on the number of variants a single hex string can expand
/// into. Jumps and alternations multiply variants, unchecked expansion
/// would consume unbounded memory.
const MAX_HEX_VARIANTS: usize = 4096;

/// Prefixes shorter than this trigger a compilation warning on regexes.
const MIN_REGEX_PREFIX: usize = 6;

/// All patterns derived from a single variable declaration.
///
/// A declaration can expand into several concrete byte sequences (wide
/// and ascii encodings, hex string variants); they all report their
/// matches under the same `match_index`.
#[derive(Debug)]
pub(crate) struct PatternSet {
    /// Dense index of this set, its key into the match table.
    pub(crate) match_index: usize,

    /// Name of the first declaration lowered into this set, as
    /// `<rule>_<variable>`. Only used by the debug dump.
    pub(crate) name: String,

    /// Whether the variants are matched case-insensitively.
    ///
    /// The variant bytes are then already folded, and the set is routed
    /// to the case-insensitive automaton.
    pub(crate) nocase: bool,

    /// Concrete searched byte sequences.
    pub(crate) variants: Vec<Variant>,
}

/// One concrete byte sequence searched by the automaton.
#[derive(Debug)]
pub(crate) struct Variant {
    /// Bytes inserted into the automaton.
    pub(crate) bytes: Vec<u8>,

    /// Full form of the variant when `bytes` is only its wildcard-free
    /// prefix. Checked against the input when the prefix is found.
    pub(crate) full: Option<Vec<u16>>,

    /// Regex checked against the input suffix when `bytes` is found.
    pub(crate) regex: Option<regex::bytes::Regex>,
}

/// Variants and routing of a single lowered declaration.
#[derive(Debug)]
pub(crate) struct EncodedVariable {
    pub(crate) nocase: bool,
    pub(crate) variants: Vec<Variant>,
}

/// Error during the lowering of a variable into patterns.
#[derive(Debug)]
pub(crate) enum VariableCompilationError {
    /// Variable is empty.
    Empty,

    /// A modifier is not applicable to this kind of variable.
    UnsupportedModifiers,

    /// The regex does not guarantee any literal prefix to search for.
    NoRegexPrefix,

    /// Error compiling the regex of the variable.
    Regex(Box<regex::Error>),

    /// Error parsing the regex of the variable.
    RegexParse(Box<regex_syntax::Error>),

    /// A hex string expands into too many variants.
    TooManyVariants,

    /// A hex string variant starts with a wildcard, leaving nothing to
    /// search for in the automaton.
    LeadingWildcard,
}

impl std::fmt::Display for VariableCompilationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "variable is empty"),
            Self::UnsupportedModifiers => {
                write!(f, "modifiers are not supported on this variable kind")
            }
            Self::NoRegexPrefix => {
                write!(f, "the regex does not guarantee any literal prefix")
            }
            Self::Regex(err) => err.fmt(f),
            Self::RegexParse(err) => err.fmt(f),
            Self::TooManyVariants => write!(
                f,
                "the hex string expands into more than {MAX_HEX_VARIANTS} variants"
            ),
            Self::LeadingWildcard => {
                write!(f, "a hex string variant cannot start with a wildcard")
            }
        }
    }
}

/// Lower a variable declaration into its searched patterns.
pub(crate) fn encode_variable(
    decl: &VariableDeclaration,
    warnings: &mut Vec<Warning>,
) -> Result<EncodedVariable, VariableCompilationError> {
    match &decl.value {
        VariableDeclarationValue::Bytes(bytes) => encode_bytes(bytes, &decl.modifiers),
        VariableDeclarationValue::Regex(regex) => {
            encode_regex(regex, &decl.modifiers, &decl.span, warnings)
        }
        VariableDeclarationValue::HexString(tokens) => encode_hex(tokens, &decl.modifiers),
    }
}

/// Deduplication key of a declaration.
///
/// Two declarations with the same canonical form (value plus modifiers,
/// in a fixed order) share a single match index and are inserted into
/// the automaton only once.
pub(crate) fn dedup_key(decl: &VariableDeclaration) -> [u8; 32] {
    let mut canonical = String::new();

    match &decl.value {
        VariableDeclarationValue::Bytes(bytes) => {
            canonical.push('"');
            canonical.extend(bytes.iter().flat_map(|b| b.escape_ascii()).map(char::from));
            canonical.push('"');
        }
        VariableDeclarationValue::Regex(regex) => {
            let _ = write!(canonical, "/{}/", regex.expr);
            if regex.case_insensitive {
                canonical.push('i');
            }
            if regex.dot_all {
                canonical.push('s');
            }
        }
        VariableDeclarationValue::HexString(tokens) => {
            write_hex_tokens(&mut canonical, tokens);
        }
    }

    let m = &decl.modifiers;
    for (set, name) in [
        (m.ascii, "ascii"),
        (m.base64, "base64"),
        (m.base64wide, "base64wide"),
        (m.fullword, "fullword"),
        (m.nocase, "nocase"),
        (m.wide, "wide"),
    ] {
        if set {
            canonical.push(' ');
            canonical.push_str(name);
        }
    }
    if let Some((from, to)) = &m.xor {
        let _ = write!(canonical, " xor({from}-{to})");
    }
    if let Some(alphabet) = &m.base64_alphabet {
        canonical.push_str(" alphabet(");
        canonical.extend(alphabet.iter().flat_map(|b| b.escape_ascii()).map(char::from));
        canonical.push(')');
    }

    Sha256::digest(canonical.as_bytes()).into()
}

fn write_hex_tokens(out: &mut String, tokens: &[HexToken]) {
    out.push('{');
    for token in tokens {
        match token {
            HexToken::Byte(b) => {
                let _ = write!(out, " {b:02x}");
            }
            HexToken::Wildcard => out.push_str(" ??"),
            HexToken::Jump { from, to } => {
                let _ = write!(out, " [{from}-{to}]");
            }
            HexToken::Alternatives(branches) => {
                out.push_str(" (");
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" |");
                    }
                    for atom in branch {
                        match atom {
                            HexAtom::Byte(b) => {
                                let _ = write!(out, " {b:02x}");
                            }
                            HexAtom::Wildcard => out.push_str(" ??"),
                        }
                    }
                }
                out.push_str(" )");
            }
        }
    }
    out.push_str(" }");
}

/// Fold `A-Z` to `a-z`.
pub(crate) fn fold_byte(b: u8) -> u8 {
    if b.is_ascii_uppercase() {
        b | 0x20
    } else {
        b
    }
}

fn fold(bytes: &mut [u8]) {
    for b in bytes {
        *b = fold_byte(*b);
    }
}

/// Re-encode as UTF-16LE: a zero byte after each source byte.
fn widen(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&b| [b, 0]).collect()
}

fn encode_bytes(
    bytes: &[u8],
    modifiers: &VariableModifiers,
) -> Result<EncodedVariable, VariableCompilationError> {
    if bytes.is_empty() {
        return Err(VariableCompilationError::Empty);
    }

    // The fold applies to the source bytes, before any base64 encoding,
    // so that two strings differing only in case encode identically.
    let mut source = bytes.to_vec();
    if modifiers.nocase {
        fold(&mut source);
    }

    let mut encodings = Vec::new();
    if modifiers.ascii || !modifiers.wide {
        encodings.push(source.clone());
    }
    if modifiers.wide {
        encodings.push(widen(&source));
    }

    let mut variants = Vec::new();
    if modifiers.base64 || modifiers.base64wide {
        let alphabet = modifiers.base64_alphabet.as_ref();
        for encoding in &encodings {
            let encoded = encode_base64(encoding, alphabet);
            if modifiers.base64 {
                variants.push(encoded.clone());
            }
            if modifiers.base64wide {
                variants.push(widen(&encoded));
            }
        }
    } else {
        variants = encodings;
    }

    if modifiers.nocase {
        for variant in &mut variants {
            fold(variant);
        }
    }

    Ok(EncodedVariable {
        nocase: modifiers.nocase,
        variants: variants
            .into_iter()
            .map(|bytes| Variant {
                bytes,
                full: None,
                regex: None,
            })
            .collect(),
    })
}

fn encode_regex(
    regex: &RegexAst,
    modifiers: &VariableModifiers,
    span: &std::ops::Range<usize>,
    warnings: &mut Vec<Warning>,
) -> Result<EncodedVariable, VariableCompilationError> {
    if modifiers.wide || modifiers.base64 || modifiers.base64wide || modifiers.xor.is_some() {
        return Err(VariableCompilationError::UnsupportedModifiers);
    }

    let nocase = modifiers.nocase || regex.case_insensitive;

    let hir = regex_syntax::ParserBuilder::new()
        .utf8(false)
        .build()
        .parse(&regex.expr)
        .map_err(|err| VariableCompilationError::RegexParse(Box::new(err)))?;

    let (mut prefix, _) = literal_prefix(&hir);
    if prefix.is_empty() {
        return Err(VariableCompilationError::NoRegexPrefix);
    }
    if prefix.len() < MIN_REGEX_PREFIX {
        warnings.push(Warning {
            kind: WarningKind::ShortRegexPrefix {
                length: prefix.len(),
            },
            span: span.clone(),
        });
    }

    let compiled = regex::bytes::RegexBuilder::new(&regex.expr)
        .case_insensitive(nocase)
        .dot_matches_new_line(regex.dot_all)
        .unicode(false)
        .build()
        .map_err(|err| VariableCompilationError::Regex(Box::new(err)))?;

    if nocase {
        fold(&mut prefix);
    }

    Ok(EncodedVariable {
        nocase,
        variants: vec![Variant {
            bytes: prefix,
            full: None,
            regex: Some(compiled),
        }],
    })
}

/// Longest literal prefix guaranteed to start every match of the regex.
///
/// The boolean indicates whether the prefix covers the whole node, i.e.
/// whether a following node can extend the prefix.
fn literal_prefix(hir: &Hir) -> (Vec<u8>, bool) {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => (Vec::new(), true),
        HirKind::Literal(literal) => (literal.0.to_vec(), true),
        HirKind::Class(_) => (Vec::new(), false),
        HirKind::Repetition(repetition) => {
            if repetition.min >= 1 {
                // The first iteration is guaranteed, the prefix cannot
                // extend past it.
                (literal_prefix(&repetition.sub).0, false)
            } else {
                (Vec::new(), false)
            }
        }
        HirKind::Capture(capture) => literal_prefix(&capture.sub),
        HirKind::Concat(subs) => {
            let mut res = Vec::new();
            for sub in subs {
                let (prefix, exact) = literal_prefix(sub);
                res.extend(prefix);
                if !exact {
                    return (res, false);
                }
            }
            (res, true)
        }
        HirKind::Alternation(subs) => {
            let mut prefixes = subs.iter().map(|sub| literal_prefix(sub).0);
            let Some(mut lcp) = prefixes.next() else {
                return (Vec::new(), false);
            };
            for prefix in prefixes {
                let common = lcp
                    .iter()
                    .zip(&prefix)
                    .take_while(|(a, b)| a == b)
                    .count();
                lcp.truncate(common);
            }
            (lcp, false)
        }
    }
}

fn encode_hex(
    tokens: &[HexToken],
    modifiers: &VariableModifiers,
) -> Result<EncodedVariable, VariableCompilationError> {
    if modifiers.nocase
        || modifiers.wide
        || modifiers.base64
        || modifiers.base64wide
        || modifiers.xor.is_some()
    {
        return Err(VariableCompilationError::UnsupportedModifiers);
    }

    let mut variants: Vec<Vec<u16>> = vec![Vec::new()];

    for token in tokens {
        match token {
            HexToken::Byte(b) => {
                for variant in &mut variants {
                    variant.push(u16::from(*b));
                }
            }
            HexToken::Wildcard => {
                for variant in &mut variants {
                    variant.push(WILDCARD);
                }
            }
            HexToken::Jump { from, to } => {
                let mut expanded =
                    Vec::with_capacity(variants.len() * ((to - from + 1) as usize));
                for wildcards in *from..=*to {
                    for variant in &variants {
                        let mut dst = variant.clone();
                        dst.extend(std::iter::repeat(WILDCARD).take(wildcards as usize));
                        expanded.push(dst);
                    }
                }
                variants = expanded;
            }
            HexToken::Alternatives(branches) => {
                let mut expanded = Vec::with_capacity(variants.len() * branches.len());
                for branch in branches {
                    for variant in &variants {
                        let mut dst = variant.clone();
                        dst.extend(branch.iter().map(|atom| match atom {
                            HexAtom::Byte(b) => u16::from(*b),
                            HexAtom::Wildcard => WILDCARD,
                        }));
                        expanded.push(dst);
                    }
                }
                variants = expanded;
            }
        }

        if variants.len() > MAX_HEX_VARIANTS {
            return Err(VariableCompilationError::TooManyVariants);
        }
    }

    let variants = variants
        .into_iter()
        .map(|full| {
            let prefix: Vec<u8> = full
                .iter()
                .take_while(|&&code| code != WILDCARD)
                .map(|&code| code as u8)
                .collect();
            if prefix.is_empty() {
                return Err(VariableCompilationError::LeadingWildcard);
            }
            let is_partial = prefix.len() != full.len();
            Ok(Variant {
                bytes: prefix,
                full: is_partial.then_some(full),
                regex: None,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EncodedVariable {
        nocase: false,
        variants,
    })
}

//! Multi-pattern matcher.
//!
//! All the concrete patterns of the compiled rules are inserted into an
//! Aho-Corasick automaton, so that a scan traverses the input exactly
//! once regardless of the number of patterns. Nodes live in an arena and
//! reference each other through indexes, which keeps the failure and
//! suffix links free of ownership cycles.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compiler::pattern::{fold_byte, PatternSet, Variant, WILDCARD};
use crate::scanner::{MatchTable, ScanError};

/// How many transitions between two polls of the stop flag.
const CANCEL_POLL_MASK: u32 = 4096 - 1;

/// A node of the automaton.
#[derive(Debug)]
struct AcNode {
    /// Child edges, indexed by byte value. 0 means no edge: the root is
    /// never a child of anything.
    children: Box<[u32; 256]>,

    /// Deepest strict proper suffix of the path to this node that is
    /// also a path in the trie, or the root.
    fail: u32,

    /// Nearest node on the failure chain that terminates a pattern, or
    /// 0. Allows enumerating every suffix match in O(1) per match.
    alternative: u32,

    /// Depth of this node minus one: the distance from the end of a
    /// pattern terminating here back to its starting offset.
    match_offset: usize,

    /// Patterns fully matched when this node is reached.
    matches: Vec<usize>,

    /// Partial patterns whose wildcard-free prefix ends here, with their
    /// full wildcard form to verify against the input.
    partials: Vec<(Vec<u16>, usize)>,

    /// Regex patterns whose literal prefix ends here. The regex is run
    /// over the input suffix starting at the prefix match.
    regexes: Vec<(regex::bytes::Regex, usize)>,
}

impl AcNode {
    fn new(match_offset: usize) -> Self {
        Self {
            children: Box::new([0; 256]),
            fail: 0,
            alternative: 0,
            match_offset,
            matches: Vec::new(),
            partials: Vec::new(),
            regexes: Vec::new(),
        }
    }

    fn is_terminal(&self) -> bool {
        !self.matches.is_empty() || !self.partials.is_empty() || !self.regexes.is_empty()
    }
}

/// An Aho-Corasick automaton over a list of pattern sets.
#[derive(Debug)]
pub(crate) struct AcAutomaton {
    nodes: Vec<AcNode>,

    /// Whether input bytes are case-folded before edge lookups.
    ///
    /// The inserted patterns must have been folded at encoding time.
    nocase: bool,
}

impl AcAutomaton {
    /// Build the automaton over every pattern set matching `nocase`.
    pub(crate) fn build(patterns: &[PatternSet], nocase: bool) -> Self {
        let mut this = Self {
            nodes: vec![AcNode::new(0)],
            nocase,
        };

        for set in patterns.iter().filter(|set| set.nocase == nocase) {
            for variant in &set.variants {
                this.insert(set.match_index, variant.bytes.as_slice(), variant);
            }
        }

        this.link();
        this
    }

    /// Whether any pattern was inserted.
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn insert(&mut self, match_index: usize, bytes: &[u8], variant: &Variant) {
        let mut cur = 0_usize;

        for (depth, &b) in bytes.iter().enumerate() {
            let existing = self.nodes[cur].children[usize::from(b)];
            cur = if existing == 0 {
                let id = u32::try_from(self.nodes.len()).expect("automaton too large");
                self.nodes.push(AcNode::new(depth));
                self.nodes[cur].children[usize::from(b)] = id;
                id as usize
            } else {
                existing as usize
            };
        }

        let node = &mut self.nodes[cur];
        match (&variant.full, &variant.regex) {
            (Some(full), _) => node.partials.push((full.clone(), match_index)),
            (None, Some(regex)) => node.regexes.push((regex.clone(), match_index)),
            (None, None) => {
                if !node.matches.contains(&match_index) {
                    node.matches.push(match_index);
                }
            }
        }
    }

    /// Compute failure and alternative links, breadth-first from the root.
    fn link(&mut self) {
        let mut queue: std::collections::VecDeque<usize> = self.nodes[0]
            .children
            .iter()
            .filter(|&&child| child != 0)
            .map(|&child| child as usize)
            .collect();

        while let Some(cur) = queue.pop_front() {
            for b in 0..256 {
                let child = self.nodes[cur].children[b] as usize;
                if child == 0 {
                    continue;
                }

                // Deepest strict suffix: follow the failure chain of the
                // parent until a node with the same edge is found.
                let mut fail = self.nodes[cur].fail as usize;
                loop {
                    if self.nodes[fail].children[b] != 0 {
                        break;
                    }
                    if fail == 0 {
                        break;
                    }
                    fail = self.nodes[fail].fail as usize;
                }

                let target = self.nodes[fail].children[b] as usize;
                self.nodes[child].fail = if target != 0 && target != child {
                    target as u32
                } else {
                    0
                };

                queue.push_back(child);
            }

            let fail = self.nodes[cur].fail as usize;
            self.nodes[cur].alternative = if self.nodes[fail].is_terminal() {
                fail as u32
            } else {
                self.nodes[fail].alternative
            };
        }
    }

    /// Scan the input, appending every match to the table.
    ///
    /// Offsets are recorded per pattern, sorted and deduplicated. The
    /// stop flag is polled on a coarse transition counter.
    pub(crate) fn scan(
        &self,
        input: &[u8],
        table: &mut MatchTable,
        stop: Option<&AtomicBool>,
    ) -> Result<(), ScanError> {
        let mut node = 0_usize;
        let mut counter = 0_u32;
        let mut i = 0_usize;

        while i < input.len() {
            counter = counter.wrapping_add(1);
            if counter & CANCEL_POLL_MASK == 0 {
                if let Some(stop) = stop {
                    if stop.load(Ordering::Relaxed) {
                        return Err(ScanError::Cancelled);
                    }
                }
            }

            let b = if self.nocase {
                fold_byte(input[i])
            } else {
                input[i]
            };

            let child = self.nodes[node].children[usize::from(b)] as usize;
            if child != 0 {
                node = child;

                self.record(node, i, input, table);
                let mut alt = self.nodes[node].alternative as usize;
                while alt != 0 {
                    self.record(alt, i, input, table);
                    alt = self.nodes[alt].alternative as usize;
                }

                i += 1;
            } else {
                // Follow failure links until a node with this edge is
                // found, or the root is reached. The byte is reconsumed
                // if a candidate node was found.
                while node != 0 && self.nodes[node].children[usize::from(b)] == 0 {
                    node = self.nodes[node].fail as usize;
                }
                if self.nodes[node].children[usize::from(b)] == 0 {
                    i += 1;
                }
            }
        }

        Ok(())
    }

    /// Record every match terminating on `node`, with `i` the index of
    /// the last input byte consumed.
    fn record(&self, node: usize, i: usize, input: &[u8], table: &mut MatchTable) {
        let node = &self.nodes[node];
        if !node.is_terminal() {
            return;
        }

        let start = i - node.match_offset;

        for &match_index in &node.matches {
            insert_match(&mut table[match_index], start);
        }

        for (full, match_index) in &node.partials {
            if verify_full(input, start, full) {
                insert_match(&mut table[*match_index], start);
                break;
            }
        }

        for (regex, match_index) in &node.regexes {
            for m in regex.find_iter(&input[start..]) {
                insert_match(&mut table[*match_index], start + m.start());
            }
        }
    }
}

/// Check a full wildcard form against the input at the given offset.
fn verify_full(input: &[u8], start: usize, full: &[u16]) -> bool {
    if start + full.len() > input.len() {
        return false;
    }
    full.iter().enumerate().all(|(j, &code)| {
        // The code is a plain byte when the wildcard bit is unset.
        code & WILDCARD != 0 || input[start + j] == (code & 0xff) as u8
    })
}

/// Insert an offset in a sorted, deduplicated list.
///
/// Appending is the common case: scan positions only move forward. An
/// out-of-order offset can still happen when variants of different
/// lengths terminate on the same position.
fn insert_match(list: &mut Vec<usize>, offset: usize) {
    match list.last() {
        None => list.push(offset),
        Some(&last) if last < offset => list.push(offset),
        Some(&last) if last == offset => {}
        Some(_) => {
            if let Err(pos) = list.binary_search(&offset) {
                list.insert(pos, offset);
            }
        }
    }
}

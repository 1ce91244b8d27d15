use std::{iter::FusedIterator, sync::Arc};

use crate::{compiler::CompiledPattern, vm};

/// The text taken by one capture group, with its char-offset span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A single successful match. Index 0 is the whole match; capturing groups
/// follow in pattern order. Groups that did not participate are `None`.
#[derive(Debug, Clone)]
pub struct Match {
    pattern: Arc<CompiledPattern>,
    captures: Vec<Option<Capture>>,
}

impl Match {
    pub(crate) fn from_saves(
        pattern: Arc<CompiledPattern>,
        chars: &[char],
        saves: &[Option<usize>],
    ) -> Match {
        let captures = (0..=pattern.group_count)
            .map(|group| match (saves[group * 2], saves[group * 2 + 1]) {
                (Some(start), Some(end)) => Some(Capture {
                    start,
                    end,
                    text: chars[start..end].iter().collect(),
                }),
                _ => None,
            })
            .collect();
        Match { pattern, captures }
    }

    fn whole(&self) -> &Capture {
        self.captures[0].as_ref().unwrap()
    }

    pub fn start(&self) -> usize {
        self.whole().start
    }

    pub fn end(&self) -> usize {
        self.whole().end
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start(), self.end())
    }

    pub fn as_str(&self) -> &str {
        &self.whole().text
    }

    /// Capture group by number; 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<&Capture> {
        self.captures.get(index).and_then(Option::as_ref)
    }

    /// Capture group by name, for `(?P<name>...)` groups.
    pub fn name(&self, name: &str) -> Option<&Capture> {
        self.pattern
            .group_index(name)
            .and_then(|index| self.group(index))
    }

    /// The capturing groups, excluding the whole match.
    pub fn groups(&self) -> &[Option<Capture>] {
        &self.captures[1..]
    }
}

/// Lazy iterator over the non-overlapping matches in a text, left to right.
/// An empty match still advances by one char so iteration always makes
/// progress.
#[derive(Debug)]
pub struct Matches {
    pattern: Arc<CompiledPattern>,
    chars: Vec<char>,
    at: usize,
}

impl Matches {
    pub(crate) fn new(pattern: Arc<CompiledPattern>, text: &str) -> Matches {
        Matches {
            pattern,
            chars: text.chars().collect(),
            at: 0,
        }
    }
}

impl Iterator for Matches {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if self.at > self.chars.len() {
            return None;
        }
        match vm::search(&self.pattern, &self.chars, self.at) {
            Some(found) => {
                let start = found.saves[0].unwrap();
                self.at = if found.end == start {
                    found.end + 1
                } else {
                    found.end
                };
                Some(Match::from_saves(
                    Arc::clone(&self.pattern),
                    &self.chars,
                    &found.saves,
                ))
            }
            None => {
                self.at = self.chars.len() + 1;
                None
            }
        }
    }
}

impl FusedIterator for Matches {}

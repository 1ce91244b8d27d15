use std::{error::Error as StdError, fmt::Display, sync::Arc};

use crate::{
    compiler::{compile, CompileError, CompiledPattern},
    matching::{Match, Matches},
    parser::{run_parse, SyntaxError},
    template::{SubstitutionError, Template},
    utils::RegexFlags,
    vm,
};

#[derive(Debug)]
pub enum Error {
    Syntax(SyntaxError),
    Compile(CompileError),
    Substitution(SubstitutionError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "{err}"),
            Self::Compile(err) => write!(f, "{err}"),
            Self::Substitution(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for Error {}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Error {
        Error::Syntax(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Error {
        Error::Compile(err)
    }
}

impl From<SubstitutionError> for Error {
    fn from(err: SubstitutionError) -> Error {
        Error::Substitution(err)
    }
}

/// A compiled regular expression. Compilation happens once in `new` /
/// `with_flags`; the compiled program is immutable and cheap to share, so
/// every matching operation takes `&self`.
#[derive(Debug, Clone)]
pub struct Regex {
    compiled: Arc<CompiledPattern>,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        Regex::with_flags(pattern, RegexFlags::NO_FLAG)
    }

    pub fn with_flags(pattern: &str, flags: RegexFlags) -> Result<Regex, Error> {
        let (ast, groups) = run_parse(pattern)?;
        let compiled = compile(pattern, &ast, groups, flags)?;
        Ok(Regex {
            compiled: Arc::new(compiled),
        })
    }

    pub(crate) fn from_compiled(compiled: Arc<CompiledPattern>) -> Regex {
        Regex { compiled }
    }

    pub(crate) fn compiled_arc(&self) -> &Arc<CompiledPattern> {
        &self.compiled
    }

    pub fn pattern(&self) -> &str {
        &self.compiled.pattern
    }

    pub fn flags(&self) -> RegexFlags {
        self.compiled.flags
    }

    pub fn group_count(&self) -> usize {
        self.compiled.group_count
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.compiled.group_index(name)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Anchored match at char offset `at`, like Python's `re.match` when
    /// `at` is 0.
    pub fn match_at(&self, text: &str, at: usize) -> Option<Match> {
        let chars: Vec<char> = text.chars().collect();
        vm::match_at(&self.compiled, &chars, at)
            .map(|found| Match::from_saves(Arc::clone(&self.compiled), &chars, &found.saves))
    }

    /// First match anywhere in the text, like Python's `re.search`.
    pub fn find(&self, text: &str) -> Option<Match> {
        self.find_at(text, 0)
    }

    pub fn find_at(&self, text: &str, from: usize) -> Option<Match> {
        let chars: Vec<char> = text.chars().collect();
        if from > chars.len() {
            return None;
        }
        vm::search(&self.compiled, &chars, from)
            .map(|found| Match::from_saves(Arc::clone(&self.compiled), &chars, &found.saves))
    }

    pub fn find_iter(&self, text: &str) -> Matches {
        Matches::new(Arc::clone(&self.compiled), text)
    }

    /// All non-overlapping match texts, with Python's `findall` twist: a
    /// pattern with exactly one capture group yields that group's text
    /// instead of the whole match.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let extract_group = self.compiled.group_count == 1;
        self.find_iter(text)
            .map(|m| {
                if extract_group {
                    m.group(1).map(|c| c.text.clone()).unwrap_or_default()
                } else {
                    m.as_str().to_string()
                }
            })
            .collect()
    }

    /// The pieces of `text` between matches, empty pieces included.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut last = 0;
        for m in self.find_iter(text) {
            pieces.push(chars[last..m.start()].iter().collect());
            last = m.end();
        }
        pieces.push(chars[last..].iter().collect());
        pieces
    }

    /// Replaces every match with the expanded replacement template. The
    /// template is validated up front; an invalid one returns an error
    /// before any of the text is touched.
    pub fn substitute(&self, text: &str, replacement: &str) -> Result<String, Error> {
        let template = Template::parse(replacement)?.resolve(&self.compiled)?;
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::new();
        let mut last = 0;
        for m in self.find_iter(text) {
            out.extend(&chars[last..m.start()]);
            template.expand(&m, &mut out);
            last = m.end();
        }
        out.extend(&chars[last..]);
        Ok(out)
    }
}

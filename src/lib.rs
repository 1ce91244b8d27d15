//! A small backtracking regular-expression engine.
//!
//! Patterns compile to an instruction program executed by a backtracking
//! virtual machine, giving Python-flavored semantics: leftmost match,
//! greedy and lazy quantifiers, capture groups (numbered and named),
//! backreferences, lookaround, and the IGNORECASE / MULTILINE / DOTALL
//! flags. Offsets are char indices.
//!
//! ```
//! use retrace::Regex;
//!
//! let regex = Regex::new(r"(?P<word>\w+)!").unwrap();
//! let m = regex.find("well hello! there").unwrap();
//! assert_eq!(m.as_str(), "hello!");
//! assert_eq!(m.name("word").unwrap().text, "hello");
//! ```

pub mod cache;
pub mod compiler;
pub mod matching;
pub mod parser;
pub mod template;
pub mod utils;

mod regex;
mod vm;

pub use crate::{
    cache::PatternCache,
    compiler::CompileError,
    matching::{Capture, Match, Matches},
    parser::SyntaxError,
    regex::{Error, Regex},
    template::SubstitutionError,
    utils::RegexFlags,
};

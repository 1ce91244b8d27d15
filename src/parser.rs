use colored::Colorize;

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fmt::Display,
    num::ParseIntError,
};

use self::reader::Reader;

mod reader {
    // a thin cursor over the pattern text; parse functions drive it directly

    use std::str::Chars;

    use itertools::{peek_nth, PeekNth};

    use super::SyntaxError;

    /// Metacharacters that must be escaped to be matched literally.
    pub(super) static ESCAPED: &[char] = &[
        '$', '(', ')', '*', '+', '-', '.', '<', '=', '>', '?', '[', '\\', ']', '^', '{', '|', '}',
    ];

    #[derive(Debug)]
    pub(super) struct Reader<'a> {
        pattern: &'a str,
        iter: PeekNth<Chars<'a>>,
        consumed: usize,
    }

    impl<'a> Reader<'a> {
        pub fn new(pattern: &'a str) -> Reader<'a> {
            Reader {
                pattern,
                iter: peek_nth(pattern.chars()),
                consumed: 0,
            }
        }

        pub fn peek(&mut self) -> Option<char> {
            self.iter.peek().copied()
        }

        pub fn peek_nth(&mut self, n: usize) -> Option<char> {
            self.iter.peek_nth(n).copied()
        }

        pub fn bump(&mut self) -> Option<char> {
            let next = self.iter.next();
            if next.is_some() {
                self.consumed += 1;
            }
            next
        }

        pub fn advance_by(&mut self, by: usize) {
            for _ in 0..by {
                self.bump();
            }
        }

        pub fn matches(&mut self, expected: char) -> bool {
            self.peek() == Some(expected)
        }

        pub fn consume(&mut self, expected: char) -> Result<(), SyntaxError> {
            match self.peek() {
                Some(actual) if actual == expected => {
                    self.bump();
                    Ok(())
                }
                Some(_) => Err(SyntaxError::UnexpectedToken(self.remainder(), expected)),
                None => Err(SyntaxError::UnexpectedEof),
            }
        }

        pub fn within_bounds(&mut self) -> bool {
            self.peek().is_some()
        }

        pub fn remainder(&self) -> Box<String> {
            Box::new(self.iter.clone().collect())
        }

        pub fn consumed_prefix(&self) -> Box<String> {
            Box::new(self.pattern.chars().take(self.consumed).collect())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    Start,
    End,
    WordBoundary,
    NotWordBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassItem {
    Literal(char),
    Range(char, char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClass {
    pub items: Vec<ClassItem>,
    pub negated: bool,
}

impl CharClass {
    pub fn contains(&self, ch: char, ignore_case: bool) -> bool {
        let hit = self.items.iter().any(|item| match *item {
            ClassItem::Literal(c) => {
                if ignore_case {
                    c.eq_ignore_ascii_case(&ch)
                } else {
                    c == ch
                }
            }
            ClassItem::Range(lo, hi) => {
                if ignore_case {
                    let lower = ch.to_ascii_lowercase();
                    let upper = ch.to_ascii_uppercase();
                    (lo <= ch && ch <= hi)
                        || (lo <= lower && lower <= hi)
                        || (lo <= upper && upper <= hi)
                } else {
                    lo <= ch && ch <= hi
                }
            }
        });
        hit != self.negated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    Empty,
    Literal(char),
    Dot,
    Class(CharClass),
    Concat(Vec<Ast>),
    Alternate(Vec<Ast>),
    Repeat {
        node: Box<Ast>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    Group {
        node: Box<Ast>,
        index: Option<usize>,
    },
    Anchor(AnchorKind),
    Backref(usize),
    Look {
        node: Box<Ast>,
        behind: bool,
        negative: bool,
    },
}

/// Capture-group bookkeeping collected while parsing. Group 0 is the whole
/// match and is never listed here; capturing groups are numbered from 1 in
/// the order their `(` appears.
#[derive(Debug, Default, PartialEq)]
pub struct GroupInfo {
    pub count: usize,
    pub names: HashMap<String, usize>,
    closed: HashSet<usize>,
}

impl GroupInfo {
    fn open(&mut self) -> usize {
        self.count += 1;
        self.count
    }

    fn close(&mut self, index: usize) {
        self.closed.insert(index);
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.closed.contains(&index)
    }

    fn register_name(&mut self, name: String, index: usize) -> Result<(), SyntaxError> {
        if self.names.contains_key(&name) {
            Err(SyntaxError::DuplicateGroupName(Box::new(name)))
        } else {
            self.names.insert(name, index);
            Ok(())
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SyntaxError {
    UnexpectedEof,
    UnexpectedToken(Box<String>, char),
    UnbalancedParenthesis(Box<String>),
    UnterminatedCharacterClass(Box<String>),
    UnknownEscape(char),
    NothingToRepeat(Box<String>),
    InvalidRepeatBounds(u32, u32),
    CantParseRepeatBound(ParseIntError),
    InvalidCharacterRange(char, char),
    ShorthandInCharacterRange(char),
    NegatedShorthandInClass(char),
    InvalidGroupName(Box<String>),
    DuplicateGroupName(Box<String>),
    InvalidBackreference(Box<String>),
    UnrecognizedGroupExtension(Box<String>),
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::UnbalancedParenthesis(ref consumed) => {
                write!(
                    f,
                    "{} unbalanced parenthesis:\n | {}\n | {}",
                    "syntax error".red().bold(),
                    consumed,
                    "^".repeat(consumed.len()).green()
                )
            }
            Self::UnterminatedCharacterClass(ref consumed) => {
                write!(
                    f,
                    "{} unterminated character class:\n | {}\n | {}",
                    "syntax error".red().bold(),
                    consumed,
                    "^".repeat(consumed.len()).green()
                )
            }
            Self::NothingToRepeat(ref remainder) => {
                write!(
                    f,
                    "{} nothing to repeat before {:?}",
                    "syntax error".red().bold(),
                    remainder
                )
            }
            _ => write!(f, "{:#?}", *self),
        }
    }
}

impl Error for SyntaxError {}

pub fn run_parse(pattern: &str) -> Result<(Ast, GroupInfo), SyntaxError> {
    let mut groups = GroupInfo::default();
    if pattern.is_empty() {
        return Ok((Ast::Empty, groups));
    }
    let mut reader = Reader::new(pattern);
    let ast = parse_alternation(&mut reader, &mut groups)?;
    if reader.within_bounds() {
        // only a stray ')' can stop the top-level parse early
        return Err(SyntaxError::UnbalancedParenthesis(reader.consumed_prefix()));
    }
    Ok((ast, groups))
}

fn parse_alternation(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    let mut branches = vec![parse_concat(reader, groups)?];
    while reader.matches('|') {
        reader.bump();
        branches.push(parse_concat(reader, groups)?);
    }
    if branches.len() == 1 {
        Ok(branches.pop().unwrap())
    } else {
        Ok(Ast::Alternate(branches))
    }
}

fn parse_concat(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    let mut items = Vec::new();
    while let Some(c) = reader.peek() {
        if c == ')' || c == '|' {
            break;
        }
        items.push(parse_repeat(reader, groups)?);
    }
    Ok(match items.len() {
        0 => Ast::Empty,
        1 => items.pop().unwrap(),
        _ => Ast::Concat(items),
    })
}

fn parse_repeat(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    let atom = parse_atom(reader, groups)?;
    match parse_quantifier(reader)? {
        Some((min, max, greedy)) => Ok(Ast::Repeat {
            node: Box::new(atom),
            min,
            max,
            greedy,
        }),
        None => Ok(atom),
    }
}

fn parse_atom(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    match reader.peek() {
        None => Err(SyntaxError::UnexpectedEof),
        Some('(') => parse_group(reader, groups),
        Some('[') => parse_class(reader),
        Some('.') => {
            reader.bump();
            Ok(Ast::Dot)
        }
        Some('^') => {
            reader.bump();
            Ok(Ast::Anchor(AnchorKind::Start))
        }
        Some('$') => {
            reader.bump();
            Ok(Ast::Anchor(AnchorKind::End))
        }
        Some('*') | Some('+') | Some('?') => Err(SyntaxError::NothingToRepeat(reader.remainder())),
        Some('{') if repeat_bounds_ahead(reader) => {
            Err(SyntaxError::NothingToRepeat(reader.remainder()))
        }
        Some('\\') => parse_escape(reader, groups),
        Some(c) => {
            reader.bump();
            Ok(Ast::Literal(c))
        }
    }
}

/// A '{' opens a repeat quantifier only when it scans as `{m}`, `{m,}` or
/// `{m,n}`; anything else is a literal brace (Python behavior).
fn repeat_bounds_ahead(reader: &mut Reader) -> bool {
    let mut at = 1;
    let mut digits = 0;
    while let Some(c) = reader.peek_nth(at) {
        if c.is_ascii_digit() {
            digits += 1;
            at += 1;
        } else {
            break;
        }
    }
    if digits == 0 {
        return false;
    }
    match reader.peek_nth(at) {
        Some('}') => true,
        Some(',') => {
            at += 1;
            while let Some(c) = reader.peek_nth(at) {
                if c.is_ascii_digit() {
                    at += 1;
                } else {
                    break;
                }
            }
            reader.peek_nth(at) == Some('}')
        }
        _ => false,
    }
}

type Quantifier = (u32, Option<u32>, bool);

fn parse_quantifier(reader: &mut Reader) -> Result<Option<Quantifier>, SyntaxError> {
    let (min, max) = match reader.peek() {
        Some('*') => {
            reader.bump();
            (0, None)
        }
        Some('+') => {
            reader.bump();
            (1, None)
        }
        Some('?') => {
            reader.bump();
            (0, Some(1))
        }
        Some('{') if repeat_bounds_ahead(reader) => parse_repeat_bounds(reader)?,
        _ => return Ok(None),
    };
    let greedy = if reader.matches('?') {
        reader.bump();
        false
    } else {
        true
    };
    if let Some(max) = max {
        if max < min {
            return Err(SyntaxError::InvalidRepeatBounds(min, max));
        }
    }
    Ok(Some((min, max, greedy)))
}

fn parse_repeat_bounds(reader: &mut Reader) -> Result<(u32, Option<u32>), SyntaxError> {
    reader.consume('{')?;
    let min = parse_int(reader)?;
    let max = if reader.matches(',') {
        reader.bump();
        if reader.matches('}') {
            None
        } else {
            Some(parse_int(reader)?)
        }
    } else {
        Some(min)
    };
    reader.consume('}')?;
    Ok((min, max))
}

fn parse_int(reader: &mut Reader) -> Result<u32, SyntaxError> {
    let mut digits = String::new();
    while let Some(c) = reader.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            reader.bump();
        } else {
            break;
        }
    }
    digits
        .parse::<u32>()
        .map_err(SyntaxError::CantParseRepeatBound)
}

fn parse_escape(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    reader.consume('\\')?;
    let c = reader.bump().ok_or(SyntaxError::UnexpectedEof)?;
    match c {
        'd' | 'D' | 'w' | 'W' | 's' | 'S' => Ok(Ast::Class(shorthand_class(c))),
        'b' => Ok(Ast::Anchor(AnchorKind::WordBoundary)),
        'B' => Ok(Ast::Anchor(AnchorKind::NotWordBoundary)),
        'n' | 't' | 'r' | 'f' | 'v' | '0' => Ok(Ast::Literal(control_escape(c))),
        c if c.is_ascii_digit() => parse_backref(reader, groups, c),
        c if reader::ESCAPED.contains(&c) => Ok(Ast::Literal(c)),
        c => Err(SyntaxError::UnknownEscape(c)),
    }
}

fn parse_backref(
    reader: &mut Reader,
    groups: &mut GroupInfo,
    first: char,
) -> Result<Ast, SyntaxError> {
    let mut digits = String::from(first);
    while let Some(c) = reader.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            reader.bump();
        } else {
            break;
        }
    }
    let index: usize = digits
        .parse()
        .map_err(|_| SyntaxError::InvalidBackreference(Box::new(digits.clone())))?;
    if index == 0 || !groups.is_closed(index) {
        return Err(SyntaxError::InvalidBackreference(Box::new(digits)));
    }
    Ok(Ast::Backref(index))
}

fn parse_group(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    reader.consume('(')?;
    if !reader.matches('?') {
        let index = groups.open();
        let node = parse_alternation(reader, groups)?;
        close_group(reader)?;
        groups.close(index);
        return Ok(Ast::Group {
            node: Box::new(node),
            index: Some(index),
        });
    }
    reader.bump();
    match reader.peek() {
        Some(':') => {
            reader.bump();
            let node = parse_alternation(reader, groups)?;
            close_group(reader)?;
            Ok(Ast::Group {
                node: Box::new(node),
                index: None,
            })
        }
        Some('=') => {
            reader.bump();
            parse_look(reader, groups, false, false)
        }
        Some('!') => {
            reader.bump();
            parse_look(reader, groups, false, true)
        }
        Some('<') => match reader.peek_nth(1) {
            Some('=') => {
                reader.advance_by(2);
                parse_look(reader, groups, true, false)
            }
            Some('!') => {
                reader.advance_by(2);
                parse_look(reader, groups, true, true)
            }
            _ => Err(SyntaxError::UnrecognizedGroupExtension(reader.remainder())),
        },
        Some('P') => match reader.peek_nth(1) {
            Some('<') => {
                reader.advance_by(2);
                parse_named_group(reader, groups)
            }
            Some('=') => {
                reader.advance_by(2);
                parse_named_backref(reader, groups)
            }
            _ => Err(SyntaxError::UnrecognizedGroupExtension(reader.remainder())),
        },
        _ => Err(SyntaxError::UnrecognizedGroupExtension(reader.remainder())),
    }
}

fn parse_look(
    reader: &mut Reader,
    groups: &mut GroupInfo,
    behind: bool,
    negative: bool,
) -> Result<Ast, SyntaxError> {
    let node = parse_alternation(reader, groups)?;
    close_group(reader)?;
    Ok(Ast::Look {
        node: Box::new(node),
        behind,
        negative,
    })
}

fn parse_named_group(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    let name = parse_group_name(reader, '>')?;
    let index = groups.open();
    groups.register_name(name, index)?;
    let node = parse_alternation(reader, groups)?;
    close_group(reader)?;
    groups.close(index);
    Ok(Ast::Group {
        node: Box::new(node),
        index: Some(index),
    })
}

fn parse_named_backref(reader: &mut Reader, groups: &mut GroupInfo) -> Result<Ast, SyntaxError> {
    let name = parse_group_name(reader, ')')?;
    match groups.names.get(&name) {
        Some(&index) if groups.is_closed(index) => Ok(Ast::Backref(index)),
        _ => Err(SyntaxError::InvalidBackreference(Box::new(name))),
    }
}

fn parse_group_name(reader: &mut Reader, terminator: char) -> Result<String, SyntaxError> {
    let mut name = String::new();
    loop {
        match reader.peek() {
            None => return Err(SyntaxError::UnexpectedEof),
            Some(c) if c == terminator => {
                reader.bump();
                break;
            }
            Some(c) if c == '_' || c.is_ascii_alphanumeric() => {
                name.push(c);
                reader.bump();
            }
            Some(_) => return Err(SyntaxError::InvalidGroupName(reader.remainder())),
        }
    }
    if name.is_empty() || name.chars().next().unwrap().is_ascii_digit() {
        return Err(SyntaxError::InvalidGroupName(Box::new(name)));
    }
    Ok(name)
}

fn close_group(reader: &mut Reader) -> Result<(), SyntaxError> {
    match reader.consume(')') {
        Ok(()) => Ok(()),
        Err(_) => Err(SyntaxError::UnbalancedParenthesis(reader.consumed_prefix())),
    }
}

fn parse_class(reader: &mut Reader) -> Result<Ast, SyntaxError> {
    reader.consume('[')?;
    let negated = if reader.matches('^') {
        reader.bump();
        true
    } else {
        false
    };
    let mut items = Vec::new();
    if reader.matches(']') {
        // ']' immediately after '[' or '[^' is a literal member
        reader.bump();
        items.push(ClassItem::Literal(']'));
    }
    loop {
        match reader.peek() {
            None => {
                return Err(SyntaxError::UnterminatedCharacterClass(
                    reader.consumed_prefix(),
                ))
            }
            Some(']') => {
                reader.bump();
                break;
            }
            _ => parse_class_item(reader, &mut items)?,
        }
    }
    Ok(Ast::Class(CharClass { items, negated }))
}

fn parse_class_item(reader: &mut Reader, items: &mut Vec<ClassItem>) -> Result<(), SyntaxError> {
    if reader.matches('\\') {
        if let Some(c) = reader.peek_nth(1) {
            match c {
                'd' | 'w' | 's' => {
                    reader.advance_by(2);
                    items.extend(shorthand_items(c));
                    return Ok(());
                }
                'D' | 'W' | 'S' => return Err(SyntaxError::NegatedShorthandInClass(c)),
                _ => {}
            }
        }
    }
    let lo = parse_class_char(reader)?;
    if reader.matches('-') && reader.peek_nth(1).map_or(false, |c| c != ']') {
        reader.bump();
        if reader.matches('\\') {
            if let Some(c @ ('d' | 'D' | 'w' | 'W' | 's' | 'S')) = reader.peek_nth(1) {
                return Err(SyntaxError::ShorthandInCharacterRange(c));
            }
        }
        let hi = parse_class_char(reader)?;
        if lo > hi {
            return Err(SyntaxError::InvalidCharacterRange(lo, hi));
        }
        items.push(ClassItem::Range(lo, hi));
    } else {
        items.push(ClassItem::Literal(lo));
    }
    Ok(())
}

fn parse_class_char(reader: &mut Reader) -> Result<char, SyntaxError> {
    match reader.bump() {
        None => Err(SyntaxError::UnexpectedEof),
        Some('\\') => {
            let c = reader.bump().ok_or(SyntaxError::UnexpectedEof)?;
            match c {
                'n' | 't' | 'r' | 'f' | 'v' | '0' => Ok(control_escape(c)),
                c if reader::ESCAPED.contains(&c) => Ok(c),
                c => Err(SyntaxError::UnknownEscape(c)),
            }
        }
        Some(c) => Ok(c),
    }
}

fn control_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'f' => '\x0c',
        'v' => '\x0b',
        _ => '\0',
    }
}

fn shorthand_items(c: char) -> Vec<ClassItem> {
    match c {
        'd' => vec![ClassItem::Range('0', '9')],
        'w' => vec![
            ClassItem::Range('0', '9'),
            ClassItem::Range('A', 'Z'),
            ClassItem::Range('a', 'z'),
            ClassItem::Literal('_'),
        ],
        's' => [' ', '\t', '\n', '\r', '\x0b', '\x0c']
            .iter()
            .map(|&c| ClassItem::Literal(c))
            .collect(),
        _ => unreachable!("shorthand classes are d, w and s"),
    }
}

fn shorthand_class(c: char) -> CharClass {
    CharClass {
        items: shorthand_items(c.to_ascii_lowercase()),
        negated: c.is_ascii_uppercase(),
    }
}

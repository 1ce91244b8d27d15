//! Replacement templates for `substitute`. A template is literal text with
//! `\N` and `\g<name>` group references and `\\` for a literal backslash.
//! Templates are parsed and validated against the pattern before any
//! replacement happens, so a bad template never produces partial output.

use std::{error::Error, fmt::Display};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1},
    combinator::{map, map_res},
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};

use crate::{compiler::CompiledPattern, matching::Match};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Group(usize),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubstitutionError {
    BadEscape(Box<String>),
    InvalidGroupIndex(usize),
    UnknownGroupName(Box<String>),
}

impl Display for SubstitutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadEscape(rest) => {
                write!(f, "bad escape in replacement template at {:?}", rest)
            }
            Self::InvalidGroupIndex(index) => {
                write!(f, "replacement references unknown group {}", index)
            }
            Self::UnknownGroupName(name) => {
                write!(f, "replacement references unknown group name {:?}", name)
            }
        }
    }
}

impl Error for SubstitutionError {}

fn group_reference(input: &str) -> IResult<&str, Piece> {
    map(
        delimited(tag(r"\g<"), take_while1(|c| c != '>'), char('>')),
        |name: &str| match name.parse::<usize>() {
            Ok(index) => Piece::Group(index),
            Err(_) => Piece::Named(name.to_string()),
        },
    )(input)
}

fn numbered_reference(input: &str) -> IResult<&str, Piece> {
    map_res(preceded(char('\\'), digit1), |digits: &str| {
        digits.parse::<usize>().map(Piece::Group)
    })(input)
}

fn escaped_backslash(input: &str) -> IResult<&str, Piece> {
    map(tag(r"\\"), |_| Piece::Text("\\".to_string()))(input)
}

fn literal_text(input: &str) -> IResult<&str, Piece> {
    map(take_while1(|c| c != '\\'), |text: &str| {
        Piece::Text(text.to_string())
    })(input)
}

fn pieces(input: &str) -> IResult<&str, Vec<Piece>> {
    many0(alt((
        group_reference,
        numbered_reference,
        escaped_backslash,
        literal_text,
    )))(input)
}

impl Template {
    pub fn parse(replacement: &str) -> Result<Template, SubstitutionError> {
        match pieces(replacement) {
            Ok(("", pieces)) => Ok(Template { pieces }),
            Ok((rest, _)) => Err(SubstitutionError::BadEscape(Box::new(rest.to_string()))),
            Err(_) => Err(SubstitutionError::BadEscape(Box::new(
                replacement.to_string(),
            ))),
        }
    }

    /// Resolves names to group numbers and rejects references the pattern
    /// cannot satisfy.
    pub fn resolve(mut self, pattern: &CompiledPattern) -> Result<Template, SubstitutionError> {
        for piece in &mut self.pieces {
            match piece {
                Piece::Text(_) => {}
                Piece::Group(index) => {
                    if *index > pattern.group_count {
                        return Err(SubstitutionError::InvalidGroupIndex(*index));
                    }
                }
                Piece::Named(name) => match pattern.group_index(name) {
                    Some(index) => *piece = Piece::Group(index),
                    None => {
                        return Err(SubstitutionError::UnknownGroupName(Box::new(name.clone())))
                    }
                },
            }
        }
        Ok(self)
    }

    /// Expands this resolved template for one match. A group that did not
    /// participate expands to the empty string.
    pub fn expand(&self, m: &Match, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Group(index) => {
                    if let Some(capture) = m.group(*index) {
                        out.push_str(&capture.text);
                    }
                }
                Piece::Named(_) => unreachable!("names are resolved before expansion"),
            }
        }
    }
}

use std::{collections::HashMap, error::Error, fmt::Display};

use crate::{
    parser::{AnchorKind, Ast, CharClass, GroupInfo},
    utils::RegexFlags,
};

/// Ceiling on emitted instructions, lookaround sub-programs included.
/// Bounded repeats expand by copying, so `(a{100}){100}` style patterns
/// blow up fast; this keeps compilation bounded.
pub const PROGRAM_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Literal(char),
    Dot,
    Class(CharClass),
}

impl Matcher {
    pub fn accepts(&self, ch: char, flags: RegexFlags) -> bool {
        let ignore_case = flags.contains(RegexFlags::IGNORECASE);
        match self {
            Matcher::Literal(c) => {
                if ignore_case {
                    c.eq_ignore_ascii_case(&ch)
                } else {
                    *c == ch
                }
            }
            Matcher::Dot => flags.contains(RegexFlags::DOTALL) || ch != '\n',
            Matcher::Class(class) => class.contains(ch, ignore_case),
        }
    }
}

/// One instruction of a compiled pattern. Targets are indices into the
/// owning program. The order of `Split` targets encodes preference: the
/// first target is tried before the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    Char(Matcher),
    Split(usize, usize),
    Jump(usize),
    Save(usize),
    Assert(AnchorKind),
    Backref(usize),
    Look {
        behind: bool,
        negative: bool,
        program: Vec<Inst>,
    },
    SetMark,
    CheckMark(usize),
    Accept,
}

#[derive(Debug)]
pub struct CompiledPattern {
    pub pattern: String,
    pub flags: RegexFlags,
    pub insts: Vec<Inst>,
    pub group_count: usize,
    pub names: HashMap<String, usize>,
    pub anchored_start: bool,
}

impl CompiledPattern {
    /// Two save slots per group, group 0 included.
    pub fn slot_count(&self) -> usize {
        (self.group_count + 1) * 2
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CompileError {
    ProgramTooLarge { size: usize, limit: usize },
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ProgramTooLarge { size, limit } => {
                write!(
                    f,
                    "compiled program too large: {} instructions exceed the limit of {}",
                    size, limit
                )
            }
        }
    }
}

impl Error for CompileError {}

pub fn compile(
    pattern: &str,
    ast: &Ast,
    groups: GroupInfo,
    flags: RegexFlags,
) -> Result<CompiledPattern, CompileError> {
    let mut emitter = Emitter::new();
    emitter.push(Inst::Save(0))?;
    emitter.emit(ast)?;
    emitter.push(Inst::Save(1))?;
    emitter.push(Inst::Accept)?;

    let insts = emitter.insts;
    let anchored_start =
        insts[1] == Inst::Assert(AnchorKind::Start) && !flags.contains(RegexFlags::MULTILINE);

    Ok(CompiledPattern {
        pattern: pattern.to_string(),
        flags,
        insts,
        group_count: groups.count,
        names: groups.names,
        anchored_start,
    })
}

struct Emitter {
    insts: Vec<Inst>,
    // running total across this program and every lookaround sub-program
    emitted: usize,
}

impl Emitter {
    fn new() -> Emitter {
        Emitter {
            insts: Vec::new(),
            emitted: 0,
        }
    }

    fn here(&self) -> usize {
        self.insts.len()
    }

    fn push(&mut self, inst: Inst) -> Result<usize, CompileError> {
        self.emitted += 1;
        if self.emitted > PROGRAM_LIMIT {
            return Err(CompileError::ProgramTooLarge {
                size: self.emitted,
                limit: PROGRAM_LIMIT,
            });
        }
        self.insts.push(inst);
        Ok(self.insts.len() - 1)
    }

    fn patch(&mut self, at: usize, inst: Inst) {
        self.insts[at] = inst;
    }

    fn emit(&mut self, ast: &Ast) -> Result<(), CompileError> {
        match ast {
            Ast::Empty => Ok(()),
            Ast::Literal(c) => {
                self.push(Inst::Char(Matcher::Literal(*c)))?;
                Ok(())
            }
            Ast::Dot => {
                self.push(Inst::Char(Matcher::Dot))?;
                Ok(())
            }
            Ast::Class(class) => {
                self.push(Inst::Char(Matcher::Class(class.clone())))?;
                Ok(())
            }
            Ast::Concat(items) => {
                for item in items {
                    self.emit(item)?;
                }
                Ok(())
            }
            Ast::Alternate(branches) => self.emit_alternate(branches),
            Ast::Repeat {
                node,
                min,
                max,
                greedy,
            } => self.emit_repeat(node, *min, *max, *greedy),
            Ast::Group { node, index } => {
                if let Some(index) = index {
                    self.push(Inst::Save(index * 2))?;
                    self.emit(node)?;
                    self.push(Inst::Save(index * 2 + 1))?;
                } else {
                    self.emit(node)?;
                }
                Ok(())
            }
            Ast::Anchor(kind) => {
                self.push(Inst::Assert(*kind))?;
                Ok(())
            }
            Ast::Backref(index) => {
                self.push(Inst::Backref(*index))?;
                Ok(())
            }
            Ast::Look {
                node,
                behind,
                negative,
            } => {
                let mut sub = Emitter::new();
                sub.emitted = self.emitted;
                sub.emit(node)?;
                sub.push(Inst::Accept)?;
                self.emitted = sub.emitted;
                self.push(Inst::Look {
                    behind: *behind,
                    negative: *negative,
                    program: sub.insts,
                })?;
                Ok(())
            }
        }
    }

    fn emit_alternate(&mut self, branches: &[Ast]) -> Result<(), CompileError> {
        let mut jumps = Vec::with_capacity(branches.len() - 1);
        for branch in &branches[..branches.len() - 1] {
            let split = self.push(Inst::Split(0, 0))?;
            let body = self.here();
            self.emit(branch)?;
            jumps.push(self.push(Inst::Jump(0))?);
            let next = self.here();
            self.patch(split, Inst::Split(body, next));
        }
        self.emit(branches.last().unwrap())?;
        let end = self.here();
        for jump in jumps {
            self.patch(jump, Inst::Jump(end));
        }
        Ok(())
    }

    fn emit_repeat(
        &mut self,
        node: &Ast,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<(), CompileError> {
        match max {
            None => {
                // m or more: m - 1 mandatory copies then a plus, or a star
                // when m is zero
                for _ in 1..min {
                    self.emit(node)?;
                }
                if min == 0 {
                    self.emit_star(node, greedy)
                } else {
                    self.emit_plus(node, greedy)
                }
            }
            Some(max) => {
                for _ in 0..min {
                    self.emit(node)?;
                }
                for _ in min..max {
                    self.emit_question(node, greedy)?;
                }
                Ok(())
            }
        }
    }

    fn emit_star(&mut self, node: &Ast, greedy: bool) -> Result<(), CompileError> {
        let split = self.push(Inst::Split(0, 0))?;
        let body = self.here();
        self.push(Inst::SetMark)?;
        self.emit(node)?;
        let check = self.push(Inst::CheckMark(0))?;
        self.push(Inst::Jump(split))?;
        let exit = self.here();
        self.patch(check, Inst::CheckMark(exit));
        let targets = if greedy { (body, exit) } else { (exit, body) };
        self.patch(split, Inst::Split(targets.0, targets.1));
        Ok(())
    }

    fn emit_plus(&mut self, node: &Ast, greedy: bool) -> Result<(), CompileError> {
        let body = self.here();
        self.push(Inst::SetMark)?;
        self.emit(node)?;
        let check = self.push(Inst::CheckMark(0))?;
        let split = self.push(Inst::Split(0, 0))?;
        let exit = self.here();
        self.patch(check, Inst::CheckMark(exit));
        let targets = if greedy { (body, exit) } else { (exit, body) };
        self.patch(split, Inst::Split(targets.0, targets.1));
        Ok(())
    }

    fn emit_question(&mut self, node: &Ast, greedy: bool) -> Result<(), CompileError> {
        let split = self.push(Inst::Split(0, 0))?;
        let body = self.here();
        self.emit(node)?;
        let exit = self.here();
        let targets = if greedy { (body, exit) } else { (exit, body) };
        self.patch(split, Inst::Split(targets.0, targets.1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::run_parse;

    fn compile_pattern(pattern: &str) -> Result<CompiledPattern, CompileError> {
        let (ast, groups) = run_parse(pattern).unwrap();
        compile(pattern, &ast, groups, RegexFlags::NO_FLAG)
    }

    #[test]
    fn literal_program_shape() {
        let compiled = compile_pattern("ab").unwrap();
        assert_eq!(
            compiled.insts,
            vec![
                Inst::Save(0),
                Inst::Char(Matcher::Literal('a')),
                Inst::Char(Matcher::Literal('b')),
                Inst::Save(1),
                Inst::Accept,
            ]
        );
    }

    #[test]
    fn greedy_star_prefers_the_body() {
        let compiled = compile_pattern("a*").unwrap();
        // split at 1, body at 2, loop exit at 6
        assert_eq!(compiled.insts[1], Inst::Split(2, 6));
        assert_eq!(compiled.insts[2], Inst::SetMark);
        assert_eq!(compiled.insts[4], Inst::CheckMark(6));
        assert_eq!(compiled.insts[5], Inst::Jump(1));
    }

    #[test]
    fn lazy_star_prefers_the_exit() {
        let compiled = compile_pattern("a*?").unwrap();
        assert_eq!(compiled.insts[1], Inst::Split(6, 2));
    }

    #[test]
    fn bounded_repeat_expands_by_copying() {
        let compiled = compile_pattern("a{3}").unwrap();
        assert_eq!(
            compiled.insts,
            vec![
                Inst::Save(0),
                Inst::Char(Matcher::Literal('a')),
                Inst::Char(Matcher::Literal('a')),
                Inst::Char(Matcher::Literal('a')),
                Inst::Save(1),
                Inst::Accept,
            ]
        );
    }

    #[test]
    fn capture_groups_bracket_their_body_with_saves() {
        let compiled = compile_pattern("(a)(b)").unwrap();
        assert_eq!(compiled.group_count, 2);
        assert_eq!(compiled.slot_count(), 6);
        assert_eq!(
            compiled.insts,
            vec![
                Inst::Save(0),
                Inst::Save(2),
                Inst::Char(Matcher::Literal('a')),
                Inst::Save(3),
                Inst::Save(4),
                Inst::Char(Matcher::Literal('b')),
                Inst::Save(5),
                Inst::Save(1),
                Inst::Accept,
            ]
        );
    }

    #[test]
    fn non_capturing_group_emits_no_saves() {
        let compiled = compile_pattern("(?:ab)").unwrap();
        assert_eq!(compiled.group_count, 0);
        assert!(!compiled
            .insts
            .iter()
            .any(|inst| matches!(inst, Inst::Save(slot) if *slot > 1)));
    }

    #[test]
    fn named_group_is_addressable() {
        let compiled = compile_pattern(r"(?P<year>\d{4})").unwrap();
        assert_eq!(compiled.group_index("year"), Some(1));
        assert_eq!(compiled.group_index("month"), None);
    }

    #[test]
    fn start_anchor_marks_the_program_anchored() {
        assert!(compile_pattern("^Hello").unwrap().anchored_start);
        assert!(!compile_pattern("Hello").unwrap().anchored_start);

        let (ast, groups) = run_parse("^Hello").unwrap();
        let multiline = compile("^Hello", &ast, groups, RegexFlags::MULTILINE).unwrap();
        assert!(!multiline.anchored_start);
    }

    #[test]
    fn lookaround_compiles_to_a_sub_program() {
        let compiled = compile_pattern("a(?=b)").unwrap();
        match &compiled.insts[2] {
            Inst::Look {
                behind: false,
                negative: false,
                program,
            } => {
                assert_eq!(
                    program,
                    &vec![Inst::Char(Matcher::Literal('b')), Inst::Accept]
                );
            }
            other => panic!("expected a lookahead, got {:?}", other),
        }
    }

    #[test]
    fn oversized_program_is_rejected() {
        assert!(matches!(
            compile_pattern("(a{100}){100}"),
            Err(CompileError::ProgramTooLarge { .. })
        ));
    }

    #[test]
    fn lookaround_instructions_count_toward_the_limit() {
        assert!(matches!(
            compile_pattern("(?=a{9999})b{9999}"),
            Err(CompileError::ProgramTooLarge { .. })
        ));
    }
}

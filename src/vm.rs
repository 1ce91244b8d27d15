//! Backtracking executor. Runs a compiled instruction list over a char
//! slice with an explicit frame stack; host recursion is used only to
//! evaluate lookaround sub-programs.

use crate::{
    compiler::{CompiledPattern, Inst},
    parser::AnchorKind,
    utils::RegexFlags,
};

#[derive(Debug)]
pub(crate) struct VmMatch {
    pub end: usize,
    pub saves: Vec<Option<usize>>,
}

/// A backtrack point. Restoring one rewinds the program counter, the input
/// position, every capture slot and the loop-progress marks.
struct Frame {
    pc: usize,
    pos: usize,
    saves: Vec<Option<usize>>,
    marks: Vec<usize>,
}

/// Anchored run of `insts` starting at `start`. `init` seeds the capture
/// slots (lookarounds pass the outer snapshot in). When `must_end` is set,
/// `Accept` only succeeds at exactly that position; this end-anchors the
/// nested lookbehind runs.
pub(crate) fn run(
    insts: &[Inst],
    chars: &[char],
    start: usize,
    flags: RegexFlags,
    init: Vec<Option<usize>>,
    must_end: Option<usize>,
) -> Option<VmMatch> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut pc = 0;
    let mut pos = start;
    let mut saves = init;
    let mut marks: Vec<usize> = Vec::new();

    loop {
        let mut failed = false;
        match &insts[pc] {
            Inst::Char(matcher) => {
                if pos < chars.len() && matcher.accepts(chars[pos], flags) {
                    pos += 1;
                    pc += 1;
                } else {
                    failed = true;
                }
            }
            Inst::Split(first, second) => {
                stack.push(Frame {
                    pc: *second,
                    pos,
                    saves: saves.clone(),
                    marks: marks.clone(),
                });
                pc = *first;
            }
            Inst::Jump(target) => pc = *target,
            Inst::Save(slot) => {
                saves[*slot] = Some(pos);
                pc += 1;
            }
            Inst::Assert(kind) => {
                if anchor_holds(*kind, chars, pos, flags) {
                    pc += 1;
                } else {
                    failed = true;
                }
            }
            Inst::Backref(group) => match backref_text(&saves, *group) {
                Some((from, to)) => {
                    let len = to - from;
                    if pos + len <= chars.len()
                        && (0..len).all(|i| chars_equal(chars[from + i], chars[pos + i], flags))
                    {
                        pos += len;
                        pc += 1;
                    } else {
                        failed = true;
                    }
                }
                // a group that never participated in the match fails the path
                None => failed = true,
            },
            Inst::Look {
                behind,
                negative,
                program,
            } => {
                let found = if *behind {
                    look_behind(program, chars, pos, flags, &saves)
                } else {
                    run(program, chars, pos, flags, saves.clone(), None).is_some()
                };
                if found != *negative {
                    pc += 1;
                } else {
                    failed = true;
                }
            }
            Inst::SetMark => {
                marks.push(pos);
                pc += 1;
            }
            Inst::CheckMark(exit) => {
                let mark = marks.pop().unwrap();
                if pos == mark {
                    // the iteration consumed nothing; leave the loop rather
                    // than spin forever, keeping the iteration's captures
                    pc = *exit;
                } else {
                    pc += 1;
                }
            }
            Inst::Accept => {
                if must_end.map_or(true, |end| end == pos) {
                    return Some(VmMatch { end: pos, saves });
                }
                failed = true;
            }
        }
        if failed {
            match stack.pop() {
                Some(frame) => {
                    pc = frame.pc;
                    pos = frame.pos;
                    saves = frame.saves;
                    marks = frame.marks;
                }
                None => return None,
            }
        }
    }
}

/// A lookbehind holds when some nested run starts at or before `pos` and
/// ends exactly at `pos`.
fn look_behind(
    program: &[Inst],
    chars: &[char],
    pos: usize,
    flags: RegexFlags,
    saves: &[Option<usize>],
) -> bool {
    (0..=pos)
        .rev()
        .any(|start| run(program, chars, start, flags, saves.to_vec(), Some(pos)).is_some())
}

fn backref_text(saves: &[Option<usize>], group: usize) -> Option<(usize, usize)> {
    match (saves[group * 2], saves[group * 2 + 1]) {
        (Some(from), Some(to)) => Some((from, to)),
        _ => None,
    }
}

fn chars_equal(a: char, b: char, flags: RegexFlags) -> bool {
    if flags.contains(RegexFlags::IGNORECASE) {
        a.eq_ignore_ascii_case(&b)
    } else {
        a == b
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn anchor_holds(kind: AnchorKind, chars: &[char], pos: usize, flags: RegexFlags) -> bool {
    let multiline = flags.contains(RegexFlags::MULTILINE);
    match kind {
        AnchorKind::Start => pos == 0 || (multiline && chars[pos - 1] == '\n'),
        AnchorKind::End => {
            pos == chars.len()
                // just before a final trailing newline
                || (pos == chars.len() - 1 && chars[pos] == '\n')
                || (multiline && chars[pos] == '\n')
        }
        AnchorKind::WordBoundary => word_boundary(chars, pos),
        AnchorKind::NotWordBoundary => !word_boundary(chars, pos),
    }
}

fn word_boundary(chars: &[char], pos: usize) -> bool {
    let before = pos > 0 && is_word_char(chars[pos - 1]);
    let after = pos < chars.len() && is_word_char(chars[pos]);
    before != after
}

/// First successful anchored run at offsets `from..=len`.
pub(crate) fn search(pattern: &CompiledPattern, chars: &[char], from: usize) -> Option<VmMatch> {
    if pattern.anchored_start {
        if from > 0 {
            return None;
        }
        return run(
            &pattern.insts,
            chars,
            0,
            pattern.flags,
            vec![None; pattern.slot_count()],
            None,
        );
    }
    (from..=chars.len()).find_map(|start| {
        run(
            &pattern.insts,
            chars,
            start,
            pattern.flags,
            vec![None; pattern.slot_count()],
            None,
        )
    })
}

/// Anchored run at exactly `at`.
pub(crate) fn match_at(pattern: &CompiledPattern, chars: &[char], at: usize) -> Option<VmMatch> {
    if at > chars.len() {
        return None;
    }
    run(
        &pattern.insts,
        chars,
        at,
        pattern.flags,
        vec![None; pattern.slot_count()],
        None,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{compiler::compile, parser::run_parse};

    fn compiled(pattern: &str, flags: RegexFlags) -> CompiledPattern {
        let (ast, groups) = run_parse(pattern).unwrap();
        compile(pattern, &ast, groups, flags).unwrap()
    }

    fn span_of(pattern: &str, text: &str) -> Option<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        let compiled = compiled(pattern, RegexFlags::NO_FLAG);
        search(&compiled, &chars, 0).map(|m| (m.saves[0].unwrap(), m.end))
    }

    #[test]
    fn greedy_repeat_takes_the_longest_run() {
        assert_eq!(span_of("a+", "xxaaay"), Some((2, 5)));
        assert_eq!(span_of("<.*>", "<em>text</em>"), Some((0, 13)));
    }

    #[test]
    fn lazy_repeat_takes_the_shortest_run() {
        assert_eq!(span_of("<.*?>", "<em>text</em>"), Some((0, 4)));
    }

    #[test]
    fn backtracking_retries_earlier_choices() {
        // the star must give back one 'a' for the literal to match
        assert_eq!(span_of("a*ab", "aaab"), Some((0, 4)));
        assert_eq!(span_of("(a|ab)c", "abc"), Some((0, 3)));
    }

    #[test]
    fn empty_loop_body_terminates() {
        assert_eq!(span_of("(a*)*", ""), Some((0, 0)));
        assert_eq!(span_of("(a*)*b", "aaab"), Some((0, 4)));
        assert_eq!(span_of("(?:a?)*y", "aay"), Some((0, 3)));
    }

    #[test]
    fn backreference_matches_the_captured_text() {
        assert_eq!(span_of(r"(ab)\1", "abab"), Some((0, 4)));
        assert_eq!(span_of(r"(ab)\1", "abba"), None);
    }

    #[test]
    fn backreference_to_a_skipped_group_fails() {
        assert_eq!(span_of(r"(?:(a)|b)\1", "ba"), None);
        assert_eq!(span_of(r"(?:(a)|b)\1", "aa"), Some((0, 2)));
    }

    #[test]
    fn lookahead_is_zero_width() {
        assert_eq!(span_of(r"\d+(?= euros)", "50 euros"), Some((0, 2)));
        assert_eq!(span_of(r"\d+(?! euros)", "50 euros"), Some((0, 1)));
    }

    #[test]
    fn lookbehind_checks_the_text_before() {
        assert_eq!(span_of(r"(?<=Prefix-)Value", "Prefix-Value"), Some((7, 12)));
        assert_eq!(span_of(r"(?<=Prefix-)Value", "Other-Value"), None);
        assert_eq!(span_of(r"(?<!x)y", "ay"), Some((1, 2)));
        assert_eq!(span_of(r"(?<!x)y", "xy"), None);
    }

    #[test]
    fn variable_width_lookbehind() {
        assert_eq!(span_of(r"(?<=a+)b", "aaab"), Some((3, 4)));
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(span_of(r"\bcat\b", "a cat sat"), Some((2, 5)));
        assert_eq!(span_of(r"\bcat\b", "concatenate"), None);
        assert_eq!(span_of(r"\Bcat\B", "concatenate"), Some((3, 6)));
    }

    #[test]
    fn dollar_matches_before_a_trailing_newline() {
        assert_eq!(span_of("World$", "Hello World\n"), Some((6, 11)));
        assert_eq!(span_of("World$", "Hello World"), Some((6, 11)));
        assert_eq!(span_of("World$", "World Hello"), None);
    }

    #[test]
    fn multiline_anchors_match_around_newlines() {
        let chars: Vec<char> = "Hello\nWorld".chars().collect();
        let pattern = compiled("^World$", RegexFlags::MULTILINE);
        let m = search(&pattern, &chars, 0).unwrap();
        assert_eq!((m.saves[0].unwrap(), m.end), (6, 11));

        let plain = compiled("^World$", RegexFlags::NO_FLAG);
        assert!(search(&plain, &chars, 0).is_none());
    }

    #[test]
    fn dotall_lets_dot_cross_newlines() {
        let chars: Vec<char> = "First\nSecond".chars().collect();
        assert!(search(&compiled("First.*Second", RegexFlags::NO_FLAG), &chars, 0).is_none());
        assert!(search(&compiled("First.*Second", RegexFlags::DOTALL), &chars, 0).is_some());
    }

    #[test]
    fn ignorecase_folds_literals_classes_and_backrefs() {
        let chars: Vec<char> = "HeLLo".chars().collect();
        assert!(search(&compiled("hello", RegexFlags::IGNORECASE), &chars, 0).is_some());
        assert!(search(&compiled("[a-z]{5}", RegexFlags::IGNORECASE), &chars, 0).is_some());

        let chars: Vec<char> = "aA".chars().collect();
        assert!(search(&compiled(r"(a)\1", RegexFlags::IGNORECASE), &chars, 0).is_some());
        assert!(search(&compiled(r"(a)\1", RegexFlags::NO_FLAG), &chars, 0).is_none());
    }

    #[test]
    fn anchored_search_skips_later_offsets() {
        let chars: Vec<char> = "World Hello".chars().collect();
        let pattern = compiled("^Hello", RegexFlags::NO_FLAG);
        assert!(pattern.anchored_start);
        assert!(search(&pattern, &chars, 0).is_none());
    }

    #[test]
    fn match_at_is_anchored_to_the_offset() {
        let chars: Vec<char> = "Hello World".chars().collect();
        let pattern = compiled("World", RegexFlags::NO_FLAG);
        assert!(match_at(&pattern, &chars, 0).is_none());
        assert!(match_at(&pattern, &chars, 6).is_some());
        assert!(match_at(&pattern, &chars, 42).is_none());
    }

    #[test]
    fn captures_record_the_last_iteration() {
        let chars: Vec<char> = "abab".chars().collect();
        let pattern = compiled("(ab)+", RegexFlags::NO_FLAG);
        let m = search(&pattern, &chars, 0).unwrap();
        assert_eq!(m.end, 4);
        assert_eq!((m.saves[2], m.saves[3]), (Some(2), Some(4)));
    }

    #[test]
    fn lookarounds_do_not_leak_captures() {
        let chars: Vec<char> = "ab".chars().collect();
        let pattern = compiled("a(?=(b))", RegexFlags::NO_FLAG);
        let m = search(&pattern, &chars, 0).unwrap();
        assert_eq!(m.end, 1);
        assert_eq!((m.saves[2], m.saves[3]), (None, None));
    }
}

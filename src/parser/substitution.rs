//! Command Substitution Scanning
//!
//! Finds where a `$(...)` body ends. Parentheses are counted, except inside a
//! `case` statement, where every pattern ends with an unbalanced `)`.

use crate::ast::types::Token;
use crate::parser::lexer::is_word_boundary;

/// Word-level state of `case` statements inside a substitution body.
struct CaseTracker {
    /// Open `case` statements
    depth: usize,
    /// Saw `case WORD`, the next `in` starts the patterns
    awaiting_in: bool,
    /// Reading a pattern list; the next `)` closes it
    in_pattern: bool,
    /// The next word is in command position
    command_start: bool,
}

impl CaseTracker {
    fn new() -> Self {
        Self {
            depth: 0,
            awaiting_in: false,
            in_pattern: false,
            command_start: true,
        }
    }

    /// A finished word. `None` for one containing quotes, escapes or
    /// expansions, which can never be a reserved word.
    fn word(&mut self, word: Option<&str>) {
        let keyword = word.and_then(Token::keyword);
        match keyword {
            Some(Token::Case) if self.command_start && !self.in_pattern => {
                self.depth += 1;
                self.awaiting_in = true;
            }
            Some(Token::In) if self.awaiting_in => {
                self.awaiting_in = false;
                self.in_pattern = true;
            }
            Some(Token::Esac) if self.depth > 0 && (self.command_start || self.in_pattern) => {
                self.depth -= 1;
                self.in_pattern = false;
            }
            _ => {}
        }
        self.command_start = matches!(
            keyword,
            Some(Token::If | Token::Then | Token::Elif | Token::Else | Token::While | Token::Do | Token::LBrace)
        );
    }
}

/// Index of the `)` closing a `$(` whose body starts at `start`, or `None`
/// when the input ends first.
pub(crate) fn find_subst_close(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut case = CaseTracker::new();
    let mut word = String::new();
    let mut plain = true;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if !is_word_boundary(c) {
            match c {
                '\\' => {
                    plain = false;
                    i += 2;
                }
                '\'' => {
                    plain = false;
                    i += chars[i + 1..].iter().position(|&d| d == '\'')? + 2;
                }
                '"' => {
                    plain = false;
                    i = skip_double_quoted(chars, i + 1)?;
                }
                '$' => {
                    plain = false;
                    i = match chars.get(i + 1) {
                        Some('(') => find_subst_close(chars, i + 2)? + 1,
                        Some('{') => skip_braces(chars, i + 2)?,
                        _ => i + 1,
                    };
                }
                '#' if word.is_empty() && plain => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
                _ => {
                    word.push(c);
                    i += 1;
                }
            }
            continue;
        }

        if !word.is_empty() || !plain {
            case.word(plain.then_some(word.as_str()));
            word.clear();
            plain = true;
        }

        match c {
            '(' => {
                // `(a|b)` may open a pattern
                if !case.in_pattern {
                    depth += 1;
                }
                case.command_start = true;
            }
            ')' => {
                if case.in_pattern {
                    case.in_pattern = false;
                    case.command_start = true;
                } else {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
            }
            ';' => {
                if chars.get(i + 1) == Some(&';') {
                    i += 1;
                    if case.depth > 0 {
                        case.in_pattern = true;
                    }
                }
                case.command_start = true;
            }
            '\n' | '&' | '|' => case.command_start = true,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index just past the `"` closing a string whose body starts at `i`.
fn skip_double_quoted(chars: &[char], mut i: usize) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return Some(i + 1),
            '$' if chars.get(i + 1) == Some(&'(') => i = find_subst_close(chars, i + 2)? + 1,
            _ => i += 1,
        }
    }
    None
}

/// Index just past the `}` closing a `${` whose body starts at `i`.
fn skip_braces(chars: &[char], mut i: usize) -> Option<usize> {
    let mut depth = 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

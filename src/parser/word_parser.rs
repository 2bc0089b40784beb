//! Word Parsing
//!
//! Splits the raw text of a word lexeme into its parts:
//! - literal runs (unquoted text, single-quoted text, backslash escapes) -> `Lit`
//! - "double quoted" -> `DblQuoted` with its own inner parts
//! - `$NAME`, `$1`, `$?` ... -> short `ParamExp`
//! - `${...}` -> long `ParamExp`
//! - `$(...)` -> `CmdSubst`, whose body is parsed recursively
//! - `$((...))` -> `ArithmExp`

use crate::ast::types::{ArithmExp, CmdSubst, DblQuoted, Lit, Node, ParamExp, Word};
use crate::parser::parser::Parser;
use crate::parser::substitution::find_subst_close;
use crate::parser::types::ParseException;

/// Characters that form a one-character special parameter after `$`.
const SPECIAL_PARAMS: &str = "?#@*$!-0123456789";

/// Parse raw word text into a `Word` node.
pub fn parse_word(raw: &str, line: usize, column: usize, depth: usize) -> Result<Word, ParseException> {
    let chars: Vec<char> = raw.chars().collect();
    let mut ctx = WordContext { chars: &chars, pos: 0, line, column, depth };
    let parts = ctx.parse_parts(false)?;
    Ok(Word { parts })
}

struct WordContext<'a> {
    chars: &'a [char],
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
}

impl<'a> WordContext<'a> {
    fn error(&self, message: impl Into<String>) -> ParseException {
        ParseException::new(message, self.line, self.column + self.pos)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Parse parts until end of input, or the closing `"` when `in_dquote`.
    fn parse_parts(&mut self, in_dquote: bool) -> Result<Vec<Node>, ParseException> {
        let mut parts = Vec::new();
        let mut lit = String::new();

        while let Some(c) = self.peek(0) {
            match c {
                '"' if in_dquote => break,
                '"' => {
                    flush_lit(&mut parts, &mut lit);
                    self.pos += 1;
                    let inner = self.parse_parts(true)?;
                    if self.peek(0) != Some('"') {
                        return Err(self.error("unterminated double quote"));
                    }
                    self.pos += 1;
                    parts.push(Node::DblQuoted(DblQuoted { parts: inner }));
                }
                '\\' => {
                    lit.push(c);
                    self.pos += 1;
                    if let Some(next) = self.peek(0) {
                        lit.push(next);
                        self.pos += 1;
                    }
                }
                '\'' if !in_dquote => {
                    let end = self.find_char('\'', self.pos + 1)
                        .ok_or_else(|| self.error("unterminated single quote"))?;
                    lit.extend(&self.chars[self.pos..=end]);
                    self.pos = end + 1;
                }
                '$' => match self.parse_dollar()? {
                    Some(node) => {
                        flush_lit(&mut parts, &mut lit);
                        parts.push(node);
                    }
                    None => {
                        lit.push('$');
                        self.pos += 1;
                    }
                },
                _ => {
                    lit.push(c);
                    self.pos += 1;
                }
            }
        }

        flush_lit(&mut parts, &mut lit);
        Ok(parts)
    }

    /// Parse an expansion starting at `$`. Returns `None` for a lone `$`.
    fn parse_dollar(&mut self) -> Result<Option<Node>, ParseException> {
        match self.peek(1) {
            Some('(') if self.peek(2) == Some('(') => {
                let close = self.find_close(self.pos + 1, '(', ')')?;
                // $(( expr )) must end with "))"
                if close >= 1 && self.chars[close - 1] == ')' && close - 1 > self.pos + 2 {
                    let text: String = self.chars[self.pos + 3..close - 1].iter().collect();
                    self.pos = close + 1;
                    return Ok(Some(Node::ArithmExp(ArithmExp { text })));
                }
                self.parse_cmd_subst(close).map(Some)
            }
            Some('(') => {
                let close = find_subst_close(self.chars, self.pos + 2)
                    .ok_or_else(|| self.error("missing closing ')'"))?;
                self.parse_cmd_subst(close).map(Some)
            }
            Some('{') => {
                let close = self.find_close(self.pos + 1, '{', '}')?;
                let text: String = self.chars[self.pos + 2..close].iter().collect();
                self.pos = close + 1;
                Ok(Some(Node::ParamExp(ParamExp { short: false, text })))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos + 1;
                let mut end = start;
                while self
                    .chars
                    .get(end)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    end += 1;
                }
                let text: String = self.chars[start..end].iter().collect();
                self.pos = end;
                Ok(Some(Node::ParamExp(ParamExp { short: true, text })))
            }
            Some(c) if SPECIAL_PARAMS.contains(c) => {
                self.pos += 2;
                Ok(Some(Node::ParamExp(ParamExp { short: true, text: c.to_string() })))
            }
            _ => Ok(None),
        }
    }

    fn parse_cmd_subst(&mut self, close: usize) -> Result<Node, ParseException> {
        let body: String = self.chars[self.pos + 2..close].iter().collect();
        let prog = Parser::with_depth(self.depth + 1).parse(&body)?;
        self.pos = close + 1;
        Ok(Node::CmdSubst(CmdSubst { stmts: prog.stmts }))
    }

    fn find_char(&self, target: char, from: usize) -> Option<usize> {
        (from..self.chars.len()).find(|&i| self.chars[i] == target)
    }

    /// Index of the `close` matching the `open` at `open_pos`, skipping quotes.
    fn find_close(&self, open_pos: usize, open: char, close: char) -> Result<usize, ParseException> {
        let mut depth = 0;
        let mut i = open_pos;
        while i < self.chars.len() {
            let c = self.chars[i];
            match c {
                '\\' => i += 1,
                '\'' => {
                    i = self
                        .find_char('\'', i + 1)
                        .ok_or_else(|| self.error("unterminated single quote"))?;
                }
                '"' => {
                    let mut j = i + 1;
                    while j < self.chars.len() && self.chars[j] != '"' {
                        if self.chars[j] == '\\' {
                            j += 1;
                        }
                        j += 1;
                    }
                    i = j;
                }
                _ if c == open => depth += 1,
                _ if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(self.error(format!("missing closing '{}'", close)))
    }
}

fn flush_lit(parts: &mut Vec<Node>, lit: &mut String) {
    if !lit.is_empty() {
        parts.push(Node::Lit(Lit::new(std::mem::take(lit))));
    }
}

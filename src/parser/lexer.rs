//! Lexer for Shell Scripts
//!
//! The lexer tokenizes input into a stream of lexemes that the parser consumes.
//! It handles:
//! - Operators and redirection operators
//! - Words, kept as raw source text (quotes and expansions included)
//! - Comments
//! - Line continuations
//!
//! Any construct still open at end of input (quote, `$(`, `${`, `$((`, a
//! trailing line continuation) is reported as an incomplete-input error.

use crate::ast::types::Token;
use crate::parser::substitution::find_subst_close;
use crate::parser::types::ParseException;

/// Kind of a lexeme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    /// Operator or redirection operator
    Op(Token),
    /// Raw word text
    Word,
    /// File descriptor digits directly followed by a redirection operator
    IoNumber,
    Newline,
    Eof,
}

/// A lexeme produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Lexeme {
    pub fn new(kind: LexemeKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }

    /// True if this is an unquoted word spelling the given reserved word.
    pub fn is_keyword(&self, tok: Token) -> bool {
        self.kind == LexemeKind::Word && Token::keyword(&self.value) == Some(tok)
    }

    /// Text shown in "unexpected token" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            LexemeKind::Op(t) => t.to_string(),
            LexemeKind::Newline => "newline".to_string(),
            LexemeKind::Eof => "end of input".to_string(),
            LexemeKind::Word | LexemeKind::IoNumber => self.value.clone(),
        }
    }
}

/// Two-character operators, checked before single characters
const TWO_CHAR_OPS: &[(&str, Token)] = &[
    ("&&", Token::AndAnd),
    ("||", Token::OrOr),
    (";;", Token::DSemi),
    (">>", Token::DGreat),
    (">&", Token::GreatAnd),
    ("<&", Token::LessAnd),
];

lazy_static::lazy_static! {
    /// Single-character operators
    static ref SINGLE_CHAR_OPS: std::collections::HashMap<char, Token> = {
        let mut m = std::collections::HashMap::new();
        m.insert('|', Token::Pipe);
        m.insert('&', Token::Amp);
        m.insert(';', Token::Semicolon);
        m.insert('(', Token::LParen);
        m.insert(')', Token::RParen);
        m.insert('<', Token::Less);
        m.insert('>', Token::Great);
        m
    };
}

/// Check if a character is a word boundary (ends a word token)
pub(crate) fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Lexer over a complete input buffer
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    lexemes: Vec<Lexeme>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            lexemes: Vec::new(),
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Lexeme>, ParseException> {
        loop {
            self.skip_blanks()?;
            if self.pos >= self.input.len() {
                break;
            }
            let lexeme = self.next_lexeme()?;
            if let Some(lexeme) = lexeme {
                self.lexemes.push(lexeme);
            }
        }

        self.lexemes
            .push(Lexeme::new(LexemeKind::Eof, "", self.line, self.column));
        Ok(self.lexemes)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn incomplete(&self, what: &str) -> ParseException {
        ParseException::incomplete(format!("unexpected end of input: {}", what), self.line, self.column)
    }

    /// Skip spaces, tabs and line continuations. A continuation that runs
    /// into end of input asks for more.
    fn skip_blanks(&mut self) -> Result<(), ParseException> {
        while let Some(c) = self.current() {
            match c {
                ' ' | '\t' => {
                    self.advance();
                }
                '\\' if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                    if self.pos >= self.input.len() {
                        return Err(self.incomplete("line continuation"));
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, ParseException> {
        let line = self.line;
        let column = self.column;
        let c0 = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };

        if c0 == '#' {
            while let Some(c) = self.current() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return Ok(None);
        }

        if c0 == '\n' {
            self.advance();
            return Ok(Some(Lexeme::new(LexemeKind::Newline, "\n", line, column)));
        }

        if let Some(c1) = self.peek(1) {
            let pair: String = [c0, c1].iter().collect();
            if let Some((text, tok)) = TWO_CHAR_OPS.iter().find(|(s, _)| *s == pair) {
                self.advance();
                self.advance();
                return Ok(Some(Lexeme::new(LexemeKind::Op(*tok), *text, line, column)));
            }
        }

        if let Some(tok) = SINGLE_CHAR_OPS.get(&c0) {
            self.advance();
            return Ok(Some(Lexeme::new(LexemeKind::Op(*tok), c0.to_string(), line, column)));
        }

        // fd digits glued to a redirection: 2>file, 1>&2
        if c0.is_ascii_digit() {
            let mut n = 0;
            while self.peek(n).is_some_and(|c| c.is_ascii_digit()) {
                n += 1;
            }
            if matches!(self.peek(n), Some('<') | Some('>')) {
                let digits: String = self.input[self.pos..self.pos + n].iter().collect();
                for _ in 0..n {
                    self.advance();
                }
                return Ok(Some(Lexeme::new(LexemeKind::IoNumber, digits, line, column)));
            }
        }

        let value = self.read_word()?;
        Ok(Some(Lexeme::new(LexemeKind::Word, value, line, column)))
    }

    /// Read raw word text up to the next unquoted boundary.
    fn read_word(&mut self) -> Result<String, ParseException> {
        let mut value = String::new();

        while let Some(c) = self.current() {
            if is_word_boundary(c) {
                break;
            }
            match c {
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        // Line continuation inside a word
                        self.advance();
                        self.advance();
                        if self.pos >= self.input.len() {
                            return Err(self.incomplete("line continuation"));
                        }
                        continue;
                    }
                    value.push(c);
                    self.advance();
                    if let Some(next) = self.advance() {
                        value.push(next);
                    }
                }
                '\'' => self.read_single_quoted(&mut value)?,
                '"' => self.read_double_quoted(&mut value)?,
                '$' => self.read_dollar(&mut value)?,
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(value)
    }

    fn read_single_quoted(&mut self, value: &mut String) -> Result<(), ParseException> {
        value.push('\'');
        self.advance();
        loop {
            match self.advance() {
                Some('\'') => {
                    value.push('\'');
                    return Ok(());
                }
                Some(c) => value.push(c),
                None => return Err(self.incomplete("unterminated single quote")),
            }
        }
    }

    fn read_double_quoted(&mut self, value: &mut String) -> Result<(), ParseException> {
        value.push('"');
        self.advance();
        loop {
            match self.current() {
                Some('"') => {
                    value.push('"');
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    value.push('\\');
                    self.advance();
                    match self.advance() {
                        Some(next) => value.push(next),
                        None => return Err(self.incomplete("unterminated double quote")),
                    }
                }
                Some('$') => self.read_dollar(value)?,
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return Err(self.incomplete("unterminated double quote")),
            }
        }
    }

    /// Read `$`-introduced text, consuming a whole `$(...)`, `$((...))` or `${...}`.
    fn read_dollar(&mut self, value: &mut String) -> Result<(), ParseException> {
        value.push('$');
        self.advance();
        match self.current() {
            Some('(') => {
                let close = find_subst_close(&self.input, self.pos + 1)
                    .ok_or_else(|| self.incomplete("unterminated command substitution"))?;
                while self.pos <= close {
                    if let Some(c) = self.advance() {
                        value.push(c);
                    }
                }
                Ok(())
            }
            Some('{') => {
                value.push('{');
                self.advance();
                self.read_balanced(value, '{', '}', "unterminated parameter expansion")
            }
            _ => Ok(()),
        }
    }

    /// Consume up to and including the close matching an already-consumed open.
    fn read_balanced(
        &mut self,
        value: &mut String,
        open: char,
        close: char,
        what: &str,
    ) -> Result<(), ParseException> {
        let mut depth = 1;
        loop {
            let c = match self.current() {
                Some(c) => c,
                None => return Err(self.incomplete(what)),
            };
            match c {
                '\\' => {
                    value.push(c);
                    self.advance();
                    if let Some(next) = self.advance() {
                        value.push(next);
                    }
                }
                '\'' => self.read_single_quoted(value)?,
                '"' => self.read_double_quoted(value)?,
                '$' => self.read_dollar(value)?,
                _ => {
                    value.push(c);
                    self.advance();
                    if c == open {
                        depth += 1;
                    } else if c == close {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<LexemeKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|l| l.kind)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let lexemes = Lexer::new("echo hello world").tokenize().unwrap();
        assert_eq!(lexemes.len(), 4);
        assert_eq!(lexemes[0].value, "echo");
        assert_eq!(lexemes[2].value, "world");
        assert_eq!(lexemes[3].kind, LexemeKind::Eof);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a && b || c | d; e &"),
            vec![
                LexemeKind::Word,
                LexemeKind::Op(Token::AndAnd),
                LexemeKind::Word,
                LexemeKind::Op(Token::OrOr),
                LexemeKind::Word,
                LexemeKind::Op(Token::Pipe),
                LexemeKind::Word,
                LexemeKind::Op(Token::Semicolon),
                LexemeKind::Word,
                LexemeKind::Op(Token::Amp),
                LexemeKind::Eof,
            ]
        );
    }

    #[test]
    fn test_redirection_with_fd() {
        let lexemes = Lexer::new("cmd 2>&1 >>out").tokenize().unwrap();
        assert_eq!(lexemes[1].kind, LexemeKind::IoNumber);
        assert_eq!(lexemes[1].value, "2");
        assert_eq!(lexemes[2].kind, LexemeKind::Op(Token::GreatAnd));
        assert_eq!(lexemes[3].value, "1");
        assert_eq!(lexemes[4].kind, LexemeKind::Op(Token::DGreat));
    }

    #[test]
    fn test_quotes_kept_raw() {
        let lexemes = Lexer::new("echo 'a b' \"c $d\"").tokenize().unwrap();
        assert_eq!(lexemes[1].value, "'a b'");
        assert_eq!(lexemes[2].value, "\"c $d\"");
    }

    #[test]
    fn test_command_substitution_is_one_word() {
        let lexemes = Lexer::new("echo $(echo a; echo b) x").tokenize().unwrap();
        assert_eq!(lexemes[1].value, "$(echo a; echo b)");
        assert_eq!(lexemes[2].value, "x");
    }

    #[test]
    fn test_arithmetic_is_one_word() {
        let lexemes = Lexer::new("echo $((1 + (2 * 3)))").tokenize().unwrap();
        assert_eq!(lexemes[1].value, "$((1 + (2 * 3)))");
    }

    #[test]
    fn test_case_inside_command_substitution() {
        let lexemes = Lexer::new("echo $(case x in x) echo y;; esac) z").tokenize().unwrap();
        assert_eq!(lexemes[1].value, "$(case x in x) echo y;; esac)");
        assert_eq!(lexemes[2].value, "z");
    }

    #[test]
    fn test_comment() {
        assert_eq!(
            kinds("echo a # trailing comment\n"),
            vec![LexemeKind::Word, LexemeKind::Word, LexemeKind::Newline, LexemeKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_quotes_are_incomplete() {
        for input in ["echo 'foo\n", "echo \"foo\n", "echo $(foo\n", "echo ${x", "echo foo \\\n"] {
            let err = Lexer::new(input).tokenize().unwrap_err();
            assert!(err.incomplete, "expected incomplete for {:?}", input);
        }
    }

    #[test]
    fn test_line_continuation_joins_words() {
        let lexemes = Lexer::new("echo a\\\nb").tokenize().unwrap();
        assert_eq!(lexemes[1].value, "ab");
    }
}

//! Recursive Descent Parser for Shell Scripts
//!
//! This parser consumes lexemes from the lexer and produces an AST.
//!
//! Grammar (simplified):
//!   prog         ::= stmt_list
//!   stmt_list    ::= (and_or [; | & | newline])*
//!   and_or       ::= pipeline (('&&' | '||') linebreak pipeline)*
//!   pipeline     ::= command ('|' linebreak command)*
//!   command      ::= simple_command | compound_command | function_def
//!   simple_cmd   ::= (word | redirection)+
//!   compound_cmd ::= if | for | while | case | subshell | group
//!
//! Whenever the input ends where the grammar still expects something, the
//! resulting error is flagged incomplete so an interactive caller can ask for
//! another line instead of reporting it.

use crate::ast::types::{Command, FuncDecl, Lit, Node, Prog, Redirect, Token, AST};
use crate::parser::lexer::{Lexeme, LexemeKind, Lexer};
use crate::parser::types::{ParseException, ParseOutcome, MAX_INPUT_SIZE, MAX_PARSER_DEPTH};
use crate::parser::word_parser::parse_word;

lazy_static::lazy_static! {
    static ref NAME_RE: regex_lite::Regex = regex_lite::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

/// Check if a string is a valid variable or function name
pub fn is_valid_name(s: &str) -> bool {
    NAME_RE.is_match(s)
}

/// Reserved words that can never start a command
const NON_STARTERS: &[Token] = &[
    Token::Then,
    Token::Elif,
    Token::Else,
    Token::Fi,
    Token::Do,
    Token::Done,
    Token::Esac,
    Token::RBrace,
];

/// Main parser struct
pub struct Parser {
    pub(crate) lexemes: Vec<Lexeme>,
    pub(crate) pos: usize,
    pub(crate) depth: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_depth(0)
    }

    /// Parser for input nested inside another construct (e.g. `$(...)`).
    pub fn with_depth(depth: usize) -> Self {
        Self {
            lexemes: Vec::new(),
            pos: 0,
            depth,
        }
    }

    /// Parse a complete program.
    pub fn parse(&mut self, input: &str) -> Result<Prog, ParseException> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(ParseException::new(
                format!("input too large: {} bytes (max {})", input.len(), MAX_INPUT_SIZE),
                1,
                1,
            ));
        }
        if self.depth > MAX_PARSER_DEPTH {
            return Err(ParseException::new("maximum nesting depth exceeded", 1, 1));
        }

        self.lexemes = Lexer::new(input).tokenize()?;
        self.pos = 0;

        let stmts = self.parse_stmt_list(&[])?;
        if !self.at_eof() {
            return Err(self.unexpected());
        }
        Ok(AST::prog(stmts))
    }

    // =========================================================================
    // Lexeme helpers
    // =========================================================================

    pub(crate) fn current(&self) -> &Lexeme {
        // tokenize always ends with Eof
        let last = self.lexemes.len() - 1;
        &self.lexemes[self.pos.min(last)]
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> LexemeKind {
        self.lexemes
            .get(self.pos + offset)
            .map(|l| l.kind)
            .unwrap_or(LexemeKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Lexeme {
        let lexeme = self.current().clone();
        if lexeme.kind != LexemeKind::Eof {
            self.pos += 1;
        }
        lexeme
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current().kind == LexemeKind::Eof
    }

    pub(crate) fn is_op(&self, tok: Token) -> bool {
        self.current().kind == LexemeKind::Op(tok)
    }

    /// Current lexeme matches `tok`, either as an operator or a reserved word.
    pub(crate) fn check(&self, tok: Token) -> bool {
        self.is_op(tok) || self.current().is_keyword(tok)
    }

    /// The lexeme after the current one matches `tok`.
    pub(crate) fn next_is(&self, tok: Token) -> bool {
        self.lexemes
            .get(self.pos + 1)
            .is_some_and(|l| l.kind == LexemeKind::Op(tok) || l.is_keyword(tok))
    }

    pub(crate) fn expect(&mut self, tok: Token) -> Result<Lexeme, ParseException> {
        if self.check(tok) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.current().kind == LexemeKind::Newline {
            self.advance();
        }
    }

    /// Error for the current lexeme. Running out of input is always incomplete.
    pub(crate) fn unexpected(&self) -> ParseException {
        let lexeme = self.current();
        if lexeme.kind == LexemeKind::Eof {
            ParseException::incomplete("unexpected end of input", lexeme.line, lexeme.column)
        } else {
            ParseException::new(
                format!("syntax error near unexpected token `{}'", lexeme.describe()),
                lexeme.line,
                lexeme.column,
            )
        }
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> ParseException {
        let lexeme = self.current();
        ParseException::new(message, lexeme.line, lexeme.column)
    }

    fn is_stop(&self, stops: &[Token]) -> bool {
        let lexeme = self.current();
        match lexeme.kind {
            LexemeKind::Op(t) => stops.contains(&t),
            LexemeKind::Word => Token::keyword(&lexeme.value).is_some_and(|t| stops.contains(&t)),
            _ => false,
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Parse statements until end of input or one of `stops` in command position.
    pub(crate) fn parse_stmt_list(&mut self, stops: &[Token]) -> Result<Vec<Node>, ParseException> {
        let mut stmts = Vec::new();

        loop {
            self.skip_newlines();
            if self.at_eof() || self.is_stop(stops) {
                break;
            }

            let mut stmt = self.parse_and_or()?;

            if self.is_op(Token::Amp) {
                match &mut stmt {
                    Node::Command(cmd) => cmd.background = true,
                    _ => return Err(self.error_here("`&' is only supported after a simple command")),
                }
                self.advance();
                // "a &; b" is how a background command renders mid-list
                if self.is_op(Token::Semicolon) {
                    self.advance();
                }
                stmts.push(stmt);
                continue;
            }
            stmts.push(stmt);

            match self.current().kind {
                LexemeKind::Op(Token::Semicolon) | LexemeKind::Newline => {
                    self.advance();
                }
                LexemeKind::Eof => break,
                _ if self.is_stop(stops) => break,
                _ => return Err(self.unexpected()),
            }
        }

        Ok(stmts)
    }

    /// Like [`Parser::parse_stmt_list`] but at least one statement is required.
    pub(crate) fn parse_body(&mut self, stops: &[Token]) -> Result<Vec<Node>, ParseException> {
        let stmts = self.parse_stmt_list(stops)?;
        if stmts.is_empty() {
            return Err(self.unexpected());
        }
        Ok(stmts)
    }

    fn parse_and_or(&mut self) -> Result<Node, ParseException> {
        let mut x = self.parse_pipeline()?;
        while let LexemeKind::Op(op @ (Token::AndAnd | Token::OrOr)) = self.current().kind {
            self.advance();
            self.skip_newlines();
            let y = self.parse_pipeline()?;
            x = AST::binary(x, op, y);
        }
        Ok(x)
    }

    fn parse_pipeline(&mut self) -> Result<Node, ParseException> {
        let mut x = self.parse_command()?;
        while self.is_op(Token::Pipe) {
            self.advance();
            self.skip_newlines();
            let y = self.parse_command()?;
            x = AST::binary(x, Token::Pipe, y);
        }
        Ok(x)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub(crate) fn parse_command(&mut self) -> Result<Node, ParseException> {
        let lexeme = self.current().clone();
        match lexeme.kind {
            LexemeKind::Op(Token::LParen) => return self.nested(|p| p.parse_subshell()),
            LexemeKind::Word | LexemeKind::IoNumber => {}
            LexemeKind::Op(t) if t.is_redirect() => {}
            _ => return Err(self.unexpected()),
        }

        if lexeme.kind == LexemeKind::Word {
            match Token::keyword(&lexeme.value) {
                Some(Token::If) => return self.nested(|p| p.parse_if()),
                Some(Token::While) => return self.nested(|p| p.parse_while()),
                Some(Token::For) => return self.nested(|p| p.parse_for()),
                Some(Token::Case) => return self.nested(|p| p.parse_case()),
                Some(Token::LBrace) => return self.nested(|p| p.parse_block()),
                Some(t) if NON_STARTERS.contains(&t) => return Err(self.unexpected()),
                _ => {}
            }

            if self.peek_kind(1) == LexemeKind::Op(Token::LParen)
                && self.peek_kind(2) == LexemeKind::Op(Token::RParen)
            {
                return self.nested(|p| p.parse_func_decl());
            }
        }

        self.parse_simple_command()
    }

    /// Run a compound-command parser one nesting level deeper.
    fn nested<F>(&mut self, f: F) -> Result<Node, ParseException>
    where
        F: FnOnce(&mut Self) -> Result<Node, ParseException>,
    {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            return Err(self.error_here("maximum nesting depth exceeded"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_func_decl(&mut self) -> Result<Node, ParseException> {
        let name = self.advance();
        if !is_valid_name(&name.value) {
            return Err(ParseException::new(
                format!("`{}': not a valid identifier", name.value),
                name.line,
                name.column,
            ));
        }
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;
        self.skip_newlines();
        let body = self.parse_command()?;
        Ok(Node::FuncDecl(FuncDecl {
            name: Lit::new(name.value),
            body: Box::new(body),
        }))
    }

    fn parse_simple_command(&mut self) -> Result<Node, ParseException> {
        let mut args = Vec::new();

        loop {
            let lexeme = self.current().clone();
            match lexeme.kind {
                LexemeKind::Word => {
                    self.advance();
                    args.push(self.word_node(&lexeme)?);
                }
                LexemeKind::IoNumber => {
                    self.advance();
                    let fd = lexeme
                        .value
                        .parse::<u32>()
                        .map_err(|_| self.error_here(format!("bad file descriptor `{}'", lexeme.value)))?;
                    args.push(self.parse_redirect(Some(fd))?);
                }
                LexemeKind::Op(t) if t.is_redirect() => {
                    args.push(self.parse_redirect(None)?);
                }
                _ => break,
            }
        }

        if args.is_empty() {
            return Err(self.unexpected());
        }
        Ok(Node::Command(Command { args, background: false }))
    }

    fn parse_redirect(&mut self, fd: Option<u32>) -> Result<Node, ParseException> {
        let op = match self.current().kind {
            LexemeKind::Op(t) if t.is_redirect() => t,
            _ => return Err(self.unexpected()),
        };
        self.advance();

        let target = self.current().clone();
        if target.kind != LexemeKind::Word {
            return Err(self.unexpected());
        }
        self.advance();
        Ok(Node::Redirect(Redirect {
            fd,
            op,
            obj: Box::new(self.word_node(&target)?),
        }))
    }

    pub(crate) fn word_node(&self, lexeme: &Lexeme) -> Result<Node, ParseException> {
        let word = parse_word(&lexeme.value, lexeme.line, lexeme.column, self.depth)?;
        Ok(Node::Word(word))
    }
}

/// Parse a complete program from source text.
pub fn parse(input: &str) -> Result<Prog, ParseException> {
    Parser::new().parse(input)
}

/// Parse a possibly partial chunk of interactive input.
pub fn parse_incremental(input: &str) -> ParseOutcome {
    parse(input).into()
}

//! Compound Command Parser
//!
//! Handles parsing of compound commands: if, for, while, case, subshell, group.

use crate::ast::types::{
    Block, CasePattern, CaseStmt, Elif, ForStmt, IfStmt, Lit, Node, Subshell, Token, WhileStmt,
};
use crate::parser::lexer::LexemeKind;
use crate::parser::parser::{is_valid_name, Parser};
use crate::parser::types::ParseException;

impl Parser {
    /// Parse a condition list. Several statements are grouped into a block so
    /// the condition stays a single node.
    fn parse_condition(&mut self, stop: Token) -> Result<Box<Node>, ParseException> {
        let mut stmts = self.parse_body(&[stop])?;
        let cond = if stmts.len() == 1 {
            stmts.remove(0)
        } else {
            Node::Block(Block { stmts })
        };
        Ok(Box::new(cond))
    }

    /// Parse an if statement
    pub(crate) fn parse_if(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::If)?;
        let cond = self.parse_condition(Token::Then)?;
        self.expect(Token::Then)?;
        let then_stmts = self.parse_body(&[Token::Elif, Token::Else, Token::Fi])?;

        let mut elifs = Vec::new();
        while self.check(Token::Elif) {
            self.advance();
            let cond = self.parse_condition(Token::Then)?;
            self.expect(Token::Then)?;
            let then_stmts = self.parse_body(&[Token::Elif, Token::Else, Token::Fi])?;
            elifs.push(Elif { cond, then_stmts });
        }

        let mut else_stmts = Vec::new();
        if self.check(Token::Else) {
            self.advance();
            else_stmts = self.parse_body(&[Token::Fi])?;
        }

        self.expect(Token::Fi)?;
        Ok(Node::IfStmt(IfStmt {
            cond,
            then_stmts,
            elifs,
            else_stmts,
        }))
    }

    /// Parse a while loop
    pub(crate) fn parse_while(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::While)?;
        let cond = self.parse_condition(Token::Do)?;
        self.expect(Token::Do)?;
        let do_stmts = self.parse_body(&[Token::Done])?;
        self.expect(Token::Done)?;
        Ok(Node::WhileStmt(WhileStmt { cond, do_stmts }))
    }

    /// Parse a for loop: for NAME in WORDS; do ...; done
    pub(crate) fn parse_for(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::For)?;

        let name = self.current().clone();
        if name.kind != LexemeKind::Word {
            return Err(self.unexpected());
        }
        if !is_valid_name(&name.value) {
            return Err(self.error_here(format!("`{}': not a valid identifier", name.value)));
        }
        self.advance();

        self.skip_newlines();
        self.expect(Token::In)?;

        let mut word_list = Vec::new();
        while self.current().kind == LexemeKind::Word {
            let lexeme = self.advance();
            word_list.push(self.word_node(&lexeme)?);
        }

        match self.current().kind {
            LexemeKind::Op(Token::Semicolon) | LexemeKind::Newline => {
                self.advance();
            }
            _ => return Err(self.unexpected()),
        }
        self.skip_newlines();

        self.expect(Token::Do)?;
        let do_stmts = self.parse_body(&[Token::Done])?;
        self.expect(Token::Done)?;

        Ok(Node::ForStmt(ForStmt {
            name: Lit::new(name.value),
            word_list,
            do_stmts,
        }))
    }

    /// Parse a case statement
    pub(crate) fn parse_case(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::Case)?;

        let subject = self.current().clone();
        if subject.kind != LexemeKind::Word {
            return Err(self.unexpected());
        }
        self.advance();
        let name = self.word_node(&subject)?;

        self.skip_newlines();
        self.expect(Token::In)?;

        self.skip_newlines();
        // `case x in ; esac` is how a case without arms renders
        if self.is_op(Token::Semicolon) && self.next_is(Token::Esac) {
            self.advance();
        }

        let mut patterns = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(Token::Esac) {
                break;
            }
            patterns.push(self.parse_case_arm()?);

            if self.is_op(Token::DSemi) {
                self.advance();
                continue;
            }
            self.skip_newlines();
            if !self.check(Token::Esac) {
                return Err(self.unexpected());
            }
        }

        self.expect(Token::Esac)?;
        Ok(Node::CaseStmt(CaseStmt {
            name: Box::new(name),
            patterns,
        }))
    }

    fn parse_case_arm(&mut self) -> Result<CasePattern, ParseException> {
        if self.is_op(Token::LParen) {
            self.advance();
        }

        let mut parts = Vec::new();
        loop {
            let lexeme = self.current().clone();
            if lexeme.kind != LexemeKind::Word {
                return Err(self.unexpected());
            }
            self.advance();
            parts.push(self.word_node(&lexeme)?);

            if !self.is_op(Token::Pipe) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RParen)?;
        // an empty last arm renders as `PAT) ; esac`
        if self.is_op(Token::Semicolon) && self.next_is(Token::Esac) {
            self.advance();
        }

        let stmts = self.parse_stmt_list(&[Token::DSemi, Token::Esac])?;
        Ok(CasePattern { parts, stmts })
    }

    /// Parse a subshell: ( ... )
    pub(crate) fn parse_subshell(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::LParen)?;
        let stmts = self.parse_body(&[Token::RParen])?;
        self.expect(Token::RParen)?;
        Ok(Node::Subshell(Subshell { stmts }))
    }

    /// Parse a command group: { ...; }
    pub(crate) fn parse_block(&mut self) -> Result<Node, ParseException> {
        self.expect(Token::LBrace)?;
        let stmts = self.parse_body(&[Token::RBrace])?;
        self.expect(Token::RBrace)?;
        Ok(Node::Block(Block { stmts }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::types::Node;
    use crate::parser::parser::parse;

    #[test]
    fn test_if_with_multi_statement_condition() {
        let prog = parse("if a; b; then c; fi").unwrap();
        match &prog.stmts[0] {
            Node::IfStmt(stmt) => assert!(matches!(&*stmt.cond, Node::Block(b) if b.stmts.len() == 2)),
            other => panic!("expected IfStmt, got {:?}", other),
        }
    }

    #[test]
    fn test_for_requires_in() {
        assert!(parse("for i; do echo; done").is_err());
        assert!(parse("for i in; do echo $i; done").is_ok());
    }

    #[test]
    fn test_case_arms() {
        let prog = parse("case $x in (a|b) echo ab;; *) ;; esac").unwrap();
        match &prog.stmts[0] {
            Node::CaseStmt(stmt) => {
                assert_eq!(stmt.patterns.len(), 2);
                assert_eq!(stmt.patterns[0].parts.len(), 2);
                assert!(stmt.patterns[1].stmts.is_empty());
            }
            other => panic!("expected CaseStmt, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_case_arms() {
        for src in ["case x in a) ;; esac", "case x in a) ; esac", "case x in esac", "case x in ; esac"] {
            let prog = parse(src).unwrap();
            match &prog.stmts[0] {
                Node::CaseStmt(stmt) => assert!(stmt.patterns.iter().all(|p| p.stmts.is_empty())),
                other => panic!("expected CaseStmt, got {:?}", other),
            }
        }
        assert!(parse("case x in a) ; echo; esac").is_err());
    }

    #[test]
    fn test_empty_bodies_are_errors() {
        assert!(parse("if a; then fi").is_err());
        assert!(parse("while a; do done").is_err());
        assert!(parse("{ }").is_err());
        assert!(parse("()").is_err());
    }

    #[test]
    fn test_nested_compounds() {
        let src = "while a; do if b; then for i in x; do (c); done; fi; done";
        assert_eq!(parse(src).unwrap().to_string(), src);
    }
}

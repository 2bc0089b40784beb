//! Abstract Syntax Tree (AST) Types
//!
//! Every node owns its children and renders itself to a canonical, re-parseable
//! form through `Display`. Two trees that render identically are considered
//! syntactically equivalent.
//!
//! Separators used by the rendering:
//!   statements  -> "; "
//!   words       -> " "
//!   case arms   -> ";; "
//!   word parts  -> ""

use std::fmt;

// =============================================================================
// TOKENS
// =============================================================================

/// Operators and reserved words the grammar attaches to nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Redirections
    Less,     // <
    Great,    // >
    DGreat,   // >>
    LessAnd,  // <&
    GreatAnd, // >&

    // Binary operators
    AndAnd, // &&
    OrOr,   // ||
    Pipe,   // |

    // Separators and grouping
    Semicolon, // ;
    DSemi,     // ;;
    Amp,       // &
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }

    // Reserved words
    If,
    Then,
    Elif,
    Else,
    Fi,
    While,
    For,
    In,
    Do,
    Done,
    Case,
    Esac,
}

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Great => ">",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Pipe => "|",
            Self::Semicolon => ";",
            Self::DSemi => ";;",
            Self::Amp => "&",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::If => "if",
            Self::Then => "then",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::Fi => "fi",
            Self::While => "while",
            Self::For => "for",
            Self::In => "in",
            Self::Do => "do",
            Self::Done => "done",
            Self::Case => "case",
            Self::Esac => "esac",
        }
    }

    /// Look up a reserved word by its text.
    pub fn keyword(s: &str) -> Option<Token> {
        match s {
            "if" => Some(Self::If),
            "then" => Some(Self::Then),
            "elif" => Some(Self::Elif),
            "else" => Some(Self::Else),
            "fi" => Some(Self::Fi),
            "while" => Some(Self::While),
            "for" => Some(Self::For),
            "in" => Some(Self::In),
            "do" => Some(Self::Do),
            "done" => Some(Self::Done),
            "case" => Some(Self::Case),
            "esac" => Some(Self::Esac),
            "{" => Some(Self::LBrace),
            "}" => Some(Self::RBrace),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            Self::Less | Self::Great | Self::DGreat | Self::LessAnd | Self::GreatAnd
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROGRAM
// =============================================================================

/// Root node: the only tree shape the runner accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prog {
    pub stmts: Vec<Node>,
}

impl fmt::Display for Prog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        stmt_join(f, &self.stmts)
    }
}

/// Union of every node shape below the root.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Command(Command),
    Redirect(Redirect),
    Subshell(Subshell),
    Block(Block),
    IfStmt(IfStmt),
    WhileStmt(WhileStmt),
    ForStmt(ForStmt),
    BinaryExpr(BinaryExpr),
    FuncDecl(FuncDecl),
    CaseStmt(CaseStmt),
    Word(Word),
    Lit(Lit),
    DblQuoted(DblQuoted),
    CmdSubst(CmdSubst),
    ParamExp(ParamExp),
    ArithmExp(ArithmExp),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Command(n) => n.fmt(f),
            Node::Redirect(n) => n.fmt(f),
            Node::Subshell(n) => n.fmt(f),
            Node::Block(n) => n.fmt(f),
            Node::IfStmt(n) => n.fmt(f),
            Node::WhileStmt(n) => n.fmt(f),
            Node::ForStmt(n) => n.fmt(f),
            Node::BinaryExpr(n) => n.fmt(f),
            Node::FuncDecl(n) => n.fmt(f),
            Node::CaseStmt(n) => n.fmt(f),
            Node::Word(n) => n.fmt(f),
            Node::Lit(n) => n.fmt(f),
            Node::DblQuoted(n) => n.fmt(f),
            Node::CmdSubst(n) => n.fmt(f),
            Node::ParamExp(n) => n.fmt(f),
            Node::ArithmExp(n) => n.fmt(f),
        }
    }
}

fn node_join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, nodes: &[T], sep: &str) -> fmt::Result {
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        n.fmt(f)?;
    }
    Ok(())
}

fn stmt_join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, nodes: &[T]) -> fmt::Result {
    node_join(f, nodes, "; ")
}

fn word_join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, nodes: &[T]) -> fmt::Result {
    node_join(f, nodes, " ")
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Simple command: words and redirections in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub args: Vec<Node>,
    pub background: bool,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        word_join(f, &self.args)?;
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// I/O redirection attached to a command, e.g. `>out` or `2>&1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Explicit file descriptor prefix (`2>`); `None` means the operator default
    pub fd: Option<u32>,
    pub op: Token,
    pub obj: Box<Node>,
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fd) = self.fd {
            write!(f, "{}", fd)?;
        }
        write!(f, "{}{}", self.op, self.obj)
    }
}

/// Subshell: ( ... )
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subshell {
    pub stmts: Vec<Node>,
}

impl fmt::Display for Subshell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        stmt_join(f, &self.stmts)?;
        f.write_str(")")
    }
}

/// Command group: { ...; }
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Node>,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        stmt_join(f, &self.stmts)?;
        f.write_str("; }")
    }
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// if statement
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Box<Node>,
    pub then_stmts: Vec<Node>,
    pub elifs: Vec<Elif>,
    pub else_stmts: Vec<Node>,
}

impl fmt::Display for IfStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if {}; then ", self.cond)?;
        stmt_join(f, &self.then_stmts)?;
        for elif in &self.elifs {
            write!(f, "; {}", elif)?;
        }
        if !self.else_stmts.is_empty() {
            f.write_str("; else ")?;
            stmt_join(f, &self.else_stmts)?;
        }
        f.write_str("; fi")
    }
}

/// Chained alternative of an [`IfStmt`].
#[derive(Debug, Clone, PartialEq)]
pub struct Elif {
    pub cond: Box<Node>,
    pub then_stmts: Vec<Node>,
}

impl fmt::Display for Elif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "elif {}; then ", self.cond)?;
        stmt_join(f, &self.then_stmts)
    }
}

/// while loop
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Box<Node>,
    pub do_stmts: Vec<Node>,
}

impl fmt::Display for WhileStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "while {}; do ", self.cond)?;
        stmt_join(f, &self.do_stmts)?;
        f.write_str("; done")
    }
}

/// for loop: for NAME in WORDS; do ...; done
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub name: Lit,
    pub word_list: Vec<Node>,
    pub do_stmts: Vec<Node>,
}

impl fmt::Display for ForStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "for {} in ", self.name)?;
        word_join(f, &self.word_list)?;
        f.write_str("; do ")?;
        stmt_join(f, &self.do_stmts)?;
        f.write_str("; done")
    }
}

/// `&&`, `||` and `|` between two statements.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub x: Box<Node>,
    pub y: Box<Node>,
    pub op: Token,
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.op, self.y)
    }
}

/// Function definition: name() body
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Lit,
    pub body: Box<Node>,
}

impl fmt::Display for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}() {}", self.name, self.body)
    }
}

/// case statement
#[derive(Debug, Clone, PartialEq)]
pub struct CaseStmt {
    pub name: Box<Node>,
    pub patterns: Vec<CasePattern>,
}

impl fmt::Display for CaseStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case {} in ", self.name)?;
        node_join(f, &self.patterns, ";; ")?;
        f.write_str("; esac")
    }
}

/// One arm of a [`CaseStmt`].
#[derive(Debug, Clone, PartialEq)]
pub struct CasePattern {
    pub parts: Vec<Node>,
    pub stmts: Vec<Node>,
}

impl fmt::Display for CasePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node_join(f, &self.parts, " | ")?;
        f.write_str(") ")?;
        stmt_join(f, &self.stmts)
    }
}

// =============================================================================
// WORDS
// =============================================================================

/// A single shell word built from literal and expansion fragments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<Node>,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node_join(f, &self.parts, "")
    }
}

/// Unexpanded literal text. Single quotes and backslashes are kept verbatim;
/// quote removal happens during expansion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lit {
    pub val: String,
}

impl Lit {
    pub fn new(val: impl Into<String>) -> Self {
        Self { val: val.into() }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.val)
    }
}

/// Double-quoted string: "with $expansion"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DblQuoted {
    pub parts: Vec<Node>,
}

impl fmt::Display for DblQuoted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        node_join(f, &self.parts, "")?;
        f.write_str("\"")
    }
}

/// Command substitution: $( ... )
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CmdSubst {
    pub stmts: Vec<Node>,
}

impl fmt::Display for CmdSubst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$(")?;
        stmt_join(f, &self.stmts)?;
        f.write_str(")")
    }
}

/// Parameter expansion: `$X` when short, `${...}` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamExp {
    pub short: bool,
    pub text: String,
}

impl fmt::Display for ParamExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short {
            write!(f, "${}", self.text)
        } else {
            write!(f, "${{{}}}", self.text)
        }
    }
}

/// Arithmetic expansion: $(( ... ))
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmExp {
    pub text: String,
}

impl fmt::Display for ArithmExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$(({}))", self.text)
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Convenience constructors used by the parser and tests.
pub struct AST;

impl AST {
    pub fn prog(stmts: Vec<Node>) -> Prog {
        Prog { stmts }
    }

    pub fn lit(val: impl Into<String>) -> Node {
        Node::Lit(Lit::new(val))
    }

    /// A word made of a single literal.
    pub fn lit_word(val: impl Into<String>) -> Node {
        Node::Word(Word { parts: vec![Self::lit(val)] })
    }

    pub fn word(parts: Vec<Node>) -> Node {
        Node::Word(Word { parts })
    }

    /// A simple foreground command made of literal words.
    pub fn command(words: &[&str]) -> Node {
        Node::Command(Command {
            args: words.iter().map(|w| Self::lit_word(*w)).collect(),
            background: false,
        })
    }

    pub fn binary(x: Node, op: Token, y: Node) -> Node {
        Node::BinaryExpr(BinaryExpr { x: Box::new(x), y: Box::new(y), op })
    }
}

// ============================================================================
// Tests
// ============================================================================

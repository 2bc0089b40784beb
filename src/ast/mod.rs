//! Abstract Syntax Tree (AST) Types for the shell
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Runner → Output

pub mod types;

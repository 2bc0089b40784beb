//! Arithmetic Evaluation
//!
//! Evaluates `$(( ... ))` expressions over 64-bit signed integers:
//! - Basic operators (+, -, *, /, %, **)
//! - Comparison operators (<, <=, >, >=, ==, !=)
//! - Bitwise operators (&, |, ^, ~, <<, >>)
//! - Logical operators (&&, ||, !) with short-circuit evaluation
//! - Assignment operators (=, +=, -=, *=, /=, %=)
//! - Ternary operator (? :)
//!
//! `$` expansions inside the expression are performed before evaluation;
//! bare names are resolved here, recursively, like bash does.

use std::collections::HashMap;

use crate::interpreter::errors::InterpreterError;
use crate::parser::is_valid_name;

/// Maximum depth when a variable's value is itself an expression.
const MAX_RESOLVE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOperator {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    Variable(String),
    Unary(ArithUnaryOperator, Box<ArithExpr>),
    Binary(ArithBinaryOperator, Box<ArithExpr>, Box<ArithExpr>),
    Ternary(Box<ArithExpr>, Box<ArithExpr>, Box<ArithExpr>),
    /// name, compound operator (`+=` -> Add), value
    Assign(String, Option<ArithBinaryOperator>, Box<ArithExpr>),
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ArithToken {
    Num(i64),
    Ident(String),
    Op(&'static str),
}

/// Operators, longest first so `<<=` wins over `<<` and `<`.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "**", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "!", "~", "?", ":", "(", ")", "=",
];

fn parse_number(text: &str) -> Result<i64, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8)
    } else {
        text.parse::<i64>()
    };
    parsed.map_err(|_| format!("{}: value too great for base", text))
}

fn tokenize(expr: &str) -> Result<Vec<ArithToken>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(ArithToken::Num(parse_number(&text)?));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(ArithToken::Ident(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                Some(op) => {
                    tokens.push(ArithToken::Op(op));
                    i += op.len();
                }
                None => return Err(format!("syntax error: invalid arithmetic operator (error token is \"{}\")", c)),
            }
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser (precedence climbing)
// ============================================================================

struct ArithParser {
    tokens: Vec<ArithToken>,
    pos: usize,
}

fn binary_op(op: &str) -> Option<(ArithBinaryOperator, u8)> {
    use ArithBinaryOperator::*;
    let entry = match op {
        "||" => (LogOr, 1),
        "&&" => (LogAnd, 2),
        "|" => (BitOr, 3),
        "^" => (BitXor, 4),
        "&" => (BitAnd, 5),
        "==" => (Eq, 6),
        "!=" => (Ne, 6),
        "<" => (Lt, 7),
        "<=" => (Le, 7),
        ">" => (Gt, 7),
        ">=" => (Ge, 7),
        "<<" => (LShift, 8),
        ">>" => (RShift, 8),
        "+" => (Add, 9),
        "-" => (Sub, 9),
        "*" => (Mul, 10),
        "/" => (Div, 10),
        "%" => (Mod, 10),
        "**" => (Pow, 11),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(op: &str) -> Option<Option<ArithBinaryOperator>> {
    use ArithBinaryOperator::*;
    match op {
        "=" => Some(None),
        "+=" => Some(Some(Add)),
        "-=" => Some(Some(Sub)),
        "*=" => Some(Some(Mul)),
        "/=" => Some(Some(Div)),
        "%=" => Some(Some(Mod)),
        "<<=" => Some(Some(LShift)),
        ">>=" => Some(Some(RShift)),
        _ => None,
    }
}

impl ArithParser {
    fn peek(&self) -> Option<&ArithToken> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(ArithToken::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), String> {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("syntax error: `{}' expected", op))
        }
    }

    fn parse_expr(&mut self) -> Result<ArithExpr, String> {
        // assignment: IDENT op= expr (right associative)
        if let (Some(ArithToken::Ident(name)), Some(ArithToken::Op(op))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            if let Some(compound) = assign_op(op) {
                let name = name.clone();
                self.pos += 2;
                let value = self.parse_expr()?;
                return Ok(ArithExpr::Assign(name, compound, Box::new(value)));
            }
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<ArithExpr, String> {
        let cond = self.parse_binary(1)?;
        if self.peek_op() == Some("?") {
            self.pos += 1;
            let then = self.parse_expr()?;
            self.expect_op(":")?;
            let otherwise = self.parse_ternary()?;
            return Ok(ArithExpr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)));
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<ArithExpr, String> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec)) = self.peek_op().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            // ** is right associative
            let next_min = if op == ArithBinaryOperator::Pow { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            left = ArithExpr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ArithExpr, String> {
        let op = match self.peek_op() {
            Some("-") => ArithUnaryOperator::Neg,
            Some("+") => ArithUnaryOperator::Plus,
            Some("!") => ArithUnaryOperator::Not,
            Some("~") => ArithUnaryOperator::BitNot,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(ArithExpr::Unary(op, Box::new(operand)))
    }

    fn parse_primary(&mut self) -> Result<ArithExpr, String> {
        match self.peek().cloned() {
            Some(ArithToken::Num(n)) => {
                self.pos += 1;
                Ok(ArithExpr::Number(n))
            }
            Some(ArithToken::Ident(name)) => {
                self.pos += 1;
                Ok(ArithExpr::Variable(name))
            }
            Some(ArithToken::Op("(")) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Some(ArithToken::Op(op)) => Err(format!("syntax error: operand expected (error token is \"{}\")", op)),
            None => Err("syntax error: operand expected".to_string()),
        }
    }
}

/// Parse an arithmetic expression. An empty expression evaluates to 0.
pub fn parse_arith_expr(expr: &str) -> Result<ArithExpr, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok(ArithExpr::Number(0));
    }
    let mut parser = ArithParser { tokens, pos: 0 };
    let result = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("syntax error in expression (error token is \"{:?}\")", tok));
    }
    Ok(result)
}

// ============================================================================
// Evaluation
// ============================================================================

/// Pure binary operator evaluation.
fn apply_binary_op(left: i64, right: i64, operator: ArithBinaryOperator) -> Result<i64, String> {
    use ArithBinaryOperator::*;
    Ok(match operator {
        Add => left.wrapping_add(right),
        Sub => left.wrapping_sub(right),
        Mul => left.wrapping_mul(right),
        Div | Mod if right == 0 => return Err("division by 0".to_string()),
        Div => left.wrapping_div(right),
        Mod => left.wrapping_rem(right),
        Pow if right < 0 => return Err("exponent less than 0".to_string()),
        Pow => left.wrapping_pow(right.min(u32::MAX as i64) as u32),
        LShift => left.wrapping_shl(right as u32),
        RShift => left.wrapping_shr(right as u32),
        Lt => (left < right) as i64,
        Le => (left <= right) as i64,
        Gt => (left > right) as i64,
        Ge => (left >= right) as i64,
        Eq => (left == right) as i64,
        Ne => (left != right) as i64,
        BitAnd => left & right,
        BitOr => left | right,
        BitXor => left ^ right,
        LogAnd => (left != 0 && right != 0) as i64,
        LogOr => (left != 0 || right != 0) as i64,
    })
}

fn apply_unary_op(operand: i64, operator: ArithUnaryOperator) -> i64 {
    match operator {
        ArithUnaryOperator::Neg => operand.wrapping_neg(),
        ArithUnaryOperator::Plus => operand,
        ArithUnaryOperator::Not => (operand == 0) as i64,
        ArithUnaryOperator::BitNot => !operand,
    }
}

struct Evaluator<'a> {
    vars: &'a mut HashMap<String, String>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    /// Resolve a variable: empty is 0, numbers are taken as-is, anything else
    /// is evaluated as an expression of its own.
    fn resolve(&mut self, name: &str) -> Result<i64, String> {
        let value = self.vars.get(name).cloned().unwrap_or_default();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Ok(n);
        }
        if self.depth >= MAX_RESOLVE_DEPTH {
            return Err(format!("{}: expression recursion level exceeded", name));
        }
        self.depth += 1;
        let result = parse_arith_expr(trimmed).and_then(|e| self.eval(&e));
        self.depth -= 1;
        result
    }

    fn eval(&mut self, expr: &ArithExpr) -> Result<i64, String> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Variable(name) => self.resolve(name),
            ArithExpr::Unary(op, operand) => Ok(apply_unary_op(self.eval(operand)?, *op)),
            ArithExpr::Binary(ArithBinaryOperator::LogAnd, l, r) => {
                if self.eval(l)? == 0 {
                    return Ok(0);
                }
                Ok((self.eval(r)? != 0) as i64)
            }
            ArithExpr::Binary(ArithBinaryOperator::LogOr, l, r) => {
                if self.eval(l)? != 0 {
                    return Ok(1);
                }
                Ok((self.eval(r)? != 0) as i64)
            }
            ArithExpr::Binary(op, l, r) => {
                let left = self.eval(l)?;
                let right = self.eval(r)?;
                apply_binary_op(left, right, *op)
            }
            ArithExpr::Ternary(cond, then, otherwise) => {
                if self.eval(cond)? != 0 {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ArithExpr::Assign(name, compound, value) => {
                if !is_valid_name(name) {
                    return Err(format!("{}: attempted assignment to non-variable", name));
                }
                let rhs = self.eval(value)?;
                let result = match compound {
                    Some(op) => apply_binary_op(self.resolve(name)?, rhs, *op)?,
                    None => rhs,
                };
                self.vars.insert(name.clone(), result.to_string());
                Ok(result)
            }
        }
    }
}

/// Evaluate an already-expanded arithmetic expression against `vars`.
pub fn evaluate_arithmetic(
    expr: &str,
    vars: &mut HashMap<String, String>,
) -> Result<i64, InterpreterError> {
    let parsed = parse_arith_expr(expr)
        .map_err(|msg| InterpreterError::Arithmetic(format!("{}: {}", expr.trim(), msg)))?;
    let mut evaluator = Evaluator { vars, depth: 0 };
    evaluator
        .eval(&parsed)
        .map_err(|msg| InterpreterError::Arithmetic(format!("{}: {}", expr.trim(), msg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> i64 {
        evaluate_arithmetic(expr, &mut HashMap::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7);
        assert_eq!(eval("(1 + 2) * 3"), 9);
        assert_eq!(eval("2 ** 3 ** 2"), 512);
        assert_eq!(eval("-3 + 5"), 2);
        assert_eq!(eval("10 - 2 - 3"), 5);
        assert_eq!(eval("1 < 2 && 3 > 4 || !0"), 1);
        assert_eq!(eval("1 ? 7 : 9"), 7);
        assert_eq!(eval(""), 0);
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(eval("0x10"), 16);
        assert_eq!(eval("010"), 8);
        assert!(evaluate_arithmetic("09", &mut HashMap::new()).is_err());
    }

    #[test]
    fn test_apply_binary_op_division_by_zero() {
        assert_eq!(
            apply_binary_op(1, 0, ArithBinaryOperator::Div),
            Err("division by 0".to_string())
        );
        let err = evaluate_arithmetic("5 % 0", &mut HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "5 % 0: division by 0");
    }

    #[test]
    fn test_negative_exponent_is_an_error() {
        let err = evaluate_arithmetic("2 ** -1", &mut HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "2 ** -1: exponent less than 0");
        assert_eq!(eval("(-2) ** 3"), -8);
    }

    #[test]
    fn test_variables_and_assignment() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), "4".to_string());
        vars.insert("y".to_string(), "x * 2".to_string());
        assert_eq!(evaluate_arithmetic("y + 1", &mut vars).unwrap(), 9);
        assert_eq!(evaluate_arithmetic("unset_var + 1", &mut vars).unwrap(), 1);

        assert_eq!(evaluate_arithmetic("x += 3", &mut vars).unwrap(), 7);
        assert_eq!(vars.get("x").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_short_circuit_skips_division() {
        assert_eq!(eval("0 && 1 / 0"), 0);
        assert_eq!(eval("1 || 1 / 0"), 1);
    }

    #[test]
    fn test_self_reference_is_bounded() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), "a + 1".to_string());
        assert!(evaluate_arithmetic("a", &mut vars).is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(evaluate_arithmetic("1 +", &mut HashMap::new()).is_err());
        assert!(evaluate_arithmetic("(1", &mut HashMap::new()).is_err());
        assert!(evaluate_arithmetic("1 $ 2", &mut HashMap::new()).is_err());
    }
}

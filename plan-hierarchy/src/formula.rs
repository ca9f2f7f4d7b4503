//! Sandboxed arithmetic formulas for indicators.
//!
//! Supports numbers, named variables, `+ - * / %`, unary minus and
//! parentheses. Any other character is rejected at parse time, so a formula
//! can never do more than arithmetic over the variables it is given.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Maximum parenthesis/unary nesting accepted by the parser.
const MAX_NESTING: usize = 64;

/// Maximum number of tokens in a formula. Bounds the depth of the parsed
/// tree, which evaluation walks recursively.
const MAX_TOKENS: usize = 256;

/// Error types for formula parsing and evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    /// Formula has no tokens
    #[error("Formula is empty")]
    Empty,

    /// Character outside the arithmetic alphabet
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    /// Token in a position the grammar does not allow
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    /// Formula ended in the middle of an expression
    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    /// Numeric literal could not be read
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Nesting exceeds the parser limit
    #[error("Formula nesting exceeds the parser limit")]
    TooDeep,

    /// Token count exceeds the parser limit
    #[error("Formula exceeds the limit of {limit} tokens")]
    TooLong { limit: usize },

    /// Variable not supplied at evaluation time
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Result is NaN or infinite
    #[error("Formula produced a non-finite result")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(BinaryOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
        match self {
            BinaryOp::Add => Ok(lhs + rhs),
            BinaryOp::Sub => Ok(lhs - rhs),
            BinaryOp::Mul => Ok(lhs * rhs),
            BinaryOp::Div | BinaryOp::Rem if rhs == 0.0 => Err(FormulaError::DivisionByZero),
            BinaryOp::Div => Ok(lhs / rhs),
            BinaryOp::Rem => Ok(lhs % rhs),
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn evaluate(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(name) => vars
                .get(name)
                .copied()
                .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
            Expr::Neg(inner) => Ok(-inner.evaluate(vars)?),
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.evaluate(vars)?, rhs.evaluate(vars)?),
        }
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                out.insert(name);
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }
}

/// A parsed, reusable formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse a formula.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong { limit: MAX_TOKENS });
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        if let Some((token, position)) = parser.peek() {
            return Err(FormulaError::UnexpectedToken {
                token: token.to_string(),
                position,
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The original formula text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables referenced by the formula, sorted.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = BTreeSet::new();
        self.expr.collect_variables(&mut out);
        out.into_iter().collect()
    }

    /// Evaluate against the given variables.
    pub fn evaluate(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
        let value = self.expr.evaluate(vars)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                tokens.push((Token::Number(value), position));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(name), position));
            }
            '+' | '-' | '*' | '/' | '%' => {
                let op = match ch {
                    '+' => BinaryOp::Add,
                    '-' => BinaryOp::Sub,
                    '*' => BinaryOp::Mul,
                    '/' => BinaryOp::Div,
                    _ => BinaryOp::Rem,
                };
                tokens.push((Token::Op(op), position));
                chars.next();
            }
            '(' => {
                tokens.push((Token::LParen, position));
                chars.next();
            }
            ')' => {
                tokens.push((Token::RParen, position));
                chars.next();
            }
            other => {
                return Err(FormulaError::UnexpectedCharacter {
                    ch: other,
                    position,
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<(&'a Token, usize)> {
        self.tokens.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(&'a Token, usize)> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            Err(FormulaError::TooDeep)
        } else {
            Ok(())
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some((Token::Op(op @ (BinaryOp::Add | BinaryOp::Sub)), _)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op: *op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some((Token::Op(op @ (BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem)), _)) =
            self.peek()
        {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op: *op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // unary := ('-' | '+') unary | primary
    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some((Token::Op(BinaryOp::Sub), _)) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some((Token::Op(BinaryOp::Add), _)) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.primary(),
        }
    }

    // primary := number | identifier | '(' expression ')'
    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(*n)),
            Some((Token::Ident(name), _)) => Ok(Expr::Variable(name.clone())),
            Some((Token::LParen, _)) => {
                self.enter()?;
                let inner = self.expression()?;
                self.depth -= 1;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, position)) => Err(FormulaError::UnexpectedToken {
                        token: token.to_string(),
                        position,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((token, position)) => Err(FormulaError::UnexpectedToken {
                token: token.to_string(),
                position,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_precedence_and_parentheses() {
        let empty = HashMap::new();
        assert_eq!(Formula::parse("1 + 2 * 3").unwrap().evaluate(&empty).unwrap(), 7.0);
        assert_eq!(Formula::parse("(1 + 2) * 3").unwrap().evaluate(&empty).unwrap(), 9.0);
        assert_eq!(Formula::parse("10 - 4 - 3").unwrap().evaluate(&empty).unwrap(), 3.0);
        assert_eq!(Formula::parse("17 % 5").unwrap().evaluate(&empty).unwrap(), 2.0);
        assert_eq!(Formula::parse("-(2 + 3) * 2").unwrap().evaluate(&empty).unwrap(), -10.0);
        assert_eq!(Formula::parse("2 * -3").unwrap().evaluate(&empty).unwrap(), -6.0);
    }

    #[test]
    fn test_variables() {
        let formula = Formula::parse("(current - baseline) / (target - baseline) * 100").unwrap();
        assert_eq!(formula.variables(), vec!["baseline", "current", "target"]);

        let value = formula
            .evaluate(&vars(&[("current", 60.0), ("baseline", 20.0), ("target", 100.0)]))
            .unwrap();
        assert_eq!(value, 50.0);
    }

    #[test]
    fn test_unknown_variable() {
        let formula = Formula::parse("current / total").unwrap();
        assert_eq!(
            formula.evaluate(&vars(&[("current", 1.0)])),
            Err(FormulaError::UnknownVariable("total".to_string()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let formula = Formula::parse("current / (target - target)").unwrap();
        assert_eq!(
            formula.evaluate(&vars(&[("current", 1.0), ("target", 5.0)])),
            Err(FormulaError::DivisionByZero)
        );
        assert_eq!(
            Formula::parse("5 % 0").unwrap().evaluate(&HashMap::new()),
            Err(FormulaError::DivisionByZero)
        );
    }

    #[test]
    fn test_rejects_non_arithmetic_input() {
        assert!(matches!(
            Formula::parse("current; drop"),
            Err(FormulaError::UnexpectedCharacter { ch: ';', .. })
        ));
        assert!(matches!(
            Formula::parse("alert('x')"),
            Err(FormulaError::UnexpectedCharacter { .. })
        ));
        assert!(matches!(
            Formula::parse("current target"),
            Err(FormulaError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Formula::parse("1.2.3"),
            Err(FormulaError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_incomplete_input() {
        assert_eq!(Formula::parse(""), Err(FormulaError::Empty));
        assert_eq!(Formula::parse("   "), Err(FormulaError::Empty));
        assert_eq!(Formula::parse("1 +"), Err(FormulaError::UnexpectedEnd));
        assert_eq!(Formula::parse("(1 + 2"), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(
            Formula::parse("1 + 2)"),
            Err(FormulaError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Formula::parse(&deep), Err(FormulaError::TooDeep));

        let fine = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(Formula::parse(&fine).is_ok());
    }

    #[test]
    fn test_token_limit() {
        let long = vec!["1"; 5_000].join("+");
        assert_eq!(
            Formula::parse(&long),
            Err(FormulaError::TooLong { limit: MAX_TOKENS })
        );

        // 128 terms and 127 operators stay under the limit
        let fits = vec!["1"; 128].join("+");
        let formula = Formula::parse(&fits).unwrap();
        assert_eq!(formula.evaluate(&HashMap::new()).unwrap(), 128.0);
    }
}

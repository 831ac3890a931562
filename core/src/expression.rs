//! Boolean condition language for conditional cadence assignment.
//!
//! Conditions are compiled once and evaluated against a customer's
//! attribute document (a JSON object). The language has no functions,
//! no assignment and no loops:
//!
//! ```text
//! expr    := or
//! or      := and (("or" | "||") and)*
//! and     := unary (("and" | "&&") unary)*
//! unary   := ("not" | "!") unary | compare
//! compare := operand (("==" | "!=" | "<" | "<=" | ">" | ">=") operand
//!                     | "in" "[" operand ("," operand)* "]")?
//! operand := number | string | "true" | "false" | "null" | field | "(" expr ")"
//! field   := ident ("." ident)*
//! ```
//!
//! Unknown fields read as `null`. Nesting is capped at `MAX_DEPTH` levels
//! and a condition at `MAX_NODES` operands, so evaluation stays bounded.

use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

const MAX_DEPTH: usize = 64;
const MAX_NODES: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        pos: usize,
    },

    #[error("expression nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("expression has more than {MAX_NODES} operands")]
    TooLarge,

    #[error("cannot order {left} against {right}")]
    TypeMismatch { left: &'static str, right: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Field(Vec<String>),
    Not(Box<Expr>),
    // Chains are kept flat so long conditions never nest.
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
}

/// A parsed condition, ready to evaluate any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    ast: Expr,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        };
        let ast = parser.expr()?;
        if let Some((tok, pos)) = parser.tokens.get(parser.pos) {
            return Err(ExpressionError::UnexpectedToken {
                found: tok.describe(),
                expected: "end of expression",
                pos: *pos,
            });
        }
        Ok(Self { ast })
    }

    pub fn evaluate(&self, attributes: &Value) -> Result<bool, ExpressionError> {
        Ok(truthy(&eval(&self.ast, attributes)?))
    }
}

// ── Lexer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string \"{s}\""),
            other => format!("{other:?}"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;
        match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => { tokens.push((Token::LParen, start)); i += 1; }
            ')' => { tokens.push((Token::RParen, start)); i += 1; }
            '[' => { tokens.push((Token::LBracket, start)); i += 1; }
            ']' => { tokens.push((Token::RBracket, start)); i += 1; }
            ',' => { tokens.push((Token::Comma, start)); i += 1; }
            '&' if chars.get(i + 1) == Some(&'&') => { tokens.push((Token::And, start)); i += 2; }
            '|' if chars.get(i + 1) == Some(&'|') => { tokens.push((Token::Or, start)); i += 2; }
            '=' if chars.get(i + 1) == Some(&'=') => { tokens.push((Token::Cmp(CmpOp::Eq), start)); i += 2; }
            '!' if chars.get(i + 1) == Some(&'=') => { tokens.push((Token::Cmp(CmpOp::Ne), start)); i += 2; }
            '!' => { tokens.push((Token::Not, start)); i += 1; }
            '<' if chars.get(i + 1) == Some(&'=') => { tokens.push((Token::Cmp(CmpOp::Le), start)); i += 2; }
            '<' => { tokens.push((Token::Cmp(CmpOp::Lt), start)); i += 1; }
            '>' if chars.get(i + 1) == Some(&'=') => { tokens.push((Token::Cmp(CmpOp::Ge), start)); i += 2; }
            '>' => { tokens.push((Token::Cmp(CmpOp::Gt), start)); i += 1; }
            '"' | '\'' => {
                let quote = ch;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExpressionError::UnterminatedString { pos: start }),
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                value.push(*next);
                            }
                            i += 2;
                        }
                        Some(c) if *c == quote => {
                            i += 1;
                            break;
                        }
                        Some(c) => {
                            value.push(*c);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(value), start));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::UnexpectedChar { ch, pos: start })?;
                tokens.push((Token::Number(n), start));
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                };
                tokens.push((token, start));
            }
            other => return Err(ExpressionError::UnexpectedChar { ch: other, pos: start }),
        }
    }
    Ok(tokens)
}

// ── Parser ──────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn unexpected(&self, expected: &'static str) -> ExpressionError {
        match self.tokens.get(self.pos) {
            Some((tok, pos)) => ExpressionError::UnexpectedToken {
                found: tok.describe(),
                expected,
                pos: *pos,
            },
            None => ExpressionError::UnexpectedToken {
                found: "end of expression".into(),
                expected,
                pos: self.tokens.last().map_or(0, |(_, p)| *p),
            },
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExpressionError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        let out = self.or();
        self.depth -= 1;
        out
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Any(terms)
        })
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::All(terms)
        })
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(ExpressionError::TooDeep);
            }
            let inner = self.unary();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.operand()?;
        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.operand()?;
                Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
            }
            Some(Token::In) => {
                self.pos += 1;
                self.expect(Token::LBracket, "'['")?;
                let mut items = vec![self.operand()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    items.push(self.operand()?);
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::In(Box::new(left), items))
            }
            _ => Ok(left),
        }
    }

    fn operand(&mut self) -> Result<Expr, ExpressionError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(ExpressionError::TooLarge);
        }
        let expr = match self.peek() {
            Some(Token::Number(n)) => Expr::Literal(
                serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            ),
            Some(Token::Str(s)) => Expr::Literal(Value::String(s.clone())),
            Some(Token::True) => Expr::Literal(Value::Bool(true)),
            Some(Token::False) => Expr::Literal(Value::Bool(false)),
            Some(Token::Null) => Expr::Literal(Value::Null),
            Some(Token::Ident(name)) => {
                Expr::Field(name.split('.').map(str::to_string).collect())
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("a value, field or '('")),
        };
        self.advance();
        Ok(expr)
    }
}

// ── Evaluation ──────────────────────────────────────────────────

fn eval(expr: &Expr, attributes: &Value) -> Result<Value, ExpressionError> {
    Ok(match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Field(path) => lookup(attributes, path),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, attributes)?)),
        Expr::All(terms) => {
            for term in terms {
                if !truthy(&eval(term, attributes)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        Expr::Any(terms) => {
            for term in terms {
                if truthy(&eval(term, attributes)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
        Expr::Compare(op, l, r) => {
            let left = eval(l, attributes)?;
            let right = eval(r, attributes)?;
            Value::Bool(compare(*op, &left, &right)?)
        }
        Expr::In(needle, haystack) => {
            let needle = eval(needle, attributes)?;
            let mut found = false;
            for item in haystack {
                if loosely_equal(&needle, &eval(item, attributes)?) {
                    found = true;
                    break;
                }
            }
            Value::Bool(found)
        }
    })
}

fn lookup(attributes: &Value, path: &[String]) -> Value {
    let mut current = attributes;
    for segment in path {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ExpressionError> {
    match op {
        CmpOp::Eq => return Ok(loosely_equal(left, right)),
        CmpOp::Ne => return Ok(!loosely_equal(left, right)),
        _ => {}
    }

    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    let Some(ordering) = ordering else {
        return Err(ExpressionError::TypeMismatch {
            left: type_name(left),
            right: type_name(right),
        });
    };

    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::Ne => unreachable!("equality handled above"),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer() -> Value {
        json!({
            "name": "Acme Corp",
            "country": "US",
            "chase": true,
            "metadata": { "tier": "gold", "seats": 40 }
        })
    }

    fn eval_str(src: &str) -> Result<bool, ExpressionError> {
        Expression::compile(src)?.evaluate(&customer())
    }

    #[test]
    fn equality_and_logic() {
        assert!(eval_str("country == 'US'").unwrap());
        assert!(eval_str("country == \"US\" and chase").unwrap());
        assert!(!eval_str("country != 'US' || !chase").unwrap());
        assert!(eval_str("not (country == 'CA')").unwrap());
    }

    #[test]
    fn nested_fields_and_numbers() {
        assert!(eval_str("metadata.tier == 'gold' && metadata.seats >= 40").unwrap());
        assert!(!eval_str("metadata.seats > 40").unwrap());
        assert!(eval_str("metadata.seats == 40.0").unwrap());
    }

    #[test]
    fn membership() {
        assert!(eval_str("country in ['CA', 'US']").unwrap());
        assert!(!eval_str("metadata.tier in ['silver']").unwrap());
    }

    #[test]
    fn unknown_fields_are_null() {
        assert!(eval_str("missing == null").unwrap());
        assert!(!eval_str("metadata.missing").unwrap());
    }

    #[test]
    fn ordering_across_types_is_an_error() {
        assert!(matches!(
            eval_str("country > 3"),
            Err(ExpressionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn malformed_sources_fail_to_compile() {
        assert!(Expression::compile("country ==").is_err());
        assert!(Expression::compile("country = 'US'").is_err());
        assert!(Expression::compile("'open").is_err());
        assert!(Expression::compile("(country == 'US'").is_err());
        assert!(Expression::compile("country == 'US' extra").is_err());
    }

    #[test]
    fn long_chains_short_circuit() {
        let src = vec!["chase"; 500].join(" and ");
        assert!(eval_str(&src).unwrap());
        assert!(eval_str("country == 'CA' or missing or metadata.seats == 40").unwrap());
        assert!(eval_str("chase && country > 3 && false").is_err());
        assert!(eval_str("chase || country > 3").unwrap());
    }

    #[test]
    fn oversized_chains_are_rejected() {
        let src = vec!["true"; 300_000].join(" and ");
        assert_eq!(Expression::compile(&src), Err(ExpressionError::TooLarge));
        let src = vec!["chase"; 5_000].join(" or ");
        assert_eq!(Expression::compile(&src), Err(ExpressionError::TooLarge));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("{}true{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(Expression::compile(&src), Err(ExpressionError::TooDeep));
    }
}

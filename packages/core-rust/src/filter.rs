//! Annotation filter expressions.
//!
//! The store filters entities with a small boolean language over annotations:
//! `collection = "messages" && schemaId = "messages:msg@1"`. Equality clauses
//! are combined with `&&` and `||` (`&&` binds tighter) and may be grouped
//! with parentheses. String values are double-quoted with `\"` and `\\`
//! escapes; numeric values match numeric annotations.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{find_string, keys, NumericAnnotation, StringAnnotation};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:(?P<lparen>\()|(?P<rparen>\))|(?P<and>&&)|(?P<or>\|\|)|(?P<eq>=)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)|"(?P<string>(?:[^"\\]|\\.)*)"|(?P<number>-?[0-9]+(?:\.[0-9]+)?))"#,
    )
    .expect("filter token pattern is valid")
});

/// Right-hand side of an equality clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Number(f64),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for FilterValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

/// A parsed or constructed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Eq(String, FilterValue),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    pub fn eq(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Eq(key.into(), value.into())
    }

    #[must_use]
    pub fn and(self, other: FilterExpr) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: FilterExpr) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Parses the textual filter language.
    ///
    /// # Errors
    ///
    /// Returns [`FilterParseError`] on empty input, unknown characters,
    /// unbalanced parentheses, or a clause that is not `key = value`.
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(tok) => Err(FilterParseError::Unexpected(tok.describe())),
        }
    }

    /// Whether an entity with these annotations satisfies the expression.
    #[must_use]
    pub fn matches(&self, strings: &[StringAnnotation], numbers: &[NumericAnnotation]) -> bool {
        match self {
            Self::Eq(key, FilterValue::String(expected)) => {
                find_string(strings, key).is_some_and(|v| v == expected)
            }
            #[allow(clippy::float_cmp)]
            Self::Eq(key, FilterValue::Number(expected)) => numbers
                .iter()
                .find(|a| &a.key == key)
                .is_some_and(|a| a.value == *expected),
            Self::And(l, r) => l.matches(strings, numbers) && r.matches(strings, numbers),
            Self::Or(l, r) => l.matches(strings, numbers) || r.matches(strings, numbers),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(key, FilterValue::String(s)) => {
                write!(f, "{key} = \"")?;
                for c in s.chars() {
                    if matches!(c, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")
            }
            Self::Eq(key, FilterValue::Number(n)) => write!(f, "{key} = {n}"),
            Self::And(l, r) => {
                write_operand(f, l, false)?;
                f.write_str(" && ")?;
                write_operand(f, r, false)
            }
            Self::Or(l, r) => {
                write_operand(f, l, true)?;
                f.write_str(" || ")?;
                write_operand(f, r, true)
            }
        }
    }
}

/// `Or` operands under `And` need parentheses to keep their grouping.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &FilterExpr, in_or: bool) -> fmt::Result {
    match expr {
        FilterExpr::Or(..) if !in_or => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

/// Filter selecting every row of a collection, optionally narrowed to one schema.
#[must_use]
pub fn collection_filter(collection: &str, schema_id: Option<&str>) -> FilterExpr {
    let base = FilterExpr::eq(keys::COLLECTION, collection);
    match schema_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(schema_id) => base.and(FilterExpr::eq(keys::SCHEMA_ID, schema_id)),
        None => base,
    }
}

/// Filter selecting rows whose `type` annotation equals `reserved_type`.
#[must_use]
pub fn type_filter(reserved_type: &str) -> FilterExpr {
    FilterExpr::eq(keys::TYPE, reserved_type)
}

/// Error parsing a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterParseError {
    #[error("empty filter expression")]
    Empty,
    #[error("unrecognized input at {0:?}")]
    InvalidToken(String),
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Eq,
    Ident(String),
    Str(String),
    Num(f64),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::And => "'&&'".into(),
            Self::Or => "'||'".into(),
            Self::Eq => "'='".into(),
            Self::Ident(s) => format!("identifier {s:?}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Num(n) => format!("number {n}"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        if rest.trim().is_empty() {
            break;
        }
        let caps = TOKEN
            .captures(rest)
            .ok_or_else(|| FilterParseError::InvalidToken(rest.trim().to_string()))?;
        let token = if caps.name("lparen").is_some() {
            Token::LParen
        } else if caps.name("rparen").is_some() {
            Token::RParen
        } else if caps.name("and").is_some() {
            Token::And
        } else if caps.name("or").is_some() {
            Token::Or
        } else if caps.name("eq").is_some() {
            Token::Eq
        } else if let Some(m) = caps.name("ident") {
            Token::Ident(m.as_str().to_string())
        } else if let Some(m) = caps.name("string") {
            Token::Str(unescape(m.as_str()))
        } else if let Some(m) = caps.name("number") {
            let n = m
                .as_str()
                .parse()
                .map_err(|_| FilterParseError::InvalidToken(m.as_str().to_string()))?;
            Token::Num(n)
        } else {
            return Err(FilterParseError::InvalidToken(rest.trim().to_string()));
        };
        tokens.push(token);
        rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
    }
    if tokens.is_empty() {
        return Err(FilterParseError::Empty);
    }
    Ok(tokens)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Result<FilterExpr, FilterParseError> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            expr = expr.or(self.parse_and()?);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, FilterParseError> {
        let mut expr = self.parse_atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            expr = expr.and(self.parse_atom()?);
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<FilterExpr, FilterParseError> {
        match self.next().ok_or(FilterParseError::UnexpectedEnd)? {
            Token::LParen => {
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    Some(other) => Err(FilterParseError::Unexpected(other.describe())),
                    None => Err(FilterParseError::UnexpectedEnd),
                }
            }
            Token::Ident(key) => {
                match self.next() {
                    Some(Token::Eq) => {}
                    Some(other) => return Err(FilterParseError::Unexpected(other.describe())),
                    None => return Err(FilterParseError::UnexpectedEnd),
                }
                match self.next() {
                    Some(Token::Str(s)) => Ok(FilterExpr::Eq(key, FilterValue::String(s))),
                    Some(Token::Num(n)) => Ok(FilterExpr::Eq(key, FilterValue::Number(n))),
                    Some(other) => Err(FilterParseError::Unexpected(other.describe())),
                    None => Err(FilterParseError::UnexpectedEnd),
                }
            }
            other => Err(FilterParseError::Unexpected(other.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(pairs: &[(&str, &str)]) -> Vec<StringAnnotation> {
        pairs
            .iter()
            .map(|(k, v)| StringAnnotation::new(*k, *v))
            .collect()
    }

    #[test]
    fn collection_filter_renders() {
        assert_eq!(
            collection_filter("messages", None).to_string(),
            r#"collection = "messages""#
        );
        assert_eq!(
            collection_filter("messages", Some(" messages:msg@1 ")).to_string(),
            r#"collection = "messages" && schemaId = "messages:msg@1""#
        );
        assert_eq!(
            collection_filter("messages", Some("")).to_string(),
            r#"collection = "messages""#
        );
    }

    #[test]
    fn quotes_are_escaped_and_reparse() {
        let expr = FilterExpr::eq("collection", r#"we"ird\name"#);
        let text = expr.to_string();
        assert_eq!(text, r#"collection = "we\"ird\\name""#);
        assert_eq!(FilterExpr::parse(&text).unwrap(), expr);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = FilterExpr::parse(r#"a = "1" || b = "2" && c = "3""#).unwrap();
        assert_eq!(
            expr,
            FilterExpr::eq("a", "1").or(FilterExpr::eq("b", "2").and(FilterExpr::eq("c", "3")))
        );
    }

    #[test]
    fn parentheses_group_and_render() {
        let expr = FilterExpr::parse(r#"(a = "1" || b = "2") && version = 3"#).unwrap();
        assert_eq!(
            expr,
            FilterExpr::eq("a", "1")
                .or(FilterExpr::eq("b", "2"))
                .and(FilterExpr::eq("version", 3.0))
        );
        assert_eq!(expr.to_string(), r#"(a = "1" || b = "2") && version = 3"#);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(FilterExpr::parse("   "), Err(FilterParseError::Empty));
        assert_eq!(
            FilterExpr::parse(r#"a = "1" &&"#),
            Err(FilterParseError::UnexpectedEnd)
        );
        assert!(matches!(
            FilterExpr::parse(r#"a == "1""#),
            Err(FilterParseError::Unexpected(_))
        ));
        assert!(matches!(
            FilterExpr::parse(r#"a = "1" b"#),
            Err(FilterParseError::Unexpected(_))
        ));
        assert!(matches!(
            FilterExpr::parse("a = 'x'"),
            Err(FilterParseError::InvalidToken(_))
        ));
        assert_eq!(
            FilterExpr::parse(r#"(a = "1""#),
            Err(FilterParseError::UnexpectedEnd)
        );
    }

    #[test]
    fn matching_strings_and_numbers() {
        let s = strings(&[("collection", "messages"), ("type", "__schema")]);
        let n = vec![NumericAnnotation::new("version", 2.0)];

        assert!(collection_filter("messages", None).matches(&s, &n));
        assert!(!collection_filter("other", None).matches(&s, &n));
        assert!(type_filter("__schema").matches(&s, &n));
        assert!(FilterExpr::eq("version", 2u32).matches(&s, &n));
        // A string value never matches a numeric annotation.
        assert!(!FilterExpr::eq("version", "2").matches(&s, &n));
        assert!(FilterExpr::parse(r#"missing = "x" || version = 2"#)
            .unwrap()
            .matches(&s, &n));
    }
}

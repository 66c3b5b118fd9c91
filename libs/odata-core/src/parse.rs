use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::ast::{Expr, Value};
use crate::{Error, ODataOrderBy, OrderByItem, Result, SortDir};

pub const MAX_FILTER_LEN: usize = 8 * 1024;
pub const MAX_NODES: usize = 2000;
pub const MAX_ORDERBY_LEN: usize = 1024;
pub const MAX_ORDER_TERMS: usize = 10;

/// Split on `sep` outside of quoted strings and parentheses.
pub(crate) fn split_top_level(s: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0;

    for (i, ch) in s.char_indices() {
        match ch {
            '\'' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::InvalidLiteral(format!("unbalanced ')' in {}", s)))?;
            }
            c if c == sep && !in_quotes && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if in_quotes || depth != 0 {
        return Err(Error::InvalidLiteral(format!("unterminated expression: {}", s)));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Parse a single OData literal as it appears in key predicates and
/// `$orderby` expressions.
pub fn parse_literal(raw: &str) -> Result<Value> {
    let s = raw.trim();
    match s {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    // v2 spelling: guid'...'
    if let Some(inner) = s.strip_prefix("guid'").and_then(|r| r.strip_suffix('\'')) {
        return Uuid::parse_str(inner)
            .map(Value::Uuid)
            .map_err(|_| Error::InvalidLiteral(s.to_string()));
    }

    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return Ok(Value::String(s[1..s.len() - 1].replace("''", "'")));
    }

    if s.len() == 36 {
        if let Ok(u) = Uuid::parse_str(s) {
            return Ok(Value::Uuid(u));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Value::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Value::Date(d));
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
        return Ok(Value::Time(t));
    }
    BigDecimal::from_str(s)
        .map(Value::Number)
        .map_err(|_| Error::InvalidLiteral(s.to_string()))
}

/// Recursive-descent parser for the expression part of an `$orderby` term:
/// member paths, method calls and literals.
struct TermParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> TermParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn err(&self, msg: &str) -> Error {
        Error::InvalidOrderBy(format!("{} at position {} in '{}'", msg, self.pos, self.src))
    }

    fn expr(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.err("expected expression")),
            Some('\'') => self.string_literal(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let word =
                    self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/'));
                self.skip_ws();
                if self.peek() == Some('(') {
                    self.bump();
                    let args = self.args()?;
                    return Ok(Expr::Function(word.to_string(), args));
                }
                match word {
                    "true" | "false" | "null" => parse_literal(word).map(Expr::Value),
                    _ => Ok(Expr::Identifier(word.to_string())),
                }
            }
            Some(_) => {
                let token = self.take_while(|c| !c.is_whitespace() && c != ',' && c != ')');
                if token.is_empty() {
                    return Err(self.err("unexpected character"));
                }
                parse_literal(token)
                    .map(Expr::Value)
                    .map_err(|_| self.err("invalid literal"))
            }
        }
    }

    fn string_literal(&mut self) -> Result<Expr> {
        let start = self.pos;
        self.bump();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string")),
                Some('\'') => {
                    self.bump();
                    if self.peek() == Some('\'') {
                        self.bump();
                        continue;
                    }
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        parse_literal(&self.src[start..self.pos]).map(Expr::Value)
    }

    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.bump(),
                Some(')') => {
                    self.bump();
                    return Ok(args);
                }
                _ => return Err(self.err("expected ',' or ')'")),
            }
        }
    }
}

/// Parse `$orderby`: `expr [asc|desc], expr [asc|desc], ...`.
/// Direction defaults to ascending.
pub fn parse_orderby(raw: &str) -> Result<ODataOrderBy> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ODataOrderBy::empty());
    }
    if raw.len() > MAX_ORDERBY_LEN {
        return Err(Error::InvalidOrderBy("orderby too long".into()));
    }

    let terms = split_top_level(raw, ',').map_err(|e| Error::InvalidOrderBy(e.to_string()))?;
    let mut items = Vec::with_capacity(terms.len());

    for term in terms {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let mut parser = TermParser::new(term);
        let expr = parser.expr()?;
        parser.skip_ws();
        let dir = match parser.rest().trim() {
            "" | "asc" => SortDir::Asc,
            "desc" => SortDir::Desc,
            other => {
                return Err(Error::InvalidOrderBy(format!(
                    "invalid direction '{}' in clause: {}",
                    other, term
                )))
            }
        };
        items.push(OrderByItem { expr, dir });
    }

    if items.len() > MAX_ORDER_TERMS {
        return Err(Error::InvalidOrderBy("too many order terms".into()));
    }
    Ok(ODataOrderBy(items))
}

/// Split `$select` into its items. Column resolution happens later against
/// the entity.
pub fn parse_select(raw: &str) -> Result<Vec<String>> {
    let mut items = Vec::new();
    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let valid = item
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '/' | '.' | '*'));
        if !valid {
            return Err(Error::InvalidSelect(item.to_string()));
        }
        items.push(item.to_string());
    }
    Ok(items)
}

#[cfg(feature = "with-odata-params")]
pub fn parse_filter(raw: &str) -> Result<Option<Expr>> {
    use odata_params::filters as od;

    fn count_nodes(e: &od::Expr) -> usize {
        use od::Expr::*;
        match e {
            Value(_) | Identifier(_) => 1,
            Not(x) => 1 + count_nodes(x),
            And(a, b) | Or(a, b) | Compare(a, _, b) => 1 + count_nodes(a) + count_nodes(b),
            In(a, list) => 1 + count_nodes(a) + list.iter().map(count_nodes).sum::<usize>(),
            Function(_, args) => 1 + args.iter().map(count_nodes).sum::<usize>(),
        }
    }

    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() > MAX_FILTER_LEN {
        return Err(Error::InvalidFilter("filter too long".into()));
    }
    let src = od::parse_str(raw).map_err(|e| Error::InvalidFilter(format!("{:?}", e)))?;
    if count_nodes(&src) > MAX_NODES {
        return Err(Error::InvalidFilter("filter too complex".into()));
    }
    Ok(Some(src.into()))
}

#[cfg(not(feature = "with-odata-params"))]
pub fn parse_filter(raw: &str) -> Result<Option<Expr>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Err(Error::InvalidFilter(
        "$filter support is not enabled in this build".into(),
    ))
}

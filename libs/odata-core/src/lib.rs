//! Transport-agnostic OData request descriptor.
//!
//! Everything the query translators consume lives here: the `$filter` AST,
//! `$orderby` items, the `$skiptoken` cursor, the resource path and the
//! remaining system query options. Parsing is pure and does not know about
//! HTTP frameworks.

use std::fmt;

use thiserror::Error;

mod page;
mod parse;
mod path;
mod skiptoken;

pub use page::Page;
pub use parse::{
    parse_filter, parse_literal, parse_orderby, parse_select, MAX_FILTER_LEN, MAX_NODES,
    MAX_ORDERBY_LEN, MAX_ORDER_TERMS,
};
pub use path::{parse_key_predicate, parse_resource_path, KeyPredicate, ResourcePath};
pub use skiptoken::{base64_url, SkipToken};

pub mod ast {
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    use std::fmt;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Expr {
        And(Box<Expr>, Box<Expr>),
        Or(Box<Expr>, Box<Expr>),
        Not(Box<Expr>),
        Compare(Box<Expr>, CompareOperator, Box<Expr>),
        In(Box<Expr>, Vec<Expr>),
        Function(String, Vec<Expr>),
        /// Property or navigation path, segments separated by `/`.
        Identifier(String),
        Value(Value),
    }

    impl Expr {
        pub fn identifier(path: impl Into<String>) -> Self {
            Expr::Identifier(path.into())
        }

        /// Stable name of the expression variant, used in error reports.
        pub fn kind(&self) -> &'static str {
            match self {
                Expr::And(..) => "and",
                Expr::Or(..) => "or",
                Expr::Not(..) => "not",
                Expr::Compare(..) => "binary",
                Expr::In(..) => "in",
                Expr::Function(..) => "method",
                Expr::Identifier(..) => "member",
                Expr::Value(..) => "literal",
            }
        }

        /// Path segments of an identifier; `None` for any other variant.
        pub fn path_segments(&self) -> Option<Vec<&str>> {
            match self {
                Expr::Identifier(p) => Some(p.split('/').collect()),
                _ => None,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Gt,
        Ge,
        Lt,
        Le,
    }

    impl CompareOperator {
        pub fn as_str(&self) -> &'static str {
            match self {
                CompareOperator::Eq => "eq",
                CompareOperator::Ne => "ne",
                CompareOperator::Gt => "gt",
                CompareOperator::Ge => "ge",
                CompareOperator::Lt => "lt",
                CompareOperator::Le => "le",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Value {
        Null,
        Bool(bool),
        Number(BigDecimal),
        Uuid(Uuid),
        DateTime(DateTime<Utc>),
        Date(NaiveDate),
        Time(NaiveTime),
        String(String),
    }

    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Value::Null => f.write_str("null"),
                Value::Bool(b) => write!(f, "{}", b),
                Value::Number(n) => write!(f, "{}", n.normalized()),
                Value::Uuid(u) => write!(f, "{}", u),
                Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
                Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
                Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
                Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            }
        }
    }

    impl fmt::Display for Expr {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Expr::And(a, b) => write!(f, "({} and {})", a, b),
                Expr::Or(a, b) => write!(f, "({} or {})", a, b),
                Expr::Not(x) => write!(f, "not {}", x),
                Expr::Compare(l, op, r) => write!(f, "{} {} {}", l, op.as_str(), r),
                Expr::In(l, list) => {
                    write!(f, "{} in (", l)?;
                    for (i, item) in list.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", item)?;
                    }
                    f.write_str(")")
                }
                Expr::Function(name, args) => {
                    write!(f, "{}(", name)?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(")")
                }
                Expr::Identifier(p) => f.write_str(p),
                Expr::Value(v) => write!(f, "{}", v),
            }
        }
    }
}

/// Unified error for everything parsed out of an OData request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid $filter: {0}")]
    InvalidFilter(String),

    #[error("invalid $orderby: {0}")]
    InvalidOrderBy(String),

    #[error("invalid $select: {0}")]
    InvalidSelect(String),

    #[error("invalid value for {option}: {value}")]
    InvalidOption { option: &'static str, value: String },

    #[error("invalid resource path: {0}")]
    InvalidPath(String),

    #[error("invalid key predicate: {0}")]
    InvalidKey(String),

    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("invalid skip token: invalid base64url encoding")]
    SkipTokenInvalidBase64,

    #[error("invalid skip token: malformed JSON")]
    SkipTokenInvalidJson,

    #[error("invalid skip token: unsupported version")]
    SkipTokenInvalidVersion,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// One `$orderby` term: an expression and its direction.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderByItem {
    pub expr: ast::Expr,
    pub dir: SortDir,
}

impl OrderByItem {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            expr: ast::Expr::Identifier(path.into()),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            expr: ast::Expr::Identifier(path.into()),
            dir: SortDir::Desc,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ODataOrderBy(pub Vec<OrderByItem>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderByItem> {
        self.0.iter()
    }
}

impl fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(none)");
        }
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", item.expr, item.dir.as_str())?;
        }
        Ok(())
    }
}

/// Parsed system query options of one request.
#[derive(Clone, Debug, Default)]
pub struct ODataQuery {
    pub filter: Option<Box<ast::Expr>>,
    pub order: ODataOrderBy,
    /// Raw `$select`; column resolution needs the entity reflection.
    pub select: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub skip_token: Option<SkipToken>,
    pub count: bool,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, expr: ast::Expr) -> Self {
        self.filter = Some(Box::new(expr));
        self
    }

    pub fn with_order(mut self, order: ODataOrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_skip_token(mut self, token: SkipToken) -> Self {
        self.skip_token = Some(token);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn filter(&self) -> Option<&ast::Expr> {
        self.filter.as_deref()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Rows already delivered by previous server-driven pages.
    pub fn cursor_offset(&self) -> u64 {
        self.skip_token.map(|t| t.offset).unwrap_or(0)
    }

    /// Parse raw query-string values into a validated query.
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let mut query = ODataQuery::new();

        if let Some(raw) = params.filter.as_deref() {
            if let Some(expr) = parse_filter(raw)? {
                query = query.with_filter(expr);
            }
        }
        if let Some(raw) = params.orderby.as_deref() {
            query = query.with_order(parse_orderby(raw)?);
        }
        if let Some(raw) = params.select.as_deref() {
            if !raw.trim().is_empty() {
                query = query.with_select(raw.trim());
            }
        }
        if let Some(raw) = params.top.as_deref() {
            query = query.with_top(parse_u64("$top", raw)?);
        }
        if let Some(raw) = params.skip.as_deref() {
            query = query.with_skip(parse_u64("$skip", raw)?);
        }
        if let Some(raw) = params.skiptoken.as_deref() {
            query = query.with_skip_token(SkipToken::decode(raw)?);
        }
        if let Some(raw) = params.count.as_deref() {
            query = query.with_count(match raw.trim() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(Error::InvalidOption {
                        option: "$count",
                        value: other.to_string(),
                    })
                }
            });
        }
        Ok(query)
    }
}

fn parse_u64(option: &'static str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| Error::InvalidOption {
        option,
        value: raw.to_string(),
    })
}

impl From<Option<ast::Expr>> for ODataQuery {
    fn from(opt: Option<ast::Expr>) -> Self {
        match opt {
            Some(e) => ODataQuery::new().with_filter(e),
            None => ODataQuery::new(),
        }
    }
}

/// Raw system query options as they arrive on the query string.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct QueryParams {
    #[serde(rename = "$filter")]
    pub filter: Option<String>,
    #[serde(rename = "$orderby")]
    pub orderby: Option<String>,
    #[serde(rename = "$select")]
    pub select: Option<String>,
    #[serde(rename = "$top")]
    pub top: Option<String>,
    #[serde(rename = "$skip")]
    pub skip: Option<String>,
    #[serde(rename = "$skiptoken")]
    pub skiptoken: Option<String>,
    #[serde(rename = "$count")]
    pub count: Option<String>,
    /// OData v2 spelling of `$count=true`.
    #[serde(rename = "$inlinecount")]
    pub inlinecount: Option<String>,
}

/// A complete request descriptor: where it points and what it asks for.
#[derive(Clone, Debug)]
pub struct ODataRequest {
    pub path: ResourcePath,
    pub query: ODataQuery,
}

impl ODataRequest {
    pub fn new(path: ResourcePath, query: ODataQuery) -> Self {
        Self { path, query }
    }

    pub fn parse(raw_path: &str, params: &QueryParams) -> Result<Self> {
        Ok(Self {
            path: parse_resource_path(raw_path)?,
            query: ODataQuery::from_params(params)?,
        })
    }
}

#[cfg(feature = "with-odata-params")]
mod convert_odata_params {
    use super::ast::*;
    use odata_params::filters as od;

    impl From<od::CompareOperator> for CompareOperator {
        fn from(op: od::CompareOperator) -> Self {
            use od::CompareOperator::*;
            match op {
                Equal => CompareOperator::Eq,
                NotEqual => CompareOperator::Ne,
                GreaterThan => CompareOperator::Gt,
                GreaterOrEqual => CompareOperator::Ge,
                LessThan => CompareOperator::Lt,
                LessOrEqual => CompareOperator::Le,
            }
        }
    }

    impl From<od::Value> for Value {
        fn from(v: od::Value) -> Self {
            match v {
                od::Value::Null => Value::Null,
                od::Value::Bool(b) => Value::Bool(b),
                od::Value::Number(n) => Value::Number(n),
                od::Value::Uuid(u) => Value::Uuid(u),
                od::Value::DateTime(dt) => Value::DateTime(dt),
                od::Value::Date(d) => Value::Date(d),
                od::Value::Time(t) => Value::Time(t),
                od::Value::String(s) => Value::String(s),
            }
        }
    }

    impl From<od::Expr> for Expr {
        fn from(e: od::Expr) -> Self {
            use od::Expr::*;
            match e {
                And(a, b) => Expr::And(Box::new((*a).into()), Box::new((*b).into())),
                Or(a, b) => Expr::Or(Box::new((*a).into()), Box::new((*b).into())),
                Not(x) => Expr::Not(Box::new((*x).into())),
                Compare(l, op, r) => {
                    Expr::Compare(Box::new((*l).into()), op.into(), Box::new((*r).into()))
                }
                In(l, list) => Expr::In(
                    Box::new((*l).into()),
                    list.into_iter().map(|x| x.into()).collect(),
                ),
                Function(n, args) => {
                    Expr::Function(n, args.into_iter().map(|x| x.into()).collect())
                }
                Identifier(s) => Expr::Identifier(s),
                Value(v) => Expr::Value(v.into()),
            }
        }
    }
}

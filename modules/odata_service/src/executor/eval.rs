//! Evaluation of CQN expression tokens against one in-memory row.

use std::cmp::Ordering;

use cqn::{DataValue, Operator, Token};
use indexmap::IndexMap;
use serde_json::Value as Json;

use super::ExecError;

pub(crate) type Row = IndexMap<String, DataValue>;

type EvalResult<T> = Result<T, ExecError>;

fn rank(v: &Json) -> u8 {
    match v {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
/// Numbers compare numerically regardless of representation.
pub fn compare_values(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Json::String(x), Json::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn same_kind(a: &Json, b: &Json) -> bool {
    rank(a) == rank(b)
}

fn equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Array(_), _) | (Json::Object(_), _) => a == b,
        _ => same_kind(a, b) && compare_values(a, b) == Ordering::Equal,
    }
}

fn compare(op: Operator, lhs: &Json, rhs: &Json) -> bool {
    match op {
        Operator::Eq => equal(lhs, rhs),
        Operator::Ne => !equal(lhs, rhs),
        _ if lhs.is_null() || rhs.is_null() || !same_kind(lhs, rhs) => false,
        Operator::Gt => compare_values(lhs, rhs) == Ordering::Greater,
        Operator::Ge => compare_values(lhs, rhs) != Ordering::Less,
        Operator::Lt => compare_values(lhs, rhs) == Ordering::Less,
        Operator::Le => compare_values(lhs, rhs) != Ordering::Greater,
        _ => false,
    }
}

fn truthy(v: &Json) -> bool {
    matches!(v, Json::Bool(true))
}

fn string_args<'a>(name: &str, args: &'a [Json], arity: usize) -> EvalResult<Option<Vec<&'a str>>> {
    if args.len() != arity {
        return Err(ExecError::Unsupported(format!(
            "{}() expects {} argument(s), got {}",
            name,
            arity,
            args.len()
        )));
    }
    Ok(args.iter().map(Json::as_str).collect())
}

fn call(name: &str, args: &[Json]) -> EvalResult<Json> {
    let text = |arity| string_args(name, args, arity);
    let value = match name {
        "contains" => text(2)?.map(|a| Json::Bool(a[0].contains(a[1]))),
        "startswith" => text(2)?.map(|a| Json::Bool(a[0].starts_with(a[1]))),
        "endswith" => text(2)?.map(|a| Json::Bool(a[0].ends_with(a[1]))),
        "tolower" => text(1)?.map(|a| Json::from(a[0].to_lowercase())),
        "toupper" => text(1)?.map(|a| Json::from(a[0].to_uppercase())),
        "trim" => text(1)?.map(|a| Json::from(a[0].trim())),
        "length" => text(1)?.map(|a| Json::from(a[0].chars().count())),
        "concat" => text(2)?.map(|a| Json::from(format!("{}{}", a[0], a[1]))),
        "indexof" => text(2)?.map(|a| {
            let idx = a[0]
                .find(a[1])
                .map(|byte| a[0][..byte].chars().count() as i64)
                .unwrap_or(-1);
            Json::from(idx)
        }),
        "substring" => {
            let (Some(s), Some(start)) = (
                args.first().and_then(Json::as_str),
                args.get(1).and_then(Json::as_u64),
            ) else {
                return Ok(Json::Null);
            };
            let chars = s.chars().skip(start as usize);
            let out: String = match args.get(2).and_then(Json::as_u64) {
                Some(len) => chars.take(len as usize).collect(),
                None => chars.collect(),
            };
            Some(Json::from(out))
        }
        other => return Err(ExecError::Unsupported(format!("function {}()", other))),
    };
    Ok(value.unwrap_or(Json::Null))
}

/// Value of a single operand token. Multi-segment references address the
/// flattened `parent_child` column.
pub(crate) fn value_of(token: &Token, row: &Row) -> EvalResult<Json> {
    match token {
        Token::Ref { path } => Ok(row
            .get(&path.join("_"))
            .map(DataValue::to_json)
            .unwrap_or(Json::Null)),
        Token::Val { val } => Ok(val.clone()),
        Token::Func { func, args } => {
            let args = args
                .iter()
                .map(|a| value_of(a, row))
                .collect::<EvalResult<Vec<_>>>()?;
            call(func, &args)
        }
        Token::Xpr { xpr } => evaluate(xpr, row),
        Token::List { list } => list
            .iter()
            .map(|t| value_of(t, row))
            .collect::<EvalResult<Vec<_>>>()
            .map(Json::Array),
        Token::Op(op) => Err(ExecError::Unsupported(format!(
            "operator {:?} in operand position",
            op
        ))),
    }
}

/// Precedence climbing over a flat token list: `or` < `and` < `not` < comparison.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    row: &'a Row,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<Operator> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn or(&mut self) -> EvalResult<Json> {
        let mut acc = self.and()?;
        while self.peek_op() == Some(Operator::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            acc = Json::Bool(truthy(&acc) || truthy(&rhs));
        }
        Ok(acc)
    }

    fn and(&mut self) -> EvalResult<Json> {
        let mut acc = self.not()?;
        while self.peek_op() == Some(Operator::And) {
            self.pos += 1;
            let rhs = self.not()?;
            acc = Json::Bool(truthy(&acc) && truthy(&rhs));
        }
        Ok(acc)
    }

    fn not(&mut self) -> EvalResult<Json> {
        if self.peek_op() == Some(Operator::Not) {
            self.pos += 1;
            let inner = self.not()?;
            return Ok(Json::Bool(!truthy(&inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> EvalResult<Json> {
        let lhs = self.operand()?;
        match self.peek_op() {
            Some(op) if op.is_comparison() => {
                self.pos += 1;
                let rhs = self.operand()?;
                Ok(Json::Bool(compare(op, &lhs, &rhs)))
            }
            Some(Operator::In) => {
                self.pos += 1;
                let list = self.operand()?;
                let found = list
                    .as_array()
                    .is_some_and(|items| items.iter().any(|item| equal(&lhs, item)));
                Ok(Json::Bool(found))
            }
            _ => Ok(lhs),
        }
    }

    fn operand(&mut self) -> EvalResult<Json> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ExecError::Unsupported("unexpected end of expression".into()))?;
        self.pos += 1;
        value_of(token, self.row)
    }
}

fn evaluate(tokens: &[Token], row: &Row) -> EvalResult<Json> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        row,
    };
    let value = parser.or()?;
    if parser.pos != tokens.len() {
        return Err(ExecError::Unsupported(format!(
            "unexpected token at position {}",
            parser.pos
        )));
    }
    Ok(value)
}

/// True when `row` satisfies the `where` tokens; an empty list matches all.
pub fn matches(where_: &[Token], row: &Row) -> Result<bool, ExecError> {
    if where_.is_empty() {
        return Ok(true);
    }
    evaluate(where_, row).map(|v| truthy(&v))
}

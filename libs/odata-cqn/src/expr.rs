//! `$filter` AST → CQN token list.
//!
//! Identifiers are checked against the entity reflection; structured paths
//! (`price/amount`) are mapped onto their flattened element (`price_amount`).

use bigdecimal::ToPrimitive;
use cds_model::Entity;
use cqn::{Operator, Token};
use odata_core::ast::{CompareOperator, Expr, Value};
use serde_json::Value as Json;

use crate::{Error, Result};

/// Functions that have a CQN rendering.
const FUNCTIONS: &[&str] = &[
    "contains",
    "startswith",
    "endswith",
    "tolower",
    "toupper",
    "length",
    "trim",
    "concat",
    "indexof",
    "substring",
];

pub fn compare_operator(op: CompareOperator) -> Operator {
    match op {
        CompareOperator::Eq => Operator::Eq,
        CompareOperator::Ne => Operator::Ne,
        CompareOperator::Gt => Operator::Gt,
        CompareOperator::Ge => Operator::Ge,
        CompareOperator::Lt => Operator::Lt,
        CompareOperator::Le => Operator::Le,
    }
}

/// Literal as a JSON value. Integers stay integers; other numbers become
/// doubles; temporal values and GUIDs are rendered as strings.
pub fn value_to_json(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => {
            if n.is_integer() {
                if let Some(i) = n.to_i64() {
                    return Json::from(i);
                }
            }
            n.to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(n.to_string()))
        }
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
        Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => Json::String(t.format("%H:%M:%S").to_string()),
        Value::String(s) => Json::String(s.clone()),
    }
}

/// Resolve an OData path to CQN reference segments.
pub fn resolve_path(path: &str, entity: &Entity) -> Result<Vec<String>> {
    let segments: Vec<&str> = path.split('/').collect();
    let head = segments[0];
    let element = entity.element(head).ok_or_else(|| Error::UnknownProperty {
        entity: entity.name.clone(),
        property: head.to_string(),
    })?;

    if element.is_structured() && segments.len() > 1 {
        let flat = segments.join("_");
        if entity.element(&flat).is_none() {
            return Err(Error::UnknownProperty {
                entity: entity.name.clone(),
                property: path.to_string(),
            });
        }
        return Ok(vec![flat]);
    }
    Ok(segments.into_iter().map(str::to_string).collect())
}

/// A single value-producing expression: reference, literal or function call.
/// This is also the generic translator used for computed `$orderby` terms.
pub fn operand(expr: &Expr, entity: &Entity) -> Result<Token> {
    match expr {
        Expr::Identifier(path) => Ok(Token::reference(resolve_path(path, entity)?)),
        Expr::Value(v) => Ok(Token::val(value_to_json(v))),
        Expr::Function(name, args) => {
            let name = name.to_ascii_lowercase();
            if !FUNCTIONS.contains(&name.as_str()) {
                return Err(Error::UnsupportedFunction(name));
            }
            let args = args
                .iter()
                .map(|a| operand(a, entity))
                .collect::<Result<Vec<_>>>()?;
            Ok(Token::func(name, args))
        }
        other => Ok(Token::xpr(filter_to_tokens(other, entity)?)),
    }
}

fn grouped(expr: &Expr, entity: &Entity, wrap: bool) -> Result<Vec<Token>> {
    let tokens = filter_to_tokens(expr, entity)?;
    Ok(if wrap { vec![Token::xpr(tokens)] } else { tokens })
}

/// Translate a boolean `$filter` expression into a `where` token list.
pub fn filter_to_tokens(expr: &Expr, entity: &Entity) -> Result<Vec<Token>> {
    match expr {
        Expr::And(a, b) => {
            let mut out = grouped(a, entity, matches!(**a, Expr::Or(..)))?;
            out.push(Token::op(Operator::And));
            out.extend(grouped(b, entity, matches!(**b, Expr::Or(..)))?);
            Ok(out)
        }
        Expr::Or(a, b) => {
            let mut out = filter_to_tokens(a, entity)?;
            out.push(Token::op(Operator::Or));
            out.extend(filter_to_tokens(b, entity)?);
            Ok(out)
        }
        Expr::Not(x) => Ok(vec![
            Token::op(Operator::Not),
            Token::xpr(filter_to_tokens(x, entity)?),
        ]),
        Expr::Compare(l, op, r) => Ok(vec![
            operand(l, entity)?,
            Token::op(compare_operator(*op)),
            operand(r, entity)?,
        ]),
        Expr::In(l, list) => {
            let items = list
                .iter()
                .map(|item| operand(item, entity))
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![
                operand(l, entity)?,
                Token::op(Operator::In),
                Token::list(items),
            ])
        }
        Expr::Function(..) => Ok(vec![operand(expr, entity)?]),
        Expr::Identifier(name) => Err(Error::BareIdentifier(name.clone())),
        Expr::Value(_) => Err(Error::BareLiteral),
    }
}

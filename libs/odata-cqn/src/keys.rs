use cds_model::{is_draft_column, Entity};
use cqn::{conjunction, Operator, Token};
use odata_core::KeyPredicate;
use serde_json::Value as Json;

use crate::expr::value_to_json;
use crate::{Error, Result};

const IS_ACTIVE: &str = "IsActiveEntity";

/// Resolve a key predicate to `(key, value)` pairs in the entity's key order.
///
/// `IsActiveEntity` defaults to `true` on draft-enabled entities.
pub fn resolve_keys(keys: &KeyPredicate, entity: &Entity) -> Result<Vec<(String, Json)>> {
    let invalid = |reason: String| Error::InvalidKey {
        entity: entity.name.clone(),
        reason,
    };
    let declared = entity.key_names();
    let business: Vec<&str> = declared
        .iter()
        .copied()
        .filter(|k| !is_draft_column(k))
        .collect();

    let mut given: Vec<(String, Json)> = match keys {
        KeyPredicate::Single(v) => match business.as_slice() {
            [only] => vec![(only.to_string(), value_to_json(v))],
            _ => {
                return Err(invalid(format!(
                    "an unnamed key needs exactly one key element, found {}",
                    business.len()
                )))
            }
        },
        KeyPredicate::Named(pairs) => {
            for (name, _) in pairs {
                if !declared.contains(&name.as_str()) {
                    return Err(invalid(format!("'{}' is not a key element", name)));
                }
            }
            pairs
                .iter()
                .map(|(n, v)| (n.clone(), value_to_json(v)))
                .collect()
        }
    };

    if entity.is_draft_enabled() && !given.iter().any(|(n, _)| n == IS_ACTIVE) {
        given.push((IS_ACTIVE.to_string(), Json::Bool(true)));
    }

    let mut ordered = Vec::with_capacity(declared.len());
    for key in declared {
        match given.iter().position(|(n, _)| n == key) {
            Some(i) => ordered.push(given.swap_remove(i)),
            None => return Err(invalid(format!("missing value for key '{}'", key))),
        }
    }
    Ok(ordered)
}

/// `key1 = v1 and key2 = v2 ...`
pub fn keys_to_where(pairs: &[(String, Json)]) -> Vec<Token> {
    conjunction(
        pairs
            .iter()
            .map(|(k, v)| {
                vec![
                    Token::reference([k.as_str()]),
                    Token::op(Operator::Eq),
                    Token::val(v.clone()),
                ]
            })
            .collect(),
    )
}

pub fn key_predicate_to_where(keys: &KeyPredicate, entity: &Entity) -> Result<Vec<Token>> {
    resolve_keys(keys, entity).map(|pairs| keys_to_where(&pairs))
}

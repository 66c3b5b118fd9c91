//! Base64 ⇄ bytes conversion for binary elements of entity payloads.
//!
//! Only elements typed `cds.Binary` / `cds.LargeBinary` are touched.
//! Relationships are followed into their target entity, structured
//! elements into their flattened parts.

use std::convert::Infallible;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use cds_model::{Entity, Model};
use cqn::DataValue;

use crate::{Error, Result};

/// Inbound: base64 strings become raw bytes.
pub fn decode_binaries(data: &mut DataValue, entity: &Entity, model: &Model) -> Result<()> {
    walk(data, entity, model, "", &mut decode_value)
}

/// Outbound: raw bytes become base64 strings.
pub fn encode_binaries(data: &mut DataValue, entity: &Entity, model: &Model) {
    match walk(data, entity, model, "", &mut encode_value) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(raw)
        .ok()
        .or_else(|| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')).ok())
}

fn decode_value(value: &mut DataValue, element: &str) -> Result<()> {
    let invalid = || Error::InvalidBinary {
        element: element.to_string(),
    };
    match value {
        DataValue::String(s) => {
            let bytes = decode_base64(s).ok_or_else(invalid)?;
            *value = DataValue::Binary(bytes);
            Ok(())
        }
        DataValue::Null | DataValue::Binary(_) => Ok(()),
        _ => Err(invalid()),
    }
}

fn encode_value(value: &mut DataValue, _element: &str) -> std::result::Result<(), Infallible> {
    if let DataValue::Binary(bytes) = value {
        *value = DataValue::String(STANDARD.encode(bytes));
    }
    Ok(())
}

/// Visit every binary element reachable from `data`, applying `convert`.
fn walk<E, F>(
    data: &mut DataValue,
    entity: &Entity,
    model: &Model,
    prefix: &str,
    convert: &mut F,
) -> std::result::Result<(), E>
where
    F: FnMut(&mut DataValue, &str) -> std::result::Result<(), E>,
{
    match data {
        DataValue::Array(items) => {
            for item in items {
                walk(item, entity, model, prefix, convert)?;
            }
        }
        DataValue::Object(fields) => {
            for (key, value) in fields.iter_mut() {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}_{}", prefix, key)
                };
                let Some(element) = entity.element(&name) else {
                    continue;
                };
                if element.is_binary() {
                    convert(value, &name)?;
                } else if element.is_relationship() {
                    if let Some(target) = model.target_of(element) {
                        walk(value, target, model, "", convert)?;
                    }
                } else if element.is_structured() {
                    walk(value, entity, model, &name, convert)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

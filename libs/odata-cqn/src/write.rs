use cqn::{DataValue, Delete, EntityRef, Insert, Update};
use odata_core::ODataRequest;

use crate::keys::{keys_to_where, resolve_keys};
use crate::{Error, Result, TranslationContext};

fn require_object(data: &DataValue) -> Result<()> {
    if data.as_object().is_none() {
        return Err(Error::InvalidPayload("expected a JSON object".into()));
    }
    Ok(())
}

/// POST on a collection.
pub fn create_to_cqn(data: &DataValue, ctx: &TranslationContext<'_>) -> Result<Insert> {
    require_object(data)?;
    Ok(Insert {
        into: EntityRef::new(&ctx.entity.name),
        entries: vec![data.clone()],
    })
}

/// PATCH / PUT on a single entity. Key elements are taken from the path;
/// payload values for them must agree with it and are not part of the
/// update data.
pub fn update_to_cqn(
    request: &ODataRequest,
    data: &DataValue,
    ctx: &TranslationContext<'_>,
) -> Result<Update> {
    let entity = ctx.entity;
    let keys = request.path.keys.as_ref().ok_or_else(|| Error::MissingKeys {
        entity: entity.name.clone(),
        operation: "UPDATE",
    })?;
    let pairs = resolve_keys(keys, entity)?;

    let Some(fields) = data.as_object() else {
        return Err(Error::InvalidPayload("expected a JSON object".into()));
    };
    let mut changes = fields.clone();
    for (key, value) in &pairs {
        if let Some(given) = changes.shift_remove(key) {
            if given.to_json() != *value {
                return Err(Error::KeyMismatch { key: key.clone() });
            }
        }
    }

    Ok(Update {
        entity: EntityRef::new(&entity.name),
        data: DataValue::Object(changes),
        where_: keys_to_where(&pairs),
    })
}

/// DELETE on a single entity.
pub fn delete_to_cqn(request: &ODataRequest, ctx: &TranslationContext<'_>) -> Result<Delete> {
    let entity = ctx.entity;
    let keys = request.path.keys.as_ref().ok_or_else(|| Error::MissingKeys {
        entity: entity.name.clone(),
        operation: "DELETE",
    })?;
    Ok(Delete {
        from: EntityRef::new(&entity.name),
        where_: keys_to_where(&resolve_keys(keys, entity)?),
    })
}

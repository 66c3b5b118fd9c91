use cds_model::{Entity, Model};
use cqn::DataValue;
use indexmap::IndexMap;

/// Copy of `data` restricted to what `entity` may receive.
///
/// Kept: declared primitive elements; sub-keys `k` of a structured element
/// `s` when the entity declares `s_k`; compositions, filtered recursively
/// against their target entity. Associations and undeclared keys are
/// dropped. The result is computed on every call.
pub fn filter_payload(data: &DataValue, entity: &Entity, model: &Model) -> DataValue {
    match data {
        DataValue::Array(items) => DataValue::Array(
            items
                .iter()
                .map(|item| filter_payload(item, entity, model))
                .collect(),
        ),
        DataValue::Object(fields) => DataValue::Object(filter_object(fields, entity, model)),
        other => other.clone(),
    }
}

fn filter_object(
    fields: &IndexMap<String, DataValue>,
    entity: &Entity,
    model: &Model,
) -> IndexMap<String, DataValue> {
    let mut out = IndexMap::with_capacity(fields.len());
    for (key, value) in fields {
        let Some(element) = entity.element(key) else {
            continue;
        };
        if element.is_composition() {
            if let Some(target) = model.target_of(element) {
                out.insert(key.clone(), filter_payload(value, target, model));
            }
        } else if element.is_association() {
            continue;
        } else if element.is_structured() {
            out.insert(key.clone(), filter_structured(key, value, entity));
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

fn filter_structured(parent: &str, value: &DataValue, entity: &Entity) -> DataValue {
    match value {
        DataValue::Object(sub) => DataValue::Object(
            sub.iter()
                .filter(|(k, _)| entity.element(&format!("{}_{}", parent, k)).is_some())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

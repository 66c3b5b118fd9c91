use cds_model::{ElementType, Entity};
use cqn::Column;
use indexmap::IndexSet;
use odata_core::parse_select;

use crate::{Error, Result};

/// Resolve `$select` into a column list.
///
/// `Ok(None)` means all columns. A restricted list always carries the
/// key columns and the concurrency-token elements, each exactly once.
/// Relationships are never plain columns; structured elements expand to
/// their flattened parts.
pub fn select_to_cqn(raw: &str, keys: &[&str], entity: &Entity) -> Result<Option<Vec<Column>>> {
    let requested = parse_select(raw)?;
    if requested.iter().any(|item| item == "*") {
        return Ok(None);
    }

    let mut columns: IndexSet<String> = IndexSet::new();
    for item in &requested {
        let mut segments = item.split('/');
        let head = segments.next().unwrap_or_default();
        let element = entity.element(head).ok_or_else(|| Error::UnknownProperty {
            entity: entity.name.clone(),
            property: head.to_string(),
        })?;

        match &element.ty {
            ElementType::Association | ElementType::Composition => continue,
            ElementType::Structured(parts) => match segments.next() {
                Some(part) => {
                    let flat = format!("{}_{}", head, part);
                    if entity.element(&flat).is_none() {
                        return Err(Error::UnknownProperty {
                            entity: entity.name.clone(),
                            property: item.clone(),
                        });
                    }
                    columns.insert(flat);
                }
                None => {
                    columns.extend(parts.iter().map(|p| format!("{}_{}", head, p)));
                }
            },
            ElementType::Primitive(_) => {
                columns.insert(head.to_string());
            }
        }
    }

    columns.extend(keys.iter().map(|k| k.to_string()));
    columns.extend(entity.etag_elements().map(|e| e.name.clone()));

    Ok(Some(columns.into_iter().map(Column::name).collect()))
}

use cqn::Select;
use odata_core::ODataRequest;

use crate::keys::key_predicate_to_where;
use crate::{Result, TranslationContext};

/// Bound action or function: load the instance the operation is bound to.
/// Collection-bound operations read the whole (unpaged) collection.
pub fn bound_action_to_cqn(request: &ODataRequest, ctx: &TranslationContext<'_>) -> Result<Select> {
    let entity = ctx.entity;
    match &request.path.keys {
        Some(keys) => Ok(Select::new(&entity.name)
            .with_where(key_predicate_to_where(keys, entity)?)
            .one()),
        None => Ok(Select::new(&entity.name)),
    }
}
